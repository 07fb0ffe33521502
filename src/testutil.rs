/*
 * Copyright (C) 2023 Fastly, Inc.
 *
 * Licensed under the Apache License, Version 2.0 (the "License");
 * you may not use this file except in compliance with the License.
 * You may obtain a copy of the License at
 *
 *     http://www.apache.org/licenses/LICENSE-2.0
 *
 * Unless required by applicable law or agreed to in writing, software
 * distributed under the License is distributed on an "AS IS" BASIS,
 * WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
 * See the License for the specific language governing permissions and
 * limitations under the License.
 */

use crate::net::Accept;
use std::cell::RefCell;
use std::cmp;
use std::collections::VecDeque;
use std::io::{self, Read, Write};
use std::mem;
use std::net::SocketAddr;
use std::rc::Rc;

// in-memory socket that behaves like a non-blocking one
pub struct FakeSock {
    inbuf: Vec<u8>,
    outbuf: Vec<u8>,
    out_allow: usize,
    eof: bool,
    read_error: Option<io::ErrorKind>,
    write_error: Option<io::ErrorKind>,
}

impl FakeSock {
    pub fn new() -> Self {
        Self {
            inbuf: Vec::with_capacity(16384),
            outbuf: Vec::with_capacity(16384),
            out_allow: 0,
            eof: false,
            read_error: None,
            write_error: None,
        }
    }

    pub fn add_readable(&mut self, buf: &[u8]) {
        self.inbuf.extend_from_slice(buf);
    }

    pub fn take_writable(&mut self) -> Vec<u8> {
        mem::take(&mut self.outbuf)
    }

    pub fn allow_write(&mut self, size: usize) {
        self.out_allow += size;
    }

    // reads return 0 once inbuf is drained
    pub fn set_eof(&mut self) {
        self.eof = true;
    }

    pub fn set_read_error(&mut self, kind: io::ErrorKind) {
        self.read_error = Some(kind);
    }

    pub fn set_write_error(&mut self, kind: io::ErrorKind) {
        self.write_error = Some(kind);
    }
}

impl Read for FakeSock {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, io::Error> {
        if let Some(kind) = self.read_error {
            return Err(io::Error::from(kind));
        }

        if self.inbuf.is_empty() {
            if self.eof {
                return Ok(0);
            }

            return Err(io::Error::from(io::ErrorKind::WouldBlock));
        }

        let size = cmp::min(buf.len(), self.inbuf.len());

        buf[..size].copy_from_slice(&self.inbuf[..size]);

        let mut rest = self.inbuf.split_off(size);
        mem::swap(&mut self.inbuf, &mut rest);

        Ok(size)
    }
}

impl Write for FakeSock {
    fn write(&mut self, buf: &[u8]) -> Result<usize, io::Error> {
        if let Some(kind) = self.write_error {
            return Err(io::Error::from(kind));
        }

        if !buf.is_empty() && self.out_allow == 0 {
            return Err(io::Error::from(io::ErrorKind::WouldBlock));
        }

        let size = cmp::min(buf.len(), self.out_allow);
        let buf = &buf[..size];

        self.outbuf.extend_from_slice(buf);
        self.out_allow -= size;

        Ok(buf.len())
    }

    fn flush(&mut self) -> Result<(), io::Error> {
        Ok(())
    }
}

// handle to a shared FakeSock. the test keeps another handle, so it can
// tell the socket was closed once its own handle is the only one left
pub struct FakeStream {
    pub inner: Rc<RefCell<FakeSock>>,
}

impl FakeStream {
    pub fn new(inner: Rc<RefCell<FakeSock>>) -> Self {
        Self { inner }
    }
}

impl Read for FakeStream {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, io::Error> {
        self.inner.borrow_mut().read(buf)
    }
}

impl Write for FakeStream {
    fn write(&mut self, buf: &[u8]) -> Result<usize, io::Error> {
        self.inner.borrow_mut().write(buf)
    }

    fn flush(&mut self) -> Result<(), io::Error> {
        self.inner.borrow_mut().flush()
    }
}

pub fn is_closed(sock: &Rc<RefCell<FakeSock>>) -> bool {
    Rc::strong_count(sock) == 1
}

#[derive(Clone)]
pub struct FakeListener {
    pending: Rc<RefCell<VecDeque<Rc<RefCell<FakeSock>>>>>,
    error: Rc<RefCell<Option<io::ErrorKind>>>,
}

impl FakeListener {
    pub fn new() -> Self {
        Self {
            pending: Rc::new(RefCell::new(VecDeque::new())),
            error: Rc::new(RefCell::new(None)),
        }
    }

    // queue a client connection and return the server side of it
    pub fn connect(&self) -> Rc<RefCell<FakeSock>> {
        let sock = Rc::new(RefCell::new(FakeSock::new()));

        self.pending.borrow_mut().push_back(Rc::clone(&sock));

        sock
    }

    pub fn pending(&self) -> usize {
        self.pending.borrow().len()
    }

    pub fn set_error(&self, kind: io::ErrorKind) {
        *self.error.borrow_mut() = Some(kind);
    }
}

impl Accept for FakeListener {
    type Stream = FakeStream;

    fn accept(&mut self) -> Result<(Self::Stream, SocketAddr), io::Error> {
        if let Some(kind) = self.error.borrow_mut().take() {
            return Err(io::Error::from(kind));
        }

        match self.pending.borrow_mut().pop_front() {
            Some(sock) => {
                let addr = SocketAddr::from(([127, 0, 0, 1], 50000));

                Ok((FakeStream::new(sock), addr))
            }
            None => Err(io::Error::from(io::ErrorKind::WouldBlock)),
        }
    }

    fn local_addr(&self) -> Result<SocketAddr, io::Error> {
        Ok(SocketAddr::from(([127, 0, 0, 1], 80)))
    }
}
