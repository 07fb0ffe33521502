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

//! Fixed-size buffering over a non-blocking byte transport.
//!
//! Reads and writes are expressed as operations ([`ReadOp`], [`WriteOp`])
//! that are advanced one poll at a time. A poll never blocks: if the
//! transport is not ready the poll returns a pending status and the caller
//! is expected to try again later, at which point the operation continues
//! exactly where it left off.

use std::cmp;
use std::io::{self, Read, Write};

pub fn is_not_ready(e: &io::Error) -> bool {
    matches!(
        e.kind(),
        io::ErrorKind::WouldBlock | io::ErrorKind::Interrupted
    )
}

pub struct Buffer {
    buf: Vec<u8>,
    start: usize,
    end: usize,
}

#[allow(clippy::len_without_is_empty)]
impl Buffer {
    pub fn new(size: usize) -> Buffer {
        assert!(size > 0);

        Buffer {
            buf: vec![0; size],
            start: 0,
            end: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.buf.len()
    }

    pub fn clear(&mut self) {
        self.start = 0;
        self.end = 0;
    }

    pub fn read_avail(&self) -> usize {
        self.end - self.start
    }

    pub fn read_buf(&self) -> &[u8] {
        &self.buf[self.start..self.end]
    }

    // consume up to amount bytes and return them
    pub fn take(&mut self, amount: usize) -> &[u8] {
        let amount = cmp::min(amount, self.read_avail());
        let start = self.start;

        self.start += amount;

        &self.buf[start..self.start]
    }

    pub fn write_buf(&mut self) -> &mut [u8] {
        let len = self.buf.len();

        &mut self.buf[self.end..len]
    }

    pub fn write_commit(&mut self, amount: usize) {
        assert!(self.end + amount <= self.buf.len());

        self.end += amount;
    }
}

/// Outcome of polling a [`ReadOp`].
#[derive(Debug, PartialEq)]
pub enum ReadStatus<'a> {
    /// A chunk of data. Never empty.
    Data(&'a [u8]),

    /// No data is available right now. Poll again later.
    Pending,

    /// The operation is over, either satisfied or cut short by EOF.
    Done,
}

/// A resumable read of up to `max` bytes, optionally ending early right
/// after a stop byte.
#[derive(Debug)]
pub struct ReadOp {
    remaining: usize,
    stop_byte: Option<u8>,
    finished: bool,
    eof: bool,
}

impl ReadOp {
    pub fn new(max: usize, stop_byte: Option<u8>) -> Self {
        Self {
            remaining: max,
            stop_byte,
            finished: false,
            eof: false,
        }
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Returns true if the transport reached EOF before the read was satisfied.
    pub fn hit_eof(&self) -> bool {
        self.eof
    }
}

#[derive(Debug, PartialEq, Clone, Copy)]
pub enum WriteStatus {
    Pending,
    Done,
}

/// A resumable write of a complete payload.
#[derive(Debug)]
pub struct WriteOp {
    data: Vec<u8>,
    sent: usize,
}

impl WriteOp {
    pub fn new(data: Vec<u8>) -> Self {
        Self { data, sent: 0 }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn sent(&self) -> usize {
        self.sent
    }

    pub fn is_finished(&self) -> bool {
        self.sent >= self.data.len()
    }
}

pub struct BufferedStream<S> {
    inner: S,
    buf: Buffer,
}

impl<S: Read + Write> BufferedStream<S> {
    pub fn new(inner: S, buffer_size: usize) -> Self {
        Self {
            inner,
            buf: Buffer::new(buffer_size),
        }
    }

    pub fn get_ref(&self) -> &S {
        &self.inner
    }

    pub fn get_mut(&mut self) -> &mut S {
        &mut self.inner
    }

    pub fn into_inner(self) -> S {
        self.inner
    }

    /// Number of received bytes not yet handed out by a read.
    pub fn buffered(&self) -> usize {
        self.buf.read_avail()
    }

    /// Start a read of up to `max` bytes, ending early after `stop_byte`.
    pub fn read(&self, max: usize, stop_byte: Option<u8>) -> ReadOp {
        ReadOp::new(max, stop_byte)
    }

    /// Start a write of `data`.
    pub fn write(&self, data: Vec<u8>) -> WriteOp {
        WriteOp::new(data)
    }

    /// Advance a read by one step.
    ///
    /// Buffered bytes are handed out first. Only once the buffer is empty is
    /// the transport read from, and the freshly received bytes are handed out
    /// on the following poll. A transport that is not ready yields
    /// [`ReadStatus::Pending`]. Any other transport error is returned.
    pub fn poll_read<'a>(&'a mut self, op: &mut ReadOp) -> Result<ReadStatus<'a>, io::Error> {
        if op.finished {
            return Ok(ReadStatus::Done);
        }

        if op.remaining == 0 {
            op.finished = true;

            return Ok(ReadStatus::Done);
        }

        if self.buf.read_avail() > 0 {
            let avail = self.buf.read_buf();
            let mut size = cmp::min(avail.len(), op.remaining);

            let mut stopped = false;

            if let Some(stop_byte) = op.stop_byte {
                if let Some(pos) = avail[..size].iter().position(|&b| b == stop_byte) {
                    size = pos + 1;
                    stopped = true;
                }
            }

            op.remaining -= size;

            if stopped || op.remaining == 0 {
                op.finished = true;
            }

            return Ok(ReadStatus::Data(self.buf.take(size)));
        }

        // buffer exhausted. refill from the start
        self.buf.clear();

        match self.inner.read(self.buf.write_buf()) {
            Ok(0) => {
                op.finished = true;
                op.eof = true;

                Ok(ReadStatus::Done)
            }
            Ok(size) => {
                self.buf.write_commit(size);

                Ok(ReadStatus::Pending)
            }
            Err(e) if is_not_ready(&e) => Ok(ReadStatus::Pending),
            Err(e) => Err(e),
        }
    }

    /// Advance a write by one send attempt, resuming from the last offset.
    pub fn poll_write(&mut self, op: &mut WriteOp) -> Result<WriteStatus, io::Error> {
        if op.is_finished() {
            return Ok(WriteStatus::Done);
        }

        match self.inner.write(&op.data[op.sent..]) {
            Ok(0) => Err(io::Error::from(io::ErrorKind::WriteZero)),
            Ok(size) => {
                op.sent += size;

                if op.is_finished() {
                    Ok(WriteStatus::Done)
                } else {
                    Ok(WriteStatus::Pending)
                }
            }
            Err(e) if is_not_ready(&e) => Ok(WriteStatus::Pending),
            Err(e) => Err(e),
        }
    }
}
