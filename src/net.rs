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

use log::error;
use mio::net::{TcpListener, TcpStream};
use socket2::{Domain, Protocol, Socket, Type};
use std::io::{self, Read, Write};
use std::net::SocketAddr;

/// A listening socket that can hand out connections without blocking.
///
/// `accept` must return [`io::ErrorKind::WouldBlock`] when no connection
/// is pending.
pub trait Accept {
    type Stream: Read + Write;

    fn accept(&mut self) -> Result<(Self::Stream, SocketAddr), io::Error>;

    fn local_addr(&self) -> Result<SocketAddr, io::Error>;
}

pub fn set_socket_opts(stream: &mut TcpStream) {
    if let Err(e) = stream.set_nodelay(true) {
        error!("set nodelay failed: {:?}", e);
    }
}

impl Accept for TcpListener {
    type Stream = TcpStream;

    fn accept(&mut self) -> Result<(Self::Stream, SocketAddr), io::Error> {
        let (mut stream, peer_addr) = TcpListener::accept(self)?;

        set_socket_opts(&mut stream);

        Ok((stream, peer_addr))
    }

    fn local_addr(&self) -> Result<SocketAddr, io::Error> {
        TcpListener::local_addr(self)
    }
}

/// Create a non-blocking listening socket bound to `addr`.
///
/// `backlog` is passed to listen(2), and is normally the same as the
/// connection limit of the server that will own the socket.
pub fn bind_listener(addr: SocketAddr, backlog: usize) -> Result<TcpListener, io::Error> {
    let socket = Socket::new(Domain::for_address(addr), Type::STREAM, Some(Protocol::TCP))?;

    // allow quick restarts
    socket.set_reuse_address(true)?;

    socket.bind(&addr.into())?;
    socket.listen(backlog.min(i32::MAX as usize) as i32)?;
    socket.set_nonblocking(true)?;

    let listener: std::net::TcpListener = socket.into();

    Ok(TcpListener::from_std(listener))
}
