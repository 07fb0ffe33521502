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

use crate::buffer::{BufferedStream, WriteOp, WriteStatus};
use crate::http1::{self, Limits, ParseStatus, RequestParser, Response};
use crate::router::Router;
use log::debug;
use std::io::{self, Read, Write};
use std::net::SocketAddr;
use std::time::{Duration, Instant};

#[derive(Debug, PartialEq, Clone, Copy)]
pub enum Step {
    // keep the connection and step it again next tick
    Pending,

    // the exchange is over and the connection should be closed
    Done,
}

enum Mode {
    Receiving(RequestParser),
    Sending(WriteOp),
    Finished,
}

/// A single request/response exchange on an accepted socket.
///
/// Dropping a connection closes its socket.
pub struct Connection<S> {
    id: usize,
    peer_addr: SocketAddr,
    accepted: Instant,
    stream: BufferedStream<S>,
    mode: Mode,
}

impl<S: Read + Write> Connection<S> {
    pub fn new(
        id: usize,
        stream: S,
        peer_addr: SocketAddr,
        accepted: Instant,
        buffer_size: usize,
        limits: Limits,
    ) -> Self {
        Self {
            id,
            peer_addr,
            accepted,
            stream: BufferedStream::new(stream, buffer_size),
            mode: Mode::Receiving(RequestParser::new(limits)),
        }
    }

    pub fn id(&self) -> usize {
        self.id
    }

    pub fn peer_addr(&self) -> SocketAddr {
        self.peer_addr
    }

    pub fn accepted(&self) -> Instant {
        self.accepted
    }

    pub fn get_ref(&self) -> &S {
        self.stream.get_ref()
    }

    pub fn is_expired(&self, now: Instant, timeout: Duration) -> bool {
        now.saturating_duration_since(self.accepted) > timeout
    }

    /// Advance the exchange by one step.
    ///
    /// Malformed, oversized or truncated requests end the exchange without
    /// a response. Transport errors are returned.
    pub fn step(&mut self, router: &Router) -> Result<Step, io::Error> {
        match &mut self.mode {
            Mode::Receiving(parser) => {
                let resp = match parser.step(&mut self.stream) {
                    Ok(ParseStatus::Pending) => return Ok(Step::Pending),
                    Ok(ParseStatus::Complete(req)) => {
                        debug!(
                            "conn {}: request {} {} ({} headers, {} body bytes)",
                            self.id,
                            req.method(),
                            req.target(),
                            req.headers().len(),
                            req.body().len()
                        );

                        router.dispatch(&req)
                    }
                    Ok(ParseStatus::BodyTooLarge(len)) => {
                        debug!("conn {}: body too large ({} bytes)", self.id, len);

                        Response::new("Content Too Large").with_status(413)
                    }
                    Err(http1::Error::Io(e)) => return Err(e),
                    Err(e) => {
                        debug!("conn {}: giving up on request: {}", self.id, e);

                        self.mode = Mode::Finished;

                        return Ok(Step::Done);
                    }
                };

                debug!(
                    "conn {}: response status {}, sending {} bytes",
                    self.id,
                    resp.status(),
                    resp.body().len()
                );

                self.mode = Mode::Sending(self.stream.write(resp.serialize()));

                Ok(Step::Pending)
            }
            Mode::Sending(op) => match self.stream.poll_write(op)? {
                WriteStatus::Pending => Ok(Step::Pending),
                WriteStatus::Done => {
                    debug!("conn {}: response sent", self.id);

                    self.mode = Mode::Finished;

                    Ok(Step::Done)
                }
            },
            Mode::Finished => Ok(Step::Done),
        }
    }
}
