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

use crate::buffer::is_not_ready;
use crate::connection::{Connection, Step};
use crate::http1::Limits;
use crate::net::Accept;
use crate::router::Router;
use log::{debug, error, info};
use std::io;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub request_line_max: usize,
    pub headers_max: usize,
    pub body_max: usize,

    // measured from accept, regardless of progress
    pub request_timeout: Duration,

    pub connections_max: usize,
    pub buffer_size: usize,
}

impl Config {
    pub fn limits(&self) -> Limits {
        Limits {
            request_line_max: self.request_line_max,
            headers_max: self.headers_max,
            body_max: self.body_max,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        let limits = Limits::default();

        Self {
            request_line_max: limits.request_line_max,
            headers_max: limits.headers_max,
            body_max: limits.body_max,
            request_timeout: Duration::from_secs(10),
            connections_max: 5,
            buffer_size: 1024,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("accept failed: {0}")]
    Accept(#[source] io::Error),

    #[error("connection {id} failed: {source}")]
    Connection { id: usize, source: io::Error },
}

// errors that mean the peer went away. these end the connection quietly
pub fn is_expected_close(kind: io::ErrorKind) -> bool {
    matches!(
        kind,
        io::ErrorKind::ConnectionReset
            | io::ErrorKind::NotConnected
            | io::ErrorKind::BrokenPipe
            | io::ErrorKind::ConnectionAborted
            | io::ErrorKind::UnexpectedEof
    )
}

/// Cooperative HTTP/1.1 server.
///
/// The server owns the listener and every in-flight connection. Nothing
/// happens unless the owner calls [`Server::tick`], which accepts at most one
/// connection and advances each active connection by one step, in the order
/// they were accepted. No call ever waits on the network.
pub struct Server<L: Accept> {
    listener: L,
    router: Router,
    config: Config,
    conns: Vec<Connection<L::Stream>>,
    next_id: usize,
}

impl<L: Accept> Server<L> {
    pub fn new(listener: L, router: Router, config: Config) -> Self {
        let conns = Vec::with_capacity(config.connections_max);

        Self {
            listener,
            router,
            config,
            conns,
            next_id: 0,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn router(&self) -> &Router {
        &self.router
    }

    pub fn active_connections(&self) -> usize {
        self.conns.len()
    }

    pub fn local_addr(&self) -> Result<SocketAddr, io::Error> {
        self.listener.local_addr()
    }

    pub fn tick(&mut self) -> Result<(), Error> {
        self.tick_at(Instant::now())
    }

    /// Run one scheduling pass as of `now`.
    ///
    /// Every active connection is visited even if an earlier one failed.
    /// The first unexpected failure is returned after the pass completes.
    pub fn tick_at(&mut self, now: Instant) -> Result<(), Error> {
        let mut result = Ok(());

        if self.conns.len() < self.config.connections_max {
            if let Err(e) = self.accept(now) {
                result = Err(e);
            }
        }

        let router = &self.router;
        let timeout = self.config.request_timeout;

        self.conns.retain_mut(|c| {
            let id = c.id();

            if c.is_expired(now, timeout) {
                debug!("conn {}: timed out", id);

                return false;
            }

            match c.step(router) {
                Ok(Step::Pending) => true,
                Ok(Step::Done) => {
                    debug!("conn {}: closing", id);

                    false
                }
                Err(e) if is_expected_close(e.kind()) => {
                    debug!("conn {}: peer closed: {}", id, e);

                    false
                }
                Err(e) => {
                    error!("conn {}: io error: {:?}", id, e);

                    if result.is_ok() {
                        result = Err(Error::Connection { id, source: e });
                    }

                    false
                }
            }
        });

        result
    }

    /// Tick until `stop` is set.
    ///
    /// The loop sleeps for `idle_interval` between ticks while no connection
    /// is active. Connection failures are logged and serving continues.
    /// Accept failures are returned.
    pub fn run(&mut self, stop: &AtomicBool, idle_interval: Duration) -> Result<(), Error> {
        info!("serving on {:?}", self.local_addr());

        while !stop.load(Ordering::Relaxed) {
            match self.tick() {
                Ok(()) | Err(Error::Connection { .. }) => {}
                Err(e) => return Err(e),
            }

            if self.conns.is_empty() {
                thread::sleep(idle_interval);
            } else {
                thread::yield_now();
            }
        }

        info!("stopping with {} active connections", self.conns.len());

        Ok(())
    }

    fn accept(&mut self, now: Instant) -> Result<(), Error> {
        let (stream, peer_addr) = match self.listener.accept() {
            Ok(ret) => ret,
            Err(e) if is_not_ready(&e) => return Ok(()),
            Err(e) => {
                error!("accept failed: {:?}", e);

                return Err(Error::Accept(e));
            }
        };

        let id = self.next_id;
        self.next_id = self.next_id.wrapping_add(1);

        debug!("conn {}: accepted from {}", id, peer_addr);

        self.conns.push(Connection::new(
            id,
            stream,
            peer_addr,
            now,
            self.config.buffer_size,
            self.config.limits(),
        ));

        Ok(())
    }
}
