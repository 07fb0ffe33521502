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

pub mod buffer;
pub mod cliargs;
pub mod config;
pub mod connection;
pub mod http1;
pub mod log;
pub mod net;
pub mod router;
pub mod server;

#[cfg(test)]
mod testutil;

use crate::config::Settings;
use crate::router::Router;
use crate::server::Server;
use ::log::info;
use std::error::Error;
use std::sync::atomic::AtomicBool;
use std::time::Duration;

const IDLE_INTERVAL: Duration = Duration::from_millis(10);

/// Bind the configured address and serve `router` until `stop` is set.
pub fn run(settings: &Settings, router: Router, stop: &AtomicBool) -> Result<(), Box<dyn Error>> {
    let config = settings.server_config();

    let listener = net::bind_listener(settings.listen_addr()?, config.connections_max)?;

    let mut server = Server::new(listener, router, config);

    info!("started");

    server.run(stop, IDLE_INTERVAL)?;

    info!("stopped");

    Ok(())
}
