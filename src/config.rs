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

use crate::server;
use config::{Config, ConfigError, Environment, File, FileFormat, Source};
use serde::Deserialize;
use std::collections::HashMap;
use std::convert::TryFrom;
use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;

// e.g. BIPLANE_SERVER__MAX_BODY_BYTES=1024
pub const ENV_PREFIX: &str = "BIPLANE";

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("invalid listen address: {0}")]
    InvalidListenAddress(String),

    #[error("{0} must be greater than zero")]
    InvalidLimit(&'static str),
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ServerSettings {
    pub listen: String,
    pub max_request_line_bytes: u64,
    pub max_header_count: u64,
    pub max_body_bytes: u64,
    pub request_timeout_seconds: u64,
    pub max_parallel_connections: u64,
    pub buffer_size: u64,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            listen: String::from("0.0.0.0:8080"),
            max_request_line_bytes: 4096,
            max_header_count: 50,
            max_body_bytes: 65536,
            request_timeout_seconds: 10,
            max_parallel_connections: 5,
            buffer_size: 1024,
        }
    }
}

impl From<ServerSettings> for config::ValueKind {
    fn from(server: ServerSettings) -> Self {
        let mut properties = HashMap::new();
        properties.insert("listen".to_string(), config::Value::from(server.listen));
        properties.insert(
            "max_request_line_bytes".to_string(),
            config::Value::from(server.max_request_line_bytes),
        );
        properties.insert(
            "max_header_count".to_string(),
            config::Value::from(server.max_header_count),
        );
        properties.insert(
            "max_body_bytes".to_string(),
            config::Value::from(server.max_body_bytes),
        );
        properties.insert(
            "request_timeout_seconds".to_string(),
            config::Value::from(server.request_timeout_seconds),
        );
        properties.insert(
            "max_parallel_connections".to_string(),
            config::Value::from(server.max_parallel_connections),
        );
        properties.insert(
            "buffer_size".to_string(),
            config::Value::from(server.buffer_size),
        );

        Self::Table(properties)
    }
}

fn to_usize(v: u64) -> usize {
    usize::try_from(v).unwrap_or(usize::MAX)
}

/// Settings read from an INI file with a `[server]` section. Any value may
/// be overridden by the environment.
#[derive(Debug, Clone, PartialEq, Deserialize, Default)]
pub struct Settings {
    pub server: ServerSettings,
}

impl Settings {
    /// Load settings from `config_file` if given, falling back to defaults
    /// for anything it does not set.
    pub fn load(config_file: Option<&Path>) -> Result<Self, Error> {
        let file = config_file.map(|path| File::from(path).format(FileFormat::Ini));

        Self::build(file, ENV_PREFIX)
    }

    pub fn from_ini_str(s: &str) -> Result<Self, Error> {
        Self::build(Some(File::from_str(s, FileFormat::Ini)), ENV_PREFIX)
    }

    fn build<T>(source: Option<T>, env_prefix: &str) -> Result<Self, Error>
    where
        T: Source + Send + Sync + 'static,
    {
        let mut builder = Config::builder().set_default("server", ServerSettings::default())?;

        if let Some(source) = source {
            builder = builder.add_source(source);
        }

        let settings: Self = builder
            .add_source(
                Environment::with_prefix(env_prefix)
                    .prefix_separator("_")
                    .separator("__"),
            )
            .build()?
            .try_deserialize()?;

        settings.validate()?;

        Ok(settings)
    }

    pub fn validate(&self) -> Result<(), Error> {
        let s = &self.server;

        self.listen_addr()?;

        if s.max_request_line_bytes == 0 {
            return Err(Error::InvalidLimit("max_request_line_bytes"));
        }

        if s.max_parallel_connections == 0 {
            return Err(Error::InvalidLimit("max_parallel_connections"));
        }

        if s.buffer_size == 0 {
            return Err(Error::InvalidLimit("buffer_size"));
        }

        Ok(())
    }

    pub fn listen_addr(&self) -> Result<SocketAddr, Error> {
        self.server
            .listen
            .parse()
            .map_err(|_| Error::InvalidListenAddress(self.server.listen.clone()))
    }

    pub fn server_config(&self) -> server::Config {
        let s = &self.server;

        server::Config {
            request_line_max: to_usize(s.max_request_line_bytes),
            headers_max: to_usize(s.max_header_count),
            body_max: to_usize(s.max_body_bytes),
            request_timeout: Duration::from_secs(s.request_timeout_seconds),
            connections_max: to_usize(s.max_parallel_connections),
            buffer_size: to_usize(s.buffer_size),
        }
    }
}
