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

use crate::config::{self, Settings};
use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "biplane",
    version,
    about = "Cooperative single-threaded HTTP/1.1 server."
)]
pub struct CliArgs {
    /// Set path to the configuration file
    #[arg(short, long, value_name = "file")]
    pub config_file: Option<PathBuf>,

    /// Set path to the log file
    #[arg(short = 'l', long, value_name = "file")]
    pub log_file: Option<PathBuf>,

    /// Set log level (0=error, 1=warn, 2=info, 3=debug, 4=trace)
    #[arg(short = 'L', long, value_name = "x", default_value_t = 2, value_parser = clap::value_parser!(u8).range(0..=4))]
    pub log_level: u8,

    /// Override the listen address from the configuration file
    #[arg(long, value_name = "addr")]
    pub listen: Option<String>,
}

impl CliArgs {
    /// Load settings from the configuration file, if any, and apply
    /// overrides given on the command line.
    pub fn settings(&self) -> Result<Settings, config::Error> {
        let mut settings = Settings::load(self.config_file.as_deref())?;

        if let Some(listen) = &self.listen {
            settings.server.listen = listen.clone();
            settings.validate()?;
        }

        Ok(settings)
    }
}
