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

use log::{Level, LevelFilter, Log, Metadata, Record, SetLoggerError};
use std::fmt;
use std::fs::File;
use std::io::{self, Write};
use std::sync::{Mutex, OnceLock};
use time::macros::format_description;
use time::{OffsetDateTime, UtcOffset};

enum SharedOutput<'a> {
    Stdout(io::Stdout),
    File(&'a Mutex<File>),
}

impl Write for SharedOutput<'_> {
    fn write(&mut self, buf: &[u8]) -> Result<usize, io::Error> {
        match self {
            Self::Stdout(g) => g.write(buf),
            Self::File(g) => g.lock().unwrap_or_else(|e| e.into_inner()).write(buf),
        }
    }

    fn flush(&mut self) -> Result<(), io::Error> {
        match self {
            Self::Stdout(g) => g.flush(),
            Self::File(g) => g.lock().unwrap_or_else(|e| e.into_inner()).flush(),
        }
    }
}

pub fn level_filter(level: u8) -> LevelFilter {
    match level {
        0 => LevelFilter::Error,
        1 => LevelFilter::Warn,
        2 => LevelFilter::Info,
        3 => LevelFilter::Debug,
        4..=u8::MAX => LevelFilter::Trace,
    }
}

fn level_name(level: Level) -> &'static str {
    match level {
        Level::Error => "ERR",
        Level::Warn => "WARN",
        Level::Info => "INFO",
        Level::Debug => "DEBUG",
        Level::Trace => "TRACE",
    }
}

// write one log line. a timestamp that can't be formatted is left out
// rather than dropping the line
fn write_line<W: Write>(
    out: &mut W,
    now: OffsetDateTime,
    level: Level,
    target: &str,
    args: &fmt::Arguments,
) -> Result<(), io::Error> {
    let format =
        format_description!("[year]-[month]-[day] [hour]:[minute]:[second].[subsecond digits:3]");

    let ts = now.format(&format).unwrap_or_default();

    writeln!(out, "[{}] {} [{}] {}", level_name(level), ts, target, args)
}

pub struct SimpleLogger {
    local_offset: Option<UtcOffset>,
    output_file: Option<Mutex<File>>,
}

impl Log for SimpleLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }

        let mut output = match &self.output_file {
            Some(f) => SharedOutput::File(f),
            None => SharedOutput::Stdout(io::stdout()),
        };

        let now = OffsetDateTime::now_utc().to_offset(self.local_offset.unwrap_or(UtcOffset::UTC));

        // nowhere to report a failure to log
        let _ = write_line(
            &mut output,
            now,
            record.level(),
            record.target(),
            record.args(),
        );
    }

    fn flush(&self) {
        let mut output = match &self.output_file {
            Some(f) => SharedOutput::File(f),
            None => SharedOutput::Stdout(io::stdout()),
        };

        let _ = output.flush();
    }
}

static LOGGER: OnceLock<SimpleLogger> = OnceLock::new();

pub fn ensure_init_simple_logger(output_file: Option<File>) -> &'static SimpleLogger {
    LOGGER.get_or_init(|| SimpleLogger {
        // fails if the platform can't determine it safely, e.g. when more
        // than one thread is running
        local_offset: UtcOffset::current_local_offset().ok(),
        output_file: output_file.map(Mutex::new),
    })
}

pub fn get_simple_logger() -> &'static SimpleLogger {
    ensure_init_simple_logger(None)
}

/// Install the simple logger as the global logger.
///
/// Call early, before any threads are started, so the local time offset can
/// be determined.
pub fn init(output_file: Option<File>, level: u8) -> Result<(), SetLoggerError> {
    log::set_logger(ensure_init_simple_logger(output_file))?;
    log::set_max_level(level_filter(level));

    local_offset_check();

    Ok(())
}

pub fn local_offset_check() {
    if get_simple_logger().local_offset.is_none() {
        log::warn!("Failed to determine local time offset. Log timestamps will be in UTC.");
    }
}
