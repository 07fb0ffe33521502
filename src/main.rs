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

use biplane::cliargs::CliArgs;
use biplane::http1::{Headers, Response};
use biplane::router::Router;
use clap::Parser;
use log::error;
use signal_hook::consts::TERM_SIGNALS;
use std::fs::OpenOptions;
use std::process;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

fn demo_router() -> Router {
    let mut router = Router::new();

    router
        .add("/", "GET", |_: &str, _: &Headers, _: &[u8]| {
            Response::new("Hello from biplane\n")
        })
        .add("/echo", "POST", |_: &str, headers: &Headers, body: &[u8]| {
            let resp = Response::new(body);

            match headers.get("content-type") {
                Some(ctype) => resp.with_content_type(ctype),
                None => resp,
            }
        });

    router
}

fn main() {
    let args = CliArgs::parse();

    let log_file = match &args.log_file {
        Some(path) => match OpenOptions::new().create(true).append(true).open(path) {
            Ok(f) => Some(f),
            Err(e) => {
                eprintln!("failed to open log file {}: {}", path.display(), e);
                process::exit(1);
            }
        },
        None => None,
    };

    if let Err(e) = biplane::log::init(log_file, args.log_level) {
        eprintln!("failed to initialize logging: {}", e);
        process::exit(1);
    }

    let settings = match args.settings() {
        Ok(settings) => settings,
        Err(e) => {
            error!("failed to load configuration: {}", e);
            process::exit(1);
        }
    };

    let stop = Arc::new(AtomicBool::new(false));

    // a second term signal while stopping exits immediately
    for signal_type in TERM_SIGNALS {
        let ret = signal_hook::flag::register_conditional_shutdown(
            *signal_type,
            1, // exit code
            Arc::clone(&stop),
        )
        .and_then(|_| signal_hook::flag::register(*signal_type, Arc::clone(&stop)));

        if let Err(e) = ret {
            error!("failed to register signal handler: {}", e);
            process::exit(1);
        }
    }

    if let Err(e) = biplane::run(&settings, demo_router(), &stop) {
        error!("{}", e);
        process::exit(1);
    }
}
