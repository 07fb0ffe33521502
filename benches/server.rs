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

use biplane::connection::{Connection, Step};
use biplane::http1::{Headers, Limits, Response};
use biplane::net::bind_listener;
use biplane::router::Router;
use biplane::server::{Config, Server};
use criterion::{criterion_group, criterion_main, Criterion};
use std::cmp;
use std::io::{self, Read, Write};
use std::net::{SocketAddr, TcpStream};
use std::str;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc};
use std::thread;
use std::time::{Duration, Instant};

const REQ: &[u8] = b"POST /hello?a=1 HTTP/1.1\r\n\
                     Host: example.com\r\n\
                     User-Agent: bench\r\n\
                     Content-Type: text/plain\r\n\
                     Content-Length: 5\r\n\
                     \r\n\
                     world";

const RESP: &str = "HTTP/1.1 200 OK\r\n\
                    content-length: 6\r\n\
                    content-type: text/plain\r\n\
                    \r\n\
                    world\n";

// in-memory stream that hands out at most `chunk` bytes per read
struct MemStream {
    input: Vec<u8>,
    pos: usize,
    chunk: usize,
    output: Vec<u8>,
}

impl Read for MemStream {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, io::Error> {
        let size = cmp::min(cmp::min(buf.len(), self.chunk), self.input.len() - self.pos);

        buf[..size].copy_from_slice(&self.input[self.pos..(self.pos + size)]);
        self.pos += size;

        Ok(size)
    }
}

impl Write for MemStream {
    fn write(&mut self, buf: &[u8]) -> Result<usize, io::Error> {
        self.output.extend_from_slice(buf);

        Ok(buf.len())
    }

    fn flush(&mut self) -> Result<(), io::Error> {
        Ok(())
    }
}

fn router() -> Router {
    let mut router = Router::new();

    router.add("/hello", "POST", |_: &str, _: &Headers, body: &[u8]| {
        let mut out = body.to_vec();
        out.push(b'\n');

        Response::new(out)
    });

    router
}

fn connection(chunk: usize, buffer_size: usize) -> Connection<MemStream> {
    let stream = MemStream {
        input: REQ.to_vec(),
        pos: 0,
        chunk,
        output: Vec::new(),
    };

    Connection::new(
        0,
        stream,
        SocketAddr::from(([127, 0, 0, 1], 50000)),
        Instant::now(),
        buffer_size,
        Limits::default(),
    )
}

fn run_connection(c: &mut Connection<MemStream>, router: &Router) {
    while c.step(router).unwrap() == Step::Pending {}

    assert_eq!(str::from_utf8(&c.get_ref().output).unwrap(), RESP);
}

fn req(addr: SocketAddr) {
    let mut client = TcpStream::connect(addr).unwrap();

    client.write_all(REQ).unwrap();

    let mut resp = Vec::new();
    client.read_to_end(&mut resp).unwrap();

    assert_eq!(str::from_utf8(&resp).unwrap(), RESP);
}

fn criterion_benchmark(c: &mut Criterion) {
    let router = router();

    c.bench_function("req_connection", |b| {
        b.iter_batched_ref(
            || connection(usize::MAX, 1024),
            |i| run_connection(i, &router),
            criterion::BatchSize::SmallInput,
        )
    });

    c.bench_function("req_connection trickle", |b| {
        b.iter_batched_ref(
            || connection(3, 16),
            |i| run_connection(i, &router),
            criterion::BatchSize::SmallInput,
        )
    });

    {
        let stop = Arc::new(AtomicBool::new(false));
        let (addr_tx, addr_rx) = mpsc::channel();

        let server_thread = {
            let stop = Arc::clone(&stop);

            thread::spawn(move || {
                let listener = bind_listener(SocketAddr::from(([127, 0, 0, 1], 0)), 16).unwrap();
                addr_tx.send(listener.local_addr().unwrap()).unwrap();

                let config = Config {
                    connections_max: 16,
                    ..Default::default()
                };

                let mut server = Server::new(listener, router(), config);
                server.run(&stop, Duration::from_micros(50)).unwrap();
            })
        };

        let addr = addr_rx.recv().unwrap();

        c.bench_function("req_server", |b| b.iter(|| req(addr)));

        stop.store(true, Ordering::Relaxed);
        server_thread.join().unwrap();
    }
}

criterion_group!(benches, criterion_benchmark);
criterion_main!(benches);
