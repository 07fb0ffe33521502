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

use super::message::{Headers, Request};
use super::util::{parse_content_length, CRLF};
use crate::buffer::{BufferedStream, ReadOp, ReadStatus};
use std::io::{self, Read, Write};
use std::mem;
use std::str;

#[derive(Debug, PartialEq, Clone, Copy)]
pub struct Limits {
    // applies to the start line and to each header line
    pub request_line_max: usize,
    pub headers_max: usize,
    pub body_max: usize,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            request_line_max: 4096,
            headers_max: 50,
            body_max: 65536,
        }
    }
}

#[derive(Debug, PartialEq, Clone, Copy)]
pub enum State {
    // call: step
    // next: StartLine, Headers, Aborted
    StartLine,

    // call: step
    // next: Headers, Body, Done, Aborted
    Headers,

    // call: step
    // next: Body, Done, Aborted
    Body,

    // request has been handed off
    Done,

    // input was malformed, oversized or cut short
    Aborted,
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("line too long")]
    LineTooLong,

    #[error("malformed start line")]
    MalformedStartLine,

    #[error("malformed header")]
    MalformedHeader,

    #[error("too many headers")]
    TooManyHeaders,

    #[error("invalid content length")]
    InvalidContentLength,

    #[error("connection closed before request was complete")]
    Truncated,

    #[error(transparent)]
    Io(#[from] io::Error),
}

#[derive(Debug, PartialEq)]
pub enum ParseStatus {
    // more input needed. step again later
    Pending,

    Complete(Request),

    // declared content length exceeds the limit. the body was not read
    BodyTooLarge(usize),
}

/// Incremental request parser.
///
/// The parser is driven by repeated calls to [`RequestParser::step`], each
/// of which performs at most one read poll on the stream. It never waits for
/// input, so a request that arrives a few bytes at a time is parsed over as
/// many steps as it takes.
pub struct RequestParser {
    limits: Limits,
    state: State,
    read: Option<ReadOp>,
    line: Vec<u8>,
    method: String,
    target: String,
    headers: Headers,
    header_lines: usize,
    content_length: usize,
    body: Vec<u8>,
}

impl RequestParser {
    pub fn new(limits: Limits) -> Self {
        Self {
            limits,
            state: State::StartLine,
            read: None,
            line: Vec::new(),
            method: String::new(),
            target: String::new(),
            headers: Headers::new(),
            header_lines: 0,
            content_length: 0,
            body: Vec::new(),
        }
    }

    pub fn state(&self) -> State {
        self.state
    }

    pub fn is_finished(&self) -> bool {
        matches!(self.state, State::Done | State::Aborted)
    }

    /// Advance the parser by one step.
    ///
    /// Once a request is complete, or the body is found to be too large,
    /// the parser is `Done`. On error it is `Aborted`. Stepping a finished
    /// parser is a bug.
    pub fn step<S: Read + Write>(
        &mut self,
        stream: &mut BufferedStream<S>,
    ) -> Result<ParseStatus, Error> {
        assert!(!self.is_finished());

        match self.process(stream) {
            Ok(status) => Ok(status),
            Err(e) => {
                self.state = State::Aborted;
                self.read = None;

                Err(e)
            }
        }
    }

    fn process<S: Read + Write>(
        &mut self,
        stream: &mut BufferedStream<S>,
    ) -> Result<ParseStatus, Error> {
        match self.state {
            State::StartLine => {
                if !self.poll_line(stream)? {
                    return Ok(ParseStatus::Pending);
                }

                let line = mem::take(&mut self.line);
                let (method, target) = parse_start_line(&line)?;

                self.method = method;
                self.target = target;
                self.state = State::Headers;

                Ok(ParseStatus::Pending)
            }
            State::Headers => {
                if !self.poll_line(stream)? {
                    return Ok(ParseStatus::Pending);
                }

                let line = mem::take(&mut self.line);

                if line == CRLF {
                    return self.begin_body();
                }

                // the terminating line must arrive within headers_max + 1 lines
                self.header_lines += 1;
                if self.header_lines > self.limits.headers_max {
                    return Err(Error::TooManyHeaders);
                }

                let (name, value) = parse_header_line(&line)?;
                self.headers.insert(name, value);

                Ok(ParseStatus::Pending)
            }
            State::Body => {
                let remaining = self.content_length - self.body.len();
                let op = self.read.get_or_insert_with(|| ReadOp::new(remaining, None));

                match stream.poll_read(op)? {
                    ReadStatus::Data(data) => {
                        self.body.extend_from_slice(data);

                        Ok(ParseStatus::Pending)
                    }
                    ReadStatus::Pending => Ok(ParseStatus::Pending),
                    ReadStatus::Done => {
                        self.read = None;

                        if self.body.len() < self.content_length {
                            return Err(Error::Truncated);
                        }

                        Ok(ParseStatus::Complete(self.take_request()))
                    }
                }
            }
            State::Done | State::Aborted => unreachable!(),
        }
    }

    // returns true once a complete line has been read into self.line
    fn poll_line<S: Read + Write>(
        &mut self,
        stream: &mut BufferedStream<S>,
    ) -> Result<bool, Error> {
        let limit = self.limits.request_line_max;
        let op = self
            .read
            .get_or_insert_with(|| ReadOp::new(limit, Some(b'\n')));

        match stream.poll_read(op)? {
            ReadStatus::Data(data) => {
                self.line.extend_from_slice(data);

                Ok(false)
            }
            ReadStatus::Pending => Ok(false),
            ReadStatus::Done => {
                let eof = op.hit_eof();

                self.read = None;

                if self.line.last() != Some(&b'\n') {
                    if eof {
                        return Err(Error::Truncated);
                    }

                    return Err(Error::LineTooLong);
                }

                Ok(true)
            }
        }
    }

    fn begin_body(&mut self) -> Result<ParseStatus, Error> {
        let content_length = match self.headers.get("content-length") {
            Some(v) => match parse_content_length(v.as_bytes()) {
                Some(len) => len,
                None => return Err(Error::InvalidContentLength),
            },
            None => 0,
        };

        self.content_length = content_length;

        if content_length > self.limits.body_max {
            // the body is left unread. the connection must not be reused
            self.state = State::Done;

            return Ok(ParseStatus::BodyTooLarge(content_length));
        }

        if content_length == 0 {
            return Ok(ParseStatus::Complete(self.take_request()));
        }

        self.body.reserve_exact(content_length);
        self.state = State::Body;

        Ok(ParseStatus::Pending)
    }

    fn take_request(&mut self) -> Request {
        self.state = State::Done;

        Request::new(
            mem::take(&mut self.method),
            mem::take(&mut self.target),
            mem::take(&mut self.headers),
            mem::take(&mut self.body),
        )
    }
}

fn parse_start_line(line: &[u8]) -> Result<(String, String), Error> {
    if !line.is_ascii() {
        return Err(Error::MalformedStartLine);
    }

    let line = str::from_utf8(line).map_err(|_| Error::MalformedStartLine)?;

    let mut parts = line.splitn(3, ' ');

    match (parts.next(), parts.next(), parts.next()) {
        (Some(method), Some(target), Some(_)) => Ok((method.to_owned(), target.to_owned())),
        _ => Err(Error::MalformedStartLine),
    }
}

fn parse_header_line(line: &[u8]) -> Result<(String, String), Error> {
    if !line.is_ascii() {
        return Err(Error::MalformedHeader);
    }

    let line = str::from_utf8(line).map_err(|_| Error::MalformedHeader)?;

    let pos = match line.find(':') {
        Some(pos) => pos,
        None => return Err(Error::MalformedHeader),
    };

    let name = line[..pos].trim().to_ascii_lowercase();
    let value = line[(pos + 1)..].trim().to_owned();

    Ok((name, value))
}
