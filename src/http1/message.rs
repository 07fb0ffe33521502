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

use super::util::{reason_phrase, split_target, CRLF};

const CONTENT_LENGTH: &str = "content-length";
const CONTENT_TYPE: &str = "content-type";
const DEFAULT_CONTENT_TYPE: &str = "text/plain";

/// Header map that keeps insertion order. Names compare case-insensitively,
/// and inserting an existing name replaces its value in place.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Headers {
    items: Vec<(String, String)>,
}

impl Headers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();

        match self
            .items
            .iter_mut()
            .find(|(n, _)| n.eq_ignore_ascii_case(&name))
        {
            Some((_, v)) => *v = value,
            None => self.items.push((name, value)),
        }
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.items
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.items.iter().map(|(n, v)| (n.as_str(), v.as_str()))
    }
}

/// A completely received request.
#[derive(Debug, Clone, PartialEq)]
pub struct Request {
    method: String,
    target: String,
    headers: Headers,
    body: Vec<u8>,
}

impl Request {
    pub fn new(
        method: impl Into<String>,
        target: impl Into<String>,
        headers: Headers,
        body: impl Into<Vec<u8>>,
    ) -> Self {
        Self {
            method: method.into(),
            target: target.into(),
            headers,
            body: body.into(),
        }
    }

    pub fn method(&self) -> &str {
        &self.method
    }

    /// The request target as received, including any query.
    pub fn target(&self) -> &str {
        &self.target
    }

    pub fn path(&self) -> &str {
        split_target(&self.target).0
    }

    /// The raw query, without the leading `?`. Empty if there is none.
    pub fn query(&self) -> &str {
        split_target(&self.target).1
    }

    /// Headers keyed by lower-cased name.
    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    pub fn body(&self) -> &[u8] {
        &self.body
    }
}

/// A response to be serialized onto the wire.
///
/// Every response owns its own header map. `content-length` always
/// reflects the body and `content-type` is `text/plain` unless set.
///
/// ```
/// use biplane::http1::Response;
///
/// let resp = Response::new("Not Found").with_status(404);
///
/// assert_eq!(resp.status(), 404);
/// assert_eq!(resp.headers().get("content-length"), Some("9"));
/// assert_eq!(resp.headers().get("content-type"), Some("text/plain"));
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct Response {
    status: u16,
    headers: Headers,
    body: Vec<u8>,
}

impl Response {
    pub fn new(body: impl Into<Vec<u8>>) -> Self {
        let body = body.into();

        let mut headers = Headers::new();
        headers.insert(CONTENT_LENGTH, body.len().to_string());
        headers.insert(CONTENT_TYPE, DEFAULT_CONTENT_TYPE);

        Self {
            status: 200,
            headers,
            body,
        }
    }

    pub fn with_status(mut self, status: u16) -> Self {
        self.status = status;

        self
    }

    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.headers.insert(CONTENT_TYPE, content_type);

        self
    }

    /// Set a header. Setting `content-length` has no effect.
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        let name = name.into();

        if !name.eq_ignore_ascii_case(CONTENT_LENGTH) {
            self.headers.insert(name, value);
        }

        self
    }

    pub fn status(&self) -> u16 {
        self.status
    }

    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    pub fn body(&self) -> &[u8] {
        &self.body
    }

    /// Produce the complete wire form: status line, headers, blank line
    /// and body.
    pub fn serialize(&self) -> Vec<u8> {
        let code = self.status.to_string();
        let reason = reason_phrase(self.status).unwrap_or(code.as_str());

        let mut out = Vec::with_capacity(256 + self.body.len());

        out.extend_from_slice(b"HTTP/1.1 ");
        out.extend_from_slice(code.as_bytes());
        out.push(b' ');
        out.extend_from_slice(reason.as_bytes());
        out.extend_from_slice(CRLF);

        for (name, value) in self.headers.iter() {
            out.extend_from_slice(name.as_bytes());
            out.extend_from_slice(b": ");
            out.extend_from_slice(value.as_bytes());
            out.extend_from_slice(CRLF);
        }

        out.extend_from_slice(CRLF);
        out.extend_from_slice(&self.body);

        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const HEADERS_MAX: usize = 32;

    #[test]
    fn test_headers() {
        let mut h = Headers::new();
        assert!(h.is_empty());

        h.insert("content-length", "4");
        h.insert("x-a", "1");
        h.insert("Content-Length", "5");

        assert_eq!(h.len(), 2);
        assert_eq!(h.get("content-length"), Some("5"));
        assert_eq!(h.get("CONTENT-LENGTH"), Some("5"));
        assert!(h.contains("X-A"));
        assert!(!h.contains("x-b"));

        let items: Vec<(&str, &str)> = h.iter().collect();
        assert_eq!(items, vec![("content-length", "5"), ("x-a", "1")]);
    }

    #[test]
    fn test_request_target() {
        let req = Request {
            method: String::from("GET"),
            target: String::from("/search?q=rust&page=2"),
            headers: Headers::new(),
            body: Vec::new(),
        };

        assert_eq!(req.method(), "GET");
        assert_eq!(req.target(), "/search?q=rust&page=2");
        assert_eq!(req.path(), "/search");
        assert_eq!(req.query(), "q=rust&page=2");
    }

    #[test]
    fn test_serialize() {
        let resp = Response::new("abcdef");

        assert_eq!(
            resp.serialize(),
            b"HTTP/1.1 200 OK\r\n\
              content-length: 6\r\n\
              content-type: text/plain\r\n\
              \r\n\
              abcdef"
                .to_vec()
        );

        let resp = Response::new(Vec::new()).with_status(299);

        assert_eq!(
            resp.serialize(),
            b"HTTP/1.1 299 299\r\n\
              content-length: 0\r\n\
              content-type: text/plain\r\n\
              \r\n"
                .to_vec()
        );
    }

    #[test]
    fn test_content_headers() {
        let resp = Response::new("hello")
            .with_content_type("application/json")
            .with_header("Content-Length", "100")
            .with_header("X-Custom", "yes");

        assert_eq!(resp.headers().get("content-length"), Some("5"));
        assert_eq!(resp.headers().get("content-type"), Some("application/json"));
        assert_eq!(resp.headers().get("x-custom"), Some("yes"));
        assert_eq!(resp.headers().len(), 3);
    }

    #[test]
    fn test_headers_not_shared() {
        let a = Response::new("a").with_header("x-only-a", "1");
        let b = Response::new("b");

        assert!(a.headers().contains("x-only-a"));
        assert!(!b.headers().contains("x-only-a"));
        assert_eq!(b.headers().len(), 2);
    }

    #[test]
    fn test_serialize_parse_roundtrip() {
        let body = b"\x00binary\r\n\r\nbody\xff".to_vec();

        let resp = Response::new(body.clone())
            .with_status(201)
            .with_content_type("application/octet-stream")
            .with_header("x-request-id", "abc123")
            .with_header("cache-control", "no-cache, no-store");

        let data = resp.serialize();

        let mut headers = [httparse::EMPTY_HEADER; HEADERS_MAX];
        let mut parsed = httparse::Response::new(&mut headers);

        let size = match parsed.parse(&data).unwrap() {
            httparse::Status::Complete(size) => size,
            httparse::Status::Partial => panic!("response is incomplete"),
        };

        assert_eq!(parsed.code, Some(201));
        assert_eq!(parsed.reason, Some("Created"));
        assert_eq!(parsed.headers.len(), resp.headers().len());

        for h in parsed.headers.iter() {
            let value = std::str::from_utf8(h.value).unwrap();
            assert_eq!(resp.headers().get(h.name), Some(value));
        }

        assert_eq!(&data[size..], &body[..]);
    }
}
