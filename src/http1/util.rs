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

use std::str;

pub const CRLF: &[u8] = b"\r\n";

// parse a content-length value. surrounding whitespace and a leading sign
// are accepted. negative values clamp to 0 and values too large to
// represent saturate
pub fn parse_content_length(src: &[u8]) -> Option<usize> {
    let s = str::from_utf8(src).ok()?.trim();

    let (negative, digits) = match s.as_bytes().first()? {
        b'-' => (true, &s[1..]),
        b'+' => (false, &s[1..]),
        _ => (false, s),
    };

    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }

    if negative {
        return Some(0);
    }

    let mut x: usize = 0;

    for b in digits.bytes() {
        x = x
            .saturating_mul(10)
            .saturating_add(usize::from(b - b'0'));
    }

    Some(x)
}

// split a request target into path and raw query. everything after the
// first '?' is the query
pub fn split_target(target: &str) -> (&str, &str) {
    match target.find('?') {
        Some(pos) => (&target[..pos], &target[(pos + 1)..]),
        None => (target, ""),
    }
}

pub fn reason_phrase(code: u16) -> Option<&'static str> {
    let s = match code {
        100 => "Continue",
        101 => "Switching Protocols",
        200 => "OK",
        201 => "Created",
        202 => "Accepted",
        204 => "No Content",
        206 => "Partial Content",
        301 => "Moved Permanently",
        302 => "Found",
        303 => "See Other",
        304 => "Not Modified",
        307 => "Temporary Redirect",
        308 => "Permanent Redirect",
        400 => "Bad Request",
        401 => "Unauthorized",
        403 => "Forbidden",
        404 => "Not Found",
        405 => "Method Not Allowed",
        408 => "Request Timeout",
        409 => "Conflict",
        411 => "Length Required",
        413 => "Content Too Large",
        414 => "URI Too Long",
        415 => "Unsupported Media Type",
        429 => "Too Many Requests",
        431 => "Request Header Fields Too Large",
        500 => "Internal Server Error",
        501 => "Not Implemented",
        503 => "Service Unavailable",
        _ => return None,
    };

    Some(s)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_content_length() {
        assert_eq!(parse_content_length(b"0"), Some(0));
        assert_eq!(parse_content_length(b"42"), Some(42));
        assert_eq!(parse_content_length(b" 42 "), Some(42));
        assert_eq!(parse_content_length(b"+7"), Some(7));
        assert_eq!(parse_content_length(b"-5"), Some(0));
        assert_eq!(
            parse_content_length(b"99999999999999999999999999"),
            Some(usize::MAX)
        );

        assert_eq!(parse_content_length(b""), None);
        assert_eq!(parse_content_length(b"-"), None);
        assert_eq!(parse_content_length(b"abc"), None);
        assert_eq!(parse_content_length(b"1 2"), None);
        assert_eq!(parse_content_length(b"0x10"), None);
        assert_eq!(parse_content_length(b"\xff"), None);
    }

    #[test]
    fn test_split_target() {
        assert_eq!(split_target("/"), ("/", ""));
        assert_eq!(split_target("/?q=1"), ("/", "q=1"));
        assert_eq!(split_target("/a/b?x=1&y=2"), ("/a/b", "x=1&y=2"));
        assert_eq!(split_target("/a?b?c"), ("/a", "b?c"));
        assert_eq!(split_target("/a?"), ("/a", ""));
    }

    #[test]
    fn test_reason_phrase() {
        assert_eq!(reason_phrase(200), Some("OK"));
        assert_eq!(reason_phrase(404), Some("Not Found"));
        assert_eq!(reason_phrase(413), Some("Content Too Large"));
        assert_eq!(reason_phrase(299), None);
    }
}
