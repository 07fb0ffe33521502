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

use crate::http1::{Headers, Request, Response};

/// Handles a routed request.
///
/// Handlers receive the raw query (without `?`, possibly empty), the
/// request headers keyed by lower-cased name, and the request body. They
/// run to completion when called.
pub trait Handler {
    fn call(&self, query: &str, headers: &Headers, body: &[u8]) -> Response;
}

impl<F> Handler for F
where
    F: Fn(&str, &Headers, &[u8]) -> Response,
{
    fn call(&self, query: &str, headers: &Headers, body: &[u8]) -> Response {
        self(query, headers, body)
    }
}

pub struct Route {
    path: String,
    method: String,
    handler: Box<dyn Handler>,
}

impl Route {
    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn method(&self) -> &str {
        &self.method
    }
}

/// Routes in registration order. Matching is exact on both path and method,
/// and the first match wins.
///
/// ```
/// use biplane::http1::{Headers, Request, Response};
/// use biplane::router::Router;
///
/// let mut router = Router::new();
/// router.add("/", "GET", |_: &str, _: &Headers, _: &[u8]| Response::new("hello"));
///
/// let req = Request::new("GET", "/?a=1", Headers::new(), Vec::new());
/// assert_eq!(router.dispatch(&req).body(), b"hello");
///
/// let req = Request::new("GET", "/missing", Headers::new(), Vec::new());
/// assert_eq!(router.dispatch(&req).status(), 404);
/// ```
#[derive(Default)]
pub struct Router {
    routes: Vec<Route>,
}

impl Router {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add<H>(&mut self, path: &str, method: &str, handler: H) -> &mut Self
    where
        H: Handler + 'static,
    {
        self.routes.push(Route {
            path: path.to_owned(),
            method: method.to_owned(),
            handler: Box::new(handler),
        });

        self
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    pub fn find(&self, path: &str, method: &str) -> Option<&Route> {
        self.routes
            .iter()
            .find(|r| r.path == path && r.method == method)
    }

    /// Run the handler matching the request, or answer 404.
    pub fn dispatch(&self, req: &Request) -> Response {
        match self.find(req.path(), req.method()) {
            Some(route) => route
                .handler
                .call(req.query(), req.headers(), req.body()),
            None => Response::new("Not Found").with_status(404),
        }
    }
}
