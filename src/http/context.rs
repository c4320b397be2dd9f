//! Per-request context handed to middlewares and handlers.
//!
//! # Responsibilities
//! - Expose the request (method, path, headers, placeholders, buffered body)
//! - Carry the [`AuthContext`] set by the auth cascade
//! - Queue response headers and cookie changes for whichever response is sent
//! - Let a handler write its own response exactly once
//!
//! # Design Decisions
//! - Handlers take the context by value; the dispatcher keeps a clone of the
//!   [`ResponseHandle`] to observe what was sent
//! - A second `send` is ignored so a response is never written twice

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use axum::body::Bytes;
use axum::extract::Query;
use axum::http::{request::Parts, Extensions, HeaderMap, HeaderName, HeaderValue, Method, Uri};
use axum::response::{IntoResponse, Response};
use axum_extra::extract::cookie::{Cookie, CookieJar};
use serde::de::DeserializeOwned;

use crate::auth::AuthContext;
use crate::error::ApiError;
use crate::http::request::X_REQUEST_ID;

#[derive(Default)]
struct Pending {
    headers: HeaderMap,
    cookies: CookieJar,
    sent: Option<Response>,
}

/// Shared view of the response being assembled for one request.
#[derive(Clone, Default)]
pub struct ResponseHandle(Arc<Mutex<Pending>>);

impl ResponseHandle {
    /// Create a handle seeded with the request's cookies.
    pub fn from_request_headers(headers: &HeaderMap) -> Self {
        let pending = Pending {
            cookies: CookieJar::from_headers(headers),
            ..Pending::default()
        };
        Self(Arc::new(Mutex::new(pending)))
    }

    fn lock(&self) -> MutexGuard<'_, Pending> {
        self.0.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Record a response written by a handler or middleware.
    ///
    /// Returns `false` (and drops `response`) when one was already sent.
    pub fn send(&self, response: Response) -> bool {
        let mut pending = self.lock();
        if pending.sent.is_some() {
            tracing::warn!("response already sent; ignoring second write");
            return false;
        }
        pending.sent = Some(response);
        true
    }

    pub fn is_sent(&self) -> bool {
        self.lock().sent.is_some()
    }

    pub fn insert_header(&self, name: HeaderName, value: HeaderValue) {
        self.lock().headers.insert(name, value);
    }

    pub fn cookie(&self, name: &str) -> Option<String> {
        self.lock().cookies.get(name).map(|c| c.value().to_owned())
    }

    pub fn add_cookie(&self, cookie: Cookie<'static>) {
        let mut pending = self.lock();
        let jar = std::mem::take(&mut pending.cookies);
        pending.cookies = jar.add(cookie);
    }

    /// Queue a removal cookie for `name` on path `/`.
    pub fn remove_cookie(&self, name: &str) {
        let mut pending = self.lock();
        let jar = std::mem::take(&mut pending.cookies);
        pending.cookies = jar.remove(Cookie::build((name.to_owned(), "")).path("/"));
    }

    pub(crate) fn take_sent(&self) -> Option<Response> {
        self.lock().sent.take()
    }

    /// Apply queued headers and cookie changes to the outgoing response.
    pub(crate) fn decorate(&self, mut response: Response) -> Response {
        let pending = std::mem::take(&mut *self.lock());
        response.headers_mut().extend(pending.headers);
        (pending.cookies, response).into_response()
    }
}

/// The request as seen by middlewares and handlers.
pub struct RequestContext {
    parts: Parts,
    body: Bytes,
    params: HashMap<String, String>,
    auth: Option<AuthContext>,
    response: ResponseHandle,
}

impl RequestContext {
    pub fn new(
        parts: Parts,
        body: Bytes,
        params: HashMap<String, String>,
        response: ResponseHandle,
    ) -> Self {
        Self {
            parts,
            body,
            params,
            auth: None,
            response,
        }
    }

    pub fn method(&self) -> &Method {
        &self.parts.method
    }

    pub fn uri(&self) -> &Uri {
        &self.parts.uri
    }

    pub fn path(&self) -> &str {
        self.parts.uri.path()
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.parts.headers
    }

    /// Header value as a string, if present and valid UTF-8.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.parts.headers.get(name).and_then(|v| v.to_str().ok())
    }

    pub fn request_id(&self) -> Option<&str> {
        self.header(X_REQUEST_ID)
    }

    pub fn extensions(&self) -> &Extensions {
        &self.parts.extensions
    }

    /// Value of a placeholder segment, e.g. `id` for `/posts/:id`.
    pub fn param(&self, name: &str) -> Option<&str> {
        self.params.get(name).map(String::as_str)
    }

    pub fn params(&self) -> &HashMap<String, String> {
        &self.params
    }

    pub fn body(&self) -> &Bytes {
        &self.body
    }

    /// Deserialize the buffered body as JSON.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, ApiError> {
        Ok(serde_json::from_slice(&self.body)?)
    }

    /// Deserialize the query string.
    pub fn query<T: DeserializeOwned>(&self) -> Result<T, ApiError> {
        Query::try_from_uri(&self.parts.uri)
            .map(|Query(q)| q)
            .map_err(|rejection| ApiError::validation(rejection.body_text()))
    }

    pub fn cookie(&self, name: &str) -> Option<String> {
        self.response.cookie(name)
    }

    pub fn set_cookie(&self, cookie: Cookie<'static>) {
        self.response.add_cookie(cookie);
    }

    pub fn remove_cookie(&self, name: &str) {
        self.response.remove_cookie(name);
    }

    pub fn auth(&self) -> Option<&AuthContext> {
        self.auth.as_ref()
    }

    pub fn set_auth(&mut self, auth: AuthContext) {
        self.auth = Some(auth);
    }

    /// Queue a header on whichever response ends up being sent.
    pub fn set_response_header(&self, name: HeaderName, value: HeaderValue) {
        self.response.insert_header(name, value);
    }

    /// Write a response directly. The dispatcher will not auto-send after this.
    pub fn send(&self, response: impl IntoResponse) -> bool {
        self.response.send(response.into_response())
    }

    pub fn is_sent(&self) -> bool {
        self.response.is_sent()
    }

    pub fn response_handle(&self) -> ResponseHandle {
        self.response.clone()
    }
}

#[cfg(test)]
pub(crate) fn test_context(request: axum::http::Request<()>) -> RequestContext {
    let (parts, ()) = request.into_parts();
    let handle = ResponseHandle::from_request_headers(&parts.headers);
    RequestContext::new(parts, Bytes::new(), HashMap::new(), handle)
}
