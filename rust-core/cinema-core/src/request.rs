//! # HTTP Request
//!
//! Request wrapper handed to catalog handlers and middleware. The body is
//! collected up front against the configured size limit, so handlers only
//! ever see complete bytes.

use crate::error::{Error, Result};
use crate::router::Method;
use crate::types::ParamValue;
use http_body_util::BodyExt;
use hyper::body::Bytes;
use hyper::header::{HeaderMap, HeaderName, HeaderValue, CONTENT_LENGTH};
use hyper::Request;
use std::collections::HashMap;

/// HTTP request with its body fully collected
#[derive(Debug, Clone)]
pub struct ApiRequest {
    /// HTTP method
    pub method: Method,
    /// Request path (without query string)
    pub path: String,
    /// Path parameters converted to their declared types
    pub typed_params: HashMap<String, ParamValue>,
    /// Request headers
    headers: HeaderMap,
    /// Request body, empty when none was sent
    body: Bytes,
}

impl ApiRequest {
    /// Create a request manually (tests and in-process calls)
    ///
    /// A query string in `path` is discarded.
    #[must_use]
    pub fn new(
        method: Method,
        path: impl Into<String>,
        headers_map: HashMap<String, String>,
        body: Option<Bytes>,
    ) -> Self {
        let mut path: String = path.into();
        if let Some(query_start) = path.find('?') {
            path.truncate(query_start);
        }

        let mut request = Self {
            method,
            path,
            typed_params: HashMap::new(),
            headers: HeaderMap::new(),
            body: body.unwrap_or_default(),
        };
        for (k, v) in &headers_map {
            request.set_header(k, v);
        }
        request
    }

    /// Create from a hyper request, collecting at most `max_body_size` bytes
    ///
    /// # Errors
    ///
    /// Returns `Error::PayloadTooLarge` when the declared or actual body size
    /// exceeds the limit, `Error::Http` when the body cannot be read.
    pub async fn from_hyper_with_limit(
        req: Request<hyper::body::Incoming>,
        method: Method,
        max_body_size: usize,
    ) -> Result<Self> {
        let path = req.uri().path().to_string();

        let headers = req.headers().clone();
        if let Some(content_len) = headers
            .get(CONTENT_LENGTH)
            .and_then(|len| len.to_str().ok())
            .and_then(|len| len.parse::<usize>().ok())
        {
            if content_len > max_body_size {
                return Err(Error::PayloadTooLarge {
                    limit: max_body_size,
                    actual: content_len,
                });
            }
        }

        let body = BodyExt::collect(req.into_body()).await?.to_bytes();
        if body.len() > max_body_size {
            return Err(Error::PayloadTooLarge {
                limit: max_body_size,
                actual: body.len(),
            });
        }

        Ok(Self {
            method,
            path,
            typed_params: HashMap::new(),
            headers,
            body,
        })
    }

    /// Get a header value by name (case-insensitive)
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// Set or override a header
    ///
    /// Names or values that are not valid HTTP are ignored.
    pub fn set_header(&mut self, name: &str, value: &str) {
        if let (Ok(n), Ok(v)) = (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(value),
        ) {
            self.headers.insert(n, v);
        }
    }

    /// Integer path parameter, `None` when absent or not an integer
    #[must_use]
    pub fn param_int(&self, name: &str) -> Option<i64> {
        self.typed_params.get(name).and_then(ParamValue::as_int)
    }

    /// Request body bytes, empty when none was sent
    #[must_use]
    pub fn body_bytes(&self) -> &[u8] {
        &self.body
    }
}
