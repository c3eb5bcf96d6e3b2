//! # HTTP Server
//!
//! HTTP server built on Hyper and Tokio.
//! Implements graceful shutdown with signal handling.
//!
//! ## Key Features
//!
//! - Async request handling with Tokio runtime
//! - Graceful shutdown on Ctrl+C with a bounded drain
//! - Connection keep-alive support
//! - `404`/`405`/`OPTIONS` answered from the routing table
//! - `HEAD` served by the `GET` handler with the body dropped
//! - In-process `test_request` running the same pipeline without a socket

use crate::error::{Error, Result};
use crate::middleware::{Middleware, MiddlewareChain, MiddlewareResult};
use crate::router::{Method, Router};
use http_body_util::Full;
pub use hyper::body::Bytes;
use hyper::header::{HeaderName, HeaderValue, CONTENT_TYPE};
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use serde::Serialize;
use std::collections::HashMap;
use std::future::Future;
use std::net::SocketAddr;
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

pub use crate::request::ApiRequest;

const JSON_CONTENT_TYPE: &str = "application/json";

/// HTTP Server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to bind the server to
    pub address: SocketAddr,
    /// Enable keep-alive connections
    pub keep_alive: bool,
    /// Shutdown timeout for graceful shutdown (default: 30 seconds)
    pub shutdown_timeout: Duration,
    /// Max request body size in bytes
    pub max_body_size: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            address: ([127, 0, 0, 1], 8000).into(),
            keep_alive: true,
            shutdown_timeout: Duration::from_secs(30),
            max_body_size: 1024 * 1024,
        }
    }
}

/// HTTP response produced by handlers and middleware
#[derive(Debug, Clone)]
pub struct ApiResponse {
    /// HTTP status code
    pub status: u16,
    /// Response body
    pub body: String,
    /// Content type, omitted when empty
    pub content_type: String,
    /// Response headers, keyed by lower-case name
    pub headers: HashMap<String, String>,
}

impl Default for ApiResponse {
    fn default() -> Self {
        Self {
            status: 200,
            body: String::new(),
            content_type: JSON_CONTENT_TYPE.to_string(),
            headers: HashMap::new(),
        }
    }
}

impl ApiResponse {
    /// Create a JSON response from an already encoded body
    #[must_use]
    pub fn json(body: impl Into<String>) -> Self {
        Self {
            body: body.into(),
            ..Self::default()
        }
    }

    /// Serialize `value` into a JSON response with the given status
    ///
    /// Falls back to a 500 response if serialization fails.
    #[must_use]
    pub fn json_value<T: Serialize>(status: u16, value: &T) -> Self {
        match serde_json::to_string(value) {
            Ok(body) => Self::json(body).with_status(status),
            Err(err) => {
                error!(error = %err, "Failed to encode response body");
                Self::detail(500, "Internal server error")
            }
        }
    }

    /// `{"detail": message}` error body
    #[must_use]
    pub fn detail(status: u16, message: &str) -> Self {
        Self::json(serde_json::json!({ "detail": message }).to_string()).with_status(status)
    }

    /// Empty `204 No Content`
    #[must_use]
    pub fn no_content() -> Self {
        Self {
            status: 204,
            content_type: String::new(),
            ..Self::default()
        }
    }

    /// Map a crate error to its HTTP representation
    ///
    /// Server-side errors never leak their message to the client.
    #[must_use]
    pub fn from_error(err: &Error) -> Self {
        let status = err.status_code().as_u16();
        match err {
            Error::NotFound { .. } | Error::RouteNotFound { .. } => Self::detail(status, "Not found."),
            Error::Validation(errors) => Self::json(errors.to_json()).with_status(status),
            _ if err.is_client_error() => Self::detail(status, &err.to_string()),
            _ => Self::detail(status, "Internal server error"),
        }
    }

    /// `405` for `method` on a path served only by `allowed`
    #[must_use]
    pub fn method_not_allowed(method: &str, allowed: &[Method]) -> Self {
        Self::detail(405, &format!("Method \"{method}\" not allowed."))
            .with_header("Allow", &allow_header(allowed))
    }

    /// Set status code
    #[must_use]
    pub fn with_status(mut self, status: u16) -> Self {
        self.status = status;
        self
    }

    /// Set header
    #[must_use]
    pub fn with_header(mut self, key: &str, value: &str) -> Self {
        self.set_header(key, value);
        self
    }

    /// Set or override a header
    pub fn set_header(&mut self, key: &str, value: &str) {
        if key.eq_ignore_ascii_case("content-type") {
            self.content_type = value.to_string();
        } else {
            self.headers
                .insert(key.to_ascii_lowercase(), value.to_string());
        }
    }

    /// Header value by name (case-insensitive)
    #[must_use]
    pub fn header(&self, key: &str) -> Option<&str> {
        if key.eq_ignore_ascii_case("content-type") {
            return Some(self.content_type.as_str()).filter(|v| !v.is_empty());
        }
        self.headers
            .get(&key.to_ascii_lowercase())
            .map(String::as_str)
    }

    /// Parse the body as JSON
    ///
    /// # Errors
    ///
    /// Returns `Error::Json` when the body is not valid JSON.
    pub fn json_body(&self) -> Result<serde_json::Value> {
        Ok(serde_json::from_str(&self.body)?)
    }

    /// Convert to hyper Response
    fn into_hyper(self) -> Response<Full<Bytes>> {
        let mut response = Response::new(Full::new(Bytes::from(self.body)));
        *response.status_mut() =
            StatusCode::from_u16(self.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

        let headers = response.headers_mut();
        if let Ok(value) = HeaderValue::from_str(&self.content_type) {
            if !self.content_type.is_empty() {
                headers.insert(CONTENT_TYPE, value);
            }
        }
        for (k, v) in &self.headers {
            if let (Ok(name), Ok(value)) =
                (HeaderName::from_bytes(k.as_bytes()), HeaderValue::from_str(v))
            {
                headers.insert(name, value);
            }
        }
        response
    }
}

/// Handler function type (async)
pub type Handler =
    Arc<dyn Fn(ApiRequest) -> Pin<Box<dyn Future<Output = ApiResponse> + Send>> + Send + Sync>;

/// Box an async closure into a [`Handler`]
pub fn handler<F, Fut>(f: F) -> Handler
where
    F: Fn(ApiRequest) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ApiResponse> + Send + 'static,
{
    Arc::new(move |req| Box::pin(f(req)))
}

/// HTTP server
pub struct Server {
    config: ServerConfig,
    router: Router,
    handlers: Vec<Handler>,
    middleware: MiddlewareChain,
}

impl Default for Server {
    fn default() -> Self {
        Self::new(ServerConfig::default())
    }
}

impl Server {
    /// Create a new Server instance
    #[must_use]
    pub fn new(config: ServerConfig) -> Self {
        Self {
            config,
            router: Router::new(),
            handlers: Vec::new(),
            middleware: MiddlewareChain::new(),
        }
    }

    /// Add a middleware to the chain
    pub fn add_middleware<M: Middleware + 'static>(&mut self, middleware: M) {
        self.middleware.add(middleware);
    }

    /// Add a route and its handler
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidRoutePattern` if the route cannot be registered.
    pub fn add_route(&mut self, method: Method, path: &str, handler: Handler) -> Result<()> {
        self.router.add_route(method, path)?;
        self.handlers.push(handler);
        Ok(())
    }

    /// Start the server with graceful shutdown
    ///
    /// # Errors
    ///
    /// Returns `Error::BindError` if the address cannot be bound, `Error::Io`
    /// if accepting connections fails.
    pub async fn serve(&self) -> Result<()> {
        let addr = self.config.address;
        let bind_error = |source| Error::BindError {
            address: addr.to_string(),
            source,
        };

        let socket = if addr.is_ipv4() {
            tokio::net::TcpSocket::new_v4()?
        } else {
            tokio::net::TcpSocket::new_v6()?
        };
        socket.set_reuseaddr(true)?;
        socket.bind(addr).map_err(bind_error)?;
        let listener = socket.listen(1024).map_err(bind_error)?;

        info!("Server listening on http://{}", addr);

        let router = Arc::new(self.router.clone());
        let handlers = Arc::new(self.handlers.clone());
        let middleware = Arc::new(self.middleware.clone());
        let active = Arc::new(AtomicUsize::new(0));
        let max_body_size = self.config.max_body_size;
        let keep_alive = self.config.keep_alive;

        loop {
            tokio::select! {
                accept_result = listener.accept() => {
                    let (stream, remote_addr) = match accept_result {
                        Ok(conn) => conn,
                        Err(err) => {
                            warn!("Failed to accept connection: {}", err);
                            continue;
                        }
                    };
                    let io = TokioIo::new(stream);

                    let router = router.clone();
                    let handlers = handlers.clone();
                    let middleware = middleware.clone();
                    let active = active.clone();

                    tokio::task::spawn(async move {
                        active.fetch_add(1, Ordering::Relaxed);

                        if let Err(err) = http1::Builder::new()
                            .keep_alive(keep_alive)
                            .serve_connection(io, service_fn(move |req| {
                                let router = router.clone();
                                let handlers = handlers.clone();
                                let middleware = middleware.clone();
                                async move {
                                    let method = req.method().clone();
                                    let path = req.uri().path().to_string();
                                    let version = req.version();

                                    let response = handle_request(
                                        req,
                                        &router,
                                        &handlers,
                                        &middleware,
                                        remote_addr,
                                        max_body_size,
                                    )
                                    .await;

                                    info!("    {} - \"{} {} {:?}\" {}",
                                        remote_addr,
                                        method,
                                        path,
                                        version,
                                        response.status()
                                    );
                                    Ok::<_, hyper::Error>(response)
                                }
                            }))
                            .await
                        {
                            error!("Error serving connection: {:?}", err);
                        }
                        active.fetch_sub(1, Ordering::Relaxed);
                    });
                }
                () = shutdown_signal() => {
                    info!("Shutdown signal received, stopping server...");
                    break;
                }
            }
        }

        let timeout = self.config.shutdown_timeout;
        let drain = async {
            while active.load(Ordering::Relaxed) > 0 {
                tokio::time::sleep(Duration::from_millis(50)).await;
            }
        };
        if tokio::time::timeout(timeout, drain).await.is_err() {
            warn!(
                active = active.load(Ordering::Relaxed),
                "Shutdown timeout elapsed with connections still open"
            );
        }
        Ok(())
    }

    /// Execute a test request directly without network stack
    pub async fn test_request(
        &self,
        method: Method,
        path: &str,
        headers: HashMap<String, String>,
        body: Option<Bytes>,
    ) -> ApiResponse {
        if let Some(b) = body.as_ref() {
            if b.len() > self.config.max_body_size {
                return too_large(self.config.max_body_size, b.len());
            }
        }
        let mut req = ApiRequest::new(method, path, headers, body);
        req.set_header("x-client-ip", "test");

        process_request(&mut req, &self.router, &self.handlers, &self.middleware).await
    }
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        error!("Failed to install Ctrl+C handler: {}", err);
        std::future::pending::<()>().await;
    }
}

fn allow_header(allowed: &[Method]) -> String {
    allowed
        .iter()
        .chain(std::iter::once(&Method::Options))
        .map(Method::as_str)
        .collect::<Vec<_>>()
        .join(", ")
}

fn too_large(limit: usize, actual: usize) -> ApiResponse {
    ApiResponse::from_error(&Error::PayloadTooLarge { limit, actual })
        .with_header("x-request-id", &generate_request_id())
}

/// Core request processing logic (network agnostic)
async fn process_request(
    req: &mut ApiRequest,
    router: &Router,
    handlers: &[Handler],
    middleware: &MiddlewareChain,
) -> ApiResponse {
    if req.header("x-request-id").is_none() {
        let request_id = generate_request_id();
        req.set_header("x-request-id", &request_id);
    }

    let mut response = match middleware.run_before(req) {
        MiddlewareResult::Continue => dispatch(req, router, handlers).await,
        MiddlewareResult::Respond(resp) => resp,
    };

    if let Some(request_id) = req.header("x-request-id") {
        response.set_header("x-request-id", request_id);
    }
    middleware.run_after(req, &mut response);
    response
}

async fn dispatch(req: &mut ApiRequest, router: &Router, handlers: &[Handler]) -> ApiResponse {
    let route_method = match req.method {
        Method::Head => Method::Get,
        method => method,
    };
    let handler_id = match router.match_route(route_method, &req.path) {
        Ok(matched) => {
            req.typed_params = matched.typed_params;
            matched.handler_id
        }
        Err(err) => {
            let allowed = router.allowed_methods(&req.path);
            return if allowed.is_empty() {
                ApiResponse::from_error(&err)
            } else if req.method == Method::Options {
                ApiResponse::no_content()
                    .with_status(200)
                    .with_header("Allow", &allow_header(&allowed))
            } else {
                ApiResponse::method_not_allowed(req.method.as_str(), &allowed)
            };
        }
    };

    let mut response = match handlers.get(handler_id) {
        Some(handler) => handler(req.clone()).await,
        None => {
            error!(handler_id, "Route registered without a handler");
            ApiResponse::detail(500, "Internal server error")
        }
    };
    if req.method == Method::Head {
        response.body.clear();
    }
    response
}

async fn handle_request(
    req: Request<hyper::body::Incoming>,
    router: &Router,
    handlers: &[Handler],
    middleware: &MiddlewareChain,
    remote_addr: SocketAddr,
    max_body_size: usize,
) -> Response<Full<Bytes>> {
    let Some(method) = Method::from_hyper(req.method()) else {
        let allowed = router.allowed_methods(req.uri().path());
        let response = if allowed.is_empty() {
            ApiResponse::detail(404, "Not found.")
        } else {
            ApiResponse::method_not_allowed(req.method().as_str(), &allowed)
        };
        return response
            .with_header("x-request-id", &generate_request_id())
            .into_hyper();
    };

    let mut api_request = match ApiRequest::from_hyper_with_limit(req, method, max_body_size).await
    {
        Ok(r) => r,
        Err(Error::PayloadTooLarge { limit, actual }) => {
            return too_large(limit, actual).into_hyper();
        }
        Err(e) => {
            warn!("Failed to read request: {}", e);
            return ApiResponse::detail(400, "Bad request")
                .with_header("x-request-id", &generate_request_id())
                .into_hyper();
        }
    };

    api_request.set_header("x-client-ip", &remote_addr.ip().to_string());
    process_request(&mut api_request, router, handlers, middleware)
        .await
        .into_hyper()
}

static REQUEST_COUNTER: AtomicUsize = AtomicUsize::new(1);

fn generate_request_id() -> String {
    use std::time::{SystemTime, UNIX_EPOCH};
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default();
    let counter = REQUEST_COUNTER.fetch_add(1, Ordering::Relaxed);
    format!("{:x}-{:x}", now.as_nanos(), counter)
}
