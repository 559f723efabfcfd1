//! Native HTTP server
//!
//! hyper HTTP/1.1 connections on a tokio runtime:
//! - One task per connection
//! - TCP_NODELAY for low latency
//! - Graceful shutdown that drains open connections

use crate::api::TodoApi;
use crate::config::ServerConfig;
use crate::middleware::{MiddlewareChain, Tracing};
use crate::store::TodoStore;
use crate::{Error, Method, Request, Response, Result};
use bytes::Bytes;
use http_body_util::{BodyExt, Full, LengthLimitError, Limited};
use hyper::body::Body;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper_util::rt::TokioIo;
use socket2::{Domain, Protocol, Socket, Type};
use std::convert::Infallible;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::watch;

/// Server state shared across all connections
pub struct ServerState<S> {
    api: TodoApi<S>,
    middleware: MiddlewareChain,
    max_body_size: usize,
}

impl<S: TodoStore> ServerState<S> {
    /// State with the default middleware (request tracing)
    pub fn new(store: Arc<S>, max_body_size: usize) -> Self {
        Self::with_middleware(store, max_body_size, MiddlewareChain::new().with(Tracing::default()))
    }

    /// State with a custom middleware chain
    pub fn with_middleware(store: Arc<S>, max_body_size: usize, middleware: MiddlewareChain) -> Self {
        Self {
            api: TodoApi::new(store),
            middleware,
            max_body_size,
        }
    }

    /// Get the API this state dispatches to
    pub fn api(&self) -> &TodoApi<S> {
        &self.api
    }

    /// Run one hyper request through middleware and the API
    pub async fn handle<B>(&self, req: hyper::Request<B>) -> hyper::Response<Full<Bytes>>
    where
        B: Body,
        B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        let (parts, body) = req.into_parts();
        let mut request = from_hyper_parts(&parts);

        let mut response = match self.middleware.run_before(&mut request) {
            Some(early) => early,
            None => match read_body(body, self.max_body_size).await {
                Ok(bytes) => {
                    request.body = bytes;
                    self.api.handle(&mut request).await
                }
                Err(err) => Response::error(&err),
            },
        };

        self.middleware.run_after(&request, &mut response);
        to_hyper_response(response)
    }
}

/// Bound listener plus everything needed to serve it
pub struct Server<S> {
    listener: TcpListener,
    state: Arc<ServerState<S>>,
    tracker: Arc<ConnectionTracker>,
    shutdown_timeout: Duration,
}

impl<S: TodoStore> Server<S> {
    /// Bind the listening socket
    ///
    /// Must be called inside a tokio runtime.
    pub async fn bind(config: &ServerConfig, store: Arc<S>) -> Result<Self> {
        let addr = config.addr()?;
        let socket = create_optimized_socket(&addr)?;
        let listener: std::net::TcpListener = socket.into();
        listener.set_nonblocking(true)?;

        Ok(Self {
            listener: TcpListener::from_std(listener)?,
            state: Arc::new(ServerState::new(store, config.max_body_size)),
            tracker: Arc::new(ConnectionTracker::new()),
            shutdown_timeout: config.shutdown_timeout,
        })
    }

    /// Address actually bound (useful with port 0)
    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Accept connections until `shutdown` resolves, then drain
    pub async fn run<F>(self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        let Server {
            listener,
            state,
            tracker,
            shutdown_timeout,
        } = self;
        let (stop_tx, stop_rx) = watch::channel(false);
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                accepted = listener.accept() => {
                    let (stream, peer) = match accepted {
                        Ok(conn) => conn,
                        Err(e) => {
                            log::warn!("accept failed: {}", e);
                            tokio::time::sleep(Duration::from_millis(50)).await;
                            continue;
                        }
                    };
                    if let Err(e) = stream.set_nodelay(true) {
                        log::debug!("TCP_NODELAY on {}: {}", peer, e);
                    }
                    serve_connection(stream, state.clone(), tracker.clone(), stop_rx.clone());
                }
                _ = &mut shutdown => break,
            }
        }

        drop(listener);
        // Receivers only fail when every connection is already gone
        let _ = stop_tx.send(true);

        log::info!("shutting down, {} connection(s) open", tracker.count());
        if !tracker.wait_idle(shutdown_timeout).await {
            log::warn!(
                "{} connection(s) still open after {:?}",
                tracker.count(),
                shutdown_timeout
            );
        }
        Ok(())
    }
}

/// Serve one HTTP/1.1 connection on its own task
fn serve_connection<S: TodoStore>(
    stream: TcpStream,
    state: Arc<ServerState<S>>,
    tracker: Arc<ConnectionTracker>,
    mut stop_rx: watch::Receiver<bool>,
) {
    tracker.increment();

    tokio::spawn(async move {
        let io = TokioIo::new(stream);
        let service = service_fn(move |req| {
            let state = state.clone();
            async move { Ok::<_, Infallible>(state.handle(req).await) }
        });

        let conn = http1::Builder::new().serve_connection(io, service);
        tokio::pin!(conn);

        let result = tokio::select! {
            res = conn.as_mut() => res,
            _ = stop_rx.changed() => {
                conn.as_mut().graceful_shutdown();
                conn.as_mut().await
            }
        };

        if let Err(e) = result {
            // Clients hanging up mid-request are routine
            if !e.is_incomplete_message() {
                log::debug!("connection error: {}", e);
            }
        }

        tracker.decrement();
    });
}

/// Create a listening TCP socket with SO_REUSEADDR and TCP_NODELAY
///
/// SO_REUSEPORT is left off so a second instance on the same port fails
/// to bind instead of silently sharing traffic.
pub fn create_optimized_socket(addr: &SocketAddr) -> std::io::Result<Socket> {
    let domain = if addr.is_ipv4() {
        Domain::IPV4
    } else {
        Domain::IPV6
    };

    let socket = Socket::new(domain, Type::STREAM, Some(Protocol::TCP))?;
    socket.set_reuse_address(true)?;
    socket.set_nodelay(true)?;
    socket.bind(&(*addr).into())?;
    socket.listen(1024)?;

    Ok(socket)
}

/// Build our Request from hyper request parts (body is read separately)
pub fn from_hyper_parts(parts: &http::request::Parts) -> Request {
    let method = Method::parse(parts.method.as_str());

    let mut request = Request::new(method, parts.uri.path());
    request.query = parts.uri.query().map(|s| s.to_string());

    for (name, value) in &parts.headers {
        if let Ok(v) = value.to_str() {
            request.headers.push((name.to_string(), v.to_string()));
        }
    }

    request
}

/// Collect a request body, refusing more than `limit` bytes
pub async fn read_body<B>(body: B, limit: usize) -> Result<Bytes>
where
    B: Body,
    B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    match Limited::new(body, limit).collect().await {
        Ok(collected) => Ok(collected.to_bytes()),
        Err(err) if err.downcast_ref::<LengthLimitError>().is_some() => {
            Err(Error::PayloadTooLarge { limit })
        }
        Err(err) => Err(Error::MalformedBody(format!("failed to read body: {}", err))),
    }
}

/// Convert our Response to hyper Response
///
/// Headers that are not valid HTTP are dropped.
pub fn to_hyper_response(res: Response) -> hyper::Response<Full<Bytes>> {
    let mut out = hyper::Response::new(Full::new(res.body));
    *out.status_mut() = http::StatusCode::from_u16(res.status.as_u16())
        .unwrap_or(http::StatusCode::INTERNAL_SERVER_ERROR);

    for (name, value) in &res.headers {
        match (
            http::HeaderName::from_bytes(name.as_bytes()),
            http::HeaderValue::from_str(value),
        ) {
            (Ok(name), Ok(value)) => {
                out.headers_mut().append(name, value);
            }
            _ => log::warn!("dropping invalid response header {:?}", name),
        }
    }

    out
}

/// Tracks active connections for graceful shutdown
#[derive(Debug, Default)]
pub struct ConnectionTracker {
    active: AtomicU64,
}

impl ConnectionTracker {
    /// Create a tracker with no open connections
    pub fn new() -> Self {
        Self::default()
    }

    /// Increment active connection count
    #[inline]
    pub fn increment(&self) {
        self.active.fetch_add(1, Ordering::SeqCst);
    }

    /// Decrement active connection count
    #[inline]
    pub fn decrement(&self) {
        self.active.fetch_sub(1, Ordering::SeqCst);
    }

    /// Get active connection count
    #[inline]
    pub fn count(&self) -> u64 {
        self.active.load(Ordering::SeqCst)
    }

    /// Wait until no connection is open; false if `timeout` ran out first
    pub async fn wait_idle(&self, timeout: Duration) -> bool {
        let deadline = tokio::time::Instant::now() + timeout;
        while self.count() > 0 {
            if tokio::time::Instant::now() >= deadline {
                return false;
            }
            tokio::time::sleep(Duration::from_millis(25)).await;
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use serde_json::{json, Value};

    fn state(limit: usize) -> ServerState<MemoryStore> {
        ServerState::new(Arc::new(MemoryStore::new()), limit)
    }

    fn request(method: &str, uri: &str, body: &str) -> hyper::Request<Full<Bytes>> {
        hyper::Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json")
            .body(Full::new(Bytes::from(body.to_string())))
            .unwrap()
    }

    async fn body_json(res: hyper::Response<Full<Bytes>>) -> Value {
        let bytes = res.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_handle_create() {
        let state = state(1024);

        let res = state
            .handle(request("POST", "/api/todos", r#"{"body":"buy milk"}"#))
            .await;
        assert_eq!(res.status(), 201);
        assert_eq!(res.headers()["content-type"], "application/json");
        assert!(res.headers().contains_key("x-request-id"));
        assert_eq!(
            body_json(res).await,
            json!({"id": 1, "completed": false, "body": "buy milk"})
        );
    }

    #[tokio::test]
    async fn test_handle_body_too_large() {
        let state = state(16);

        let res = state
            .handle(request("POST", "/api/todos", r#"{"body":"this is far too long"}"#))
            .await;
        assert_eq!(res.status(), 413);
        assert!(state.api().store().is_empty());
    }

    #[tokio::test]
    async fn test_handle_query_string_ignored_for_routing() {
        let state = state(1024);

        let res = state.handle(request("GET", "/api/todos?verbose=1", "")).await;
        assert_eq!(res.status(), 200);
        assert_eq!(body_json(res).await, json!([]));
    }

    #[tokio::test]
    async fn test_handle_echoes_request_id() {
        let state = state(1024);
        let req = hyper::Request::builder()
            .method("GET")
            .uri("/api/todos")
            .header("x-request-id", "abc-123")
            .body(Full::new(Bytes::new()))
            .unwrap();

        let res = state.handle(req).await;
        assert_eq!(res.headers()["x-request-id"], "abc-123");
    }

    #[tokio::test]
    async fn test_handle_unknown_method_is_traced() {
        let state = state(1024);
        let req = hyper::Request::builder()
            .method("PROPFIND")
            .uri("/api/todos")
            .body(Full::new(Bytes::new()))
            .unwrap();

        let res = state.handle(req).await;
        assert_eq!(res.status(), 400);
        assert!(res.headers().contains_key("x-request-id"));
        assert_eq!(
            body_json(res).await,
            json!({"error": "invalid HTTP method: PROPFIND"})
        );
    }

    #[tokio::test]
    async fn test_read_body_limit() {
        let body = Full::new(Bytes::from_static(b"12345"));
        assert_eq!(read_body(body, 5).await.unwrap(), Bytes::from_static(b"12345"));

        let body = Full::new(Bytes::from_static(b"123456"));
        assert!(matches!(
            read_body(body, 5).await,
            Err(Error::PayloadTooLarge { limit: 5 })
        ));
    }

    #[test]
    fn test_to_hyper_response_drops_bad_headers() {
        let res = crate::ResponseBuilder::new(crate::StatusCode::NOT_FOUND)
            .header("x-ok", "yes")
            .header("bad header", "no")
            .body("{}")
            .build();

        let out = to_hyper_response(res);
        assert_eq!(out.status(), 404);
        assert_eq!(out.headers()["x-ok"], "yes");
        assert_eq!(out.headers().len(), 1);
    }

    #[tokio::test]
    async fn test_connection_tracker() {
        let tracker = ConnectionTracker::new();
        tracker.increment();
        assert_eq!(tracker.count(), 1);
        assert!(!tracker.wait_idle(Duration::from_millis(30)).await);

        tracker.decrement();
        assert!(tracker.wait_idle(Duration::from_millis(30)).await);
    }
}
