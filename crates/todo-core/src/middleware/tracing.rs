//! Request tracing middleware
//!
//! Tags every request with an id and logs one line per completed request.

use super::Middleware;
use crate::{Request, Response};

/// Header carrying the request id, in and out
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Tracing configuration
#[derive(Clone)]
pub struct TracingConfig {
    /// Generate a request id when the client sent none
    pub generate_id: bool,
    /// Log incoming requests at debug level
    pub log_requests: bool,
    /// Log completed requests at info level
    pub log_responses: bool,
}

impl Default for TracingConfig {
    fn default() -> Self {
        Self {
            generate_id: true,
            log_requests: true,
            log_responses: true,
        }
    }
}

impl TracingConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn generate_id(mut self, generate: bool) -> Self {
        self.generate_id = generate;
        self
    }

    pub fn quiet(mut self) -> Self {
        self.log_requests = false;
        self.log_responses = false;
        self
    }
}

/// Generate a request id (UUID v4)
pub fn generate_request_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// Tracing middleware
#[derive(Default)]
pub struct Tracing {
    config: TracingConfig,
}

impl Tracing {
    pub fn new(config: TracingConfig) -> Self {
        Self { config }
    }

    fn request_id<'a>(&self, req: &'a Request) -> &'a str {
        req.header(REQUEST_ID_HEADER).unwrap_or("-")
    }
}

impl Middleware for Tracing {
    fn before(&self, req: &mut Request) -> Option<Response> {
        if req.header(REQUEST_ID_HEADER).is_none() && self.config.generate_id {
            req.headers
                .push((REQUEST_ID_HEADER.to_string(), generate_request_id()));
        }

        if self.config.log_requests {
            log::debug!(
                "[{}] {} {}{}",
                self.request_id(req),
                req.method,
                req.path,
                req.query.as_deref().map(|q| format!("?{}", q)).unwrap_or_default()
            );
        }

        None
    }

    fn after(&self, req: &Request, res: &mut Response) {
        if let Some(id) = req.header(REQUEST_ID_HEADER) {
            res.headers.push((REQUEST_ID_HEADER.to_string(), id.to_string()));
        }

        if self.config.log_responses {
            let elapsed = req.received_at.elapsed();
            let line = format!(
                "[{}] {} {} -> {} ({:.2}ms)",
                self.request_id(req),
                req.method,
                req.path,
                res.status.as_u16(),
                elapsed.as_secs_f64() * 1000.0
            );
            if res.status.is_server_error() {
                log::warn!("{}", line);
            } else {
                log::info!("{}", line);
            }
        }
    }
}
