//! Per-request access logging.
//!
//! Wraps any Tower HTTP service and emits exactly one INFO record per request
//! once the wrapped service has produced its response. The record's message is
//! the request path.
//!
//! # Example Logs
//!
//! ```text
//! {"level":"info","time":1700000000123,"msg":"/subdir/asdf","hostname":"web-1","pid":4242,
//!  "reqId":"5c1e…","method":"GET","status":200,"path":"/subdir/asdf","query":"",
//!  "ip":"10.0.0.7","user_agent":"curl/8.5.0","duration":0.000412}
//! ```
//!
//! # Integration
//!
//! ```rust,ignore
//! let app = Router::new()
//!     .route("/health", get(health_handler))
//!     .layer(request_logger::layer(logger));
//! ```

use std::future::Future;
use std::net::SocketAddr;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::{Duration, Instant};

use axum::extract::ConnectInfo;
use axum::http::{HeaderMap, Request, Response, StatusCode, header};
use tower::{Layer, Service};
use tracing::Span;

use crate::logging::Logger;

/// Header carrying the correlation id, set by `SetRequestIdLayer` or the client.
pub const X_REQUEST_ID: &str = "x-request-id";

type BoxFuture<T> = Pin<Box<dyn Future<Output = T> + Send + 'static>>;

/// Creates the request logging layer for `logger`.
pub fn layer(logger: Logger) -> RequestLoggerLayer {
    RequestLoggerLayer::new(logger)
}

/// [`Layer`] that wraps services in a [`RequestLogger`].
#[derive(Debug, Clone)]
pub struct RequestLoggerLayer {
    logger: Logger,
}

impl RequestLoggerLayer {
    pub fn new(logger: Logger) -> Self {
        Self { logger }
    }
}

impl<S> Layer<S> for RequestLoggerLayer {
    type Service = RequestLogger<S>;

    fn layer(&self, inner: S) -> Self::Service {
        RequestLogger {
            inner,
            logger: self.logger.clone(),
        }
    }
}

/// Service emitting one access-log record per request.
///
/// The response is passed through untouched.
#[derive(Debug, Clone)]
pub struct RequestLogger<S> {
    inner: S,
    logger: Logger,
}

impl<S, ReqBody, ResBody> Service<Request<ReqBody>> for RequestLogger<S>
where
    S: Service<Request<ReqBody>, Response = Response<ResBody>> + 'static,
    S::Future: Send + 'static,
    ReqBody: 'static,
    ResBody: 'static,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = BoxFuture<Result<Self::Response, Self::Error>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: Request<ReqBody>) -> Self::Future {
        let entry = AccessEntry::from_request(&req);
        let logger = self.logger.clone();
        let start = Instant::now();

        let future = self.inner.call(req);

        Box::pin(async move {
            let result = future.await;

            // Service errors carry no response; they are recorded as 500.
            let status = match &result {
                Ok(response) => response.status(),
                Err(_) => StatusCode::INTERNAL_SERVER_ERROR,
            };
            entry.emit(&logger, status, start.elapsed());

            result
        })
    }
}

/// Request attributes captured before the request is handed on.
#[derive(Debug)]
struct AccessEntry {
    method: String,
    path: String,
    query: String,
    ip: String,
    user_agent: String,
    request_id: Option<String>,
}

impl AccessEntry {
    fn from_request<B>(req: &Request<B>) -> Self {
        let ip = req
            .extensions()
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| addr.ip().to_string())
            .unwrap_or_default();

        Self {
            method: req.method().to_string(),
            path: req.uri().path().to_string(),
            query: req.uri().query().unwrap_or_default().to_string(),
            ip,
            user_agent: header_str(req.headers(), header::USER_AGENT.as_str()).unwrap_or_default(),
            request_id: header_str(req.headers(), X_REQUEST_ID),
        }
    }

    fn emit(&self, logger: &Logger, status: StatusCode, elapsed: Duration) {
        logger.in_scope(|| {
            let span = match self.request_id.as_deref() {
                Some(id) => logger.with_request_id(id),
                None => Span::none(),
            };
            let _entered = span.enter();

            tracing::info!(
                method = %self.method,
                status = status.as_u16(),
                path = %self.path,
                query = %self.query,
                ip = %self.ip,
                user_agent = %self.user_agent,
                duration = elapsed.as_secs_f64(),
                "{}",
                self.path
            );
        });
    }
}

fn header_str(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::to_owned)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logging::{LoggerConfig, MemorySink, Severity};
    use axum::body::Body;
    use std::convert::Infallible;
    use tower::{ServiceExt, service_fn};

    fn test_logger() -> (Logger, MemorySink) {
        let sink = MemorySink::new();
        let config = LoggerConfig {
            level: Severity::Debug,
            ..LoggerConfig::default()
        };
        (config.build_with_writer(sink.clone()), sink)
    }

    #[tokio::test]
    async fn test_logs_one_record_with_status() {
        let (logger, sink) = test_logger();
        let svc = layer(logger).layer(service_fn(|_req: Request<Body>| async {
            Ok::<_, Infallible>(
                Response::builder()
                    .status(StatusCode::CREATED)
                    .body(Body::empty())
                    .unwrap(),
            )
        }));

        let req = Request::builder()
            .method("POST")
            .uri("/items?limit=5")
            .header(header::USER_AGENT, "unit-test")
            .body(Body::empty())
            .unwrap();
        let res = svc.oneshot(req).await.unwrap();
        assert_eq!(res.status(), StatusCode::CREATED);

        let records = sink.json_records().unwrap();
        assert_eq!(records.len(), 1);
        let record = &records[0];
        assert_eq!(record["level"], "info");
        assert_eq!(record["msg"], "/items");
        assert_eq!(record["method"], "POST");
        assert_eq!(record["status"], 201);
        assert_eq!(record["path"], "/items");
        assert_eq!(record["query"], "limit=5");
        assert_eq!(record["user_agent"], "unit-test");
        assert_eq!(record["ip"], "");
        assert!(record["duration"].as_f64().unwrap() >= 0.0);
        assert!(record.get("reqId").is_none());
    }

    #[tokio::test]
    async fn test_request_id_header_becomes_field() {
        let (logger, sink) = test_logger();
        let svc = layer(logger).layer(service_fn(|_req: Request<Body>| async {
            Ok::<_, Infallible>(Response::new(Body::empty()))
        }));

        let req = Request::builder()
            .uri("/")
            .header(X_REQUEST_ID, "abc-123")
            .body(Body::empty())
            .unwrap();
        svc.oneshot(req).await.unwrap();

        let record = &sink.json_records().unwrap()[0];
        assert_eq!(record["reqId"], "abc-123");
        assert_eq!(record["status"], 200);
    }

    #[tokio::test]
    async fn test_peer_address_from_connect_info() {
        let (logger, sink) = test_logger();
        let svc = layer(logger).layer(service_fn(|_req: Request<Body>| async {
            Ok::<_, Infallible>(Response::new(Body::empty()))
        }));

        let mut req = Request::builder().uri("/").body(Body::empty()).unwrap();
        let addr: SocketAddr = "10.0.0.7:51000".parse().unwrap();
        req.extensions_mut().insert(ConnectInfo(addr));
        svc.oneshot(req).await.unwrap();

        assert_eq!(sink.json_records().unwrap()[0]["ip"], "10.0.0.7");
    }

    #[tokio::test]
    async fn test_service_error_still_logged() {
        let (logger, sink) = test_logger();
        let svc = layer(logger).layer(service_fn(|_req: Request<Body>| async {
            Err::<Response<Body>, _>(std::io::Error::other("upstream gone"))
        }));

        let req = Request::builder().uri("/boom").body(Body::empty()).unwrap();
        assert!(svc.oneshot(req).await.is_err());

        let records = sink.json_records().unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0]["status"], 500);
    }

    #[tokio::test]
    async fn test_level_above_info_suppresses_records_not_responses() {
        let sink = MemorySink::new();
        let config = LoggerConfig {
            level: Severity::Error,
            ..LoggerConfig::default()
        };
        let logger = config.build_with_writer(sink.clone());
        let svc = layer(logger).layer(service_fn(|_req: Request<Body>| async {
            Ok::<_, Infallible>(
                Response::builder()
                    .status(StatusCode::NOT_FOUND)
                    .header("x-custom", "kept")
                    .body(Body::from("missing"))
                    .unwrap(),
            )
        }));

        let req = Request::builder().uri("/gone").body(Body::empty()).unwrap();
        let res = svc.oneshot(req).await.unwrap();

        assert_eq!(res.status(), StatusCode::NOT_FOUND);
        assert_eq!(res.headers()["x-custom"], "kept");
        assert!(sink.lines().is_empty());
    }
}
