// src/server/handler.rs
use crate::health::{Outcome, Report, Status};
use crate::metrics::MetricsCollector;
use futures::future::BoxFuture;
use hyper::header::{HeaderValue, CONTENT_TYPE};
use hyper::{Body, Method, Request, Response, StatusCode};
use std::convert::Infallible;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Instant;
use tower::Service;
use tracing::{debug, error, info, info_span, Instrument};
use uuid::Uuid;

pub const DEFAULT_HEALTHCHECK_PATH: &str = "/healthcheck";

/// Builds a fresh report of unevaluated probes. Called once per request.
pub type ReportProvider<O> = Arc<dyn Fn() -> Report<O> + Send + Sync>;

/// Serves `GET <path>` by evaluating the provided report.
///
/// All probes healthy answers `200 OK`, any failed probe answers
/// `503 Service Unavailable`; both carry the JSON report. Every other method
/// or path is `404 Not Found`. Nothing is shared between requests.
pub struct HealthCheckHandler<O> {
    provider: ReportProvider<O>,
    path: Arc<str>,
    metrics: Option<Arc<MetricsCollector>>,
}

impl<O> Clone for HealthCheckHandler<O> {
    fn clone(&self) -> Self {
        Self {
            provider: self.provider.clone(),
            path: self.path.clone(),
            metrics: self.metrics.clone(),
        }
    }
}

impl<O: Outcome> HealthCheckHandler<O> {
    pub fn new<F>(provider: F) -> Self
    where
        F: Fn() -> Report<O> + Send + Sync + 'static,
    {
        Self {
            provider: Arc::new(provider),
            path: Arc::from(DEFAULT_HEALTHCHECK_PATH),
            metrics: None,
        }
    }

    pub fn with_path(mut self, path: impl AsRef<str>) -> Self {
        self.path = Arc::from(path.as_ref());
        self
    }

    pub fn with_metrics(mut self, metrics: Arc<MetricsCollector>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub async fn handle(&self, req: Request<Body>) -> Response<Body> {
        if req.method() != Method::GET || req.uri().path() != &*self.path {
            debug!(method = %req.method(), path = req.uri().path(), "no route");
            return not_found();
        }

        let report = (self.provider)();
        let started = Instant::now();

        let (status, resolved) = report
            .fold(
                |healthy| (StatusCode::OK, healthy),
                |failed| (StatusCode::SERVICE_UNAVAILABLE, failed),
            )
            .await;

        if let Some(metrics) = &self.metrics {
            metrics.record_evaluation(&resolved, started.elapsed());
        }

        info!(status = status.as_u16(), probes = resolved.len(), "Health check answered");
        json_response(status, &resolved)
    }
}

impl<O: Outcome> Service<Request<Body>> for HealthCheckHandler<O> {
    type Response = Response<Body>;
    type Error = Infallible;
    type Future = BoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: Request<Body>) -> Self::Future {
        let handler = self.clone();
        let span = info_span!("healthcheck", request_id = %Uuid::new_v4());
        Box::pin(async move { Ok(handler.handle(req).await) }.instrument(span))
    }
}

fn json_response(status: StatusCode, report: &Report<Status>) -> Response<Body> {
    match serde_json::to_vec(report) {
        Ok(body) => {
            let mut response = Response::new(Body::from(body));
            *response.status_mut() = status;
            response
                .headers_mut()
                .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
            response
        }
        Err(e) => {
            error!(%e, "failed to serialize health report");
            let mut response = Response::new(Body::from("Internal Server Error"));
            *response.status_mut() = StatusCode::INTERNAL_SERVER_ERROR;
            response
        }
    }
}

fn not_found() -> Response<Body> {
    let mut response = Response::new(Body::from("Not Found"));
    *response.status_mut() = StatusCode::NOT_FOUND;
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::health::Deferred;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tower::ServiceExt;

    fn get(path: &str) -> Request<Body> {
        Request::builder().uri(path).body(Body::empty()).unwrap()
    }

    #[tokio::test]
    async fn test_provider_called_per_request() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let handler = HealthCheckHandler::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
            Report::new("service", Deferred::from(Status::Healthy)).unwrap()
        });

        for _ in 0..3 {
            let response = handler.clone().oneshot(get("/healthcheck")).await.unwrap();
            assert_eq!(response.status(), StatusCode::OK);
        }
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_other_routes_are_not_found() {
        let handler = HealthCheckHandler::new(|| Report::new("service", Status::Healthy).unwrap());

        let response = handler.clone().oneshot(get("/health")).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let post = Request::builder()
            .method(Method::POST)
            .uri("/healthcheck")
            .body(Body::empty())
            .unwrap();
        let response = handler.oneshot(post).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_custom_path_and_content_type() {
        let handler = HealthCheckHandler::new(|| Report::new("service", Status::Healthy).unwrap())
            .with_path("/status");

        let response = handler.oneshot(get("/status")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers().get(CONTENT_TYPE).unwrap(),
            "application/json"
        );
    }
}
