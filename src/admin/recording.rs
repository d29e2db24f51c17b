//! Call-recording middleware for application routers.

use axum::{
    body::Body,
    extract::State,
    http::Request,
    middleware::{self, Next},
    response::Response,
    Router,
};
use std::sync::Arc;
use std::time::Instant;

use crate::workers::HealthMonitorWorker;

/// Wrap an application router so every completed request is recorded
/// against the service named by its first path segment.
pub fn with_call_recording<S>(router: Router<S>, monitor: Arc<HealthMonitorWorker>) -> Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    router.layer(middleware::from_fn_with_state(monitor, record_calls))
}

/// Records the request's status and latency. Requests to `/` are not
/// recorded.
pub async fn record_calls(
    State(monitor): State<Arc<HealthMonitorWorker>>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let service = service_name(request.uri().path()).map(str::to_owned);
    let started = Instant::now();
    let response = next.run(request).await;

    if let Some(service) = service {
        monitor.record_call(&service, response.status().as_u16(), started.elapsed());
    }
    response
}

fn service_name(path: &str) -> Option<&str> {
    path.trim_start_matches('/')
        .split('/')
        .next()
        .filter(|segment| !segment.is_empty())
}
