use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use crate::admin::AdminState;
use crate::registry::ServiceStats;
use crate::workers::{
    AggregatedHealth, AuditMetrics, CleanupReport, ServiceHealthReport, WorkerError,
};

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

impl IntoResponse for WorkerError {
    fn into_response(self) -> Response {
        let status = match &self {
            WorkerError::NotFound(_) => StatusCode::NOT_FOUND,
            WorkerError::AlreadyRunning(_) => StatusCode::CONFLICT,
            WorkerError::InvalidEntry(_) => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, Json(ErrorBody { error: self.to_string() })).into_response()
    }
}

pub async fn get_health(State(state): State<AdminState>) -> (StatusCode, Json<AggregatedHealth>) {
    let health = state.manager.health_status();
    let status = if health.healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (status, Json(health))
}

pub async fn get_audit(State(state): State<AdminState>) -> Json<AuditMetrics> {
    Json(state.manager.audit().metrics())
}

pub async fn get_service_health(State(state): State<AdminState>) -> Json<ServiceHealthReport> {
    let report = state.manager.health_monitor().service_health_status();
    Json(ServiceHealthReport::clone(&report))
}

pub async fn list_services(State(state): State<AdminState>) -> Json<Vec<String>> {
    Json(state.manager.health_monitor().get_all_services())
}

pub async fn get_service(
    State(state): State<AdminState>,
    Path(name): Path<String>,
) -> Result<Json<ServiceStats>, WorkerError> {
    state.manager.health_monitor().get_service_stats(&name).map(Json)
}

pub async fn trigger_cleanup(
    State(state): State<AdminState>,
) -> Result<Json<CleanupReport>, WorkerError> {
    state.manager.cleanup().trigger_cleanup_now().await.map(Json)
}
