//! Admin HTTP surface.
//!
//! # Responsibilities
//! - Expose aggregated and per-worker health
//! - Expose per-service call statistics
//! - Let an operator force a cleanup run
//!
//! # Design Decisions
//! - Every route sits behind the optional bearer key
//! - Admin traffic is never recorded as service calls; `/health` must not
//!   judge its own responses. `recording::record_calls` is meant for the
//!   application router instead

pub mod auth;
pub mod handlers;
pub mod recording;

use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use crate::workers::WorkerManager;
use self::auth::admin_auth_middleware;
use self::handlers::*;

/// Shared state for admin handlers.
#[derive(Clone)]
pub struct AdminState {
    pub manager: Arc<WorkerManager>,
    pub api_key: Option<Arc<str>>,
}

impl AdminState {
    pub fn new(manager: Arc<WorkerManager>, api_key: Option<String>) -> Self {
        Self {
            manager,
            api_key: api_key.filter(|k| !k.is_empty()).map(Arc::from),
        }
    }
}

pub fn setup_admin_router(state: AdminState) -> Router {
    Router::new()
        .route("/health", get(get_health))
        .route("/health/audit", get(get_audit))
        .route("/health/services", get(get_service_health))
        .route("/services", get(list_services))
        .route("/services/{name}", get(get_service))
        .route("/cleanup", post(trigger_cleanup))
        .layer(middleware::from_fn_with_state(state.clone(), admin_auth_middleware))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
