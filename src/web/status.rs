//! Health and status handlers.

use axum::extract::State;
use axum::response::Json;
use serde::Serialize;
use serde_json::{Value, json};
use std::collections::BTreeMap;
use tracing::trace;

use crate::state::{AppState, ServiceStatus};

#[derive(Serialize)]
pub struct StatusResponse {
    status: ServiceStatus,
    version: String,
    commit: String,
    identities: usize,
    services: BTreeMap<String, ServiceStatus>,
}

/// Health check endpoint
pub(super) async fn health() -> Json<Value> {
    trace!("health check requested");
    Json(json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now().to_rfc3339()
    }))
}

/// Overall status rolled up from the service registry.
pub(super) fn overall_status(services: &BTreeMap<String, ServiceStatus>) -> ServiceStatus {
    if services.is_empty() {
        ServiceStatus::Disabled
    } else if services.values().any(|s| *s == ServiceStatus::Error) {
        ServiceStatus::Error
    } else if services.values().any(|s| *s == ServiceStatus::Starting) {
        ServiceStatus::Starting
    } else {
        ServiceStatus::Active
    }
}

pub(super) async fn status(State(state): State<AppState>) -> Json<StatusResponse> {
    let services: BTreeMap<_, _> = state.service_statuses.all().into_iter().collect();

    Json(StatusResponse {
        status: overall_status(&services),
        version: env!("CARGO_PKG_VERSION").to_string(),
        commit: env!("GIT_COMMIT_HASH").to_string(),
        identities: state.pipeline.store().len(),
        services,
    })
}
