use crate::handlers::AppState;
use axum::{extract::State, http::StatusCode, response::Json};
use serde::Serialize;
use std::time::Instant;
use tracing::error;

const DATABASE_UNREACHABLE: &str = "database unreachable";

/// Component health status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ComponentStatus {
    Up,
    Down,
}

#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    pub status: ComponentStatus,
    pub version: &'static str,
    pub timestamp: String,
    pub database: ComponentStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub database_error: Option<String>,
    pub latency_ms: u64,
}

/// Readiness check: answers 503 when the database cannot be reached.
pub async fn health(State(state): State<AppState>) -> (StatusCode, Json<HealthResponse>) {
    let started = Instant::now();
    let db_result = crate::db::check_connection(&state.db).await;
    let latency_ms = started.elapsed().as_millis() as u64;

    let (status, code, database_error) = match db_result {
        Ok(()) => (ComponentStatus::Up, StatusCode::OK, None),
        Err(e) => {
            error!(error = %e, latency_ms, "health check: database unreachable");
            (
                ComponentStatus::Down,
                StatusCode::SERVICE_UNAVAILABLE,
                Some(DATABASE_UNREACHABLE.to_string()),
            )
        }
    };

    (
        code,
        Json(HealthResponse {
            status,
            version: env!("CARGO_PKG_VERSION"),
            timestamp: chrono::Utc::now().to_rfc3339(),
            database: status,
            database_error,
            latency_ms,
        }),
    )
}
