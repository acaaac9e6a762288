// handlers/health.rs - GET /health, /health/ready, /health/jwt

use axum::extract::State;
use serde_json::{json, Value};

use crate::app::AppState;
use crate::middleware::response::{ApiResponse, ApiResult};

pub async fn health(State(state): State<AppState>) -> ApiResponse<Value> {
    let report = &state.report;
    let status = if report.success { "ok" } else { "degraded" };

    ApiResponse::healthy_if(
        report.success,
        json!({
            "status": status,
            "timestamp": chrono::Utc::now(),
            "environment": state.config.environment,
            "startup": {
                "skipped": report.skipped,
                "passed": report.passed,
                "total": report.total_checks,
                "failed_non_critical": report.failed_non_critical,
            }
        }),
    )
}

pub async fn ready(State(state): State<AppState>) -> ApiResponse<Value> {
    ApiResponse::healthy_if(state.report.success, json!({ "ready": state.report.success }))
}

/// Secret fingerprint (never the secret) so peers can confirm they sign with the same key.
pub async fn jwt(State(state): State<AppState>) -> ApiResult<Value> {
    let resolved = state.jwt.get_resolved()?;

    Ok(ApiResponse::success(json!({
        "fingerprint": resolved.fingerprint(),
        "source": resolved.source.to_string(),
        "environment": state.jwt.environment(),
    })))
}
