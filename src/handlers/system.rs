// handlers/system.rs - GET /api/system/* (JWT required)

use axum::{extract::State, Extension};

use crate::app::AppState;
use crate::middleware::{ApiResponse, AuthUser};
use crate::startup::StartupReport;

pub async fn startup_report(State(state): State<AppState>) -> ApiResponse<StartupReport> {
    ApiResponse::success(state.report.as_ref().clone())
}

pub async fn whoami(Extension(user): Extension<AuthUser>) -> ApiResponse<serde_json::Value> {
    ApiResponse::success(serde_json::json!({
        "subject": user.subject,
        "token_type": user.token_type,
    }))
}
