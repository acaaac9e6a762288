// handlers/mod.rs - Public health endpoints and JWT-protected system endpoints
pub mod health;
pub mod system;

use axum::response::Json;
use serde_json::{json, Value};

use crate::error::ApiError;

pub async fn root() -> Json<Value> {
    let version = env!("CARGO_PKG_VERSION");

    Json(json!({
        "success": true,
        "data": {
            "name": "Sentinel API",
            "version": version,
            "endpoints": {
                "health": "/health (public)",
                "ready": "/health/ready (public)",
                "jwt": "/health/jwt (public - secret fingerprint for cross-service comparison)",
                "startup": "/api/system/startup (protected)",
                "whoami": "/api/system/whoami (protected)",
            }
        }
    }))
}

pub async fn not_found() -> ApiError {
    ApiError::not_found("Route not found")
}
