use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde::Serialize;
use serde_json::json;

/// Wrapper for API responses that adds the `{success, data}` envelope
#[derive(Debug)]
pub struct ApiResponse<T: Serialize> {
    pub data: T,
    pub success: bool,
    pub status_code: StatusCode,
}

impl<T: Serialize> ApiResponse<T> {
    /// Successful response with 200 status
    pub fn success(data: T) -> Self {
        Self {
            data,
            success: true,
            status_code: StatusCode::OK,
        }
    }

    /// 503 with `success: false`, still carrying data (health endpoints)
    pub fn unavailable(data: T) -> Self {
        Self {
            data,
            success: false,
            status_code: StatusCode::SERVICE_UNAVAILABLE,
        }
    }

    /// Pick between [`ApiResponse::success`] and [`ApiResponse::unavailable`]
    pub fn healthy_if(healthy: bool, data: T) -> Self {
        if healthy {
            Self::success(data)
        } else {
            Self::unavailable(data)
        }
    }
}

impl<T: Serialize> IntoResponse for ApiResponse<T> {
    fn into_response(self) -> Response {
        let data_value = match serde_json::to_value(&self.data) {
            Ok(value) => value,
            Err(e) => {
                tracing::error!("Failed to serialize response data: {}", e);
                return (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(json!({
                        "success": false,
                        "error": "Failed to serialize response data"
                    })),
                )
                    .into_response();
            }
        };

        let envelope = json!({
            "success": self.success,
            "data": data_value
        });

        (self.status_code, Json(envelope)).into_response()
    }
}

pub type ApiResult<T> = Result<ApiResponse<T>, crate::error::ApiError>;
