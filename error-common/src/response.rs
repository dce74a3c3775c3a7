use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde::{Deserialize, Serialize};
use tracing::error;
use uuid::Uuid;

use crate::types::CareHubError;

/// JSON body returned for every failed API call
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiErrorResponse {
    /// Always `"error"`
    pub status: String,
    /// Human-readable error message
    pub message: String,
    pub error: ApiErrorDetail,
    /// Timestamp when error occurred
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ApiErrorDetail {
    /// Stable error code
    pub code: String,
    /// Unique error ID for correlating with server logs
    pub error_id: String,
}

impl CareHubError {
    /// Get HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::Integrity(_) => StatusCode::BAD_REQUEST,
            Self::Configuration(_)
            | Self::Module(_)
            | Self::Plugin(_)
            | Self::Crypto(_)
            | Self::Cache(_)
            | Self::Event(_)
            | Self::Internal(_)
            | Self::Other(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for CareHubError {
    fn into_response(self) -> Response {
        let error_id = Uuid::new_v4().to_string();
        let status_code = self.status_code();

        error!(
            error_id = %error_id,
            error_type = %self.error_type(),
            status_code = %status_code.as_u16(),
            error = %self,
            "API error occurred"
        );

        // Server-side failures are reported generically; details stay in the log
        let message = if status_code.is_server_error() {
            "Internal server error".to_string()
        } else {
            self.to_string()
        };

        let body = ApiErrorResponse {
            status: "error".to_string(),
            message,
            error: ApiErrorDetail {
                code: self.code().to_string(),
                error_id,
            },
            timestamp: chrono::Utc::now(),
        };

        (status_code, Json(body)).into_response()
    }
}
