use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use chrono::Utc;
use serde_json::json;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Access denied: AI-generated content is restricted to authorized staff")]
    AiAccessDenied,

    #[error("Response could not be checked for AI-generated content")]
    FilterFailure,

    #[error("Unauthorized")]
    Unauthorized,
}

impl ApiError {
    pub fn code(&self) -> &'static str {
        match self {
            ApiError::AiAccessDenied => "AI_ACCESS_DENIED",
            ApiError::FilterFailure => "AI_FILTER_FAILURE",
            ApiError::Unauthorized => "UNAUTHORIZED",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::AiAccessDenied => StatusCode::FORBIDDEN,
            ApiError::Unauthorized => StatusCode::UNAUTHORIZED,
            ApiError::FilterFailure => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = json!({
            "success": false,
            "error": self.to_string(),
            "code": self.code(),
            "timestamp": Utc::now().to_rfc3339(),
        });

        (self.status(), Json(body)).into_response()
    }
}
