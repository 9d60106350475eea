use axum::{
    Json,
    extract::rejection::{JsonRejection, PathRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::{Value, json};
use thiserror::Error;
use tracing::error;
use validator::ValidationErrors;

use crate::store::StoreError;

pub type ApiResult<T> = Result<T, ApiError>;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("{0}")]
    NotFound(String),

    #[error("{message}")]
    Validation {
        message: String,
        details: Option<Value>,
    },

    #[error("{0}")]
    DuplicateKey(String),

    #[error("invalid email or password")]
    Unauthorized,

    #[error(transparent)]
    StorageUnavailable(StoreError),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl ApiError {
    pub fn validation(message: impl Into<String>) -> Self {
        ApiError::Validation {
            message: message.into(),
            details: None,
        }
    }

    fn status(&self) -> StatusCode {
        match self {
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Validation { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::DuplicateKey(_) => StatusCode::CONFLICT,
            ApiError::Unauthorized => StatusCode::UNAUTHORIZED,
            ApiError::StorageUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn code(&self) -> &'static str {
        match self {
            ApiError::NotFound(_) => "not_found",
            ApiError::Validation { .. } => "validation_error",
            ApiError::DuplicateKey(_) => "duplicate_key",
            ApiError::Unauthorized => "unauthorized",
            ApiError::StorageUnavailable(_) => "storage_unavailable",
            ApiError::Internal(_) => "internal_error",
        }
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound { .. } => ApiError::NotFound(err.to_string()),
            StoreError::DuplicateKey { .. } => ApiError::DuplicateKey(err.to_string()),
            StoreError::StorageUnavailable { .. } => ApiError::StorageUnavailable(err),
            StoreError::Serialization { .. } => ApiError::Internal(err.into()),
        }
    }
}

impl From<ValidationErrors> for ApiError {
    fn from(errors: ValidationErrors) -> Self {
        ApiError::Validation {
            message: "request failed validation".to_string(),
            details: serde_json::to_value(&errors).ok(),
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::validation(rejection.body_text())
    }
}

impl From<PathRejection> for ApiError {
    fn from(rejection: PathRejection) -> Self {
        ApiError::validation(rejection.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();

        // Server-side failures are logged in full and redacted for the client.
        let message = if status.is_server_error() {
            error!(error = ?self, "request failed");
            if matches!(self, ApiError::StorageUnavailable(_)) {
                "storage is unavailable".to_string()
            } else {
                "internal server error".to_string()
            }
        } else {
            self.to_string()
        };

        let mut body = json!({
            "error": self.code(),
            "message": message,
        });
        if let ApiError::Validation {
            details: Some(details),
            ..
        } = &self
        {
            body["details"] = details.clone();
        }

        (status, Json(body)).into_response()
    }
}
