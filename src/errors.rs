use crate::services::error::SlicerError;
use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use std::fmt;

/// A lightweight wrapper for general errors that keeps the message local.
#[derive(Debug)]
pub struct AppError {
    pub status: StatusCode,
    pub message: String,
}

impl AppError {
    /// Create a new AppError with a specific status and message.
    pub fn new(status: StatusCode, msg: impl Into<String>) -> Self {
        Self {
            status,
            message: msg.into(),
        }
    }

    /// Shortcut for a 500 Internal Server Error
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, msg)
    }

    /// Shortcut for 403 Forbidden
    pub fn forbidden(msg: impl Into<String>) -> Self {
        Self::new(StatusCode::FORBIDDEN, msg)
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for AppError {}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = Json(json!({
            "error": self.message,
            "status": self.status.as_u16()
        }));

        (self.status, body).into_response()
    }
}

impl From<SlicerError> for AppError {
    fn from(err: SlicerError) -> Self {
        let status = match &err {
            SlicerError::SourceNotFound(_)
            | SlicerError::ObjectNotFound(_)
            | SlicerError::GroupingContainerMissing(_)
            | SlicerError::ContainerMissing(_) => StatusCode::NOT_FOUND,
            SlicerError::DuplicateObject(_) | SlicerError::MetadataInconsistency { .. } => {
                StatusCode::CONFLICT
            }
            SlicerError::EmptySource(_) | SlicerError::InvalidObjectName(_) => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            SlicerError::NoPartsFound(_) => StatusCode::GONE,
            SlicerError::StorageUnavailable(_)
            | SlicerError::Migration(_)
            | SlicerError::TransportUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            SlicerError::PartialTransfer { .. }
            | SlicerError::MergeFailed { .. }
            | SlicerError::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        Self::new(status, err.to_string())
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::internal(err.to_string())
    }
}
