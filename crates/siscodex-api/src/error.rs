//! API error type and [`axum::response::IntoResponse`] implementation.

use axum::{
  Json,
  http::StatusCode,
  response::{IntoResponse, Response},
};
use serde_json::json;
use siscodex_batch::WorkflowError;
use siscodex_core::validate::FieldError;
use thiserror::Error;

/// An error returned by an API handler.
#[derive(Debug, Error)]
pub enum ApiError {
  #[error("not found: {0}")]
  NotFound(String),

  #[error("bad request: {0}")]
  BadRequest(String),

  #[error("validation failed")]
  Validation(Vec<FieldError>),

  #[error("conflict: {0}")]
  Conflict(String),

  #[error("repository error: {0}")]
  Repository(#[source] Box<dyn std::error::Error + Send + Sync>),

  #[error("internal error: {0}")]
  Internal(String),
}

impl From<WorkflowError> for ApiError {
  fn from(err: WorkflowError) -> Self {
    match err {
      WorkflowError::UnknownGroup(id) => Self::NotFound(format!("group {id}")),
      WorkflowError::Validation(field) => Self::Validation(vec![field]),
      WorkflowError::InvalidTexts(fields) => Self::Validation(fields),
      WorkflowError::Repository(e) => Self::Repository(e),
      WorkflowError::Core(e) => e.into(),
      e @ WorkflowError::Task(_) => Self::Internal(e.to_string()),
      e @ (WorkflowError::IllegalTransition { .. }
      | WorkflowError::WrongMode { .. }
      | WorkflowError::OperationPending
      | WorkflowError::EmptySelection
      | WorkflowError::NotLoaded) => Self::Conflict(e.to_string()),
    }
  }
}

impl From<siscodex_core::Error> for ApiError {
  fn from(err: siscodex_core::Error) -> Self {
    use siscodex_core::Error;
    match err {
      Error::GroupNotFound(id) => Self::NotFound(format!("group {id}")),
      e @ Error::InvalidTermId(_) => Self::BadRequest(e.to_string()),
      e => Self::Internal(e.to_string()),
    }
  }
}

impl IntoResponse for ApiError {
  fn into_response(self) -> Response {
    let status = match &self {
      ApiError::NotFound(_) => StatusCode::NOT_FOUND,
      ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
      ApiError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
      ApiError::Conflict(_) => StatusCode::CONFLICT,
      ApiError::Repository(_) => StatusCode::BAD_GATEWAY,
      ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    if status.is_server_error() {
      tracing::error!(error = %self, "request failed");
    }
    let body = match &self {
      ApiError::Validation(fields) => json!({ "error": self.to_string(), "fields": fields }),
      _ => json!({ "error": self.to_string() }),
    };
    (status, Json(body)).into_response()
  }
}
