//! API error type and [`axum::response::IntoResponse`] implementation.

use axum::{
  Json,
  http::StatusCode,
  response::{IntoResponse, Response},
};
use handover_core::ErrorKind;
use serde_json::json;
use thiserror::Error;

/// An error returned by an API handler.
#[derive(Debug, Error)]
pub enum ApiError {
  #[error("bad request: {0}")]
  BadRequest(String),

  #[error(transparent)]
  Workflow(#[from] handover_core::Error),
}

impl ApiError {
  fn status(&self) -> StatusCode {
    let kind = match self {
      ApiError::BadRequest(_) => return StatusCode::BAD_REQUEST,
      ApiError::Workflow(e) => e.kind(),
    };
    match kind {
      ErrorKind::NotFound => StatusCode::NOT_FOUND,
      ErrorKind::Ambiguous => StatusCode::CONFLICT,
      ErrorKind::RemoteRejection => StatusCode::BAD_GATEWAY,
      ErrorKind::ExhaustedRetry => StatusCode::SERVICE_UNAVAILABLE,
      ErrorKind::Config => StatusCode::BAD_REQUEST,
      ErrorKind::Lookup | ErrorKind::Decode => StatusCode::INTERNAL_SERVER_ERROR,
    }
  }

  fn kind(&self) -> &'static str {
    match self {
      ApiError::BadRequest(_) => "bad_request",
      ApiError::Workflow(e) => e.kind().as_str(),
    }
  }
}

impl IntoResponse for ApiError {
  fn into_response(self) -> Response {
    let status = self.status();
    let body = json!({ "error": self.to_string(), "kind": self.kind() });
    (status, Json(body)).into_response()
  }
}
