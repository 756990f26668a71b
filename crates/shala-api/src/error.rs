//! API error type and [`axum::response::IntoResponse`] implementation.

use axum::{
  Json,
  http::StatusCode,
  response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

/// An error returned by an API handler.
#[derive(Debug, Error)]
pub enum Error {
  #[error("unauthorized")]
  Unauthorized,

  #[error("forbidden: {0}")]
  Forbidden(String),

  #[error("bad request: {0}")]
  BadRequest(String),

  #[error("not found: {0}")]
  NotFound(String),

  #[error("upstream request failed: {0}")]
  Upstream(#[from] reqwest::Error),

  #[error("response build error: {0}")]
  Http(#[from] axum::http::Error),

  #[error("store error: {0}")]
  Store(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl Error {
  /// Wrap a storage-backend error.
  pub fn store<E>(err: E) -> Self
  where
    E: std::error::Error + Send + Sync + 'static,
  {
    Self::Store(Box::new(err))
  }
}

impl IntoResponse for Error {
  fn into_response(self) -> Response {
    match self {
      Error::Unauthorized => (
        StatusCode::UNAUTHORIZED,
        Json(json!({ "error": "invalid or missing token" })),
      )
        .into_response(),
      Error::Forbidden(msg) => {
        (StatusCode::FORBIDDEN, Json(json!({ "error": msg }))).into_response()
      }
      Error::BadRequest(msg) => {
        (StatusCode::BAD_REQUEST, Json(json!({ "error": msg }))).into_response()
      }
      Error::NotFound(msg) => {
        (StatusCode::NOT_FOUND, Json(json!({ "error": msg }))).into_response()
      }
      Error::Upstream(e) => (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({
          "message": "failed to reach upstream service",
          "error": e.to_string(),
        })),
      )
        .into_response(),
      Error::Http(e) => (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({ "message": "internal error", "error": e.to_string() })),
      )
        .into_response(),
      Error::Store(e) => (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({ "message": "internal error", "error": e.to_string() })),
      )
        .into_response(),
    }
  }
}
