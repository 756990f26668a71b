//! Passthrough proxy for the upstream government school-data API.
//!
//! `ANY /api/udise/{*path}` forwards the method, sub-path, query string, and
//! body upstream, then relays the upstream status and body verbatim. Only a
//! transport-level failure becomes a 500 here; upstream error statuses pass
//! through untouched.

use axum::{
  body::Body,
  extract::{Path, Request, State},
  http::header,
  response::Response,
};
use bytes::Bytes;
use shala_core::store::{IdentityStore, SchoolStore};

use crate::{AppState, auth::CurrentUser, error::Error};

/// Largest request body the proxy will buffer for forwarding.
const MAX_PROXY_BODY: usize = 8 * 1024 * 1024;

/// `ANY /api/udise/{*path}`
pub async fn forward<S>(
  State(state): State<AppState<S>>,
  _user: CurrentUser,
  Path(path): Path<String>,
  req: Request,
) -> Result<Response, Error>
where
  S: SchoolStore + IdentityStore + Clone + Send + Sync + 'static,
{
  let method = req.method().clone();
  let query = req
    .uri()
    .query()
    .map(|q| format!("?{q}"))
    .unwrap_or_default();
  let url = format!(
    "{}/{path}{query}",
    state.config.udise_base_url.trim_end_matches('/')
  );

  let content_type = req.headers().get(header::CONTENT_TYPE).cloned();
  let body: Bytes = axum::body::to_bytes(req.into_body(), MAX_PROXY_BODY)
    .await
    .map_err(|_| {
      Error::BadRequest("request body too large".to_owned())
    })?;

  tracing::debug!(%method, %url, "proxying upstream request");

  let mut upstream = state.http.request(method, &url);
  if let Some(ct) = content_type {
    upstream = upstream.header(header::CONTENT_TYPE, ct);
  }
  let response = upstream.body(body).send().await?;

  let status = response.status();
  let upstream_type = response.headers().get(header::CONTENT_TYPE).cloned();
  let bytes = response.bytes().await?;

  let mut builder = Response::builder().status(status);
  if let Some(ct) = upstream_type {
    builder = builder.header(header::CONTENT_TYPE, ct);
  }
  Ok(builder.body(Body::from(bytes))?)
}
