//! Handlers for sign-in and session management.
//!
//! | Method | Path | Auth | Notes |
//! |--------|------|------|-------|
//! | `POST` | `/api/auth/google` | public | upserts the user, issues a token |
//! | `POST` | `/api/auth/logout` | public | revokes the presented token |
//! | `GET`  | `/api/auth/profile` | bearer | the caller's account |
//! | `GET`  | `/api/auth/cleanup-tokens` | public | purges expired sessions |

use axum::{Json, extract::State, http::HeaderMap};
use serde_json::{Value, json};
use shala_core::{
  store::{IdentityStore, SchoolStore},
  user::GoogleProfile,
};

use crate::{
  AppState,
  auth::{CurrentUser, bearer_token},
  error::Error,
};

/// `POST /api/auth/google`
pub async fn google<S>(
  State(state): State<AppState<S>>,
  Json(profile): Json<GoogleProfile>,
) -> Result<Json<Value>, Error>
where
  S: SchoolStore + IdentityStore + Clone + Send + Sync + 'static,
{
  let user = state
    .store
    .upsert_google_user(profile)
    .await
    .map_err(Error::store)?;
  let issued = state
    .store
    .issue_token(user.user_id)
    .await
    .map_err(Error::store)?;

  tracing::info!(email = %user.email, "user signed in");
  Ok(Json(json!({
    "success": true,
    "token": issued.token,
    "expiresAt": issued.expires_at,
    "user": user,
  })))
}

/// `POST /api/auth/logout`
///
/// Public: revoking an absent or unknown token is a successful no-op, so a
/// client with a stale session can always log out.
pub async fn logout<S>(
  State(state): State<AppState<S>>,
  headers: HeaderMap,
) -> Result<Json<Value>, Error>
where
  S: SchoolStore + IdentityStore + Clone + Send + Sync + 'static,
{
  if let Some(token) = bearer_token(&headers) {
    state
      .store
      .revoke_token(token)
      .await
      .map_err(Error::store)?;
  }
  Ok(Json(json!({ "success": true, "message": "logged out" })))
}

/// `GET /api/auth/profile`
pub async fn profile(
  CurrentUser(user): CurrentUser,
) -> Result<Json<Value>, Error> {
  Ok(Json(json!({ "success": true, "user": user })))
}

/// `GET /api/auth/cleanup-tokens`
pub async fn cleanup_tokens<S>(
  State(state): State<AppState<S>>,
) -> Result<Json<Value>, Error>
where
  S: SchoolStore + IdentityStore + Clone + Send + Sync + 'static,
{
  let removed = state
    .store
    .purge_expired_tokens()
    .await
    .map_err(Error::store)?;
  Ok(Json(json!({ "success": true, "removed": removed })))
}
