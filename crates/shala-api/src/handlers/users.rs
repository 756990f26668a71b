//! Handlers for user administration. Every route requires an admin or
//! super-admin caller.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `GET`    | `/api/users` | all accounts, oldest first |
//! | `PUT`    | `/api/users/{id}` | Body: [`UserUpdate`] |
//! | `DELETE` | `/api/users/{id}` | removes the account and its sessions |
//! | `GET`    | `/api/users/stats` | account totals |

use axum::{
  Json,
  extract::{Path, State},
};
use serde_json::{Value, json};
use shala_core::{
  store::{IdentityStore, SchoolStore},
  user::UserUpdate,
};
use uuid::Uuid;

use crate::{AppState, auth::AdminUser, error::Error};

/// `GET /api/users`
pub async fn list<S>(
  State(state): State<AppState<S>>,
  _admin: AdminUser,
) -> Result<Json<Value>, Error>
where
  S: SchoolStore + IdentityStore + Clone + Send + Sync + 'static,
{
  let users = state.store.list_users().await.map_err(Error::store)?;
  Ok(Json(json!({ "success": true, "users": users })))
}

/// `PUT /api/users/{id}`
pub async fn update<S>(
  State(state): State<AppState<S>>,
  _admin: AdminUser,
  Path(id): Path<Uuid>,
  Json(update): Json<UserUpdate>,
) -> Result<Json<Value>, Error>
where
  S: SchoolStore + IdentityStore + Clone + Send + Sync + 'static,
{
  let user = state
    .store
    .update_user(id, update)
    .await
    .map_err(Error::store)?
    .ok_or_else(|| Error::NotFound(format!("no user with id {id}")))?;
  Ok(Json(json!({ "success": true, "user": user })))
}

/// `DELETE /api/users/{id}`
pub async fn remove<S>(
  State(state): State<AppState<S>>,
  _admin: AdminUser,
  Path(id): Path<Uuid>,
) -> Result<Json<Value>, Error>
where
  S: SchoolStore + IdentityStore + Clone + Send + Sync + 'static,
{
  let deleted = state
    .store
    .delete_user(id)
    .await
    .map_err(Error::store)?;
  if !deleted {
    return Err(Error::NotFound(format!("no user with id {id}")));
  }
  Ok(Json(json!({ "success": true, "message": "user deleted" })))
}

/// `GET /api/users/stats`
pub async fn stats<S>(
  State(state): State<AppState<S>>,
  _admin: AdminUser,
) -> Result<Json<Value>, Error>
where
  S: SchoolStore + IdentityStore + Clone + Send + Sync + 'static,
{
  let stats = state.store.user_stats().await.map_err(Error::store)?;
  Ok(Json(json!({ "success": true, "stats": stats })))
}
