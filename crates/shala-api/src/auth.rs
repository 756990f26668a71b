//! Bearer-token extractors.
//!
//! Tokens are opaque; the store resolves a presented token to its user and
//! enforces expiry. Handlers opt into authentication by taking a
//! [`CurrentUser`] parameter, and into the role gate by taking [`AdminUser`].

use axum::extract::FromRequestParts;
use axum::http::{HeaderMap, header, request::Parts};
use shala_core::{store::IdentityStore, user::User};

use crate::{AppState, error::Error};

/// The authenticated caller. Present in a handler signature means the
/// request carried a valid, unexpired token.
pub struct CurrentUser(pub User);

/// An authenticated caller whose role may manage user accounts.
pub struct AdminUser(pub User);

/// Pull the bearer token out of the `Authorization` header.
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
  headers
    .get(header::AUTHORIZATION)
    .and_then(|v| v.to_str().ok())
    .and_then(|v| v.strip_prefix("Bearer "))
}

/// Resolve the request's token to a user, or fail with 401.
pub async fn authenticate<S>(
  headers: &HeaderMap,
  state: &AppState<S>,
) -> Result<User, Error>
where
  S: IdentityStore,
{
  let token = bearer_token(headers).ok_or(Error::Unauthorized)?;
  state
    .store
    .resolve_token(token)
    .await
    .map_err(Error::store)?
    .ok_or(Error::Unauthorized)
}

impl<S> FromRequestParts<AppState<S>> for CurrentUser
where
  S: IdentityStore + Clone + Send + Sync + 'static,
{
  type Rejection = Error;

  async fn from_request_parts(
    parts: &mut Parts,
    state: &AppState<S>,
  ) -> Result<Self, Self::Rejection> {
    let user = authenticate(&parts.headers, state).await?;
    Ok(CurrentUser(user))
  }
}

impl<S> FromRequestParts<AppState<S>> for AdminUser
where
  S: IdentityStore + Clone + Send + Sync + 'static,
{
  type Rejection = Error;

  async fn from_request_parts(
    parts: &mut Parts,
    state: &AppState<S>,
  ) -> Result<Self, Self::Rejection> {
    let user = authenticate(&parts.headers, state).await?;
    if !user.role.can_manage_users() {
      return Err(Error::Forbidden(
        "admin role required".to_owned(),
      ));
    }
    Ok(AdminUser(user))
  }
}
