//! HTTP layer for the shala school-data service.
//!
//! Exposes an axum [`Router`] over any store implementing
//! [`SchoolStore`] + [`IdentityStore`]: bulk ingest, filtered search,
//! dashboard statistics, token auth, user administration, and a passthrough
//! proxy to the upstream government school-data API.

pub mod auth;
pub mod error;
pub mod handlers;

pub use error::Error;

use std::{path::PathBuf, sync::Arc};

use axum::{
  Router,
  routing::{any, get, post, put},
};
use serde::Deserialize;
use shala_core::store::{IdentityStore, SchoolStore};
use tower_http::trace::TraceLayer;

use handlers::{auth as auth_handlers, proxy, schools, stats, users};

// ─── Configuration ────────────────────────────────────────────────────────────

/// Runtime server configuration, deserialised from `config.toml`.
#[derive(Deserialize, Clone)]
pub struct ServerConfig {
  pub host:           String,
  pub port:           u16,
  pub store_path:     PathBuf,
  /// Base URL of the upstream school-data API the proxy forwards to.
  pub udise_base_url: String,
}

// ─── Application state ────────────────────────────────────────────────────────

/// Shared state threaded through all axum handlers.
#[derive(Clone)]
pub struct AppState<S> {
  pub store:  Arc<S>,
  pub config: Arc<ServerConfig>,
  /// Outbound client for the upstream proxy. Cheap to clone.
  pub http:   reqwest::Client,
}

// ─── Router ───────────────────────────────────────────────────────────────────

/// Build the axum [`Router`] for the service.
pub fn router<S>(state: AppState<S>) -> Router
where
  S: SchoolStore + IdentityStore + Clone + Send + Sync + 'static,
{
  Router::new()
    // School data
    .route("/api/save-schools", post(schools::save::<S>))
    .route("/api/filters", get(schools::filters::<S>))
    .route("/api/schools/search", post(schools::search::<S>))
    .route("/api/check-existing", post(schools::check_existing::<S>))
    // Dashboard
    .route("/api/dashboard/stats", get(stats::dashboard::<S>))
    .route("/api/academic-years", get(stats::academic_years::<S>))
    .route("/api/filter-options", get(stats::filter_options::<S>))
    // Sessions
    .route("/api/auth/google", post(auth_handlers::google::<S>))
    .route("/api/auth/logout", post(auth_handlers::logout::<S>))
    .route("/api/auth/profile", get(auth_handlers::profile))
    .route(
      "/api/auth/cleanup-tokens",
      get(auth_handlers::cleanup_tokens::<S>),
    )
    // User administration
    .route("/api/users", get(users::list::<S>))
    .route("/api/users/stats", get(users::stats::<S>))
    .route(
      "/api/users/{id}",
      put(users::update::<S>).delete(users::remove::<S>),
    )
    // Upstream passthrough
    .route("/api/udise/{*path}", any(proxy::forward::<S>))
    .layer(TraceLayer::new_for_http())
    .with_state(state)
}

// ─── Integration tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
  use super::*;

  use axum::{
    body::Body,
    http::{Request, StatusCode, header},
  };
  use serde_json::{Value, json};
  use shala_core::user::{Role, UserUpdate};
  use shala_store_sqlite::SqliteStore;
  use tower::ServiceExt as _;

  async fn make_state() -> AppState<SqliteStore> {
    let store = SqliteStore::open_in_memory().await.unwrap();
    AppState {
      store:  Arc::new(store),
      config: Arc::new(ServerConfig {
        host:           "127.0.0.1".to_string(),
        port:           8080,
        store_path:     PathBuf::from(":memory:"),
        udise_base_url: "http://127.0.0.1:9".to_string(),
      }),
      http:   reqwest::Client::new(),
    }
  }

  async fn request(
    state: AppState<SqliteStore>,
    method: &str,
    uri: &str,
    token: Option<&str>,
    body: Option<Value>,
  ) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
      builder =
        builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    let req = match body {
      Some(body) => builder
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap(),
      None => builder.body(Body::empty()).unwrap(),
    };

    let resp = router(state).oneshot(req).await.unwrap();
    let status = resp.status();
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX)
      .await
      .unwrap();
    let value = if bytes.is_empty() {
      Value::Null
    } else {
      serde_json::from_slice(&bytes).unwrap()
    };
    (status, value)
  }

  /// Sign in a fresh user and return their bearer token.
  async fn sign_in(state: &AppState<SqliteStore>, google_id: &str) -> String {
    let (status, body) = request(
      state.clone(),
      "POST",
      "/api/auth/google",
      None,
      Some(json!({
        "email": format!("{google_id}@example.com"),
        "name": "Asha Rao",
        "picture": null,
        "googleId": google_id,
      })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    body["token"].as_str().unwrap().to_owned()
  }

  fn school(code: &str, state: &str, district: &str) -> Value {
    json!({ "udise_code": code, "state": state, "district": district })
  }

  // ── Auth ─────────────────────────────────────────────────────────────────

  #[tokio::test]
  async fn protected_routes_require_a_token() {
    let state = make_state().await;
    for (method, uri) in [
      ("POST", "/api/save-schools"),
      ("GET", "/api/filters"),
      ("GET", "/api/dashboard/stats"),
      ("GET", "/api/auth/profile"),
      ("GET", "/api/users"),
    ] {
      let (status, _) =
        request(state.clone(), method, uri, None, Some(json!([]))).await;
      assert_eq!(status, StatusCode::UNAUTHORIZED, "{method} {uri}");
    }
  }

  #[tokio::test]
  async fn garbage_token_is_rejected() {
    let state = make_state().await;
    let (status, _) = request(
      state,
      "GET",
      "/api/auth/profile",
      Some("not-a-real-token"),
      None,
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
  }

  #[tokio::test]
  async fn sign_in_issues_a_working_token() {
    let state = make_state().await;
    let token = sign_in(&state, "g-1").await;

    let (status, body) = request(
      state,
      "GET",
      "/api/auth/profile",
      Some(&token),
      None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["user"]["email"], "g-1@example.com");
    assert_eq!(body["user"]["role"], "user");
  }

  #[tokio::test]
  async fn logout_revokes_the_token() {
    let state = make_state().await;
    let token = sign_in(&state, "g-1").await;

    let (status, _) = request(
      state.clone(),
      "POST",
      "/api/auth/logout",
      Some(&token),
      None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) =
      request(state, "GET", "/api/auth/profile", Some(&token), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
  }

  #[tokio::test]
  async fn cleanup_tokens_is_public() {
    let state = make_state().await;
    let (status, body) =
      request(state, "GET", "/api/auth/cleanup-tokens", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["removed"], 0);
  }

  // ── Ingest and query flow ────────────────────────────────────────────────

  #[tokio::test]
  async fn save_search_filters_round_trip() {
    let state = make_state().await;
    let token = sign_in(&state, "g-1").await;

    let batch = json!([school("123", "X", "A"), school("124", "X", "B")]);
    let (status, body) = request(
      state.clone(),
      "POST",
      "/api/save-schools",
      Some(&token),
      Some(batch.clone()),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["count"], 2);

    let (status, body) = request(
      state.clone(),
      "GET",
      "/api/filters",
      Some(&token),
      None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["X"], json!(["A", "B"]));

    let (status, body) = request(
      state.clone(),
      "POST",
      "/api/schools/search",
      Some(&token),
      Some(json!({ "state": "X" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total"], 2);
    assert_eq!(body["page"], 1);
    assert_eq!(body["data"].as_array().unwrap().len(), 2);

    // Re-ingesting the same batch inserts nothing.
    let (status, body) = request(
      state,
      "POST",
      "/api/save-schools",
      Some(&token),
      Some(batch),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["count"], 0);
  }

  #[tokio::test]
  async fn save_rejects_invalid_bodies() {
    let state = make_state().await;
    let token = sign_in(&state, "g-1").await;

    for body in [json!([]), json!({"not": "an array"}), json!(["bare string"])]
    {
      let (status, _) = request(
        state.clone(),
        "POST",
        "/api/save-schools",
        Some(&token),
        Some(body),
      )
      .await;
      assert_eq!(status, StatusCode::BAD_REQUEST);
    }
  }

  #[tokio::test]
  async fn check_existing_reports_stored_codes() {
    let state = make_state().await;
    let token = sign_in(&state, "g-1").await;

    request(
      state.clone(),
      "POST",
      "/api/save-schools",
      Some(&token),
      Some(json!([school("123", "X", "A")])),
    )
    .await;

    let (status, body) = request(
      state.clone(),
      "POST",
      "/api/check-existing",
      Some(&token),
      Some(json!({ "codes": ["123", "999"] })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["existing"], json!(["123"]));

    let (status, _) = request(
      state,
      "POST",
      "/api/check-existing",
      Some(&token),
      Some(json!({ "codes": "123" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
  }

  #[tokio::test]
  async fn dashboard_stats_start_zeroed() {
    let state = make_state().await;
    let token = sign_in(&state, "g-1").await;

    let (status, body) = request(
      state,
      "GET",
      "/api/dashboard/stats?state=X",
      Some(&token),
      None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["totalSchools"], 0);
    assert_eq!(body["topStates"], json!([]));
  }

  #[tokio::test]
  async fn filter_options_have_the_expected_shape() {
    let state = make_state().await;
    let token = sign_in(&state, "g-1").await;

    let (status, body) = request(
      state.clone(),
      "GET",
      "/api/filter-options",
      Some(&token),
      None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert!(body["states"].is_array());
    assert!(body["districtsByState"].is_object());

    let (status, body) = request(
      state,
      "GET",
      "/api/academic-years",
      Some(&token),
      None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["academicYears"], json!([]));
  }

  // ── Role gate ────────────────────────────────────────────────────────────

  #[tokio::test]
  async fn plain_users_cannot_administer_accounts() {
    let state = make_state().await;
    let token = sign_in(&state, "g-1").await;

    for (method, uri) in [
      ("GET", "/api/users"),
      ("GET", "/api/users/stats"),
    ] {
      let (status, _) =
        request(state.clone(), method, uri, Some(&token), None).await;
      assert_eq!(status, StatusCode::FORBIDDEN, "{method} {uri}");
    }
  }

  #[tokio::test]
  async fn admins_can_list_update_and_delete_users() {
    use shala_core::store::IdentityStore as _;

    let state = make_state().await;
    let admin_token = sign_in(&state, "admin").await;
    let other_token = sign_in(&state, "other").await;

    // Promote the first account directly through the store.
    let users = state.store.list_users().await.unwrap();
    let admin = users.iter().find(|u| u.google_id == "admin").unwrap();
    let other = users.iter().find(|u| u.google_id == "other").unwrap();
    state
      .store
      .update_user(
        admin.user_id,
        UserUpdate { name: None, role: Some(Role::Admin) },
      )
      .await
      .unwrap();

    let (status, body) = request(
      state.clone(),
      "GET",
      "/api/users",
      Some(&admin_token),
      None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["users"].as_array().unwrap().len(), 2);

    let (status, body) = request(
      state.clone(),
      "PUT",
      &format!("/api/users/{}", other.user_id),
      Some(&admin_token),
      Some(json!({ "name": "Renamed" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["user"]["name"], "Renamed");

    let (status, body) = request(
      state.clone(),
      "GET",
      "/api/users/stats",
      Some(&admin_token),
      None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["stats"]["totalUsers"], 2);
    assert_eq!(body["stats"]["admins"], 1);

    let (status, _) = request(
      state.clone(),
      "DELETE",
      &format!("/api/users/{}", other.user_id),
      Some(&admin_token),
      None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    // The deleted account's session dies with it.
    let (status, _) = request(
      state,
      "GET",
      "/api/auth/profile",
      Some(&other_token),
      None,
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
  }

  #[tokio::test]
  async fn updating_a_missing_user_is_404() {
    let state = make_state().await;
    let admin_token = sign_in(&state, "admin").await;

    use shala_core::store::IdentityStore as _;
    let users = state.store.list_users().await.unwrap();
    state
      .store
      .update_user(
        users[0].user_id,
        UserUpdate { name: None, role: Some(Role::SuperAdmin) },
      )
      .await
      .unwrap();

    let (status, _) = request(
      state,
      "PUT",
      &format!("/api/users/{}", uuid::Uuid::new_v4()),
      Some(&admin_token),
      Some(json!({ "name": "ghost" })),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
  }
}
