//! The `SchoolStore` and `IdentityStore` traits.
//!
//! The traits are implemented by storage backends (e.g.
//! `shala-store-sqlite`). The HTTP layer depends on these abstractions, not
//! on any concrete backend.

use std::collections::BTreeMap;
use std::future::Future;

use uuid::Uuid;

use crate::{
  query::{DashboardStats, FilterOptions, SchoolQuery, SearchPage, StatsFilter},
  record::SchoolRecord,
  user::{GoogleProfile, IssuedToken, User, UserStats, UserUpdate},
};

// ─── School data ─────────────────────────────────────────────────────────────

/// Abstraction over the dynamically shaped school-record table.
///
/// Writes are append-only: rows whose natural key already exists are skipped,
/// never merged, and no delete path exists. The column set only grows.
///
/// All methods return `Send` futures so the trait can be used in
/// multi-threaded async runtimes (e.g. tokio with `axum`).
pub trait SchoolStore: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  /// Persist a batch of records, reconciling the table schema first.
  ///
  /// Both steps share one transaction: a failure leaves neither partial
  /// schema changes nor partial inserts behind. Returns the number of rows
  /// actually inserted; duplicates by natural key are silently skipped.
  fn save_schools(
    &self,
    records: Vec<SchoolRecord>,
  ) -> impl Future<Output = Result<u64, Self::Error>> + Send + '_;

  /// Return one page of rows matching `query`, plus the total match count.
  ///
  /// A missing table reads as an empty data set, not an error.
  fn search_schools<'a>(
    &'a self,
    query: &'a SchoolQuery,
  ) -> impl Future<Output = Result<SearchPage, Self::Error>> + Send + 'a;

  /// The subset of `codes` already stored, optionally scoped to one
  /// academic year.
  fn existing_codes<'a>(
    &'a self,
    codes: &'a [String],
    academic_year: Option<&'a str>,
  ) -> impl Future<Output = Result<Vec<String>, Self::Error>> + Send + 'a;

  /// Map of state → sorted distinct districts seen in that state.
  fn state_districts(
    &self,
  ) -> impl Future<Output = Result<BTreeMap<String, Vec<String>>, Self::Error>> + Send + '_;

  /// Sorted distinct academic years. Empty if the column was never ingested.
  fn academic_years(
    &self,
  ) -> impl Future<Output = Result<Vec<String>, Self::Error>> + Send + '_;

  /// Distinct filter values for cascading search selects.
  fn filter_options(
    &self,
  ) -> impl Future<Output = Result<FilterOptions, Self::Error>> + Send + '_;

  /// Compute the dashboard statistics under `filter`.
  ///
  /// A missing table yields the zero-valued statistics object.
  fn dashboard_stats<'a>(
    &'a self,
    filter: &'a StatsFilter,
  ) -> impl Future<Output = Result<DashboardStats, Self::Error>> + Send + 'a;
}

// ─── Identity ────────────────────────────────────────────────────────────────

/// Abstraction over user accounts and their session tokens.
pub trait IdentityStore: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  /// Create or refresh the account matching `profile.google_id`, updating
  /// profile fields and `last_login` on every sign-in.
  fn upsert_google_user(
    &self,
    profile: GoogleProfile,
  ) -> impl Future<Output = Result<User, Self::Error>> + Send + '_;

  /// Issue a fresh opaque bearer token for `user_id`, valid for
  /// [`TOKEN_TTL_HOURS`](crate::user::TOKEN_TTL_HOURS).
  fn issue_token(
    &self,
    user_id: Uuid,
  ) -> impl Future<Output = Result<IssuedToken, Self::Error>> + Send + '_;

  /// Resolve a presented token to its user. `None` for unknown or expired
  /// tokens.
  fn resolve_token<'a>(
    &'a self,
    token: &'a str,
  ) -> impl Future<Output = Result<Option<User>, Self::Error>> + Send + 'a;

  /// Delete a presented token. Deleting an unknown token is a no-op.
  fn revoke_token<'a>(
    &'a self,
    token: &'a str,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + 'a;

  /// Delete all expired tokens; returns how many were removed.
  fn purge_expired_tokens(
    &self,
  ) -> impl Future<Output = Result<u64, Self::Error>> + Send + '_;

  // ── User administration ───────────────────────────────────────────────

  fn list_users(
    &self,
  ) -> impl Future<Output = Result<Vec<User>, Self::Error>> + Send + '_;

  fn get_user(
    &self,
    user_id: Uuid,
  ) -> impl Future<Output = Result<Option<User>, Self::Error>> + Send + '_;

  /// Apply `update` to an account. Returns the updated user, or `None` if
  /// the account does not exist.
  fn update_user(
    &self,
    user_id: Uuid,
    update: UserUpdate,
  ) -> impl Future<Output = Result<Option<User>, Self::Error>> + Send + '_;

  /// Delete an account and all of its tokens. Returns whether it existed.
  fn delete_user(
    &self,
    user_id: Uuid,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + '_;

  fn user_stats(
    &self,
  ) -> impl Future<Output = Result<UserStats, Self::Error>> + Send + '_;
}
