//! Integration tests for `SqliteStore` against an in-memory database.

use serde_json::json;
use shala_core::{
  query::{SchoolQuery, StatsFilter},
  record::SchoolRecord,
  store::{IdentityStore, SchoolStore},
  user::{GoogleProfile, Role, UserUpdate},
};
use uuid::Uuid;

use crate::SqliteStore;

async fn store() -> SqliteStore {
  SqliteStore::open_in_memory()
    .await
    .expect("in-memory store")
}

fn school(code: &str, state: &str, district: &str) -> SchoolRecord {
  SchoolRecord::from([
    ("udise_code", json!(code)),
    ("state", json!(state)),
    ("district", json!(district)),
  ])
}

fn profile(google_id: &str) -> GoogleProfile {
  GoogleProfile {
    email:     format!("{google_id}@example.com"),
    name:      "Asha Rao".to_owned(),
    picture:   None,
    google_id: google_id.to_owned(),
  }
}

// ─── Bulk save ───────────────────────────────────────────────────────────────

#[tokio::test]
async fn save_reports_inserted_count() {
  let s = store().await;
  let n = s
    .save_schools(vec![school("123", "X", "A"), school("124", "X", "B")])
    .await
    .unwrap();
  assert_eq!(n, 2);
}

#[tokio::test]
async fn re_ingest_is_idempotent() {
  let s = store().await;
  let batch = vec![school("123", "X", "A"), school("124", "X", "B")];

  assert_eq!(s.save_schools(batch.clone()).await.unwrap(), 2);
  assert_eq!(s.save_schools(batch).await.unwrap(), 0);

  let page = s.search_schools(&SchoolQuery::default()).await.unwrap();
  assert_eq!(page.total, 2);
}

#[tokio::test]
async fn empty_batch_is_rejected() {
  let s = store().await;
  let err = s.save_schools(vec![]).await.unwrap_err();
  assert!(matches!(
    err,
    crate::Error::Core(shala_core::Error::EmptyBatch)
  ));
}

#[tokio::test]
async fn batch_without_udise_code_is_rejected() {
  let s = store().await;
  let record = SchoolRecord::from([("state", json!("X"))]);
  let err = s.save_schools(vec![record]).await.unwrap_err();
  assert!(matches!(
    err,
    crate::Error::Core(shala_core::Error::MissingKeyField(_))
  ));
}

#[tokio::test]
async fn values_are_normalized_at_ingest() {
  let s = store().await;
  let record = SchoolRecord::from([
    ("udise_code", json!("200")),
    ("state", json!("")),
    ("pincode", json!(800001)),
    ("location", json!({"lat": 25.6})),
    ("remarks", json!(null)),
  ]);
  s.save_schools(vec![record]).await.unwrap();

  let page = s.search_schools(&SchoolQuery::default()).await.unwrap();
  let row = &page.rows[0];
  assert_eq!(row["state"], "NA");
  assert_eq!(row["remarks"], "NA");
  assert_eq!(row["pincode"], "800001");
  assert_eq!(row["location"], r#"{"lat":25.6}"#);
}

// ─── Schema growth ───────────────────────────────────────────────────────────

#[tokio::test]
async fn new_fields_become_columns_and_backfill_sentinel() {
  let s = store().await;
  s.save_schools(vec![school("123", "X", "A")]).await.unwrap();

  let with_extra = SchoolRecord::from([
    ("udise_code", json!("124")),
    ("state", json!("X")),
    ("district", json!("B")),
    ("head_teacher", json!("R. Kumar")),
  ]);
  s.save_schools(vec![with_extra]).await.unwrap();

  let columns = s.school_columns().await.unwrap();
  assert!(columns.iter().any(|c| c == "head_teacher"));

  // The earlier row reads the sentinel for the column it predates.
  let page = s
    .search_schools(&SchoolQuery::default())
    .await
    .unwrap();
  let old_row = page
    .rows
    .iter()
    .find(|r| r["udise_code"] == "123")
    .unwrap();
  assert_eq!(old_row["head_teacher"], "NA");
}

#[tokio::test]
async fn duplicate_codes_are_skipped_not_merged() {
  let s = store().await;
  s.save_schools(vec![school("123", "X", "A")]).await.unwrap();

  // Same code, different payload: the stored row wins.
  let n = s
    .save_schools(vec![school("123", "Y", "Z")])
    .await
    .unwrap();
  assert_eq!(n, 0);

  let page = s.search_schools(&SchoolQuery::default()).await.unwrap();
  assert_eq!(page.total, 1);
  assert_eq!(page.rows[0]["state"], "X");
}

#[tokio::test]
async fn academic_year_widens_the_natural_key() {
  let s = store().await;
  let record = |code: &str, ay: &str| {
    SchoolRecord::from([
      ("udise_code", json!(code)),
      ("ay", json!(ay)),
      ("state", json!("X")),
    ])
  };

  assert_eq!(
    s.save_schools(vec![record("123", "2023-24")]).await.unwrap(),
    1
  );
  // Same school, next year: a distinct row under the (code, year) key.
  assert_eq!(
    s.save_schools(vec![record("123", "2024-25")]).await.unwrap(),
    1
  );
  // Exact duplicate: skipped.
  assert_eq!(
    s.save_schools(vec![record("123", "2024-25")]).await.unwrap(),
    0
  );

  let page = s.search_schools(&SchoolQuery::default()).await.unwrap();
  assert_eq!(page.total, 2);
}

#[tokio::test]
async fn key_shape_follows_latest_batch() {
  let s = store().await;
  s.save_schools(vec![school("123", "X", "A")]).await.unwrap();

  // A year-bearing batch swaps the index to (udise_code, ay).
  let with_year = SchoolRecord::from([
    ("udise_code", json!("123")),
    ("ay", json!("2024-25")),
    ("state", json!("X")),
    ("district", json!("A")),
  ]);
  assert_eq!(s.save_schools(vec![with_year]).await.unwrap(), 1);

  let page = s.search_schools(&SchoolQuery::default()).await.unwrap();
  assert_eq!(page.total, 2);
}

// ─── Search ──────────────────────────────────────────────────────────────────

#[tokio::test]
async fn search_before_first_ingest_is_empty() {
  let s = store().await;
  let page = s.search_schools(&SchoolQuery::default()).await.unwrap();
  assert_eq!(page.total, 0);
  assert!(page.rows.is_empty());
}

#[tokio::test]
async fn search_filters_conjunctively() {
  let s = store().await;
  s.save_schools(vec![
    school("1", "X", "A"),
    school("2", "X", "B"),
    school("3", "Y", "A"),
  ])
  .await
  .unwrap();

  let by_state = s
    .search_schools(&SchoolQuery {
      state: Some("X".into()),
      ..Default::default()
    })
    .await
    .unwrap();
  assert_eq!(by_state.total, 2);

  let by_both = s
    .search_schools(&SchoolQuery {
      state: Some("X".into()),
      districts: vec!["A".into(), "B".into()],
      ..Default::default()
    })
    .await
    .unwrap();
  assert_eq!(by_both.total, 2);

  let narrow = s
    .search_schools(&SchoolQuery {
      state: Some("Y".into()),
      districts: vec!["A".into()],
      ..Default::default()
    })
    .await
    .unwrap();
  assert_eq!(narrow.total, 1);
  assert_eq!(narrow.rows[0]["udise_code"], "3");
}

#[tokio::test]
async fn pagination_reconstructs_the_full_set() {
  let s = store().await;
  let batch: Vec<SchoolRecord> = (0..7)
    .map(|i| school(&format!("code-{i}"), "X", "A"))
    .collect();
  s.save_schools(batch).await.unwrap();

  let mut seen: Vec<String> = vec![];
  for page_no in 1..=4 {
    let page = s
      .search_schools(&SchoolQuery {
        page: Some(page_no),
        limit: Some(2),
        ..Default::default()
      })
      .await
      .unwrap();
    assert_eq!(page.total, 7);
    for row in &page.rows {
      seen.push(row["udise_code"].as_str().unwrap().to_owned());
    }
  }

  seen.sort();
  seen.dedup();
  assert_eq!(seen.len(), 7);
}

#[tokio::test]
async fn check_existing_returns_only_stored_codes() {
  let s = store().await;
  s.save_schools(vec![school("123", "X", "A"), school("124", "X", "B")])
    .await
    .unwrap();

  let existing = s
    .existing_codes(&["123".to_owned(), "999".to_owned()], None)
    .await
    .unwrap();
  assert_eq!(existing, vec!["123".to_owned()]);
}

#[tokio::test]
async fn check_existing_scopes_to_academic_year() {
  let s = store().await;
  let record = SchoolRecord::from([
    ("udise_code", json!("123")),
    ("ay", json!("2023-24")),
  ]);
  s.save_schools(vec![record]).await.unwrap();

  let hit = s
    .existing_codes(&["123".to_owned()], Some("2023-24"))
    .await
    .unwrap();
  assert_eq!(hit, vec!["123".to_owned()]);

  let miss = s
    .existing_codes(&["123".to_owned()], Some("2024-25"))
    .await
    .unwrap();
  assert!(miss.is_empty());
}

// ─── Filter metadata ─────────────────────────────────────────────────────────

#[tokio::test]
async fn state_districts_groups_and_sorts() {
  let s = store().await;
  s.save_schools(vec![
    school("1", "X", "B"),
    school("2", "X", "A"),
    school("3", "Y", "C"),
  ])
  .await
  .unwrap();

  let map = s.state_districts().await.unwrap();
  assert_eq!(map["X"], vec!["A".to_owned(), "B".to_owned()]);
  assert_eq!(map["Y"], vec!["C".to_owned()]);
}

#[tokio::test]
async fn filter_metadata_is_empty_before_first_ingest() {
  let s = store().await;
  assert!(s.state_districts().await.unwrap().is_empty());
  assert!(s.academic_years().await.unwrap().is_empty());
  let options = s.filter_options().await.unwrap();
  assert!(options.states.is_empty());
  assert!(options.academic_years.is_empty());
}

#[tokio::test]
async fn filter_options_cover_all_levels() {
  let s = store().await;
  let record = |code: &str, state: &str, district: &str, block: &str| {
    SchoolRecord::from([
      ("udise_code", json!(code)),
      ("state", json!(state)),
      ("district", json!(district)),
      ("block", json!(block)),
      ("ay", json!("2024-25")),
    ])
  };
  s.save_schools(vec![
    record("1", "X", "A", "A1"),
    record("2", "X", "A", "A2"),
    record("3", "X", "B", "B1"),
  ])
  .await
  .unwrap();

  let options = s.filter_options().await.unwrap();
  assert_eq!(options.states, vec!["X".to_owned()]);
  assert_eq!(
    options.districts_by_state["X"],
    vec!["A".to_owned(), "B".to_owned()]
  );
  assert_eq!(
    options.blocks_by_state_district["X|A"],
    vec!["A1".to_owned(), "A2".to_owned()]
  );
  assert_eq!(options.academic_years, vec!["2024-25".to_owned()]);
}

// ─── Dashboard statistics ────────────────────────────────────────────────────

#[tokio::test]
async fn stats_are_zero_before_first_ingest() {
  let s = store().await;
  let stats = s.dashboard_stats(&StatsFilter::default()).await.unwrap();
  assert_eq!(stats.total_schools, 0);
  assert_eq!(stats.total_students, 0);
  assert!(stats.top_states.is_empty());
  assert!(stats.schools_by_category.is_empty());
}

fn rich_school(
  code: &str,
  state: &str,
  district: &str,
  category: &str,
  students: &str,
) -> SchoolRecord {
  SchoolRecord::from([
    ("udise_code", json!(code)),
    ("state", json!(state)),
    ("district", json!(district)),
    ("block", json!("B1")),
    ("school_category", json!(category)),
    ("management", json!("Department of Education")),
    ("total_students", json!(students)),
    ("total_boys", json!("10")),
    ("total_girls", json!("5")),
  ])
}

#[tokio::test]
async fn stats_counts_sums_and_breakdowns() {
  let s = store().await;
  s.save_schools(vec![
    rich_school("1", "X", "A", "Primary", "100"),
    rich_school("2", "X", "B", "Primary", "50"),
    rich_school("3", "Y", "C", "Secondary", "NA"),
  ])
  .await
  .unwrap();

  let stats = s.dashboard_stats(&StatsFilter::default()).await.unwrap();
  assert_eq!(stats.total_schools, 3);
  assert_eq!(stats.total_udise_codes, 3);
  assert_eq!(stats.total_states, 2);
  assert_eq!(stats.total_districts, 3);
  // "NA" contributes zero instead of failing the aggregate.
  assert_eq!(stats.total_students, 150);
  assert_eq!(stats.total_boys, 30);
  assert_eq!(stats.total_girls, 15);

  assert_eq!(stats.top_states[0].value, "X");
  assert_eq!(stats.top_states[0].count, 2);

  let by_category: u64 =
    stats.schools_by_category.iter().map(|b| b.count).sum();
  assert!(by_category <= stats.total_schools);
  assert_eq!(by_category, 3);
}

#[tokio::test]
async fn stats_respect_filters() {
  let s = store().await;
  s.save_schools(vec![
    rich_school("1", "X", "A", "Primary", "100"),
    rich_school("2", "Y", "C", "Primary", "50"),
  ])
  .await
  .unwrap();

  let stats = s
    .dashboard_stats(&StatsFilter {
      state: Some("X".into()),
      ..Default::default()
    })
    .await
    .unwrap();
  assert_eq!(stats.total_schools, 1);
  assert_eq!(stats.total_students, 100);
  assert_eq!(stats.top_states.len(), 1);
}

#[tokio::test]
async fn stats_filter_on_unseen_column_is_zero() {
  let s = store().await;
  s.save_schools(vec![school("1", "X", "A")]).await.unwrap();

  // No batch ever delivered an "ay" column.
  let stats = s
    .dashboard_stats(&StatsFilter {
      academic_year: Some("2024-25".into()),
      ..Default::default()
    })
    .await
    .unwrap();
  assert_eq!(stats.total_schools, 0);
  assert!(stats.top_states.is_empty());
}

#[tokio::test]
async fn stats_sum_legacy_metric_spellings_together() {
  let s = store().await;
  // Two ingests using different spellings for the same metric.
  s.save_schools(vec![SchoolRecord::from([
    ("udise_code", json!("1")),
    ("total_students", json!("100")),
  ])])
  .await
  .unwrap();
  s.save_schools(vec![SchoolRecord::from([
    ("udise_code", json!("2")),
    ("tot_students", json!("25")),
  ])])
  .await
  .unwrap();

  let stats = s.dashboard_stats(&StatsFilter::default()).await.unwrap();
  assert_eq!(stats.total_students, 125);
}

// ─── Identity ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn google_sign_in_creates_then_refreshes() {
  let s = store().await;

  let created = s.upsert_google_user(profile("g-1")).await.unwrap();
  assert_eq!(created.role, Role::User);
  assert_eq!(created.email, "g-1@example.com");

  let mut updated_profile = profile("g-1");
  updated_profile.name = "Asha R.".to_owned();
  let updated = s.upsert_google_user(updated_profile).await.unwrap();

  assert_eq!(updated.user_id, created.user_id);
  assert_eq!(updated.name, "Asha R.");
  assert_eq!(s.list_users().await.unwrap().len(), 1);
}

#[tokio::test]
async fn tokens_round_trip_and_revoke() {
  let s = store().await;
  let user = s.upsert_google_user(profile("g-1")).await.unwrap();

  let issued = s.issue_token(user.user_id).await.unwrap();
  let resolved = s.resolve_token(&issued.token).await.unwrap().unwrap();
  assert_eq!(resolved.user_id, user.user_id);

  s.revoke_token(&issued.token).await.unwrap();
  assert!(s.resolve_token(&issued.token).await.unwrap().is_none());
}

#[tokio::test]
async fn unknown_token_resolves_to_none() {
  let s = store().await;
  assert!(s.resolve_token("deadbeef").await.unwrap().is_none());
}

#[tokio::test]
async fn expired_tokens_do_not_resolve_and_purge() {
  let s = store().await;
  let user = s.upsert_google_user(profile("g-1")).await.unwrap();
  let issued = s.issue_token(user.user_id).await.unwrap();

  // Force the token into the past.
  s.conn
    .call(|conn| {
      conn.execute(
        "UPDATE auth_tokens SET expires_at = '2000-01-01T00:00:00+00:00'",
        [],
      )?;
      Ok(())
    })
    .await
    .unwrap();

  assert!(s.resolve_token(&issued.token).await.unwrap().is_none());
  assert_eq!(s.purge_expired_tokens().await.unwrap(), 1);
  assert_eq!(s.purge_expired_tokens().await.unwrap(), 0);
}

#[tokio::test]
async fn update_user_changes_role_and_name() {
  let s = store().await;
  let user = s.upsert_google_user(profile("g-1")).await.unwrap();

  let updated = s
    .update_user(
      user.user_id,
      UserUpdate { name: None, role: Some(Role::Admin) },
    )
    .await
    .unwrap()
    .unwrap();
  assert_eq!(updated.role, Role::Admin);
  assert_eq!(updated.name, user.name);

  let missing = s
    .update_user(Uuid::new_v4(), UserUpdate::default())
    .await
    .unwrap();
  assert!(missing.is_none());
}

#[tokio::test]
async fn delete_user_removes_account_and_tokens() {
  let s = store().await;
  let user = s.upsert_google_user(profile("g-1")).await.unwrap();
  let issued = s.issue_token(user.user_id).await.unwrap();

  assert!(s.delete_user(user.user_id).await.unwrap());
  assert!(s.resolve_token(&issued.token).await.unwrap().is_none());
  assert!(!s.delete_user(user.user_id).await.unwrap());
}

#[tokio::test]
async fn user_stats_count_roles() {
  let s = store().await;
  let a = s.upsert_google_user(profile("g-1")).await.unwrap();
  s.upsert_google_user(profile("g-2")).await.unwrap();
  s.update_user(
    a.user_id,
    UserUpdate { name: None, role: Some(Role::Admin) },
  )
  .await
  .unwrap();

  let stats = s.user_stats().await.unwrap();
  assert_eq!(stats.total_users, 2);
  assert_eq!(stats.admins, 1);
  assert_eq!(stats.super_admins, 0);
  assert_eq!(stats.active_last_day, 2);
}
