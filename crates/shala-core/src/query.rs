//! Query parameters and result types for the school-data read paths.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Page size applied when the caller does not send one.
pub const DEFAULT_PAGE_SIZE: u32 = 10;

/// Upper bound on a single page, so a caller cannot pull the whole table.
pub const MAX_PAGE_SIZE: u32 = 1000;

/// A stored row, keyed by column name. Values are the stored text.
pub type SchoolRow = serde_json::Map<String, Value>;

// ─── Search ──────────────────────────────────────────────────────────────────

/// Parameters for a filtered, paginated school search.
///
/// Unset filters are omitted from the predicate entirely; filters that are
/// set combine conjunctively.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SchoolQuery {
  /// Exact-match state filter.
  pub state:     Option<String>,
  /// Match-any district filter.
  #[serde(default)]
  pub districts: Vec<String>,
  /// 1-based page number; values below 1 are clamped up.
  pub page:      Option<u32>,
  pub limit:     Option<u32>,
}

impl SchoolQuery {
  pub fn page(&self) -> u32 { self.page.unwrap_or(1).max(1) }

  pub fn limit(&self) -> u32 {
    self
      .limit
      .unwrap_or(DEFAULT_PAGE_SIZE)
      .clamp(1, MAX_PAGE_SIZE)
  }

  pub fn offset(&self) -> u64 {
    u64::from(self.page() - 1) * u64::from(self.limit())
  }
}

/// One page of matching rows plus the total match count.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SearchPage {
  pub rows:  Vec<SchoolRow>,
  pub total: u64,
}

// ─── Filter metadata ─────────────────────────────────────────────────────────

/// Distinct filter values for the search UI, grouped for cascading selects.
///
/// Blocks are keyed by `"{state}|{district}"`.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FilterOptions {
  pub states:                   Vec<String>,
  pub districts_by_state:       BTreeMap<String, Vec<String>>,
  pub blocks_by_state_district: BTreeMap<String, Vec<String>>,
  pub academic_years:           Vec<String>,
}

// ─── Dashboard statistics ────────────────────────────────────────────────────

/// Optional exact-match filters applied to every dashboard aggregate.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct StatsFilter {
  pub state:         Option<String>,
  pub district:      Option<String>,
  pub block:         Option<String>,
  #[serde(rename = "ay")]
  pub academic_year: Option<String>,
}

/// One value bucket in a breakdown, e.g. a state and its school count.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Bucket {
  pub value: String,
  pub count: u64,
}

/// The full dashboard statistics payload.
///
/// Every count is 0 and every breakdown empty until the first ingest creates
/// the schools table.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardStats {
  pub total_schools:        u64,
  pub total_udise_codes:    u64,
  pub total_states:         u64,
  pub total_districts:      u64,
  pub total_blocks:         u64,
  pub total_clusters:       u64,
  pub total_villages:       u64,
  pub total_academic_years: u64,
  pub total_students:       u64,
  pub total_boys:           u64,
  pub total_girls:          u64,
  pub top_states:           Vec<Bucket>,
  pub top_districts:        Vec<Bucket>,
  pub top_blocks:           Vec<Bucket>,
  pub schools_by_category:   Vec<Bucket>,
  pub schools_by_management: Vec<Bucket>,
}
