//! Dashboard statistics — dynamically assembled aggregates over the
//! heterogeneous schools table.
//!
//! Student totals are summed across every historical spelling of a metric's
//! column that has ever been ingested; the candidate lists below are the
//! single place those spellings are declared. Stored values are untyped
//! text, so a value only participates in a sum when it is all digits —
//! anything else (the `"NA"` sentinel included) contributes zero for that
//! row.
//!
//! The sub-queries are independent and read-only; they are issued
//! concurrently and joined, with the first error surfacing as the overall
//! failure.

use shala_core::{
  query::{Bucket, DashboardStats, StatsFilter},
  record::{ACADEMIC_YEAR, UDISE_CODE},
};

use crate::{
  schema::SCHOOLS_TABLE,
  store::{
    SqliteStore, BLOCK_COLUMN, CLUSTER_COLUMN, DISTRICT_COLUMN, STATE_COLUMN,
    VILLAGE_COLUMN,
  },
  Result,
};

/// Distribution columns.
pub(crate) const CATEGORY_COLUMN: &str = "school_category";
pub(crate) const MANAGEMENT_COLUMN: &str = "management";

/// Historical column spellings per student metric, in precedence order.
/// Absent candidates contribute nothing to the assembled sum.
const TOTAL_STUDENT_COLUMNS: &[&str] =
  &["total_students", "tot_students", "no_of_students"];
const BOY_STUDENT_COLUMNS: &[&str] = &["total_boys", "tot_boys", "boys"];
const GIRL_STUDENT_COLUMNS: &[&str] = &["total_girls", "tot_girls", "girls"];

const TOP_BUCKETS: u32 = 5;

// ─── Filter predicate ────────────────────────────────────────────────────────

/// A shared `WHERE` clause plus its positional parameters.
struct Predicate {
  where_clause: String,
  params:       Vec<String>,
}

impl Predicate {
  /// `None` when a requested filter names a column no batch has delivered —
  /// nothing can match, so the whole statistics object is zero.
  fn build(filter: &StatsFilter, columns: &[String]) -> Option<Self> {
    let mut conds: Vec<String> = vec![];
    let mut params: Vec<String> = vec![];

    let filters = [
      (STATE_COLUMN, &filter.state),
      (DISTRICT_COLUMN, &filter.district),
      (BLOCK_COLUMN, &filter.block),
      (ACADEMIC_YEAR, &filter.academic_year),
    ];
    for (column, value) in filters {
      if let Some(value) = value {
        if !columns.iter().any(|c| c == column) {
          return None;
        }
        conds.push(format!("\"{column}\" = ?"));
        params.push(value.clone());
      }
    }

    let where_clause = if conds.is_empty() {
      String::new()
    } else {
      format!(" WHERE {}", conds.join(" AND "))
    };
    Some(Self { where_clause, params })
  }
}

// ─── SQL fragments ───────────────────────────────────────────────────────────

/// Per-row term: the column's integer value when it is all digits, else 0.
fn digit_term(column: &str) -> String {
  format!(
    "CASE WHEN \"{column}\" IS NOT NULL AND \"{column}\" != '' \
       AND \"{column}\" NOT GLOB '*[^0-9]*' \
     THEN CAST(\"{column}\" AS INTEGER) ELSE 0 END"
  )
}

/// `SUM` over every present candidate column for one metric.
fn sum_expr(candidates: &[&str], columns: &[String]) -> String {
  let terms: Vec<String> = candidates
    .iter()
    .filter(|c| columns.iter().any(|col| col == *c))
    .map(|c| digit_term(c))
    .collect();

  if terms.is_empty() {
    "0".to_owned()
  } else {
    format!("COALESCE(SUM({}), 0)", terms.join(" + "))
  }
}

// ─── Sub-queries ─────────────────────────────────────────────────────────────

struct DistinctCounts {
  total:     u64,
  udise:     u64,
  states:    u64,
  districts: u64,
  blocks:    u64,
  clusters:  u64,
  villages:  u64,
  years:     u64,
}

async fn distinct_counts(
  conn: &tokio_rusqlite::Connection,
  columns: &[String],
  predicate: &Predicate,
) -> Result<DistinctCounts> {
  let count_expr = |name: &str| {
    if columns.iter().any(|c| c == name) {
      format!("COUNT(DISTINCT \"{name}\")")
    } else {
      "0".to_owned()
    }
  };

  let sql = format!(
    "SELECT COUNT(*), {}, {}, {}, {}, {}, {}, {} FROM {SCHOOLS_TABLE}{}",
    count_expr(UDISE_CODE),
    count_expr(STATE_COLUMN),
    count_expr(DISTRICT_COLUMN),
    count_expr(BLOCK_COLUMN),
    count_expr(CLUSTER_COLUMN),
    count_expr(VILLAGE_COLUMN),
    count_expr(ACADEMIC_YEAR),
    predicate.where_clause,
  );
  let params = predicate.params.clone();

  let get = |n: i64| n.max(0) as u64;
  let raw = conn
    .call(move |conn| {
      Ok(conn.query_row(
        &sql,
        rusqlite::params_from_iter(params.iter()),
        |row| {
          Ok([
            row.get::<_, i64>(0)?,
            row.get::<_, i64>(1)?,
            row.get::<_, i64>(2)?,
            row.get::<_, i64>(3)?,
            row.get::<_, i64>(4)?,
            row.get::<_, i64>(5)?,
            row.get::<_, i64>(6)?,
            row.get::<_, i64>(7)?,
          ])
        },
      )?)
    })
    .await?;

  Ok(DistinctCounts {
    total:     get(raw[0]),
    udise:     get(raw[1]),
    states:    get(raw[2]),
    districts: get(raw[3]),
    blocks:    get(raw[4]),
    clusters:  get(raw[5]),
    villages:  get(raw[6]),
    years:     get(raw[7]),
  })
}

async fn student_sums(
  conn: &tokio_rusqlite::Connection,
  columns: &[String],
  predicate: &Predicate,
) -> Result<(u64, u64, u64)> {
  let sql = format!(
    "SELECT {}, {}, {} FROM {SCHOOLS_TABLE}{}",
    sum_expr(TOTAL_STUDENT_COLUMNS, columns),
    sum_expr(BOY_STUDENT_COLUMNS, columns),
    sum_expr(GIRL_STUDENT_COLUMNS, columns),
    predicate.where_clause,
  );
  let params = predicate.params.clone();

  let sums = conn
    .call(move |conn| {
      Ok(conn.query_row(
        &sql,
        rusqlite::params_from_iter(params.iter()),
        |row| {
          Ok((
            row.get::<_, i64>(0)?,
            row.get::<_, i64>(1)?,
            row.get::<_, i64>(2)?,
          ))
        },
      )?)
    })
    .await?;

  Ok((
    sums.0.max(0) as u64,
    sums.1.max(0) as u64,
    sums.2.max(0) as u64,
  ))
}

/// Row counts grouped by one column, largest first. `top` caps the list.
async fn breakdown(
  conn: &tokio_rusqlite::Connection,
  column: &str,
  columns: &[String],
  predicate: &Predicate,
  top: Option<u32>,
) -> Result<Vec<Bucket>> {
  if !columns.iter().any(|c| c == column) {
    return Ok(vec![]);
  }

  let limit = top.map(|n| format!(" LIMIT {n}")).unwrap_or_default();
  let sql = format!(
    "SELECT \"{column}\", COUNT(*) FROM {SCHOOLS_TABLE}{} \
     GROUP BY \"{column}\" ORDER BY COUNT(*) DESC, \"{column}\" ASC{limit}",
    predicate.where_clause,
  );
  let params = predicate.params.clone();

  let buckets = conn
    .call(move |conn| {
      let mut stmt = conn.prepare(&sql)?;
      let buckets = stmt
        .query_map(rusqlite::params_from_iter(params.iter()), |row| {
          Ok(Bucket {
            value: row.get(0)?,
            count: row.get::<_, i64>(1)?.max(0) as u64,
          })
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;
      Ok(buckets)
    })
    .await?;
  Ok(buckets)
}

// ─── Assembly ────────────────────────────────────────────────────────────────

pub(crate) async fn compute(
  store: &SqliteStore,
  filter: &StatsFilter,
) -> Result<DashboardStats> {
  let columns = store.school_columns().await?;
  if columns.is_empty() {
    return Ok(DashboardStats::default());
  }
  let Some(predicate) = Predicate::build(filter, &columns) else {
    return Ok(DashboardStats::default());
  };

  let conn = &store.conn;
  let (
    counts,
    (total_students, total_boys, total_girls),
    top_states,
    top_districts,
    top_blocks,
    schools_by_category,
    schools_by_management,
  ) = tokio::try_join!(
    distinct_counts(conn, &columns, &predicate),
    student_sums(conn, &columns, &predicate),
    breakdown(conn, STATE_COLUMN, &columns, &predicate, Some(TOP_BUCKETS)),
    breakdown(conn, DISTRICT_COLUMN, &columns, &predicate, Some(TOP_BUCKETS)),
    breakdown(conn, BLOCK_COLUMN, &columns, &predicate, Some(TOP_BUCKETS)),
    breakdown(conn, CATEGORY_COLUMN, &columns, &predicate, None),
    breakdown(conn, MANAGEMENT_COLUMN, &columns, &predicate, None),
  )?;

  Ok(DashboardStats {
    total_schools:        counts.total,
    total_udise_codes:    counts.udise,
    total_states:         counts.states,
    total_districts:      counts.districts,
    total_blocks:         counts.blocks,
    total_clusters:       counts.clusters,
    total_villages:       counts.villages,
    total_academic_years: counts.years,
    total_students,
    total_boys,
    total_girls,
    top_states,
    top_districts,
    top_blocks,
    schools_by_category,
    schools_by_management,
  })
}
