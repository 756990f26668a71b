//! [`SqliteStore`] — the SQLite implementation of [`SchoolStore`] and
//! [`IdentityStore`](shala_core::store::IdentityStore).

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use shala_core::{
  query::{FilterOptions, SchoolQuery, SchoolRow, SearchPage, StatsFilter, DashboardStats},
  record::{self, KeyShape, SchoolRecord, ACADEMIC_YEAR, UDISE_CODE},
  store::SchoolStore,
};

use crate::{
  registry::{self, FieldRegistry},
  schema::{SCHEMA, SCHOOLS_TABLE},
  stats,
  Error, Result,
};

/// Exact-match filter columns recognised by the read paths.
pub(crate) const STATE_COLUMN: &str = "state";
pub(crate) const DISTRICT_COLUMN: &str = "district";
pub(crate) const BLOCK_COLUMN: &str = "block";
pub(crate) const CLUSTER_COLUMN: &str = "cluster";
pub(crate) const VILLAGE_COLUMN: &str = "village";

// ─── Store ───────────────────────────────────────────────────────────────────

/// A shala data store backed by a single SQLite file.
///
/// Cloning is cheap — the inner connection is reference-counted, and clones
/// share one migration lock.
#[derive(Clone)]
pub struct SqliteStore {
  pub(crate) conn: tokio_rusqlite::Connection,
  registry:        Arc<FieldRegistry>,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run fixed-schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn, registry: Arc::new(FieldRegistry::new()) };
    store.init_schema().await?;
    Ok(store)
  }

  /// Open an in-memory store — useful for testing.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn, registry: Arc::new(FieldRegistry::new()) };
    store.init_schema().await?;
    Ok(store)
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  /// Current columns of the schools table; empty before the first ingest.
  pub async fn school_columns(&self) -> Result<Vec<String>> {
    let cols = self
      .conn
      .call(|conn| Ok(registry::table_columns(conn)?))
      .await?;
    Ok(cols)
  }
}

// ─── Row helpers ─────────────────────────────────────────────────────────────

/// Read one column of a row as a JSON value.
pub(crate) fn column_json(
  row: &rusqlite::Row<'_>,
  idx: usize,
) -> rusqlite::Result<serde_json::Value> {
  use rusqlite::types::ValueRef;

  Ok(match row.get_ref(idx)? {
    ValueRef::Null => serde_json::Value::Null,
    ValueRef::Integer(i) => serde_json::Value::from(i),
    ValueRef::Real(f) => serde_json::Value::from(f),
    ValueRef::Text(t) => {
      serde_json::Value::from(String::from_utf8_lossy(t).into_owned())
    }
    ValueRef::Blob(_) => serde_json::Value::Null,
  })
}

fn placeholders(n: usize) -> String { vec!["?"; n].join(", ") }

/// A unique-constraint failure that slips past the conflict clause (e.g. a
/// key-shape race) is a steady-state duplicate, not an error.
fn is_unique_violation(err: &tokio_rusqlite::Error) -> bool {
  matches!(
    err,
    tokio_rusqlite::Error::Rusqlite(rusqlite::Error::SqliteFailure(e, _))
      if e.code == rusqlite::ErrorCode::ConstraintViolation
  )
}

/// One multi-row insert with an `ON CONFLICT .. DO NOTHING` clause on the
/// active natural key. Returns the number of rows actually inserted.
fn insert_batch(
  conn: &rusqlite::Connection,
  fields: &[String],
  shape: KeyShape,
  records: &[SchoolRecord],
) -> rusqlite::Result<usize> {
  let columns = fields
    .iter()
    .map(|f| format!("\"{f}\""))
    .collect::<Vec<_>>()
    .join(", ");
  let row = format!("({})", placeholders(fields.len()));
  let rows = vec![row.as_str(); records.len()].join(", ");
  let conflict = shape
    .columns()
    .iter()
    .map(|c| format!("\"{c}\""))
    .collect::<Vec<_>>()
    .join(", ");

  let sql = format!(
    "INSERT INTO {SCHOOLS_TABLE} ({columns}) VALUES {rows} \
     ON CONFLICT ({conflict}) DO NOTHING"
  );

  let mut values = Vec::with_capacity(fields.len() * records.len());
  for record in records {
    for field in fields {
      values.push(record.text_value(field));
    }
  }

  conn.execute(&sql, rusqlite::params_from_iter(values.iter()))
}

// ─── SchoolStore impl ────────────────────────────────────────────────────────

impl SchoolStore for SqliteStore {
  type Error = Error;

  async fn save_schools(&self, records: Vec<SchoolRecord>) -> Result<u64> {
    let fields = record::batch_fields(&records)?;
    let shape = KeyShape::of_fields(&fields);

    // Structural changes are serialized across concurrent ingests; the
    // data insert rides the same transaction.
    let _migration = self.registry.lock().await;

    let result = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        registry::reconcile(&tx, &fields, shape)?;
        let inserted = insert_batch(&tx, &fields, shape, &records)?;
        tx.commit()?;
        Ok(inserted as u64)
      })
      .await;

    match result {
      Ok(inserted) => Ok(inserted),
      Err(e) if is_unique_violation(&e) => Ok(0),
      Err(e) => Err(e.into()),
    }
  }

  async fn search_schools(&self, query: &SchoolQuery) -> Result<SearchPage> {
    let state = query.state.clone();
    let districts = query.districts.clone();
    let limit = query.limit();
    let offset = query.offset();

    let page = self
      .conn
      .call(move |conn| {
        let columns = registry::table_columns(conn)?;
        if columns.is_empty() {
          return Ok(SearchPage::default());
        }

        let mut conds: Vec<String> = vec![];
        let mut params: Vec<String> = vec![];

        if let Some(state) = state {
          // Filtering on a column no batch has delivered matches nothing.
          if !columns.iter().any(|c| c == STATE_COLUMN) {
            return Ok(SearchPage::default());
          }
          conds.push(format!("\"{STATE_COLUMN}\" = ?"));
          params.push(state);
        }
        if !districts.is_empty() {
          if !columns.iter().any(|c| c == DISTRICT_COLUMN) {
            return Ok(SearchPage::default());
          }
          conds.push(format!(
            "\"{DISTRICT_COLUMN}\" IN ({})",
            placeholders(districts.len())
          ));
          params.extend(districts);
        }

        let where_clause = if conds.is_empty() {
          String::new()
        } else {
          format!(" WHERE {}", conds.join(" AND "))
        };

        let total: i64 = conn.query_row(
          &format!("SELECT COUNT(*) FROM {SCHOOLS_TABLE}{where_clause}"),
          rusqlite::params_from_iter(params.iter()),
          |row| row.get(0),
        )?;

        let mut stmt = conn.prepare(&format!(
          "SELECT * FROM {SCHOOLS_TABLE}{where_clause} \
           LIMIT {limit} OFFSET {offset}"
        ))?;
        let names: Vec<String> =
          stmt.column_names().iter().map(|s| s.to_string()).collect();
        let rows = stmt
          .query_map(rusqlite::params_from_iter(params.iter()), |row| {
            let mut map = SchoolRow::new();
            for (i, name) in names.iter().enumerate() {
              map.insert(name.clone(), column_json(row, i)?);
            }
            Ok(map)
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(SearchPage { rows, total: total.max(0) as u64 })
      })
      .await?;

    Ok(page)
  }

  async fn existing_codes(
    &self,
    codes: &[String],
    academic_year: Option<&str>,
  ) -> Result<Vec<String>> {
    if codes.is_empty() {
      return Ok(vec![]);
    }
    let codes = codes.to_vec();
    let academic_year = academic_year.map(str::to_owned);

    let existing = self
      .conn
      .call(move |conn| {
        let columns = registry::table_columns(conn)?;
        if columns.is_empty() {
          return Ok(vec![]);
        }

        let mut sql = format!(
          "SELECT DISTINCT \"{UDISE_CODE}\" FROM {SCHOOLS_TABLE} \
           WHERE \"{UDISE_CODE}\" IN ({})",
          placeholders(codes.len())
        );
        let mut params = codes;

        if let Some(ay) = academic_year {
          if !columns.iter().any(|c| c == ACADEMIC_YEAR) {
            return Ok(vec![]);
          }
          sql.push_str(&format!(" AND \"{ACADEMIC_YEAR}\" = ?"));
          params.push(ay);
        }

        let mut stmt = conn.prepare(&sql)?;
        let found = stmt
          .query_map(rusqlite::params_from_iter(params.iter()), |row| {
            row.get::<_, String>(0)
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(found)
      })
      .await?;

    Ok(existing)
  }

  async fn state_districts(
    &self,
  ) -> Result<BTreeMap<String, Vec<String>>> {
    let pairs = self
      .conn
      .call(|conn| {
        let columns = registry::table_columns(conn)?;
        let present =
          |name: &str| columns.iter().any(|c| c == name);
        if !present(STATE_COLUMN) || !present(DISTRICT_COLUMN) {
          return Ok(vec![]);
        }

        let mut stmt = conn.prepare(&format!(
          "SELECT DISTINCT \"{STATE_COLUMN}\", \"{DISTRICT_COLUMN}\" \
           FROM {SCHOOLS_TABLE} \
           ORDER BY \"{STATE_COLUMN}\", \"{DISTRICT_COLUMN}\""
        ))?;
        let pairs = stmt
          .query_map([], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(pairs)
      })
      .await?;

    let mut map: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for (state, district) in pairs {
      map.entry(state).or_default().push(district);
    }
    Ok(map)
  }

  async fn academic_years(&self) -> Result<Vec<String>> {
    let years = self
      .conn
      .call(|conn| {
        let columns = registry::table_columns(conn)?;
        if !columns.iter().any(|c| c == ACADEMIC_YEAR) {
          return Ok(vec![]);
        }
        let mut stmt = conn.prepare(&format!(
          "SELECT DISTINCT \"{ACADEMIC_YEAR}\" FROM {SCHOOLS_TABLE} \
           ORDER BY \"{ACADEMIC_YEAR}\""
        ))?;
        let years = stmt
          .query_map([], |row| row.get::<_, String>(0))?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(years)
      })
      .await?;
    Ok(years)
  }

  async fn filter_options(&self) -> Result<FilterOptions> {
    let options = self
      .conn
      .call(|conn| {
        let columns = registry::table_columns(conn)?;
        let present =
          |name: &str| columns.iter().any(|c| c == name);

        let mut options = FilterOptions::default();
        if columns.is_empty() {
          return Ok(options);
        }

        if present(STATE_COLUMN) {
          let mut stmt = conn.prepare(&format!(
            "SELECT DISTINCT \"{STATE_COLUMN}\" FROM {SCHOOLS_TABLE} \
             ORDER BY \"{STATE_COLUMN}\""
          ))?;
          options.states = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        }

        if present(STATE_COLUMN) && present(DISTRICT_COLUMN) {
          let mut stmt = conn.prepare(&format!(
            "SELECT DISTINCT \"{STATE_COLUMN}\", \"{DISTRICT_COLUMN}\" \
             FROM {SCHOOLS_TABLE} \
             ORDER BY \"{STATE_COLUMN}\", \"{DISTRICT_COLUMN}\""
          ))?;
          let pairs = stmt
            .query_map([], |row| {
              Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
          for (state, district) in pairs {
            options
              .districts_by_state
              .entry(state)
              .or_default()
              .push(district);
          }
        }

        if present(STATE_COLUMN) && present(DISTRICT_COLUMN) && present(BLOCK_COLUMN) {
          let mut stmt = conn.prepare(&format!(
            "SELECT DISTINCT \"{STATE_COLUMN}\", \"{DISTRICT_COLUMN}\", \"{BLOCK_COLUMN}\" \
             FROM {SCHOOLS_TABLE} \
             ORDER BY \"{STATE_COLUMN}\", \"{DISTRICT_COLUMN}\", \"{BLOCK_COLUMN}\""
          ))?;
          let triples = stmt
            .query_map([], |row| {
              Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
              ))
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
          for (state, district, block) in triples {
            options
              .blocks_by_state_district
              .entry(format!("{state}|{district}"))
              .or_default()
              .push(block);
          }
        }

        if present(ACADEMIC_YEAR) {
          let mut stmt = conn.prepare(&format!(
            "SELECT DISTINCT \"{ACADEMIC_YEAR}\" FROM {SCHOOLS_TABLE} \
             ORDER BY \"{ACADEMIC_YEAR}\""
          ))?;
          options.academic_years = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        }

        Ok(options)
      })
      .await?;
    Ok(options)
  }

  async fn dashboard_stats(&self, filter: &StatsFilter) -> Result<DashboardStats> {
    stats::compute(self, filter).await
  }
}
