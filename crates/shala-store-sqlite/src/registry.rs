//! Field registry — the sole writer of structural changes to the `schools`
//! table.
//!
//! Upstream batches define their own field sets, so the table is created on
//! first ingest and widened with `ALTER TABLE .. ADD COLUMN` as new fields
//! appear. Columns only ever accumulate. Exactly one unique index enforces
//! the natural key; its column list follows the most recent batch's key
//! shape, and a shape change is logged because rows ingested under the old
//! shape are not re-validated against the new one.
//!
//! All structural writes go through [`reconcile`], which callers must run
//! while holding the registry's migration lock and inside the same
//! transaction as the insert that follows.

use shala_core::record::{KeyShape, NOT_AVAILABLE};
use tokio::sync::{Mutex, MutexGuard};

use crate::schema::{SCHOOLS_KEY_INDEX, SCHOOLS_TABLE};

/// Serializes structural changes across concurrent ingest calls.
pub struct FieldRegistry {
  lock: Mutex<()>,
}

impl FieldRegistry {
  pub fn new() -> Self {
    Self { lock: Mutex::new(()) }
  }

  /// Acquire the migration lock for the duration of one ingest.
  pub async fn lock(&self) -> MutexGuard<'_, ()> { self.lock.lock().await }
}

impl Default for FieldRegistry {
  fn default() -> Self { Self::new() }
}

// ─── Introspection ───────────────────────────────────────────────────────────

pub fn table_exists(conn: &rusqlite::Connection) -> rusqlite::Result<bool> {
  let mut stmt = conn.prepare(
    "SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = ?1",
  )?;
  stmt.exists([SCHOOLS_TABLE])
}

/// Current column names of the schools table; empty when the table does not
/// exist yet.
pub fn table_columns(conn: &rusqlite::Connection) -> rusqlite::Result<Vec<String>> {
  let mut stmt =
    conn.prepare(&format!("PRAGMA table_info({SCHOOLS_TABLE})"))?;
  let cols = stmt
    .query_map([], |row| row.get::<_, String>(1))?
    .collect::<rusqlite::Result<Vec<_>>>()?;
  Ok(cols)
}

/// Column list of the active natural-key index, or `None` if absent.
fn active_key_columns(
  conn: &rusqlite::Connection,
) -> rusqlite::Result<Option<Vec<String>>> {
  let mut stmt =
    conn.prepare(&format!("PRAGMA index_info({SCHOOLS_KEY_INDEX})"))?;
  let cols = stmt
    .query_map([], |row| row.get::<_, String>(2))?
    .collect::<rusqlite::Result<Vec<_>>>()?;
  Ok(if cols.is_empty() { None } else { Some(cols) })
}

// ─── Reconciliation ──────────────────────────────────────────────────────────

/// Ensure the schools table exists, carries every field in `fields` as a
/// TEXT column, and has exactly one unique index matching `shape`.
///
/// Field names must already be validated as identifiers. Runs entirely on
/// the caller's connection so it participates in the enclosing transaction.
pub fn reconcile(
  conn: &rusqlite::Connection,
  fields: &[String],
  shape: KeyShape,
) -> rusqlite::Result<()> {
  if !table_exists(conn)? {
    create_table(conn, fields)?;
  } else {
    add_missing_columns(conn, fields)?;
  }
  ensure_key_index(conn, shape)
}

fn create_table(
  conn: &rusqlite::Connection,
  fields: &[String],
) -> rusqlite::Result<()> {
  // Rows that never receive a value for a column read the sentinel, not
  // NULL, so later batches with narrower field sets stay uniform.
  let columns: Vec<String> = fields
    .iter()
    .map(|f| format!("\"{f}\" TEXT DEFAULT '{NOT_AVAILABLE}'"))
    .collect();
  conn.execute(
    &format!(
      "CREATE TABLE {SCHOOLS_TABLE} (id INTEGER PRIMARY KEY AUTOINCREMENT, {})",
      columns.join(", ")
    ),
    [],
  )?;
  tracing::info!(columns = fields.len(), "created schools table");
  Ok(())
}

fn add_missing_columns(
  conn: &rusqlite::Connection,
  fields: &[String],
) -> rusqlite::Result<()> {
  let existing = table_columns(conn)?;
  for field in fields {
    if existing.iter().any(|c| c == field) {
      continue;
    }
    // The default backfills every previously ingested row with the
    // sentinel the moment the column appears.
    conn.execute(
      &format!(
        "ALTER TABLE {SCHOOLS_TABLE} ADD COLUMN \"{field}\" TEXT \
         DEFAULT '{NOT_AVAILABLE}'"
      ),
      [],
    )?;
    tracing::info!(column = %field, "added schools column");
  }
  Ok(())
}

fn ensure_key_index(
  conn: &rusqlite::Connection,
  shape: KeyShape,
) -> rusqlite::Result<()> {
  let wanted: Vec<String> =
    shape.columns().iter().map(|c| (*c).to_owned()).collect();

  match active_key_columns(conn)? {
    Some(current) if current == wanted => return Ok(()),
    Some(current) => {
      // Rows inserted under the previous shape keep whatever uniqueness
      // that shape gave them; only new ingests see the new key.
      tracing::warn!(
        old = ?current,
        new = ?wanted,
        "natural-key shape changed; swapping unique index"
      );
      conn.execute(&format!("DROP INDEX {SCHOOLS_KEY_INDEX}"), [])?;
    }
    None => {}
  }

  conn.execute(
    &format!(
      "CREATE UNIQUE INDEX {SCHOOLS_KEY_INDEX} ON {SCHOOLS_TABLE} ({})",
      wanted
        .iter()
        .map(|c| format!("\"{c}\""))
        .collect::<Vec<_>>()
        .join(", ")
    ),
    [],
  )?;
  Ok(())
}
