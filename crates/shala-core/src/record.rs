//! School records — schemaless field maps as they arrive from upstream.
//!
//! Upstream exports are key/value bags whose field set drifts between
//! academic years. A record is therefore a JSON object; the column set of
//! the backing table is the union of every field name ever seen. All values
//! are flattened to text exactly once, at ingest.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{Error, Result};

/// Field holding the government-issued school identifier.
pub const UDISE_CODE: &str = "udise_code";

/// Field holding the academic year, when the batch carries one.
pub const ACADEMIC_YEAR: &str = "ay";

/// Sentinel stored in place of absent, null, or empty values.
pub const NOT_AVAILABLE: &str = "NA";

// ─── Record ──────────────────────────────────────────────────────────────────

/// One school record: an ordered map from field name to raw JSON value.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SchoolRecord(pub serde_json::Map<String, Value>);

impl SchoolRecord {
  pub fn fields(&self) -> impl Iterator<Item = &str> {
    self.0.keys().map(String::as_str)
  }

  pub fn get(&self, field: &str) -> Option<&Value> { self.0.get(field) }

  /// The stored text for `field`, after normalization.
  pub fn text_value(&self, field: &str) -> String {
    normalize_value(self.get(field))
  }
}

impl<'a, const N: usize> From<[(&'a str, Value); N]> for SchoolRecord {
  fn from(pairs: [(&'a str, Value); N]) -> Self {
    Self(
      pairs
        .into_iter()
        .map(|(k, v)| (k.to_owned(), v))
        .collect(),
    )
  }
}

// ─── Batch field set ─────────────────────────────────────────────────────────

/// The field set shared by a batch, taken from its first record.
///
/// Every field name is validated as a column identifier before it can reach
/// any DDL or DML statement.
pub fn batch_fields(records: &[SchoolRecord]) -> Result<Vec<String>> {
  let first = records.first().ok_or(Error::EmptyBatch)?;

  let fields: Vec<String> = first.fields().map(str::to_owned).collect();
  if !fields.iter().any(|f| f == UDISE_CODE) {
    return Err(Error::MissingKeyField(UDISE_CODE));
  }
  for field in &fields {
    validate_field_name(field)?;
  }
  Ok(fields)
}

/// Check that `name` is safe to use as a bare column identifier.
pub fn validate_field_name(name: &str) -> Result<()> {
  let mut chars = name.chars();
  let valid_start = chars
    .next()
    .is_some_and(|c| c.is_ascii_alphabetic() || c == '_');
  let valid_rest = chars.all(|c| c.is_ascii_alphanumeric() || c == '_');

  if valid_start && valid_rest {
    Ok(())
  } else {
    Err(Error::InvalidFieldName(name.to_owned()))
  }
}

// ─── Natural key ─────────────────────────────────────────────────────────────

/// Which uniqueness key a batch activates on the schools table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyShape {
  /// `(udise_code)` — the batch has no academic-year field.
  Udise,
  /// `(udise_code, ay)` — the batch carries an academic year.
  UdiseYear,
}

impl KeyShape {
  pub fn of_fields<S: AsRef<str>>(fields: &[S]) -> Self {
    if fields.iter().any(|f| f.as_ref() == ACADEMIC_YEAR) {
      Self::UdiseYear
    } else {
      Self::Udise
    }
  }

  /// Column list backing the unique index for this shape.
  pub fn columns(self) -> &'static [&'static str] {
    match self {
      Self::Udise => &[UDISE_CODE],
      Self::UdiseYear => &[UDISE_CODE, ACADEMIC_YEAR],
    }
  }
}

// ─── Value normalization ─────────────────────────────────────────────────────

/// Flatten a raw JSON value to the text stored in its column.
///
/// Absent, null, and empty-string values all collapse to [`NOT_AVAILABLE`];
/// nested structures are stored as their compact JSON text.
pub fn normalize_value(value: Option<&Value>) -> String {
  match value {
    None | Some(Value::Null) => NOT_AVAILABLE.to_owned(),
    Some(Value::String(s)) if s.is_empty() => NOT_AVAILABLE.to_owned(),
    Some(Value::String(s)) => s.clone(),
    Some(Value::Bool(b)) => b.to_string(),
    Some(Value::Number(n)) => n.to_string(),
    Some(v @ (Value::Object(_) | Value::Array(_))) => v.to_string(),
  }
}
