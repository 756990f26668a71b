//! Error types for `shala-core`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  /// A bulk save was attempted with no records in it.
  #[error("batch is empty")]
  EmptyBatch,

  /// The first record of a batch defines the column set; it must carry the
  /// school identifier so the uniqueness index has something to stand on.
  #[error("batch records are missing the {0:?} field")]
  MissingKeyField(&'static str),

  #[error("field name {0:?} is not a valid column identifier")]
  InvalidFieldName(String),

  #[error("serialization error: {0}")]
  Serialization(#[from] serde_json::Error),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
