//! Encoding and decoding helpers between Rust domain types and the plain-text
//! representations stored in SQLite columns.
//!
//! All timestamps are stored as RFC 3339 strings, UUIDs as hyphenated
//! lowercase strings, roles as their wire names. Token digests are lowercase
//! hex SHA-256.

use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};
use shala_core::user::{Role, User};
use uuid::Uuid;

use crate::{Error, Result};

// ─── Uuid ─────────────────────────────────────────────────────────────────────

pub fn encode_uuid(id: Uuid) -> String { id.hyphenated().to_string() }

pub fn decode_uuid(s: &str) -> Result<Uuid> { Ok(Uuid::parse_str(s)?) }

// ─── DateTime<Utc>
// ────────────────────────────────────────────────────────────

pub fn encode_dt(dt: DateTime<Utc>) -> String { dt.to_rfc3339() }

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::DateParse(e.to_string()))
}

// ─── Role ─────────────────────────────────────────────────────────────────────

pub fn decode_role(s: &str) -> Result<Role> {
  Role::parse(s).ok_or_else(|| Error::UnknownRole(s.to_owned()))
}

// ─── Tokens ──────────────────────────────────────────────────────────────────

/// Digest stored in place of a bearer token.
pub fn hash_token(token: &str) -> String {
  hex::encode(Sha256::digest(token.as_bytes()))
}

// ─── Raw rows ────────────────────────────────────────────────────────────────

/// A `users` row as read straight out of SQLite, before decoding.
pub struct RawUser {
  pub user_id:    String,
  pub email:      String,
  pub name:       String,
  pub picture:    Option<String>,
  pub google_id:  String,
  pub role:       String,
  pub created_at: String,
  pub last_login: Option<String>,
}

impl RawUser {
  pub fn into_user(self) -> Result<User> {
    Ok(User {
      user_id:    decode_uuid(&self.user_id)?,
      email:      self.email,
      name:       self.name,
      picture:    self.picture,
      google_id:  self.google_id,
      role:       decode_role(&self.role)?,
      created_at: decode_dt(&self.created_at)?,
      last_login: self.last_login.as_deref().map(decode_dt).transpose()?,
    })
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn token_hash_is_stable_hex() {
    let a = hash_token("abc");
    let b = hash_token("abc");
    assert_eq!(a, b);
    assert_eq!(a.len(), 64);
    assert_ne!(a, hash_token("abd"));
  }
}
