//! Users, roles, and session tokens.
//!
//! Sign-in upserts a user from a Google identity payload; sessions are
//! opaque bearer tokens with a fixed lifetime. Roles gate the user
//! administration endpoints.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Session token lifetime, in hours.
pub const TOKEN_TTL_HOURS: i64 = 24;

// ─── Roles ───────────────────────────────────────────────────────────────────

/// Access level of a user account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Role {
  #[default]
  #[serde(rename = "user")]
  User,
  #[serde(rename = "admin")]
  Admin,
  #[serde(rename = "super-admin")]
  SuperAdmin,
}

impl Role {
  pub fn as_str(self) -> &'static str {
    match self {
      Self::User => "user",
      Self::Admin => "admin",
      Self::SuperAdmin => "super-admin",
    }
  }

  pub fn parse(s: &str) -> Option<Self> {
    match s {
      "user" => Some(Self::User),
      "admin" => Some(Self::Admin),
      "super-admin" => Some(Self::SuperAdmin),
      _ => None,
    }
  }

  /// Whether this role may manage user accounts.
  pub fn can_manage_users(self) -> bool {
    matches!(self, Self::Admin | Self::SuperAdmin)
  }
}

// ─── Users ───────────────────────────────────────────────────────────────────

/// A stored user account.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
  pub user_id:    Uuid,
  pub email:      String,
  pub name:       String,
  pub picture:    Option<String>,
  pub google_id:  String,
  pub role:       Role,
  pub created_at: DateTime<Utc>,
  pub last_login: Option<DateTime<Utc>>,
}

/// Identity payload accepted at sign-in.
#[derive(Debug, Clone, Deserialize)]
pub struct GoogleProfile {
  pub email:     String,
  pub name:      String,
  pub picture:   Option<String>,
  #[serde(rename = "googleId")]
  pub google_id: String,
}

/// Fields an administrator may change on an account.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UserUpdate {
  pub name: Option<String>,
  pub role: Option<Role>,
}

// ─── Sessions ────────────────────────────────────────────────────────────────

/// A freshly issued bearer token. The cleartext exists only in this value;
/// the store keeps a digest.
#[derive(Debug, Clone, Serialize)]
pub struct IssuedToken {
  pub token:      String,
  pub expires_at: DateTime<Utc>,
}

/// Account totals for the administration dashboard.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserStats {
  pub total_users:     u64,
  pub admins:          u64,
  pub super_admins:    u64,
  pub active_last_day: u64,
}
