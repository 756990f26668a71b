//! Fixed SQL schema: identity tables and pragmas.
//!
//! The `schools` table is deliberately absent here — it is created and
//! widened at runtime by the [`registry`](crate::registry) module, because
//! its column set follows the data.

/// Fixed-schema DDL; idempotent thanks to `CREATE TABLE IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

CREATE TABLE IF NOT EXISTS users (
    user_id     TEXT PRIMARY KEY,
    email       TEXT NOT NULL UNIQUE,
    name        TEXT NOT NULL,
    picture     TEXT,
    google_id   TEXT NOT NULL UNIQUE,
    role        TEXT NOT NULL DEFAULT 'user',
    created_at  TEXT NOT NULL,   -- ISO 8601 UTC
    last_login  TEXT
);

-- Opaque bearer sessions. Only the SHA-256 digest of a token is stored;
-- the cleartext exists only in the sign-in response.
CREATE TABLE IF NOT EXISTS auth_tokens (
    token_hash  TEXT PRIMARY KEY,
    user_id     TEXT NOT NULL REFERENCES users(user_id) ON DELETE CASCADE,
    created_at  TEXT NOT NULL,
    expires_at  TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS auth_tokens_user_idx    ON auth_tokens(user_id);
CREATE INDEX IF NOT EXISTS auth_tokens_expires_idx ON auth_tokens(expires_at);

PRAGMA user_version = 1;
";

/// Name of the dynamically shaped school-record table.
pub const SCHOOLS_TABLE: &str = "schools";

/// Name of the natural-key unique index on [`SCHOOLS_TABLE`].
pub const SCHOOLS_KEY_INDEX: &str = "schools_natural_key_idx";
