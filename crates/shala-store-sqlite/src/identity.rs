//! [`IdentityStore`] implementation: user accounts and bearer sessions.

use chrono::{Duration, Utc};
use rand_core::{OsRng, RngCore};
use shala_core::{
  store::IdentityStore,
  user::{GoogleProfile, IssuedToken, User, UserStats, UserUpdate, TOKEN_TTL_HOURS},
};
use uuid::Uuid;

use crate::{
  encode::{encode_dt, encode_uuid, hash_token, RawUser},
  store::SqliteStore,
  Error, Result,
};

const USER_COLUMNS: &str =
  "user_id, email, name, picture, google_id, role, created_at, last_login";

fn raw_user_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<RawUser> {
  Ok(RawUser {
    user_id:    row.get(0)?,
    email:      row.get(1)?,
    name:       row.get(2)?,
    picture:    row.get(3)?,
    google_id:  row.get(4)?,
    role:       row.get(5)?,
    created_at: row.get(6)?,
    last_login: row.get(7)?,
  })
}

impl IdentityStore for SqliteStore {
  type Error = Error;

  async fn upsert_google_user(&self, profile: GoogleProfile) -> Result<User> {
    let now_str = encode_dt(Utc::now());
    let new_id = encode_uuid(Uuid::new_v4());

    let raw = self
      .conn
      .call(move |conn| {
        use rusqlite::OptionalExtension as _;

        let existing: Option<String> = conn
          .query_row(
            "SELECT user_id FROM users WHERE google_id = ?1",
            rusqlite::params![profile.google_id],
            |row| row.get(0),
          )
          .optional()?;

        let user_id = match existing {
          Some(id) => {
            conn.execute(
              "UPDATE users
                 SET email = ?1, name = ?2, picture = ?3, last_login = ?4
               WHERE user_id = ?5",
              rusqlite::params![
                profile.email,
                profile.name,
                profile.picture,
                now_str,
                id
              ],
            )?;
            id
          }
          None => {
            conn.execute(
              "INSERT INTO users
                 (user_id, email, name, picture, google_id, role,
                  created_at, last_login)
               VALUES (?1, ?2, ?3, ?4, ?5, 'user', ?6, ?6)",
              rusqlite::params![
                new_id,
                profile.email,
                profile.name,
                profile.picture,
                profile.google_id,
                now_str
              ],
            )?;
            new_id.clone()
          }
        };

        let raw = conn.query_row(
          &format!("SELECT {USER_COLUMNS} FROM users WHERE user_id = ?1"),
          rusqlite::params![user_id],
          raw_user_from_row,
        )?;
        Ok(raw)
      })
      .await?;

    raw.into_user()
  }

  async fn issue_token(&self, user_id: Uuid) -> Result<IssuedToken> {
    let mut bytes = [0u8; 32];
    OsRng.fill_bytes(&mut bytes);
    let token = hex::encode(bytes);
    let token_hash = hash_token(&token);

    let now = Utc::now();
    let expires_at = now + Duration::hours(TOKEN_TTL_HOURS);
    let id_str = encode_uuid(user_id);
    let now_str = encode_dt(now);
    let expires_str = encode_dt(expires_at);

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO auth_tokens (token_hash, user_id, created_at, expires_at)
           VALUES (?1, ?2, ?3, ?4)",
          rusqlite::params![token_hash, id_str, now_str, expires_str],
        )?;
        Ok(())
      })
      .await?;

    Ok(IssuedToken { token, expires_at })
  }

  async fn resolve_token(&self, token: &str) -> Result<Option<User>> {
    let token_hash = hash_token(token);
    let now_str = encode_dt(Utc::now());

    let raw: Option<RawUser> = self
      .conn
      .call(move |conn| {
        use rusqlite::OptionalExtension as _;

        let user_columns = USER_COLUMNS
          .split(", ")
          .map(|c| format!("u.{c}"))
          .collect::<Vec<_>>()
          .join(", ");
        Ok(
          conn
            .query_row(
              &format!(
                "SELECT {user_columns} FROM users u
                 JOIN auth_tokens t ON t.user_id = u.user_id
                 WHERE t.token_hash = ?1 AND t.expires_at > ?2"
              ),
              rusqlite::params![token_hash, now_str],
              raw_user_from_row,
            )
            .optional()?,
        )
      })
      .await?;

    raw.map(RawUser::into_user).transpose()
  }

  async fn revoke_token(&self, token: &str) -> Result<()> {
    let token_hash = hash_token(token);
    self
      .conn
      .call(move |conn| {
        conn.execute(
          "DELETE FROM auth_tokens WHERE token_hash = ?1",
          rusqlite::params![token_hash],
        )?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  async fn purge_expired_tokens(&self) -> Result<u64> {
    let now_str = encode_dt(Utc::now());
    let removed = self
      .conn
      .call(move |conn| {
        let removed = conn.execute(
          "DELETE FROM auth_tokens WHERE expires_at <= ?1",
          rusqlite::params![now_str],
        )?;
        Ok(removed as u64)
      })
      .await?;
    Ok(removed)
  }

  // ── User administration ───────────────────────────────────────────────────

  async fn list_users(&self) -> Result<Vec<User>> {
    let raws: Vec<RawUser> = self
      .conn
      .call(|conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {USER_COLUMNS} FROM users ORDER BY created_at"
        ))?;
        let raws = stmt
          .query_map([], raw_user_from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(raws)
      })
      .await?;

    raws.into_iter().map(RawUser::into_user).collect()
  }

  async fn get_user(&self, user_id: Uuid) -> Result<Option<User>> {
    let id_str = encode_uuid(user_id);
    let raw: Option<RawUser> = self
      .conn
      .call(move |conn| {
        use rusqlite::OptionalExtension as _;

        Ok(
          conn
            .query_row(
              &format!("SELECT {USER_COLUMNS} FROM users WHERE user_id = ?1"),
              rusqlite::params![id_str],
              raw_user_from_row,
            )
            .optional()?,
        )
      })
      .await?;

    raw.map(RawUser::into_user).transpose()
  }

  async fn update_user(
    &self,
    user_id: Uuid,
    update: UserUpdate,
  ) -> Result<Option<User>> {
    let id_str = encode_uuid(user_id);
    let name = update.name;
    let role = update.role.map(|r| r.as_str().to_owned());

    let raw: Option<RawUser> = self
      .conn
      .call(move |conn| {
        use rusqlite::OptionalExtension as _;

        let changed = conn.execute(
          "UPDATE users
             SET name = COALESCE(?1, name), role = COALESCE(?2, role)
           WHERE user_id = ?3",
          rusqlite::params![name, role, id_str],
        )?;
        if changed == 0 {
          return Ok(None);
        }

        Ok(
          conn
            .query_row(
              &format!("SELECT {USER_COLUMNS} FROM users WHERE user_id = ?1"),
              rusqlite::params![id_str],
              raw_user_from_row,
            )
            .optional()?,
        )
      })
      .await?;

    raw.map(RawUser::into_user).transpose()
  }

  async fn delete_user(&self, user_id: Uuid) -> Result<bool> {
    let id_str = encode_uuid(user_id);
    let deleted = self
      .conn
      .call(move |conn| {
        // Tokens go with the account via ON DELETE CASCADE.
        let deleted =
          conn.execute("DELETE FROM users WHERE user_id = ?1", rusqlite::params![id_str])?;
        Ok(deleted > 0)
      })
      .await?;
    Ok(deleted)
  }

  async fn user_stats(&self) -> Result<UserStats> {
    let cutoff_str = encode_dt(Utc::now() - Duration::hours(24));

    let stats = self
      .conn
      .call(move |conn| {
        Ok(conn.query_row(
          "SELECT COUNT(*),
                  COALESCE(SUM(CASE WHEN role = 'admin' THEN 1 ELSE 0 END), 0),
                  COALESCE(SUM(CASE WHEN role = 'super-admin' THEN 1 ELSE 0 END), 0),
                  COALESCE(SUM(CASE WHEN last_login IS NOT NULL
                                     AND last_login >= ?1 THEN 1 ELSE 0 END), 0)
           FROM users",
          rusqlite::params![cutoff_str],
          |row| {
            Ok(UserStats {
              total_users:     row.get::<_, i64>(0)?.max(0) as u64,
              admins:          row.get::<_, i64>(1)?.max(0) as u64,
              super_admins:    row.get::<_, i64>(2)?.max(0) as u64,
              active_last_day: row.get::<_, i64>(3)?.max(0) as u64,
            })
          },
        )?)
      })
      .await?;
    Ok(stats)
  }
}
