//! Refresh Token Store
//! Mission: Persist, rotate, and revoke long-lived session tokens
//!
//! Tokens are opaque random strings; the signed access token is what proves
//! identity between refreshes. Per-token state machine: ACTIVE -> REVOKED
//! (terminal, via revoke or rotation) and ACTIVE -> EXPIRED (terminal, the
//! row is deleted on the verify path). The live-token update on verify is a
//! single conditional UPDATE so concurrent verifies racing a revoke cannot
//! both observe a valid token.

use anyhow::{Context, Result};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use chrono::{DateTime, Duration, Utc};
use rand::{rngs::OsRng, RngCore};
use rusqlite::{params, Connection};
use tracing::{debug, info, warn};

const TOKEN_BYTES: usize = 32;

/// Persisted refresh token record.
#[derive(Debug, Clone)]
pub struct RefreshToken {
    pub token: String,
    pub owner_id: i64,
    pub expires_at: i64, // unix seconds
    pub revoked: bool,
    pub created_at: i64,
    pub last_used_at: Option<i64>,
    pub client_ip: Option<String>,
    pub user_agent: Option<String>,
}

/// Refresh-token lifecycle failures.
#[derive(Debug)]
pub enum RefreshTokenError {
    /// No record for the presented token string.
    NotFound,
    /// Token was revoked (directly or by rotation); terminal.
    Revoked,
    /// Token passed its expiry; the record has been deleted.
    Expired,
    /// The owner id does not resolve to a known actor.
    OwnerNotFound,
    /// Unexpected storage failure; fatal for the current request.
    Storage(anyhow::Error),
}

impl std::fmt::Display for RefreshTokenError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RefreshTokenError::NotFound => write!(f, "Refresh token not found"),
            RefreshTokenError::Revoked => write!(f, "Refresh token has been revoked"),
            RefreshTokenError::Expired => write!(f, "Refresh token has expired"),
            RefreshTokenError::OwnerNotFound => write!(f, "Token owner not found"),
            RefreshTokenError::Storage(e) => write!(f, "Refresh token storage error: {e}"),
        }
    }
}

impl std::error::Error for RefreshTokenError {}

impl From<rusqlite::Error> for RefreshTokenError {
    fn from(e: rusqlite::Error) -> Self {
        RefreshTokenError::Storage(e.into())
    }
}

/// Refresh token storage with SQLite backend
pub struct RefreshTokenStore {
    db_path: String,
    refresh_ttl: Duration,
}

impl RefreshTokenStore {
    /// Create a store and initialize the schema. Shares the database file
    /// with the employee directory so owner ids can be resolved.
    pub fn new(db_path: &str, refresh_ttl_days: i64) -> Result<Self> {
        let store = Self {
            db_path: db_path.to_string(),
            refresh_ttl: Duration::days(refresh_ttl_days),
        };
        store.init_db()?;
        Ok(store)
    }

    fn init_db(&self) -> Result<()> {
        let conn = Connection::open(&self.db_path)?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS refresh_tokens (
                token TEXT PRIMARY KEY,
                owner_id INTEGER NOT NULL,
                expires_at INTEGER NOT NULL,
                revoked INTEGER NOT NULL DEFAULT 0,
                created_at INTEGER NOT NULL,
                last_used_at INTEGER,
                client_ip TEXT,
                user_agent TEXT
            )",
            [],
        )?;

        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_refresh_tokens_owner
             ON refresh_tokens(owner_id)",
            [],
        )?;
        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_refresh_tokens_expiry
             ON refresh_tokens(expires_at)",
            [],
        )?;

        Ok(())
    }

    /// Generate an opaque URL-safe token with 32 bytes of OS entropy.
    fn generate_token() -> String {
        let mut bytes = [0u8; TOKEN_BYTES];
        OsRng.fill_bytes(&mut bytes);
        URL_SAFE_NO_PAD.encode(bytes)
    }

    /// Create and persist a new token for `owner_id`.
    pub fn create(
        &self,
        owner_id: i64,
        client_ip: Option<&str>,
        user_agent: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<RefreshToken, RefreshTokenError> {
        let conn = Connection::open(&self.db_path)?;

        let owner_count: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM employees WHERE id = ?1",
                params![owner_id],
                |row| row.get(0),
            )
            .map_err(|e| RefreshTokenError::Storage(e.into()))?;
        if owner_count == 0 {
            return Err(RefreshTokenError::OwnerNotFound);
        }

        let record = RefreshToken {
            token: Self::generate_token(),
            owner_id,
            expires_at: (now + self.refresh_ttl).timestamp(),
            revoked: false,
            created_at: now.timestamp(),
            last_used_at: None,
            client_ip: client_ip.map(str::to_string),
            user_agent: user_agent.map(str::to_string),
        };

        conn.execute(
            "INSERT INTO refresh_tokens
             (token, owner_id, expires_at, revoked, created_at, last_used_at, client_ip, user_agent)
             VALUES (?1, ?2, ?3, 0, ?4, NULL, ?5, ?6)",
            params![
                record.token,
                record.owner_id,
                record.expires_at,
                record.created_at,
                record.client_ip,
                record.user_agent,
            ],
        )?;

        info!(owner_id, "Refresh token created");

        Ok(record)
    }

    /// Verify a presented token. Exactly one of: NotFound, Revoked, Expired
    /// (record deleted), or success with `last_used_at` updated.
    pub fn verify(
        &self,
        token: &str,
        now: DateTime<Utc>,
    ) -> Result<RefreshToken, RefreshTokenError> {
        let conn = Connection::open(&self.db_path)?;

        let mut record = match Self::get_record(&conn, token)? {
            Some(record) => record,
            None => return Err(RefreshTokenError::NotFound),
        };

        if record.revoked {
            warn!(owner_id = record.owner_id, "Attempted use of revoked refresh token");
            return Err(RefreshTokenError::Revoked);
        }

        if record.expires_at <= now.timestamp() {
            conn.execute(
                "DELETE FROM refresh_tokens WHERE token = ?1",
                params![token],
            )?;
            warn!(owner_id = record.owner_id, "Attempted use of expired refresh token");
            return Err(RefreshTokenError::Expired);
        }

        // Conditional update: only touches the row if it is still live, so a
        // verify racing a revoke/rotate/cleanup cannot succeed on a dead token.
        let updated = conn.execute(
            "UPDATE refresh_tokens SET last_used_at = ?1
             WHERE token = ?2 AND revoked = 0 AND expires_at > ?1",
            params![now.timestamp(), token],
        )?;

        if updated == 0 {
            // Lost the race; re-read to report the terminal state.
            return match Self::get_record(&conn, token)? {
                None => Err(RefreshTokenError::NotFound),
                Some(r) if r.revoked => Err(RefreshTokenError::Revoked),
                Some(_) => Err(RefreshTokenError::Expired),
            };
        }

        record.last_used_at = Some(now.timestamp());
        Ok(record)
    }

    /// Mark a token revoked. Terminal; nothing re-activates it.
    pub fn revoke(&self, token: &str) -> Result<(), RefreshTokenError> {
        let conn = Connection::open(&self.db_path)?;

        let updated = conn.execute(
            "UPDATE refresh_tokens SET revoked = 1 WHERE token = ?1",
            params![token],
        )?;

        if updated == 0 {
            return Err(RefreshTokenError::NotFound);
        }

        info!("Refresh token revoked");
        Ok(())
    }

    /// Revoke every active token owned by `owner_id` (logout-everywhere or
    /// credential compromise). Returns how many tokens were revoked.
    pub fn revoke_all(&self, owner_id: i64) -> Result<usize, RefreshTokenError> {
        let conn = Connection::open(&self.db_path)?;

        let revoked = conn.execute(
            "UPDATE refresh_tokens SET revoked = 1 WHERE owner_id = ?1 AND revoked = 0",
            params![owner_id],
        )?;

        info!(owner_id, revoked, "Revoked all refresh tokens for owner");
        Ok(revoked)
    }

    /// Revoke the old token and issue a new one. The new token must be
    /// issued even if the old one was already dead from a racing call, so a
    /// successful refresh never leaves the actor without a session.
    pub fn rotate(
        &self,
        old_token: &str,
        owner_id: i64,
        client_ip: Option<&str>,
        user_agent: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<RefreshToken, RefreshTokenError> {
        match self.revoke(old_token) {
            Ok(()) => {}
            Err(RefreshTokenError::NotFound) => {
                debug!(owner_id, "Rotation: old token already gone");
            }
            Err(e @ RefreshTokenError::Storage(_)) => return Err(e),
            Err(_) => {}
        }

        self.create(owner_id, client_ip, user_agent, now)
    }

    /// Delete every record past its expiry. Runs on a daily schedule; a
    /// single DELETE statement, so concurrent verify/create/revoke calls are
    /// never blocked beyond it.
    pub fn cleanup(&self, now: DateTime<Utc>) -> Result<usize> {
        let conn = Connection::open(&self.db_path)?;

        let deleted = conn
            .execute(
                "DELETE FROM refresh_tokens WHERE expires_at < ?1",
                params![now.timestamp()],
            )
            .context("Failed to delete expired refresh tokens")?;

        info!(deleted, "Expired refresh tokens cleaned up");
        Ok(deleted)
    }

    /// Count of live tokens for an owner at `now`.
    pub fn count_active(&self, owner_id: i64, now: DateTime<Utc>) -> Result<i64> {
        let conn = Connection::open(&self.db_path)?;
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM refresh_tokens
             WHERE owner_id = ?1 AND revoked = 0 AND expires_at > ?2",
            params![owner_id, now.timestamp()],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    fn get_record(
        conn: &Connection,
        token: &str,
    ) -> Result<Option<RefreshToken>, RefreshTokenError> {
        let mut stmt = conn.prepare(
            "SELECT token, owner_id, expires_at, revoked, created_at, last_used_at,
                    client_ip, user_agent
             FROM refresh_tokens WHERE token = ?1",
        )?;

        match stmt.query_row(params![token], |row| {
            Ok(RefreshToken {
                token: row.get(0)?,
                owner_id: row.get(1)?,
                expires_at: row.get(2)?,
                revoked: row.get::<_, i64>(3)? != 0,
                created_at: row.get(4)?,
                last_used_at: row.get(5)?,
                client_ip: row.get(6)?,
                user_agent: row.get(7)?,
            })
        }) {
            Ok(record) => Ok(Some(record)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}
