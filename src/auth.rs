//! Session auth backed by the catalog database: sha256 password hashes,
//! random bearer tokens with a TTL, and an actix extractor for handlers.

use std::future::{ready, Ready};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use actix_web::dev::Payload;
use actix_web::error::InternalError;
use actix_web::http::header;
use actix_web::{web, FromRequest, HttpRequest};
use anyhow::{Context, Result};
use rand::Rng;
use rusqlite::{params, OptionalExtension};
use sha2::{Digest, Sha256};

use crate::catalog::CatalogDb;
use crate::models;
use crate::state::AppState;

#[derive(Debug, Clone, serde::Serialize, utoipa::ToSchema)]
pub struct UserRecord {
    pub id: i64,
    pub username: String,
}

#[derive(Debug, Clone)]
pub struct SessionRecord {
    pub token: String,
    pub user_id: i64,
    pub expires_at: u64,
}

#[derive(Clone)]
pub struct AuthStore {
    db: CatalogDb,
    session_ttl: Duration,
}

impl AuthStore {
    pub fn new(db: CatalogDb, session_ttl: Duration) -> Self {
        Self { db, session_ttl }
    }

    /// Creates the configured admin account unless the username exists.
    pub fn ensure_bootstrap_user(&self, username: &str, password: &str) -> Result<()> {
        let conn = self.db.pool().get().context("open catalog db")?;
        conn.execute(
            "INSERT OR IGNORE INTO users (username, password_hash) VALUES (?1, ?2)",
            params![username, hash_password(password)],
        )
        .context("bootstrap admin user")?;
        Ok(())
    }

    pub fn authenticate(&self, username: &str, password: &str) -> Result<Option<UserRecord>> {
        let conn = self.db.pool().get().context("open catalog db")?;
        let row: Option<(i64, String, String)> = conn
            .query_row(
                "SELECT id, username, password_hash FROM users WHERE username = ?1",
                params![username],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
            )
            .optional()
            .context("fetch user")?;
        Ok(row.and_then(|(id, username, hash)| {
            verify_password(password, &hash).then_some(UserRecord { id, username })
        }))
    }

    pub fn create_session(&self, user_id: i64) -> Result<SessionRecord> {
        let token = generate_token();
        let expires_at = now_secs() + self.session_ttl.as_secs();
        let conn = self.db.pool().get().context("open catalog db")?;
        conn.execute(
            "INSERT INTO sessions (token, user_id, expires_at) VALUES (?1, ?2, ?3)",
            params![token, user_id, expires_at as i64],
        )
        .context("insert session")?;
        Ok(SessionRecord { token, user_id, expires_at })
    }

    pub fn revoke_session(&self, token: &str) -> Result<()> {
        let conn = self.db.pool().get().context("open catalog db")?;
        conn.execute("DELETE FROM sessions WHERE token = ?1", params![token])
            .context("delete session")?;
        Ok(())
    }

    /// Expired sessions are deleted on sight and read as absent.
    pub fn user_from_token(&self, token: &str) -> Result<Option<UserRecord>> {
        let conn = self.db.pool().get().context("open catalog db")?;
        let row: Option<(i64, String, i64)> = conn
            .query_row(
                r#"
                SELECT u.id, u.username, s.expires_at
                FROM sessions s
                JOIN users u ON u.id = s.user_id
                WHERE s.token = ?1
                "#,
                params![token],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
            )
            .optional()
            .context("fetch session")?;
        match row {
            Some((id, username, expires_at)) => {
                if (expires_at as u64) <= now_secs() {
                    conn.execute("DELETE FROM sessions WHERE token = ?1", params![token])
                        .context("delete expired session")?;
                    Ok(None)
                } else {
                    Ok(Some(UserRecord { id, username }))
                }
            }
            None => Ok(None),
        }
    }

    pub fn purge_expired_sessions(&self) -> Result<usize> {
        let conn = self.db.pool().get().context("open catalog db")?;
        let purged = conn
            .execute(
                "DELETE FROM sessions WHERE expires_at <= ?1",
                params![now_secs() as i64],
            )
            .context("purge expired sessions")?;
        Ok(purged)
    }
}

fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_secs())
        .unwrap_or(0)
}

fn hash_password(password: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(password);
    format!("{:x}", hasher.finalize())
}

fn verify_password(password: &str, hash: &str) -> bool {
    hash_password(password) == hash
}

fn generate_token() -> String {
    let mut rng = rand::rng();
    (0..32)
        .map(|_| {
            let idx = rng.random_range(0..62);
            let chars = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz";
            chars[idx] as char
        })
        .collect()
}

/// Extractor for endpoints that require a valid bearer session.
pub struct AuthedUser(pub UserRecord);

pub fn bearer_token(req: &HttpRequest) -> Option<&str> {
    req.headers()
        .get(header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
}

fn reject(status: actix_web::http::StatusCode, code: &str, message: &str) -> actix_web::Error {
    InternalError::from_response(
        message.to_string(),
        models::error_response(status, code, message),
    )
    .into()
}

impl FromRequest for AuthedUser {
    type Error = actix_web::Error;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        ready(authed_user(req))
    }
}

fn authed_user(req: &HttpRequest) -> Result<AuthedUser, actix_web::Error> {
    use actix_web::http::StatusCode;

    let Some(state) = req.app_data::<web::Data<AppState>>() else {
        return Err(reject(
            StatusCode::INTERNAL_SERVER_ERROR,
            "SERVER_ERROR",
            "application state missing",
        ));
    };
    let Some(token) = bearer_token(req) else {
        return Err(reject(StatusCode::UNAUTHORIZED, "UNAUTHORIZED", "missing bearer token"));
    };
    match state.auth.user_from_token(token) {
        Ok(Some(user)) => Ok(AuthedUser(user)),
        Ok(None) => Err(reject(
            StatusCode::UNAUTHORIZED,
            "UNAUTHORIZED",
            "invalid or expired session",
        )),
        Err(err) => {
            tracing::error!(error = %err, "session lookup failed");
            Err(reject(
                StatusCode::INTERNAL_SERVER_ERROR,
                "SERVER_ERROR",
                "session lookup failed",
            ))
        }
    }
}
