//! Session management.
//!
//! ARCHITECTURE
//! ============
//! A successful login stores a random token in `sessions` and hands it to the
//! browser as an HttpOnly cookie. The cookie carries nothing but the token;
//! the user identifier stays server side and is resolved on every request.
//!
//! TRADE-OFFS
//! ==========
//! Expired rows are not swept eagerly. `validate_session` ignores them and
//! `delete_expired_sessions` runs opportunistically at login.

use std::fmt::Write;

use rand::Rng;
use serde::Serialize;
use sqlx::PgPool;

pub(crate) fn bytes_to_hex(bytes: &[u8]) -> String {
    let mut s = String::with_capacity(bytes.len() * 2);
    for b in bytes {
        let _ = write!(s, "{b:02x}");
    }
    s
}

/// Generate a cryptographically random 32-byte hex token.
#[must_use]
pub fn generate_token() -> String {
    let bytes: [u8; 32] = rand::rng().random();
    bytes_to_hex(&bytes)
}

/// User resolved from a valid session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionUser {
    pub identifier: i64,
    pub email: String,
}

/// Create a session for the given user, returning the token.
///
/// # Errors
///
/// Returns a database error if the insert fails.
pub async fn create_session(pool: &PgPool, user_identifier: i64, ttl_days: i64) -> Result<String, sqlx::Error> {
    let token = generate_token();
    sqlx::query(
        "INSERT INTO sessions (token, user_identifier, expires_at)
         VALUES ($1, $2, now() + make_interval(days => $3::INT))",
    )
    .bind(&token)
    .bind(user_identifier)
    .bind(i32::try_from(ttl_days).unwrap_or(i32::MAX))
    .execute(pool)
    .await?;
    Ok(token)
}

/// Validate a session token and return the associated user.
///
/// # Errors
///
/// Returns a database error if the query fails.
pub async fn validate_session(pool: &PgPool, token: &str) -> Result<Option<SessionUser>, sqlx::Error> {
    let row = sqlx::query_as::<_, (i64, String)>(
        "SELECT u.identifier, u.email
         FROM sessions s
         JOIN users u ON u.identifier = s.user_identifier
         WHERE s.token = $1 AND s.expires_at > now()",
    )
    .bind(token)
    .fetch_optional(pool)
    .await?;

    Ok(row.map(|(identifier, email)| SessionUser { identifier, email }))
}

/// Delete a session by token.
///
/// # Errors
///
/// Returns a database error if the delete fails.
pub async fn delete_session(pool: &PgPool, token: &str) -> Result<(), sqlx::Error> {
    sqlx::query("DELETE FROM sessions WHERE token = $1")
        .bind(token)
        .execute(pool)
        .await?;
    Ok(())
}

/// Remove every expired session row. Returns the number removed.
///
/// # Errors
///
/// Returns a database error if the delete fails.
pub async fn delete_expired_sessions(pool: &PgPool) -> Result<u64, sqlx::Error> {
    let result = sqlx::query("DELETE FROM sessions WHERE expires_at <= now()")
        .execute(pool)
        .await?;
    Ok(result.rows_affected())
}

#[cfg(test)]
#[path = "session_test.rs"]
mod tests;
