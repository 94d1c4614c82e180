//! Password login.
//!
//! Stored credentials are a per-user salt and the hex PBKDF2-HMAC-SHA256 key
//! derived from the password (100 000 rounds, 64 bytes). Users are provisioned
//! out of band; this module only verifies.

use pbkdf2::pbkdf2_hmac;
use serde::Serialize;
use sha2::Sha256;
use sqlx::PgPool;

use crate::services::session::bytes_to_hex;

pub const PBKDF2_ROUNDS: u32 = 100_000;
pub const DERIVED_KEY_LEN: usize = 64;

/// Message returned for both unknown emails and wrong passwords.
pub const LOGIN_FAILED: &str = "Email or password is incorrect.";

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("database error: {0}")]
    Db(#[from] sqlx::Error),
    #[error("password derivation task failed: {0}")]
    Derivation(#[from] tokio::task::JoinError),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LoginUser {
    #[serde(skip)]
    pub identifier: i64,
    pub email: String,
}

/// Derive the hex-encoded key stored for `password` under `salt`.
#[must_use]
pub fn derive_key(password: &str, salt: &str) -> String {
    derive_key_with_rounds(password, salt, PBKDF2_ROUNDS)
}

pub(crate) fn derive_key_with_rounds(password: &str, salt: &str, rounds: u32) -> String {
    let mut key = [0u8; DERIVED_KEY_LEN];
    pbkdf2_hmac::<Sha256>(password.as_bytes(), salt.as_bytes(), rounds, &mut key);
    bytes_to_hex(&key)
}

/// Compare two derived keys without short-circuiting on the first mismatch.
#[must_use]
pub fn keys_match(candidate: &str, stored: &str) -> bool {
    let (a, b) = (candidate.as_bytes(), stored.as_bytes());
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

/// Verify an email/password pair. `Ok(None)` means the credentials are wrong.
///
/// # Errors
///
/// Returns an error if the lookup fails or the derivation task panics.
pub async fn verify_credentials(pool: &PgPool, email: &str, password: &str) -> Result<Option<LoginUser>, AuthError> {
    let row = sqlx::query_as::<_, (i64, String, String, String)>(
        "SELECT identifier, email, salt, password FROM users WHERE email = $1 LIMIT 1",
    )
    .bind(email)
    .fetch_optional(pool)
    .await?;

    let Some((identifier, email, salt, stored_key)) = row else {
        return Ok(None);
    };

    // CPU-bound; run on the blocking pool.
    let password = password.to_owned();
    let candidate = tokio::task::spawn_blocking(move || derive_key(&password, &salt)).await?;

    Ok(keys_match(&candidate, &stored_key).then_some(LoginUser { identifier, email }))
}

#[cfg(test)]
#[path = "auth_test.rs"]
mod tests;
