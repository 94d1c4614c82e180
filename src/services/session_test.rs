use super::*;

// =============================================================================
// bytes_to_hex
// =============================================================================

#[test]
fn bytes_to_hex_empty() {
    assert_eq!(bytes_to_hex(&[]), "");
}

#[test]
fn bytes_to_hex_leading_zero() {
    assert_eq!(bytes_to_hex(&[0x0a]), "0a");
}

#[test]
fn bytes_to_hex_multi_byte() {
    assert_eq!(bytes_to_hex(&[0xde, 0xad, 0xbe, 0xef]), "deadbeef");
}

// =============================================================================
// generate_token
// =============================================================================

#[test]
fn generate_token_is_64_hex_chars() {
    let token = generate_token();
    assert_eq!(token.len(), 64);
    assert!(token.chars().all(|c| c.is_ascii_hexdigit()));
}

#[test]
fn generate_token_two_calls_differ() {
    assert_ne!(generate_token(), generate_token());
}

// =============================================================================
// SessionUser
// =============================================================================

#[test]
fn session_user_serializes_identifier_and_email() {
    let user = SessionUser { identifier: 42, email: "ops@example.test".into() };
    let json = serde_json::to_value(&user).unwrap();
    assert_eq!(json["identifier"], 42);
    assert_eq!(json["email"], "ops@example.test");
}

// =============================================================================
// LIVE DATABASE
// =============================================================================

#[cfg(feature = "live-db-tests")]
mod live {
    use super::*;
    use crate::services::test_support::{integration_pool, seed_user};

    #[tokio::test]
    #[ignore = "requires TEST_DATABASE_URL/live Postgres"]
    async fn session_round_trip() {
        let pool = integration_pool().await;
        let user = seed_user(&pool, "session@example.test", "hunter2").await;

        let token = create_session(&pool, user, 1).await.unwrap();
        let resolved = validate_session(&pool, &token).await.unwrap().unwrap();
        assert_eq!(resolved.identifier, user);
        assert_eq!(resolved.email, "session@example.test");

        delete_session(&pool, &token).await.unwrap();
        assert!(validate_session(&pool, &token).await.unwrap().is_none());
    }

    #[tokio::test]
    #[ignore = "requires TEST_DATABASE_URL/live Postgres"]
    async fn expired_session_is_rejected_and_swept() {
        let pool = integration_pool().await;
        let user = seed_user(&pool, "expired@example.test", "hunter2").await;
        let token = generate_token();
        sqlx::query(
            "INSERT INTO sessions (token, user_identifier, expires_at) VALUES ($1, $2, now() - interval '1 minute')",
        )
        .bind(&token)
        .bind(user)
        .execute(&pool)
        .await
        .unwrap();

        assert!(validate_session(&pool, &token).await.unwrap().is_none());
        assert!(delete_expired_sessions(&pool).await.unwrap() >= 1);
    }
}
