use super::*;

#[test]
fn derive_key_is_hex_of_configured_length() {
    let key = derive_key_with_rounds("hunter2", "pepper", 10);
    assert_eq!(key.len(), DERIVED_KEY_LEN * 2);
    assert!(key.chars().all(|c| c.is_ascii_hexdigit()));
}

#[test]
fn derive_key_is_deterministic() {
    let a = derive_key_with_rounds("hunter2", "pepper", 10);
    let b = derive_key_with_rounds("hunter2", "pepper", 10);
    assert_eq!(a, b);
}

#[test]
fn derive_key_depends_on_salt_password_and_rounds() {
    let base = derive_key_with_rounds("hunter2", "pepper", 10);
    assert_ne!(base, derive_key_with_rounds("hunter2", "paprika", 10));
    assert_ne!(base, derive_key_with_rounds("hunter3", "pepper", 10));
    assert_ne!(base, derive_key_with_rounds("hunter2", "pepper", 11));
}

#[test]
fn keys_match_requires_exact_equality() {
    assert!(keys_match("abcd", "abcd"));
    assert!(!keys_match("abcd", "abce"));
    assert!(!keys_match("abcd", "abc"));
    assert!(!keys_match("", "a"));
    assert!(keys_match("", ""));
}

#[test]
fn login_user_serializes_email_only() {
    let user = LoginUser { identifier: 7, email: "ops@example.test".into() };
    let json = serde_json::to_value(&user).unwrap();
    assert_eq!(json, serde_json::json!({ "email": "ops@example.test" }));
}

#[cfg(feature = "live-db-tests")]
mod live {
    use super::*;
    use crate::services::test_support::{integration_pool, seed_user};

    #[tokio::test]
    #[ignore = "requires TEST_DATABASE_URL/live Postgres"]
    async fn verify_credentials_accepts_correct_password_only() {
        let pool = integration_pool().await;
        let id = seed_user(&pool, "login@example.test", "correct horse").await;

        let ok = verify_credentials(&pool, "login@example.test", "correct horse")
            .await
            .unwrap()
            .expect("correct password should verify");
        assert_eq!(ok.identifier, id);
        assert_eq!(ok.email, "login@example.test");

        let wrong = verify_credentials(&pool, "login@example.test", "battery staple").await.unwrap();
        assert!(wrong.is_none());

        let unknown = verify_credentials(&pool, "nobody@example.test", "correct horse").await.unwrap();
        assert!(unknown.is_none());
    }
}
