use std::collections::HashMap;

use super::*;

fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
    let map: HashMap<String, String> = pairs
        .iter()
        .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
        .collect();
    move |key| map.get(key).cloned()
}

#[test]
fn from_lookup_requires_database_url() {
    let err = Config::from_lookup(lookup_from(&[])).unwrap_err();
    assert!(matches!(err, ConfigError::Missing("DATABASE_URL")));
}

#[test]
fn from_lookup_blank_database_url_is_missing() {
    let err = Config::from_lookup(lookup_from(&[("DATABASE_URL", "  ")])).unwrap_err();
    assert!(matches!(err, ConfigError::Missing("DATABASE_URL")));
}

#[test]
fn from_lookup_accepts_legacy_database_variable() {
    let cfg = Config::from_lookup(lookup_from(&[("DB_CONNECTION_STRING", "postgres://legacy/spirit")])).unwrap();
    assert_eq!(cfg.database_url, "postgres://legacy/spirit");
}

#[test]
fn from_lookup_applies_defaults() {
    let cfg = Config::from_lookup(lookup_from(&[("DATABASE_URL", "postgres://localhost/spirit")])).unwrap();
    assert_eq!(cfg.database_url, "postgres://localhost/spirit");
    assert_eq!(cfg.port, DEFAULT_PORT);
    assert_eq!(cfg.db_max_connections, DEFAULT_DB_MAX_CONNECTIONS);
    assert_eq!(cfg.session_ttl_days, DEFAULT_SESSION_TTL_DAYS);
    assert!(!cfg.cookie_secure);
    assert!(cfg.web_client_url.is_none());
}

#[test]
fn from_lookup_parses_overrides() {
    let cfg = Config::from_lookup(lookup_from(&[
        ("DATABASE_URL", "postgres://db/spirit"),
        ("PORT", "9000"),
        ("DB_MAX_CONNECTIONS", "12"),
        ("WEB_CLIENT_URL", "https://dash.example.test/"),
        ("COOKIE_SECURE", "yes"),
        ("SESSION_TTL_DAYS", "7"),
    ]))
    .unwrap();
    assert_eq!(cfg.port, 9000);
    assert_eq!(cfg.db_max_connections, 12);
    assert_eq!(cfg.web_client_url.as_deref(), Some("https://dash.example.test"));
    assert!(cfg.cookie_secure);
    assert_eq!(cfg.session_ttl_days, 7);
}

#[test]
fn from_lookup_accepts_legacy_port_variable() {
    let cfg = Config::from_lookup(lookup_from(&[("DATABASE_URL", "postgres://db"), ("NODEJS_LISTEN_PORT", "8181")]))
        .unwrap();
    assert_eq!(cfg.port, 8181);
}

#[test]
fn from_lookup_port_wins_over_legacy_variable() {
    let cfg = Config::from_lookup(lookup_from(&[
        ("DATABASE_URL", "postgres://db"),
        ("PORT", "3000"),
        ("NODEJS_LISTEN_PORT", "8181"),
    ]))
    .unwrap();
    assert_eq!(cfg.port, 3000);
}

#[test]
fn from_lookup_rejects_invalid_port() {
    let err = Config::from_lookup(lookup_from(&[("DATABASE_URL", "postgres://db"), ("PORT", "eighty")])).unwrap_err();
    assert!(matches!(err, ConfigError::Invalid { key: "PORT", .. }));
}

#[test]
fn from_lookup_rejects_non_positive_session_ttl() {
    let err =
        Config::from_lookup(lookup_from(&[("DATABASE_URL", "postgres://db"), ("SESSION_TTL_DAYS", "0")])).unwrap_err();
    assert!(matches!(err, ConfigError::Invalid { key: "SESSION_TTL_DAYS", .. }));
}

#[test]
fn from_lookup_rejects_invalid_cookie_flag() {
    let err =
        Config::from_lookup(lookup_from(&[("DATABASE_URL", "postgres://db"), ("COOKIE_SECURE", "maybe")])).unwrap_err();
    assert!(matches!(err, ConfigError::Invalid { key: "COOKIE_SECURE", .. }));
}

#[test]
fn from_lookup_ignores_empty_web_client_url() {
    let cfg =
        Config::from_lookup(lookup_from(&[("DATABASE_URL", "postgres://db"), ("WEB_CLIENT_URL", "   ")])).unwrap();
    assert!(cfg.web_client_url.is_none());
}

#[test]
fn parse_bool_variants() {
    for val in ["1", "true", "YES", " on "] {
        assert_eq!(parse_bool(val), Some(true), "expected true for {val:?}");
    }
    for val in ["0", "False", "no", "off"] {
        assert_eq!(parse_bool(val), Some(false), "expected false for {val:?}");
    }
    assert_eq!(parse_bool(""), None);
    assert_eq!(parse_bool("maybe"), None);
}
