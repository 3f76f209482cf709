//! Round-trips a minimal TOML config through serde and checks the defaults
//! an operator relies on when a section is omitted.

use sy_domain::config::{Config, ConfigSeverity};

#[test]
fn empty_toml_yields_full_defaults() {
    let cfg: Config = toml::from_str("").unwrap();

    assert_eq!(cfg.server.port, 8787);
    assert_eq!(cfg.server.token_env, "SY_API_TOKEN");
    assert_eq!(cfg.chain.attempt_timeout_ms, 4_000);
    assert_eq!(cfg.chain.max_timeout_ms, 10_000);
    assert_eq!(cfg.chain.retry_budget, 2);
    assert_eq!(cfg.health.interval_secs, 300);
    assert_eq!(cfg.health.unavailable_threshold, 3);
    assert_eq!(cfg.limits.queue_capacity, 100);
    assert!((cfg.routing.throttle_threshold - 0.8).abs() < f64::EPSILON);

    // Published free-tier limits for the five built-in providers.
    assert_eq!(cfg.limits.providers["cerebras"].requests_per_minute, 100);
    assert_eq!(cfg.limits.providers["groq"].requests_per_day, Some(14_400));
    assert_eq!(cfg.limits.providers["google"].requests_per_minute, 15);
    assert_eq!(cfg.limits.providers["huggingface"].requests_per_minute, 60);
    assert_eq!(cfg.limits.providers["elevenlabs"].requests_per_minute, 20);
}

#[test]
fn partial_section_keeps_sibling_defaults() {
    let cfg: Config = toml::from_str(
        r#"
        [server]
        port = 9000

        [chain]
        retry_budget = 0
        "#,
    )
    .unwrap();

    assert_eq!(cfg.server.port, 9000);
    assert_eq!(cfg.server.host, "127.0.0.1");
    assert_eq!(cfg.chain.retry_budget, 0);
    assert_eq!(cfg.chain.backoff_base_ms, 300);
}

#[test]
fn explicit_provider_table_replaces_builtin_defaults() {
    let cfg: Config = toml::from_str(
        r#"
        [limits.providers.google]
        requests_per_minute = 5
        requests_per_day = 100
        "#,
    )
    .unwrap();

    assert_eq!(cfg.limits.providers["google"].requests_per_minute, 5);
    assert_eq!(cfg.limits.providers.len(), 1);
}

#[test]
fn remote_classifier_without_endpoint_fails_validation() {
    let cfg: Config = toml::from_str(
        r#"
        [classifier]
        remote_enabled = true
        "#,
    )
    .unwrap();

    assert!(cfg
        .validate()
        .iter()
        .any(|e| e.field == "classifier.endpoint" && e.severity == ConfigSeverity::Error));
}
