//! Config files on disk parse into the same shapes `load_config` builds.

use std::io::Write;

use sy_domain::config::{Config, ConfigSeverity};

fn write_config(contents: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(contents.as_bytes()).unwrap();
    file
}

#[test]
fn a_partial_file_parses_with_defaults_filled_in() {
    let file = write_config(
        r#"
[server]
port = 9000

[limits]
queue_capacity = 25
"#,
    );
    let raw = std::fs::read_to_string(file.path()).unwrap();
    let config: Config = toml::from_str(&raw).unwrap();

    assert_eq!(config.server.port, 9000);
    assert_eq!(config.server.host, "127.0.0.1");
    assert_eq!(config.limits.queue_capacity, 25);
    assert_eq!(config.chain.retry_budget, 2);
    assert!(config
        .validate()
        .iter()
        .all(|i| i.severity != ConfigSeverity::Error));
}

#[test]
fn an_invalid_file_surfaces_validation_errors() {
    let file = write_config(
        r#"
[limits]
queue_capacity = 0

[classifier]
remote_enabled = true
"#,
    );
    let raw = std::fs::read_to_string(file.path()).unwrap();
    let config: Config = toml::from_str(&raw).unwrap();

    let errors: Vec<_> = config
        .validate()
        .into_iter()
        .filter(|i| i.severity == ConfigSeverity::Error)
        .collect();
    // Zero queue capacity and a remote classifier without an endpoint.
    assert_eq!(errors.len(), 2);
}

#[test]
fn routing_rule_overrides_round_trip_through_toml() {
    let file = write_config(
        r#"
[[routing.rules]]
category = "CODING"
primary_model_id = "gemini-2.5-pro"
fallback_model_ids = ["cerebras-gpt-oss-120b"]
"#,
    );
    let raw = std::fs::read_to_string(file.path()).unwrap();
    let config: Config = toml::from_str(&raw).unwrap();

    assert_eq!(config.routing.rules.len(), 1);
    let rule = &config.routing.rules[0];
    assert_eq!(rule.primary_model_id, "gemini-2.5-pro");
    assert_eq!(rule.fallback_model_ids.len(), 1);
}
