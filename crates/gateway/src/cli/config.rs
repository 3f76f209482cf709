use sy_domain::config::{Config, ConfigSeverity};

/// Parse and validate the config, printing issues grouped by severity.
///
/// Returns `true` when no errors were found (warnings are tolerated).
pub fn validate(config: &Config, config_path: &str) -> bool {
    let issues = config.validate();
    if issues.is_empty() {
        println!("Config OK ({config_path})");
        return true;
    }

    let (errors, warnings): (Vec<_>, Vec<_>) = issues
        .into_iter()
        .partition(|i| i.severity == ConfigSeverity::Error);

    for issue in errors.iter().chain(warnings.iter()) {
        println!("{issue}");
    }
    println!(
        "\n{} error(s), {} warning(s) in {config_path}",
        errors.len(),
        warnings.len(),
    );

    errors.is_empty()
}

/// Dump the resolved config (with all defaults filled in) as TOML.
pub fn show(config: &Config) {
    match toml::to_string_pretty(config) {
        Ok(output) => print!("{output}"),
        Err(e) => {
            eprintln!("failed to serialize config: {e}");
            std::process::exit(1);
        }
    }
}
