use std::collections::HashSet;

use sy_domain::config::{Config, ConfigSeverity};
use sy_routing::default_rules;

/// Run all diagnostic checks and print a summary.
///
/// Returns `Ok(true)` when every check passes, `Ok(false)` when at least
/// one check failed.
pub async fn run(config: &Config, config_path: &str) -> anyhow::Result<bool> {
    println!("switchyard doctor");
    println!("=================\n");

    let mut all_passed = true;

    // 1. Config file
    check_config_file(config_path, &mut all_passed);

    // 2. Config validation
    check_config_validation(config, &mut all_passed);

    // 3. Routing rules against the model catalog
    check_routing_rules(config, &mut all_passed);

    // 4. Provider API keys
    check_api_keys(config, &mut all_passed);

    // 5. Backend reachability
    check_backends(config, &mut all_passed).await;

    // Summary
    println!();
    if all_passed {
        println!("All checks passed.");
    } else {
        println!("Some checks failed. Review the output above.");
    }

    Ok(all_passed)
}

// ── Individual checks ─────────────────────────────────────────────────

fn check_config_file(config_path: &str, all_passed: &mut bool) {
    let exists = std::path::Path::new(config_path).exists();
    print_check(
        "Config file exists",
        exists,
        if exists {
            config_path.to_owned()
        } else {
            format!("{config_path} not found (using defaults)")
        },
    );
    if !exists {
        *all_passed = false;
    }
}

fn check_config_validation(config: &Config, all_passed: &mut bool) {
    let issues = config.validate();
    let error_count = issues
        .iter()
        .filter(|e| e.severity == ConfigSeverity::Error)
        .count();

    if issues.is_empty() {
        print_check("Config validation", true, "no issues".into());
    } else {
        print_check(
            "Config validation",
            error_count == 0,
            format!("{} issue(s) ({} error(s))", issues.len(), error_count),
        );
        for issue in &issues {
            println!("      {issue}");
        }
        if error_count > 0 {
            *all_passed = false;
        }
    }
}

fn check_routing_rules(config: &Config, all_passed: &mut bool) {
    let valid_ids: HashSet<String> = sy_registry::catalog::default_catalog()
        .into_iter()
        .map(|m| m.id)
        .collect();
    let mut rules = default_rules();
    for rule in &config.routing.rules {
        if let Some(existing) = rules.iter_mut().find(|r| r.category == rule.category) {
            *existing = rule.clone();
        } else {
            rules.push(rule.clone());
        }
    }

    let validation = sy_routing::validate_rules(&rules, &valid_ids);
    let clean = validation.is_clean();
    print_check(
        "Routing rules",
        clean,
        if clean {
            format!("{} rule(s), all model ids known", rules.len())
        } else {
            format!(
                "{} unknown model id(s), {} missing categor(ies)",
                validation.unknown_model_ids.len(),
                validation.missing_categories.len(),
            )
        },
    );
    for (category, id) in &validation.unknown_model_ids {
        println!("      {category}: unknown model {id}");
    }
    for category in &validation.missing_categories {
        println!("      no rule for {category}");
    }
    if !clean {
        *all_passed = false;
    }
}

fn check_api_keys(config: &Config, all_passed: &mut bool) {
    let mut missing = Vec::new();
    for (provider, endpoint) in &config.backends.providers {
        let present = std::env::var(&endpoint.api_key_env)
            .map(|v| !v.is_empty())
            .unwrap_or(false);
        if !present {
            missing.push(format!("{provider} ({})", endpoint.api_key_env));
        }
    }
    missing.sort();

    let total = config.backends.providers.len();
    let ok = missing.len() < total;
    print_check(
        "Provider API keys",
        ok,
        format!("{}/{} key(s) present", total - missing.len(), total),
    );
    for m in &missing {
        println!("      missing: {m}");
    }
    if !ok {
        *all_passed = false;
    }
}

async fn check_backends(config: &Config, all_passed: &mut bool) {
    let client = match reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(5))
        .build()
    {
        Ok(c) => c,
        Err(e) => {
            print_check("Backend reachability", false, format!("client build failed: {e}"));
            *all_passed = false;
            return;
        }
    };

    let mut providers: Vec<_> = config.backends.providers.iter().collect();
    providers.sort_by(|a, b| a.0.cmp(b.0));

    let mut unreachable = Vec::new();
    for (provider, endpoint) in &providers {
        // Any HTTP response (even 401) proves the endpoint is up.
        if client.get(&endpoint.base_url).send().await.is_err() {
            unreachable.push(format!("{provider} ({})", endpoint.base_url));
        }
    }
    let ok = unreachable.is_empty();
    print_check(
        "Backend reachability",
        ok,
        format!(
            "{}/{} endpoint(s) reachable",
            providers.len() - unreachable.len(),
            providers.len()
        ),
    );
    for u in &unreachable {
        println!("      unreachable: {u}");
    }
    if !ok {
        *all_passed = false;
    }
}

fn print_check(name: &str, passed: bool, detail: String) {
    let mark = if passed { "ok" } else { "FAIL" };
    println!("[{mark:>4}] {name}: {detail}");
}
