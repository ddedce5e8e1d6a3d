use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use procurely_core::config::{AppConfig, LoadOptions, DEFAULT_CONFIG_PATHS};
use secrecy::{ExposeSecret, SecretString};
use toml::Value;

use crate::commands::{CommandResult, EXIT_CONFIG};

struct Field {
    key: &'static str,
    env_keys: &'static [&'static str],
    value: String,
}

impl Field {
    fn new(key: &'static str, env_keys: &'static [&'static str], value: impl Into<String>) -> Self {
        Self { key, env_keys, value: value.into() }
    }
}

pub fn run() -> CommandResult {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => {
            return CommandResult::failure(
                "config",
                "config_validation",
                format!("config validation failed: {error}"),
                EXIT_CONFIG,
            );
        }
    };

    let config_file_path = detect_config_path();
    let config_file_doc = load_config_file_doc(config_file_path.as_deref());

    let mut lines = vec!["effective config (source precedence: env > file > default):".to_string()];
    for field in effective_fields(&config) {
        let source = field_source(
            field.key,
            field.env_keys,
            config_file_doc.as_ref(),
            config_file_path.as_deref(),
        );
        lines.push(render_line(field.key, &field.value, source));
    }

    CommandResult::success("config", lines.join("\n"))
}

fn effective_fields(config: &AppConfig) -> Vec<Field> {
    let policy = &config.policy;
    let thresholds =
        policy.tier_thresholds.iter().map(ToString::to_string).collect::<Vec<_>>().join(",");

    vec![
        Field::new("database.url", &["PROCURELY_DATABASE_URL"], config.database.url.as_str()),
        Field::new(
            "database.max_connections",
            &["PROCURELY_DATABASE_MAX_CONNECTIONS"],
            config.database.max_connections.to_string(),
        ),
        Field::new(
            "database.timeout_secs",
            &["PROCURELY_DATABASE_TIMEOUT_SECS"],
            config.database.timeout_secs.to_string(),
        ),
        Field::new(
            "server.bind_address",
            &["PROCURELY_SERVER_BIND_ADDRESS"],
            config.server.bind_address.as_str(),
        ),
        Field::new("server.port", &["PROCURELY_SERVER_PORT"], config.server.port.to_string()),
        Field::new(
            "server.graceful_shutdown_secs",
            &["PROCURELY_SERVER_GRACEFUL_SHUTDOWN_SECS"],
            config.server.graceful_shutdown_secs.to_string(),
        ),
        Field::new(
            "logging.level",
            &["PROCURELY_LOGGING_LEVEL", "PROCURELY_LOG_LEVEL"],
            config.logging.level.as_str(),
        ),
        Field::new(
            "logging.format",
            &["PROCURELY_LOGGING_FORMAT", "PROCURELY_LOG_FORMAT"],
            format!("{:?}", config.logging.format).to_ascii_lowercase(),
        ),
        Field::new(
            "policy.cost_ceiling",
            &["PROCURELY_POLICY_COST_CEILING"],
            policy.cost_ceiling.to_string(),
        ),
        Field::new(
            "policy.min_quotes",
            &["PROCURELY_POLICY_MIN_QUOTES"],
            policy.min_quotes.to_string(),
        ),
        Field::new(
            "policy.max_variance_pct",
            &["PROCURELY_POLICY_MAX_VARIANCE_PCT"],
            policy.max_variance_pct.to_string(),
        ),
        Field::new(
            "policy.max_unmatched",
            &["PROCURELY_POLICY_MAX_UNMATCHED"],
            policy.max_unmatched.to_string(),
        ),
        Field::new("policy.tier_thresholds", &["PROCURELY_POLICY_TIER_THRESHOLDS"], thresholds),
        Field::new("policy.recommended_above", &[], policy.recommended_above.to_string()),
        Field::new("policy.acceptable_above", &[], policy.acceptable_above.to_string()),
        Field::new(
            "integrations.mode",
            &["PROCURELY_INTEGRATIONS_MODE"],
            config.integrations.mode.as_str(),
        ),
        Field::new(
            "integrations.approver_email",
            &["PROCURELY_APPROVER_EMAIL"],
            config.integrations.approver_email.as_deref().unwrap_or("<unset>"),
        ),
        Field::new(
            "slack.webhook_url",
            &["PROCURELY_SLACK_WEBHOOK_URL"],
            redact_url(config.slack.webhook_url.as_ref()),
        ),
        Field::new(
            "orchestrate.base_url",
            &["PROCURELY_ORCHESTRATE_BASE_URL"],
            config.orchestrate.base_url.as_deref().unwrap_or("<unset>"),
        ),
        Field::new(
            "orchestrate.api_key",
            &["PROCURELY_ORCHESTRATE_API_KEY"],
            redact_secret(config.orchestrate.api_key.as_ref()),
        ),
        Field::new(
            "orchestrate.agent_id",
            &["PROCURELY_ORCHESTRATE_AGENT_ID"],
            config.orchestrate.agent_id.as_deref().unwrap_or("<unset>"),
        ),
        Field::new(
            "erp.base_url",
            &["PROCURELY_ERP_BASE_URL"],
            config.erp.base_url.as_deref().unwrap_or("<unset>"),
        ),
        Field::new("erp.api_key", &["PROCURELY_ERP_API_KEY"], redact_secret(config.erp.api_key.as_ref())),
    ]
}

fn detect_config_path() -> Option<PathBuf> {
    DEFAULT_CONFIG_PATHS.iter().map(PathBuf::from).find(|path| path.exists())
}

fn load_config_file_doc(path: Option<&Path>) -> Option<Value> {
    let path = path?;
    let raw = fs::read_to_string(path).ok()?;
    raw.parse::<Value>().ok()
}

fn field_source(
    key_path: &str,
    env_keys: &[&str],
    config_file_doc: Option<&Value>,
    config_file_path: Option<&Path>,
) -> String {
    if let Some(env_key) = env_keys.iter().find(|key| env::var_os(key).is_some()) {
        return format!("env ({env_key})");
    }

    if let Some(doc) = config_file_doc {
        if contains_path(doc, key_path) {
            let file_path = config_file_path
                .map(|path| path.display().to_string())
                .unwrap_or_else(|| "config file".to_string());
            return format!("file ({file_path})");
        }
    }

    "default".to_string()
}

fn contains_path(root: &Value, key_path: &str) -> bool {
    let mut current = root;
    for key in key_path.split('.') {
        let Some(next) = current.get(key) else {
            return false;
        };
        current = next;
    }
    true
}

fn render_line(key: &str, value: &str, source: String) -> String {
    format!("- {key} = {value} (source: {source})")
}

fn redact_secret(secret: Option<&SecretString>) -> &'static str {
    match secret {
        Some(value) if value.expose_secret().trim().is_empty() => "<empty>",
        Some(_) => "<redacted>",
        None => "<unset>",
    }
}

/// Keeps the scheme and host of a webhook URL; the path carries the credential.
fn redact_url(secret: Option<&SecretString>) -> String {
    let Some(secret) = secret else {
        return "<unset>".to_string();
    };
    let url = secret.expose_secret().trim();
    if url.is_empty() {
        return "<empty>".to_string();
    }

    match url.split_once("://") {
        Some((scheme, rest)) => {
            let host = rest.split('/').next().unwrap_or_default();
            format!("{scheme}://{host}/<redacted>")
        }
        None => "<redacted>".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use secrecy::SecretString;
    use toml::Value;

    use super::{contains_path, redact_secret, redact_url};

    #[test]
    fn webhook_url_keeps_only_scheme_and_host() {
        let url = SecretString::from("https://hooks.slack.com/services/T000/B000/XXXX".to_string());
        assert_eq!(redact_url(Some(&url)), "https://hooks.slack.com/<redacted>");
        assert_eq!(redact_url(None), "<unset>");
    }

    #[test]
    fn api_keys_are_never_rendered() {
        let key = SecretString::from("erp-live-123".to_string());
        assert_eq!(redact_secret(Some(&key)), "<redacted>");
        assert_eq!(redact_secret(None), "<unset>");
    }

    #[test]
    fn nested_keys_are_found_in_config_documents() {
        let doc: Value = "[policy]\nmin_quotes = 2\n".parse().expect("toml");
        assert!(contains_path(&doc, "policy.min_quotes"));
        assert!(!contains_path(&doc, "policy.cost_ceiling"));
        assert!(!contains_path(&doc, "erp.base_url"));
    }
}
