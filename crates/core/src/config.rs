use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use rust_decimal::Decimal;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::compare::policy::PolicyThresholds;
use crate::compare::scoring::RecommendationCutoffs;

pub const DEFAULT_CONFIG_PATHS: [&str; 2] = ["procurely.toml", "config/procurely.toml"];

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub server: ServerConfig,
    pub logging: LoggingConfig,
    pub policy: PolicyConfig,
    pub integrations: IntegrationsConfig,
    pub slack: SlackConfig,
    pub orchestrate: OrchestrateConfig,
    pub erp: ErpConfig,
}

#[derive(Clone, Debug)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub timeout_secs: u64,
}

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub bind_address: String,
    pub port: u16,
    pub graceful_shutdown_secs: u64,
}

#[derive(Clone, Debug)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

/// Thresholds for the policy evaluator, the approval router, and the
/// recommendation cutoffs used when scoring vendors.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PolicyConfig {
    pub cost_ceiling: Decimal,
    pub min_quotes: usize,
    pub max_variance_pct: Decimal,
    pub max_unmatched: usize,
    pub tier_thresholds: Vec<Decimal>,
    pub recommended_above: Decimal,
    pub acceptable_above: Decimal,
}

#[derive(Clone, Debug)]
pub struct IntegrationsConfig {
    pub mode: CollaboratorMode,
    pub approver_email: Option<String>,
}

#[derive(Clone, Debug, Default)]
pub struct SlackConfig {
    pub webhook_url: Option<SecretString>,
}

#[derive(Clone, Debug)]
pub struct OrchestrateConfig {
    pub base_url: Option<String>,
    pub api_key: Option<SecretString>,
    pub agent_id: Option<String>,
    pub timeout_secs: u64,
}

#[derive(Clone, Debug)]
pub struct ErpConfig {
    pub base_url: Option<String>,
    pub api_key: Option<SecretString>,
    pub timeout_secs: u64,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Compact,
    Pretty,
    Json,
}

/// How the application reacts when a configured outbound collaborator fails.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CollaboratorMode {
    /// Failures surface to the caller as integration errors.
    Strict,
    /// Failures are logged, audited, and reported as degraded receipts.
    Degraded,
}

impl CollaboratorMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Strict => "strict",
            Self::Degraded => "degraded",
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    pub database_url: Option<String>,
    pub log_level: Option<String>,
    pub integrations_mode: Option<CollaboratorMode>,
    pub slack_webhook_url: Option<String>,
    pub cost_ceiling: Option<Decimal>,
    pub min_quotes: Option<usize>,
}

#[derive(Clone, Debug, Default)]
pub struct LoadOptions {
    pub config_path: Option<PathBuf>,
    pub require_file: bool,
    pub overrides: ConfigOverrides,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file `{path}`: {source}")]
    ReadFile { path: PathBuf, source: std::io::Error },
    #[error("could not parse config file `{path}`: {source}")]
    ParseFile { path: PathBuf, source: toml::de::Error },
    #[error("required config file was not found: `{0}`")]
    MissingConfigFile(PathBuf),
    #[error("environment variable interpolation failed for `{var}`")]
    MissingEnvInterpolation { var: String },
    #[error("unterminated environment interpolation expression")]
    UnterminatedInterpolation,
    #[error("invalid environment override for `{key}`: `{value}`")]
    InvalidEnvOverride { key: String, value: String },
    #[error("configuration validation failed: {0}")]
    Validation(String),
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database: DatabaseConfig {
                url: "sqlite://procurely.db".to_string(),
                max_connections: 5,
                timeout_secs: 30,
            },
            server: ServerConfig {
                bind_address: "127.0.0.1".to_string(),
                port: 3000,
                graceful_shutdown_secs: 15,
            },
            logging: LoggingConfig { level: "info".to_string(), format: LogFormat::Compact },
            policy: PolicyConfig::default(),
            integrations: IntegrationsConfig {
                mode: CollaboratorMode::Degraded,
                approver_email: None,
            },
            slack: SlackConfig::default(),
            orchestrate: OrchestrateConfig {
                base_url: None,
                api_key: None,
                agent_id: None,
                timeout_secs: 30,
            },
            erp: ErpConfig { base_url: None, api_key: None, timeout_secs: 30 },
        }
    }
}

impl Default for PolicyConfig {
    fn default() -> Self {
        let cutoffs = RecommendationCutoffs::default();
        Self {
            cost_ceiling: Decimal::from(100_000),
            min_quotes: 3,
            max_variance_pct: Decimal::from(10),
            max_unmatched: 0,
            tier_thresholds: vec![
                Decimal::from(10_000),
                Decimal::from(50_000),
                Decimal::from(250_000),
            ],
            recommended_above: cutoffs.recommended_above,
            acceptable_above: cutoffs.acceptable_above,
        }
    }
}

impl PolicyConfig {
    pub fn thresholds(&self) -> PolicyThresholds {
        PolicyThresholds {
            cost_ceiling: Some(self.cost_ceiling),
            min_quotes: Some(self.min_quotes),
            max_variance_pct: Some(self.max_variance_pct),
            max_unmatched: Some(self.max_unmatched),
        }
    }

    pub fn cutoffs(&self) -> RecommendationCutoffs {
        RecommendationCutoffs {
            recommended_above: self.recommended_above,
            acceptable_above: self.acceptable_above,
        }
    }
}

impl OrchestrateConfig {
    /// Workflow triggering needs both an endpoint and a key.
    pub fn is_configured(&self) -> bool {
        self.base_url.is_some() && self.api_key.is_some()
    }
}

impl ErpConfig {
    pub fn is_configured(&self) -> bool {
        self.base_url.is_some()
    }
}

fn secret_value(value: String) -> SecretString {
    value.into()
}

impl FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "compact" => Ok(Self::Compact),
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(ConfigError::Validation(format!(
                "unsupported log format `{other}` (expected compact|pretty|json)"
            ))),
        }
    }
}

impl FromStr for CollaboratorMode {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "strict" => Ok(Self::Strict),
            "degraded" => Ok(Self::Degraded),
            other => Err(ConfigError::Validation(format!(
                "unsupported integrations mode `{other}` (expected strict|degraded)"
            ))),
        }
    }
}

impl AppConfig {
    pub fn load(options: LoadOptions) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        let maybe_path = resolve_config_path(options.config_path.as_deref());

        if let Some(path) = maybe_path {
            let patch = read_patch(&path)?;
            config.apply_patch(patch);
        } else if options.require_file {
            let expected = options
                .config_path
                .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATHS[0]));
            return Err(ConfigError::MissingConfigFile(expected));
        }

        config.apply_env_overrides()?;
        config.apply_overrides(options.overrides);
        config.validate()?;

        Ok(config)
    }

    fn apply_patch(&mut self, patch: ConfigPatch) {
        if let Some(database) = patch.database {
            if let Some(url) = database.url {
                self.database.url = url;
            }
            if let Some(max_connections) = database.max_connections {
                self.database.max_connections = max_connections;
            }
            if let Some(timeout_secs) = database.timeout_secs {
                self.database.timeout_secs = timeout_secs;
            }
        }

        if let Some(server) = patch.server {
            if let Some(bind_address) = server.bind_address {
                self.server.bind_address = bind_address;
            }
            if let Some(port) = server.port {
                self.server.port = port;
            }
            if let Some(graceful_shutdown_secs) = server.graceful_shutdown_secs {
                self.server.graceful_shutdown_secs = graceful_shutdown_secs;
            }
        }

        if let Some(logging) = patch.logging {
            if let Some(level) = logging.level {
                self.logging.level = level;
            }
            if let Some(format) = logging.format {
                self.logging.format = format;
            }
        }

        if let Some(policy) = patch.policy {
            if let Some(cost_ceiling) = policy.cost_ceiling {
                self.policy.cost_ceiling = cost_ceiling;
            }
            if let Some(min_quotes) = policy.min_quotes {
                self.policy.min_quotes = min_quotes;
            }
            if let Some(max_variance_pct) = policy.max_variance_pct {
                self.policy.max_variance_pct = max_variance_pct;
            }
            if let Some(max_unmatched) = policy.max_unmatched {
                self.policy.max_unmatched = max_unmatched;
            }
            if let Some(tier_thresholds) = policy.tier_thresholds {
                self.policy.tier_thresholds = tier_thresholds;
            }
            if let Some(recommended_above) = policy.recommended_above {
                self.policy.recommended_above = recommended_above;
            }
            if let Some(acceptable_above) = policy.acceptable_above {
                self.policy.acceptable_above = acceptable_above;
            }
        }

        if let Some(integrations) = patch.integrations {
            if let Some(mode) = integrations.mode {
                self.integrations.mode = mode;
            }
            if let Some(approver_email) = integrations.approver_email {
                self.integrations.approver_email = Some(approver_email);
            }
        }

        if let Some(slack) = patch.slack {
            if let Some(webhook_url) = slack.webhook_url {
                self.slack.webhook_url = Some(secret_value(webhook_url));
            }
        }

        if let Some(orchestrate) = patch.orchestrate {
            if let Some(base_url) = orchestrate.base_url {
                self.orchestrate.base_url = Some(base_url);
            }
            if let Some(api_key) = orchestrate.api_key {
                self.orchestrate.api_key = Some(secret_value(api_key));
            }
            if let Some(agent_id) = orchestrate.agent_id {
                self.orchestrate.agent_id = Some(agent_id);
            }
            if let Some(timeout_secs) = orchestrate.timeout_secs {
                self.orchestrate.timeout_secs = timeout_secs;
            }
        }

        if let Some(erp) = patch.erp {
            if let Some(base_url) = erp.base_url {
                self.erp.base_url = Some(base_url);
            }
            if let Some(api_key) = erp.api_key {
                self.erp.api_key = Some(secret_value(api_key));
            }
            if let Some(timeout_secs) = erp.timeout_secs {
                self.erp.timeout_secs = timeout_secs;
            }
        }
    }

    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Some(value) = read_env("PROCURELY_DATABASE_URL") {
            self.database.url = value;
        }
        if let Some(value) = read_env("PROCURELY_DATABASE_MAX_CONNECTIONS") {
            self.database.max_connections = parse_env("PROCURELY_DATABASE_MAX_CONNECTIONS", &value)?;
        }
        if let Some(value) = read_env("PROCURELY_DATABASE_TIMEOUT_SECS") {
            self.database.timeout_secs = parse_env("PROCURELY_DATABASE_TIMEOUT_SECS", &value)?;
        }

        if let Some(value) = read_env("PROCURELY_SERVER_BIND_ADDRESS") {
            self.server.bind_address = value;
        }
        if let Some(value) = read_env("PROCURELY_SERVER_PORT") {
            self.server.port = parse_env("PROCURELY_SERVER_PORT", &value)?;
        }
        if let Some(value) = read_env("PROCURELY_SERVER_GRACEFUL_SHUTDOWN_SECS") {
            self.server.graceful_shutdown_secs =
                parse_env("PROCURELY_SERVER_GRACEFUL_SHUTDOWN_SECS", &value)?;
        }

        let log_level =
            read_env("PROCURELY_LOGGING_LEVEL").or_else(|| read_env("PROCURELY_LOG_LEVEL"));
        if let Some(value) = log_level {
            self.logging.level = value;
        }
        let log_format =
            read_env("PROCURELY_LOGGING_FORMAT").or_else(|| read_env("PROCURELY_LOG_FORMAT"));
        if let Some(value) = log_format {
            self.logging.format = value.parse()?;
        }

        if let Some(value) = read_env("PROCURELY_POLICY_COST_CEILING") {
            self.policy.cost_ceiling = parse_env("PROCURELY_POLICY_COST_CEILING", &value)?;
        }
        if let Some(value) = read_env("PROCURELY_POLICY_MIN_QUOTES") {
            self.policy.min_quotes = parse_env("PROCURELY_POLICY_MIN_QUOTES", &value)?;
        }
        if let Some(value) = read_env("PROCURELY_POLICY_MAX_VARIANCE_PCT") {
            self.policy.max_variance_pct = parse_env("PROCURELY_POLICY_MAX_VARIANCE_PCT", &value)?;
        }
        if let Some(value) = read_env("PROCURELY_POLICY_MAX_UNMATCHED") {
            self.policy.max_unmatched = parse_env("PROCURELY_POLICY_MAX_UNMATCHED", &value)?;
        }
        if let Some(value) = read_env("PROCURELY_POLICY_TIER_THRESHOLDS") {
            self.policy.tier_thresholds = value
                .split(',')
                .map(|part| parse_env("PROCURELY_POLICY_TIER_THRESHOLDS", part.trim()))
                .collect::<Result<_, _>>()?;
        }

        if let Some(value) = read_env("PROCURELY_INTEGRATIONS_MODE") {
            self.integrations.mode = value.parse()?;
        }
        if let Some(value) = read_env("PROCURELY_APPROVER_EMAIL") {
            self.integrations.approver_email = Some(value);
        }

        if let Some(value) = read_env("PROCURELY_SLACK_WEBHOOK_URL") {
            self.slack.webhook_url = Some(secret_value(value));
        }

        if let Some(value) = read_env("PROCURELY_ORCHESTRATE_BASE_URL") {
            self.orchestrate.base_url = Some(value);
        }
        if let Some(value) = read_env("PROCURELY_ORCHESTRATE_API_KEY") {
            self.orchestrate.api_key = Some(secret_value(value));
        }
        if let Some(value) = read_env("PROCURELY_ORCHESTRATE_AGENT_ID") {
            self.orchestrate.agent_id = Some(value);
        }

        if let Some(value) = read_env("PROCURELY_ERP_BASE_URL") {
            self.erp.base_url = Some(value);
        }
        if let Some(value) = read_env("PROCURELY_ERP_API_KEY") {
            self.erp.api_key = Some(secret_value(value));
        }

        Ok(())
    }

    fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(database_url) = overrides.database_url {
            self.database.url = database_url;
        }
        if let Some(log_level) = overrides.log_level {
            self.logging.level = log_level;
        }
        if let Some(mode) = overrides.integrations_mode {
            self.integrations.mode = mode;
        }
        if let Some(webhook_url) = overrides.slack_webhook_url {
            self.slack.webhook_url = Some(secret_value(webhook_url));
        }
        if let Some(cost_ceiling) = overrides.cost_ceiling {
            self.policy.cost_ceiling = cost_ceiling;
        }
        if let Some(min_quotes) = overrides.min_quotes {
            self.policy.min_quotes = min_quotes;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_database(&self.database)?;
        validate_server(&self.server)?;
        validate_logging(&self.logging)?;
        validate_policy(&self.policy)?;
        validate_slack(&self.slack)?;
        validate_endpoint("orchestrate.base_url", self.orchestrate.base_url.as_deref())?;
        validate_timeout("orchestrate.timeout_secs", self.orchestrate.timeout_secs)?;
        validate_endpoint("erp.base_url", self.erp.base_url.as_deref())?;
        validate_timeout("erp.timeout_secs", self.erp.timeout_secs)?;
        Ok(())
    }
}

fn resolve_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return path.exists().then_some(path.to_path_buf());
    }

    DEFAULT_CONFIG_PATHS.into_iter().map(PathBuf::from).find(|path| path.exists())
}

fn read_patch(path: &Path) -> Result<ConfigPatch, ConfigError> {
    let raw = fs::read_to_string(path)
        .map_err(|source| ConfigError::ReadFile { path: path.to_path_buf(), source })?;

    let interpolated = interpolate_env_vars(&raw)?;
    toml::from_str::<ConfigPatch>(&interpolated)
        .map_err(|source| ConfigError::ParseFile { path: path.to_path_buf(), source })
}

fn interpolate_env_vars(input: &str) -> Result<String, ConfigError> {
    let mut output = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '$' && matches!(chars.peek(), Some('{')) {
            chars.next();
            let mut key = String::new();

            loop {
                match chars.next() {
                    Some('}') => break,
                    Some(next) => key.push(next),
                    None => return Err(ConfigError::UnterminatedInterpolation),
                }
            }

            let value = env::var(&key)
                .map_err(|_| ConfigError::MissingEnvInterpolation { var: key.clone() })?;
            output.push_str(&value);
            continue;
        }

        output.push(ch);
    }

    Ok(output)
}

fn validate_database(database: &DatabaseConfig) -> Result<(), ConfigError> {
    let url = database.url.trim();
    let sqlite_url =
        url.starts_with("sqlite://") || url.starts_with("sqlite::") || url == ":memory:";
    if !sqlite_url {
        return Err(ConfigError::Validation(
            "database.url must be a sqlite URL (`sqlite://...`, `sqlite::...`, or `:memory:`)"
                .to_string(),
        ));
    }

    if database.max_connections == 0 {
        return Err(ConfigError::Validation(
            "database.max_connections must be greater than zero".to_string(),
        ));
    }

    validate_timeout("database.timeout_secs", database.timeout_secs)
}

fn validate_server(server: &ServerConfig) -> Result<(), ConfigError> {
    if server.port == 0 {
        return Err(ConfigError::Validation("server.port must be greater than zero".to_string()));
    }

    if server.graceful_shutdown_secs == 0 {
        return Err(ConfigError::Validation(
            "server.graceful_shutdown_secs must be greater than zero".to_string(),
        ));
    }

    Ok(())
}

fn validate_logging(logging: &LoggingConfig) -> Result<(), ConfigError> {
    let level = logging.level.trim().to_ascii_lowercase();
    match level.as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
        _ => Err(ConfigError::Validation(
            "logging.level must be one of trace|debug|info|warn|error".to_string(),
        )),
    }
}

fn validate_policy(policy: &PolicyConfig) -> Result<(), ConfigError> {
    if policy.cost_ceiling <= Decimal::ZERO {
        return Err(ConfigError::Validation(
            "policy.cost_ceiling must be greater than zero".to_string(),
        ));
    }
    if policy.min_quotes == 0 {
        return Err(ConfigError::Validation("policy.min_quotes must be at least 1".to_string()));
    }
    if policy.max_variance_pct < Decimal::ZERO {
        return Err(ConfigError::Validation(
            "policy.max_variance_pct cannot be negative".to_string(),
        ));
    }

    let tiers = &policy.tier_thresholds;
    if tiers.len() != 3 {
        return Err(ConfigError::Validation(format!(
            "policy.tier_thresholds must list exactly 3 cost boundaries (manager, director, executive), got {}",
            tiers.len()
        )));
    }
    if tiers.iter().any(|tier| *tier <= Decimal::ZERO)
        || tiers.windows(2).any(|pair| pair[0] >= pair[1])
    {
        return Err(ConfigError::Validation(
            "policy.tier_thresholds must be positive and strictly ascending".to_string(),
        ));
    }

    if policy.acceptable_above >= policy.recommended_above {
        return Err(ConfigError::Validation(
            "policy.acceptable_above must be lower than policy.recommended_above".to_string(),
        ));
    }

    Ok(())
}

fn validate_slack(slack: &SlackConfig) -> Result<(), ConfigError> {
    let Some(webhook_url) = &slack.webhook_url else {
        return Ok(());
    };

    let webhook_url = webhook_url.expose_secret();
    if !webhook_url.starts_with("https://") && !webhook_url.starts_with("http://") {
        return Err(ConfigError::Validation(
            "slack.webhook_url must be an http(s) URL. Create one at https://api.slack.com/apps > Your App > Incoming Webhooks".to_string(),
        ));
    }

    Ok(())
}

fn validate_endpoint(key: &str, base_url: Option<&str>) -> Result<(), ConfigError> {
    match base_url {
        Some(url) if !url.starts_with("http://") && !url.starts_with("https://") => {
            Err(ConfigError::Validation(format!("{key} must start with http:// or https://")))
        }
        _ => Ok(()),
    }
}

fn validate_timeout(key: &str, timeout_secs: u64) -> Result<(), ConfigError> {
    if timeout_secs == 0 || timeout_secs > 300 {
        return Err(ConfigError::Validation(format!("{key} must be in range 1..=300")));
    }
    Ok(())
}

fn read_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn parse_env<T: FromStr>(key: &str, value: &str) -> Result<T, ConfigError> {
    value.parse::<T>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

#[derive(Debug, Default, Deserialize)]
struct ConfigPatch {
    database: Option<DatabasePatch>,
    server: Option<ServerPatch>,
    logging: Option<LoggingPatch>,
    policy: Option<PolicyPatch>,
    integrations: Option<IntegrationsPatch>,
    slack: Option<SlackPatch>,
    orchestrate: Option<OrchestratePatch>,
    erp: Option<ErpPatch>,
}

#[derive(Debug, Default, Deserialize)]
struct DatabasePatch {
    url: Option<String>,
    max_connections: Option<u32>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct ServerPatch {
    bind_address: Option<String>,
    port: Option<u16>,
    graceful_shutdown_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct LoggingPatch {
    level: Option<String>,
    format: Option<LogFormat>,
}

#[derive(Debug, Default, Deserialize)]
struct PolicyPatch {
    cost_ceiling: Option<Decimal>,
    min_quotes: Option<usize>,
    max_variance_pct: Option<Decimal>,
    max_unmatched: Option<usize>,
    tier_thresholds: Option<Vec<Decimal>>,
    recommended_above: Option<Decimal>,
    acceptable_above: Option<Decimal>,
}

#[derive(Debug, Default, Deserialize)]
struct IntegrationsPatch {
    mode: Option<CollaboratorMode>,
    approver_email: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct SlackPatch {
    webhook_url: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct OrchestratePatch {
    base_url: Option<String>,
    api_key: Option<String>,
    agent_id: Option<String>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct ErpPatch {
    base_url: Option<String>,
    api_key: Option<String>,
    timeout_secs: Option<u64>,
}
