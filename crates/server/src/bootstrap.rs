use std::sync::Arc;
use std::time::Duration;

use procurely_core::audit::AuditSink;
use procurely_core::config::{AppConfig, ConfigError, LoadOptions};
use procurely_core::errors::ComparisonError;
use procurely_core::DefaultComparisonEngine;
use procurely_db::{
    connect_with_config, migrations, DbPool, SqlApprovalRepository, SqlComparisonRepository,
};
use thiserror::Error;
use tracing::info;

use crate::audit::TracingAuditSink;
use crate::integrations::{EmailNotifier, ErpClient, OrchestrateClient, SlackWebhookNotifier};
use crate::service::ProcurementService;

const SLACK_TIMEOUT_SECS: u64 = 10;

pub struct Application {
    pub config: AppConfig,
    pub db_pool: DbPool,
    pub service: Arc<ProcurementService>,
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("policy configuration rejected: {0}")]
    Policy(#[from] ComparisonError),
    #[error("database connection failed: {0}")]
    DatabaseConnect(#[source] sqlx::Error),
    #[error("database migration failed: {0}")]
    Migration(#[source] sqlx::migrate::MigrateError),
    #[error("http client construction failed: {0}")]
    HttpClient(#[source] reqwest::Error),
}

pub async fn bootstrap(options: LoadOptions) -> Result<Application, BootstrapError> {
    let config = AppConfig::load(options)?;
    bootstrap_with_config(config).await
}

pub async fn bootstrap_with_config(config: AppConfig) -> Result<Application, BootstrapError> {
    info!(
        event_name = "system.bootstrap.start",
        correlation_id = "bootstrap",
        integrations_mode = config.integrations.mode.as_str(),
        "starting application bootstrap"
    );

    let engine = DefaultComparisonEngine::from_policy_config(&config.policy)?;

    let db_pool = connect_with_config(&config.database).await.map_err(BootstrapError::DatabaseConnect)?;
    info!(
        event_name = "system.bootstrap.database_connected",
        correlation_id = "bootstrap",
        "database connection established"
    );

    migrations::run_pending(&db_pool).await.map_err(BootstrapError::Migration)?;
    info!(
        event_name = "system.bootstrap.migrations_applied",
        correlation_id = "bootstrap",
        "database migrations applied"
    );

    let audit: Arc<dyn AuditSink> = Arc::new(TracingAuditSink);
    let service = ProcurementService::new(
        Arc::new(engine),
        Arc::new(SqlComparisonRepository::new(db_pool.clone())),
        Arc::new(SqlApprovalRepository::new(db_pool.clone())),
        config.integrations.mode,
        audit,
    )
    .with_notifier(Arc::new(SlackWebhookNotifier::new(
        http_client(SLACK_TIMEOUT_SECS)?,
        config.slack.webhook_url.clone(),
    )))
    .with_notifier(Arc::new(EmailNotifier::new(config.integrations.approver_email.clone())))
    .with_workflow(Arc::new(OrchestrateClient::new(
        http_client(config.orchestrate.timeout_secs)?,
        &config.orchestrate,
    )))
    .with_purchase_orders(Arc::new(ErpClient::new(http_client(config.erp.timeout_secs)?, &config.erp)));

    info!(
        event_name = "system.bootstrap.collaborators_configured",
        correlation_id = "bootstrap",
        slack = config.slack.webhook_url.is_some(),
        email = config.integrations.approver_email.is_some(),
        orchestrate = config.orchestrate.is_configured(),
        erp = config.erp.is_configured(),
        "outbound collaborators configured"
    );

    Ok(Application { config, db_pool, service: Arc::new(service) })
}

fn http_client(timeout_secs: u64) -> Result<reqwest::Client, BootstrapError> {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .build()
        .map_err(BootstrapError::HttpClient)
}

#[cfg(test)]
mod tests {
    use procurely_core::config::{ConfigOverrides, LoadOptions};
    use rust_decimal::Decimal;
    use serde_json::json;

    use crate::bootstrap::{bootstrap, BootstrapError};

    fn options(database_url: &str) -> LoadOptions {
        LoadOptions {
            overrides: ConfigOverrides {
                database_url: Some(database_url.to_string()),
                ..ConfigOverrides::default()
            },
            ..LoadOptions::default()
        }
    }

    #[tokio::test]
    async fn bootstrap_rejects_invalid_policy_before_touching_the_database() {
        let mut options = options("sqlite::memory:");
        options.overrides.cost_ceiling = Some(Decimal::ZERO);

        let result = bootstrap(options).await;

        assert!(matches!(result, Err(BootstrapError::Config(_))));
    }

    #[tokio::test]
    async fn bootstrap_migrates_and_serves_comparisons_from_sqlite() {
        let app = bootstrap(options("sqlite::memory:")).await.expect("bootstrap");

        let (table_count,): (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM sqlite_master \
             WHERE type = 'table' AND name IN ('comparison', 'approval_record')",
        )
        .fetch_one(&app.db_pool)
        .await
        .expect("tables after bootstrap");
        assert_eq!(table_count, 2);

        let boq = serde_json::from_value(json!({
            "id": "boq-boot",
            "items": [{ "lineNo": 1, "sku": "CBL-001", "qty": 10, "estimatedPrice": 10, "totalEstimate": 100 }],
            "totalBOQ": 100
        }))
        .expect("boq");
        let outcome = app.service.compare(boq, Vec::new(), "req-boot").await.expect("compare");
        let stored = app.service.comparison(&outcome.comparison.id).await.expect("stored");
        assert_eq!(stored, outcome.comparison);

        app.db_pool.close().await;
    }
}
