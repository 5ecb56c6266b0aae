use std::sync::Arc;

use thiserror::Error;
use tracing::info;

use reqflow_core::audit::{AuditSink, InMemoryAuditSink};
use reqflow_core::config::{AppConfig, ConfigError, LoadOptions};
use reqflow_db::{
    connect, migrations, DbPool, SqlMaterialRepository, SqlPurchaseRepository, SqlStatusLedger,
};
use reqflow_notify::{DecisionNotifier, MailRelayNotifier, NoopNotifier, NotifyError};
use reqflow_workflow::DecisionProcessor;

pub struct Application {
    pub config: AppConfig,
    pub db_pool: DbPool,
    pub processor: Arc<DecisionProcessor>,
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("database connection failed: {0}")]
    DatabaseConnect(#[source] sqlx::Error),
    #[error("database migration failed: {0}")]
    Migration(#[source] sqlx::migrate::MigrateError),
    #[error("mail relay setup failed: {0}")]
    Mail(#[from] NotifyError),
}

pub async fn bootstrap(options: LoadOptions) -> Result<Application, BootstrapError> {
    let config = AppConfig::load(options)?;
    bootstrap_with_config(config).await
}

pub async fn bootstrap_with_config(config: AppConfig) -> Result<Application, BootstrapError> {
    info!(
        event_name = "system.bootstrap.start",
        correlation_id = "bootstrap",
        "starting application bootstrap"
    );

    let db_pool =
        connect(&config.database).await.map_err(BootstrapError::DatabaseConnect)?;
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

    let notifier: Arc<dyn DecisionNotifier> = if config.mail.enabled {
        Arc::new(MailRelayNotifier::from_config(&config.mail)?)
    } else {
        Arc::new(NoopNotifier)
    };
    info!(
        event_name = "system.bootstrap.notifier_selected",
        correlation_id = "bootstrap",
        mail_enabled = config.mail.enabled,
        "decision notifier selected"
    );

    let audit: Arc<dyn AuditSink> = Arc::new(InMemoryAuditSink::default());
    let processor = Arc::new(DecisionProcessor::new(
        Arc::new(SqlPurchaseRepository::new(db_pool.clone())),
        Arc::new(SqlMaterialRepository::new(db_pool.clone())),
        Arc::new(SqlStatusLedger::new(db_pool.clone())),
        notifier,
        audit,
    ));

    Ok(Application { config, db_pool, processor })
}
