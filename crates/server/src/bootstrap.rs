use std::sync::Arc;
use std::time::Duration;

use echolab_agent::{load_examples, CandidateExtractor, OpenAiCompatibleClient};
use echolab_core::config::{AppConfig, ConfigError, LoadOptions};
use echolab_core::domain::lookup::{Channel, User};
use echolab_core::errors::ApplicationError;
use echolab_db::{
    connect_with_config, migrations, seed_lookups, DbPool, MessageStore, PgCatalogWarehouse,
    RepositoryError, SqlMessageStore, WarehouseCredentials,
};
use echolab_slack::commands::CommandRouter;
use echolab_slack::events::EventDispatcher;
use echolab_slack::socket::{ReconnectPolicy, SocketModeRunner, WebSocketTransport};
use echolab_slack::web::{SlackApiError, SlackWebClient};
use thiserror::Error;
use tracing::{info, warn};

use crate::dropbox::DropboxClient;
use crate::publisher::Publisher;
use crate::reload::ReloadPipeline;
use crate::retriever::MessageRetriever;
use crate::service::{Component, EchoLabCommandService};
use crate::sheets::GoogleSheetsClient;
use crate::status::StatusReporter;

pub const HTTP_TIMEOUT: Duration = Duration::from_secs(60);

pub struct Application {
    pub config: AppConfig,
    pub db_pool: DbPool,
    pub service: Arc<EchoLabCommandService>,
    pub slack_runner: SocketModeRunner,
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("database connection failed: {0}")]
    DatabaseConnect(#[source] sqlx::Error),
    #[error("database migration failed: {0}")]
    Migration(#[source] sqlx::migrate::MigrateError),
    #[error("seeding channel and user lookups failed: {0}")]
    Seed(#[source] RepositoryError),
    #[error("slack client setup failed: {0}")]
    Slack(#[from] SlackApiError),
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

    let db_pool = open_store(&config).await?;
    let slack = Arc::new(SlackWebClient::new(config.slack.bot_token.clone(), HTTP_TIMEOUT)?);
    let service = Arc::new(build_command_service(&config, db_pool.clone(), slack.clone()));

    let transport = WebSocketTransport::new(slack.http().clone(), config.slack.app_token.clone())
        .with_api_base_url(slack.base_url());
    let router = CommandRouter::new(service.clone()).with_share_url(config.sheets.share_url.clone());
    let dispatcher = EventDispatcher::new(router, slack);
    let slack_runner = SocketModeRunner::new(
        Arc::new(transport),
        Arc::new(dispatcher),
        ReconnectPolicy::default(),
    );

    Ok(Application { config, db_pool, service, slack_runner })
}

/// Connects, migrates and seeds the message store.
pub async fn open_store(config: &AppConfig) -> Result<DbPool, BootstrapError> {
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

    let (channels, users) = lookup_rows(config);
    let seeded = seed_lookups(&db_pool, &channels, &users).await.map_err(BootstrapError::Seed)?;
    info!(
        event_name = "system.bootstrap.lookups_seeded",
        correlation_id = "bootstrap",
        channels_inserted = seeded.channels_inserted,
        users_inserted = seeded.users_inserted,
        "channel and user lookups seeded"
    );

    Ok(db_pool)
}

pub fn lookup_rows(config: &AppConfig) -> (Vec<Channel>, Vec<User>) {
    let channels = config
        .retrieval
        .channels
        .iter()
        .map(|seed| Channel { channel_id: seed.id.clone(), channel_name: seed.name.clone() })
        .collect();
    let users = config
        .retrieval
        .users
        .iter()
        .map(|seed| User { user_id: seed.id.clone(), user_name: seed.name.clone() })
        .collect();
    (channels, users)
}

/// Builds the command service. Components whose credentials are missing or
/// broken are kept as errors so `/reload` and `/status` can report why.
pub fn build_command_service(
    config: &AppConfig,
    db_pool: DbPool,
    slack: Arc<SlackWebClient>,
) -> EchoLabCommandService {
    let store: Arc<dyn MessageStore> = Arc::new(SqlMessageStore::new(db_pool));

    let reload = build_reload_pipeline(config, store.clone(), slack);
    let status = build_status_reporter(config);
    for (component, outcome) in
        [("reload", reload.as_ref().err()), ("status", status.as_ref().err())]
    {
        if let Some(error) = outcome {
            warn!(
                event_name = "system.bootstrap.component_unavailable",
                correlation_id = "bootstrap",
                component,
                error = %error,
                "component unavailable; its command will report the error"
            );
        }
    }

    EchoLabCommandService::new(store, reload, status)
}

fn build_reload_pipeline(
    config: &AppConfig,
    store: Arc<dyn MessageStore>,
    slack: Arc<SlackWebClient>,
) -> Component<ReloadPipeline> {
    let llm = OpenAiCompatibleClient::from_config(config)
        .map_err(|error| ApplicationError::Configuration(error.to_string()))?;
    let examples = load_examples(&config.llm.examples_path)
        .map_err(|error| ApplicationError::Configuration(error.to_string()))?;
    let sheets = GoogleSheetsClient::from_credentials(
        config.sheets.credentials_path.as_deref(),
        HTTP_TIMEOUT,
    )
    .map_err(|error| ApplicationError::Configuration(error.to_string()))?;

    let download_dir = config.retrieval.download.then(|| config.retrieval.download_dir.clone());
    let retriever = MessageRetriever::new(slack, store.clone())
        .with_allowed_authors(config.retrieval.poster_ids.clone())
        .with_downloads(download_dir);
    let publisher = Publisher::new(store.clone(), Arc::new(sheets), config.sheets.spreadsheet_name.clone());

    Ok(ReloadPipeline::new(
        retriever,
        store,
        CandidateExtractor::new(Arc::new(llm), examples),
        publisher,
        config.channel_ids(),
    ))
}

pub fn build_status_reporter(config: &AppConfig) -> Component<StatusReporter> {
    let access_token = config.dropbox.access_token.clone().ok_or_else(|| {
        ApplicationError::Configuration(
            "dropbox.access_token is not set (ECHOLAB_DROPBOX_ACCESS_TOKEN)".to_owned(),
        )
    })?;
    let dropbox = DropboxClient::new(access_token, HTTP_TIMEOUT)
        .map_err(|error| ApplicationError::Integration(error.to_string()))?;

    let credentials = WarehouseCredentials::from_yaml_file(&config.warehouse.credentials_path)
        .map_err(|error| ApplicationError::Configuration(error.to_string()))?;
    let warehouse = PgCatalogWarehouse::connect_lazy(&credentials, config.warehouse.timeout_secs);

    Ok(StatusReporter::new(
        Arc::new(dropbox),
        Arc::new(warehouse),
        config.dropbox.folder_path.clone(),
        config.warehouse.year_cutoff,
        config.warehouse.files_per_hour,
    ))
}
