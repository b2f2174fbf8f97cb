use anyhow::Result;
use echolab_core::config::{AppConfig, LoadOptions};
use echolab_server::{bootstrap, health};
use tracing_subscriber::EnvFilter;

fn init_logging(config: &AppConfig) {
    use echolab_core::config::LogFormat::*;

    // RUST_LOG wins over the configured level when present.
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.logging.level.as_str()));

    match config.logging.format {
        Compact => {
            tracing_subscriber::fmt().with_target(false).with_env_filter(filter).compact().init();
        }
        Pretty => {
            tracing_subscriber::fmt().with_target(false).with_env_filter(filter).pretty().init();
        }
        Json => {
            tracing_subscriber::fmt().with_target(false).with_env_filter(filter).json().init();
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    run().await
}

pub async fn run() -> Result<()> {
    let config = AppConfig::load(LoadOptions::default())?;
    init_logging(&config);

    let app = bootstrap::bootstrap_with_config(config).await?;

    health::spawn(
        &app.config.server.bind_address,
        app.config.server.health_check_port,
        app.db_pool.clone(),
    )
    .await?;

    tracing::info!(
        event_name = "system.server.started",
        correlation_id = "bootstrap",
        channels = app.config.retrieval.channels.len(),
        "echolab-server started; listening for slack events"
    );

    tokio::select! {
        outcome = app.slack_runner.start() => {
            if let Err(error) = outcome {
                tracing::error!(
                    event_name = "system.server.slack_runner_failed",
                    correlation_id = "shutdown",
                    error = %error,
                    "slack runner stopped with an error"
                );
            }
        }
        signal = tokio::signal::ctrl_c() => {
            signal?;
        }
    }

    tracing::info!(
        event_name = "system.server.stopping",
        correlation_id = "shutdown",
        "echolab-server stopping"
    );
    app.db_pool.close().await;

    Ok(())
}
