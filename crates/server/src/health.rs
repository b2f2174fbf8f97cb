use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use chrono::Utc;
use echolab_db::DbPool;
use serde::Serialize;
use tracing::{error, info};

#[derive(Clone)]
struct HealthState {
    db_pool: DbPool,
}

/// Row counts that show how far the pipeline has got.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct StoreCounts {
    pub messages: i64,
    pub parsed: i64,
    pub unparsed: i64,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct StoreHealth {
    pub status: &'static str,
    pub detail: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub counts: Option<StoreCounts>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub service: &'static str,
    pub message_store: StoreHealth,
    pub checked_at: String,
}

pub fn router(db_pool: DbPool) -> Router {
    Router::new().route("/health", get(health)).with_state(HealthState { db_pool })
}

/// Binds the health listener and serves it on a background task.
pub async fn spawn(bind_address: &str, port: u16, db_pool: DbPool) -> std::io::Result<()> {
    let address = format!("{bind_address}:{port}");
    let listener = tokio::net::TcpListener::bind(&address).await?;

    info!(
        event_name = "system.health.listening",
        correlation_id = "bootstrap",
        bind_address = %address,
        "health endpoint listening"
    );

    tokio::spawn(async move {
        if let Err(serve_error) = axum::serve(listener, router(db_pool)).await {
            error!(
                event_name = "system.health.stopped",
                correlation_id = "health",
                error = %serve_error,
                "health endpoint stopped"
            );
        }
    });

    Ok(())
}

async fn health(State(state): State<HealthState>) -> (StatusCode, Json<HealthResponse>) {
    let message_store = store_health(&state.db_pool).await;
    let ready = message_store.counts.is_some();

    let payload = HealthResponse {
        status: if ready { "ready" } else { "degraded" },
        service: "echolab-server",
        message_store,
        checked_at: Utc::now().to_rfc3339(),
    };

    let status_code = if ready { StatusCode::OK } else { StatusCode::SERVICE_UNAVAILABLE };
    (status_code, Json(payload))
}

async fn store_health(pool: &DbPool) -> StoreHealth {
    let counts = sqlx::query_as::<_, (i64, i64)>(
        "SELECT (SELECT COUNT(*) FROM messages), (SELECT COUNT(*) FROM parsed_messages)",
    )
    .fetch_one(pool)
    .await;

    match counts {
        Ok((messages, parsed)) => StoreHealth {
            status: "ready",
            detail: format!("{messages} messages stored, {parsed} parsed"),
            counts: Some(StoreCounts { messages, parsed, unparsed: (messages - parsed).max(0) }),
        },
        Err(query_error) => StoreHealth {
            status: "degraded",
            detail: format!("message store query failed: {query_error}"),
            counts: None,
        },
    }
}
