//! Liveness HTTP endpoint.
//!
//! Hosting platforms probe `/` (and `/health`) to decide whether the bot
//! process is alive. Runs on PORT (default 8080) next to the Telegram
//! long-polling loop.

use axum::{extract::State, http::StatusCode, response::IntoResponse, routing::get, Json, Router};
use serde::Serialize;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;

use crate::storage::db::{get_connection, DbPool};

/// Body of `/health`
#[derive(Debug, Serialize)]
struct HealthStatus {
    status: &'static str,
    database: bool,
    version: &'static str,
}

/// Shared state for the web server.
#[derive(Clone)]
struct WebState {
    db: Arc<DbPool>,
}

/// Builds the router; split out so tests can drive it without binding a port
pub fn create_router(db: Arc<DbPool>) -> Router {
    Router::new()
        .route("/", get(root_handler))
        .route("/health", get(health_handler))
        .with_state(WebState { db })
}

/// Start the liveness server.
pub async fn start_web_server(port: u16, db: Arc<DbPool>) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));

    log::info!("Starting HTTP server on http://{}", addr);
    log::info!("  /        - Liveness (plain text)");
    log::info!("  /health  - Liveness + database check (JSON)");

    let listener = TcpListener::bind(&addr).await?;
    axum::serve(listener, create_router(db)).await?;

    Ok(())
}

/// GET /: plain liveness text.
async fn root_handler() -> &'static str {
    "Telegram bot is running!"
}

/// GET /health: reports whether a pooled connection answers a trivial query.
async fn health_handler(State(state): State<WebState>) -> impl IntoResponse {
    let db = state.db.clone();
    let database_ok = tokio::task::spawn_blocking(move || {
        get_connection(&db)
            .ok()
            .and_then(|conn| conn.query_row("SELECT 1", [], |row| row.get::<_, i64>(0)).ok())
            .is_some()
    })
    .await
    .unwrap_or(false);

    let status = if database_ok {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (
        status,
        Json(HealthStatus {
            status: if database_ok { "ok" } else { "degraded" },
            database: database_ok,
            version: crate::core::config::APP_VERSION,
        }),
    )
}
