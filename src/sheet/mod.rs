//! Stub sheet server.
//!
//! A local stand-in for the remote spreadsheet that speaks both dialects the
//! sync client supports, persisting rows in SQLite.

mod apps_script;
mod sheety;
mod store;

pub use apps_script::*;
pub use sheety::*;
pub use store::*;

use std::sync::Arc;

use axum::{
    routing::{get, put},
    Router,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::config::Config;

/// State shared across all handlers.
#[derive(Clone)]
pub struct SheetState {
    pub store: Arc<SheetStore>,
    pub config: Arc<Config>,
}

/// Create the stub sheet router with both dialects mounted.
pub fn create_router(state: SheetState) -> Router {
    // Browsers call the real webhook cross-origin
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let sheet_routes = Router::new()
        // Apps Script webhook
        .route("/macros/exec", get(webhook_get).post(webhook_post))
        // Sheety REST
        .route("/sheets/{sheet}", get(list_rows).post(add_row))
        .route("/sheets/{sheet}/{id}", put(edit_row).delete(delete_row));

    let health_routes = Router::new().route("/health", get(health_check));

    Router::new()
        .merge(sheet_routes)
        .merge(health_routes)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Open the database and serve until the process is stopped.
pub async fn serve(config: Config) -> Result<(), Box<dyn std::error::Error>> {
    tracing::info!("Starting stub sheet server");
    tracing::info!("Database path: {:?}", config.db_path);
    tracing::info!("Sheet name: {}", config.sheet_name);
    if !config.echo_ids {
        tracing::warn!("Webhook create responses will not include ids (CLINIC_ECHO_IDS=false)");
    }

    let pool = init_database(&config.db_path).await?;
    let state = SheetState {
        store: Arc::new(SheetStore::new(pool)),
        config: Arc::new(config.clone()),
    };

    let app = create_router(state);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    tracing::info!("Server listening on {}", config.bind_addr);
    tracing::info!(
        "Webhook: http://{}/macros/exec  Sheety: http://{}/sheets/{}",
        config.bind_addr,
        config.bind_addr,
        config.sheet_name
    );

    axum::serve(listener, app).await?;

    Ok(())
}

/// Health check endpoint.
async fn health_check() -> &'static str {
    "OK"
}
