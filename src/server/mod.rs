//! # HTTP Server
//!
//! JSON API over the pipeline and the printer bridge.
//!
//! ## Usage
//!
//! ```bash
//! labelbot serve --listen-addr 0.0.0.0:8000 --images-dir ./images --printer-model b1
//! ```
//!
//! | Route | Purpose |
//! |-------|---------|
//! | `POST /process` | text and/or image in, printed label and summary out |
//! | `POST /analyze/:kind` | one interpreter (`creative` or `fun`) |
//! | `POST /print` | print a base64 image directly |
//! | `GET /status` | printer heartbeat |
//! | `GET /health` | liveness |
//! | `GET /images` | images printable by name |

mod handlers;
mod state;

pub use handlers::ApiError;
pub use state::{AppState, ServerConfig};

use axum::{
    Router,
    extract::DefaultBodyLimit,
    routing::{get, post},
};
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::error::Result;

/// Largest accepted request body; base64 photos are big.
const BODY_LIMIT: usize = 50 * 1024 * 1024;

/// Build the router. Separate from [`serve`] so it can be driven in tests.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/process", post(handlers::process::process))
        .route("/images", get(handlers::process::images))
        .route("/analyze/:kind", post(handlers::analyze::analyze))
        .route("/print", post(handlers::print::print))
        .route("/status", get(handlers::status::status))
        .route("/health", get(handlers::status::health))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(DefaultBodyLimit::max(BODY_LIMIT)),
        )
        .with_state(Arc::new(state))
}

/// Start the HTTP server.
///
/// ```no_run
/// use clap::Parser;
/// use labelbot::server::{serve, ServerConfig};
///
/// #[derive(Parser)]
/// struct Args {
///     #[command(flatten)]
///     server: ServerConfig,
/// }
///
/// # async fn example() -> Result<(), labelbot::LabelbotError> {
/// serve(Args::parse().server).await?;
/// # Ok(())
/// # }
/// ```
pub async fn serve(config: ServerConfig) -> Result<()> {
    let state = AppState::from_config(&config)?;
    let app = router(state);

    info!(
        listen = %config.listen_addr,
        images = %config.images_dir.display(),
        printer = %config.printer_model,
        connection = ?config.printer_connection,
        llm = %config.llm_model,
        "labelbot server starting"
    );

    let listener = tokio::net::TcpListener::bind(&config.listen_addr)
        .await
        .map_err(|e| std::io::Error::new(e.kind(), format!("Failed to bind to {}: {}", config.listen_addr, e)))?;

    axum::serve(listener, app).await?;
    Ok(())
}
