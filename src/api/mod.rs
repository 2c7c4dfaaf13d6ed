//! API — Axum web server exposing the monitor commands as JSON.
//!
//! CORS enabled for local front ends.

pub mod routes;

use axum::{
    http::{header, HeaderName, Method},
    routing::{delete, get, post},
    Router,
};
use tower_http::cors::{Any, CorsLayer};
use tracing::{error, info};

pub use routes::AppState;

/// Start the API server.
///
/// This spawns a background task; it doesn't block. Bind and serve
/// failures are logged and end the task without touching the sweep loop.
pub fn spawn_api(state: AppState, port: u16) -> tokio::task::JoinHandle<()> {
    let app = build_router(state);

    tokio::spawn(async move {
        let addr = std::net::SocketAddr::from(([0, 0, 0, 0], port));
        let listener = match tokio::net::TcpListener::bind(addr).await {
            Ok(l) => l,
            Err(e) => {
                error!(port, error = %e, "Failed to bind API port");
                return;
            }
        };
        info!(port, "API server listening on http://localhost:{port}");

        if let Err(e) = axum::serve(listener, app).await {
            error!(error = %e, "API server error");
        }
    })
}

/// Build the Axum router with all routes and middleware.
pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::DELETE])
        .allow_headers([
            header::CONTENT_TYPE,
            HeaderName::from_static(routes::OWNER_HEADER),
        ]);

    Router::new()
        .route(
            "/api/monitors",
            get(routes::list_monitors).post(routes::add_monitor),
        )
        .route("/api/monitors/:id", delete(routes::remove_monitor))
        .route("/api/monitors/:id/pause", post(routes::pause_monitor))
        .route("/api/monitors/:id/resume", post(routes::resume_monitor))
        .route("/health", get(routes::health))
        .layer(cors)
        .with_state(state)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
