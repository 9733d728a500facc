//! FormFlow API /v1: REST endpoints over the submission engine
pub mod config;
pub mod driver;
pub mod error;
pub mod handlers;
pub mod metrics;
pub mod middleware;
pub mod notifier;
pub mod service;
pub mod state;

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::trace::TraceLayer;

pub use config::ServerConfig;
pub use error::ApiError;
pub use state::AppState;

pub fn create_app(state: AppState) -> Router {
    Router::new()
        .route("/v1/health", get(handlers::health))
        .route("/v1/metrics", get(handlers::metrics))
        .route(
            "/v1/forms",
            post(handlers::register_form).get(handlers::list_forms),
        )
        .route("/v1/forms/{id}", get(handlers::get_form))
        .route(
            "/v1/submissions",
            post(handlers::submit).get(handlers::list_submissions),
        )
        .route("/v1/submissions/{id}", get(handlers::get_submission))
        .route(
            "/v1/submissions/{id}/retry",
            post(handlers::retry_submission),
        )
        .route(
            "/v1/logs",
            get(handlers::list_logs).post(handlers::create_log),
        )
        .layer(middleware::cors())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub async fn run(config: ServerConfig) -> anyhow::Result<()> {
    let state = AppState::from_config(&config)?;
    let app = create_app(state);
    let listener = tokio::net::TcpListener::bind(&config.addr).await?;

    tracing::info!("FormFlow API listening on {}", config.addr);
    axum::serve(listener, app).await?;
    Ok(())
}
