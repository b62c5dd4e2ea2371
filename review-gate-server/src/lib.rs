pub mod api_trace;
pub mod config;
pub mod dismissal;
pub mod dispatcher;
pub mod error;
pub mod event;
pub mod github;
pub mod host;
pub mod ip_filter;
pub mod review_store;
pub mod status;
pub mod webhook;

#[cfg(test)]
mod fake_host;

use axum::{http::StatusCode, response::Json, routing::get, Router};
use serde_json::json;
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;

pub use dispatcher::{DispatchOutcome, WebhookDispatcher};
pub use error::{GateError, HostError};
pub use host::ReviewHost;

pub fn get_service_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

pub struct AppState {
    pub dispatcher: WebhookDispatcher,
    pub webhook_secret: String,
    pub allowed_networks: ip_filter::AllowedNetworks,
}

async fn health_check() -> Result<Json<serde_json::Value>, StatusCode> {
    Ok(Json(json!({
        "status": "healthy",
        "service": "review-gate"
    })))
}

/// The full HTTP surface: health probe plus the webhook receiver.
pub fn app(app_state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .merge(webhook::webhook_router(app_state.clone()))
        .layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()))
        .with_state(app_state)
}
