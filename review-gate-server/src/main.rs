use anyhow::{Context, Result};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::EnvFilter;

use review_gate_server::config::Config;
use review_gate_server::github::GitHubClient;
use review_gate_server::status::StatusPublisher;
use review_gate_server::{app, get_service_version, AppState, WebhookDispatcher};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();
    info!("Starting review gate {}", get_service_version());

    let config = Config::from_env().context("Failed to load configuration from environment")?;

    info!(
        "Requiring {} approval(s), publishing under context '{}'",
        config.required_approval_count, config.status_context
    );

    let github_client = GitHubClient::new(
        &config.github_api_url,
        config.github_access_token.clone(),
        config.github_timeout,
    )
    .context("Failed to create GitHub client")?;

    let dispatcher = WebhookDispatcher::new(
        Arc::new(github_client),
        config.required_approval_count,
        StatusPublisher::new(config.status_context.clone()),
        config.dismissal_label.clone(),
    );

    let app_state = Arc::new(AppState {
        dispatcher,
        webhook_secret: config.github_webhook_secret.clone(),
        allowed_networks: config.allowed_networks.clone(),
    });

    let listener = TcpListener::bind(format!("0.0.0.0:{}", config.port)).await?;
    info!("Server listening on port {}", config.port);
    axum::serve(
        listener,
        app(app_state).into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}
