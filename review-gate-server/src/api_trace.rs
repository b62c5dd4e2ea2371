//! Outbound request logging for the GitHub client.
//!
//! Every API call is logged with its method, path, status and latency. The
//! events are emitted inside whatever span is current, so calls made while
//! handling a delivery carry that delivery's id.

use axum::http;
use reqwest::{Request, Response};
use reqwest_middleware::{Middleware, Next, Result as MiddlewareResult};
use std::time::Instant;
use tracing::{debug, warn};

pub struct ApiTraceMiddleware;

#[async_trait::async_trait]
impl Middleware for ApiTraceMiddleware {
    async fn handle(
        &self,
        req: Request,
        extensions: &mut http::Extensions,
        next: Next<'_>,
    ) -> MiddlewareResult<Response> {
        let method = req.method().to_string();
        let path = extract_path(req.url().as_str());
        let started = Instant::now();

        let response = next.run(req, extensions).await;
        let elapsed_ms = started.elapsed().as_millis() as u64;

        match &response {
            Ok(resp) if resp.status().is_success() => {
                debug!(
                    method = %method,
                    path = %path,
                    status = resp.status().as_u16(),
                    elapsed_ms,
                    "GitHub API call"
                );
            }
            Ok(resp) => {
                warn!(
                    method = %method,
                    path = %path,
                    status = resp.status().as_u16(),
                    elapsed_ms,
                    "GitHub API call returned an error status"
                );
            }
            Err(err) => {
                warn!(
                    method = %method,
                    path = %path,
                    elapsed_ms,
                    error = %err,
                    "GitHub API call failed"
                );
            }
        }

        response
    }
}

fn extract_path(url: &str) -> String {
    url::Url::parse(url)
        .map(|u| u.path().to_string())
        .unwrap_or_else(|_| url.to_string())
}
