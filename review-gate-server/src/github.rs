use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use reqwest_middleware::{ClientBuilder, ClientWithMiddleware};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{error, info};

use review_gate_core::{GateState, PullRequest, Review, ReviewId, ReviewState, UserId};

use crate::api_trace::ApiTraceMiddleware;
use crate::error::HostError;
use crate::host::{CommitStatus, ReviewHost, ReviewPage};

pub const DEFAULT_API_URL: &str = "https://api.github.com";
const REVIEWS_PER_PAGE: u32 = 100;

/// GitHub REST client authenticated with a fixed access token.
///
/// The token is supplied once at construction and attached to every request.
#[derive(Clone)]
pub struct GitHubClient {
    client: ClientWithMiddleware,
    api_url: String,
    token: String,
}

#[derive(Debug, Deserialize)]
struct ReviewResponse {
    id: u64,
    user: Option<UserResponse>,
    state: ReviewState,
    submitted_at: Option<DateTime<Utc>>,
    html_url: String,
}

#[derive(Debug, Deserialize)]
struct UserResponse {
    id: u64,
}

impl From<ReviewResponse> for Review {
    fn from(response: ReviewResponse) -> Self {
        Review {
            id: ReviewId(response.id),
            author: response.user.map(|user| UserId(user.id)),
            state: response.state,
            submitted_at: response.submitted_at,
            html_url: response.html_url,
        }
    }
}

#[derive(Debug, Serialize)]
struct DismissReviewRequest<'a> {
    message: &'a str,
    event: &'static str,
}

#[derive(Debug, Serialize)]
struct CreateStatusRequest<'a> {
    state: GateState,
    description: &'a str,
    context: &'a str,
}

impl GitHubClient {
    pub fn new(api_url: &str, token: String, timeout: Duration) -> Result<Self, HostError> {
        Ok(Self {
            client: create_github_client(timeout)?,
            api_url: api_url.trim_end_matches('/').to_string(),
            token,
        })
    }

    fn repo_url(&self, pr: &PullRequest) -> String {
        format!("{}/repos/{}/{}", self.api_url, pr.repo_owner, pr.repo_name)
    }
}

#[async_trait]
impl ReviewHost for GitHubClient {
    async fn fetch_review_page(
        &self,
        pr: &PullRequest,
        page: u32,
    ) -> Result<ReviewPage, HostError> {
        let url = format!(
            "{}/pulls/{}/reviews?page={}&per_page={}",
            self.repo_url(pr),
            pr.number,
            page,
            REVIEWS_PER_PAGE
        );

        info!("Fetching reviews page {} for {}", page, pr);

        let response = self
            .client
            .get(&url)
            .header("Authorization", format!("Bearer {}", self.token))
            .header("Accept", "application/vnd.github+json")
            .send()
            .await?;
        let response = ensure_success(response, "fetching reviews").await?;

        let next_page = response
            .headers()
            .get("link")
            .and_then(|v| v.to_str().ok())
            .and_then(next_page_from_link);

        let reviews: Vec<ReviewResponse> = response
            .json()
            .await
            .map_err(|e| HostError::Decode(e.to_string()))?;

        info!(
            "Fetched {} reviews on page {} for {} (next: {:?})",
            reviews.len(),
            page,
            pr,
            next_page
        );

        Ok(ReviewPage {
            reviews: reviews.into_iter().map(Review::from).collect(),
            next_page,
        })
    }

    async fn dismiss_review(
        &self,
        pr: &PullRequest,
        review_id: ReviewId,
        message: &str,
    ) -> Result<(), HostError> {
        let url = format!(
            "{}/pulls/{}/reviews/{}/dismissals",
            self.repo_url(pr),
            pr.number,
            review_id
        );

        info!("Dismissing review {} on {}", review_id, pr);

        let response = self
            .client
            .put(&url)
            .header("Authorization", format!("Bearer {}", self.token))
            .header("Accept", "application/vnd.github+json")
            .json(&DismissReviewRequest {
                message,
                event: "DISMISS",
            })
            .send()
            .await?;
        ensure_success(response, "dismissing review").await?;

        info!("Successfully dismissed review {}", review_id);
        Ok(())
    }

    async fn create_status(
        &self,
        pr: &PullRequest,
        status: &CommitStatus,
    ) -> Result<(), HostError> {
        let url = format!("{}/statuses/{}", self.repo_url(pr), status.sha);

        info!(
            "Creating {} status '{}' on {} ({})",
            status.state,
            status.context,
            status.sha.short(),
            pr
        );

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.token))
            .header("Accept", "application/vnd.github+json")
            .json(&CreateStatusRequest {
                state: status.state,
                description: &status.description,
                context: &status.context,
            })
            .send()
            .await?;
        ensure_success(response, "creating status").await?;

        Ok(())
    }
}

async fn ensure_success(
    response: reqwest::Response,
    operation: &str,
) -> Result<reqwest::Response, HostError> {
    if response.status().is_success() {
        return Ok(response);
    }

    let status = response.status();
    let error_text = response.text().await.unwrap_or_default();
    error!(
        "GitHub API error {}: {} - {}",
        operation, status, error_text
    );
    Err(HostError::Status {
        status: status.as_u16(),
        body: error_text,
    })
}

/// Extract the `rel="next"` page number from a GitHub `Link` header.
pub fn next_page_from_link(link: &str) -> Option<u32> {
    link.split(',').find_map(|entry| {
        let mut parts = entry.split(';');
        let target = parts.next()?.trim();
        let is_next = parts.any(|param| param.trim() == "rel=\"next\"");
        if !is_next {
            return None;
        }

        let target = target.strip_prefix('<')?.strip_suffix('>')?;
        let url = url::Url::parse(target).ok()?;
        url.query_pairs()
            .find(|(key, _)| key == "page")
            .and_then(|(_, value)| value.parse().ok())
    })
}

pub fn create_github_client(timeout: Duration) -> Result<ClientWithMiddleware, HostError> {
    let client = Client::builder()
        .user_agent(concat!("review-gate/", env!("CARGO_PKG_VERSION")))
        .timeout(timeout)
        .build()?;

    Ok(ClientBuilder::new(client).with(ApiTraceMiddleware).build())
}
