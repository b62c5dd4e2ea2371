//! Abstraction over the source-control host's REST API.
//!
//! The gate needs three calls: list a page of reviews, dismiss a review, and
//! create a commit status. `GitHubClient` is the production implementation;
//! tests substitute an in-memory host.

use async_trait::async_trait;
use review_gate_core::{CommitSha, GateState, PullRequest, Review, ReviewId};

use crate::error::HostError;

/// One page of reviews plus the continuation indicator.
#[derive(Debug, Clone, Default)]
pub struct ReviewPage {
    pub reviews: Vec<Review>,
    /// Page number to request next, `None` when this was the last page.
    pub next_page: Option<u32>,
}

/// A commit status to attach to a head commit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitStatus {
    pub sha: CommitSha,
    pub state: GateState,
    pub description: String,
    pub context: String,
}

#[async_trait]
pub trait ReviewHost: Send + Sync {
    /// Fetch a single page of reviews. Pages are numbered from 1.
    async fn fetch_review_page(&self, pr: &PullRequest, page: u32)
        -> Result<ReviewPage, HostError>;

    /// Dismiss a review, recording `message` as the reason.
    async fn dismiss_review(
        &self,
        pr: &PullRequest,
        review_id: ReviewId,
        message: &str,
    ) -> Result<(), HostError>;

    /// Create a commit status on the pull request's repository.
    async fn create_status(&self, pr: &PullRequest, status: &CommitStatus)
        -> Result<(), HostError>;
}
