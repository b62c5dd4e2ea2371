//! Webhook payloads for the event types the gate handles.

use serde::Deserialize;

use review_gate_core::{CommitSha, PullRequest, ReviewId, ReviewState, SubmittedReview, UserId};

pub const PULL_REQUEST_EVENT: &str = "pull_request";
pub const PULL_REQUEST_REVIEW_EVENT: &str = "pull_request_review";

#[derive(Debug, Deserialize, Clone)]
pub struct PullRequestEvent {
    pub action: String,
    pub pull_request: PullRequestPayload,
    pub repository: Repository,
}

#[derive(Debug, Deserialize, Clone)]
pub struct PullRequestReviewEvent {
    pub action: String,
    pub review: ReviewPayload,
    pub pull_request: PullRequestPayload,
    pub repository: Repository,
}

#[derive(Debug, Deserialize, Clone)]
pub struct PullRequestPayload {
    pub number: u64,
    pub head: PullRequestRef,
}

#[derive(Debug, Deserialize, Clone)]
pub struct PullRequestRef {
    pub sha: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct Repository {
    pub name: String,
    pub owner: User,
}

#[derive(Debug, Deserialize, Clone)]
pub struct User {
    pub id: u64,
    pub login: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ReviewPayload {
    pub id: u64,
    pub user: User,
    pub state: ReviewState,
    pub html_url: String,
}

/// A webhook delivery, classified by its `X-GitHub-Event` header.
#[derive(Debug, Clone)]
pub enum InboundEvent {
    PullRequest(PullRequestEvent),
    PullRequestReview(PullRequestReviewEvent),
    /// Any other event type; acknowledged without processing.
    Other(String),
}

impl InboundEvent {
    /// Parse `body` according to `event_type`.
    ///
    /// Bodies of unhandled event types are not inspected.
    pub fn parse(event_type: &str, body: &[u8]) -> Result<Self, serde_json::Error> {
        match event_type {
            PULL_REQUEST_EVENT => Ok(Self::PullRequest(serde_json::from_slice(body)?)),
            PULL_REQUEST_REVIEW_EVENT => Ok(Self::PullRequestReview(serde_json::from_slice(body)?)),
            other => Ok(Self::Other(other.to_string())),
        }
    }
}

fn to_pull_request(repository: &Repository, pull_request: &PullRequestPayload) -> PullRequest {
    PullRequest {
        repo_owner: repository.owner.login.clone(),
        repo_name: repository.name.clone(),
        number: pull_request.number,
        head_sha: CommitSha::from(pull_request.head.sha.as_str()),
    }
}

impl PullRequestEvent {
    pub fn pull_request(&self) -> PullRequest {
        to_pull_request(&self.repository, &self.pull_request)
    }
}

impl PullRequestReviewEvent {
    pub fn pull_request(&self) -> PullRequest {
        to_pull_request(&self.repository, &self.pull_request)
    }

    pub fn submitted_review(&self) -> SubmittedReview {
        SubmittedReview {
            id: ReviewId(self.review.id),
            author: UserId(self.review.user.id),
            state: self.review.state,
            html_url: self.review.html_url.clone(),
        }
    }
}
