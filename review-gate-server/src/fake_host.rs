//! In-memory `ReviewHost` for tests.
//!
//! Holds the reviews of a single pull request, serves them in pages, applies
//! dismissals, and records every call. Individual pages, dismissals and
//! status writes can be made to fail.

use std::collections::HashSet;
use std::sync::Mutex;

use async_trait::async_trait;
use review_gate_core::{CommitSha, PullRequest, Review, ReviewId, ReviewState, UserId};

use crate::error::HostError;
use crate::host::{CommitStatus, ReviewHost, ReviewPage};

#[derive(Default)]
struct Inner {
    reviews: Vec<Review>,
    page_size: Option<usize>,
    failing_pages: HashSet<u32>,
    repeated_next_page: Option<u32>,
    failing_dismissals: HashSet<ReviewId>,
    fail_status: bool,
    pages_requested: Vec<u32>,
    dismissals: Vec<(ReviewId, String)>,
    statuses: Vec<CommitStatus>,
}

#[derive(Default)]
pub struct FakeHost {
    inner: Mutex<Inner>,
}

impl FakeHost {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pull_request() -> PullRequest {
        PullRequest {
            repo_owner: "owner".to_string(),
            repo_name: "repo".to_string(),
            number: 1,
            head_sha: CommitSha::from("abc123def456"),
        }
    }

    pub fn review_url(id: u64) -> String {
        format!("https://github.com/owner/repo/pull/1#pullrequestreview-{}", id)
    }

    pub fn add_review(&self, id: u64, author: u64, state: ReviewState) {
        self.lock().reviews.push(Review {
            id: ReviewId(id),
            author: Some(UserId(author)),
            state,
            submitted_at: None,
            html_url: Self::review_url(id),
        });
    }

    pub fn set_page_size(&self, size: usize) {
        self.lock().page_size = Some(size);
    }

    pub fn fail_page(&self, page: u32) {
        self.lock().failing_pages.insert(page);
    }

    /// Make every page report `page` as its successor.
    pub fn repeat_next_page(&self, page: u32) {
        self.lock().repeated_next_page = Some(page);
    }

    pub fn fail_dismissal(&self, id: u64) {
        self.lock().failing_dismissals.insert(ReviewId(id));
    }

    pub fn fail_status(&self) {
        self.lock().fail_status = true;
    }

    pub fn pages_requested(&self) -> Vec<u32> {
        self.lock().pages_requested.clone()
    }

    pub fn dismissals(&self) -> Vec<(ReviewId, String)> {
        self.lock().dismissals.clone()
    }

    pub fn statuses(&self) -> Vec<CommitStatus> {
        self.lock().statuses.clone()
    }

    pub fn state_of(&self, id: u64) -> Option<ReviewState> {
        self.lock()
            .reviews
            .iter()
            .find(|review| review.id == ReviewId(id))
            .map(|review| review.state)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn unavailable() -> HostError {
        HostError::Status {
            status: 503,
            body: "service unavailable".to_string(),
        }
    }
}

#[async_trait]
impl ReviewHost for FakeHost {
    async fn fetch_review_page(
        &self,
        _pr: &PullRequest,
        page: u32,
    ) -> Result<ReviewPage, HostError> {
        let mut inner = self.lock();
        inner.pages_requested.push(page);
        if inner.failing_pages.contains(&page) {
            return Err(Self::unavailable());
        }

        let size = inner.page_size.unwrap_or(100);
        let start = (page as usize - 1) * size;
        let end = (start + size).min(inner.reviews.len());
        let reviews = inner
            .reviews
            .get(start..end)
            .map(<[Review]>::to_vec)
            .unwrap_or_default();
        let next_page = match inner.repeated_next_page {
            Some(repeated) => Some(repeated),
            None if end < inner.reviews.len() => Some(page + 1),
            None => None,
        };

        Ok(ReviewPage { reviews, next_page })
    }

    async fn dismiss_review(
        &self,
        _pr: &PullRequest,
        review_id: ReviewId,
        message: &str,
    ) -> Result<(), HostError> {
        let mut inner = self.lock();
        inner.dismissals.push((review_id, message.to_string()));
        if inner.failing_dismissals.contains(&review_id) {
            return Err(Self::unavailable());
        }

        if let Some(review) = inner.reviews.iter_mut().find(|r| r.id == review_id) {
            review.state = ReviewState::Dismissed;
        }
        Ok(())
    }

    async fn create_status(
        &self,
        _pr: &PullRequest,
        status: &CommitStatus,
    ) -> Result<(), HostError> {
        let mut inner = self.lock();
        if inner.fail_status {
            return Err(Self::unavailable());
        }
        inner.statuses.push(status.clone());
        Ok(())
    }
}
