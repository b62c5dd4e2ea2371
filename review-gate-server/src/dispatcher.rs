//! Routing of webhook deliveries to the approval flows.
//!
//! | Event | Action | Flow |
//! |-------|--------|------|
//! | `pull_request` | `opened` | evaluate, publish |
//! | `pull_request` | `synchronize` | dismiss binding reviews, evaluate, publish |
//! | `pull_request_review` | `submitted` | dismiss superseded reviews, evaluate, publish |
//! | anything else | | acknowledged, nothing done |
//!
//! Every flow resolves to a `DispatchOutcome`; host failures are logged
//! rather than returned, so the delivery is always acknowledged.

use std::sync::Arc;

use tracing::{error, info, warn};

use review_gate_core::{
    evaluate, reviews_to_dismiss, ApprovalVerdict, Dismissal, PullRequest, ReviewSet,
    SubmittedReview, Trigger,
};

use crate::dismissal::{dismiss_all, DismissalOutcome};
use crate::error::HostError;
use crate::event::{InboundEvent, PullRequestEvent, PullRequestReviewEvent};
use crate::host::ReviewHost;
use crate::review_store::fetch_all;
use crate::status::StatusPublisher;

/// Default prefix of the message recorded on dismissed reviews.
pub const DEFAULT_DISMISSAL_LABEL: &str = "Review gate";

/// What happened to a delivery.
#[derive(Debug)]
pub enum DispatchOutcome {
    /// Event type or action the gate does not act on.
    Ignored,
    /// Reviews could not be read, so no verdict was computed.
    Abandoned(HostError),
    /// A verdict was computed and publication attempted.
    Evaluated {
        verdict: ApprovalVerdict,
        published: bool,
        dismissals: Vec<DismissalOutcome>,
    },
}

pub struct WebhookDispatcher {
    host: Arc<dyn ReviewHost>,
    required_approval_count: u32,
    publisher: StatusPublisher,
    dismissal_label: String,
}

impl WebhookDispatcher {
    pub fn new(
        host: Arc<dyn ReviewHost>,
        required_approval_count: u32,
        publisher: StatusPublisher,
        dismissal_label: impl Into<String>,
    ) -> Self {
        Self {
            host,
            required_approval_count,
            publisher,
            dismissal_label: dismissal_label.into(),
        }
    }

    pub async fn dispatch(&self, event: InboundEvent) -> DispatchOutcome {
        match event {
            InboundEvent::PullRequest(event) => self.process_pull_request(event).await,
            InboundEvent::PullRequestReview(event) => {
                self.process_pull_request_review(event).await
            }
            InboundEvent::Other(event_type) => {
                info!("Ignoring webhook event type: {}", event_type);
                DispatchOutcome::Ignored
            }
        }
    }

    async fn process_pull_request(&self, event: PullRequestEvent) -> DispatchOutcome {
        let pr = event.pull_request();
        match event.action.as_str() {
            "opened" => {
                info!("PR {} opened", pr);
                self.apply_approval_status(&pr, Vec::new()).await
            }
            "synchronize" => {
                info!("PR {} synchronized to {}", pr, pr.head_sha.short());
                self.process_synchronized(&pr).await
            }
            other => {
                info!("Ignoring pull_request action '{}' on {}", other, pr);
                DispatchOutcome::Ignored
            }
        }
    }

    async fn process_pull_request_review(&self, event: PullRequestReviewEvent) -> DispatchOutcome {
        let pr = event.pull_request();
        match event.action.as_str() {
            "submitted" => {
                let submitted = event.submitted_review();
                info!(
                    "Review {} ({}) submitted on {} by {}",
                    submitted.id, submitted.state, pr, event.review.user.login
                );
                self.process_review_submitted(&pr, &submitted).await
            }
            other => {
                info!("Ignoring pull_request_review action '{}' on {}", other, pr);
                DispatchOutcome::Ignored
            }
        }
    }

    /// A new head commit invalidates every binding review.
    async fn process_synchronized(&self, pr: &PullRequest) -> DispatchOutcome {
        let reviews = match fetch_all(&*self.host, pr).await {
            Ok(reviews) => reviews,
            Err(e) => {
                error!("Failed to fetch reviews for {}, abandoning: {}", pr, e);
                return DispatchOutcome::Abandoned(e);
            }
        };

        let dismissals = reviews_to_dismiss(&reviews, Trigger::NewCommit);
        self.dismiss_then_evaluate(pr, reviews, dismissals).await
    }

    /// A binding review supersedes its author's earlier binding reviews.
    ///
    /// Failing to read or dismiss the earlier reviews does not stop the
    /// verdict from being recomputed.
    async fn process_review_submitted(
        &self,
        pr: &PullRequest,
        submitted: &SubmittedReview,
    ) -> DispatchOutcome {
        match fetch_all(&*self.host, pr).await {
            Ok(reviews) => {
                let dismissals = reviews_to_dismiss(&reviews, Trigger::Resubmission(submitted));
                self.dismiss_then_evaluate(pr, reviews, dismissals).await
            }
            Err(e) => {
                warn!(
                    "Failed to fetch reviews for {} before dismissal, continuing: {}",
                    pr, e
                );
                self.apply_approval_status(pr, Vec::new()).await
            }
        }
    }

    async fn dismiss_then_evaluate(
        &self,
        pr: &PullRequest,
        reviews: ReviewSet,
        dismissals: Vec<Dismissal>,
    ) -> DispatchOutcome {
        if dismissals.is_empty() {
            return self.evaluate_and_publish(pr, &reviews, Vec::new()).await;
        }

        let outcomes = dismiss_all(&*self.host, pr, &dismissals, &self.dismissal_label).await;
        // Re-read so the verdict reflects exactly the dismissals that succeeded.
        self.apply_approval_status(pr, outcomes).await
    }

    async fn apply_approval_status(
        &self,
        pr: &PullRequest,
        dismissals: Vec<DismissalOutcome>,
    ) -> DispatchOutcome {
        match fetch_all(&*self.host, pr).await {
            Ok(reviews) => self.evaluate_and_publish(pr, &reviews, dismissals).await,
            Err(e) => {
                error!("Failed to fetch reviews for {}, abandoning: {}", pr, e);
                DispatchOutcome::Abandoned(e)
            }
        }
    }

    async fn evaluate_and_publish(
        &self,
        pr: &PullRequest,
        reviews: &ReviewSet,
        dismissals: Vec<DismissalOutcome>,
    ) -> DispatchOutcome {
        let verdict = evaluate(reviews, self.required_approval_count);
        let published = self.publisher.publish(&*self.host, pr, &verdict).await;

        DispatchOutcome::Evaluated {
            verdict,
            published,
            dismissals,
        }
    }
}
