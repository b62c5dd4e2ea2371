//! Selection of reviews that must be dismissed before evaluation.
//!
//! Two events invalidate earlier reviews:
//!
//! | Trigger | Dismissed reviews |
//! |---------|-------------------|
//! | New commit pushed | every binding review |
//! | Binding review submitted | the same author's other binding reviews |
//!
//! This module only decides *what* to dismiss. Issuing the dismissals and
//! re-reading the reviews afterwards is the caller's job; the input set is
//! never modified.

use std::fmt;

use crate::review::{Review, ReviewId, ReviewSet, ReviewState, UserId};

/// A review as delivered in a `pull_request_review.submitted` webhook.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmittedReview {
    pub id: ReviewId,
    pub author: UserId,
    pub state: ReviewState,
    pub html_url: String,
}

/// The event that prompted reconciliation.
#[derive(Debug, Clone, Copy)]
pub enum Trigger<'a> {
    /// The pull request head moved; all binding reviews are stale.
    NewCommit,
    /// An author submitted a new review, superseding their earlier ones.
    Resubmission(&'a SubmittedReview),
}

/// Why a review is being dismissed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DismissalReason {
    NewCommit,
    SupersededBy { review_id: ReviewId, html_url: String },
}

impl fmt::Display for DismissalReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NewCommit => write!(f, "New commit pushed"),
            Self::SupersededBy {
                review_id,
                html_url,
            } => write!(f, "Superseded by [{}]({})", review_id, html_url),
        }
    }
}

/// A review selected for dismissal, with the reason to record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dismissal {
    pub review: Review,
    pub reason: DismissalReason,
}

/// Decide which reviews in `reviews` must be dismissed for `trigger`.
///
/// Results keep the order of `reviews`. Reviews that are commented, pending
/// or already dismissed are never selected.
pub fn reviews_to_dismiss(reviews: &ReviewSet, trigger: Trigger<'_>) -> Vec<Dismissal> {
    match trigger {
        Trigger::NewCommit => reviews
            .iter()
            .filter(|review| review.state.is_binding())
            .map(|review| Dismissal {
                review: review.clone(),
                reason: DismissalReason::NewCommit,
            })
            .collect(),
        Trigger::Resubmission(submitted) => {
            if !submitted.state.is_binding() {
                return Vec::new();
            }

            // The id check is the only guard against dismissing the submitted
            // review itself when the fetch already contains it.
            reviews
                .iter()
                .filter(|review| {
                    review.author == Some(submitted.author)
                        && review.id != submitted.id
                        && review.state.is_binding()
                })
                .map(|review| Dismissal {
                    review: review.clone(),
                    reason: DismissalReason::SupersededBy {
                        review_id: submitted.id,
                        html_url: submitted.html_url.clone(),
                    },
                })
                .collect()
        }
    }
}
