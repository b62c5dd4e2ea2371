//! Reduction of a review set into the aggregate approval state.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::review::{ReviewSet, ReviewState};

/// Commit status state as understood by GitHub's status API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GateState {
    Success,
    Pending,
    Failure,
}

impl fmt::Display for GateState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Success => "success",
            Self::Pending => "pending",
            Self::Failure => "failure",
        };
        f.write_str(name)
    }
}

/// Aggregate approval verdict for a pull request.
///
/// Always recomputed from the current reviews; never stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ApprovalVerdict {
    pub state: GateState,
    pub approved_count: u32,
    pub changes_requested_count: u32,
    pub required_approval_count: u32,
    pub description: String,
}

/// Evaluate the approval state of `reviews`.
///
/// The input must already be reconciled: superseded reviews are expected to
/// have been dismissed, since each binding review is counted once regardless
/// of its author. Outstanding change requests always win over approvals.
pub fn evaluate(reviews: &ReviewSet, required_approval_count: u32) -> ApprovalVerdict {
    let approved_count = reviews.count_in_state(ReviewState::Approved);
    let changes_requested_count = reviews.count_in_state(ReviewState::ChangesRequested);

    let state = if changes_requested_count > 0 {
        GateState::Failure
    } else if approved_count >= required_approval_count {
        GateState::Success
    } else {
        GateState::Pending
    };

    ApprovalVerdict {
        state,
        approved_count,
        changes_requested_count,
        required_approval_count,
        description: format!(
            "{} (of {}) approval(s), {} change(s) requested",
            approved_count, required_approval_count, changes_requested_count
        ),
    }
}
