//! Concurrent dismissal of superseded reviews.

use futures::future::join_all;
use tracing::{error, info};

use review_gate_core::{Dismissal, PullRequest, ReviewId};

use crate::error::HostError;
use crate::host::ReviewHost;

/// Result of one dismissal attempt.
#[derive(Debug)]
pub struct DismissalOutcome {
    pub review_id: ReviewId,
    pub result: Result<(), HostError>,
}

impl DismissalOutcome {
    pub fn is_ok(&self) -> bool {
        self.result.is_ok()
    }
}

/// Issue every dismissal concurrently and wait for all of them.
///
/// A failure is recorded in that review's outcome and does not affect the
/// others. Outcomes are returned in the order of `dismissals`.
pub async fn dismiss_all(
    host: &dyn ReviewHost,
    pr: &PullRequest,
    dismissals: &[Dismissal],
    label: &str,
) -> Vec<DismissalOutcome> {
    if dismissals.is_empty() {
        return Vec::new();
    }

    info!("Dismissing {} review(s) on {}", dismissals.len(), pr);

    let attempts = dismissals.iter().map(|dismissal| async move {
        let review_id = dismissal.review.id;
        let message = format!("{}: {}", label, dismissal.reason);
        let result = host.dismiss_review(pr, review_id, &message).await;
        if let Err(e) = &result {
            error!("Failed to dismiss review {} on {}: {}", review_id, pr, e);
        }
        DismissalOutcome { review_id, result }
    });

    let outcomes = join_all(attempts).await;

    let failed = outcomes.iter().filter(|o| !o.is_ok()).count();
    if failed > 0 {
        error!(
            "{} of {} dismissal(s) failed on {}",
            failed,
            outcomes.len(),
            pr
        );
    }

    outcomes
}
