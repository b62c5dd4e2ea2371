//! Publication of approval verdicts as commit statuses.

use tracing::{error, info};

use review_gate_core::{ApprovalVerdict, PullRequest};

use crate::host::{CommitStatus, ReviewHost};

/// Default status context distinguishing this gate from other checks.
pub const DEFAULT_STATUS_CONTEXT: &str = "review-gate/approval";

#[derive(Debug, Clone)]
pub struct StatusPublisher {
    context: String,
}

impl StatusPublisher {
    pub fn new(context: impl Into<String>) -> Self {
        Self {
            context: context.into(),
        }
    }

    /// Publish `verdict` on the head commit of `pr`.
    ///
    /// Returns whether the status was created. Failures are logged and not
    /// retried; a redelivered webhook recomputes and republishes the verdict.
    pub async fn publish(
        &self,
        host: &dyn ReviewHost,
        pr: &PullRequest,
        verdict: &ApprovalVerdict,
    ) -> bool {
        let status = CommitStatus {
            sha: pr.head_sha.clone(),
            state: verdict.state,
            description: verdict.description.clone(),
            context: self.context.clone(),
        };

        match host.create_status(pr, &status).await {
            Ok(()) => {
                info!(
                    "Published {} ({}) on {} at {}",
                    verdict.state,
                    verdict.description,
                    pr,
                    pr.head_sha.short()
                );
                true
            }
            Err(e) => {
                error!("Failed to publish status on {}: {}", pr, e);
                false
            }
        }
    }
}

impl Default for StatusPublisher {
    fn default() -> Self {
        Self::new(DEFAULT_STATUS_CONTEXT)
    }
}
