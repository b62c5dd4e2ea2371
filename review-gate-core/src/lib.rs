pub mod reconcile;
pub mod review;
pub mod verdict;

pub use reconcile::{reviews_to_dismiss, Dismissal, DismissalReason, SubmittedReview, Trigger};
pub use review::{CommitSha, PullRequest, Review, ReviewId, ReviewSet, ReviewState, UserId};
pub use verdict::{evaluate, ApprovalVerdict, GateState};
