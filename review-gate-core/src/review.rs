//! Review and pull request types shared by the reconciler and evaluator.
//!
//! These mirror the subset of GitHub's review model the gate cares about.
//! Identifiers are newtypes so a review id can never be passed where a user
//! id is expected.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Newtype for a GitHub review ID.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ReviewId(pub u64);

impl fmt::Display for ReviewId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for ReviewId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

/// Newtype for a GitHub user ID.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub u64);

impl From<u64> for UserId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

/// Newtype for commit SHA to prevent mixing with other strings.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CommitSha(pub String);

impl CommitSha {
    /// Returns a truncated SHA for display (first 7 bytes, or the whole
    /// string when that would split a character).
    pub fn short(&self) -> &str {
        self.0.get(..7).unwrap_or(&self.0)
    }
}

impl fmt::Display for CommitSha {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for CommitSha {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for CommitSha {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// State of a single review.
///
/// The REST API reports these in upper case while webhook payloads use lower
/// case, so both spellings are accepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReviewState {
    #[serde(alias = "approved")]
    Approved,
    #[serde(alias = "changes_requested")]
    ChangesRequested,
    #[serde(alias = "commented")]
    Commented,
    #[serde(alias = "dismissed")]
    Dismissed,
    #[serde(alias = "pending")]
    Pending,
}

impl ReviewState {
    /// Whether a review in this state counts towards the verdict.
    ///
    /// Only approvals and change requests are binding; these are also the
    /// only states that can be dismissed.
    pub fn is_binding(self) -> bool {
        matches!(self, Self::Approved | Self::ChangesRequested)
    }
}

impl fmt::Display for ReviewState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Approved => "APPROVED",
            Self::ChangesRequested => "CHANGES_REQUESTED",
            Self::Commented => "COMMENTED",
            Self::Dismissed => "DISMISSED",
            Self::Pending => "PENDING",
        };
        f.write_str(name)
    }
}

/// A reviewer's verdict on a pull request at a point in time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Review {
    pub id: ReviewId,
    /// `None` when GitHub reports the author as a deleted ("ghost") user.
    pub author: Option<UserId>,
    pub state: ReviewState,
    /// Pending reviews have not been submitted yet.
    pub submitted_at: Option<DateTime<Utc>>,
    pub html_url: String,
}

/// The reviews of one pull request, in submission order.
///
/// Not deduplicated: an author may appear several times.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReviewSet(Vec<Review>);

impl ReviewSet {
    pub fn new(reviews: Vec<Review>) -> Self {
        Self(reviews)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Review> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Number of reviews currently in `state`.
    pub fn count_in_state(&self, state: ReviewState) -> u32 {
        self.iter().filter(|review| review.state == state).count() as u32
    }
}

impl From<Vec<Review>> for ReviewSet {
    fn from(reviews: Vec<Review>) -> Self {
        Self(reviews)
    }
}

impl FromIterator<Review> for ReviewSet {
    fn from_iter<I: IntoIterator<Item = Review>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl IntoIterator for ReviewSet {
    type Item = Review;
    type IntoIter = std::vec::IntoIter<Review>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<'a> IntoIterator for &'a ReviewSet {
    type Item = &'a Review;
    type IntoIter = std::slice::Iter<'a, Review>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

/// Identifies the commit a status update is attached to.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PullRequest {
    pub repo_owner: String,
    pub repo_name: String,
    pub number: u64,
    pub head_sha: CommitSha,
}

impl fmt::Display for PullRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}#{}", self.repo_owner, self.repo_name, self.number)
    }
}
