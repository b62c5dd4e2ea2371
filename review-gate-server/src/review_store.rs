//! Complete review listings assembled from the host's paginated API.

use futures::stream::{self, Stream, TryStreamExt};
use tracing::{info, warn};

use review_gate_core::{PullRequest, Review, ReviewSet};

use crate::error::HostError;
use crate::host::ReviewHost;

/// Lazily fetch the pages of reviews for `pr`, starting at page 1.
///
/// Each page is requested only when the previous one has been consumed. The
/// sequence ends when the host reports no next page, or reports a next page
/// that does not advance, so it is always finite. An error ends the stream.
pub fn review_pages<'a>(
    host: &'a dyn ReviewHost,
    pr: &'a PullRequest,
) -> impl Stream<Item = Result<Vec<Review>, HostError>> + Send + 'a {
    stream::try_unfold(Some(1u32), move |page| async move {
        let Some(page) = page else {
            return Ok::<_, HostError>(None);
        };

        let fetched = host.fetch_review_page(pr, page).await?;
        let next = match fetched.next_page {
            Some(next) if next > page => Some(next),
            Some(next) => {
                warn!(
                    "Host reported next page {} after page {} for {}, stopping",
                    next, page, pr
                );
                None
            }
            None => None,
        };

        Ok(Some((fetched.reviews, next)))
    })
}

/// Fetch every review of `pr`, concatenating pages in the order returned.
pub async fn fetch_all(host: &dyn ReviewHost, pr: &PullRequest) -> Result<ReviewSet, HostError> {
    let reviews = ReviewSet::from(review_pages(host, pr).try_concat().await?);
    info!("Found {} total reviews on {}", reviews.len(), pr);
    Ok(reviews)
}
