//! Derive the current approval set from submitted reviews.
//!
//! Only a user's latest standing review counts. `Commented` and `Pending`
//! reviews do not change a user's standing, so an approval followed by a
//! comment is still an approval. A later `ChangesRequested` or `Dismissed`
//! review withdraws it. The change author never counts as an approver.

use std::collections::HashMap;

use custodian_contracts::review::{ApprovalSet, Review, ReviewState};

/// Approvals standing after `reviews`, keyed by login with the time of the
/// approving review. `author` is left out.
pub fn collect_approvals(reviews: &[Review], author: &str) -> ApprovalSet {
    let mut latest: HashMap<&str, &Review> = HashMap::new();

    for review in reviews {
        if matches!(review.state, ReviewState::Commented | ReviewState::Pending) {
            continue;
        }
        if review.login == author {
            continue;
        }
        latest
            .entry(review.login.as_str())
            .and_modify(|current| {
                if review.submitted_at >= current.submitted_at {
                    *current = review;
                }
            })
            .or_insert(review);
    }

    latest
        .into_values()
        .filter(|review| review.state == ReviewState::Approved)
        .map(|review| (review.login.clone(), review.submitted_at))
        .collect()
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};

    use custodian_contracts::review::{Review, ReviewState};

    use super::collect_approvals;

    fn review(login: &str, state: ReviewState, minute: u32) -> Review {
        Review {
            login: login.to_string(),
            state,
            submitted_at: Utc.with_ymd_and_hms(2024, 5, 1, 12, minute, 0).unwrap(),
        }
    }

    #[test]
    fn test_latest_review_wins() {
        let reviews = vec![
            review("alice", ReviewState::Approved, 1),
            review("alice", ReviewState::ChangesRequested, 2),
            review("bob", ReviewState::ChangesRequested, 1),
            review("bob", ReviewState::Approved, 3),
        ];

        let approvals = collect_approvals(&reviews, "author");
        assert!(!approvals.has("alice"));
        assert!(approvals.has("bob"));
        assert_eq!(approvals.len(), 1);
    }

    /// Reviews may arrive out of order; timestamps decide.
    #[test]
    fn test_order_of_arrival_does_not_matter() {
        let reviews = vec![
            review("alice", ReviewState::Dismissed, 9),
            review("alice", ReviewState::Approved, 4),
        ];
        assert!(collect_approvals(&reviews, "author").is_empty());
    }

    #[test]
    fn test_comment_after_approval_keeps_approval() {
        let reviews = vec![
            review("alice", ReviewState::Approved, 1),
            review("alice", ReviewState::Commented, 5),
        ];
        assert!(collect_approvals(&reviews, "author").has("alice"));
    }

    #[test]
    fn test_author_approval_is_ignored() {
        let reviews = vec![review("author", ReviewState::Approved, 1)];
        assert!(collect_approvals(&reviews, "author").is_empty());
    }
}
