use crate::api::{ApiResult, CardFilter};
use crate::models::Card;
use crate::repository::KanbanRepository;
use std::collections::HashSet;
use tracing::{debug, warn};

/// Fetch the active, closed and deferred cards of a board concurrently.
///
/// The active partition is required: its failure fails the whole fetch.
/// The closed and deferred partitions degrade to empty lists.
pub async fn fetch_board_cards(repo: &dyn KanbanRepository, board_id: &str) -> ApiResult<Vec<Card>> {
    let (active, closed, not_now) = tokio::join!(
        repo.cards(board_id, CardFilter::Active),
        repo.cards(board_id, CardFilter::Closed),
        repo.cards(board_id, CardFilter::NotNow),
    );

    let active = match active {
        ApiResult::Success(cards) => cards,
        ApiResult::Error { code, message } => {
            warn!(board_id, code, %message, "active cards fetch failed");
            return ApiResult::Error { code, message };
        }
        ApiResult::Exception(fault) => {
            warn!(board_id, error = %fault, "active cards fetch failed");
            return ApiResult::Exception(fault);
        }
    };
    let closed = partition_or_empty(board_id, CardFilter::Closed, closed);
    let not_now = partition_or_empty(board_id, CardFilter::NotNow, not_now);

    debug!(
        board_id,
        active = active.len(),
        closed = closed.len(),
        not_now = not_now.len(),
        "fetched card partitions"
    );

    let mut seen = HashSet::new();
    let cards = active
        .into_iter()
        .chain(closed)
        .chain(not_now)
        .filter(|card| seen.insert(card.id))
        .collect();
    ApiResult::Success(cards)
}

fn partition_or_empty(board_id: &str, filter: CardFilter, result: ApiResult<Vec<Card>>) -> Vec<Card> {
    match result {
        ApiResult::Success(cards) => cards,
        failed => {
            warn!(board_id, ?filter, outcome = %failed, "card partition unavailable, showing it empty");
            Vec::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::fixtures::card;
    use crate::models::CardStatus;
    use crate::testing::{FakeRepository, Outcome};

    fn repo() -> FakeRepository {
        let repo = FakeRepository::new();
        repo.set_cards(
            CardFilter::Active,
            vec![
                card(1, CardStatus::Active, "c1", 0, "A"),
                card(4, CardStatus::Active, "", 0, "D"),
            ],
        );
        repo.set_cards(CardFilter::Closed, vec![card(3, CardStatus::Closed, "", 0, "C")]);
        repo.set_cards(CardFilter::NotNow, vec![card(2, CardStatus::Deferred, "", 0, "B")]);
        repo
    }

    fn ids(cards: &[Card]) -> Vec<u64> {
        cards.iter().map(|c| c.id).collect()
    }

    #[tokio::test]
    async fn test_union_of_partitions() {
        let repo = repo();
        let cards = fetch_board_cards(&repo, "b1").await.ok().unwrap();
        assert_eq!(ids(&cards), vec![1, 4, 3, 2]);
    }

    #[tokio::test]
    async fn test_secondary_failures_degrade_to_empty() {
        let repo = repo();
        repo.fail_cards(CardFilter::Closed, Outcome::Error);
        repo.fail_cards(CardFilter::NotNow, Outcome::Exception);

        let cards = fetch_board_cards(&repo, "b1").await.ok().unwrap();
        assert_eq!(ids(&cards), vec![1, 4]);
    }

    #[tokio::test]
    async fn test_active_failure_fails_fetch() {
        let repo = repo();
        repo.fail_cards(CardFilter::Active, Outcome::Error);

        let result = fetch_board_cards(&repo, "b1").await;
        assert!(matches!(result, ApiResult::Error { code: 500, .. }));
    }

    #[tokio::test]
    async fn test_duplicate_ids_kept_once() {
        let repo = repo();
        repo.set_cards(CardFilter::Closed, vec![card(1, CardStatus::Closed, "", 0, "A")]);

        let cards = fetch_board_cards(&repo, "b1").await.ok().unwrap();
        assert_eq!(ids(&cards), vec![1, 4, 2]);
    }

    #[tokio::test]
    async fn test_requests_all_three_partitions() {
        let repo = repo();
        fetch_board_cards(&repo, "b1").await;
        let calls = repo.calls();
        assert!(calls.contains(&"cards b1 Active".to_string()));
        assert!(calls.contains(&"cards b1 Closed".to_string()));
        assert!(calls.contains(&"cards b1 NotNow".to_string()));
    }
}
