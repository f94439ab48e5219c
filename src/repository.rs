//! Domain-level access to a Fizzy account.
//!
//! [`KanbanRepository`] exposes one call per server operation and speaks in
//! domain models; [`ApiRepository`] implements it over [`FizzyClient`].

use crate::api::{ApiResult, CardFilter, FizzyClient};
use crate::dto::{
    CardData, ColumnData, ColumnRequest, CreateCardRequest, UpdateCardData, UpdateCardRequest,
};
use crate::models::{
    is_synthetic_column, Board, Card, Column, DONE_COLUMN_ID, NOT_NOW_COLUMN_ID, TRIAGE_COLUMN_ID,
};
use async_trait::async_trait;
use tracing::{debug, warn};

#[async_trait]
pub trait KanbanRepository: Send + Sync {
    async fn boards(&self) -> ApiResult<Vec<Board>>;

    async fn board(&self, board_id: &str) -> ApiResult<Board>;

    /// Real columns of a board, ascending by position.
    async fn columns(&self, board_id: &str) -> ApiResult<Vec<Column>>;

    async fn cards(&self, board_id: &str, filter: CardFilter) -> ApiResult<Vec<Card>>;

    async fn card(&self, card_id: u64) -> ApiResult<Card>;

    /// Move a card into the lane `target_column_id`, which may be one of the
    /// synthetic lane ids.
    async fn move_card(&self, card_id: u64, target_column_id: &str) -> ApiResult<()>;

    async fn set_card_position(&self, card_id: u64, column_id: &str, position: i32)
        -> ApiResult<()>;

    async fn create_card(&self, board_id: &str, column_id: &str, title: &str) -> ApiResult<Card>;

    async fn set_golden(&self, card_id: u64, golden: bool) -> ApiResult<()>;

    async fn add_tag(&self, card_id: u64, tag_title: &str) -> ApiResult<()>;

    async fn create_column(&self, board_id: &str, name: &str, position: i32) -> ApiResult<Column>;

    async fn update_column(&self, board_id: &str, column_id: &str, name: &str)
        -> ApiResult<Column>;

    async fn delete_column(&self, board_id: &str, column_id: &str) -> ApiResult<()>;
}

pub struct ApiRepository {
    client: FizzyClient,
}

impl ApiRepository {
    pub fn new(client: FizzyClient) -> Self {
        ApiRepository { client }
    }

    async fn find_column(&self, board_id: &str, column_id: &str, action: &str) -> ApiResult<Column> {
        match self.columns(board_id).await {
            ApiResult::Success(columns) => match columns.into_iter().find(|c| c.id == column_id) {
                Some(column) => ApiResult::Success(column),
                None => ApiResult::error(0, format!("Column {} but not found in list", action)),
            },
            ApiResult::Error { .. } | ApiResult::Exception(_) => {
                ApiResult::error(0, format!("Column {} but failed to refresh list", action))
            }
        }
    }
}

#[async_trait]
impl KanbanRepository for ApiRepository {
    async fn boards(&self) -> ApiResult<Vec<Board>> {
        self.client
            .boards()
            .await
            .map(|boards| boards.into_iter().map(Board::from).collect())
    }

    async fn board(&self, board_id: &str) -> ApiResult<Board> {
        self.client.board(board_id).await.map(Board::from)
    }

    async fn columns(&self, board_id: &str) -> ApiResult<Vec<Column>> {
        self.client.columns(board_id).await.map(|columns| {
            let mut columns: Vec<Column> = columns.into_iter().map(Column::from).collect();
            columns.sort_by_key(|c| c.position);
            columns
        })
    }

    async fn cards(&self, board_id: &str, filter: CardFilter) -> ApiResult<Vec<Card>> {
        self.client.cards(board_id, filter).await.map(|cards| {
            cards
                .into_iter()
                .filter(|dto| {
                    // Every card URL needs the number.
                    if dto.number == 0 {
                        warn!(board_id, card = %dto.id, "dropping card without a number");
                    }
                    dto.number != 0
                })
                .map(Card::from)
                .collect()
        })
    }

    async fn card(&self, card_id: u64) -> ApiResult<Card> {
        self.client.card(card_id).await.map(Card::from)
    }

    async fn move_card(&self, card_id: u64, target_column_id: &str) -> ApiResult<()> {
        debug!(card_id, target_column_id, "moving card");
        match target_column_id {
            DONE_COLUMN_ID => self.client.close_card(card_id).await,
            NOT_NOW_COLUMN_ID => self.client.not_now_card(card_id).await,
            TRIAGE_COLUMN_ID => self.client.untriage_card(card_id).await,
            column_id => self.client.triage_card(card_id, column_id).await,
        }
    }

    async fn set_card_position(
        &self,
        card_id: u64,
        column_id: &str,
        position: i32,
    ) -> ApiResult<()> {
        let body = UpdateCardRequest {
            card: UpdateCardData {
                column_id: Some(column_id),
                position: Some(position),
                ..Default::default()
            },
        };
        self.client.update_card(card_id, &body).await
    }

    async fn create_card(&self, board_id: &str, column_id: &str, title: &str) -> ApiResult<Card> {
        let body = CreateCardRequest {
            card: CardData {
                title,
                description: None,
                column_id: if is_synthetic_column(column_id) {
                    None
                } else {
                    Some(column_id)
                },
            },
        };
        let number = match self.client.create_card(board_id, &body).await {
            ApiResult::Success(id) => id,
            ApiResult::Error { code, message } => return ApiResult::Error { code, message },
            ApiResult::Exception(fault) => return ApiResult::Exception(fault),
        };
        match number.parse::<u64>() {
            Ok(number) => self.card(number).await,
            Err(_) => ApiResult::error(0, "Card created but no number in response"),
        }
    }

    async fn set_golden(&self, card_id: u64, golden: bool) -> ApiResult<()> {
        self.client.set_golden(card_id, golden).await
    }

    async fn add_tag(&self, card_id: u64, tag_title: &str) -> ApiResult<()> {
        self.client.add_tagging(card_id, tag_title).await
    }

    async fn create_column(&self, board_id: &str, name: &str, position: i32) -> ApiResult<Column> {
        let body = ColumnRequest {
            column: ColumnData {
                name: Some(name),
                position: Some(position),
            },
        };
        match self.client.create_column(board_id, &body).await {
            ApiResult::Success(column_id) => self.find_column(board_id, &column_id, "created").await,
            ApiResult::Error { code, message } => ApiResult::Error { code, message },
            ApiResult::Exception(fault) => ApiResult::Exception(fault),
        }
    }

    async fn update_column(
        &self,
        board_id: &str,
        column_id: &str,
        name: &str,
    ) -> ApiResult<Column> {
        let body = ColumnRequest {
            column: ColumnData {
                name: Some(name),
                ..Default::default()
            },
        };
        match self.client.update_column(board_id, column_id, &body).await {
            ApiResult::Success(()) => self.find_column(board_id, column_id, "updated").await,
            ApiResult::Error { code, message } => ApiResult::Error { code, message },
            ApiResult::Exception(fault) => ApiResult::Exception(fault),
        }
    }

    async fn delete_column(&self, board_id: &str, column_id: &str) -> ApiResult<()> {
        self.client.delete_column(board_id, column_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn repository(server: &MockServer) -> ApiRepository {
        ApiRepository::new(FizzyClient::new(&server.uri(), "secret", Some("1")).unwrap())
    }

    #[tokio::test]
    async fn test_columns_sorted_by_position() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/1/boards/b1/columns.json"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                { "id": "c2", "name": "Doing", "position": 2 },
                { "id": "c1", "name": "To Do", "position": 1 }
            ])))
            .mount(&server)
            .await;

        let columns = repository(&server).await.columns("b1").await.ok().unwrap();
        let ids: Vec<_> = columns.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, vec!["c1", "c2"]);
    }

    #[tokio::test]
    async fn test_cards_without_number_are_dropped() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/1/cards.json"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                { "id": "a", "title": "No number" },
                { "id": "b", "title": "Also none" },
                { "id": "c", "number": 7, "title": "Numbered" }
            ])))
            .mount(&server)
            .await;

        let cards = repository(&server)
            .await
            .cards("b1", CardFilter::Active)
            .await
            .ok()
            .unwrap();
        assert_eq!(cards.len(), 1);
        assert_eq!(cards[0].id, 7);
    }

    #[tokio::test]
    async fn test_move_to_synthetic_lanes_uses_card_actions() {
        let server = MockServer::start().await;
        for (verb, route) in [
            ("POST", "/1/cards/3/closure"),
            ("POST", "/1/cards/3/not_now"),
            ("DELETE", "/1/cards/3/triage"),
        ] {
            Mock::given(method(verb))
                .and(path(route))
                .respond_with(ResponseTemplate::new(204))
                .expect(1)
                .mount(&server)
                .await;
        }

        let repo = repository(&server).await;
        assert!(repo.move_card(3, DONE_COLUMN_ID).await.is_success());
        assert!(repo.move_card(3, NOT_NOW_COLUMN_ID).await.is_success());
        assert!(repo.move_card(3, TRIAGE_COLUMN_ID).await.is_success());
    }

    #[tokio::test]
    async fn test_set_card_position_puts_wrapped_body() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path("/1/cards/3"))
            .and(body_json(json!({ "card": { "column_id": "c2", "position": 4 } })))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;

        let repo = repository(&server).await;
        assert!(repo.set_card_position(3, "c2", 4).await.is_success());
    }

    #[tokio::test]
    async fn test_create_card_refetches_by_number() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/1/boards/b1/cards.json"))
            .and(body_json(json!({ "card": { "title": "Triage me" } })))
            .respond_with(ResponseTemplate::new(201).insert_header("Location", "/1/cards/12.json"))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/1/cards/12.json"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "abc", "number": 12, "title": "Triage me", "board": { "id": "b1" }
            })))
            .mount(&server)
            .await;

        let card = repository(&server)
            .await
            .create_card("b1", TRIAGE_COLUMN_ID, "Triage me")
            .await
            .ok()
            .unwrap();
        assert_eq!(card.id, 12);
        assert_eq!(card.column_id, "");
    }

    #[tokio::test]
    async fn test_update_column_missing_after_refresh() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path("/1/boards/b1/columns/c9"))
            .respond_with(ResponseTemplate::new(204))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/1/boards/b1/columns.json"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
            .mount(&server)
            .await;

        let result = repository(&server)
            .await
            .update_column("b1", "c9", "Renamed")
            .await;
        assert_eq!(result.user_message(), "Column updated but not found in list");
    }
}
