//! Scripted in-memory repository for controller, fetcher and poll tests.

use crate::api::{ApiResult, CardFilter};
use crate::error::ApiFault;
use crate::models::{fixtures, Board, Card, Column};
use crate::repository::KanbanRepository;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::Notify;

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Outcome {
    Ok,
    Error,
    Exception,
}

impl Outcome {
    fn result<T>(self, data: impl FnOnce() -> T) -> ApiResult<T> {
        match self {
            Outcome::Ok => ApiResult::Success(data()),
            Outcome::Error => ApiResult::error(500, "Internal Server Error"),
            Outcome::Exception => ApiResult::Exception(ApiFault::InvalidUrl("offline".into())),
        }
    }
}

struct Script {
    board: Board,
    board_outcome: Outcome,
    columns: Vec<Column>,
    columns_outcome: Outcome,
    cards: HashMap<CardFilter, Vec<Card>>,
    card_outcomes: HashMap<CardFilter, Outcome>,
    move_outcome: Outcome,
    position_outcome: Outcome,
    column_outcome: Outcome,
    card_create_outcome: Outcome,
    tag_outcome: Outcome,
    next_id: u64,
    calls: Vec<String>,
}

pub struct FakeRepository {
    script: Mutex<Script>,
    move_gate: Mutex<Option<Arc<Notify>>>,
    columns_gate: Mutex<Option<Arc<Notify>>>,
}

impl FakeRepository {
    pub fn new() -> Self {
        FakeRepository {
            script: Mutex::new(Script {
                board: fixtures::board("b1", "Roadmap"),
                board_outcome: Outcome::Ok,
                columns: Vec::new(),
                columns_outcome: Outcome::Ok,
                cards: HashMap::new(),
                card_outcomes: HashMap::new(),
                move_outcome: Outcome::Ok,
                position_outcome: Outcome::Ok,
                column_outcome: Outcome::Ok,
                card_create_outcome: Outcome::Ok,
                tag_outcome: Outcome::Ok,
                next_id: 100,
                calls: Vec::new(),
            }),
            move_gate: Mutex::new(None),
            columns_gate: Mutex::new(None),
        }
    }

    fn with<R>(&self, f: impl FnOnce(&mut Script) -> R) -> R {
        f(&mut self.script.lock().unwrap())
    }

    fn record(&self, call: String) {
        self.with(|s| s.calls.push(call));
    }

    pub fn set_columns(&self, columns: Vec<Column>) {
        self.with(|s| s.columns = columns);
    }

    pub fn set_cards(&self, filter: CardFilter, cards: Vec<Card>) {
        self.with(|s| {
            s.cards.insert(filter, cards);
        });
    }

    pub fn fail_board(&self, outcome: Outcome) {
        self.with(|s| s.board_outcome = outcome);
    }

    pub fn fail_columns(&self, outcome: Outcome) {
        self.with(|s| s.columns_outcome = outcome);
    }

    pub fn fail_cards(&self, filter: CardFilter, outcome: Outcome) {
        self.with(|s| {
            s.card_outcomes.insert(filter, outcome);
        });
    }

    pub fn fail_move(&self, outcome: Outcome) {
        self.with(|s| s.move_outcome = outcome);
    }

    pub fn fail_position(&self, outcome: Outcome) {
        self.with(|s| s.position_outcome = outcome);
    }

    pub fn fail_column_ops(&self, outcome: Outcome) {
        self.with(|s| s.column_outcome = outcome);
    }

    pub fn fail_card_create(&self, outcome: Outcome) {
        self.with(|s| s.card_create_outcome = outcome);
    }

    pub fn fail_tags(&self, outcome: Outcome) {
        self.with(|s| s.tag_outcome = outcome);
    }

    /// Hold every `move_card` call until the returned gate is notified.
    pub fn gate_moves(&self) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        *self.move_gate.lock().unwrap() = Some(gate.clone());
        gate
    }

    /// Hold every `columns` call until the returned gate is notified. The
    /// columns are read after the gate opens.
    pub fn gate_columns(&self) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        *self.columns_gate.lock().unwrap() = Some(gate.clone());
        gate
    }

    pub fn calls(&self) -> Vec<String> {
        self.with(|s| s.calls.clone())
    }

    pub fn count_calls(&self, prefix: &str) -> usize {
        self.with(|s| s.calls.iter().filter(|c| c.starts_with(prefix)).count())
    }
}

#[async_trait]
impl KanbanRepository for FakeRepository {
    async fn boards(&self) -> ApiResult<Vec<Board>> {
        self.record("boards".to_string());
        self.with(|s| s.board_outcome.result(|| vec![s.board.clone()]))
    }

    async fn board(&self, board_id: &str) -> ApiResult<Board> {
        self.record(format!("board {}", board_id));
        self.with(|s| s.board_outcome.result(|| s.board.clone()))
    }

    async fn columns(&self, board_id: &str) -> ApiResult<Vec<Column>> {
        self.record(format!("columns {}", board_id));
        let gate = self.columns_gate.lock().unwrap().clone();
        if let Some(gate) = gate {
            gate.notified().await;
        }
        self.with(|s| s.columns_outcome.result(|| s.columns.clone()))
    }

    async fn cards(&self, board_id: &str, filter: CardFilter) -> ApiResult<Vec<Card>> {
        self.record(format!("cards {} {:?}", board_id, filter));
        self.with(|s| {
            let outcome = s.card_outcomes.get(&filter).copied().unwrap_or(Outcome::Ok);
            outcome.result(|| s.cards.get(&filter).cloned().unwrap_or_default())
        })
    }

    async fn card(&self, card_id: u64) -> ApiResult<Card> {
        self.record(format!("card {}", card_id));
        self.with(|s| {
            match s.cards.values().flatten().find(|c| c.id == card_id) {
                Some(card) => ApiResult::Success(card.clone()),
                None => ApiResult::error(404, "Not Found"),
            }
        })
    }

    async fn move_card(&self, card_id: u64, target_column_id: &str) -> ApiResult<()> {
        self.record(format!("move_card {} {}", card_id, target_column_id));
        let gate = self.move_gate.lock().unwrap().clone();
        if let Some(gate) = gate {
            gate.notified().await;
        }
        self.with(|s| s.move_outcome.result(|| ()))
    }

    async fn set_card_position(
        &self,
        card_id: u64,
        column_id: &str,
        position: i32,
    ) -> ApiResult<()> {
        self.record(format!("set_card_position {} {} {}", card_id, column_id, position));
        self.with(|s| s.position_outcome.result(|| ()))
    }

    async fn create_card(&self, board_id: &str, column_id: &str, title: &str) -> ApiResult<Card> {
        self.record(format!("create_card {} {} {}", board_id, column_id, title));
        self.with(|s| {
            s.next_id += 1;
            let card = fixtures::card(
                s.next_id,
                crate::models::CardStatus::Active,
                column_id,
                0,
                title,
            );
            let result = s.card_create_outcome.result(|| card.clone());
            if result.is_success() {
                s.cards.entry(CardFilter::Active).or_default().push(card);
            }
            result
        })
    }

    async fn set_golden(&self, card_id: u64, golden: bool) -> ApiResult<()> {
        self.record(format!("set_golden {} {}", card_id, golden));
        self.with(|s| {
            let result = s.tag_outcome.result(|| ());
            if result.is_success() {
                for card in s.cards.values_mut().flatten().filter(|c| c.id == card_id) {
                    card.golden = golden;
                }
            }
            result
        })
    }

    async fn add_tag(&self, card_id: u64, tag_title: &str) -> ApiResult<()> {
        self.record(format!("add_tag {} {}", card_id, tag_title));
        self.with(|s| s.tag_outcome.result(|| ()))
    }

    async fn create_column(&self, board_id: &str, name: &str, position: i32) -> ApiResult<Column> {
        self.record(format!("create_column {} {} {}", board_id, name, position));
        self.with(|s| {
            s.next_id += 1;
            let column = fixtures::column(&format!("new{}", s.next_id), position, name);
            let result = s.column_outcome.result(|| column.clone());
            if result.is_success() {
                s.columns.push(column);
            }
            result
        })
    }

    async fn update_column(
        &self,
        board_id: &str,
        column_id: &str,
        name: &str,
    ) -> ApiResult<Column> {
        self.record(format!("update_column {} {} {}", board_id, column_id, name));
        self.with(|s| {
            let outcome = s.column_outcome;
            match s.columns.iter_mut().find(|c| c.id == column_id) {
                Some(column) => outcome.result(|| {
                    column.name = name.to_string();
                    column.clone()
                }),
                None => ApiResult::error(404, "Not Found"),
            }
        })
    }

    async fn delete_column(&self, board_id: &str, column_id: &str) -> ApiResult<()> {
        self.record(format!("delete_column {} {}", board_id, column_id));
        self.with(|s| {
            let result = s.column_outcome.result(|| ());
            if result.is_success() {
                s.columns.retain(|c| c.id != column_id);
            }
            result
        })
    }
}
