//! Board view state and the controller that owns it.
//!
//! The [`BoardController`] is the single writer of [`BoardViewState`]; the
//! front end reads snapshots through a `watch` receiver and receives
//! one-off notifications as [`KanbanEvent`]s. Remote work runs as tokio
//! tasks, each of which writes its result back through the controller.

use crate::api::ApiResult;
use crate::drag::{DragSession, MoveRequest};
use crate::fetch::fetch_board_cards;
use crate::models::{
    is_synthetic_column, Board, Card, CardStatus, Column, DONE_COLUMN_ID, NOT_NOW_COLUMN_ID,
};
use crate::parser::parse_card_input;
use crate::poll;
use crate::reconcile::reconcile;
use crate::repository::KanbanRepository;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

#[derive(Clone, Debug, Default, PartialEq)]
pub struct BoardViewState {
    pub board: Option<Board>,
    pub columns: Vec<Column>,
    pub is_loading: bool,
    pub is_refreshing: bool,
    pub error: Option<String>,
    pub drag: DragSession,
    pub show_add_column_dialog: bool,
    pub editing_column: Option<Column>,
    /// Lane id the quick-add dialog is open for.
    pub add_card_column: Option<String>,
}

impl BoardViewState {
    pub fn is_dragging(&self) -> bool {
        self.drag.is_dragging()
    }

    #[cfg(test)]
    pub fn column(&self, column_id: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.id == column_id)
    }

    #[cfg(test)]
    pub fn find_card(&self, card_id: u64) -> Option<&Card> {
        self.columns
            .iter()
            .flat_map(|c| c.cards.iter())
            .find(|c| c.id == card_id)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum KanbanEvent {
    ShowError(String),
    ColumnCreated,
    ColumnUpdated,
    ColumnDeleted,
    CardCreated,
    CardMoved,
}

/// Move a card between lanes in place, inserting it at
/// `clamp(position, 0, len)` of the target lane.
///
/// Returns `false` and leaves `columns` untouched when either the card or
/// the target lane cannot be found.
pub fn apply_move(columns: &mut [Column], card_id: u64, target_column_id: &str, position: i32) -> bool {
    let Some(target_idx) = columns.iter().position(|c| c.id == target_column_id) else {
        return false;
    };
    let Some((source_idx, card_idx)) = columns.iter().enumerate().find_map(|(i, column)| {
        column
            .cards
            .iter()
            .position(|c| c.id == card_id)
            .map(|j| (i, j))
    }) else {
        return false;
    };

    let mut card = columns[source_idx].cards.remove(card_idx);
    card.position = position;
    match target_column_id {
        DONE_COLUMN_ID => card.status = CardStatus::Closed,
        NOT_NOW_COLUMN_ID => card.status = CardStatus::Deferred,
        column_id => {
            card.column_id = column_id.to_string();
            if matches!(card.status, CardStatus::Closed | CardStatus::Deferred) {
                card.status = CardStatus::Active;
            }
        }
    }

    let cards = &mut columns[target_idx].cards;
    let index = position.clamp(0, cards.len() as i32) as usize;
    cards.insert(index, card);
    true
}

struct Inner {
    board_id: String,
    repo: Arc<dyn KanbanRepository>,
    state: watch::Sender<BoardViewState>,
    events: mpsc::UnboundedSender<KanbanEvent>,
    /// Bumped on every optimistic move so an in-flight poll can tell that
    /// its snapshot predates local changes.
    mutations: AtomicU64,
    closed: CancellationToken,
    poller: Mutex<Option<JoinHandle<()>>>,
}

#[derive(Clone)]
pub struct BoardController {
    inner: Arc<Inner>,
}

impl BoardController {
    pub fn new(
        board_id: impl Into<String>,
        repo: Arc<dyn KanbanRepository>,
    ) -> (Self, mpsc::UnboundedReceiver<KanbanEvent>) {
        let (state, _) = watch::channel(BoardViewState::default());
        let (events, receiver) = mpsc::unbounded_channel();
        let controller = BoardController {
            inner: Arc::new(Inner {
                board_id: board_id.into(),
                repo,
                state,
                events,
                mutations: AtomicU64::new(0),
                closed: CancellationToken::new(),
                poller: Mutex::new(None),
            }),
        };
        (controller, receiver)
    }

    pub fn board_id(&self) -> &str {
        &self.inner.board_id
    }

    pub fn subscribe(&self) -> watch::Receiver<BoardViewState> {
        self.inner.state.subscribe()
    }

    #[cfg(test)]
    pub fn snapshot(&self) -> BoardViewState {
        self.inner.state.borrow().clone()
    }

    pub fn is_dragging(&self) -> bool {
        self.inner.state.borrow().is_dragging()
    }

    pub fn is_closed(&self) -> bool {
        self.inner.closed.is_cancelled()
    }

    /// Load the board and start polling every `poll_interval`.
    pub fn open(&self, poll_interval: Duration) {
        info!(board_id = %self.inner.board_id, "opening board");
        let loader = self.clone();
        tokio::spawn(async move { loader.load_board().await });

        let handle = tokio::spawn(poll::run(
            self.clone(),
            poll_interval,
            self.inner.closed.child_token(),
        ));
        if let Ok(mut poller) = self.inner.poller.lock() {
            *poller = Some(handle);
        }
    }

    /// Tear down: stop polling and drop any result that arrives later.
    pub fn close(&self) -> Option<JoinHandle<()>> {
        info!(board_id = %self.inner.board_id, "closing board");
        self.inner.closed.cancel();
        self.inner.poller.lock().ok().and_then(|mut p| p.take())
    }

    fn update(&self, modify: impl FnOnce(&mut BoardViewState)) -> bool {
        if self.is_closed() {
            debug!("board closed, discarding state update");
            return false;
        }
        self.inner.state.send_modify(modify);
        true
    }

    fn emit(&self, event: KanbanEvent) {
        if self.is_closed() {
            return;
        }
        // The receiver goes away with the screen; nothing to deliver then.
        let _ = self.inner.events.send(event);
    }

    /// Fetch columns and all card partitions, then reconcile them into lanes.
    async fn load_lanes(&self) -> ApiResult<Vec<Column>> {
        let board_id = self.inner.board_id.as_str();
        let (columns, cards) = tokio::join!(
            self.inner.repo.columns(board_id),
            fetch_board_cards(self.inner.repo.as_ref(), board_id),
        );

        let columns = match columns {
            ApiResult::Success(columns) => columns,
            ApiResult::Error { code, message } => {
                return ApiResult::error(code, format!("Failed to load columns: {}", message))
            }
            ApiResult::Exception(fault) => return ApiResult::Exception(fault),
        };
        let cards = match cards {
            ApiResult::Success(cards) => cards,
            ApiResult::Error { code, message } => {
                return ApiResult::error(code, format!("Failed to load cards: {}", message))
            }
            ApiResult::Exception(fault) => return ApiResult::Exception(fault),
        };
        ApiResult::Success(reconcile(columns, cards, board_id))
    }

    pub async fn load_board(&self) {
        self.update(|s| {
            s.is_loading = true;
            s.error = None;
        });

        let (board, lanes) = tokio::join!(
            self.inner.repo.board(&self.inner.board_id),
            self.load_lanes()
        );

        match (board, lanes) {
            (ApiResult::Success(board), ApiResult::Success(lanes)) => {
                info!(board = %board.name, lanes = lanes.len(), "board loaded");
                self.update(|s| {
                    s.is_loading = false;
                    s.board = Some(board);
                    s.columns = lanes;
                });
            }
            (board, lanes) => {
                let message = match (&board, &lanes) {
                    (ApiResult::Error { message, .. }, _) => {
                        format!("Failed to load board: {}", message)
                    }
                    (_, ApiResult::Error { message, .. }) => message.clone(),
                    _ => "Network error".to_string(),
                };
                warn!(board = %board, lanes = %lanes, "board load failed");
                self.update(|s| {
                    s.is_loading = false;
                    s.error = Some(message);
                });
            }
        }
    }

    /// Replace the lanes with a fresh snapshot from the server.
    async fn reload_lanes(&self) -> ApiResult<()> {
        match self.load_lanes().await {
            ApiResult::Success(lanes) => {
                self.update(|s| {
                    s.columns = lanes;
                    s.error = None;
                });
                ApiResult::Success(())
            }
            failed => failed.map(|_| ()),
        }
    }

    pub async fn refresh(&self) {
        self.update(|s| s.is_refreshing = true);
        let result = self.reload_lanes().await;
        self.update(|s| s.is_refreshing = false);
        if !result.is_success() {
            self.emit(KanbanEvent::ShowError(result.user_message()));
        }
    }

    /// Background refresh: silent, skipped while dragging, and dropped if a
    /// drag started or a move was applied while the fetch was in flight.
    /// Returns whether new lanes were applied.
    pub async fn silent_refresh(&self) -> bool {
        if self.is_dragging() {
            debug!("drag in progress, skipping refresh");
            return false;
        }
        let generation = self.inner.mutations.load(Ordering::SeqCst);

        let lanes = match self.load_lanes().await {
            ApiResult::Success(lanes) => lanes,
            failed => {
                debug!(outcome = %failed, "background refresh failed");
                return false;
            }
        };

        let mut applied = false;
        self.update(|s| {
            if s.is_dragging() || self.inner.mutations.load(Ordering::SeqCst) != generation {
                return;
            }
            s.columns = lanes;
            s.error = None;
            applied = true;
        });
        if !applied {
            debug!("local changes happened during refresh, discarding it");
        }
        applied
    }

    pub fn start_drag(&self, card: Card) {
        self.update(|s| {
            s.drag.pick_up(card);
        });
    }

    pub fn update_drag_target(&self, column_id: &str, position: i32) {
        self.update(|s| {
            s.drag.hover(column_id, position);
        });
    }

    pub fn cancel_drag(&self) {
        self.update(|s| s.drag.cancel());
    }

    /// Drop the dragged card. When it landed somewhere new the move is
    /// applied locally right away and committed in a spawned task, whose
    /// handle is returned.
    pub fn end_drag(&self) -> Option<JoinHandle<()>> {
        let mut request = None;
        let mut moved = false;
        // Drop, local move and generation bump form one critical section so
        // a refresh applying concurrently sees either none or all of them.
        self.update(|s| {
            request = s.drag.drop();
            if let Some(request) = &request {
                moved = apply_move(
                    &mut s.columns,
                    request.card_id,
                    &request.column_id,
                    request.position,
                );
                if moved {
                    self.inner.mutations.fetch_add(1, Ordering::SeqCst);
                }
            }
        });
        let request = request?;

        if !moved {
            warn!(card_id = request.card_id, column_id = %request.column_id, "drop target not on board");
            self.emit(KanbanEvent::ShowError("Failed to move card".to_string()));
            return None;
        }

        let committer = self.clone();
        Some(tokio::spawn(async move {
            committer.commit_move(request).await
        }))
    }

    async fn commit_move(&self, request: MoveRequest) {
        let repo = &self.inner.repo;
        let mut result = repo.move_card(request.card_id, &request.column_id).await;
        if result.is_success() && !is_synthetic_column(&request.column_id) && request.position > 0 {
            result = repo
                .set_card_position(request.card_id, &request.column_id, request.position)
                .await;
        }

        match result {
            ApiResult::Success(()) => {
                info!(card_id = request.card_id, column_id = %request.column_id, "card moved");
                self.emit(KanbanEvent::CardMoved);
            }
            ApiResult::Error { .. } | ApiResult::Exception(_) => {
                warn!(card_id = request.card_id, outcome = %result, "move failed, reloading board");
                let reload = self.reload_lanes().await;
                if !reload.is_success() {
                    let message = reload.user_message();
                    self.update(|s| s.error = Some(message));
                }
                self.emit(KanbanEvent::ShowError("Failed to move card".to_string()));
            }
        }
    }

    pub fn show_add_column_dialog(&self) {
        self.update(|s| s.show_add_column_dialog = true);
    }

    pub fn hide_add_column_dialog(&self) {
        self.update(|s| s.show_add_column_dialog = false);
    }

    pub async fn create_column(&self, name: &str) {
        let position = {
            let state = self.inner.state.borrow();
            state
                .columns
                .iter()
                .filter(|c| !c.is_synthetic())
                .map(|c| c.position)
                .max()
                .map_or(0, |p| p + 1)
        };
        self.update(|s| s.is_loading = true);

        match self
            .inner
            .repo
            .create_column(&self.inner.board_id, name, position)
            .await
        {
            ApiResult::Success(column) => {
                self.update(|s| {
                    s.is_loading = false;
                    s.show_add_column_dialog = false;
                    let done = s
                        .columns
                        .iter()
                        .position(|c| c.id == DONE_COLUMN_ID)
                        .unwrap_or(s.columns.len());
                    s.columns.insert(done, column);
                });
                self.emit(KanbanEvent::ColumnCreated);
            }
            failed => {
                self.update(|s| s.is_loading = false);
                self.emit(KanbanEvent::ShowError(failure_text(&failed, "Failed to create column")));
            }
        }
    }

    pub fn show_edit_column_dialog(&self, column: Column) {
        self.update(|s| s.editing_column = Some(column));
    }

    pub fn hide_edit_column_dialog(&self) {
        self.update(|s| s.editing_column = None);
    }

    pub async fn update_column(&self, column_id: &str, name: &str) {
        if is_synthetic_column(column_id) {
            self.emit(KanbanEvent::ShowError("This column cannot be renamed".to_string()));
            return;
        }
        self.update(|s| s.is_loading = true);

        match self
            .inner
            .repo
            .update_column(&self.inner.board_id, column_id, name)
            .await
        {
            ApiResult::Success(updated) => {
                self.update(|s| {
                    s.is_loading = false;
                    s.editing_column = None;
                    if let Some(column) = s.columns.iter_mut().find(|c| c.id == column_id) {
                        column.name = updated.name;
                    }
                });
                self.emit(KanbanEvent::ColumnUpdated);
            }
            failed => {
                self.update(|s| s.is_loading = false);
                self.emit(KanbanEvent::ShowError(failure_text(&failed, "Failed to update column")));
            }
        }
    }

    pub async fn delete_column(&self, column_id: &str) {
        if is_synthetic_column(column_id) {
            self.emit(KanbanEvent::ShowError("This column cannot be deleted".to_string()));
            return;
        }
        self.update(|s| s.is_loading = true);

        match self
            .inner
            .repo
            .delete_column(&self.inner.board_id, column_id)
            .await
        {
            ApiResult::Success(()) => {
                self.update(|s| {
                    s.is_loading = false;
                    s.columns.retain(|c| c.id != column_id);
                });
                self.emit(KanbanEvent::ColumnDeleted);
                // The server re-homes the deleted column's cards.
                let reload = self.reload_lanes().await;
                if !reload.is_success() {
                    warn!(column_id, outcome = %reload, "reload after column delete failed");
                    self.emit(KanbanEvent::ShowError(reload.user_message()));
                }
            }
            failed => {
                self.update(|s| s.is_loading = false);
                self.emit(KanbanEvent::ShowError(failure_text(&failed, "Failed to delete column")));
            }
        }
    }

    pub fn show_add_card_dialog(&self, column_id: &str) {
        let column_id = column_id.to_string();
        self.update(|s| s.add_card_column = Some(column_id));
    }

    pub fn hide_add_card_dialog(&self) {
        self.update(|s| s.add_card_column = None);
    }

    /// Create a card titled `title` in a real column or triage. Returns the
    /// created card.
    pub async fn create_card(&self, column_id: &str, title: &str) -> Option<Card> {
        if column_id == DONE_COLUMN_ID || column_id == NOT_NOW_COLUMN_ID {
            self.emit(KanbanEvent::ShowError(
                "Cards can only be added to triage or a column".to_string(),
            ));
            return None;
        }
        self.update(|s| s.is_loading = true);

        match self
            .inner
            .repo
            .create_card(&self.inner.board_id, column_id, title)
            .await
        {
            ApiResult::Success(card) => {
                let created = card.clone();
                self.update(|s| {
                    s.is_loading = false;
                    s.add_card_column = None;
                    if let Some(column) = s.columns.iter_mut().find(|c| c.id == column_id) {
                        column.cards.push(card);
                    }
                });
                self.emit(KanbanEvent::CardCreated);
                Some(created)
            }
            failed => {
                self.update(|s| s.is_loading = false);
                self.emit(KanbanEvent::ShowError(failure_text(&failed, "Failed to create card")));
                None
            }
        }
    }

    /// Quick-add: parse `#tags` and the `!` golden marker out of `input`,
    /// create the card, then apply the extras.
    pub async fn quick_add_card(&self, column_id: &str, input: &str) {
        let parsed = parse_card_input(input);
        if parsed.title.is_empty() {
            self.emit(KanbanEvent::ShowError("Card title cannot be empty".to_string()));
            return;
        }

        let Some(card) = self.create_card(column_id, &parsed.title).await else {
            return;
        };
        if !parsed.golden && parsed.tags.is_empty() {
            return;
        }

        let repo = &self.inner.repo;
        let golden_failed = parsed.golden && !repo.set_golden(card.id, true).await.is_success();
        let mut tags_failed = false;
        for tag in &parsed.tags {
            tags_failed |= !repo.add_tag(card.id, tag).await.is_success();
        }
        let problem = match (golden_failed, tags_failed) {
            (true, true) => Some("it could not be marked golden or tagged"),
            (true, false) => Some("it could not be marked golden"),
            (false, true) => Some("some tags could not be applied"),
            (false, false) => None,
        };
        if let Some(problem) = problem {
            self.emit(KanbanEvent::ShowError(format!("Card created, but {}", problem)));
        }

        if let ApiResult::Success(fresh) = repo.card(card.id).await {
            self.update(|s| {
                for column in s.columns.iter_mut() {
                    if let Some(existing) = column.cards.iter_mut().find(|c| c.id == fresh.id) {
                        *existing = fresh;
                        break;
                    }
                }
            });
        }
    }
}

fn failure_text<T>(result: &ApiResult<T>, action: &str) -> String {
    match result {
        ApiResult::Exception(_) => "Network error".to_string(),
        _ => action.to_string(),
    }
}
