use crate::api::ApiResult;
use crate::board::{BoardController, BoardViewState, KanbanEvent};
use crate::models::{Board, Card, Column};
use crate::repository::KanbanRepository;
use crossterm::event::{KeyCode, KeyEvent};
use ratatui::widgets::ListState;
use std::io;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, watch};
use tracing::{info, warn};

const NOTIFICATION_TTL: Duration = Duration::from_secs(4);

#[derive(Debug, PartialEq)]
pub enum Screen {
    Boards,
    Kanban,
}

#[derive(Debug, PartialEq)]
pub enum InputMode {
    Normal,
    Dragging,
    AddColumn,
    RenameColumn,
    AddCard,
    ConfirmDelete,
    CardDetail,
}

pub struct Notification {
    pub message: String,
    pub shown_at: Instant,
}

pub struct App {
    repo: Arc<dyn KanbanRepository>,
    poll_interval: Duration,
    pub screen: Screen,
    pub boards: Vec<Board>,
    pub state: ListState,
    pub boards_error: Option<String>,
    controller: Option<BoardController>,
    events: Option<mpsc::UnboundedReceiver<KanbanEvent>>,
    view_rx: Option<watch::Receiver<BoardViewState>>,
    /// Latest snapshot of the open board, refreshed every frame.
    pub view: BoardViewState,
    pub lane: usize,
    pub card: usize,
    /// Lane and index the dragged card hovers over.
    pub drag_cursor: Option<(usize, usize)>,
    pub confirm_delete: Option<Column>,
    pub input: String,
    pub notification: Option<Notification>,
    pub card_detail: Option<Card>,
}

impl App {
    pub fn new(repo: Arc<dyn KanbanRepository>, poll_interval: Duration) -> App {
        App {
            repo,
            poll_interval,
            screen: Screen::Boards,
            boards: Vec::new(),
            state: ListState::default(),
            boards_error: None,
            controller: None,
            events: None,
            view_rx: None,
            view: BoardViewState::default(),
            lane: 0,
            card: 0,
            drag_cursor: None,
            confirm_delete: None,
            input: String::new(),
            notification: None,
            card_detail: None,
        }
    }

    pub async fn load_boards(&mut self) {
        match self.repo.boards().await {
            ApiResult::Success(boards) => {
                self.state.select(if boards.is_empty() { None } else { Some(0) });
                self.boards = boards;
                self.boards_error = None;
            }
            failed => {
                warn!(outcome = %failed, "could not load boards");
                self.boards_error = Some(failed.user_message());
            }
        }
    }

    pub fn open_board(&mut self, board_id: &str) {
        let (controller, events) = BoardController::new(board_id, self.repo.clone());
        self.view_rx = Some(controller.subscribe());
        controller.open(self.poll_interval);
        self.controller = Some(controller);
        self.events = Some(events);
        self.screen = Screen::Kanban;
        self.lane = 0;
        self.card = 0;
        self.sync();
    }

    fn close_board(&mut self) {
        if let Some(controller) = self.controller.take() {
            controller.close();
        }
        self.events = None;
        self.view_rx = None;
        self.view = BoardViewState::default();
    }

    /// Pull the latest board state and pending notifications.
    pub fn sync(&mut self) {
        if let Some(rx) = &self.view_rx {
            self.view = rx.borrow().clone();
        }
        if let Some(events) = self.events.as_mut() {
            while let Ok(event) = events.try_recv() {
                let message = match event {
                    KanbanEvent::ShowError(message) => message,
                    KanbanEvent::ColumnCreated => "Column created".to_string(),
                    KanbanEvent::ColumnUpdated => "Column renamed".to_string(),
                    KanbanEvent::ColumnDeleted => "Column deleted".to_string(),
                    KanbanEvent::CardCreated => "Card created".to_string(),
                    KanbanEvent::CardMoved => "Card moved".to_string(),
                };
                self.notification = Some(Notification {
                    message,
                    shown_at: Instant::now(),
                });
            }
        }
        if self
            .notification
            .as_ref()
            .is_some_and(|n| n.shown_at.elapsed() > NOTIFICATION_TTL)
        {
            self.notification = None;
        }
        self.clamp_selection();
    }

    fn clamp_selection(&mut self) {
        let lanes = self.view.columns.len();
        self.lane = if lanes == 0 { 0 } else { self.lane.min(lanes - 1) };
        let cards = self.current_lane().map_or(0, |c| c.cards.len());
        self.card = if cards == 0 { 0 } else { self.card.min(cards - 1) };
    }

    pub fn input_mode(&self) -> InputMode {
        if self.card_detail.is_some() {
            InputMode::CardDetail
        } else if self.confirm_delete.is_some() {
            InputMode::ConfirmDelete
        } else if self.view.show_add_column_dialog {
            InputMode::AddColumn
        } else if self.view.editing_column.is_some() {
            InputMode::RenameColumn
        } else if self.view.add_card_column.is_some() {
            InputMode::AddCard
        } else if self.view.is_dragging() {
            InputMode::Dragging
        } else {
            InputMode::Normal
        }
    }

    pub fn current_lane(&self) -> Option<&Column> {
        self.view.columns.get(self.lane)
    }

    pub fn selected_card(&self) -> Option<&Card> {
        self.current_lane().and_then(|c| c.cards.get(self.card))
    }

    fn next_board(&mut self) {
        if self.boards.is_empty() {
            return;
        }
        let i = match self.state.selected() {
            Some(i) if i + 1 < self.boards.len() => i + 1,
            _ => 0,
        };
        self.state.select(Some(i));
    }

    fn previous_board(&mut self) {
        if self.boards.is_empty() {
            return;
        }
        let i = match self.state.selected() {
            Some(0) | None => self.boards.len() - 1,
            Some(i) => i - 1,
        };
        self.state.select(Some(i));
    }

    fn hover(&mut self, lane: usize, index: usize) {
        let Some(controller) = &self.controller else {
            return;
        };
        let Some(column) = self.view.columns.get(lane) else {
            return;
        };
        let max = column.cards.len();
        let index = index.min(max);
        controller.update_drag_target(&column.id, index as i32);
        self.drag_cursor = Some((lane, index));
    }

    fn move_drag_cursor(&mut self, lane_delta: isize, index_delta: isize) {
        let (lane, index) = self.drag_cursor.unwrap_or((self.lane, self.card));
        let lanes = self.view.columns.len() as isize;
        if lanes == 0 {
            return;
        }
        let lane = (lane as isize + lane_delta).clamp(0, lanes - 1) as usize;
        let index = (index as isize + index_delta).max(0) as usize;
        self.hover(lane, index);
    }

    /// Returns `true` when the application should exit.
    pub async fn handle_input(&mut self, key: KeyEvent) -> io::Result<bool> {
        self.sync();
        let quit = match self.screen {
            Screen::Boards => self.handle_boards_input(key).await,
            Screen::Kanban => self.handle_kanban_input(key).await,
        };
        self.sync();
        Ok(quit)
    }

    async fn handle_boards_input(&mut self, key: KeyEvent) -> bool {
        match key.code {
            KeyCode::Char('q') => return true,
            KeyCode::Char('j') => self.next_board(),
            KeyCode::Char('k') => self.previous_board(),
            KeyCode::Char('r') => self.load_boards().await,
            KeyCode::Enter => {
                let selected = self
                    .state
                    .selected()
                    .and_then(|i| self.boards.get(i))
                    .map(|b| b.id.clone());
                if let Some(board_id) = selected {
                    info!(%board_id, "board selected");
                    self.open_board(&board_id);
                }
            }
            _ => {}
        }
        false
    }

    async fn handle_kanban_input(&mut self, key: KeyEvent) -> bool {
        let Some(controller) = self.controller.clone() else {
            return false;
        };

        match self.input_mode() {
            InputMode::CardDetail => {
                if matches!(key.code, KeyCode::Esc | KeyCode::Char('o') | KeyCode::Char('q')) {
                    self.card_detail = None;
                }
            }
            InputMode::ConfirmDelete => match key.code {
                KeyCode::Char('y') => {
                    if let Some(column) = self.confirm_delete.take() {
                        tokio::spawn(async move { controller.delete_column(&column.id).await });
                    }
                }
                KeyCode::Char('n') | KeyCode::Esc => self.confirm_delete = None,
                _ => {}
            },
            InputMode::AddColumn | InputMode::RenameColumn | InputMode::AddCard => {
                self.handle_dialog_input(key, controller)
            }
            InputMode::Dragging => match key.code {
                KeyCode::Char('h') | KeyCode::Left => self.move_drag_cursor(-1, 0),
                KeyCode::Char('l') | KeyCode::Right => self.move_drag_cursor(1, 0),
                KeyCode::Char('j') | KeyCode::Down => self.move_drag_cursor(0, 1),
                KeyCode::Char('k') | KeyCode::Up => self.move_drag_cursor(0, -1),
                KeyCode::Enter | KeyCode::Char(' ') => {
                    let target = self.drag_cursor.take();
                    if controller.end_drag().is_some() {
                        if let Some((lane, index)) = target {
                            self.lane = lane;
                            self.card = index;
                        }
                    }
                }
                KeyCode::Esc => {
                    self.drag_cursor = None;
                    controller.cancel_drag();
                }
                _ => {}
            },
            InputMode::Normal => match key.code {
                KeyCode::Char('q') => {
                    self.close_board();
                    return true;
                }
                KeyCode::Char('h') | KeyCode::Left => {
                    self.lane = self.lane.saturating_sub(1);
                    self.card = 0;
                }
                KeyCode::Char('l') | KeyCode::Right => {
                    self.lane += 1;
                    self.card = 0;
                }
                KeyCode::Char('j') | KeyCode::Down => self.card += 1,
                KeyCode::Char('k') | KeyCode::Up => self.card = self.card.saturating_sub(1),
                KeyCode::Char(' ') => {
                    if let Some(card) = self.selected_card().cloned() {
                        self.drag_cursor = None;
                        controller.start_drag(card);
                    }
                }
                KeyCode::Char('r') => {
                    if self.view.error.is_some() {
                        tokio::spawn(async move { controller.load_board().await });
                    } else {
                        tokio::spawn(async move { controller.refresh().await });
                    }
                }
                KeyCode::Char('c') => {
                    self.input.clear();
                    controller.show_add_column_dialog();
                }
                KeyCode::Char('e') => {
                    if let Some(column) = self.current_lane().filter(|c| !c.is_synthetic()).cloned() {
                        self.input = column.name.clone();
                        controller.show_edit_column_dialog(column);
                    }
                }
                KeyCode::Char('d') => {
                    if let Some(column) = self.current_lane().filter(|c| !c.is_synthetic()).cloned() {
                        self.confirm_delete = Some(column);
                    }
                }
                KeyCode::Char('a') => {
                    if let Some(column_id) = self.current_lane().map(|c| c.id.clone()) {
                        self.input.clear();
                        controller.show_add_card_dialog(&column_id);
                    }
                }
                KeyCode::Char('o') | KeyCode::Enter => {
                    if let Some(card_id) = self.selected_card().map(|c| c.id) {
                        match self.repo.card(card_id).await {
                            ApiResult::Success(card) => self.card_detail = Some(card),
                            failed => {
                                self.notification = Some(Notification {
                                    message: failed.user_message(),
                                    shown_at: Instant::now(),
                                })
                            }
                        }
                    }
                }
                _ => {}
            },
        }
        false
    }

    fn handle_dialog_input(&mut self, key: KeyEvent, controller: BoardController) {
        match key.code {
            KeyCode::Char(c) => self.input.push(c),
            KeyCode::Backspace => {
                self.input.pop();
            }
            KeyCode::Esc => {
                self.input.clear();
                match self.input_mode() {
                    InputMode::AddColumn => controller.hide_add_column_dialog(),
                    InputMode::RenameColumn => controller.hide_edit_column_dialog(),
                    _ => controller.hide_add_card_dialog(),
                }
            }
            KeyCode::Enter => {
                let text = self.input.trim().to_string();
                if text.is_empty() {
                    return;
                }
                self.input.clear();
                match self.input_mode() {
                    InputMode::AddColumn => {
                        tokio::spawn(async move { controller.create_column(&text).await });
                    }
                    InputMode::RenameColumn => {
                        if let Some(column) = self.view.editing_column.clone() {
                            tokio::spawn(async move {
                                controller.update_column(&column.id, &text).await
                            });
                        }
                    }
                    _ => {
                        if let Some(column_id) = self.view.add_card_column.clone() {
                            tokio::spawn(async move {
                                controller.quick_add_card(&column_id, &text).await
                            });
                        }
                    }
                }
            }
            _ => {}
        }
    }

    pub fn shutdown(&mut self) {
        self.close_board();
    }
}
