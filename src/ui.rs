use crate::app::{App, InputMode, Screen};
use crate::models::{Card, CardStatus, Column};
use ansi_parser::{AnsiParser, Output};
use crossterm::event::{self, Event as CEvent};
use ratatui::{
    backend::Backend,
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span, Text},
    widgets::{Block, Borders, Clear, List, ListItem, ListState, Paragraph, Wrap},
    Frame, Terminal,
};
use std::io;
use std::time::Duration;

/// Lanes shown side by side; the window follows the selected lane.
const VISIBLE_LANES: usize = 4;

fn centered_rect_absolute(width: u16, height: u16, r: Rect) -> Rect {
    let popup_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints(
            [
                Constraint::Length((r.height.saturating_sub(height)) / 2),
                Constraint::Length(height),
                Constraint::Length((r.height.saturating_sub(height) + 1) / 2),
            ]
            .as_ref(),
        )
        .split(r);

    Layout::default()
        .direction(Direction::Horizontal)
        .constraints(
            [
                Constraint::Length((r.width.saturating_sub(width)) / 2),
                Constraint::Length(width),
                Constraint::Length((r.width.saturating_sub(width) + 1) / 2),
            ]
            .as_ref(),
        )
        .split(popup_layout[1])[1]
}

pub fn ansi_to_text(ansi_str: &str) -> Vec<Line<'static>> {
    let mut lines = Vec::new();
    for ansi_line in ansi_str.lines() {
        let mut spans = Vec::new();
        for item in ansi_line.ansi_parse() {
            if let Output::TextBlock(text) = item {
                spans.push(Span::raw(text.to_string()));
            }
        }
        lines.push(Line::from(spans));
    }
    lines
}

fn key_hint(key: &'static str, action: &'static str) -> [Span<'static>; 2] {
    [
        Span::styled(key, Style::default().fg(Color::Red)),
        Span::raw(action),
    ]
}

fn get_legend(screen: &Screen, input_mode: &InputMode) -> Text<'static> {
    let hints: Vec<[Span<'static>; 2]> = match (screen, input_mode) {
        (Screen::Boards, _) => vec![
            key_hint(" q ", ": Quit "),
            key_hint(" j/k ", ": Select "),
            key_hint(" Enter ", ": Open Board "),
            key_hint(" r ", ": Reload "),
        ],
        (Screen::Kanban, InputMode::Normal) => vec![
            key_hint(" q ", ": Quit "),
            key_hint(" h/l ", ": Lane "),
            key_hint(" j/k ", ": Card "),
            key_hint(" Space ", ": Pick Up "),
            key_hint(" o ", ": Details "),
            key_hint(" a ", ": Add Card "),
            key_hint(" c ", ": Add Column "),
            key_hint(" e ", ": Rename "),
            key_hint(" d ", ": Delete "),
            key_hint(" r ", ": Refresh "),
        ],
        (Screen::Kanban, InputMode::Dragging) => vec![
            key_hint(" h/l/j/k ", ": Move Target "),
            key_hint(" Enter ", ": Drop "),
            key_hint(" Esc ", ": Cancel "),
        ],
        (Screen::Kanban, InputMode::ConfirmDelete) => vec![
            key_hint(" y ", ": Delete "),
            key_hint(" n ", ": Keep "),
        ],
        (Screen::Kanban, InputMode::CardDetail) => vec![key_hint(" Esc ", ": Close ")],
        (Screen::Kanban, _) => vec![
            key_hint(" Enter ", ": Submit "),
            key_hint(" Esc ", ": Cancel "),
        ],
    };
    Text::from(Line::from(hints.into_iter().flatten().collect::<Vec<_>>()))
}

fn calculate_wrapped_lines(text: &str, max_width: u16) -> usize {
    let max_width = max_width.max(1);
    let mut line_count = 0;
    for line in text.lines() {
        let line_width = line.chars().count() as u16;
        line_count += line_width.div_ceil(max_width).max(1) as usize;
    }
    line_count
}

/// First lane index of the visible window, keeping `selected` in view.
fn lane_window(selected: usize, total: usize) -> usize {
    if total <= VISIBLE_LANES {
        return 0;
    }
    selected
        .saturating_sub(VISIBLE_LANES - 1)
        .min(total - VISIBLE_LANES)
}

fn card_line(card: &Card) -> Line<'static> {
    let mut spans = Vec::new();
    if card.golden {
        spans.push(Span::styled("★ ", Style::default().fg(Color::Yellow)));
    }
    spans.push(Span::styled(
        format!("#{} ", card.id),
        Style::default().fg(Color::DarkGray),
    ));
    spans.push(Span::raw(card.title.clone()));
    if card.steps_total > 0 {
        spans.push(Span::styled(
            format!(" [{}]", card.steps_display()),
            Style::default().fg(Color::Cyan),
        ));
    }
    Line::from(spans)
}

fn lane_items(app: &App, lane_index: usize, column: &Column) -> Vec<ListItem<'static>> {
    let dragged = app.view.drag.card().map(|c| c.id);
    let mut items: Vec<ListItem> = column
        .cards
        .iter()
        .map(|card| {
            let item = ListItem::new(card_line(card));
            if Some(card.id) == dragged {
                item.style(Style::default().fg(Color::DarkGray).add_modifier(Modifier::ITALIC))
            } else {
                item
            }
        })
        .collect();

    if let Some((lane, index)) = app.drag_cursor {
        if lane == lane_index {
            let marker = ListItem::new(Line::from(Span::styled(
                "▸ drop here",
                Style::default().fg(Color::Green).add_modifier(Modifier::BOLD),
            )));
            items.insert(index.min(items.len()), marker);
        }
    }

    if items.is_empty() {
        items.push(ListItem::new(Span::styled(
            "No cards",
            Style::default().fg(Color::DarkGray),
        )));
    }
    items
}

fn draw_lanes(f: &mut Frame, app: &App, area: Rect) {
    let columns = &app.view.columns;
    let start = lane_window(app.lane, columns.len());
    let shown = columns.len().saturating_sub(start).min(VISIBLE_LANES);
    let constraints: Vec<Constraint> = (0..shown)
        .map(|_| Constraint::Ratio(1, shown as u32))
        .collect();
    let chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints(constraints)
        .split(area);

    for (slot, lane_index) in (start..start + shown).enumerate() {
        let column = &columns[lane_index];
        let is_current = lane_index == app.lane;
        let border_style = if is_current {
            Style::default().fg(Color::Green)
        } else {
            Style::default()
        };
        let title = format!(" {} ({}) ", column.name, column.cards.len());

        let list = List::new(lane_items(app, lane_index, column))
            .block(
                Block::default()
                    .borders(Borders::ALL)
                    .border_style(border_style)
                    .title(title),
            )
            .highlight_style(
                Style::default()
                    .fg(Color::Green)
                    .add_modifier(Modifier::BOLD),
            )
            .highlight_symbol(">> ");

        let mut state = ListState::default();
        if is_current && app.drag_cursor.is_none() && !column.cards.is_empty() {
            state.select(Some(app.card));
        }
        f.render_stateful_widget(list, chunks[slot], &mut state);
    }
}

fn draw_kanban(f: &mut Frame, app: &App, area: Rect) {
    let name = app
        .view
        .board
        .as_ref()
        .map_or("Board".to_string(), |b| b.name.clone());
    let mut header = vec![Span::styled(
        name,
        Style::default().add_modifier(Modifier::BOLD),
    )];
    if app.view.is_refreshing {
        header.push(Span::styled("  refreshing…", Style::default().fg(Color::DarkGray)));
    }

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(1), Constraint::Min(0)].as_ref())
        .split(area);
    f.render_widget(Paragraph::new(Line::from(header)), chunks[0]);

    if app.view.columns.is_empty() {
        let message = match (&app.view.error, app.view.is_loading) {
            (Some(error), _) => format!("{}\n\nPress r to retry", error),
            (None, true) => "Loading board…".to_string(),
            (None, false) => "This board has no columns".to_string(),
        };
        let paragraph = Paragraph::new(message)
            .alignment(Alignment::Center)
            .block(Block::default().borders(Borders::ALL))
            .wrap(Wrap { trim: true });
        f.render_widget(paragraph, chunks[1]);
        return;
    }

    draw_lanes(f, app, chunks[1]);
}

fn draw_boards(f: &mut Frame, app: &mut App, area: Rect) {
    let block = Block::default().borders(Borders::ALL).title("Boards");
    if let Some(error) = &app.boards_error {
        let paragraph = Paragraph::new(format!("{}\n\nPress r to retry", error))
            .block(block)
            .wrap(Wrap { trim: true });
        f.render_widget(paragraph, area);
        return;
    }

    let list = if app.boards.is_empty() {
        List::new(vec![ListItem::new("No boards available")]).block(block)
    } else {
        let items: Vec<ListItem> = app
            .boards
            .iter()
            .map(|board| {
                ListItem::new(Line::from(vec![
                    Span::raw(board.name.clone()),
                    Span::styled(
                        format!("  {} cards", board.cards_count),
                        Style::default().fg(Color::DarkGray),
                    ),
                ]))
            })
            .collect();
        List::new(items)
            .block(block)
            .highlight_style(
                Style::default()
                    .fg(Color::Green)
                    .add_modifier(Modifier::BOLD),
            )
            .highlight_symbol(">> ")
    };
    f.render_stateful_widget(list, area, &mut app.state);
}

fn draw_input_popup(f: &mut Frame, title: &str, input: &str, area: Rect) {
    let popup_width = (area.width * 60 / 100).saturating_sub(2);
    let lines_required = calculate_wrapped_lines(input, popup_width);
    let required_height = std::cmp::max(lines_required as u16, 1);
    let popup_height = std::cmp::min(required_height + 2, area.height.saturating_sub(2));
    let popup_area = centered_rect_absolute(popup_width + 2, popup_height, area);

    let popup_block = Block::default()
        .title(title.to_string())
        .borders(Borders::ALL)
        .style(Style::default().fg(Color::Green));

    let input = Paragraph::new(input.to_string())
        .style(Style::default().fg(Color::White))
        .block(popup_block)
        .wrap(Wrap { trim: false });

    f.render_widget(Clear, popup_area);
    f.render_widget(input, popup_area);
}

fn draw_card_detail(f: &mut Frame, card: &Card, area: Rect) {
    let popup_area = centered_rect_absolute(
        (area.width * 70 / 100).max(20),
        (area.height * 80 / 100).max(8),
        area,
    );
    let bold = Style::default().add_modifier(Modifier::BOLD);
    let mut lines: Vec<Line<'static>> = Vec::new();

    let status = match card.status {
        CardStatus::Active => "Active",
        CardStatus::Closed => "Done",
        CardStatus::Triaged => "Triaged",
        CardStatus::Deferred => "Not now",
    };
    lines.push(Line::from(vec![
        Span::styled("Status: ", bold),
        Span::raw(status),
        Span::raw(if card.golden { "  ★ golden" } else { "" }),
    ]));
    lines.push(Line::from(vec![
        Span::styled("Steps: ", bold),
        Span::raw(card.steps_display()),
        Span::styled("  Comments: ", bold),
        Span::raw(card.comments_count.to_string()),
    ]));

    let assignees = if card.assignees.is_empty() {
        "Unassigned".to_string()
    } else {
        card.assignees
            .iter()
            .map(|u| u.name.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    };
    lines.push(Line::from(vec![
        Span::styled("Assignees: ", bold),
        Span::raw(assignees),
    ]));

    lines.push(Line::from(vec![Span::styled("Tags: ", bold)]));
    if card.tags.is_empty() {
        lines.push(Line::from(Span::raw("No tags")));
    } else {
        let mut tag_spans: Vec<Span<'static>> = Vec::new();
        for (i, tag) in card.tags.iter().enumerate() {
            if i > 0 {
                tag_spans.push(Span::raw(" "));
            }
            tag_spans.push(Span::styled(
                format!(" {} ", tag.name),
                Style::default().bg(Color::Yellow).fg(Color::Black),
            ));
        }
        lines.push(Line::from(tag_spans));
    }

    lines.push(Line::from(vec![Span::styled("Description: ", bold)]));
    match card.description.as_deref().map(str::trim) {
        Some(desc) if !desc.is_empty() && desc != "<p></p>" => {
            let width = popup_area.width.saturating_sub(2).max(10) as usize;
            let ansi_text = html2text::from_read(desc.as_bytes(), width);
            lines.append(&mut ansi_to_text(&ansi_text));
        }
        _ => lines.push(Line::from(Span::raw("No description"))),
    }

    let paragraph = Paragraph::new(lines)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title(format!(" #{} {} ", card.id, card.title)),
        )
        .wrap(Wrap { trim: true });
    f.render_widget(Clear, popup_area);
    f.render_widget(paragraph, popup_area);
}

fn draw(f: &mut Frame, app: &mut App) {
    let size = f.area();
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .margin(0)
        .constraints([Constraint::Min(0), Constraint::Length(1), Constraint::Length(2)].as_ref())
        .split(size);
    let body_chunk = chunks[0];
    let input_mode = app.input_mode();

    match app.screen {
        Screen::Boards => draw_boards(f, app, body_chunk),
        Screen::Kanban => {
            draw_kanban(f, app, body_chunk);
            match input_mode {
                InputMode::AddColumn => {
                    draw_input_popup(f, "New Column (Enter to Submit)", &app.input, body_chunk)
                }
                InputMode::RenameColumn => {
                    draw_input_popup(f, "Rename Column (Enter to Submit)", &app.input, body_chunk)
                }
                InputMode::AddCard => draw_input_popup(
                    f,
                    "New Card: title #tag ! for golden (Enter to Submit)",
                    &app.input,
                    body_chunk,
                ),
                InputMode::ConfirmDelete => {
                    let name = app
                        .confirm_delete
                        .as_ref()
                        .map_or(String::new(), |c| c.name.clone());
                    draw_input_popup(
                        f,
                        "Delete Column",
                        &format!("Delete \"{}\"? (y/n)", name),
                        body_chunk,
                    )
                }
                InputMode::CardDetail => {
                    if let Some(card) = &app.card_detail {
                        draw_card_detail(f, card, body_chunk);
                    }
                }
                InputMode::Normal | InputMode::Dragging => {}
            }
        }
    }

    if let Some(notification) = &app.notification {
        let snackbar = Paragraph::new(Span::styled(
            notification.message.clone(),
            Style::default().fg(Color::Yellow),
        ));
        f.render_widget(snackbar, chunks[1]);
    }

    let legend = Paragraph::new(get_legend(&app.screen, &input_mode))
        .style(Style::default().fg(Color::White))
        .alignment(Alignment::Left)
        .wrap(Wrap { trim: true });
    f.render_widget(legend, chunks[2]);
}

pub async fn run_app<B: Backend>(terminal: &mut Terminal<B>, mut app: App) -> io::Result<()> {
    loop {
        app.sync();
        terminal.draw(|f| draw(f, &mut app))?;

        if event::poll(Duration::from_millis(100))? {
            if let CEvent::Key(key) = event::read()? {
                let should_quit = app.handle_input(key).await?;
                if should_quit {
                    app.shutdown();
                    return Ok(());
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wrapped_lines() {
        assert_eq!(calculate_wrapped_lines("abcdef", 3), 2);
        assert_eq!(calculate_wrapped_lines("abcdefg", 3), 3);
        assert_eq!(calculate_wrapped_lines("a\nb", 10), 2);
        assert_eq!(calculate_wrapped_lines("", 10), 0);
    }

    #[test]
    fn test_lane_window_follows_selection() {
        assert_eq!(lane_window(0, 3), 0);
        assert_eq!(lane_window(2, 6), 0);
        assert_eq!(lane_window(4, 6), 1);
        assert_eq!(lane_window(5, 6), 2);
    }

    #[test]
    fn test_ansi_to_text_strips_escapes() {
        let lines = ansi_to_text("\u{1b}[1mBold\u{1b}[0m text\nsecond");
        assert_eq!(lines.len(), 2);
        let first: String = lines[0].spans.iter().map(|s| s.content.as_ref()).collect();
        assert_eq!(first, "Bold text");
    }
}
