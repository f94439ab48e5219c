use crate::models::{
    Card, CardStatus, Column, DONE_COLUMN_ID, DONE_POSITION, NOT_NOW_COLUMN_ID, NOT_NOW_POSITION,
    TRIAGE_COLUMN_ID, TRIAGE_POSITION,
};
use std::collections::HashMap;
use tracing::debug;

/// Merge real columns and a card snapshot into the displayed swimlanes:
/// `[Not Now, Triage, ...real columns by position..., Done]`.
///
/// Pure and deterministic. All sorts are stable, so cards with equal
/// positions keep their input order.
pub fn reconcile(columns: Vec<Column>, cards: Vec<Card>, board_id: &str) -> Vec<Column> {
    let mut deferred = Vec::new();
    let mut closed = Vec::new();
    let mut triage = Vec::new();
    let mut by_column: HashMap<String, Vec<Card>> = HashMap::new();

    for card in cards {
        match card.status {
            CardStatus::Deferred => deferred.push(card),
            CardStatus::Closed => closed.push(card),
            CardStatus::Active | CardStatus::Triaged if card.column_id.is_empty() => {
                triage.push(card)
            }
            CardStatus::Active | CardStatus::Triaged => {
                by_column.entry(card.column_id.clone()).or_default().push(card)
            }
        }
    }

    deferred.sort_by_key(|c| c.position);
    closed.sort_by_key(|c| c.position);
    triage.sort_by_key(|c| c.position);

    let lane_board_id = columns
        .first()
        .map(|c| c.board_id.as_str())
        .filter(|id| !id.is_empty())
        .unwrap_or(board_id)
        .to_string();

    let mut columns = columns;
    columns.sort_by_key(|c| c.position);

    debug!(
        deferred = deferred.len(),
        triage = triage.len(),
        in_columns = by_column.values().map(Vec::len).sum::<usize>(),
        closed = closed.len(),
        columns = columns.len(),
        "reconciling swimlanes"
    );

    let mut lanes = Vec::with_capacity(columns.len() + 3);
    lanes.push(synthetic(NOT_NOW_COLUMN_ID, "Not Now", NOT_NOW_POSITION, &lane_board_id, deferred));
    lanes.push(synthetic(TRIAGE_COLUMN_ID, "Triage", TRIAGE_POSITION, &lane_board_id, triage));

    for mut column in columns {
        let mut cards = by_column.remove(&column.id).unwrap_or_default();
        cards.sort_by_key(|c| c.position);
        column.cards = cards;
        lanes.push(column);
    }

    if !by_column.is_empty() {
        debug!(
            orphaned = by_column.values().map(Vec::len).sum::<usize>(),
            "cards reference columns missing from the snapshot"
        );
    }

    lanes.push(synthetic(DONE_COLUMN_ID, "Done", DONE_POSITION, &lane_board_id, closed));
    lanes
}

fn synthetic(id: &str, name: &str, position: i32, board_id: &str, cards: Vec<Card>) -> Column {
    Column {
        id: id.to_string(),
        name: name.to_string(),
        position,
        board_id: board_id.to_string(),
        cards,
    }
}
