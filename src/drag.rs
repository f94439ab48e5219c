use crate::models::Card;
use tracing::debug;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DragTarget {
    pub column_id: String,
    pub position: i32,
}

/// A relocation produced by dropping a card somewhere new.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MoveRequest {
    pub card_id: u64,
    pub column_id: String,
    pub position: i32,
}

/// An in-progress card relocation. At most one exists per board.
#[derive(Clone, Debug, Default, PartialEq)]
pub enum DragSession {
    #[default]
    Idle,
    Dragging {
        card: Card,
        /// Lane the card was picked up from.
        source_column_id: String,
        target: Option<DragTarget>,
    },
}

impl DragSession {
    pub fn is_dragging(&self) -> bool {
        matches!(self, DragSession::Dragging { .. })
    }

    pub fn card(&self) -> Option<&Card> {
        match self {
            DragSession::Idle => None,
            DragSession::Dragging { card, .. } => Some(card),
        }
    }

    #[cfg(test)]
    pub fn target(&self) -> Option<&DragTarget> {
        match self {
            DragSession::Idle => None,
            DragSession::Dragging { target, .. } => target.as_ref(),
        }
    }

    /// Start dragging `card`. A pick-up while a drag is already running is
    /// ignored and returns `false`.
    pub fn pick_up(&mut self, card: Card) -> bool {
        if self.is_dragging() {
            debug!(card_id = card.id, "ignoring pick-up, a drag is already in progress");
            return false;
        }
        *self = DragSession::Dragging {
            source_column_id: card.lane_id().to_string(),
            card,
            target: None,
        };
        true
    }

    /// Record the lane and index under the pointer; the last hover wins.
    pub fn hover(&mut self, column_id: &str, position: i32) -> bool {
        match self {
            DragSession::Idle => false,
            DragSession::Dragging { target, .. } => {
                *target = Some(DragTarget {
                    column_id: column_id.to_string(),
                    position,
                });
                true
            }
        }
    }

    /// End the gesture. Yields a move only when a target was hovered and it
    /// differs from where the card started.
    pub fn drop(&mut self) -> Option<MoveRequest> {
        match std::mem::take(self) {
            DragSession::Idle => None,
            DragSession::Dragging {
                card,
                source_column_id,
                target,
            } => {
                let target = target?;
                if target.column_id == source_column_id && target.position == card.position {
                    return None;
                }
                Some(MoveRequest {
                    card_id: card.id,
                    column_id: target.column_id,
                    position: target.position,
                })
            }
        }
    }

    pub fn cancel(&mut self) {
        *self = DragSession::Idle;
    }
}
