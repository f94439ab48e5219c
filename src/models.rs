use chrono::{DateTime, Utc};

/// Lane holding deferred ("not now") cards.
pub const NOT_NOW_COLUMN_ID: &str = "__not_now__";
/// Lane holding active cards that have no column yet.
pub const TRIAGE_COLUMN_ID: &str = "";
/// Lane holding closed cards.
pub const DONE_COLUMN_ID: &str = "__done__";

pub const NOT_NOW_POSITION: i32 = -2;
pub const TRIAGE_POSITION: i32 = -1;
pub const DONE_POSITION: i32 = i32::MAX;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CardStatus {
    Active,
    Closed,
    Triaged,
    Deferred,
}

#[derive(Clone, Debug, PartialEq)]
pub struct User {
    pub id: String,
    pub name: String,
    pub email: String,
    pub avatar_url: Option<String>,
    pub admin: bool,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Tag {
    pub id: String,
    pub name: String,
    pub color: String,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Card {
    /// Server card "number", used in every card URL.
    pub id: u64,
    pub title: String,
    pub description: Option<String>,
    /// Only comparable between cards of the same lane.
    pub position: i32,
    /// Empty means the card is in triage.
    pub column_id: String,
    pub board_id: String,
    pub status: CardStatus,
    pub golden: bool,
    pub watching: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub creator: Option<User>,
    pub assignees: Vec<User>,
    pub tags: Vec<Tag>,
    pub steps_total: u32,
    pub steps_completed: u32,
    pub comments_count: u32,
}

impl Card {
    /// Id of the swimlane this card is displayed in.
    pub fn lane_id(&self) -> &str {
        match self.status {
            CardStatus::Closed => DONE_COLUMN_ID,
            CardStatus::Deferred => NOT_NOW_COLUMN_ID,
            CardStatus::Active | CardStatus::Triaged => &self.column_id,
        }
    }

    pub fn steps_display(&self) -> String {
        format!("{}/{}", self.steps_completed, self.steps_total)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Column {
    pub id: String,
    pub name: String,
    pub position: i32,
    pub board_id: String,
    pub cards: Vec<Card>,
}

impl Column {
    pub fn is_synthetic(&self) -> bool {
        is_synthetic_column(&self.id)
    }
}

pub fn is_synthetic_column(id: &str) -> bool {
    id == NOT_NOW_COLUMN_ID || id == TRIAGE_COLUMN_ID || id == DONE_COLUMN_ID
}

#[derive(Clone, Debug, PartialEq)]
pub struct Board {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
    pub cards_count: u32,
    pub columns_count: u32,
    pub creator: Option<User>,
    pub all_access: bool,
}

#[cfg(test)]
pub mod fixtures {
    use super::*;

    pub fn card(id: u64, status: CardStatus, column_id: &str, position: i32, title: &str) -> Card {
        Card {
            id,
            title: title.to_string(),
            description: None,
            position,
            column_id: column_id.to_string(),
            board_id: "b1".to_string(),
            status,
            golden: false,
            watching: false,
            created_at: DateTime::<Utc>::default(),
            updated_at: DateTime::<Utc>::default(),
            creator: None,
            assignees: Vec::new(),
            tags: Vec::new(),
            steps_total: 0,
            steps_completed: 0,
            comments_count: 0,
        }
    }

    pub fn column(id: &str, position: i32, name: &str) -> Column {
        Column {
            id: id.to_string(),
            name: name.to_string(),
            position,
            board_id: "b1".to_string(),
            cards: Vec::new(),
        }
    }

    pub fn board(id: &str, name: &str) -> Board {
        Board {
            id: id.to_string(),
            name: name.to_string(),
            description: None,
            created_at: DateTime::<Utc>::default(),
            updated_at: None,
            cards_count: 0,
            columns_count: 0,
            creator: None,
            all_access: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::fixtures::card;
    use super::*;

    #[test]
    fn test_lane_id_follows_status() {
        assert_eq!(card(1, CardStatus::Active, "c1", 0, "a").lane_id(), "c1");
        assert_eq!(card(2, CardStatus::Triaged, "", 0, "b").lane_id(), "");
        assert_eq!(
            card(3, CardStatus::Closed, "c1", 0, "c").lane_id(),
            DONE_COLUMN_ID
        );
        assert_eq!(
            card(4, CardStatus::Deferred, "c1", 0, "d").lane_id(),
            NOT_NOW_COLUMN_ID
        );
    }

    #[test]
    fn test_synthetic_ids() {
        assert!(is_synthetic_column(""));
        assert!(is_synthetic_column(DONE_COLUMN_ID));
        assert!(!is_synthetic_column("c1"));
    }
}
