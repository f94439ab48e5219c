use crate::models::{Board, Card, CardStatus, Column, Tag, User};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// Wire types for the Fizzy REST API. Lists come back as bare arrays and
// request bodies are wrapped in a single key named after the resource.

#[derive(Clone, Deserialize, Debug)]
pub struct UserDto {
    pub id: String,
    pub name: String,
    pub email_address: Option<String>,
    pub avatar_url: Option<String>,
    pub role: Option<String>,
    #[serde(default)]
    pub admin: bool,
}

#[derive(Clone, Deserialize, Debug)]
pub struct TagDto {
    pub id: String,
    pub title: Option<String>,
    pub name: Option<String>,
    pub color: Option<String>,
}

#[derive(Clone, Deserialize, Debug)]
pub struct StepDto {
    pub id: String,
    #[serde(default)]
    pub completed: bool,
}

#[derive(Clone, Deserialize, Debug)]
pub struct BoardDto {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    pub created_at: String,
    pub updated_at: Option<String>,
    #[serde(default)]
    pub cards_count: u32,
    #[serde(default)]
    pub columns_count: u32,
    pub creator: Option<UserDto>,
    #[serde(default)]
    pub all_access: bool,
}

#[derive(Clone, Deserialize, Debug)]
pub struct ColumnDto {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub position: i32,
    #[serde(default)]
    pub board_id: String,
}

#[derive(Clone, Deserialize, Debug)]
pub struct CardColumnDto {
    pub id: String,
}

#[derive(Clone, Deserialize, Debug)]
pub struct CardBoardDto {
    pub id: String,
}

#[derive(Clone, Deserialize, Debug)]
pub struct CardDto {
    pub id: String,
    #[serde(default)]
    pub number: u64,
    pub title: String,
    pub description: Option<String>,
    #[serde(default)]
    pub position: i32,
    pub column: Option<CardColumnDto>,
    pub board: Option<CardBoardDto>,
    #[serde(default = "default_status")]
    pub status: String,
    #[serde(default)]
    pub golden: bool,
    #[serde(default)]
    pub closed: bool,
    #[serde(default)]
    pub created_at: String,
    pub last_active_at: Option<String>,
    pub creator: Option<UserDto>,
    pub assignees: Option<Vec<UserDto>>,
    pub tags: Option<Vec<TagDto>>,
    pub steps: Option<Vec<StepDto>>,
    pub comments_count: Option<u32>,
}

fn default_status() -> String {
    "active".to_string()
}

#[derive(Serialize, Debug)]
pub struct CardData<'a> {
    pub title: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub column_id: Option<&'a str>,
}

#[derive(Serialize, Debug)]
pub struct CreateCardRequest<'a> {
    pub card: CardData<'a>,
}

#[derive(Serialize, Debug, Default)]
pub struct UpdateCardData<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub column_id: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub position: Option<i32>,
}

#[derive(Serialize, Debug)]
pub struct UpdateCardRequest<'a> {
    pub card: UpdateCardData<'a>,
}

#[derive(Serialize, Debug)]
pub struct TriageCardRequest<'a> {
    pub column_id: &'a str,
}

#[derive(Serialize, Debug)]
pub struct TaggingRequest<'a> {
    pub tag_title: &'a str,
}

#[derive(Serialize, Debug, Default)]
pub struct ColumnData<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub position: Option<i32>,
}

#[derive(Serialize, Debug)]
pub struct ColumnRequest<'a> {
    pub column: ColumnData<'a>,
}

fn parse_time(value: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .ok()
        .map(|t| t.with_timezone(&Utc))
}

impl From<UserDto> for User {
    fn from(dto: UserDto) -> Self {
        let admin = dto.admin || matches!(dto.role.as_deref(), Some("owner") | Some("admin"));
        User {
            id: dto.id,
            name: dto.name,
            email: dto.email_address.unwrap_or_default(),
            avatar_url: dto.avatar_url,
            admin,
        }
    }
}

impl From<TagDto> for Tag {
    fn from(dto: TagDto) -> Self {
        Tag {
            id: dto.id,
            name: dto.title.or(dto.name).unwrap_or_default(),
            color: dto.color.unwrap_or_else(|| "#808080".to_string()),
        }
    }
}

impl From<BoardDto> for Board {
    fn from(dto: BoardDto) -> Self {
        Board {
            id: dto.id,
            name: dto.name,
            description: dto.description,
            created_at: parse_time(&dto.created_at).unwrap_or_else(Utc::now),
            updated_at: dto.updated_at.as_deref().and_then(parse_time),
            cards_count: dto.cards_count,
            columns_count: dto.columns_count,
            creator: dto.creator.map(User::from),
            all_access: dto.all_access,
        }
    }
}

impl From<ColumnDto> for Column {
    fn from(dto: ColumnDto) -> Self {
        Column {
            id: dto.id,
            name: dto.name,
            position: dto.position,
            board_id: dto.board_id,
            cards: Vec::new(),
        }
    }
}

impl From<CardDto> for Card {
    fn from(dto: CardDto) -> Self {
        let status = if dto.closed {
            CardStatus::Closed
        } else {
            match dto.status.to_lowercase().as_str() {
                "triaged" => CardStatus::Triaged,
                "deferred" => CardStatus::Deferred,
                _ => CardStatus::Active,
            }
        };
        let steps = dto.steps.unwrap_or_default();
        let created_at = parse_time(&dto.created_at).unwrap_or_else(Utc::now);

        Card {
            id: dto.number,
            title: dto.title,
            description: dto.description,
            position: dto.position,
            column_id: dto.column.map(|c| c.id).unwrap_or_default(),
            board_id: dto.board.map(|b| b.id).unwrap_or_default(),
            status,
            golden: dto.golden,
            watching: false,
            created_at,
            updated_at: dto
                .last_active_at
                .as_deref()
                .and_then(parse_time)
                .unwrap_or(created_at),
            creator: dto.creator.map(User::from),
            assignees: dto
                .assignees
                .unwrap_or_default()
                .into_iter()
                .map(User::from)
                .collect(),
            tags: dto
                .tags
                .unwrap_or_default()
                .into_iter()
                .map(Tag::from)
                .collect(),
            steps_total: steps.len() as u32,
            steps_completed: steps.iter().filter(|s| s.completed).count() as u32,
            comments_count: dto.comments_count.unwrap_or(0),
        }
    }
}
