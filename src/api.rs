use crate::dto::{
    BoardDto, CardDto, ColumnRequest, ColumnDto, CreateCardRequest, TaggingRequest,
    TriageCardRequest, UpdateCardRequest,
};
use crate::error::ApiFault;
use reqwest::{Client, Method, RequestBuilder, Response, Url};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fmt;
use std::time::Duration;
use tracing::{debug, warn};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Outcome of every remote call: a payload, a server-reported error, or a
/// fault that kept the request from producing a status at all.
#[derive(Debug)]
pub enum ApiResult<T> {
    Success(T),
    Error { code: u16, message: String },
    Exception(ApiFault),
}

impl<T> ApiResult<T> {
    pub fn is_success(&self) -> bool {
        matches!(self, ApiResult::Success(_))
    }

    #[cfg(test)]
    pub fn ok(self) -> Option<T> {
        match self {
            ApiResult::Success(data) => Some(data),
            ApiResult::Error { .. } | ApiResult::Exception(_) => None,
        }
    }

    pub fn map<R>(self, transform: impl FnOnce(T) -> R) -> ApiResult<R> {
        match self {
            ApiResult::Success(data) => ApiResult::Success(transform(data)),
            ApiResult::Error { code, message } => ApiResult::Error { code, message },
            ApiResult::Exception(fault) => ApiResult::Exception(fault),
        }
    }

    pub fn error(code: u16, message: impl Into<String>) -> Self {
        ApiResult::Error {
            code,
            message: message.into(),
        }
    }

    /// Text suitable for a notification shown to the user.
    pub fn user_message(&self) -> String {
        match self {
            ApiResult::Success(_) => String::new(),
            ApiResult::Error { message, .. } => message.clone(),
            ApiResult::Exception(_) => "Network error".to_string(),
        }
    }
}

impl<T> fmt::Display for ApiResult<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApiResult::Success(_) => write!(f, "success"),
            ApiResult::Error { code, message } => write!(f, "error {}: {}", code, message),
            ApiResult::Exception(fault) => write!(f, "exception: {}", fault),
        }
    }
}

/// Which card partition `GET cards.json` should return.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CardFilter {
    Active,
    Closed,
    NotNow,
}

impl CardFilter {
    fn indexed_by(self) -> &'static str {
        match self {
            CardFilter::Active => "all",
            CardFilter::Closed => "closed",
            CardFilter::NotNow => "not_now",
        }
    }
}

/// Prefix `https://` when no scheme is given and make sure the url ends in `/`.
pub fn normalize_url(url: &str) -> String {
    let mut normalized = url.trim().to_string();
    if !normalized.starts_with("http://") && !normalized.starts_with("https://") {
        normalized = format!("https://{}", normalized);
    }
    if !normalized.ends_with('/') {
        normalized.push('/');
    }
    normalized
}

/// Pull the trailing id out of a `Location` header such as
/// `/123/cards/77.json`.
fn id_from_location(location: &str, collection: &str) -> Option<String> {
    let marker = format!("/{}/", collection);
    let start = location.rfind(&marker)? + marker.len();
    let id = location[start..].trim_end_matches(".json");
    if id.is_empty() || id.contains('/') {
        None
    } else {
        Some(id.to_string())
    }
}

#[derive(Clone, Debug)]
pub struct FizzyClient {
    client: Client,
    base_url: Url,
    account_slug: Option<String>,
    api_token: String,
}

impl FizzyClient {
    pub fn new(
        instance_url: &str,
        api_token: &str,
        account_slug: Option<&str>,
    ) -> Result<Self, ApiFault> {
        let base_url = Url::parse(&normalize_url(instance_url))
            .map_err(|e| ApiFault::InvalidUrl(format!("{}: {}", instance_url, e)))?;
        let client = Client::builder().timeout(REQUEST_TIMEOUT).build()?;

        Ok(FizzyClient {
            client,
            base_url,
            account_slug: account_slug
                .map(|s| s.trim_matches('/').to_string())
                .filter(|s| !s.is_empty()),
            api_token: api_token.to_string(),
        })
    }

    fn url(&self, path: &str) -> Result<Url, ApiFault> {
        let global = path.starts_with("my/");
        let full = match (&self.account_slug, global) {
            (Some(slug), false) => format!("{}/{}", slug, path),
            _ => path.to_string(),
        };
        self.base_url
            .join(&full)
            .map_err(|e| ApiFault::InvalidUrl(format!("{}: {}", full, e)))
    }

    fn request(&self, method: Method, path: &str) -> Result<RequestBuilder, ApiFault> {
        let token = if self.api_token.starts_with("Bearer ") {
            self.api_token.clone()
        } else {
            format!("Bearer {}", self.api_token)
        };

        Ok(self
            .client
            .request(method, self.url(path)?)
            .header("Authorization", token)
            .header("Accept", "application/json"))
    }

    async fn execute(&self, request: Result<RequestBuilder, ApiFault>) -> ApiResult<Response> {
        let request = match request {
            Ok(request) => request,
            Err(fault) => return ApiResult::Exception(fault),
        };

        let res = match request.send().await {
            Ok(res) => res,
            Err(err) => {
                warn!(error = %err, "request failed before a response arrived");
                return ApiResult::Exception(err.into());
            }
        };

        let status = res.status();
        debug!(url = %res.url(), status = status.as_u16(), "response");
        if status.is_success() {
            return ApiResult::Success(res);
        }

        let reason = status.canonical_reason().unwrap_or("Request failed").to_string();
        let body = res.text().await.unwrap_or_default();
        let message = if body.trim().is_empty() || body.len() > 200 {
            reason
        } else {
            body.trim().to_string()
        };
        warn!(status = status.as_u16(), %message, "request rejected");
        ApiResult::error(status.as_u16(), message)
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str, query: &[(&str, &str)]) -> ApiResult<T> {
        let request = self.request(Method::GET, path).map(|r| r.query(query));
        match self.execute(request).await {
            ApiResult::Success(res) => match res.bytes().await {
                Ok(bytes) => match serde_json::from_slice::<T>(&bytes) {
                    Ok(data) => ApiResult::Success(data),
                    Err(err) => ApiResult::Exception(err.into()),
                },
                Err(err) => ApiResult::Exception(err.into()),
            },
            ApiResult::Error { code, message } => ApiResult::Error { code, message },
            ApiResult::Exception(fault) => ApiResult::Exception(fault),
        }
    }

    async fn send<B: Serialize>(&self, method: Method, path: &str, body: Option<&B>) -> ApiResult<Response> {
        let request = self.request(method, path).map(|r| match body {
            Some(body) => r.json(body),
            None => r,
        });
        self.execute(request).await
    }

    async fn send_empty(&self, method: Method, path: &str) -> ApiResult<()> {
        self.send::<()>(method, path, None).await.map(|_| ())
    }

    /// POST that answers 201 with an empty body and the new resource in
    /// the `Location` header.
    async fn create<B: Serialize>(&self, path: &str, body: &B, collection: &str) -> ApiResult<String> {
        match self.send(Method::POST, path, Some(body)).await {
            ApiResult::Success(res) => {
                let location = res
                    .headers()
                    .get(reqwest::header::LOCATION)
                    .and_then(|v| v.to_str().ok())
                    .and_then(|v| id_from_location(v, collection));
                match location {
                    Some(id) => ApiResult::Success(id),
                    None => ApiResult::error(0, format!("Created but no {} id in response", collection)),
                }
            }
            ApiResult::Error { code, message } => ApiResult::Error { code, message },
            ApiResult::Exception(fault) => ApiResult::Exception(fault),
        }
    }

    pub async fn boards(&self) -> ApiResult<Vec<BoardDto>> {
        self.get_json("boards.json", &[]).await
    }

    pub async fn board(&self, board_id: &str) -> ApiResult<BoardDto> {
        self.get_json(&format!("boards/{}.json", board_id), &[]).await
    }

    pub async fn columns(&self, board_id: &str) -> ApiResult<Vec<ColumnDto>> {
        self.get_json(&format!("boards/{}/columns.json", board_id), &[])
            .await
    }

    pub async fn cards(&self, board_id: &str, filter: CardFilter) -> ApiResult<Vec<CardDto>> {
        self.get_json(
            "cards.json",
            &[("board_ids[]", board_id), ("indexed_by", filter.indexed_by())],
        )
        .await
    }

    pub async fn card(&self, number: u64) -> ApiResult<CardDto> {
        self.get_json(&format!("cards/{}.json", number), &[]).await
    }

    pub async fn create_card(&self, board_id: &str, body: &CreateCardRequest<'_>) -> ApiResult<String> {
        self.create(&format!("boards/{}/cards.json", board_id), body, "cards")
            .await
    }

    pub async fn update_card(&self, number: u64, body: &UpdateCardRequest<'_>) -> ApiResult<()> {
        self.send(Method::PUT, &format!("cards/{}", number), Some(body))
            .await
            .map(|_| ())
    }

    pub async fn triage_card(&self, number: u64, column_id: &str) -> ApiResult<()> {
        let body = TriageCardRequest { column_id };
        self.send(Method::POST, &format!("cards/{}/triage", number), Some(&body))
            .await
            .map(|_| ())
    }

    pub async fn untriage_card(&self, number: u64) -> ApiResult<()> {
        self.send_empty(Method::DELETE, &format!("cards/{}/triage", number))
            .await
    }

    pub async fn close_card(&self, number: u64) -> ApiResult<()> {
        self.send_empty(Method::POST, &format!("cards/{}/closure", number))
            .await
    }

    pub async fn not_now_card(&self, number: u64) -> ApiResult<()> {
        self.send_empty(Method::POST, &format!("cards/{}/not_now", number))
            .await
    }

    pub async fn set_golden(&self, number: u64, golden: bool) -> ApiResult<()> {
        let method = if golden { Method::POST } else { Method::DELETE };
        self.send_empty(method, &format!("cards/{}/goldness", number))
            .await
    }

    pub async fn add_tagging(&self, number: u64, tag_title: &str) -> ApiResult<()> {
        let body = TaggingRequest { tag_title };
        self.send(Method::POST, &format!("cards/{}/taggings", number), Some(&body))
            .await
            .map(|_| ())
    }

    pub async fn create_column(&self, board_id: &str, body: &ColumnRequest<'_>) -> ApiResult<String> {
        self.create(&format!("boards/{}/columns.json", board_id), body, "columns")
            .await
    }

    pub async fn update_column(&self, board_id: &str, column_id: &str, body: &ColumnRequest<'_>) -> ApiResult<()> {
        self.send(
            Method::PUT,
            &format!("boards/{}/columns/{}", board_id, column_id),
            Some(body),
        )
        .await
        .map(|_| ())
    }

    pub async fn delete_column(&self, board_id: &str, column_id: &str) -> ApiResult<()> {
        self.send_empty(
            Method::DELETE,
            &format!("boards/{}/columns/{}.json", board_id, column_id),
        )
        .await
    }
}
