use axum::{
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::{Html, IntoResponse, Response},
    Json,
};
use chrono::Utc;
use pulldown_cmark::{html, Options, Parser};
use serde::Deserialize;
use serde_json::json;
use tracing::{error, warn};

use tgfeed_core::{
    feed::{ChannelFeed, FeedFormat},
    service::{parse_message_id, validate_channel},
    Error,
};

use crate::AppState;

/// JSON error body with a status code.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    /// Client-facing errors keep their text; everything else becomes `fallback`.
    fn from_core(err: Error, not_found: &str, fallback: &str) -> Self {
        match err {
            Error::InvalidInput(msg) => Self::new(StatusCode::BAD_REQUEST, msg),
            Error::NotFound(_) => Self::new(StatusCode::NOT_FOUND, not_found),
            Error::Auth(msg) => {
                error!(error = %msg, "telegram session unavailable");
                Self::new(StatusCode::SERVICE_UNAVAILABLE, "Telegram session unavailable")
            }
            other => {
                error!(error = %other, "{fallback}");
                Self::new(StatusCode::INTERNAL_SERVER_ERROR, fallback)
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(json!({ "error": self.message }))).into_response()
    }
}

type ApiResult<T> = std::result::Result<T, ApiError>;

const CHANNEL_NOT_FOUND: &str = "Channel not found";

/// README page. Failures answer in plain text, not JSON.
pub async fn index(State(state): State<AppState>) -> Response {
    match tokio::fs::read_to_string(&state.readme_path).await {
        Ok(md) => Html(render_page(&md)).into_response(),
        Err(e) => {
            warn!(path = %state.readme_path.display(), error = %e, "readme unreadable");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Error loading documentation",
            )
                .into_response()
        }
    }
}

fn render_page(md: &str) -> String {
    let mut opts = Options::empty();
    opts.insert(Options::ENABLE_STRIKETHROUGH);
    opts.insert(Options::ENABLE_TABLES);
    let parser = Parser::new_ext(md, opts);
    let mut body = String::new();
    html::push_html(&mut body, parser);

    format!(
        "<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n<meta charset=\"utf-8\">\n\
         <title>Telegram Channel Feeds</title>\n\
         <style>body{{max-width:50rem;margin:2rem auto;padding:0 1rem;font-family:sans-serif;line-height:1.5}}\
         pre{{background:#f4f4f4;padding:1rem;overflow-x:auto}}</style>\n\
         </head>\n<body>\n{body}</body>\n</html>\n"
    )
}

pub async fn list_messages(
    State(state): State<AppState>,
    Path(channel): Path<String>,
) -> ApiResult<Response> {
    let channel = validate_channel(&channel)
        .map_err(|e| ApiError::from_core(e, CHANNEL_NOT_FOUND, "Failed to fetch messages"))?;
    let messages = state
        .worker
        .fetch_all_messages(channel)
        .await
        .map_err(|e| ApiError::from_core(e, CHANNEL_NOT_FOUND, "Failed to fetch messages"))?;
    Ok(Json(json!({ "messages": messages })).into_response())
}

pub async fn get_message(
    State(state): State<AppState>,
    Path((channel, message_id)): Path<(String, String)>,
) -> ApiResult<Response> {
    let map = |e: Error| ApiError::from_core(e, "Message not found", "Failed to fetch message");
    let channel = validate_channel(&channel).map_err(|_| {
        ApiError::new(StatusCode::BAD_REQUEST, "Channel username is required")
    })?;
    let id = parse_message_id(&message_id).map_err(map)?;
    let message = state
        .worker
        .fetch_message_by_id(channel, id)
        .await
        .map_err(map)?;
    Ok(Json(json!({ "message": message })).into_response())
}

#[derive(Debug, Default, Deserialize)]
pub struct FeedQuery {
    format: Option<String>,
}

pub async fn feed(
    State(state): State<AppState>,
    Path(channel): Path<String>,
    Query(query): Query<FeedQuery>,
) -> ApiResult<Response> {
    let map = |e: Error| ApiError::from_core(e, CHANNEL_NOT_FOUND, "Failed to generate feed");
    let channel = validate_channel(&channel).map_err(map)?;
    let format = FeedFormat::parse(query.format.as_deref());

    let messages = state.worker.fetch_all_messages(channel).await.map_err(map)?;
    let mut feed = ChannelFeed::new(channel, Utc::now());
    feed.add_messages(&messages);
    let body = feed.render(format).map_err(map)?;

    Ok(([(header::CONTENT_TYPE, format.content_type())], body).into_response())
}
