use axum::{
    extract::{ Path, Query, State },
    http::{ HeaderMap, StatusCode },
    response::{ Html, IntoResponse, Response },
    Json,
};
use log::warn;
use serde::{ Deserialize, Serialize };
use subtle::ConstantTimeEq;

use super::AppState;
use crate::models::chat::ChatMessage;

const INDEX_HTML: &str = include_str!("../../static/index.html");

pub const API_KEY_HEADER: &str = "x-api-key";

#[derive(Deserialize, Default)]
pub struct AuthQuery {
    pub api_key: Option<String>,
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    documents: usize,
    nodes: usize,
}

#[derive(Serialize)]
struct TranscriptResponse {
    session_id: String,
    messages: Vec<ChatMessage>,
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

/// Accepts the key from the `X-API-Key` header or the `api_key` query parameter.
pub fn authorized(expected: Option<&str>, headers: &HeaderMap, query_key: Option<&str>) -> bool {
    let Some(expected) = expected else {
        return true;
    };
    let header_key = headers.get(API_KEY_HEADER).and_then(|v| v.to_str().ok());
    [header_key, query_key]
        .into_iter()
        .flatten()
        .any(|candidate| keys_match(candidate, expected))
}

fn keys_match(candidate: &str, expected: &str) -> bool {
    candidate.as_bytes().ct_eq(expected.as_bytes()).into()
}

fn error_response(status: StatusCode, message: impl Into<String>) -> Response {
    (status, Json(ErrorResponse { error: message.into() })).into_response()
}

pub async fn index() -> Html<&'static str> {
    Html(INDEX_HTML)
}

pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    let index = state.assistant.index();
    Json(HealthResponse {
        status: "ok",
        documents: index.document_count(),
        nodes: index.nodes().len(),
    })
}

pub async fn session_messages(
    State(state): State<AppState>,
    Path(id): Path<String>,
    headers: HeaderMap,
    Query(auth): Query<AuthQuery>
) -> Response {
    if !authorized(state.api_key.as_deref(), &headers, auth.api_key.as_deref()) {
        warn!("Rejected transcript request for session {}: bad API key", id);
        return error_response(StatusCode::UNAUTHORIZED, "invalid or missing API key");
    }

    let Some(session) = state.sessions.get(&id).await else {
        return error_response(StatusCode::NOT_FOUND, format!("unknown session '{}'", id));
    };
    let messages = session.lock().await.transcript().entries().to_vec();
    Json(TranscriptResponse { session_id: id, messages }).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn open_server_accepts_everything() {
        assert!(authorized(None, &HeaderMap::new(), None));
    }

    #[test]
    fn key_is_accepted_from_header_or_query() {
        let mut headers = HeaderMap::new();
        headers.insert(API_KEY_HEADER, HeaderValue::from_static("secret"));
        assert!(authorized(Some("secret"), &headers, None));
        assert!(authorized(Some("secret"), &HeaderMap::new(), Some("secret")));
        assert!(!authorized(Some("secret"), &HeaderMap::new(), Some("guess")));
        assert!(!authorized(Some("secret"), &HeaderMap::new(), None));
    }

    #[test]
    fn near_miss_keys_are_rejected() {
        assert!(keys_match("secret", "secret"));
        assert!(!keys_match("secreT", "secret"));
        assert!(!keys_match("secret-and-more", "secret"));
        assert!(!keys_match("", "secret"));

        let mut headers = HeaderMap::new();
        headers.insert(API_KEY_HEADER, HeaderValue::from_static("secre"));
        assert!(!authorized(Some("secret"), &headers, None));
        assert!(authorized(Some("secret"), &headers, Some("secret")));
    }
}
