use axum::{
    extract::{ ws::{ Message, WebSocket, WebSocketUpgrade }, Query, State },
    http::{ HeaderMap, StatusCode },
    response::{ IntoResponse, Response },
};
use futures::stream::SplitSink;
use futures::{ SinkExt, StreamExt };
use governor::{ clock::DefaultClock, state::{ InMemoryState, NotKeyed }, Quota, RateLimiter };
use lazy_static::lazy_static;
use log::{ debug, error, info, warn };
use serde::Deserialize;
use std::num::NonZeroU32;
use std::sync::Arc;
use tokio::sync::Mutex;

use super::api::authorized;
use super::AppState;
use crate::engine::StreamingChatResponse;
use crate::models::websocket::{ ClientMessage, ServerMessage };
use crate::session::{ ChatSession, SessionError, SessionState };

const MAX_MESSAGE_SIZE: usize = 1024 * 1024;

lazy_static! {
    static ref CONNECTION_LIMITER: RateLimiter<NotKeyed, InMemoryState, DefaultClock> =
        RateLimiter::direct(Quota::per_second(NonZeroU32::MIN.saturating_add(9)));
}

type WsSink = SplitSink<WebSocket, Message>;

#[derive(Deserialize, Default)]
pub struct WsParams {
    pub session: Option<String>,
    pub api_key: Option<String>,
}

pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(params): Query<WsParams>
) -> Response {
    if !authorized(state.api_key.as_deref(), &headers, params.api_key.as_deref()) {
        warn!("Rejected WebSocket connection: invalid or missing API key");
        return (StatusCode::UNAUTHORIZED, "invalid or missing API key").into_response();
    }
    if CONNECTION_LIMITER.check().is_err() {
        warn!("Global connection rate limit exceeded. Dropping connection.");
        return (StatusCode::TOO_MANY_REQUESTS, "too many connections").into_response();
    }

    ws.max_message_size(MAX_MESSAGE_SIZE).on_upgrade(move |socket|
        handle_socket(socket, state, params.session)
    )
}

/// Returns false once the client is gone.
async fn send_message(tx: &mut WsSink, message: &ServerMessage) -> bool {
    let json = match serde_json::to_string(message) {
        Ok(json) => json,
        Err(e) => {
            error!("Failed to serialize server message: {}", e);
            return false;
        }
    };
    tx.send(Message::Text(json.into())).await.is_ok()
}

async fn send_transcript(tx: &mut WsSink, session_id: &str, session: &Mutex<ChatSession>) -> bool {
    let messages = session.lock().await.render();
    send_message(tx, &ServerMessage::Transcript { session_id: session_id.to_string(), messages }).await
}

/// Relays a started response to the client and settles the session.
///
/// A client that disconnects mid-answer does not cancel it: the stream is
/// still drained so the answer lands in the transcript for the next visit.
async fn stream_answer(
    tx: &mut WsSink,
    session_id: &str,
    session: &Mutex<ChatSession>,
    started: Result<StreamingChatResponse, SessionError>
) -> bool {
    let mut response = match started {
        Ok(response) => response,
        Err(e) => {
            warn!("Could not answer in session {}: {}", session_id, e);
            return send_message(tx, &ServerMessage::Error { message: e.to_string() }).await;
        }
    };
    debug!("Session {} answering standalone question: {}", session_id, response.query());

    let mut connected = send_message(tx, &ServerMessage::Processing).await;
    while let Some(chunk) = response.next().await {
        match chunk {
            Ok(fragment) => {
                if connected {
                    connected = send_message(tx, &ServerMessage::Partial { content: fragment }).await;
                }
            }
            Err(e) => {
                error!("Stream error for session {}: {}", session_id, e);
                session.lock().await.abort_response();
                if !connected {
                    return false;
                }
                return send_message(tx, &ServerMessage::Error {
                    message: format!("Stream error: {}", e),
                }).await;
            }
        }
    }

    let finished = {
        let mut guard = session.lock().await;
        guard.finish_response(&response)
    };
    match finished {
        Ok(entry) => {
            connected &&
                send_message(tx, &ServerMessage::Done {
                    content: entry.content,
                    timestamp: entry.timestamp,
                }).await
        }
        Err(e) => {
            error!("Failed to record answer for session {}: {}", session_id, e);
            connected && send_message(tx, &ServerMessage::Error { message: e.to_string() }).await
        }
    }
}

async fn handle_socket(socket: WebSocket, state: AppState, requested_id: Option<String>) {
    let (session_id, session) = state.sessions.connect(requested_id.as_deref(), |id|
        state.assistant.new_session(id)
    ).await;
    info!("WebSocket connected for session {}", session_id);

    serve_session(socket, &session_id, session).await;

    state.sessions.disconnect(&session_id).await;
    info!("WebSocket connection closed for session {}", session_id);
}

async fn serve_session(socket: WebSocket, session_id: &str, session: Arc<Mutex<ChatSession>>) {
    let (mut tx, mut rx) = socket.split();

    if !send_transcript(&mut tx, session_id, &session).await {
        info!("Client for session {} left before the transcript was sent", session_id);
        return;
    }

    // A question left unanswered by an earlier connection is answered now.
    let pending = {
        let mut guard = session.lock().await;
        if guard.transcript().needs_response() && guard.state() != SessionState::GeneratingResponse {
            Some(guard.begin_response().await)
        } else {
            None
        }
    };
    if let Some(started) = pending {
        if !stream_answer(&mut tx, session_id, &session, started).await {
            return;
        }
    }

    while let Some(msg) = rx.next().await {
        let text = match msg {
            Ok(Message::Text(text)) => text,
            Ok(Message::Close(_)) => {
                info!("Received close frame for session {}", session_id);
                break;
            }
            Ok(Message::Binary(_)) => {
                warn!("Ignoring binary message for session {}", session_id);
                continue;
            }
            Ok(_) => {
                continue;
            }
            Err(e) => {
                info!("WebSocket error for session {}: {}", session_id, e);
                break;
            }
        };

        let keep_going = match serde_json::from_str::<ClientMessage>(text.as_str()) {
            Ok(ClientMessage::Chat { content }) => {
                let started = {
                    let mut guard = session.lock().await;
                    guard.ask(&content).await
                };
                stream_answer(&mut tx, session_id, &session, started).await
            }
            Ok(ClientMessage::Regenerate) => {
                let started = {
                    let mut guard = session.lock().await;
                    guard.begin_response().await
                };
                stream_answer(&mut tx, session_id, &session, started).await
            }
            Ok(ClientMessage::Reset) => {
                let reset = session.lock().await.reset();
                match reset {
                    Ok(()) => {
                        info!("Session {} reset", session_id);
                        send_transcript(&mut tx, session_id, &session).await
                    }
                    Err(e) => send_message(&mut tx, &ServerMessage::Error { message: e.to_string() }).await,
                }
            }
            Err(e) => {
                warn!("Failed to parse message for session {}: {}", session_id, e);
                send_message(&mut tx, &ServerMessage::Error {
                    message: format!("Failed to parse message: {}", e),
                }).await
            }
        };

        if !keep_going {
            break;
        }
    }
}
