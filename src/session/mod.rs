mod store;

pub use store::{ is_valid_session_id, SessionStore, DEFAULT_SESSION_IDLE_TTL };

use log::{ debug, warn };
use thiserror::Error;

use crate::engine::{ ChatEngine, ChatEngineError, StreamingChatResponse };
use crate::models::chat::{ ChatMessage, Role };

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    AwaitingInput,
    RenderingTranscript,
    GeneratingResponse,
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("message is empty")]
    EmptyInput,
    #[error("a response is already being generated for this session")]
    Busy,
    #[error("there is no unanswered question in this session")]
    NothingToAnswer,
    #[error(transparent)] Engine(#[from] ChatEngineError),
}

/// Ordered chat entries shown to the user, starting with the greeting.
#[derive(Debug, Clone)]
pub struct Transcript {
    entries: Vec<ChatMessage>,
}

impl Transcript {
    pub fn new(greeting: &str) -> Self {
        Self { entries: vec![ChatMessage::assistant(greeting)] }
    }

    pub fn entries(&self) -> &[ChatMessage] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn last(&self) -> Option<&ChatMessage> {
        self.entries.last()
    }

    /// The last entry is a user message that has no answer yet.
    pub fn needs_response(&self) -> bool {
        self.last().map_or(false, |m| m.role == Role::User)
    }

    fn push(&mut self, message: ChatMessage) {
        self.entries.push(message);
    }
}

/// One browser conversation: its transcript, its chat engine and the
/// state of the render loop.
pub struct ChatSession {
    id: String,
    greeting: String,
    transcript: Transcript,
    engine: ChatEngine,
    state: SessionState,
}

impl ChatSession {
    pub fn new(id: impl Into<String>, engine: ChatEngine, greeting: &str) -> Self {
        Self {
            id: id.into(),
            greeting: greeting.to_string(),
            transcript: Transcript::new(greeting),
            engine,
            state: SessionState::AwaitingInput,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn transcript(&self) -> &Transcript {
        &self.transcript
    }

    pub fn engine(&self) -> &ChatEngine {
        &self.engine
    }

    /// Snapshot of the transcript for display.
    pub fn render(&mut self) -> Vec<ChatMessage> {
        if self.state == SessionState::GeneratingResponse {
            return self.transcript.entries().to_vec();
        }
        self.state = SessionState::RenderingTranscript;
        let entries = self.transcript.entries().to_vec();
        self.state = SessionState::AwaitingInput;
        entries
    }

    /// Appends a user entry. Surrounding whitespace is dropped.
    pub fn submit(&mut self, text: &str) -> Result<(), SessionError> {
        if self.state == SessionState::GeneratingResponse {
            return Err(SessionError::Busy);
        }
        let text = text.trim();
        if text.is_empty() {
            return Err(SessionError::EmptyInput);
        }
        self.transcript.push(ChatMessage::user(text));
        Ok(())
    }

    /// Starts answering the trailing user entry.
    ///
    /// The session stays in `GeneratingResponse` until
    /// [`ChatSession::finish_response`] or [`ChatSession::abort_response`].
    pub async fn begin_response(&mut self) -> Result<StreamingChatResponse, SessionError> {
        if self.state == SessionState::GeneratingResponse {
            return Err(SessionError::Busy);
        }
        let question = match self.transcript.last() {
            Some(last) if last.role == Role::User => last.content.clone(),
            _ => {
                return Err(SessionError::NothingToAnswer);
            }
        };

        self.state = SessionState::GeneratingResponse;
        debug!("Session {} generating a response", self.id);
        match self.engine.stream_chat(&question).await {
            Ok(response) => Ok(response),
            Err(e) => {
                self.state = SessionState::AwaitingInput;
                Err(e.into())
            }
        }
    }

    /// Submits `text` and starts answering it.
    pub async fn ask(&mut self, text: &str) -> Result<StreamingChatResponse, SessionError> {
        self.submit(text)?;
        self.begin_response().await
    }

    /// Records a drained response and appends it as one assistant entry.
    pub fn finish_response(
        &mut self,
        response: &StreamingChatResponse
    ) -> Result<ChatMessage, SessionError> {
        self.state = SessionState::AwaitingInput;
        self.engine.record_turn(response)?;
        let entry = ChatMessage::assistant(response.response());
        self.transcript.push(entry.clone());
        Ok(entry)
    }

    /// Leaves the user entry unanswered so the next render pass retries it.
    pub fn abort_response(&mut self) {
        if self.state == SessionState::GeneratingResponse {
            warn!("Session {} response aborted; question left unanswered", self.id);
        }
        self.state = SessionState::AwaitingInput;
    }

    /// Answers the trailing user entry without streaming.
    pub async fn respond(&mut self) -> Result<ChatMessage, SessionError> {
        let mut response = self.begin_response().await?;
        if let Err(e) = response.collect_response().await {
            self.abort_response();
            return Err(e.into());
        }
        self.finish_response(&response)
    }

    /// Clears the conversation back to the greeting.
    pub fn reset(&mut self) -> Result<(), SessionError> {
        if self.state == SessionState::GeneratingResponse {
            return Err(SessionError::Busy);
        }
        self.transcript = Transcript::new(&self.greeting);
        self.engine.reset();
        Ok(())
    }
}
