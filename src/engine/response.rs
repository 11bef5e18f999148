use futures::{ Stream, StreamExt };
use std::error::Error as StdError;
use std::pin::Pin;
use std::task::{ Context, Poll };

use super::ChatEngineError;
use crate::llm::chat::ChatStream;
use crate::rag::ScoredNode;

/// A streamed answer for one turn.
///
/// Yields answer chunks as the provider produces them and keeps the text
/// seen so far. It can be drained once; afterwards it only yields `None`.
pub struct StreamingChatResponse {
    user_message: String,
    query: String,
    sources: Vec<ScoredNode>,
    stream: ChatStream,
    response: String,
    done: bool,
    error: Option<String>,
}

impl StreamingChatResponse {
    pub fn new(
        user_message: String,
        query: String,
        sources: Vec<ScoredNode>,
        stream: ChatStream
    ) -> Self {
        Self {
            user_message,
            query,
            sources,
            stream,
            response: String::new(),
            done: false,
            error: None,
        }
    }

    pub fn user_message(&self) -> &str {
        &self.user_message
    }

    /// The standalone question used for retrieval.
    pub fn query(&self) -> &str {
        &self.query
    }

    pub fn sources(&self) -> &[ScoredNode] {
        &self.sources
    }

    /// Text accumulated from the chunks consumed so far.
    pub fn response(&self) -> &str {
        &self.response
    }

    pub fn is_done(&self) -> bool {
        self.done
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Drained without a provider error.
    pub fn is_complete(&self) -> bool {
        self.done && self.error.is_none()
    }

    /// Drains the remaining chunks and returns the full answer.
    pub async fn collect_response(&mut self) -> Result<String, ChatEngineError> {
        while let Some(chunk) = self.next().await {
            chunk.map_err(|e| ChatEngineError::Failed(e.to_string()))?;
        }
        match &self.error {
            Some(e) => Err(ChatEngineError::Failed(e.clone())),
            None => Ok(self.response.clone()),
        }
    }
}

impl Stream for StreamingChatResponse {
    type Item = Result<String, Box<dyn StdError + Send + Sync>>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        if this.done {
            return Poll::Ready(None);
        }

        match this.stream.as_mut().poll_next(cx) {
            Poll::Ready(Some(Ok(chunk))) => {
                this.response.push_str(&chunk);
                Poll::Ready(Some(Ok(chunk)))
            }
            Poll::Ready(Some(Err(e))) => {
                this.done = true;
                this.error = Some(e.to_string());
                Poll::Ready(Some(Err(e)))
            }
            Poll::Ready(None) => {
                this.done = true;
                Poll::Ready(None)
            }
            Poll::Pending => Poll::Pending,
        }
    }
}
