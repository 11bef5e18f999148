use crate::llm::estimate_tokens;
use crate::models::chat::{ ChatMessage, Role };

pub const DEFAULT_MEMORY_TOKEN_LIMIT: usize = 3000;

/// Per-engine conversation memory.
///
/// Every turn is kept, but only the newest messages that fit in
/// `token_limit` are handed to prompts.
#[derive(Debug, Clone)]
pub struct ChatMemory {
    messages: Vec<ChatMessage>,
    token_limit: usize,
}

impl ChatMemory {
    pub fn new(token_limit: usize) -> Self {
        Self { messages: Vec::new(), token_limit }
    }

    pub fn put(&mut self, message: ChatMessage) {
        self.messages.push(message);
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn reset(&mut self) {
        self.messages.clear();
    }

    /// Newest messages whose combined size stays within the token limit,
    /// oldest first. A window never opens on an assistant reply.
    pub fn window(&self) -> &[ChatMessage] {
        let mut used = 0;
        let mut start = self.messages.len();
        for (i, msg) in self.messages.iter().enumerate().rev() {
            let cost = estimate_tokens(&msg.content);
            if used + cost > self.token_limit {
                break;
            }
            used += cost;
            start = i;
        }

        while start < self.messages.len() && self.messages[start].role == Role::Assistant {
            start += 1;
        }
        &self.messages[start..]
    }
}

impl Default for ChatMemory {
    fn default() -> Self {
        Self::new(DEFAULT_MEMORY_TOKEN_LIMIT)
    }
}

pub fn format_history_for_prompt(messages: &[ChatMessage]) -> String {
    let mut result = String::new();
    for msg in messages {
        result.push_str(&format!("{}: {}\n", msg.role.as_str(), msg.content));
    }
    result.trim_end().to_string()
}
