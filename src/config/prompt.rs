use serde::Deserialize;
use std::error::Error;
use std::fmt;
use std::fs;
use std::sync::Arc;
use log::info;

pub const DEFAULT_SYSTEM_PROMPT: &str =
    "You are an expert on the UseReady's company policies and guidelines and your job is to \
answer all the questions related to the company, it's projects, guidelines etc. Assume that all \
questions are related to the UseReady policies and guidelines and the related documentation. \
Keep your answers technical and based on facts. Do not hallucinate features.";

pub const DEFAULT_GREETING: &str = "Ask me a question about UseReady's work policies!";

pub const DEFAULT_CONDENSE_TEMPLATE: &str =
    "Given a conversation (between Human and Assistant) and a follow up message from Human, \
rewrite the message to be a standalone question that captures all relevant context from the \
conversation.

<Chat History>
{chat_history}

<Follow Up Message>
{question}

<Standalone question>
";

pub const DEFAULT_TEXT_QA_TEMPLATE: &str =
    "Context information is below.
---------------------
{context_str}
---------------------
Given the context information and not prior knowledge, answer the query.
Query: {query_str}
Answer: ";

#[derive(Debug)]
pub enum PromptError {
    MissingPlaceholder {
        template: &'static str,
        placeholder: &'static str,
    },
    IoError(std::io::Error),
    JsonError(serde_json::Error),
}

impl fmt::Display for PromptError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PromptError::MissingPlaceholder { template, placeholder } =>
                write!(f, "Prompt template '{}' is missing placeholder '{}'", template, placeholder),
            PromptError::IoError(e) => write!(f, "Prompt file IO error: {}", e),
            PromptError::JsonError(e) => write!(f, "Prompt JSON parsing error: {}", e),
        }
    }
}

impl Error for PromptError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            PromptError::IoError(e) => Some(e),
            PromptError::JsonError(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for PromptError {
    fn from(err: std::io::Error) -> Self {
        PromptError::IoError(err)
    }
}

impl From<serde_json::Error> for PromptError {
    fn from(err: serde_json::Error) -> Self {
        PromptError::JsonError(err)
    }
}

/// Prompt set used by the assistant. Any field left out of an override file
/// keeps its built-in value.
#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct PromptConfig {
    pub system_prompt: String,
    pub greeting: String,
    pub condense_question: String,
    pub text_qa: String,
}

impl Default for PromptConfig {
    fn default() -> Self {
        Self {
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
            greeting: DEFAULT_GREETING.to_string(),
            condense_question: DEFAULT_CONDENSE_TEMPLATE.to_string(),
            text_qa: DEFAULT_TEXT_QA_TEMPLATE.to_string(),
        }
    }
}

impl PromptConfig {
    pub fn validate(&self) -> Result<(), PromptError> {
        let required: [(&'static str, &str, &'static str); 4] = [
            ("condense_question", &self.condense_question, "{chat_history}"),
            ("condense_question", &self.condense_question, "{question}"),
            ("text_qa", &self.text_qa, "{context_str}"),
            ("text_qa", &self.text_qa, "{query_str}"),
        ];
        for (template, text, placeholder) in required {
            if !text.contains(placeholder) {
                return Err(PromptError::MissingPlaceholder { template, placeholder });
            }
        }
        Ok(())
    }
}

pub fn load_prompts_from_str(content: &str) -> Result<PromptConfig, PromptError> {
    let config: PromptConfig = serde_json::from_str(content)?;
    config.validate()?;
    Ok(config)
}

/// Loads the prompt set, falling back to the built-in prompts when no path is given.
pub fn load_prompts(path: Option<&str>) -> Result<Arc<PromptConfig>, Box<dyn Error + Send + Sync>> {
    let Some(path) = path.filter(|p| !p.trim().is_empty()) else {
        return Ok(Arc::new(PromptConfig::default()));
    };

    let file_content = fs
        ::read_to_string(path)
        .map_err(|e| format!("Failed to read prompts file '{}': {}", path, e))?;
    let config = load_prompts_from_str(&file_content).map_err(|e|
        format!("Failed to load prompts file '{}': {}", path, e)
    )?;
    info!("Loaded prompt overrides from {}", path);
    Ok(Arc::new(config))
}

pub fn get_condense_prompt(config: &PromptConfig, chat_history: &str, question: &str) -> String {
    config.condense_question
        .replace("{chat_history}", chat_history)
        .replace("{question}", question)
}

pub fn get_text_qa_prompt(config: &PromptConfig, context: &str, query: &str) -> String {
    config.text_qa.replace("{context_str}", context).replace("{query_str}", query)
}
