use clap::Parser;

#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    // --- Document Args ---
    /// Directory holding the policy documents to index.
    #[arg(long, env = "DATA_DIR", default_value = "./data")]
    pub data_dir: String,

    /// Also index documents in subdirectories of the data directory.
    #[arg(long, env = "DATA_RECURSIVE", default_value = "false")]
    pub recursive: bool,

    /// Comma-separated list of file extensions to index (e.g., "md,txt,pdf"). Empty indexes every file.
    #[arg(long, env = "DATA_REQUIRED_EXTS")]
    pub required_exts: Option<String>,

    // --- Chat LLM Provider Args ---
    /// Type of LLM provider for chat completion (openai, ollama)
    #[arg(long, env = "CHAT_LLM_TYPE", default_value = "openai")]
    pub chat_llm_type: String,

    /// Base URL for the Chat LLM provider API (e.g., http://localhost:11434 for Ollama)
    #[arg(long, env = "CHAT_BASE_URL")] // No default, let adapters handle defaults if None
    pub chat_base_url: Option<String>,

    /// API Key for the Chat LLM provider.
    #[arg(long, env = "OPENAI_API_KEY", default_value = "", hide_env_values = true)]
    pub chat_api_key: String,

    /// Model name for chat completion (e.g., gpt-4, llama3). Defaults to gpt-4 for OpenAI.
    #[arg(long, env = "CHAT_MODEL")] // No default, rely on adapter defaults if None
    pub chat_model: Option<String>,

    /// Sampling temperature for answers.
    #[arg(long, env = "CHAT_TEMPERATURE", default_value = "0.2")]
    pub temperature: f32,

    // --- Embedding LLM Provider Args ---
    /// Type of LLM provider for text embedding (openai, ollama)
    #[arg(long, env = "EMBEDDING_LLM_TYPE", default_value = "openai")]
    pub embedding_llm_type: String,

    /// Base URL for the Embedding LLM provider API.
    #[arg(long, env = "EMBEDDING_BASE_URL")] // No default, let adapters handle defaults if None
    pub embedding_base_url: Option<String>,

    /// API Key for the Embedding LLM provider. Defaults to the chat API key if not set.
    #[arg(long, env = "EMBEDDING_API_KEY", hide_env_values = true)]
    pub embedding_api_key: Option<String>,

    /// Model name for text embedding (e.g., text-embedding-ada-002, nomic-embed-text)
    #[arg(long, env = "EMBEDDING_MODEL")] // No default, rely on adapter defaults if None
    pub embedding_model: Option<String>,

    // --- Index & Engine Args ---
    /// Optional JSON file overriding the built-in prompts.
    #[arg(long, env = "PROMPTS_PATH")]
    pub prompts_path: Option<String>,

    /// Chunk size in approximate tokens.
    #[arg(long, env = "CHUNK_SIZE", default_value = "1024")]
    pub chunk_size: usize,

    /// Tokens shared between neighbouring chunks.
    #[arg(long, env = "CHUNK_OVERLAP", default_value = "20")]
    pub chunk_overlap: usize,

    /// Number of chunks sent per embedding request.
    #[arg(long, env = "EMBED_BATCH_SIZE", default_value = "10")]
    pub embed_batch_size: usize,

    /// Number of passages retrieved per question.
    #[arg(long, env = "SIMILARITY_TOP_K", default_value = "2")]
    pub similarity_top_k: usize,

    /// Approximate token budget of the conversation history used to condense follow-up questions.
    #[arg(long, env = "MEMORY_TOKEN_LIMIT", default_value = "3000")]
    pub memory_token_limit: usize,

    /// Seconds a session may sit with no open connection before it is discarded.
    #[arg(long, env = "SESSION_IDLE_TTL_SECS", default_value = "1800")]
    pub session_idle_ttl_secs: u64,

    // --- Server Args ---
    /// Host address and port for the server to listen on.
    #[arg(long, env = "SERVER_ADDR", default_value = "127.0.0.1:8501")]
    pub server_addr: String,

    /// Optional API Key required for clients to use the chat API and WebSocket. If set, clients must provide this key.
    #[arg(long, env = "SERVER_API_KEY", hide_env_values = true)]
    pub server_api_key: Option<String>,

    #[arg(long, env = "ENABLE_TLS", default_value = "false")]
    pub enable_tls: bool,

    /// Optional path to the TLS certificate file (PEM format). Requires --tls-key-path.
    #[arg(long, env = "TLS_CERT_PATH")]
    pub tls_cert_path: Option<String>,

    /// Optional path to the TLS private key file (PEM format). Requires --tls-cert-path.
    #[arg(long, env = "TLS_KEY_PATH")]
    pub tls_key_path: Option<String>,
}

impl Args {
    /// Embedding key, falling back to the chat key.
    pub fn resolved_embedding_api_key(&self) -> Option<String> {
        self.embedding_api_key
            .clone()
            .filter(|k| !k.trim().is_empty())
            .or_else(|| Some(self.chat_api_key.clone()).filter(|k| !k.trim().is_empty()))
    }
}
