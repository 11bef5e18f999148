pub mod assistant;
pub mod cache;
pub mod cli;
pub mod config;
pub mod engine;
pub mod history;
pub mod llm;
pub mod models;
pub mod rag;
pub mod server;
pub mod session;

#[cfg(test)]
pub(crate) mod testing;

use assistant::PolicyAssistant;
use cli::Args;
use log::info;
use server::Server;
use std::error::Error;
use std::sync::Arc;

pub async fn run(args: Args) -> Result<(), Box<dyn Error + Send + Sync>> {
    info!("--- Core Configuration ---");
    info!("Server Address: {}", args.server_addr);
    info!("Data Directory: {} (recursive: {})", args.data_dir, args.recursive);
    info!("Chat LLM Type: {}", args.chat_llm_type);
    info!(
        "Chat Model: {} (temperature {})",
        args.chat_model.as_deref().unwrap_or("adapter default"),
        args.temperature
    );
    info!("Embedding LLM Type: {}", args.embedding_llm_type);
    info!("Prompts Path: {}", args.prompts_path.as_deref().unwrap_or("built-in"));
    info!("Chunk Size / Overlap: {} / {}", args.chunk_size, args.chunk_overlap);
    info!("Similarity Top K: {}", args.similarity_top_k);
    info!("Memory Token Limit: {}", args.memory_token_limit);
    info!("Session Idle TTL: {}s", args.session_idle_ttl_secs);
    info!("TLS Enabled: {}", args.enable_tls);
    info!("-------------------------");

    let assistant = Arc::new(PolicyAssistant::new(&args).await?);
    let addr = args.server_addr.clone();
    info!("Starting server on: {}", addr);
    let server = Server::new(addr, assistant, args.server_api_key.clone(), &args)?;
    server.run().await?;

    Ok(())
}
