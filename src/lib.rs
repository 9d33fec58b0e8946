pub mod assistant;
pub mod cli;
pub mod config;
pub mod context;
pub mod error;
pub mod history;
pub mod llm;
pub mod models;
pub mod server;
pub mod verify;
pub mod workspace;

use assistant::DevAssistant;
use cli::Args;
use log::info;
use server::Server;
use std::error::Error;
use std::sync::Arc;

pub async fn run(args: Args) -> Result<(), Box<dyn Error + Send + Sync>> {
    info!("--- Core Configuration ---");
    info!("Server Address: {}", args.server_addr);
    info!("Project Root: {}", args.project_root);
    info!("Versions Dir: {}", args.versions_dir);
    info!("Chat LLM Type: {}", args.chat_llm_type);
    info!("Chat Model: {}", args.chat_model.as_deref().unwrap_or("adapter default"));
    info!("Check Command: {}", args.check_command);
    info!("Max Repair Attempts: {}", args.max_repair_attempts);
    info!("Max File Size: {}", args.max_file_size);
    info!("Context Walk Limits: depth={} entries={}", args.context_max_depth, args.context_max_files);
    info!("Prompts Path: {}", args.prompts_path.as_deref().unwrap_or("built-in"));
    info!("TLS Enabled: {}", args.enable_tls);
    info!("-------------------------");

    let assistant = Arc::new(DevAssistant::from_args(&args).await?);
    let addr = args.server_addr.clone();
    info!("Starting server on: {}", addr);
    let server = Server::new(addr, assistant, args);
    server.run().await?;

    Ok(())
}
