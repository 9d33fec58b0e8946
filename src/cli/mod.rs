use clap::Parser;

#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    // --- Project Args ---
    /// Root directory of the project the assistant edits.
    #[arg(long, env = "PROJECT_ROOT", default_value = ".")]
    pub project_root: String,

    /// Directory holding version records and the current pointer, relative to the project root.
    #[arg(long, env = "VERSIONS_DIR", default_value = ".versions")]
    pub versions_dir: String,

    // --- Chat LLM Provider Args ---
    /// Type of LLM provider for chat completion (anthropic, openai)
    #[arg(long, env = "CHAT_LLM_TYPE", default_value = "anthropic")]
    pub chat_llm_type: String,

    /// Base URL for the Chat LLM provider API. Adapter default when unset.
    #[arg(long, env = "CHAT_BASE_URL")]
    pub chat_base_url: Option<String>,

    /// API Key for the Chat LLM provider. Anthropic falls back to ANTHROPIC_API_KEY when empty.
    #[arg(long, env = "CHAT_API_KEY", default_value = "")]
    pub chat_api_key: String,

    /// Model name for chat completion (e.g., claude-sonnet-4-20250514, gpt-4o)
    #[arg(long, env = "CHAT_MODEL")]
    pub chat_model: Option<String>,

    /// Maximum tokens requested per completion.
    #[arg(long, env = "CHAT_MAX_TOKENS", default_value = "4096")]
    pub chat_max_tokens: u32,

    // --- Pipeline Args ---
    /// Type-check command run in the project root after every edit round.
    #[arg(long, env = "CHECK_COMMAND", default_value = "npx tsc --noEmit --skipLibCheck")]
    pub check_command: String,

    /// Number of repair rounds attempted after a failed type check.
    #[arg(long, env = "MAX_REPAIR_ATTEMPTS", default_value = "2")]
    pub max_repair_attempts: usize,

    /// Largest file (in bytes) included in the project context.
    #[arg(long, env = "MAX_FILE_SIZE", default_value = "102400")]
    pub max_file_size: u64,

    /// Deepest directory level visited while walking the project tree.
    #[arg(long, env = "CONTEXT_MAX_DEPTH", default_value = "16")]
    pub context_max_depth: usize,

    /// Maximum number of entries visited per project walk.
    #[arg(long, env = "CONTEXT_MAX_FILES", default_value = "5000")]
    pub context_max_files: usize,

    /// Optional JSON file overriding the system prompt and the repair template.
    #[arg(long, env = "PROMPTS_PATH")]
    pub prompts_path: Option<String>,

    // --- General App Args ---
    /// Host address and port for the server to listen on.
    #[arg(long, env = "SERVER_ADDR", default_value = "127.0.0.1:4000")]
    pub server_addr: String,

    /// Optional API Key required for clients to call the server. If set, clients must provide this key.
    #[arg(long, env = "SERVER_API_KEY")]
    pub server_api_key: Option<String>,

    /// Optional path to the TLS certificate file (PEM format). Requires --tls-key-path.
    #[arg(long, env = "TLS_CERT_PATH")]
    pub tls_cert_path: Option<String>,

    /// Optional path to the TLS private key file (PEM format). Requires --tls-cert-path.
    #[arg(long, env = "TLS_KEY_PATH")]
    pub tls_key_path: Option<String>,

    #[arg(long, env = "ENABLE_TLS", default_value = "false")]
    pub enable_tls: bool,
}
