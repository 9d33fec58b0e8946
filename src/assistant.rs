use log::{ info, warn };
use std::collections::BTreeMap;
use std::error::Error;
use std::path::{ Path, PathBuf };
use std::sync::Arc;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::cli::Args;
use crate::config::prompt::{ self, PromptConfig };
use crate::context::{ ContextLimits, ProjectContext };
use crate::error::AssistantError;
use crate::history::VersionStore;
use crate::llm::LlmConfig;
use crate::llm::chat::{ ChatClient, CompletionRequest, SystemBlock, Turn, TurnRole, Usage, new_client };
use crate::llm::reply::{ parse_model_reply, ModelResponse };
use crate::models::api::{ CacheStats, ChangeOutcome, VersionListing };
use crate::models::chat::{ latest_user_intent, ChatMessage };
use crate::models::version::Version;
use crate::verify::{ CommandVerifier, CompileVerifier };
use crate::workspace::guard::PathGuard;
use crate::workspace::write_files;

pub const DEFAULT_MAX_REPAIR_ATTEMPTS: usize = 2;
pub const DEFAULT_MAX_TOKENS: u32 = 4096;

/// Turns natural-language change requests into file edits, type-checks them
/// and records compile-clean results in the version history.
///
/// Change requests and rollbacks on one assistant are serialised through a
/// single lease, so two edits never interleave their writes.
pub struct DevAssistant {
    root: PathBuf,
    chat_client: Arc<dyn ChatClient>,
    verifier: Arc<dyn CompileVerifier>,
    store: Arc<VersionStore>,
    context: Arc<ProjectContext>,
    guard: PathGuard,
    prompts: PromptConfig,
    max_repair_attempts: usize,
    max_tokens: u32,
    lease: Mutex<()>,
}

impl DevAssistant {
    pub fn new(
        root: impl Into<PathBuf>,
        chat_client: Arc<dyn ChatClient>,
        verifier: Arc<dyn CompileVerifier>,
        store: Arc<VersionStore>
    ) -> Self {
        let root = root.into();
        let guard = PathGuard::default();
        let context = Arc::new(
            ProjectContext::new(&root, guard.allowed_roots(), ContextLimits::default())
        );
        Self {
            root,
            chat_client,
            verifier,
            store,
            context,
            guard,
            prompts: PromptConfig::default(),
            max_repair_attempts: DEFAULT_MAX_REPAIR_ATTEMPTS,
            max_tokens: DEFAULT_MAX_TOKENS,
            lease: Mutex::new(()),
        }
    }

    pub fn with_prompts(mut self, prompts: PromptConfig) -> Self {
        self.prompts = prompts;
        self
    }

    pub fn with_context_limits(mut self, limits: ContextLimits) -> Self {
        self.context = Arc::new(ProjectContext::new(&self.root, self.guard.allowed_roots(), limits));
        self
    }

    pub fn with_max_repair_attempts(mut self, attempts: usize) -> Self {
        self.max_repair_attempts = attempts;
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub async fn from_args(args: &Args) -> Result<Self, Box<dyn Error + Send + Sync>> {
        let root = std::fs::canonicalize(&args.project_root)
            .map_err(|e| format!("Invalid project root '{}': {}", args.project_root, e))?;

        let chat_api_key = if !args.chat_api_key.is_empty() {
            Some(args.chat_api_key.clone())
        } else {
            None
        };
        let chat_config = LlmConfig {
            llm_type: args.chat_llm_type.parse()?,
            base_url: args.chat_base_url.clone(),
            api_key: chat_api_key,
            completion_model: args.chat_model.clone(),
        };
        let chat_client = new_client(&chat_config)?;
        info!(
            "Chat client configured: Type={}, Model={}, BaseURL={}",
            chat_config.llm_type,
            chat_client.get_model(),
            chat_client.get_base_url().as_deref().unwrap_or("adapter default")
        );

        let verifier = CommandVerifier::new(&args.check_command, &root)?;
        info!("Compile check: {}", verifier.command_line());

        let store = Arc::new(VersionStore::new(root.join(&args.versions_dir)));
        info!("Version history stored in: {}", store.dir().display());

        let prompts = match &args.prompts_path {
            Some(path) => prompt::load_prompts(path)?,
            None => PromptConfig::default(),
        };

        let limits = ContextLimits {
            max_file_size: args.max_file_size,
            max_depth: args.context_max_depth,
            max_entries: args.context_max_files,
        };

        Ok(
            Self::new(root, chat_client, Arc::new(verifier), store)
                .with_prompts(prompts)
                .with_context_limits(limits)
                .with_max_repair_attempts(args.max_repair_attempts)
                .with_max_tokens(args.chat_max_tokens)
        )
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn store(&self) -> &VersionStore {
        &self.store
    }

    fn validate_files(
        &self,
        request_id: &str,
        files: &BTreeMap<String, String>
    ) -> Result<(), AssistantError> {
        let rejected = self.guard.unsafe_paths(files.keys());
        if rejected.is_empty() {
            return Ok(());
        }
        warn!("[{}] Unsafe file paths blocked: {:?}", request_id, rejected);
        Err(AssistantError::UnsafePaths(rejected))
    }

    async fn call_model(
        &self,
        request_id: &str,
        round: usize,
        turns: Vec<Turn>,
        project_context: &str
    ) -> Result<(ModelResponse, Usage), AssistantError> {
        let request = CompletionRequest {
            system: vec![
                SystemBlock { text: self.prompts.system_prompt.clone(), cacheable: false },
                SystemBlock { text: project_context.to_string(), cacheable: true },
            ],
            turns,
            max_tokens: self.max_tokens,
        };
        let completion = self.chat_client.complete(request).await?;
        info!(
            "[{}] Model round {}: input={} output={} cache_read={} cache_write={}",
            request_id,
            round,
            completion.usage.input_tokens,
            completion.usage.output_tokens,
            completion.usage.cache_read_input_tokens,
            completion.usage.cache_creation_input_tokens
        );
        let response = parse_model_reply(&completion.text).into_result()?;
        Ok((response, completion.usage))
    }

    /// Runs one change request to completion: context, model call, write,
    /// type check and up to `max_repair_attempts` repair rounds.
    ///
    /// An unresolved type check is a normal outcome with `fixed: false`; it
    /// leaves the edited files in place and records no version.
    pub async fn handle_change_request(
        &self,
        messages: &[ChatMessage]
    ) -> Result<ChangeOutcome, AssistantError> {
        if messages.is_empty() {
            return Err(AssistantError::InvalidInput("Messages are required.".to_string()));
        }
        let request_id = Uuid::new_v4().simple().to_string()[..8].to_string();
        let _lease = self.lease.lock().await;

        let intent = latest_user_intent(messages);
        let bundle = self.context.build_bundle(&intent).await?;
        let project_context = bundle.render();
        info!(
            "[{}] Context bundle: {} files, {} bytes",
            request_id,
            bundle.files.len(),
            project_context.len()
        );

        let turns: Vec<Turn> = messages.iter().map(Turn::from).collect();
        let (initial, usage) = self.call_model(&request_id, 0, turns.clone(), &project_context).await?;
        let mut total_usage = usage;

        self.validate_files(&request_id, &initial.files)?;
        let mut final_message = initial.message;
        let mut applied = initial.files;
        write_files(&self.root, &applied).await?;

        let mut check = self.verifier.run_check().await;
        let mut fixed = false;
        let mut diagnostics = String::new();

        if !check.ok {
            diagnostics = check.diagnostics.clone();
            for attempt in 1..=self.max_repair_attempts {
                info!("[{}] Type check failed, repair attempt {}", request_id, attempt);
                let repair = self.prompts.repair_prompt(&intent, &applied, &diagnostics)?;
                let mut repair_turns = turns.clone();
                repair_turns.push(Turn { role: TurnRole::User, content: repair });

                let (fix, usage) = self.call_model(&request_id, attempt, repair_turns, &project_context).await?;
                total_usage += usage;

                if !fix.files.is_empty() {
                    self.validate_files(&request_id, &fix.files)?;
                    write_files(&self.root, &fix.files).await?;
                    applied.extend(fix.files);
                }
                if !fix.message.is_empty() {
                    final_message = fix.message;
                }

                check = self.verifier.run_check().await;
                if check.ok {
                    fixed = true;
                    break;
                }
                diagnostics = check.diagnostics.clone();
            }
        }

        let outcome = ChangeOutcome {
            message: final_message,
            changes: applied.keys().cloned().collect(),
            errors: if diagnostics.is_empty() { Vec::new() } else { vec![diagnostics] },
            fixed,
            cache_stats: CacheStats { cache_read_input_tokens: total_usage.cache_read_input_tokens },
        };
        info!(
            "[{}] Cache read tokens: {}",
            request_id,
            outcome.cache_stats.cache_read_input_tokens
        );

        if !check.ok {
            warn!(
                "[{}] Type check still failing after {} repair attempts; no version saved",
                request_id,
                self.max_repair_attempts
            );
            return Ok(outcome);
        }

        let description = if outcome.message.is_empty() { &intent } else { &outcome.message };
        let version = self.store.save(description, &applied).await?;
        info!("[{}] Change applied as version {}", request_id, version.id);
        Ok(outcome)
    }

    pub async fn rollback(&self, version_id: &str) -> Result<Version, AssistantError> {
        if version_id.is_empty() {
            return Err(AssistantError::InvalidInput("versionId is required.".to_string()));
        }
        let _lease = self.lease.lock().await;
        self.store.rollback(version_id, &self.guard, &self.root).await
    }

    pub async fn list_versions(&self) -> Result<VersionListing, AssistantError> {
        let versions = self.store.list().await?;
        let current = self.store.get_current().await;
        Ok(VersionListing { versions, current })
    }
}
