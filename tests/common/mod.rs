#![allow(dead_code)]

use async_trait::async_trait;
use dev_assistant::assistant::DevAssistant;
use dev_assistant::history::VersionStore;
use dev_assistant::llm::chat::{ ChatClient, CompletionRequest, CompletionResponse, LlmError, Usage };
use dev_assistant::verify::{ CheckReport, CompileVerifier };
use serde_json::json;
use std::collections::VecDeque;
use std::path::Path;
use std::sync::atomic::{ AtomicUsize, Ordering };
use std::sync::{ Arc, Mutex };
use tokio::sync::Notify;

/// Replays canned completions in order and records every request.
#[derive(Default)]
pub struct ScriptedChat {
    replies: Mutex<VecDeque<String>>,
    pub requests: Mutex<Vec<CompletionRequest>>,
}

impl ScriptedChat {
    pub fn new(replies: Vec<String>) -> Arc<Self> {
        Arc::new(Self {
            replies: Mutex::new(replies.into()),
            requests: Mutex::new(Vec::new()),
        })
    }

    pub fn calls(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn request(&self, index: usize) -> CompletionRequest {
        self.requests.lock().unwrap()[index].clone()
    }
}

#[async_trait]
impl ChatClient for ScriptedChat {
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, LlmError> {
        self.requests.lock().unwrap().push(request);
        let text = self.replies
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| LlmError::Transport("no scripted reply left".to_string()))?;
        Ok(CompletionResponse {
            text,
            usage: Usage {
                input_tokens: 100,
                output_tokens: 20,
                cache_read_input_tokens: 50,
                cache_creation_input_tokens: 0,
            },
        })
    }

    fn get_model(&self) -> String {
        "scripted".to_string()
    }

    fn get_base_url(&self) -> Option<String> {
        None
    }
}

/// Like [`ScriptedChat`], but the first call parks until `release` is
/// notified. `entered` fires on every call.
pub struct GatedChat {
    inner: Arc<ScriptedChat>,
    calls: AtomicUsize,
    pub entered: Notify,
    pub release: Notify,
}

impl GatedChat {
    pub fn new(replies: Vec<String>) -> Arc<Self> {
        Arc::new(Self {
            inner: ScriptedChat::new(replies),
            calls: AtomicUsize::new(0),
            entered: Notify::new(),
            release: Notify::new(),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ChatClient for GatedChat {
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, LlmError> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst);
        self.entered.notify_one();
        if n == 0 {
            self.release.notified().await;
        }
        self.inner.complete(request).await
    }

    fn get_model(&self) -> String {
        "gated".to_string()
    }

    fn get_base_url(&self) -> Option<String> {
        None
    }
}

/// Returns queued reports, then passes once the queue is empty.
#[derive(Default)]
pub struct ScriptedCheck {
    reports: Mutex<VecDeque<CheckReport>>,
    runs: Mutex<usize>,
}

impl ScriptedCheck {
    pub fn new(reports: Vec<CheckReport>) -> Arc<Self> {
        Arc::new(Self { reports: Mutex::new(reports.into()), runs: Mutex::new(0) })
    }

    pub fn runs(&self) -> usize {
        *self.runs.lock().unwrap()
    }
}

#[async_trait]
impl CompileVerifier for ScriptedCheck {
    async fn run_check(&self) -> CheckReport {
        *self.runs.lock().unwrap() += 1;
        self.reports.lock().unwrap().pop_front().unwrap_or_else(CheckReport::passed)
    }
}

pub fn reply(message: &str, files: &[(&str, &str)]) -> String {
    let files: serde_json::Map<String, serde_json::Value> = files
        .iter()
        .map(|(p, c)| (p.to_string(), json!(c)))
        .collect();
    format!("Here is the change.\n{}", json!({ "message": message, "files": files }))
}

pub fn assistant(
    root: &Path,
    chat: Arc<dyn ChatClient>,
    check: Arc<dyn CompileVerifier>
) -> DevAssistant {
    let store = Arc::new(VersionStore::new(root.join(".versions")));
    DevAssistant::new(root, chat, check, store)
}

pub fn seed(root: &Path, rel: &str, content: &str) {
    let path = root.join(rel);
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(path, content).unwrap();
}
