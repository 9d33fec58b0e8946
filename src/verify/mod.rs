//! Type-check pass run after every round of edits.

use async_trait::async_trait;
use log::{ debug, info };
use std::path::PathBuf;
use tokio::process::Command;

use crate::error::AssistantError;

/// Cap on captured stdout/stderr, per stream.
pub const MAX_OUTPUT_BYTES: usize = 10 * 1024 * 1024;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckReport {
    pub ok: bool,
    pub diagnostics: String,
}

impl CheckReport {
    pub fn passed() -> Self {
        Self { ok: true, diagnostics: String::new() }
    }

    pub fn failed(diagnostics: impl Into<String>) -> Self {
        Self { ok: false, diagnostics: diagnostics.into() }
    }
}

#[async_trait]
pub trait CompileVerifier: Send + Sync {
    async fn run_check(&self) -> CheckReport;
}

/// Runs an external checker (by default `npx tsc --noEmit --skipLibCheck`)
/// in the project root. Exit status zero means success.
#[derive(Debug, Clone)]
pub struct CommandVerifier {
    program: String,
    args: Vec<String>,
    cwd: PathBuf,
}

fn lossy_capped(bytes: &[u8]) -> String {
    let end = bytes.len().min(MAX_OUTPUT_BYTES);
    String::from_utf8_lossy(&bytes[..end]).into_owned()
}

impl CommandVerifier {
    pub fn new(command_line: &str, cwd: impl Into<PathBuf>) -> Result<Self, AssistantError> {
        let mut words = shlex::split(command_line)
            .filter(|w| !w.is_empty())
            .ok_or_else(|| AssistantError::CheckCommand(format!("cannot parse '{}'", command_line)))?;
        let program = words.remove(0);
        Ok(Self { program, args: words, cwd: cwd.into() })
    }

    pub fn command_line(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

#[async_trait]
impl CompileVerifier for CommandVerifier {
    async fn run_check(&self) -> CheckReport {
        debug!("Running check: {}", self.command_line());
        let output = Command::new(&self.program)
            .args(&self.args)
            .current_dir(&self.cwd)
            .kill_on_drop(true)
            .output()
            .await;

        match output {
            Ok(out) if out.status.success() => {
                info!("Check passed: {}", self.command_line());
                CheckReport::passed()
            }
            Ok(out) => {
                let stdout = lossy_capped(&out.stdout);
                let stderr = lossy_capped(&out.stderr);
                let status = format!("Command failed: {} ({})", self.command_line(), out.status);
                let diagnostics = [stdout, stderr, status]
                    .iter()
                    .map(|part| part.trim_end())
                    .filter(|part| !part.is_empty())
                    .collect::<Vec<_>>()
                    .join("\n");
                info!("Check failed: {}", self.command_line());
                CheckReport::failed(diagnostics)
            }
            Err(e) => {
                info!("Check could not be launched: {}", e);
                CheckReport::failed(format!("Command failed: {}: {}", self.command_line(), e))
            }
        }
    }
}
