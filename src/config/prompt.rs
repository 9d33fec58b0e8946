use serde::Deserialize;
use std::collections::BTreeMap;
use std::error::Error;
use std::fmt;
use std::fs;
use std::path::Path;
use log::info;

pub const DEFAULT_SYSTEM_PROMPT: &str = "You are an expert Next.js developer assistant.
You have full visibility of project structure and existing files (provided below).
When modifying existing files, preserve structure.
Always provide COMPLETE file contents, never snippets.
Response format: JSON only with {message, files: {path: content}}.";

pub const DEFAULT_REPAIR_TEMPLATE: &str = "
The TypeScript compilation failed. Please fix the errors.

Original prompt:
{prompt}

Generated files:
{files}

Errors:
{errors}

Return JSON with the same response format, only include files that need fixes.
";

#[derive(Debug)]
pub enum PromptError {
    MissingPlaceholder(String),
    IoError(std::io::Error),
    JsonError(serde_json::Error),
}

impl fmt::Display for PromptError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PromptError::MissingPlaceholder(key) =>
                write!(f, "Repair template is missing the '{}' placeholder", key),
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

#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct PromptConfig {
    pub system_prompt: String,
    pub repair_template: String,
}

impl Default for PromptConfig {
    fn default() -> Self {
        Self {
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
            repair_template: DEFAULT_REPAIR_TEMPLATE.to_string(),
        }
    }
}

impl PromptConfig {
    fn validate(&self) -> Result<(), PromptError> {
        for key in ["{prompt}", "{files}", "{errors}"] {
            if !self.repair_template.contains(key) {
                return Err(PromptError::MissingPlaceholder(key.to_string()));
            }
        }
        Ok(())
    }

    /// Follow-up instruction sent after a failed type check.
    pub fn repair_prompt(
        &self,
        prompt: &str,
        files: &BTreeMap<String, String>,
        errors: &str
    ) -> Result<String, PromptError> {
        let files_json = serde_json::to_string_pretty(files)?;
        Ok(
            fill_template(
                &self.repair_template,
                &[("{prompt}", prompt), ("{files}", &files_json), ("{errors}", errors)]
            )
        )
    }
}

/// Substitutes placeholders in a single pass; inserted text is never rescanned.
fn fill_template(template: &str, values: &[(&str, &str)]) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(start) = rest.find('{') {
        out.push_str(&rest[..start]);
        let tail = &rest[start..];
        match values.iter().find(|(key, _)| tail.starts_with(key)) {
            Some((key, value)) => {
                out.push_str(value);
                rest = &tail[key.len()..];
            }
            None => {
                out.push('{');
                rest = &tail[1..];
            }
        }
    }
    out.push_str(rest);
    out
}

pub fn load_prompts_from_str(json: &str) -> Result<PromptConfig, PromptError> {
    let config: PromptConfig = serde_json::from_str(json)?;
    config.validate()?;
    Ok(config)
}

pub fn load_prompts<P: AsRef<Path>>(path: P) -> Result<PromptConfig, PromptError> {
    let file_content = fs::read_to_string(&path)?;
    let config = load_prompts_from_str(&file_content)?;
    info!("Loaded prompt overrides from {}", path.as_ref().display());
    Ok(config)
}
