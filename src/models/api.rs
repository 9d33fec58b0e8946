use serde::{ Serialize, Deserialize };

use super::chat::ChatMessage;
use super::version::Version;

#[derive(Deserialize, Debug)]
pub struct ChatRequest {
    #[serde(default)]
    pub messages: Vec<ChatMessage>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct CacheStats {
    pub cache_read_input_tokens: u64,
}

/// Result of a change request that reached the compile check.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ChangeOutcome {
    pub message: String,
    pub changes: Vec<String>,
    pub errors: Vec<String>,
    pub fixed: bool,
    pub cache_stats: CacheStats,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct RollbackRequest {
    pub version_id: Option<String>,
}

#[derive(Serialize, Deserialize, Debug)]
pub struct RollbackResponse {
    pub success: bool,
    pub version: Version,
}

#[derive(Serialize, Deserialize, Debug)]
pub struct VersionListing {
    pub versions: Vec<Version>,
    pub current: String,
}

#[derive(Serialize, Deserialize, Debug)]
pub struct ErrorResponse {
    pub error: String,
}
