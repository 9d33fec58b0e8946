//! Parsing of the structured edit reply returned by the model.
//!
//! Models like to wrap their JSON in prose or code fences, so the first
//! object in the text is located before anything is deserialised, and its
//! shape is checked by hand instead of being trusted.

use serde_json::Value as JsonValue;
use std::collections::BTreeMap;

use crate::error::AssistantError;

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ModelResponse {
    pub message: String,
    pub files: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModelReply {
    Valid(ModelResponse),
    Malformed { raw: String, reason: String },
}

impl ModelReply {
    pub fn into_result(self) -> Result<ModelResponse, AssistantError> {
        match self {
            ModelReply::Valid(response) => Ok(response),
            ModelReply::Malformed { raw, reason } =>
                Err(AssistantError::MalformedResponse { reason, raw }),
        }
    }
}

/// Byte length of the balanced object starting at `text[0] == '{'`.
fn balanced_len(text: &str) -> Option<usize> {
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (i, c) in text.char_indices() {
        if in_string {
            match c {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match c {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth = depth.checked_sub(1)?;
                if depth == 0 {
                    return Some(i + 1);
                }
            }
            _ => {}
        }
    }
    None
}

/// Candidate JSON spans, in the order they should be tried: the balanced
/// object at the first `{`, then the widest `{ ... }` span.
fn json_candidates(text: &str) -> Vec<&str> {
    let Some(start) = text.find('{') else {
        return Vec::new();
    };
    let mut candidates = Vec::with_capacity(2);
    if let Some(len) = balanced_len(&text[start..]) {
        candidates.push(&text[start..start + len]);
    }
    if let Some(end) = text.rfind('}') {
        if end > start {
            let widest = &text[start..=end];
            if !candidates.contains(&widest) {
                candidates.push(widest);
            }
        }
    }
    candidates
}

/// First span of `text` that parses as a JSON object.
pub fn extract_json_object(text: &str) -> Option<JsonValue> {
    json_candidates(text)
        .into_iter()
        .filter_map(|span| serde_json::from_str::<JsonValue>(span).ok())
        .find(|value| value.is_object())
}

fn validate_shape(value: JsonValue) -> Result<ModelResponse, String> {
    let JsonValue::Object(mut object) = value else {
        return Err("top-level value is not an object".to_string());
    };

    let message = match object.remove("message") {
        None | Some(JsonValue::Null) => String::new(),
        Some(JsonValue::String(s)) => s,
        Some(_) => return Err("\"message\" is not a string".to_string()),
    };

    let mut files = BTreeMap::new();
    match object.remove("files") {
        None | Some(JsonValue::Null) => {}
        Some(JsonValue::Object(entries)) => {
            for (path, content) in entries {
                match content {
                    JsonValue::String(s) => {
                        files.insert(path, s);
                    }
                    _ => return Err(format!("content for \"{}\" is not a string", path)),
                }
            }
        }
        Some(_) => return Err("\"files\" is not an object".to_string()),
    }

    Ok(ModelResponse { message, files })
}

pub fn parse_model_reply(text: &str) -> ModelReply {
    let malformed = |reason: String| ModelReply::Malformed { raw: text.to_string(), reason };

    if json_candidates(text).is_empty() {
        return malformed("response did not include JSON".to_string());
    }
    let Some(value) = extract_json_object(text) else {
        return malformed("response JSON could not be parsed".to_string());
    };
    match validate_shape(value) {
        Ok(response) => ModelReply::Valid(response),
        Err(reason) => malformed(reason),
    }
}
