use serde::{ Serialize, Deserialize };
use std::collections::BTreeMap;

/// One persisted change set: the full content of every file it touched.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Version {
    pub id: String,
    pub timestamp: String,
    pub description: String,
    #[serde(default)]
    pub files: BTreeMap<String, String>,
}
