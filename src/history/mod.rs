//! Linear version history of applied change sets.
//!
//! Each version is one JSON file named `<id>.json` in the versions directory;
//! `current.txt` holds the id of the version last written or rolled back to.
//! Rollback rewrites files and moves the pointer but never deletes records.

use chrono::{ SecondsFormat, Utc };
use log::{ info, warn };
use std::collections::BTreeMap;
use std::io::{ ErrorKind, Write };
use std::path::{ Path, PathBuf };
use std::sync::Mutex;
use tempfile::NamedTempFile;
use tokio::fs;

use crate::error::AssistantError;
use crate::models::version::Version;
use crate::workspace::guard::PathGuard;
use crate::workspace::write_files;

pub const CURRENT_FILE: &str = "current.txt";

fn record_name(id: &str) -> String {
    format!("{}.json", id)
}

fn is_valid_id(id: &str) -> bool {
    !id.is_empty() && id.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

/// Writes `bytes` to a temp file in `dir` and renames it over `name`.
async fn write_atomic(dir: &Path, name: &str, bytes: Vec<u8>) -> Result<(), AssistantError> {
    let dir = dir.to_path_buf();
    let target = dir.join(name);
    tokio::task::spawn_blocking(move || -> Result<(), AssistantError> {
        let mut tmp = NamedTempFile::new_in(&dir)?;
        tmp.write_all(&bytes)?;
        tmp.as_file().sync_all()?;
        tmp.persist(&target).map_err(|e| e.error)?;
        Ok(())
    }).await?
}

pub struct VersionStore {
    dir: PathBuf,
    last_id: Mutex<u64>,
}

impl VersionStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into(), last_id: Mutex::new(0) }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    async fn ensure_dir(&self) -> Result<(), AssistantError> {
        fs::create_dir_all(&self.dir).await?;
        Ok(())
    }

    /// Largest numeric record id in the versions directory, or 0.
    async fn max_stored_id(&self) -> Result<u64, AssistantError> {
        let mut entries = fs::read_dir(&self.dir).await?;
        let mut max = 0;
        while let Some(entry) = entries.next_entry().await? {
            let name = entry.file_name();
            let stored = name
                .to_str()
                .and_then(|n| n.strip_suffix(".json"))
                .and_then(|id| id.parse::<u64>().ok());
            if let Some(id) = stored {
                max = max.max(id);
            }
        }
        Ok(max)
    }

    /// Millisecond timestamp, bumped past the last id handed out and past
    /// the largest id already on disk.
    fn allocate_id(&self, stored_max: u64) -> String {
        let now = u64::try_from(Utc::now().timestamp_millis()).unwrap_or(0);
        let mut last = self.last_id.lock().unwrap_or_else(|e| e.into_inner());
        let id = now.max(*last + 1).max(stored_max + 1);
        *last = id;
        id.to_string()
    }

    pub async fn save(
        &self,
        description: &str,
        files: &BTreeMap<String, String>
    ) -> Result<Version, AssistantError> {
        self.ensure_dir().await?;
        let stored_max = self.max_stored_id().await?;
        let version = Version {
            id: self.allocate_id(stored_max),
            timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
            description: description.to_string(),
            files: files.clone(),
        };
        let body = serde_json::to_vec_pretty(&version)?;
        write_atomic(&self.dir, &record_name(&version.id), body).await?;
        self.set_current(&version.id).await?;
        info!("Saved version {} ({} files)", version.id, version.files.len());
        Ok(version)
    }

    pub async fn load(&self, id: &str) -> Result<Version, AssistantError> {
        if !is_valid_id(id) {
            return Err(AssistantError::VersionNotFound(id.to_string()));
        }
        let raw = match fs::read_to_string(self.dir.join(record_name(id))).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(AssistantError::VersionNotFound(id.to_string()));
            }
            Err(e) => return Err(e.into()),
        };
        serde_json::from_str(&raw).map_err(|source| AssistantError::CorruptVersion {
            id: id.to_string(),
            source,
        })
    }

    /// Every stored version, newest first.
    pub async fn list(&self) -> Result<Vec<Version>, AssistantError> {
        self.ensure_dir().await?;
        let mut entries = fs::read_dir(&self.dir).await?;
        let mut versions = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let name = entry.file_name();
            let Some(id) = name.to_str().and_then(|n| n.strip_suffix(".json")) else {
                continue;
            };
            if !is_valid_id(id) {
                warn!("Skipping '{}' in versions directory: not a version record", id);
                continue;
            }
            versions.push(self.load(id).await?);
        }
        versions.sort_by(|a, b| b.timestamp.cmp(&a.timestamp).then_with(|| b.id.cmp(&a.id)));
        Ok(versions)
    }

    /// Id of the current version, or an empty string when unset.
    pub async fn get_current(&self) -> String {
        match fs::read_to_string(self.dir.join(CURRENT_FILE)).await {
            Ok(raw) => raw.trim().to_string(),
            Err(_) => String::new(),
        }
    }

    pub async fn set_current(&self, id: &str) -> Result<(), AssistantError> {
        self.ensure_dir().await?;
        write_atomic(&self.dir, CURRENT_FILE, id.as_bytes().to_vec()).await
    }

    /// Rewrites the files of version `id` under `root` and points `current`
    /// at it. No new version is recorded.
    pub async fn rollback(
        &self,
        id: &str,
        guard: &PathGuard,
        root: &Path
    ) -> Result<Version, AssistantError> {
        let version = self.load(id).await?;
        let rejected = guard.unsafe_paths(version.files.keys());
        if !rejected.is_empty() {
            warn!("Rollback to {} blocked, unsafe paths: {:?}", id, rejected);
            return Err(AssistantError::UnsafePaths(rejected));
        }
        write_files(root, &version.files).await?;
        self.set_current(&version.id).await?;
        info!("Rolled back to version {} ({} files)", version.id, version.files.len());
        Ok(version)
    }
}
