pub mod guard;

use std::collections::BTreeMap;
use std::path::{ Component, Path, PathBuf };
use log::debug;
use tokio::fs;

use crate::error::AssistantError;
use self::guard::normalize_path;

/// Resolves a project-relative path, refusing anything that would land
/// outside `root`.
pub fn resolve_project_path(root: &Path, path: &str) -> Result<PathBuf, AssistantError> {
    let normalized = normalize_path(path);
    let relative = Path::new(&normalized);
    let escapes = relative.components().any(|c| {
        !matches!(c, Component::Normal(_) | Component::CurDir)
    });
    if normalized.is_empty() || escapes {
        return Err(AssistantError::InvalidPath(path.to_string()));
    }
    Ok(root.join(relative))
}

/// Overwrites (or creates) every file with its full content.
pub async fn write_files(
    root: &Path,
    files: &BTreeMap<String, String>
) -> Result<(), AssistantError> {
    let resolved = files
        .iter()
        .map(|(path, content)| Ok((resolve_project_path(root, path)?, content)))
        .collect::<Result<Vec<_>, AssistantError>>()?;

    for (target, content) in resolved {
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent).await?;
        }
        fs::write(&target, content).await?;
        debug!("Wrote {} ({} bytes)", target.display(), content.len());
    }
    Ok(())
}
