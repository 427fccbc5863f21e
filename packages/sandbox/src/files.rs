// ABOUTME: Host-side access to workspace directories
// ABOUTME: Lists, reads and writes files under the workspace root, refusing paths that escape it

use serde::{Deserialize, Serialize};
use std::path::{Component, Path, PathBuf};
use thiserror::Error;
use tracing::{debug, warn};

use crate::types::is_valid_workspace_id;

#[derive(Error, Debug)]
pub enum FileError {
    #[error("Path traversal is not allowed: {0}")]
    PathTraversal(String),

    #[error("Absolute paths are not allowed: {0}")]
    AbsolutePath(String),

    #[error("Invalid workspace id: {0}")]
    InvalidWorkspaceId(String),

    #[error("File not found: {0}")]
    NotFound(String),

    #[error("Not a regular file: {0}")]
    NotAFile(String),

    #[error("Not a directory: {0}")]
    NotADirectory(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, FileError>;

/// One entry of a directory listing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileEntry {
    pub name: String,
    /// Path relative to the workspace root, `/` separated
    pub path: String,
    pub is_directory: bool,
    pub size: u64,
}

/// File operations scoped to `<root>/<workspace_id>`
#[derive(Debug, Clone)]
pub struct WorkspaceFiles {
    root: PathBuf,
}

impl WorkspaceFiles {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve a client-supplied relative path inside a workspace
    pub fn resolve(&self, workspace_id: &str, relative: &str) -> Result<PathBuf> {
        if !is_valid_workspace_id(workspace_id) {
            return Err(FileError::InvalidWorkspaceId(workspace_id.to_string()));
        }

        let relative_path = Path::new(relative);
        // Any `..` is a traversal attempt, even after a leading `/`
        if relative_path
            .components()
            .any(|c| matches!(c, Component::ParentDir))
        {
            warn!(
                "Rejected traversal path '{}' for workspace {}",
                relative, workspace_id
            );
            return Err(FileError::PathTraversal(relative.to_string()));
        }

        let mut resolved = self.root.join(workspace_id);
        for component in relative_path.components() {
            match component {
                Component::Normal(part) => resolved.push(part),
                Component::CurDir | Component::ParentDir => {}
                Component::RootDir | Component::Prefix(_) => {
                    return Err(FileError::AbsolutePath(relative.to_string()));
                }
            }
        }

        Ok(resolved)
    }

    /// Resolve and then make sure symlinks on disk do not lead outside the workspace
    pub async fn resolve_contained(&self, workspace_id: &str, relative: &str) -> Result<PathBuf> {
        let path = self.resolve(workspace_id, relative)?;

        let workspace_dir = self.root.join(workspace_id);
        let base = match tokio::fs::canonicalize(&workspace_dir).await {
            Ok(base) => base,
            // Nothing on disk yet, so nothing can point elsewhere
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(path),
            Err(e) => return Err(e.into()),
        };

        // Deepest ancestor present on disk, dangling links included
        let mut existing = path.as_path();
        while tokio::fs::symlink_metadata(existing).await.is_err() {
            match existing.parent() {
                Some(parent) => existing = parent,
                None => return Ok(path),
            }
        }

        let contained = match tokio::fs::canonicalize(existing).await {
            Ok(canonical) => canonical.starts_with(&base),
            // A link whose target is missing cannot be checked
            Err(_) => false,
        };
        if !contained {
            warn!(
                "Rejected path '{}' for workspace {}: resolves outside the workspace",
                relative, workspace_id
            );
            return Err(FileError::PathTraversal(relative.to_string()));
        }

        Ok(path)
    }

    /// List a directory, directories first then by name
    pub async fn list(&self, workspace_id: &str, relative: &str) -> Result<Vec<FileEntry>> {
        let dir = self.resolve_contained(workspace_id, relative).await?;
        let metadata = match tokio::fs::metadata(&dir).await {
            Ok(metadata) => metadata,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(FileError::NotFound(relative.to_string()))
            }
            Err(e) => return Err(e.into()),
        };
        if !metadata.is_dir() {
            return Err(FileError::NotADirectory(relative.to_string()));
        }

        let base = relative_base(relative);
        let mut entries = Vec::new();
        let mut reader = tokio::fs::read_dir(&dir).await?;
        while let Some(entry) = reader.next_entry().await? {
            let metadata = entry.metadata().await?;
            let name = entry.file_name().to_string_lossy().into_owned();
            let path = if base.is_empty() {
                name.clone()
            } else {
                format!("{}/{}", base, name)
            };
            entries.push(FileEntry {
                name,
                path,
                is_directory: metadata.is_dir(),
                size: if metadata.is_dir() { 0 } else { metadata.len() },
            });
        }

        entries.sort_by(|a, b| {
            b.is_directory
                .cmp(&a.is_directory)
                .then_with(|| a.name.cmp(&b.name))
        });
        Ok(entries)
    }

    pub async fn read(&self, workspace_id: &str, relative: &str) -> Result<String> {
        let path = self.resolve_contained(workspace_id, relative).await?;
        let metadata = match tokio::fs::metadata(&path).await {
            Ok(metadata) => metadata,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(FileError::NotFound(relative.to_string()))
            }
            Err(e) => return Err(e.into()),
        };
        if !metadata.is_file() {
            return Err(FileError::NotAFile(relative.to_string()));
        }

        let bytes = tokio::fs::read(&path).await?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }

    /// Write a file, creating parent directories as needed
    pub async fn write(&self, workspace_id: &str, relative: &str, content: &str) -> Result<()> {
        let path = self.resolve_contained(workspace_id, relative).await?;
        if path == self.root.join(workspace_id) {
            return Err(FileError::NotAFile(relative.to_string()));
        }
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&path, content).await?;
        debug!(
            "Wrote {} bytes to {} in workspace {}",
            content.len(),
            relative,
            workspace_id
        );
        Ok(())
    }
}

fn relative_base(relative: &str) -> String {
    Path::new(relative)
        .components()
        .filter_map(|c| match c {
            Component::Normal(part) => Some(part.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("/")
}
