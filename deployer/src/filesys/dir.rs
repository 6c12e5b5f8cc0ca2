//! Directory operations

use std::path::{Path, PathBuf};

use tokio::fs;
use tracing::debug;

use crate::errors::DeployError;

/// A directory wrapper with path
#[derive(Debug, Clone)]
pub struct Dir {
    path: PathBuf,
}

impl Dir {
    /// Create a new directory reference
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Recursively list every regular file beneath this directory.
    ///
    /// Directories are descended into but never returned. A symlink is
    /// kept when it points at a regular file; linked directories are not
    /// descended into. The order of the result depends on the filesystem;
    /// callers that need a stable order must sort.
    pub async fn walk_files(&self) -> Result<Vec<PathBuf>, DeployError> {
        let mut files = Vec::new();
        let mut pending = vec![self.path.clone()];

        while let Some(dir) = pending.pop() {
            let mut entries = fs::read_dir(&dir).await.map_err(|e| traversal(&dir, e))?;

            while let Some(entry) = entries.next_entry().await.map_err(|e| traversal(&dir, e))? {
                let path = entry.path();
                let file_type = entry.file_type().await.map_err(|e| traversal(&path, e))?;

                if file_type.is_dir() {
                    pending.push(path);
                } else if file_type.is_file() {
                    files.push(path);
                } else if file_type.is_symlink() {
                    let target = fs::metadata(&path).await.map_err(|e| traversal(&path, e))?;
                    if target.is_file() {
                        files.push(path);
                    } else {
                        debug!(path = %path.display(), "skipping linked directory");
                    }
                }
            }
        }

        Ok(files)
    }
}

fn traversal(path: &Path, source: std::io::Error) -> DeployError {
    DeployError::Traversal {
        path: path.to_path_buf(),
        source,
    }
}
