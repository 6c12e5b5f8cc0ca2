//! Template bundle resolution and content versioning

use std::path::{Component, Path, PathBuf};

use sha2::{Digest, Sha256};
use tracing::debug;

use crate::errors::DeployError;
use crate::filesys::dir::Dir;
use crate::filesys::file::File;

/// Number of hex characters kept from the digest
pub const VERSION_LEN: usize = 8;

/// A file inside a bundle, with its path relative to the bundle root
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BundleFile {
    /// Path on the local filesystem
    pub path: PathBuf,

    /// Path relative to the bundle root, `/`-separated
    pub relative: String,
}

/// All template files under a root folder plus the main template
#[derive(Debug, Clone)]
pub struct TemplateBundle {
    root: PathBuf,
    files: Vec<BundleFile>,
    main_template: PathBuf,
}

impl TemplateBundle {
    /// Resolve the bundle rooted at `root`. `main_template` is relative to
    /// `root` and must be one of the resolved files.
    pub async fn resolve(root: &Path, main_template: &str) -> Result<Self, DeployError> {
        let paths = resolve_bundle(root).await?;

        let mut files = paths
            .into_iter()
            .map(|path| {
                let relative = relative_key(root, &path)?;
                Ok(BundleFile { path, relative })
            })
            .collect::<Result<Vec<_>, DeployError>>()?;
        files.sort_by(|a, b| a.relative.cmp(&b.relative));

        let main_template = root.join(main_template);
        if !files.iter().any(|f| f.path == main_template) {
            return Err(DeployError::MainTemplateMissing(main_template));
        }

        debug!(root = %root.display(), files = files.len(), "resolved template bundle");

        Ok(Self {
            root: root.to_path_buf(),
            files,
            main_template,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Files sorted by relative path
    pub fn files(&self) -> &[BundleFile] {
        &self.files
    }

    /// Local paths of every file, sorted by relative path
    pub fn paths(&self) -> Vec<PathBuf> {
        self.files.iter().map(|f| f.path.clone()).collect()
    }

    /// Resolved path of the main template
    pub fn main_template(&self) -> &Path {
        &self.main_template
    }

    /// Content version of the bundle
    pub async fn version(&self) -> Result<String, DeployError> {
        hash_in_order(self.files.iter().map(|f| f.path.as_path())).await
    }
}

/// Every regular file beneath `root`, in filesystem order
pub async fn resolve_bundle(root: &Path) -> Result<Vec<PathBuf>, DeployError> {
    Dir::new(root).walk_files().await
}

/// Short content fingerprint of `files`, stable across runs and machines.
///
/// Files are hashed in lexicographic order of their path relative to
/// `root`, so the result does not depend on traversal order or on where
/// the bundle lives on disk.
pub async fn compute_version(root: &Path, files: &[PathBuf]) -> Result<String, DeployError> {
    let mut keyed = files
        .iter()
        .map(|path| Ok((relative_key(root, path)?, path.as_path())))
        .collect::<Result<Vec<_>, DeployError>>()?;
    keyed.sort_by(|a, b| a.0.cmp(&b.0));

    hash_in_order(keyed.into_iter().map(|(_, path)| path)).await
}

async fn hash_in_order<'a>(paths: impl Iterator<Item = &'a Path>) -> Result<String, DeployError> {
    let mut hasher = Sha256::new();

    for path in paths {
        let data = File::new(path).read_bytes().await?;
        hasher.update(&data);
    }

    let digest = hex::encode(hasher.finalize());
    Ok(digest[..VERSION_LEN].to_string())
}

/// `path` relative to `root`, joined with `/` regardless of platform
pub fn relative_key(root: &Path, path: &Path) -> Result<String, DeployError> {
    let relative = path
        .strip_prefix(root)
        .map_err(|_| DeployError::OutsideBundle {
            path: path.to_path_buf(),
            root: root.to_path_buf(),
        })?;

    let segments = relative
        .components()
        .filter_map(|c| match c {
            Component::Normal(s) => Some(s.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect::<Vec<_>>();

    Ok(segments.join("/"))
}
