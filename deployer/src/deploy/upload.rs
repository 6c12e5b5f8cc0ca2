//! Concurrent template validation and upload

use std::collections::HashMap;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use crate::deploy::bundle::TemplateBundle;
use crate::deploy::service::{ObjectStorage, StackService};
use crate::errors::{join_causes, DeployError};
use crate::filesys::file::File;

/// Where each bundle file goes in object storage
#[derive(Debug, Clone)]
pub struct UploadPlan {
    pub bucket: String,
    pub prefix: String,
    pub items: Vec<UploadItem>,
}

/// A single local file and its destination key
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadItem {
    pub path: PathBuf,
    pub key: String,
}

impl UploadPlan {
    /// Place every bundle file at `prefix/<path relative to bundle root>`
    pub fn new(bucket: &str, prefix: &str, bundle: &TemplateBundle) -> Self {
        let prefix = prefix.trim_end_matches('/').to_string();
        let items = bundle
            .files()
            .iter()
            .map(|f| UploadItem {
                path: f.path.clone(),
                key: if prefix.is_empty() {
                    f.relative.clone()
                } else {
                    format!("{}/{}", prefix, f.relative)
                },
            })
            .collect();

        Self {
            bucket: bucket.to_string(),
            prefix,
            items,
        }
    }
}

/// Outcome of uploading one file
#[derive(Debug)]
pub struct UploadResult {
    pub file: PathBuf,
    pub key: String,
    /// Retrieval URL, empty when the upload failed
    pub url: String,
    pub error: Option<DeployError>,
}

impl UploadResult {
    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

/// Every per-file outcome of one upload fan-out
#[derive(Debug, Default)]
pub struct UploadResultSet {
    results: Vec<UploadResult>,
}

impl UploadResultSet {
    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &UploadResult> {
        self.results.iter()
    }

    pub fn has_errors(&self) -> bool {
        self.results.iter().any(|r| r.error.is_some())
    }

    pub fn successes(&self) -> impl Iterator<Item = &UploadResult> {
        self.results.iter().filter(|r| r.is_success())
    }

    pub fn failures(&self) -> impl Iterator<Item = &UploadResult> {
        self.results.iter().filter(|r| !r.is_success())
    }

    /// Fails with one error naming every failed upload
    pub fn ensure_success(&self) -> Result<(), DeployError> {
        let causes = self
            .failures()
            .filter_map(|r| r.error.as_ref().map(|e| format!("{}: {}", r.file.display(), e)))
            .collect::<Vec<_>>();

        if causes.is_empty() {
            return Ok(());
        }

        Err(DeployError::UploadFailed {
            failed: causes.len(),
            total: self.results.len(),
            causes: join_causes(causes),
        })
    }

    /// Retrieval URL of a successfully uploaded file
    pub fn url_for(&self, file: &Path) -> Option<&str> {
        self.successes()
            .find(|r| r.file == file)
            .map(|r| r.url.as_str())
    }

    /// URL of the main template, after every upload succeeded
    pub fn main_template_url(&self, main_template: &Path) -> Result<String, DeployError> {
        self.ensure_success()?;
        self.url_for(main_template)
            .map(str::to_string)
            .ok_or_else(|| DeployError::MainTemplateUrlNotFound(main_template.to_path_buf()))
    }
}

/// Validate every file against the orchestration service.
///
/// One task per file; all of them run to completion before the outcome is
/// decided. Any failure rejects the whole bundle, and the error lists every
/// failing file.
pub async fn validate_templates(
    stacks: Arc<dyn StackService>,
    files: &[PathBuf],
) -> Result<(), DeployError> {
    info!(count = files.len(), "Validating templates");

    let results = fan_out(files.to_vec(), move |path: PathBuf| {
        let stacks = stacks.clone();
        async move {
            let body = File::new(&path).read_string().await?;
            stacks.validate_template(&body).await
        }
    })
    .await;

    let causes = results
        .into_iter()
        .filter_map(|(path, result)| {
            result.err().map(|e| {
                warn!(file = %path.display(), error = %e, "template failed validation");
                format!("{}: {}", path.display(), e)
            })
        })
        .collect::<Vec<_>>();

    if causes.is_empty() {
        Ok(())
    } else {
        Err(DeployError::ValidationFailed {
            failed: causes.len(),
            causes: join_causes(causes),
        })
    }
}

/// Upload every planned file concurrently and collect all outcomes
pub async fn upload_templates(objects: Arc<dyn ObjectStorage>, plan: &UploadPlan) -> UploadResultSet {
    info!(
        bucket = %plan.bucket,
        prefix = %plan.prefix,
        count = plan.items.len(),
        "Uploading templates"
    );

    let bucket = plan.bucket.clone();
    let outcomes = fan_out(plan.items.clone(), move |item: UploadItem| {
        let objects = objects.clone();
        let bucket = bucket.clone();
        async move {
            let body = File::new(&item.path).read_bytes().await?;
            debug!(file = %item.path.display(), key = %item.key, size = body.len(), "uploading");
            objects.upload(&bucket, &item.key, body).await
        }
    })
    .await;

    let results = outcomes
        .into_iter()
        .map(|(item, outcome)| match outcome {
            Ok(url) => UploadResult {
                file: item.path,
                key: item.key,
                url,
                error: None,
            },
            Err(e) => {
                warn!(file = %item.path.display(), error = %e, "upload failed");
                UploadResult {
                    file: item.path,
                    key: item.key,
                    url: String::new(),
                    error: Some(e),
                }
            }
        })
        .collect();

    UploadResultSet { results }
}

/// Run `task` once per item on its own tokio task and wait for all of them.
///
/// Results come back in input order. A task that panics is still reported,
/// as an internal error for its item.
async fn fan_out<I, T, F, Fut>(items: Vec<I>, task: F) -> Vec<(I, Result<T, DeployError>)>
where
    I: Clone + Send + 'static,
    T: Send + 'static,
    F: Fn(I) -> Fut,
    Fut: Future<Output = Result<T, DeployError>> + Send + 'static,
{
    let mut set = JoinSet::new();
    let mut task_items = HashMap::new();
    for (index, item) in items.iter().enumerate() {
        let fut = task(item.clone());
        let handle = set.spawn(async move { (index, fut.await) });
        task_items.insert(handle.id(), index);
    }

    let mut slots: Vec<Option<Result<T, DeployError>>> = items.iter().map(|_| None).collect();

    while let Some(joined) = set.join_next().await {
        match joined {
            Ok((index, result)) => slots[index] = Some(result),
            Err(e) => match task_items.get(&e.id()) {
                Some(&index) => slots[index] = Some(Err(DeployError::Internal(e.to_string()))),
                None => warn!(error = %e, "untracked task failed"),
            },
        }
    }

    items
        .into_iter()
        .zip(slots)
        .map(|(item, slot)| {
            let result = slot.unwrap_or_else(|| {
                Err(DeployError::Internal("task did not report a result".to_string()))
            });
            (item, result)
        })
        .collect()
}
