//! Error types for stack deployments

use std::path::PathBuf;
use std::time::Duration;

use stack_models::StackStatus;
use thiserror::Error;

/// Main error type for the deployer
#[derive(Error, Debug)]
pub enum DeployError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("Object storage error: {0}")]
    StorageError(#[from] object_store::Error),

    #[error("Badly formed key=value pair '{0}'. Expected format 'key=value'")]
    MalformedPair(String),

    #[error("Unable to read {}: {source}", path.display())]
    Traversal {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("File {} is not under template folder {}", path.display(), root.display())]
    OutsideBundle { path: PathBuf, root: PathBuf },

    #[error("Main template {} not found in template folder", .0.display())]
    MainTemplateMissing(PathBuf),

    #[error("{failed} template(s) failed validation: {causes}")]
    ValidationFailed { failed: usize, causes: String },

    #[error("{failed} of {total} upload(s) failed: {causes}")]
    UploadFailed {
        failed: usize,
        total: usize,
        causes: String,
    },

    #[error("Unable to find url of main template {}", .0.display())]
    MainTemplateUrlNotFound(PathBuf),

    #[error("API error {status}: {body}")]
    Api { status: u16, body: String },

    #[error("Stack with ID {0} not found")]
    StackNotFound(String),

    #[error("Ambiguous stack ID {stack_id}: {matches} stacks matched")]
    AmbiguousStack { stack_id: String, matches: usize },

    #[error("Unexpected stack status. Wanted {expected}, but got {actual}")]
    UnexpectedStatus {
        stack_id: String,
        expected: StackStatus,
        actual: StackStatus,
    },

    #[error("Stack {stack_id} failed to reach state {expected} within {timeout:?}")]
    Timeout {
        stack_id: String,
        expected: StackStatus,
        timeout: Duration,
    },

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Joins per-item failure messages into one line
pub(crate) fn join_causes<I, S>(causes: I) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    causes
        .into_iter()
        .map(|c| c.as_ref().to_string())
        .collect::<Vec<_>>()
        .join("; ")
}
