//! Capabilities the deployer needs from the two remote services

use async_trait::async_trait;
use bytes::Bytes;
use stack_models::{ListStacksResponse, StackEvent, StackRequest, StackStatus, StackSummary};

use crate::errors::DeployError;

/// Stack orchestration service
#[async_trait]
pub trait StackService: Send + Sync {
    /// List one page of stacks whose status is in `status_filter`
    async fn list_stacks(
        &self,
        status_filter: &[StackStatus],
        next_token: Option<&str>,
    ) -> Result<ListStacksResponse, DeployError>;

    /// Check a template body without creating anything
    async fn validate_template(&self, template_body: &str) -> Result<(), DeployError>;

    /// Describe stacks matching a stack name or id
    async fn describe_stack(&self, stack_id: &str) -> Result<Vec<StackSummary>, DeployError>;

    /// Create a stack, returning its id
    async fn create_stack(&self, request: &StackRequest) -> Result<String, DeployError>;

    /// Update a stack, returning its id
    async fn update_stack(&self, request: &StackRequest) -> Result<String, DeployError>;

    /// Most recent page of the stack's events, newest first
    async fn describe_stack_events(&self, stack_id: &str) -> Result<Vec<StackEvent>, DeployError>;
}

/// Object storage service
#[async_trait]
pub trait ObjectStorage: Send + Sync {
    /// Store `body` under `bucket`/`key` and return its retrieval URL
    async fn upload(&self, bucket: &str, key: &str, body: Bytes) -> Result<String, DeployError>;
}
