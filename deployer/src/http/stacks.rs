//! Stack orchestration API client

use async_trait::async_trait;
use stack_models::{
    DescribeStacksResponse, ListStacksResponse, StackEvent, StackEventsResponse, StackIdResponse,
    StackRequest, StackStatus, StackSummary, ValidateTemplateRequest,
};
use tracing::debug;

use crate::deploy::service::StackService;
use crate::errors::DeployError;
use crate::http::client::HttpClient;

#[async_trait]
impl StackService for HttpClient {
    async fn list_stacks(
        &self,
        status_filter: &[StackStatus],
        next_token: Option<&str>,
    ) -> Result<ListStacksResponse, DeployError> {
        let mut query: Vec<(&str, &str)> = status_filter.iter().map(|s| ("status", s.as_str())).collect();
        if let Some(token) = next_token {
            query.push(("next_token", token));
        }
        self.get(&["stacks"], &query).await
    }

    async fn validate_template(&self, template_body: &str) -> Result<(), DeployError> {
        let request = ValidateTemplateRequest {
            template_body: template_body.to_string(),
        };
        self.post_unit(&["templates", "validate"], &request).await
    }

    async fn describe_stack(&self, stack_id: &str) -> Result<Vec<StackSummary>, DeployError> {
        let response: DescribeStacksResponse = self.get(&["stacks", stack_id], &[]).await?;
        Ok(response.stacks)
    }

    async fn create_stack(&self, request: &StackRequest) -> Result<String, DeployError> {
        let request = with_request_token(request);
        debug!(stack = %request.stack_name, "creating stack");
        let response: StackIdResponse = self.post(&["stacks"], &request).await?;
        Ok(response.stack_id)
    }

    async fn update_stack(&self, request: &StackRequest) -> Result<String, DeployError> {
        let request = with_request_token(request);
        debug!(stack = %request.stack_name, "updating stack");
        let response: StackIdResponse = self
            .put(&["stacks", request.stack_name.as_str()], &request)
            .await?;
        Ok(response.stack_id)
    }

    async fn describe_stack_events(&self, stack_id: &str) -> Result<Vec<StackEvent>, DeployError> {
        let response: StackEventsResponse = self.get(&["stacks", stack_id, "events"], &[]).await?;
        Ok(response.events)
    }
}

/// Copy of `request` carrying a client request token, so the service can
/// recognise a request it has already accepted
fn with_request_token(request: &StackRequest) -> StackRequest {
    let mut request = request.clone();
    if request.client_request_token.is_none() {
        request.client_request_token = Some(uuid::Uuid::new_v4().to_string());
    }
    request
}
