//! Deployment executor

use std::sync::Arc;

use stack_models::{StackStatus, StackSummary};
use tracing::{debug, error, info};

use crate::app::options::DeployOptions;
use crate::deploy::bundle::TemplateBundle;
use crate::deploy::events::{EventObserver, EventTail};
use crate::deploy::fsm::wait_for_stack;
use crate::deploy::request::{build_stack_request, DeploymentRequest, StackOperation};
use crate::deploy::service::{ObjectStorage, StackService};
use crate::deploy::upload::{upload_templates, validate_templates, UploadPlan};
use crate::errors::DeployError;

/// Result of a converged deployment
#[derive(Debug, Clone)]
pub struct DeploymentOutcome {
    pub stack_id: String,
    pub operation: StackOperation,
    pub status: StackStatus,
    pub version: String,
    pub template_url: String,
}

impl DeploymentOutcome {
    pub fn succeeded(&self) -> bool {
        self.status == self.operation.desired_status()
    }
}

/// Deploys template bundles to stacks
pub struct Deployer {
    stacks: Arc<dyn StackService>,
    objects: Arc<dyn ObjectStorage>,
    options: DeployOptions,
}

impl Deployer {
    /// Create a new deployer
    pub fn new(
        stacks: Arc<dyn StackService>,
        objects: Arc<dyn ObjectStorage>,
        options: DeployOptions,
    ) -> Self {
        Self {
            stacks,
            objects,
            options,
        }
    }

    /// Get the deploy options
    pub fn options(&self) -> &DeployOptions {
        &self.options
    }

    /// Deploy the request's bundle, creating the stack if it does not exist
    /// and updating it otherwise, then wait for it to converge.
    ///
    /// When `observer` is given and event tailing is enabled, stack events
    /// are streamed to it while waiting.
    pub async fn deploy(
        &self,
        request: &DeploymentRequest,
        observer: Option<EventObserver>,
    ) -> Result<DeploymentOutcome, DeployError> {
        info!(stack = %request.stack_name, folder = %request.template_folder.display(), "Deploying stack");

        let bundle = TemplateBundle::resolve(&request.template_folder, &request.main_template).await?;
        let version = bundle.version().await?;
        info!(stack = %request.stack_name, version = %version, files = bundle.files().len(), "Computed bundle version");

        validate_templates(self.stacks.clone(), &bundle.paths()).await?;

        let plan = UploadPlan::new(&request.bucket, &request.upload_prefix(&version), &bundle);
        let results = upload_templates(self.objects.clone(), &plan).await;
        let template_url = results.main_template_url(bundle.main_template())?;
        debug!(url = %template_url, "main template uploaded");

        info!(stack = %request.stack_name, "Checking if stack already exists");
        let exists = stack_exists(self.stacks.as_ref(), &request.stack_name).await?;
        let operation = StackOperation::for_existing(exists);

        let parameters = request.parameters.with_reserved(&version, &template_url);
        let stack_request = build_stack_request(&request.stack_name, &template_url, &parameters, &request.tags);

        info!(stack = %request.stack_name, operation = %operation, "Dispatching stack {}", operation);
        let stack_id = match operation {
            StackOperation::Create => self.stacks.create_stack(&stack_request).await?,
            StackOperation::Update => self.stacks.update_stack(&stack_request).await?,
        };

        let summary = self.await_convergence(&stack_id, operation, observer).await?;

        info!(stack_id = %stack_id, status = %summary.stack_status, "Deployment converged");

        Ok(DeploymentOutcome {
            stack_id,
            operation,
            status: summary.stack_status,
            version,
            template_url,
        })
    }

    async fn await_convergence(
        &self,
        stack_id: &str,
        operation: StackOperation,
        observer: Option<EventObserver>,
    ) -> Result<StackSummary, DeployError> {
        let tail = match observer {
            Some(observer) if self.options.tail_events => Some(EventTail::spawn(
                self.stacks.clone(),
                stack_id,
                self.options.events.clone(),
                observer,
            )),
            _ => None,
        };

        let result = wait_for_stack(
            self.stacks.as_ref(),
            stack_id,
            operation.desired_status(),
            &self.options.convergence,
        )
        .await;

        if let Some(tail) = tail {
            tail.stop().await;
        }

        if let Err(e) = &result {
            error!(stack_id = %stack_id, error = %e, "Stack did not converge");
        }
        result
    }
}

/// Whether a stack named `name` exists in any non-deleted status
pub async fn stack_exists(stacks: &dyn StackService, name: &str) -> Result<bool, DeployError> {
    let mut next_token: Option<String> = None;

    loop {
        let page = stacks
            .list_stacks(&StackStatus::NON_PURGED, next_token.as_deref())
            .await?;

        if page.stacks.iter().any(|s| s.stack_name == name) {
            return Ok(true);
        }

        match page.next_token {
            Some(token) if !token.is_empty() => next_token = Some(token),
            _ => return Ok(false),
        }
    }
}
