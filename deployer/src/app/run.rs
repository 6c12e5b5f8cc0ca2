//! Wires the real service clients into a deployment

use std::sync::Arc;

use colored::Colorize;
use tracing::{info, warn};

use crate::app::settings::Settings;
use crate::deploy::events::{EventObserver, TailObservation};
use crate::deploy::executor::{DeploymentOutcome, Deployer};
use crate::deploy::request::DeploymentRequest;
use crate::errors::DeployError;
use crate::http::client::HttpClient;
use crate::storage::s3::S3ObjectStorage;

/// Run one deployment against the configured services
pub async fn run(request: DeploymentRequest, settings: &Settings) -> Result<DeploymentOutcome, DeployError> {
    info!(
        stack_service = %settings.stack_service_url,
        region = %request.region,
        "Initializing deployer..."
    );

    let stacks = Arc::new(HttpClient::new(&settings.stack_service_url, settings.request_timeout())?);
    let objects = Arc::new(S3ObjectStorage::new(
        request.region.clone(),
        settings.storage_endpoint.clone(),
    ));

    let deployer = Deployer::new(stacks, objects, settings.deploy_options());
    deployer.deploy(&request, Some(print_events())).await
}

/// Observer printing each stack event on its own line
pub fn print_events() -> EventObserver {
    Box::new(|observation| match observation {
        TailObservation::Event(event) => {
            let status = event.resource_status.as_deref().unwrap_or("-");
            let status = if status.ends_with("_FAILED") {
                status.red()
            } else if status.ends_with("_COMPLETE") {
                status.green()
            } else {
                status.yellow()
            };

            println!(
                "{} {} {} {}",
                event.timestamp.format("%Y-%m-%d %H:%M:%S").to_string().dimmed(),
                event.logical_resource_id.as_deref().unwrap_or("-").bold(),
                status,
                event.resource_status_reason.as_deref().unwrap_or(""),
            );
        }
        TailObservation::Error(e) => warn!("Unable to fetch stack events: {}", e),
    })
}
