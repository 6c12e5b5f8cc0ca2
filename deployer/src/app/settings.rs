//! Settings file management

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::app::options::DeployOptions;
use crate::deploy::events::TailOptions;
use crate::deploy::fsm::ConvergenceSettings;
use crate::errors::DeployError;
use crate::filesys::file::File;
use crate::logs::{LogLevel, LogOptions};

/// Deployer settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Log level
    #[serde(default)]
    pub log_level: LogLevel,

    /// Emit logs as JSON
    #[serde(default)]
    pub json_logs: bool,

    /// Base URL of the stack orchestration API
    #[serde(default = "default_stack_service_url")]
    pub stack_service_url: String,

    /// Custom S3-compatible endpoint. Public S3 when absent.
    #[serde(default)]
    pub storage_endpoint: Option<String>,

    /// Seconds between two stack status lookups
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,

    /// Seconds to wait for a stack to converge
    #[serde(default = "default_stack_timeout")]
    pub stack_timeout_secs: u64,

    /// Seconds between two event page fetches
    #[serde(default = "default_poll_interval")]
    pub event_poll_interval_secs: u64,

    /// Stream stack events while waiting
    #[serde(default = "default_true")]
    pub tail_events: bool,

    /// HTTP request timeout in seconds
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

fn default_true() -> bool {
    true
}

fn default_stack_service_url() -> String {
    "http://localhost:4566/stacks/v1".to_string()
}

fn default_poll_interval() -> u64 {
    5
}

fn default_stack_timeout() -> u64 {
    20 * 60
}

fn default_request_timeout() -> u64 {
    30
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            log_level: LogLevel::Info,
            json_logs: false,
            stack_service_url: default_stack_service_url(),
            storage_endpoint: None,
            poll_interval_secs: default_poll_interval(),
            stack_timeout_secs: default_stack_timeout(),
            event_poll_interval_secs: default_poll_interval(),
            tail_events: true,
            request_timeout_secs: default_request_timeout(),
        }
    }
}

impl Settings {
    /// Read settings from a JSON file
    pub async fn load(path: &Path) -> Result<Self, DeployError> {
        let settings: Settings = File::new(path).read_json().await.map_err(|e| {
            DeployError::ConfigError(format!("unable to read settings {}: {}", path.display(), e))
        })?;
        settings.validate()?;
        Ok(settings)
    }

    /// Reject settings the deployer cannot run with
    pub fn validate(&self) -> Result<(), DeployError> {
        if self.poll_interval_secs == 0 || self.event_poll_interval_secs == 0 {
            return Err(DeployError::ConfigError(
                "poll intervals must be at least one second".to_string(),
            ));
        }
        if self.stack_timeout_secs == 0 {
            return Err(DeployError::ConfigError(
                "stack_timeout_secs must be at least one second".to_string(),
            ));
        }
        Ok(())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn log_options(&self) -> LogOptions {
        LogOptions {
            log_level: self.log_level,
            json_format: self.json_logs,
        }
    }

    pub fn deploy_options(&self) -> DeployOptions {
        DeployOptions {
            convergence: ConvergenceSettings {
                poll_interval: Duration::from_secs(self.poll_interval_secs),
                timeout: Duration::from_secs(self.stack_timeout_secs),
            },
            events: TailOptions {
                interval: Duration::from_secs(self.event_poll_interval_secs),
            },
            tail_events: self.tail_events,
        }
    }
}
