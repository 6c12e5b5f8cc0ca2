//! Deployment options

use crate::deploy::events::TailOptions;
use crate::deploy::fsm::ConvergenceSettings;

/// Options controlling how a deployment is awaited
#[derive(Debug, Clone)]
pub struct DeployOptions {
    /// Convergence polling settings
    pub convergence: ConvergenceSettings,

    /// Event tail options
    pub events: TailOptions,

    /// Stream stack events while waiting for convergence
    pub tail_events: bool,
}

impl Default for DeployOptions {
    fn default() -> Self {
        Self {
            convergence: ConvergenceSettings::default(),
            events: TailOptions::default(),
            tail_events: true,
        }
    }
}
