//! Finite state machine for waiting on stack convergence

use std::time::Duration;

use stack_models::{StackStatus, StackSummary};
use tokio::time::Instant;
use tracing::{debug, info};

use crate::deploy::service::StackService;
use crate::errors::DeployError;

/// Convergence settings
#[derive(Debug, Clone)]
pub struct ConvergenceSettings {
    /// Delay between two status lookups
    pub poll_interval: Duration,

    /// Overall budget, measured from the first lookup
    pub timeout: Duration,
}

impl Default for ConvergenceSettings {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(5),
            timeout: Duration::from_secs(20 * 60),
        }
    }
}

/// Why a status lookup could not be interpreted
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LookupFailure {
    /// No stack matched the id
    NotFound,

    /// More than one stack matched the id
    Ambiguous(usize),
}

/// Convergence state
#[derive(Debug, Clone, PartialEq)]
pub enum ConvergenceState {
    /// Still waiting for a terminal status
    Pending,

    /// Reached the desired status
    MatchedExpected(StackSummary),

    /// Reached some other terminal status
    UnexpectedTerminal(StackSummary),

    /// Still in progress when the budget ran out
    TimedOut(Duration),

    /// The lookup did not return exactly one stack
    LookupError(LookupFailure),
}

impl ConvergenceState {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, ConvergenceState::Pending)
    }
}

/// Convergence FSM for one stack operation
#[derive(Debug, Clone)]
pub struct ConvergenceFsm {
    stack_id: String,
    desired: StackStatus,
    timeout: Duration,
    state: ConvergenceState,
    observations: u32,
}

impl ConvergenceFsm {
    /// Create a new FSM in pending state
    pub fn new(stack_id: impl Into<String>, desired: StackStatus, timeout: Duration) -> Self {
        Self {
            stack_id: stack_id.into(),
            desired,
            timeout,
            state: ConvergenceState::Pending,
            observations: 0,
        }
    }

    /// Get current state
    pub fn state(&self) -> &ConvergenceState {
        &self.state
    }

    /// Number of lookups processed so far
    pub fn observations(&self) -> u32 {
        self.observations
    }

    /// Process one lookup result taken `elapsed` after the first one
    pub fn observe(
        &mut self,
        stacks: &[StackSummary],
        elapsed: Duration,
    ) -> Result<&ConvergenceState, String> {
        if self.state.is_terminal() {
            return Err(format!(
                "Invalid transition: {:?} is terminal",
                self.state
            ));
        }
        self.observations += 1;

        let new_state = match stacks {
            [] => ConvergenceState::LookupError(LookupFailure::NotFound),
            [stack] if stack.stack_status == self.desired => {
                ConvergenceState::MatchedExpected(stack.clone())
            }
            [stack] if stack.stack_status.is_in_progress() => {
                if elapsed > self.timeout {
                    ConvergenceState::TimedOut(elapsed)
                } else {
                    ConvergenceState::Pending
                }
            }
            [stack] => ConvergenceState::UnexpectedTerminal(stack.clone()),
            many => ConvergenceState::LookupError(LookupFailure::Ambiguous(many.len())),
        };

        self.state = new_state;
        Ok(&self.state)
    }

    /// Final outcome. Only a matched status counts as success.
    pub fn into_result(self) -> Result<StackSummary, DeployError> {
        match self.state {
            ConvergenceState::MatchedExpected(stack) => Ok(stack),
            ConvergenceState::UnexpectedTerminal(stack) => Err(DeployError::UnexpectedStatus {
                stack_id: self.stack_id,
                expected: self.desired,
                actual: stack.stack_status,
            }),
            ConvergenceState::TimedOut(_) => Err(DeployError::Timeout {
                stack_id: self.stack_id,
                expected: self.desired,
                timeout: self.timeout,
            }),
            ConvergenceState::LookupError(LookupFailure::NotFound) => {
                Err(DeployError::StackNotFound(self.stack_id))
            }
            ConvergenceState::LookupError(LookupFailure::Ambiguous(matches)) => {
                Err(DeployError::AmbiguousStack {
                    stack_id: self.stack_id,
                    matches,
                })
            }
            ConvergenceState::Pending => Err(DeployError::Internal(format!(
                "stack {} has not converged yet",
                self.stack_id
            ))),
        }
    }
}

/// Poll the stack until it reaches `desired`, another terminal status, or
/// the timeout. Lookup transport errors are returned as they are.
pub async fn wait_for_stack(
    stacks: &dyn StackService,
    stack_id: &str,
    desired: StackStatus,
    settings: &ConvergenceSettings,
) -> Result<StackSummary, DeployError> {
    info!(stack_id = %stack_id, desired = %desired, "Waiting for stack to converge");

    let started = Instant::now();
    let mut fsm = ConvergenceFsm::new(stack_id, desired, settings.timeout);

    loop {
        let found = stacks.describe_stack(stack_id).await?;
        let state = fsm
            .observe(&found, started.elapsed())
            .map_err(DeployError::Internal)?;

        if state.is_terminal() {
            break;
        }

        if let [stack] = found.as_slice() {
            debug!(stack_id = %stack_id, status = %stack.stack_status, "stack still in progress");
        }
        tokio::time::sleep(settings.poll_interval).await;
    }

    fsm.into_result()
}
