//! Background tailing of a stack's event history

use std::sync::Arc;
use std::time::Duration;

use stack_models::StackEvent;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::deploy::service::StackService;
use crate::errors::DeployError;

/// Event tail options
#[derive(Debug, Clone)]
pub struct TailOptions {
    /// Delay between two event page fetches
    pub interval: Duration,
}

impl Default for TailOptions {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(5),
        }
    }
}

/// Something the tail observed on one tick
#[derive(Debug)]
pub enum TailObservation {
    /// A newly seen event
    Event(StackEvent),

    /// Fetching the event page failed; the tail keeps running
    Error(DeployError),
}

/// Callback receiving tail observations
pub type EventObserver = Box<dyn FnMut(TailObservation) + Send + 'static>;

/// Remembers the newest emitted event so each one is emitted once
#[derive(Debug, Clone, Default)]
pub struct EventCursor {
    last_event_id: Option<String>,
}

impl EventCursor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Id of the newest event emitted so far
    pub fn last_event_id(&self) -> Option<&str> {
        self.last_event_id.as_deref()
    }

    /// Take a newest-first page and return the unseen events, oldest first.
    ///
    /// Before anything has been emitted only the newest event counts as
    /// new. Afterwards everything above the last emitted id is new; if that
    /// id has dropped off the page, the whole page is.
    pub fn advance(&mut self, page: Vec<StackEvent>) -> Vec<StackEvent> {
        let mut fresh = match &self.last_event_id {
            None => page.into_iter().take(1).collect::<Vec<_>>(),
            Some(last) => {
                let end = page
                    .iter()
                    .position(|e| &e.event_id == last)
                    .unwrap_or(page.len());
                page.into_iter().take(end).collect()
            }
        };
        fresh.reverse();

        if let Some(newest) = fresh.last() {
            self.last_event_id = Some(newest.event_id.clone());
        }
        fresh
    }
}

/// Handle to a running event tail
#[derive(Debug)]
pub struct EventTail {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

impl EventTail {
    /// Start tailing `stack_id` on a background task. The first fetch
    /// happens immediately, then once per interval until cancelled.
    pub fn spawn<F>(
        stacks: Arc<dyn StackService>,
        stack_id: impl Into<String>,
        options: TailOptions,
        on_event: F,
    ) -> Self
    where
        F: FnMut(TailObservation) + Send + 'static,
    {
        let cancel = CancellationToken::new();
        let handle = tokio::spawn(run(
            stacks,
            stack_id.into(),
            options,
            cancel.clone(),
            on_event,
        ));

        Self { cancel, handle }
    }

    /// Ask the tail to stop at its next tick boundary
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Token that stops the tail when cancelled
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Cancel the tail and wait for its task to exit
    pub async fn stop(self) {
        self.cancel.cancel();
        if let Err(e) = self.handle.await {
            debug!("event tail task ended abnormally: {}", e);
        }
    }
}

async fn run<F>(
    stacks: Arc<dyn StackService>,
    stack_id: String,
    options: TailOptions,
    cancel: CancellationToken,
    mut on_event: F,
) where
    F: FnMut(TailObservation) + Send + 'static,
{
    info!(stack_id = %stack_id, "Event tail starting...");
    let mut cursor = EventCursor::new();

    loop {
        if cancel.is_cancelled() {
            break;
        }

        match stacks.describe_stack_events(&stack_id).await {
            Ok(page) => {
                for event in cursor.advance(page) {
                    on_event(TailObservation::Event(event));
                }
            }
            Err(e) => on_event(TailObservation::Error(e)),
        }

        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = tokio::time::sleep(options.interval) => {}
        }
    }

    info!(stack_id = %stack_id, "Event tail shutting down...");
}
