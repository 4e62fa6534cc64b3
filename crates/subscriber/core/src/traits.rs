//! Capabilities the subscriber is built from: the node transport, the run engine, and
//! the log callback seams between its layers.

use crate::{Initiator, JobSpec, RunHandle, RunInput, TransportError};
use async_trait::async_trait;
use herald_runlog::{BlockHead, FilterSpec, LogEvent};
use std::fmt::Debug;
use thiserror::Error;
use tokio::sync::mpsc;

/// Closes the node side of a live log subscription.
pub trait SubscriptionHandle: Debug + Send + Sync {
    /// Stops the node from delivering further logs.
    fn unsubscribe(&self);
}

/// An open live log stream, as returned by [`LogTransport::subscribe_logs`].
///
/// Logs and stream errors travel on separate channels so that a failing error stream
/// never stalls log delivery.
#[derive(Debug)]
pub struct LiveLogs {
    /// Logs matching the filter, in node delivery order.
    pub logs: mpsc::Receiver<LogEvent>,
    /// Errors raised by the established stream.
    pub errors: mpsc::Receiver<TransportError>,
    /// Closes the stream on the node.
    pub handle: Box<dyn SubscriptionHandle>,
}

/// Access to the node's logs.
///
/// Implementations must be safe to share between independent subscriptions; the
/// subscriber does not serialize access.
#[async_trait]
pub trait LogTransport: Debug + Send + Sync {
    /// Opens a live stream of the logs selected by `filter`.
    async fn subscribe_logs(&self, filter: &FilterSpec) -> Result<LiveLogs, TransportError>;

    /// Returns the logs selected by `filter` from its start block up to the current head.
    async fn historical_logs(&self, filter: &FilterSpec)
    -> Result<Vec<LogEvent>, TransportError>;
}

/// Receives every log a [`crate::ManagedSubscription`] delivers.
#[async_trait]
pub trait LogHandler: Debug + Send + Sync + 'static {
    /// Handles one delivered log. Runs on the subscription's log reader task, so a slow
    /// handler delays later logs of the same subscription only.
    async fn handle_log(&self, log: LogEvent);
}

/// Error returned by a [`RunEngine`].
#[derive(Debug, Error)]
pub enum RunEngineError {
    /// The engine refused to run the job.
    #[error("job {0} cannot be run: {1}")]
    Rejected(String, String),
    /// Any other failure inside the engine.
    #[error(transparent)]
    Other(#[from] Box<dyn std::error::Error + Send + Sync>),
}

/// The engine that executes job runs.
///
/// Retry policy, if any, belongs to the engine: a failed [`RunEngine::begin_run`] is
/// logged by the subscriber and not attempted again.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RunEngine: Debug + Send + Sync {
    /// Begins a run of `job`, triggered by `initiator`, at the block that contained the
    /// triggering log.
    async fn begin_run(
        &self,
        job: &JobSpec,
        initiator: &Initiator,
        input: RunInput,
        block: BlockHead,
    ) -> Result<RunHandle, RunEngineError>;
}

/// Something that can be unsubscribed exactly once.
pub trait Unsubscriber: Debug + Send + Sync {
    /// Tears the subscription down.
    fn unsubscribe(self: Box<Self>);
}
