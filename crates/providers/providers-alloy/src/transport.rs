//! [`LogTransport`] over an alloy pubsub [`Provider`].

use crate::{into_log_event, to_alloy_filter};
use alloy_primitives::B256;
use alloy_provider::Provider;
use alloy_pubsub::Subscription;
use alloy_rpc_types_eth::Log;
use async_trait::async_trait;
use herald_runlog::{FilterSpec, LogEvent};
use herald_subscriber::{LiveLogs, LogTransport, SubscriptionHandle, TransportError};
use std::fmt;
use tokio::sync::{broadcast::error::RecvError, mpsc};
use tokio_util::sync::CancellationToken;

/// Buffer between the provider's subscription and the subscriber.
const CHANNEL_CAPACITY: usize = 1024;

/// Serves live logs from `eth_subscribe` and history from `eth_getLogs`.
///
/// The provider must be connected over a pubsub transport (ws or ipc) for
/// [`LogTransport::subscribe_logs`] to succeed.
#[derive(Debug, Clone)]
pub struct AlloyLogTransport<P> {
    provider: P,
}

impl<P> AlloyLogTransport<P> {
    /// Creates a new [`AlloyLogTransport`].
    pub const fn new(provider: P) -> Self {
        Self { provider }
    }

    /// The underlying provider.
    pub const fn provider(&self) -> &P {
        &self.provider
    }
}

#[async_trait]
impl<P> LogTransport for AlloyLogTransport<P>
where
    P: Provider + Clone + fmt::Debug + 'static,
{
    async fn subscribe_logs(&self, filter: &FilterSpec) -> Result<LiveLogs, TransportError> {
        let sub = self
            .provider
            .subscribe_logs(&to_alloy_filter(filter))
            .await
            .map_err(|e| TransportError::Subscribe(e.to_string()))?;
        let id = *sub.local_id();

        let (logs_tx, logs) = mpsc::channel(CHANNEL_CAPACITY);
        let (errors_tx, errors) = mpsc::channel(CHANNEL_CAPACITY);
        let cancellation = CancellationToken::new();
        tokio::spawn(forward_logs(sub, logs_tx, errors_tx, cancellation.clone()));

        debug!(
            target: "alloy_transport",
            %id,
            from_block = filter.from_block,
            "Opened log subscription"
        );
        let handle =
            AlloySubscriptionHandle { provider: self.provider.clone(), id, cancellation };
        Ok(LiveLogs { logs, errors, handle: Box::new(handle) })
    }

    async fn historical_logs(
        &self,
        filter: &FilterSpec,
    ) -> Result<Vec<LogEvent>, TransportError> {
        let logs = self
            .provider
            .get_logs(&to_alloy_filter(filter))
            .await
            .map_err(|e| TransportError::Query(e.to_string()))?;

        let mut events = Vec::with_capacity(logs.len());
        for log in logs.into_iter().filter(|log| !log.removed) {
            match into_log_event(log) {
                Ok(event) => events.push(event),
                Err(err) => {
                    warn!(
                        target: "alloy_transport",
                        %err,
                        "Skipping historical log without a block"
                    );
                }
            }
        }
        Ok(events)
    }
}

/// Logs pushed by the node, in arrival order.
#[async_trait]
trait LogSource: Send {
    /// Waits for the next log.
    async fn recv(&mut self) -> Result<Log, RecvError>;
}

#[async_trait]
impl LogSource for Subscription<Log> {
    async fn recv(&mut self) -> Result<Log, RecvError> {
        Self::recv(self).await
    }
}

/// Pumps a provider subscription into the subscriber's channels until cancelled.
///
/// Removed (reorged) logs are skipped. Pending logs and receiver lag are reported on the
/// error channel and do not end the subscription.
async fn forward_logs<S: LogSource>(
    mut source: S,
    logs: mpsc::Sender<LogEvent>,
    errors: mpsc::Sender<TransportError>,
    cancellation: CancellationToken,
) {
    loop {
        let received = tokio::select! {
            biased;
            _ = cancellation.cancelled() => break,
            received = source.recv() => received,
        };

        let err = match received {
            Ok(log) if log.removed => {
                trace!(
                    target: "alloy_transport",
                    block_hash = ?log.block_hash,
                    "Ignoring removed log"
                );
                continue;
            }
            Ok(log) => match into_log_event(log) {
                Ok(event) => {
                    if logs.send(event).await.is_err() {
                        break;
                    }
                    continue;
                }
                Err(err) => TransportError::Stream(err.to_string()),
            },
            Err(RecvError::Lagged(skipped)) => {
                TransportError::Stream(format!("subscription lagged, {skipped} logs skipped"))
            }
            Err(RecvError::Closed) => {
                warn!(target: "alloy_transport", "Provider closed the log subscription");
                break;
            }
        };

        if errors.send(err).await.is_err() {
            break;
        }
    }
}

/// Closes one provider log subscription.
pub struct AlloySubscriptionHandle<P> {
    provider: P,
    id: B256,
    cancellation: CancellationToken,
}

impl<P> fmt::Debug for AlloySubscriptionHandle<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AlloySubscriptionHandle").field("id", &self.id).finish_non_exhaustive()
    }
}

impl<P> SubscriptionHandle for AlloySubscriptionHandle<P>
where
    P: Provider + Send + Sync,
{
    fn unsubscribe(&self) {
        self.cancellation.cancel();
        if let Err(err) = self.provider.unsubscribe(self.id) {
            warn!(
                target: "alloy_transport",
                id = %self.id,
                %err,
                "Failed to unsubscribe from provider"
            );
        }
    }
}
