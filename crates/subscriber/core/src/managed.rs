//! [`ManagedSubscription`]: one live log stream plus a one-time backfill, merged into a
//! single deduplicated callback stream.

use crate::{
    LiveLogs, LogHandler, LogTransport, Metrics, SubscriptionHandle, TransportError, Unsubscriber,
};
use alloy_primitives::B256;
use herald_runlog::{FilterSpec, LogEvent};
use std::{collections::HashSet, sync::Arc};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Owns the connection, backfill and clean up of a node log subscription.
///
/// A value of this type only exists while the subscription is streaming: construction
/// is [`ManagedSubscription::subscribe`], and [`ManagedSubscription::unsubscribe`]
/// consumes it. Dropping the value closes the subscription the same way.
#[derive(Debug)]
pub struct ManagedSubscription {
    /// Closes the node side of the live stream.
    handle: Box<dyn SubscriptionHandle>,
    /// Stops the log and error reader tasks.
    cancellation: CancellationToken,
    /// The filter the subscription was opened with.
    filter: FilterSpec,
}

impl ManagedSubscription {
    /// Subscribes to the logs selected by `filter` and delegates them to `handler`.
    ///
    /// The live stream is opened first. If the filter starts at a historical block, the
    /// matching history is then queried and delivered before any live log is evaluated,
    /// and the block hashes it covered are recorded. Live logs from those blocks are
    /// suppressed. A failed history query is logged and treated as empty.
    pub async fn subscribe<H: LogHandler>(
        transport: &dyn LogTransport,
        filter: FilterSpec,
        handler: Arc<H>,
    ) -> Result<Self, TransportError> {
        let LiveLogs { logs, errors, handle } = transport.subscribe_logs(&filter).await?;

        let cancellation = CancellationToken::new();
        tokio::spawn(listen_to_subscription_errors(errors, cancellation.clone()));

        let backfilled = backfill_logs(transport, &filter, handler.as_ref()).await;
        tokio::spawn(listen_to_logs(logs, backfilled, handler, cancellation.clone()));

        metrics::gauge!(Metrics::ACTIVE_SUBSCRIPTIONS).increment(1.0);
        Ok(Self { handle, cancellation, filter })
    }

    /// Returns the filter this subscription was opened with.
    pub const fn filter(&self) -> &FilterSpec {
        &self.filter
    }

    /// Closes the node subscription, then stops both reader tasks.
    ///
    /// A log being handled when this is called is allowed to finish.
    pub fn unsubscribe(self) {
        drop(self);
    }
}

impl Drop for ManagedSubscription {
    fn drop(&mut self) {
        self.handle.unsubscribe();
        self.cancellation.cancel();
        metrics::gauge!(Metrics::ACTIVE_SUBSCRIPTIONS).decrement(1.0);
    }
}

impl Unsubscriber for ManagedSubscription {
    fn unsubscribe(self: Box<Self>) {
        Self::unsubscribe(*self)
    }
}

/// Delivers the history selected by `filter` and returns the block hashes it covered.
async fn backfill_logs<H: LogHandler>(
    transport: &dyn LogTransport,
    filter: &FilterSpec,
    handler: &H,
) -> HashSet<B256> {
    let mut backfilled = HashSet::new();
    if !filter.needs_backfill() {
        return backfilled;
    }

    let logs = match transport.historical_logs(filter).await {
        Ok(logs) => logs,
        Err(err) => {
            error!(
                target: "managed_sub",
                %err,
                from_block = filter.from_block,
                "Unable to backfill logs"
            );
            return backfilled;
        }
    };

    debug!(
        target: "managed_sub",
        count = logs.len(),
        from_block = filter.from_block,
        "Backfilling logs"
    );
    for log in logs {
        backfilled.insert(log.block_hash);
        metrics::counter!(Metrics::LOGS_BACKFILLED_TOTAL).increment(1);
        handler.handle_log(log).await;
    }
    backfilled
}

/// Reads the live stream until cancelled or closed by the transport.
///
/// `backfilled` is a snapshot: it is consulted, never extended.
async fn listen_to_logs<H: LogHandler>(
    mut logs: mpsc::Receiver<LogEvent>,
    backfilled: HashSet<B256>,
    handler: Arc<H>,
    cancellation: CancellationToken,
) {
    loop {
        tokio::select! {
            biased;
            _ = cancellation.cancelled() => {
                logs.close();
                break;
            }
            log = logs.recv() => {
                let Some(log) = log else {
                    debug!(target: "managed_sub", "Live log stream closed by transport");
                    break;
                };
                if backfilled.contains(&log.block_hash) {
                    trace!(
                        target: "managed_sub",
                        block_number = log.block_number,
                        block_hash = %log.block_hash,
                        "Skipping live log from backfilled block"
                    );
                    metrics::counter!(Metrics::LOGS_SUPPRESSED_TOTAL).increment(1);
                    continue;
                }
                metrics::counter!(Metrics::LOGS_DELIVERED_TOTAL).increment(1);
                handler.handle_log(log).await;
            }
        }
    }
}

/// Logs every error reported by the live stream. Errors never end the subscription.
async fn listen_to_subscription_errors(
    mut errors: mpsc::Receiver<TransportError>,
    cancellation: CancellationToken,
) {
    loop {
        tokio::select! {
            biased;
            _ = cancellation.cancelled() => {
                errors.close();
                break;
            }
            err = errors.recv() => {
                let Some(err) = err else { break };
                error!(target: "managed_sub", %err, "Error in log subscription");
                metrics::counter!(Metrics::TRANSPORT_ERRORS_TOTAL).increment(1);
            }
        }
    }
}
