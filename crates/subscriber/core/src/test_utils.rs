//! In-memory transport and run engine for exercising subscriptions without a node.

use crate::{
    Initiator, InitiatorKind, JobSpec, LiveLogs, LogTransport, RunEngine, RunEngineError,
    RunHandle, RunInput, SubscriptionHandle, TransportError,
};
use alloy_primitives::{Address, B256, U256};
use async_trait::async_trait;
use herald_runlog::{ABI_HEADER_SIZE, BlockHead, FilterSpec, LogEvent, RUN_LOG_TOPIC};
use std::{
    sync::{
        Arc, Mutex,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};
use tokio::sync::mpsc;

/// Capacity of the channels handed out by [`ScriptedTransport`].
const FEED_CAPACITY: usize = 64;

/// Returns a log of block `number` with hash `hash`.
pub fn log_at(number: u64, hash: B256) -> LogEvent {
    LogEvent { block_number: number, block_hash: hash, ..Default::default() }
}

/// Returns a well-formed `RunRequest` log for `job_id`, with the raw ASCII job ID
/// encoding and `{"a": 1}` as request parameters.
pub fn run_log(job_id: &str, amount: U256, number: u64, hash: B256) -> LogEvent {
    let mut data = vec![0u8; ABI_HEADER_SIZE];
    data.extend_from_slice(&[0xa1, 0x61, 0x61, 0x01]);
    LogEvent {
        address: Address::ZERO,
        topics: vec![
            RUN_LOG_TOPIC,
            B256::repeat_byte(0x42),
            B256::left_padding_from(job_id.as_bytes()),
            B256::from(amount.to_be_bytes::<32>()),
        ],
        data: data.into(),
        block_number: number,
        block_hash: hash,
        ..Default::default()
    }
}

/// The sending side of one live subscription opened on a [`ScriptedTransport`].
#[derive(Debug, Clone)]
pub struct LiveFeed {
    /// The filter the subscription was opened with.
    pub filter: FilterSpec,
    /// Sends live logs.
    pub logs: mpsc::Sender<LogEvent>,
    /// Sends stream errors.
    pub errors: mpsc::Sender<TransportError>,
}

#[derive(Debug)]
struct CountingHandle(Arc<AtomicUsize>);

impl SubscriptionHandle for CountingHandle {
    fn unsubscribe(&self) {
        self.0.fetch_add(1, Ordering::SeqCst);
    }
}

/// A [`LogTransport`] replaying scripted history and forwarding emitted logs to every
/// open subscription whose filter selects them.
#[derive(Debug, Default)]
pub struct ScriptedTransport {
    history: Vec<LogEvent>,
    history_error: Option<String>,
    live_prelude: Vec<LogEvent>,
    rejected: Vec<Address>,
    feeds: Mutex<Vec<LiveFeed>>,
    history_queries: AtomicUsize,
    unsubscribes: Arc<AtomicUsize>,
}

impl ScriptedTransport {
    /// Sets the logs returned by history queries.
    pub fn with_history(mut self, logs: Vec<LogEvent>) -> Self {
        self.history = logs;
        self
    }

    /// Makes every history query fail.
    pub fn failing_history(mut self, reason: &str) -> Self {
        self.history_error = Some(reason.to_string());
        self
    }

    /// Queues `logs` on every live stream as it is opened, before the subscriber sees it.
    pub fn with_live_prelude(mut self, logs: Vec<LogEvent>) -> Self {
        self.live_prelude = logs;
        self
    }

    /// Rejects subscriptions filtering on `address`.
    pub fn rejecting(mut self, address: Address) -> Self {
        self.rejected.push(address);
        self
    }

    /// The live subscriptions opened so far.
    pub fn feeds(&self) -> Vec<LiveFeed> {
        self.feeds.lock().unwrap().clone()
    }

    /// Number of history queries served.
    pub fn history_queries(&self) -> usize {
        self.history_queries.load(Ordering::SeqCst)
    }

    /// Number of live subscriptions closed on the transport.
    pub fn unsubscribe_count(&self) -> usize {
        self.unsubscribes.load(Ordering::SeqCst)
    }

    /// Sends `log` to every open subscription selecting it.
    pub async fn emit(&self, log: LogEvent) {
        for feed in self.feeds() {
            if feed.filter.matches(&log) {
                let _ = feed.logs.send(log.clone()).await;
            }
        }
    }

    /// Sends `err` on every open subscription's error stream.
    pub async fn emit_error(&self, err: TransportError) {
        for feed in self.feeds() {
            let _ = feed.errors.send(err.clone()).await;
        }
    }
}

#[async_trait]
impl LogTransport for ScriptedTransport {
    async fn subscribe_logs(&self, filter: &FilterSpec) -> Result<LiveLogs, TransportError> {
        if self.rejected.contains(&filter.address.unwrap_or_default()) {
            return Err(TransportError::Subscribe("filter rejected".to_string()));
        }

        let (logs_tx, logs) = mpsc::channel(FEED_CAPACITY);
        let (errors_tx, errors) = mpsc::channel(FEED_CAPACITY);
        for log in self.live_prelude.iter().filter(|log| filter.matches(log)) {
            logs_tx.try_send(log.clone()).map_err(|e| TransportError::Subscribe(e.to_string()))?;
        }
        self.feeds.lock().unwrap().push(LiveFeed {
            filter: filter.clone(),
            logs: logs_tx,
            errors: errors_tx,
        });

        Ok(LiveLogs {
            logs,
            errors,
            handle: Box::new(CountingHandle(Arc::clone(&self.unsubscribes))),
        })
    }

    async fn historical_logs(
        &self,
        filter: &FilterSpec,
    ) -> Result<Vec<LogEvent>, TransportError> {
        self.history_queries.fetch_add(1, Ordering::SeqCst);
        if let Some(reason) = &self.history_error {
            return Err(TransportError::Query(reason.clone()));
        }
        Ok(self.history.iter().filter(|log| filter.matches(log)).cloned().collect())
    }
}

/// A run begun on a [`RecordingRunEngine`].
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedRun {
    /// The job's ID.
    pub job_id: String,
    /// The kind of initiator that triggered the run.
    pub initiator: InitiatorKind,
    /// The run input.
    pub input: RunInput,
    /// The block of the triggering log.
    pub block: BlockHead,
}

/// The receiving end of a [`RecordingRunEngine`].
#[derive(Debug)]
pub struct RecordedRuns(mpsc::UnboundedReceiver<RecordedRun>);

impl RecordedRuns {
    /// Waits up to five seconds for the next run.
    pub async fn next(&mut self) -> RecordedRun {
        tokio::time::timeout(Duration::from_secs(5), self.0.recv())
            .await
            .expect("timed out waiting for a run")
            .expect("run engine dropped")
    }

    /// Returns the next run if one has already begun.
    pub fn try_next(&mut self) -> Option<RecordedRun> {
        self.0.try_recv().ok()
    }
}

/// A [`RunEngine`] recording every run it is asked to begin.
#[derive(Debug)]
pub struct RecordingRunEngine {
    runs: mpsc::UnboundedSender<RecordedRun>,
    count: AtomicUsize,
}

impl RecordingRunEngine {
    /// Creates an engine and the receiver of the runs it records.
    pub fn channel() -> (Arc<Self>, RecordedRuns) {
        let (runs, rx) = mpsc::unbounded_channel();
        (Arc::new(Self { runs, count: AtomicUsize::new(0) }), RecordedRuns(rx))
    }
}

#[async_trait]
impl RunEngine for RecordingRunEngine {
    async fn begin_run(
        &self,
        job: &JobSpec,
        initiator: &Initiator,
        input: RunInput,
        block: BlockHead,
    ) -> Result<RunHandle, RunEngineError> {
        let id = self.count.fetch_add(1, Ordering::SeqCst);
        let _ = self.runs.send(RecordedRun {
            job_id: job.id.clone(),
            initiator: initiator.kind,
            input,
            block,
        });
        Ok(RunHandle(format!("run-{id}")))
    }
}
