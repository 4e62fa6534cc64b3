//! The policy turning a delivered log into a run on the [`RunEngine`].

use crate::{Initiator, InitiatorKind, JobSpec, Metrics, RunEngine, RunInput};
use herald_runlog::{
    LogEvent, contract_payment, eth_log_document, run_log_document, validate_run_log,
};
use std::sync::Arc;

/// A log delivered to an initiator, with the job and initiator it was delivered for.
///
/// Ephemeral; never persisted.
#[derive(Debug, Clone)]
pub struct TriggerEvent {
    /// The delivered log.
    pub log: LogEvent,
    /// The job the log may trigger.
    pub job: Arc<JobSpec>,
    /// The initiator the log was delivered to.
    pub initiator: Initiator,
}

impl TriggerEvent {
    fn log_received(&self) {
        debug!(
            target: "dispatch",
            job = %self.job.id,
            initiator = %self.initiator.kind,
            block_hash = %self.log.block_hash,
            "Received log from block #{} for address {} for job {}",
            self.log.block_number,
            self.log.address.to_checksum(None),
            self.job.id,
        );
    }
}

/// Decodes delivered logs and begins runs for them.
///
/// Every failure is logged and terminal for the log that caused it; nothing is retried
/// and nothing is surfaced to the subscription.
#[derive(Debug, Clone)]
pub struct Dispatcher {
    engine: Arc<dyn RunEngine>,
}

impl Dispatcher {
    /// Creates a [`Dispatcher`] beginning runs on `engine`.
    pub fn new(engine: Arc<dyn RunEngine>) -> Self {
        Self { engine }
    }

    /// Routes `event` by the kind of initiator it was delivered to.
    pub async fn dispatch(&self, event: TriggerEvent) {
        match event.initiator.kind {
            InitiatorKind::RunLog => self.receive_run_log(event).await,
            InitiatorKind::EthLog => self.receive_eth_log(event).await,
            kind => warn!(
                target: "dispatch",
                job = %event.job.id,
                %kind,
                "Ignoring log delivered to a non-log initiator"
            ),
        }
    }

    /// Handles a log delivered to a `runlog` initiator.
    ///
    /// The log must be a `RunRequest` for the job. Its request parameters, fulfillment
    /// metadata and payment become the run input.
    pub async fn receive_run_log(&self, event: TriggerEvent) {
        if !validate_run_log(&event.log, &event.job.id) {
            metrics::counter!(Metrics::LOGS_DROPPED_TOTAL, "reason" => Metrics::DROP_INVALID)
                .increment(1);
            return;
        }

        event.log_received();
        let input = run_log_document(&event.log).and_then(|data| {
            contract_payment(&event.log).map(|amount| RunInput { data, amount })
        });
        match input {
            Ok(input) => self.run_job(&event, input).await,
            Err(err) => {
                error!(
                    target: "dispatch",
                    job = %event.job.id,
                    block_number = event.log.block_number,
                    block_hash = %event.log.block_hash,
                    %err,
                    "Failed to decode run log"
                );
                metrics::counter!(Metrics::LOGS_DROPPED_TOTAL, "reason" => Metrics::DROP_DECODE)
                    .increment(1);
            }
        }
    }

    /// Handles a log delivered to an `ethlog` initiator. The whole log becomes the run
    /// input, without a payment.
    pub async fn receive_eth_log(&self, event: TriggerEvent) {
        event.log_received();
        match eth_log_document(&event.log) {
            Ok(data) => self.run_job(&event, RunInput { data, amount: None }).await,
            Err(err) => {
                error!(
                    target: "dispatch",
                    job = %event.job.id,
                    block_number = event.log.block_number,
                    %err,
                    "Failed to encode log"
                );
                metrics::counter!(Metrics::LOGS_DROPPED_TOTAL, "reason" => Metrics::DROP_DECODE)
                    .increment(1);
            }
        }
    }

    async fn run_job(&self, event: &TriggerEvent, input: RunInput) {
        let block = event.log.block();
        match self.engine.begin_run(&event.job, &event.initiator, input, block).await {
            Ok(run) => {
                info!(
                    target: "dispatch",
                    job = %event.job.id,
                    initiator = %event.initiator.kind,
                    %run,
                    block_number = block.number,
                    "Began run"
                );
                metrics::counter!(Metrics::RUNS_STARTED_TOTAL).increment(1);
            }
            Err(err) => {
                error!(
                    target: "dispatch",
                    job = %event.job.id,
                    initiator = %event.initiator.kind,
                    block_number = block.number,
                    %err,
                    "Failed to begin run"
                );
                metrics::counter!(Metrics::RUN_ERRORS_TOTAL).increment(1);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{traits::MockRunEngine, RunEngineError, RunHandle, test_utils::run_log};
    use alloy_primitives::{Address, B256, U256};
    use herald_runlog::BlockHead;
    use serde_json::{Value, json};

    const JOB_ID: &str = "4a1eb0e8df314cb894024a38991cff0f";

    fn event(kind: InitiatorKind, log: LogEvent) -> TriggerEvent {
        TriggerEvent {
            log,
            job: Arc::new(JobSpec { id: JOB_ID.into(), initiators: vec![] }),
            initiator: Initiator::new(kind, Address::ZERO, JOB_ID),
        }
    }

    fn never_called() -> MockRunEngine {
        let mut engine = MockRunEngine::new();
        engine.expect_begin_run().never();
        engine
    }

    #[tokio::test]
    async fn test_run_log_begins_run_with_payment() {
        let log = run_log(JOB_ID, U256::from(100), 12, B256::repeat_byte(0x12));
        let mut engine = MockRunEngine::new();
        engine
            .expect_begin_run()
            .times(1)
            .withf(|job, initiator, input, block| {
                job.id == JOB_ID &&
                    initiator.kind == InitiatorKind::RunLog &&
                    input.amount == Some(U256::from(100)) &&
                    input.data.get("a") == Some(&json!(1)) &&
                    input.data.get("functionSelector") == Some(&json!("0x76005c26")) &&
                    *block == BlockHead::new(12, B256::repeat_byte(0x12))
            })
            .returning(|_, _, _, _| Ok(RunHandle::from("run-1".to_string())));

        Dispatcher::new(Arc::new(engine)).dispatch(event(InitiatorKind::RunLog, log)).await;
    }

    #[tokio::test]
    async fn test_run_log_for_other_job_is_dropped() {
        let log = run_log("ffffffffffffffffffffffffffffffff", U256::ZERO, 1, B256::ZERO);
        Dispatcher::new(Arc::new(never_called())).dispatch(event(InitiatorKind::RunLog, log)).await;
    }

    #[tokio::test]
    async fn test_run_log_with_bad_payload_is_dropped() {
        let mut log = run_log(JOB_ID, U256::ZERO, 1, B256::ZERO);
        log.data = vec![0u8; 10].into();
        Dispatcher::new(Arc::new(never_called())).dispatch(event(InitiatorKind::RunLog, log)).await;
    }

    #[tokio::test]
    async fn test_eth_log_begins_run_without_payment() {
        // Even a RunRequest shaped log carries no payment through an ethlog initiator.
        let log = run_log(JOB_ID, U256::from(100), 4, B256::repeat_byte(0x04));
        let mut engine = MockRunEngine::new();
        engine
            .expect_begin_run()
            .times(1)
            .withf(|_, initiator, input, block| {
                initiator.kind == InitiatorKind::EthLog &&
                    input.amount.is_none() &&
                    input.data.get("blockNumber") == Some(&Value::from(4)) &&
                    block.number == 4
            })
            .returning(|_, _, _, _| Ok(RunHandle::from("run-2".to_string())));

        Dispatcher::new(Arc::new(engine)).dispatch(event(InitiatorKind::EthLog, log)).await;
    }

    #[tokio::test]
    async fn test_run_engine_failure_is_not_retried() {
        let log = run_log(JOB_ID, U256::ZERO, 1, B256::ZERO);
        let mut engine = MockRunEngine::new();
        engine.expect_begin_run().times(1).returning(|job, _, _, _| {
            Err(RunEngineError::Rejected(job.id.clone(), "archived".into()))
        });

        Dispatcher::new(Arc::new(engine)).dispatch(event(InitiatorKind::RunLog, log)).await;
    }

    #[tokio::test]
    async fn test_non_log_initiator_is_ignored() {
        let log = run_log(JOB_ID, U256::ZERO, 1, B256::ZERO);
        Dispatcher::new(Arc::new(never_called())).dispatch(event(InitiatorKind::Cron, log)).await;
    }
}
