//! [`InitiatorSubscription`]: a managed subscription bound to one log initiator of a job.

use crate::{
    ConfigError, Dispatcher, Initiator, InitiatorError, JobSpec, LogHandler, LogTransport,
    ManagedSubscription, TriggerEvent, Unsubscriber,
    types::{FriendlyBlockNumber, ListeningAddress},
};
use async_trait::async_trait;
use herald_runlog::{BlockHead, FilterSpec, LogEvent, TopicClause, topic_filters_for_run_log};
use std::sync::Arc;

/// Builds the filter for `initiator`, listening from the block after `head`.
///
/// Without a known head the filter starts at genesis, which skips the backfill.
pub fn initiator_filter(
    initiator: &Initiator,
    head: Option<&BlockHead>,
    topics: Vec<TopicClause>,
) -> FilterSpec {
    let from_block = head.map_or(0, BlockHead::next_number);
    FilterSpec::new(from_block, initiator.address).with_topics(topics)
}

/// Feeds the logs of one initiator's subscription to the [`Dispatcher`].
#[derive(Debug)]
struct InitiatorLogHandler {
    job: Arc<JobSpec>,
    initiator: Initiator,
    dispatcher: Dispatcher,
}

#[async_trait]
impl LogHandler for InitiatorLogHandler {
    async fn handle_log(&self, log: LogEvent) {
        self.dispatcher
            .dispatch(TriggerEvent {
                log,
                job: Arc::clone(&self.job),
                initiator: self.initiator.clone(),
            })
            .await;
    }
}

/// A log subscription for one initiator of a job.
#[derive(Debug)]
pub struct InitiatorSubscription {
    managed: ManagedSubscription,
    job: Arc<JobSpec>,
    initiator: Initiator,
}

impl InitiatorSubscription {
    /// Subscribes `initiator` with `filter`, dispatching every delivered log.
    ///
    /// Fails with [`ConfigError`] if the initiator is not log based or belongs to another
    /// job, and with a transport error if the live stream cannot be opened.
    pub async fn new(
        initiator: Initiator,
        job: Arc<JobSpec>,
        transport: &dyn LogTransport,
        filter: FilterSpec,
        dispatcher: Dispatcher,
    ) -> Result<Self, InitiatorError> {
        if !initiator.is_log_initiated() {
            return Err(ConfigError::NotLogInitiated(initiator.kind).into());
        }
        if initiator.job_id != job.id {
            return Err(ConfigError::JobMismatch {
                initiator_job: initiator.job_id.clone(),
                job: job.id.clone(),
            }
            .into());
        }

        let handler = Arc::new(InitiatorLogHandler {
            job: Arc::clone(&job),
            initiator: initiator.clone(),
            dispatcher,
        });
        let managed = ManagedSubscription::subscribe(transport, filter, handler).await?;

        let filter = managed.filter();
        info!(
            target: "initiator_sub",
            job = %job.id,
            initiator = %initiator.kind,
            "Listening for {} from block {} for address {} for job {}",
            initiator.kind,
            FriendlyBlockNumber(filter.from_block),
            ListeningAddress(filter.address),
            initiator.job_id,
        );

        Ok(Self { managed, job, initiator })
    }

    /// The job this subscription triggers.
    pub fn job(&self) -> &JobSpec {
        &self.job
    }

    /// The initiator this subscription serves.
    pub const fn initiator(&self) -> &Initiator {
        &self.initiator
    }

    /// The filter the subscription listens with.
    pub const fn filter(&self) -> &FilterSpec {
        self.managed.filter()
    }

    /// Tears the subscription down.
    pub fn unsubscribe(self) {
        self.managed.unsubscribe();
    }
}

impl Unsubscriber for InitiatorSubscription {
    fn unsubscribe(self: Box<Self>) {
        Self::unsubscribe(*self)
    }
}

/// Starts an [`InitiatorSubscription`] for a `runlog` initiator.
///
/// The filter only selects `RunRequest` logs carrying the job's ID in either encoding.
pub async fn start_run_log_subscription(
    initiator: Initiator,
    job: Arc<JobSpec>,
    head: Option<&BlockHead>,
    transport: &dyn LogTransport,
    dispatcher: Dispatcher,
) -> Result<InitiatorSubscription, InitiatorError> {
    let topics = topic_filters_for_run_log(&job.id).map_err(ConfigError::from)?;
    let filter = initiator_filter(&initiator, head, topics);
    InitiatorSubscription::new(initiator, job, transport, filter, dispatcher).await
}

/// Starts an [`InitiatorSubscription`] for an `ethlog` initiator, selecting every log of
/// the initiator's address.
pub async fn start_eth_log_subscription(
    initiator: Initiator,
    job: Arc<JobSpec>,
    head: Option<&BlockHead>,
    transport: &dyn LogTransport,
    dispatcher: Dispatcher,
) -> Result<InitiatorSubscription, InitiatorError> {
    let filter = initiator_filter(&initiator, head, Vec::new());
    InitiatorSubscription::new(initiator, job, transport, filter, dispatcher).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{InitiatorKind, test_utils::{RecordingRunEngine, ScriptedTransport, run_log}};
    use alloy_primitives::{Address, B256, U256, address};
    use herald_runlog::RUN_LOG_TOPIC;

    const JOB_ID: &str = "4a1eb0e8df314cb894024a38991cff0f";
    const ORACLE: Address = address!("0x9fbda871d559710256a2502a2517b794b482db40");

    fn job() -> Arc<JobSpec> {
        Arc::new(JobSpec { id: JOB_ID.into(), initiators: vec![] })
    }

    #[test]
    fn test_initiator_filter_start_block() {
        let initiator = Initiator::new(InitiatorKind::EthLog, ORACLE, JOB_ID);
        let head = BlockHead::new(41, B256::ZERO);

        assert_eq!(initiator_filter(&initiator, Some(&head), vec![]).from_block, 42);
        assert_eq!(initiator_filter(&initiator, None, vec![]).from_block, 0);
        assert_eq!(initiator_filter(&initiator, None, vec![]).address, Some(ORACLE));
    }

    #[tokio::test]
    async fn test_non_log_initiator_is_config_error() {
        let transport = ScriptedTransport::default();
        let (engine, _runs) = RecordingRunEngine::channel();
        let initiator = Initiator::new(InitiatorKind::Web, ORACLE, JOB_ID);

        let err = InitiatorSubscription::new(
            initiator,
            job(),
            &transport,
            FilterSpec::new(0, ORACLE),
            Dispatcher::new(engine),
        )
        .await
        .unwrap_err();

        assert!(matches!(
            err,
            InitiatorError::Config(ConfigError::NotLogInitiated(InitiatorKind::Web))
        ));
        assert!(transport.feeds().is_empty());
    }

    #[tokio::test]
    async fn test_initiator_of_other_job_is_config_error() {
        let transport = ScriptedTransport::default();
        let (engine, _runs) = RecordingRunEngine::channel();
        let initiator = Initiator::new(InitiatorKind::RunLog, ORACLE, "someotherjob");

        let dispatcher = Dispatcher::new(engine);
        let err = start_run_log_subscription(initiator, job(), None, &transport, dispatcher)
            .await
            .unwrap_err();
        assert!(matches!(err, InitiatorError::Config(ConfigError::JobMismatch { .. })));
    }

    #[tokio::test]
    async fn test_run_log_subscription_filter() {
        let transport = ScriptedTransport::default();
        let (engine, _runs) = RecordingRunEngine::channel();
        let initiator = Initiator::new(InitiatorKind::RunLog, ORACLE, JOB_ID);
        let head = BlockHead::new(9, B256::ZERO);

        let dispatcher = Dispatcher::new(engine);
        let sub = start_run_log_subscription(initiator, job(), Some(&head), &transport, dispatcher)
            .await
            .unwrap();

        let filter = sub.filter();
        assert_eq!(filter.from_block, 10);
        assert_eq!(filter.topics[0], TopicClause::AnyOf(vec![RUN_LOG_TOPIC]));
        assert_eq!(filter.topics[1], TopicClause::Wildcard);
        assert_eq!(sub.initiator().kind, InitiatorKind::RunLog);
        assert_eq!(sub.job().id, JOB_ID);
        sub.unsubscribe();
        assert_eq!(transport.unsubscribe_count(), 1);
    }

    #[tokio::test]
    async fn test_delivered_log_reaches_run_engine() {
        let transport = ScriptedTransport::default();
        let (engine, mut runs) = RecordingRunEngine::channel();
        let initiator = Initiator::new(InitiatorKind::RunLog, ORACLE, JOB_ID);

        let dispatcher = Dispatcher::new(engine);
        let sub = start_run_log_subscription(initiator, job(), None, &transport, dispatcher)
            .await
            .unwrap();

        let mut log = run_log(JOB_ID, U256::from(7), 3, B256::repeat_byte(3));
        log.address = ORACLE;
        transport.emit(log).await;

        let run = runs.next().await;
        assert_eq!(run.job_id, JOB_ID);
        assert_eq!(run.input.amount, Some(U256::from(7)));
        assert_eq!(run.block.number, 3);
        sub.unsubscribe();
    }
}
