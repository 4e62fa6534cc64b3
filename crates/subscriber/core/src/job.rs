//! [`JobSubscription`]: every log initiator of one job, started and stopped together.

use crate::{
    Dispatcher, InitiatorKind, JobSpec, JobSubscriptionError, LogTransport, RunEngine,
    TriggerErrors, Unsubscriber, start_eth_log_subscription, start_run_log_subscription,
};
use herald_runlog::BlockHead;
use std::sync::Arc;

/// Listens to the node's logs on behalf of one job.
#[derive(Debug)]
pub struct JobSubscription {
    job: Arc<JobSpec>,
    unsubscribers: Vec<Box<dyn Unsubscriber>>,
    errors: TriggerErrors,
}

impl JobSubscription {
    /// The job being listened for.
    pub fn job(&self) -> &JobSpec {
        &self.job
    }

    /// Number of initiators that are listening.
    pub fn len(&self) -> usize {
        self.unsubscribers.len()
    }

    /// Always `false`: a job subscription is only built with at least one listening
    /// initiator.
    pub fn is_empty(&self) -> bool {
        self.unsubscribers.is_empty()
    }

    /// The initiators that failed to start. The job runs degraded when this is not empty.
    pub const fn errors(&self) -> &TriggerErrors {
        &self.errors
    }

    /// Unsubscribes every initiator of the job.
    pub fn unsubscribe(self) {
        for sub in self.unsubscribers {
            sub.unsubscribe();
        }
        info!(target: "job_sub", job = %self.job.id, "Unsubscribed job");
    }
}

/// Starts listening for every log initiator of `job`, from the block after `head`.
///
/// Initiators that do not name a job are treated as belonging to `job`.
///
/// Initiators are started independently: a failing initiator is recorded in
/// [`JobSubscription::errors`] and does not stop its siblings. Only when no initiator
/// could be started does the job fail, with every collected error.
pub async fn start_job_subscription(
    job: JobSpec,
    head: Option<BlockHead>,
    transport: &dyn LogTransport,
    engine: Arc<dyn RunEngine>,
) -> Result<JobSubscription, JobSubscriptionError> {
    let job = Arc::new(job.claim_initiators());
    let dispatcher = Dispatcher::new(engine);
    let mut errors = TriggerErrors::default();
    let mut unsubscribers: Vec<Box<dyn Unsubscriber>> = Vec::new();

    for initiator in job.initiators_for(InitiatorKind::EthLog) {
        match start_eth_log_subscription(
            initiator.clone(),
            Arc::clone(&job),
            head.as_ref(),
            transport,
            dispatcher.clone(),
        )
        .await
        {
            Ok(sub) => unsubscribers.push(Box::new(sub)),
            Err(err) => {
                warn!(
                    target: "job_sub",
                    job = %job.id,
                    initiator = %initiator.kind,
                    %err,
                    "Failed to start initiator"
                );
                errors.push(err);
            }
        }
    }

    for initiator in job.initiators_for(InitiatorKind::RunLog) {
        match start_run_log_subscription(
            initiator.clone(),
            Arc::clone(&job),
            head.as_ref(),
            transport,
            dispatcher.clone(),
        )
        .await
        {
            Ok(sub) => unsubscribers.push(Box::new(sub)),
            Err(err) => {
                warn!(
                    target: "job_sub",
                    job = %job.id,
                    initiator = %initiator.kind,
                    %err,
                    "Failed to start initiator"
                );
                errors.push(err);
            }
        }
    }

    if unsubscribers.is_empty() {
        return Err(JobSubscriptionError::NoValidTrigger { job_id: job.id.clone(), errors });
    }

    Ok(JobSubscription { job, unsubscribers, errors })
}
