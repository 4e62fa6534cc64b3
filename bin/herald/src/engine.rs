//! A run engine that logs the runs it is asked to begin.

use async_trait::async_trait;
use herald_subscriber::{
    BlockHead, Initiator, JobSpec, RunEngine, RunEngineError, RunHandle, RunInput,
};
use std::sync::atomic::{AtomicU64, Ordering};

/// Logs every run request and hands out sequential run handles.
#[derive(Debug, Default)]
pub struct LoggingRunEngine {
    runs: AtomicU64,
}

#[async_trait]
impl RunEngine for LoggingRunEngine {
    async fn begin_run(
        &self,
        job: &JobSpec,
        initiator: &Initiator,
        input: RunInput,
        block: BlockHead,
    ) -> Result<RunHandle, RunEngineError> {
        let data = serde_json::to_string(&input.data).map_err(|e| RunEngineError::Other(e.into()))?;
        let run = self.runs.fetch_add(1, Ordering::Relaxed);

        tracing::info!(
            target: "engine",
            job = %job.id,
            initiator = %initiator.kind,
            block_number = block.number,
            block_hash = %block.hash,
            amount = ?input.amount,
            %data,
            "Run requested"
        );
        Ok(RunHandle(format!("{}-{run}", job.id)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::{Address, B256};
    use herald_subscriber::InitiatorKind;

    #[tokio::test]
    async fn test_handles_are_sequential() {
        let engine = LoggingRunEngine::default();
        let job = JobSpec { id: "job".into(), initiators: vec![] };
        let initiator = Initiator::new(InitiatorKind::EthLog, Address::ZERO, "job");
        let block = BlockHead::new(1, B256::ZERO);

        let first =
            engine.begin_run(&job, &initiator, RunInput::default(), block).await.unwrap();
        let second =
            engine.begin_run(&job, &initiator, RunInput::default(), block).await.unwrap();
        assert_eq!(first, RunHandle("job-0".into()));
        assert_eq!(second, RunHandle("job-1".into()));
    }
}
