//! Error types for log subscriptions.

use crate::InitiatorKind;
use herald_runlog::DecodeError;
use std::fmt;
use thiserror::Error;

/// A malformed initiator definition. Fatal to that initiator, not to its job.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The initiator is not triggered by logs.
    #[error("can only create an initiator subscription for log initiators, got {0}")]
    NotLogInitiated(InitiatorKind),
    /// The initiator belongs to a different job.
    #[error("initiator belongs to job {initiator_job}, not {job}")]
    JobMismatch {
        /// The job ID recorded on the initiator.
        initiator_job: String,
        /// The job being subscribed.
        job: String,
    },
    /// The job ID cannot be expressed in a topic filter.
    #[error(transparent)]
    JobId(#[from] DecodeError),
}

/// A failure of the node transport.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TransportError {
    /// The node rejected the filter or the connection could not be established.
    #[error("failed to subscribe to logs: {0}")]
    Subscribe(String),
    /// The historical log query failed.
    #[error("failed to query historical logs: {0}")]
    Query(String),
    /// An error reported on an established live stream.
    #[error("log subscription error: {0}")]
    Stream(String),
}

/// Why a single initiator could not be subscribed.
#[derive(Debug, Error)]
pub enum InitiatorError {
    /// The initiator definition is malformed.
    #[error(transparent)]
    Config(#[from] ConfigError),
    /// The live subscription could not be opened.
    #[error(transparent)]
    Transport(#[from] TransportError),
}

/// The errors collected while starting the initiators of one job.
#[derive(Debug, Default)]
pub struct TriggerErrors(Vec<InitiatorError>);

impl TriggerErrors {
    /// Records another initiator failure.
    pub fn push(&mut self, err: impl Into<InitiatorError>) {
        self.0.push(err.into());
    }

    /// Returns `true` if no initiator failed.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Number of failed initiators.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Iterates over the failures, in initiator order.
    pub fn iter(&self) -> impl Iterator<Item = &InitiatorError> {
        self.0.iter()
    }
}

impl fmt::Display for TriggerErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, err) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str("; ")?;
            }
            write!(f, "{err}")?;
        }
        Ok(())
    }
}

impl std::error::Error for TriggerErrors {}

/// Errors from [`crate::start_job_subscription`].
#[derive(Debug, Error)]
pub enum JobSubscriptionError {
    /// No log initiator of the job could be started; nothing is listening for it.
    #[error("job {job_id} must have a valid log initiator")]
    NoValidTrigger {
        /// The job that failed to start.
        job_id: String,
        /// Every initiator failure encountered.
        #[source]
        errors: TriggerErrors,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trigger_errors_display() {
        let mut errors = TriggerErrors::default();
        assert!(errors.is_empty());
        assert_eq!(errors.to_string(), "");

        errors.push(ConfigError::NotLogInitiated(InitiatorKind::Web));
        errors.push(TransportError::Subscribe("connection refused".into()));

        assert_eq!(errors.len(), 2);
        assert_eq!(
            errors.to_string(),
            "can only create an initiator subscription for log initiators, got web; \
             failed to subscribe to logs: connection refused"
        );
    }
}
