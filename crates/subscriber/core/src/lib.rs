#![doc = include_str!("../README.md")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]

#[macro_use]
extern crate tracing;

mod error;
pub use error::{ConfigError, InitiatorError, JobSubscriptionError, TransportError, TriggerErrors};

mod types;
pub use types::{Initiator, InitiatorKind, JobSpec, RunHandle, RunInput};

mod traits;
pub use traits::{
    LiveLogs, LogHandler, LogTransport, RunEngine, RunEngineError, SubscriptionHandle,
    Unsubscriber,
};

mod metrics;
pub use metrics::Metrics;

mod managed;
pub use managed::ManagedSubscription;

mod dispatch;
pub use dispatch::{Dispatcher, TriggerEvent};

mod initiator;
pub use initiator::{
    InitiatorSubscription, initiator_filter, start_eth_log_subscription,
    start_run_log_subscription,
};

mod job;
pub use job::{JobSubscription, start_job_subscription};

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use herald_runlog::{BlockHead, Document, FilterSpec, LogEvent, TopicClause};
