//! Job and initiator definitions, and the values handed to the run engine.

use alloy_primitives::{Address, U256};
use derive_more::{Display, From};
use herald_runlog::Document;
use serde::{Deserialize, Serialize};
use std::fmt;

/// The kind of trigger an [`Initiator`] represents.
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InitiatorKind {
    /// A `RunRequest` log addressed to the job.
    #[display("runlog")]
    RunLog,
    /// Any log matching the initiator's address.
    #[display("ethlog")]
    EthLog,
    /// A run requested over the web API.
    #[display("web")]
    Web,
    /// A run on a cron schedule.
    #[display("cron")]
    Cron,
    /// A run at a fixed time.
    #[display("runat")]
    RunAt,
}

impl InitiatorKind {
    /// Returns whether initiators of this kind are triggered by logs.
    pub const fn is_log_initiated(self) -> bool {
        matches!(self, Self::RunLog | Self::EthLog)
    }
}

/// One trigger definition of a job. Read-only to the subscriber.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Initiator {
    /// The trigger kind.
    #[serde(rename = "type")]
    pub kind: InitiatorKind,
    /// The contract to listen to. The zero address listens to every contract.
    #[serde(default)]
    pub address: Address,
    /// The job this initiator belongs to. Left empty in a job definition, it is claimed
    /// by the enclosing job (see [`JobSpec::claim_initiators`]).
    #[serde(default)]
    pub job_id: String,
}

impl Initiator {
    /// Creates a new [`Initiator`].
    pub fn new(kind: InitiatorKind, address: Address, job_id: impl Into<String>) -> Self {
        Self { kind, address, job_id: job_id.into() }
    }

    /// Returns whether this initiator is triggered by logs.
    pub const fn is_log_initiated(&self) -> bool {
        self.kind.is_log_initiated()
    }
}

/// A job definition: its ID and its triggers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobSpec {
    /// The job ID, 32 hex characters.
    pub id: String,
    /// The job's triggers.
    #[serde(default)]
    pub initiators: Vec<Initiator>,
}

impl JobSpec {
    /// Returns the initiators of the given kind, in definition order.
    pub fn initiators_for(&self, kind: InitiatorKind) -> impl Iterator<Item = &Initiator> {
        self.initiators.iter().filter(move |i| i.kind == kind)
    }

    /// Assigns every initiator without a job ID to this job.
    ///
    /// Initiators naming another job are left untouched.
    pub fn claim_initiators(mut self) -> Self {
        for initiator in self.initiators.iter_mut().filter(|i| i.job_id.is_empty()) {
            initiator.job_id.clone_from(&self.id);
        }
        self
    }
}

/// The input a run begins with.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RunInput {
    /// The trigger's document.
    pub data: Document,
    /// The payment offered by the requester, for `RunRequest` triggers.
    pub amount: Option<U256>,
}

/// Identifies a run begun on the run engine.
#[derive(Debug, Display, From, Clone, PartialEq, Eq, Hash)]
pub struct RunHandle(pub String);

/// Renders a block number as `#<decimal> (0x<hex>)`.
#[derive(Debug, Clone, Copy)]
pub(crate) struct FriendlyBlockNumber(pub(crate) u64);

impl fmt::Display for FriendlyBlockNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{0} ({0:#x})", self.0)
    }
}

/// Renders a listening address, `[all]` when no address is filtered on.
#[derive(Debug, Clone, Copy)]
pub(crate) struct ListeningAddress(pub(crate) Option<Address>);

impl fmt::Display for ListeningAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            Some(address) if !address.is_zero() => f.write_str(&address.to_checksum(None)),
            _ => f.write_str("[all]"),
        }
    }
}
