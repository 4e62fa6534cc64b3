//! Contains the [`LogEvent`] received from the node and the [`BlockHead`] it is anchored to.

use alloy_primitives::{Address, B256, Bytes};
use serde::{Deserialize, Serialize};

/// A log emitted by a contract and included in a block.
///
/// Immutable once received. Pending logs, which have no containing block, are never
/// turned into a [`LogEvent`].
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogEvent {
    /// The emitting contract.
    pub address: Address,
    /// The indexed topics, topic-0 first.
    pub topics: Vec<B256>,
    /// The non-indexed payload.
    pub data: Bytes,
    /// Number of the containing block.
    pub block_number: u64,
    /// Hash of the containing block.
    pub block_hash: B256,
    /// Hash of the emitting transaction, when the node reports it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transaction_hash: Option<B256>,
    /// Index of the log within its block, when the node reports it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_index: Option<u64>,
}

impl LogEvent {
    /// Returns the topic at `index`, if present.
    pub fn topic(&self, index: usize) -> Option<&B256> {
        self.topics.get(index)
    }

    /// Returns the [`BlockHead`] of the block that contains this log.
    pub const fn block(&self) -> BlockHead {
        BlockHead { number: self.block_number, hash: self.block_hash }
    }
}

/// A block number paired with its hash.
///
/// Used both as the chain head a job starts listening after, and as the block context
/// handed to the run engine for confirmation bookkeeping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct BlockHead {
    /// The block number.
    pub number: u64,
    /// The block hash.
    pub hash: B256,
}

impl BlockHead {
    /// Creates a new [`BlockHead`].
    pub const fn new(number: u64, hash: B256) -> Self {
        Self { number, hash }
    }

    /// The first block after this head.
    pub const fn next_number(&self) -> u64 {
        self.number.saturating_add(1)
    }
}
