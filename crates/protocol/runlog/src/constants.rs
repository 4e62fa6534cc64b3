//! Bit-exact constants of the oracle contract's `RunRequest` emission format.

use alloy_primitives::{B256, b256};

/// Topic-0 of the oracle contract's `RunRequest(...)` event.
///
/// Must match the signature emitted by the deployed oracle contracts byte for byte.
pub const RUN_LOG_TOPIC: B256 =
    b256!("0x3fab86a1207bdcfe3976d0d9df25f263d45ae8d381a60960559771a2b223974d");

/// The function selector of the oracle's fulfillment call, handed to the run as
/// `functionSelector`.
pub const FULFILLMENT_FUNCTION_SELECTOR: &str = "0x76005c26";

/// Size in bytes of a single EVM word.
pub const EVM_WORD_SIZE: usize = 32;

/// Size of the ABI header preceding the CBOR request parameters: a version word, a
/// location word and a length word.
pub const ABI_HEADER_SIZE: usize = 3 * EVM_WORD_SIZE;

/// Positions of the `RunRequest` topics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunLogTopicIndex {
    /// The event signature, [`RUN_LOG_TOPIC`].
    Signature = 0,
    /// The requester's internal correlation ID.
    InternalId = 1,
    /// The job ID, in one of two historical encodings.
    JobId = 2,
    /// The payment amount.
    Amount = 3,
}

impl RunLogTopicIndex {
    /// Number of topics carried by a well-formed `RunRequest` log.
    pub const COUNT: usize = 4;

    /// Returns the topic position as an index.
    pub const fn index(self) -> usize {
        self as usize
    }
}
