//! Log filters: which contract, which topics, and from which block.

use crate::{DecodeError, EVM_WORD_SIZE, LogEvent, RUN_LOG_TOPIC};
use alloy_primitives::{Address, B256, hex};

/// A match clause for one topic position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TopicClause {
    /// Any topic value, or no topic at all, is accepted at this position.
    Wildcard,
    /// The topic at this position must be one of the listed hashes.
    AnyOf(Vec<B256>),
}

impl TopicClause {
    /// Returns whether `topic` satisfies this clause.
    pub fn accepts(&self, topic: Option<&B256>) -> bool {
        match self {
            Self::Wildcard => true,
            Self::AnyOf(set) => topic.is_some_and(|t| set.contains(t)),
        }
    }
}

/// The filter a trigger listens with.
///
/// Constructed once per trigger and never mutated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterSpec {
    /// Inclusive lower bound for both the backfill query and the live stream.
    pub from_block: u64,
    /// The emitting contract. `None` listens to every contract.
    pub address: Option<Address>,
    /// Positional topic clauses. Positions past the end are wildcards.
    pub topics: Vec<TopicClause>,
}

impl FilterSpec {
    /// Creates a filter for `address` starting at `from_block`.
    ///
    /// The zero address is treated as "every contract".
    pub fn new(from_block: u64, address: Address) -> Self {
        let address = (!address.is_zero()).then_some(address);
        Self { from_block, address, topics: Vec::new() }
    }

    /// Sets the positional topic clauses.
    pub fn with_topics(mut self, topics: Vec<TopicClause>) -> Self {
        self.topics = topics;
        self
    }

    /// Whether the filter asks for history that predates the live subscription.
    pub const fn needs_backfill(&self) -> bool {
        self.from_block > 0
    }

    /// Returns whether `log` is selected by this filter.
    pub fn matches(&self, log: &LogEvent) -> bool {
        log.block_number >= self.from_block &&
            self.address.is_none_or(|address| address == log.address) &&
            self.topics.iter().enumerate().all(|(i, clause)| clause.accepts(log.topic(i)))
    }
}

/// Builds the topic clauses selecting `RunRequest` logs addressed to `job_id`.
///
/// The job ID has been emitted in two encodings over the contracts' lifetime, so the
/// job ID position accepts both the raw ASCII bytes of the ID and its hex decoding,
/// right-padded with zeros.
pub fn topic_filters_for_run_log(job_id: &str) -> Result<Vec<TopicClause>, DecodeError> {
    let encoding_err = |reason: &str| DecodeError::JobIdEncoding {
        job_id: job_id.to_string(),
        reason: reason.to_string(),
    };

    let raw = job_id.as_bytes();
    if raw.len() > EVM_WORD_SIZE {
        return Err(encoding_err("longer than a topic"));
    }
    let ascii_topic = B256::left_padding_from(raw);

    let decoded = hex::decode(job_id).map_err(|e| encoding_err(&e.to_string()))?;
    if decoded.len() > EVM_WORD_SIZE {
        return Err(encoding_err("hex decoding is longer than a topic"));
    }
    let padded_topic = B256::right_padding_from(&decoded);

    Ok(vec![
        TopicClause::AnyOf(vec![RUN_LOG_TOPIC]),
        TopicClause::Wildcard,
        TopicClause::AnyOf(vec![ascii_topic, padded_topic]),
    ])
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::address;

    const JOB_ID: &str = "4a1eb0e8df314cb894024a38991cff0f";

    fn run_log(job_topic: B256) -> LogEvent {
        LogEvent {
            address: address!("0x000000000000000000000000000000000000000f"),
            topics: vec![RUN_LOG_TOPIC, B256::repeat_byte(1), job_topic, B256::ZERO],
            block_number: 10,
            ..Default::default()
        }
    }

    #[test]
    fn test_zero_address_listens_to_all() {
        let filter = FilterSpec::new(0, Address::ZERO);
        assert!(filter.address.is_none());
        assert!(filter.matches(&run_log(B256::ZERO)));
    }

    #[test]
    fn test_from_block_is_inclusive() {
        let log = run_log(B256::ZERO);
        assert!(FilterSpec::new(10, log.address).matches(&log));
        assert!(!FilterSpec::new(11, log.address).matches(&log));
        let other = address!("0x0000000000000000000000000000000000000001");
        assert!(!FilterSpec::new(0, other).matches(&log));
    }

    #[test]
    fn test_run_log_filter_accepts_both_encodings() {
        let clauses = topic_filters_for_run_log(JOB_ID).unwrap();
        let filter = FilterSpec::new(0, Address::ZERO).with_topics(clauses);

        let ascii = B256::left_padding_from(JOB_ID.as_bytes());
        let padded = B256::right_padding_from(&hex::decode(JOB_ID).unwrap());

        assert!(filter.matches(&run_log(ascii)));
        assert!(filter.matches(&run_log(padded)));
        assert!(!filter.matches(&run_log(B256::repeat_byte(0xee))));
    }

    #[test]
    fn test_run_log_filter_requires_signature() {
        let clauses = topic_filters_for_run_log(JOB_ID).unwrap();
        let filter = FilterSpec::new(0, Address::ZERO).with_topics(clauses);
        let mut log = run_log(B256::left_padding_from(JOB_ID.as_bytes()));
        log.topics[0] = B256::ZERO;
        assert!(!filter.matches(&log));
    }

    #[test]
    fn test_run_log_filter_rejects_unencodable_ids() {
        assert!(matches!(
            topic_filters_for_run_log("not-a-hex-job-id"),
            Err(DecodeError::JobIdEncoding { .. })
        ));
        let long = "ab".repeat(33);
        assert!(matches!(
            topic_filters_for_run_log(&long),
            Err(DecodeError::JobIdEncoding { .. })
        ));
    }
}
