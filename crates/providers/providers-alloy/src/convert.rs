//! Conversions between alloy's RPC log types and the transport-neutral ones.

use alloy_rpc_types_eth::{Filter, Log};
use herald_runlog::{FilterSpec, LogEvent, TopicClause};

/// Maximum number of indexed topics a log filter can constrain.
const MAX_TOPICS: usize = 4;

/// A log the node delivered that cannot be attributed to a block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum ConvertError {
    /// The log has no block number; it is pending.
    #[error("log is missing its block number")]
    MissingBlockNumber,
    /// The log has no block hash; it is pending.
    #[error("log is missing its block hash")]
    MissingBlockHash,
}

/// Builds the node-side filter for `spec`.
///
/// Clauses beyond the fourth topic cannot be expressed and are left to the subscriber.
pub fn to_alloy_filter(spec: &FilterSpec) -> Filter {
    let mut filter = Filter::new().from_block(spec.from_block);
    if let Some(address) = spec.address {
        filter = filter.address(address);
    }
    for (i, clause) in spec.topics.iter().take(MAX_TOPICS).enumerate() {
        if let TopicClause::AnyOf(values) = clause {
            filter.topics[i] = values.clone().into();
        }
    }
    filter
}

/// Converts a mined RPC log into a [`LogEvent`].
pub fn into_log_event(log: Log) -> Result<LogEvent, ConvertError> {
    let block_number = log.block_number.ok_or(ConvertError::MissingBlockNumber)?;
    let block_hash = log.block_hash.ok_or(ConvertError::MissingBlockHash)?;
    let address = log.address();
    let (topics, data) = log.inner.data.split();

    Ok(LogEvent {
        address,
        topics,
        data,
        block_number,
        block_hash,
        transaction_hash: log.transaction_hash,
        log_index: log.log_index,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::{Address, B256, Bytes, LogData, address};
    use alloy_rpc_types_eth::Topic;

    const ORACLE: Address = address!("0x9fbda871d559710256a2502a2517b794b482db40");

    fn rpc_log(block_number: Option<u64>, block_hash: Option<B256>) -> Log {
        Log {
            inner: alloy_primitives::Log {
                address: ORACLE,
                data: LogData::new_unchecked(
                    vec![B256::repeat_byte(1), B256::repeat_byte(2)],
                    Bytes::from_static(&[0xde, 0xad]),
                ),
            },
            block_number,
            block_hash,
            transaction_hash: Some(B256::repeat_byte(9)),
            log_index: Some(4),
            ..Default::default()
        }
    }

    #[test]
    fn test_mined_log_converts() {
        let log = into_log_event(rpc_log(Some(12), Some(B256::repeat_byte(0x12)))).unwrap();
        assert_eq!(log.address, ORACLE);
        assert_eq!(log.topics, vec![B256::repeat_byte(1), B256::repeat_byte(2)]);
        assert_eq!(log.data, Bytes::from_static(&[0xde, 0xad]));
        assert_eq!(log.block_number, 12);
        assert_eq!(log.block_hash, B256::repeat_byte(0x12));
        assert_eq!(log.transaction_hash, Some(B256::repeat_byte(9)));
        assert_eq!(log.log_index, Some(4));
    }

    #[test]
    fn test_pending_log_is_rejected() {
        assert_eq!(
            into_log_event(rpc_log(None, Some(B256::ZERO))),
            Err(ConvertError::MissingBlockNumber)
        );
        assert_eq!(into_log_event(rpc_log(Some(1), None)), Err(ConvertError::MissingBlockHash));
    }

    #[test]
    fn test_filter_carries_address_start_and_topics() {
        let spec = FilterSpec::new(42, ORACLE).with_topics(vec![
            TopicClause::AnyOf(vec![B256::repeat_byte(1)]),
            TopicClause::Wildcard,
            TopicClause::AnyOf(vec![B256::repeat_byte(2), B256::repeat_byte(3)]),
        ]);
        let filter = to_alloy_filter(&spec);

        assert_eq!(filter.get_from_block(), Some(42));
        assert!(filter.address.matches(&ORACLE));
        assert!(!filter.address.matches(&Address::ZERO));
        assert_eq!(filter.topics[0], Topic::from(B256::repeat_byte(1)));
        assert!(filter.topics[1].is_empty());
        assert!(filter.topics[2].matches(&B256::repeat_byte(3)));
        assert!(filter.topics[3].is_empty());
    }

    #[test]
    fn test_zero_address_filter_is_unrestricted() {
        let filter = to_alloy_filter(&FilterSpec::new(0, Address::ZERO));
        assert!(filter.address.is_empty());
    }
}
