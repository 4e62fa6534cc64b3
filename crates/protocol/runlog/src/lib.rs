#![doc = include_str!("../README.md")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]

#[macro_use]
extern crate tracing;

mod constants;
pub use constants::{
    ABI_HEADER_SIZE, EVM_WORD_SIZE, FULFILLMENT_FUNCTION_SELECTOR, RUN_LOG_TOPIC,
    RunLogTopicIndex,
};

mod error;
pub use error::DecodeError;

mod log;
pub use log::{BlockHead, LogEvent};

mod filter;
pub use filter::{FilterSpec, TopicClause, topic_filters_for_run_log};

mod decode;
pub use decode::{
    Document, contract_payment, decode_abi_payload, eth_log_document, fulfillment_metadata,
    is_run_log, job_id_from_hex_encoded_topic, job_id_from_improper_encoded_topic,
    merge_documents, run_log_document, validate_run_log,
};
