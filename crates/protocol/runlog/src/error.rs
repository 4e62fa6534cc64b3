//! Errors raised while decoding oracle logs.

use thiserror::Error;

/// An error decoding a log's topics or payload.
///
/// Decode failures are terminal for the log that produced them: the log is dropped.
#[derive(Debug, Error)]
pub enum DecodeError {
    /// The job ID topic does not hold a valid UTF-8 string.
    #[error("job id topic is not valid utf-8: {0}")]
    JobId(#[from] std::str::Utf8Error),
    /// A job ID cannot be expressed as a log topic.
    #[error("job id {job_id:?} cannot be encoded as a topic: {reason}")]
    JobIdEncoding {
        /// The offending job ID.
        job_id: String,
        /// Why the encoding failed.
        reason: String,
    },
    /// The amount topic could not be parsed as an integer.
    #[error("unable to decode amount from run log: {0}")]
    Payment(String),
    /// A topic the decoder relies on is absent.
    #[error("log is missing topic {0}")]
    MissingTopic(usize),
    /// The payload is shorter than the ABI header.
    #[error("payload of {len} bytes is shorter than the {header} byte abi header")]
    PayloadTooShort {
        /// Length of the payload.
        len: usize,
        /// Required header length.
        header: usize,
    },
    /// The request parameters are not well-formed CBOR.
    #[error("malformed cbor request parameters: {0}")]
    Cbor(String),
    /// A map in the request parameters has a key that is not text.
    #[error("request parameters contain a map key that is not text")]
    KeyNotText,
    /// The decoded value is not a string-keyed map.
    #[error("request parameters are not a map")]
    NotADocument,
    /// Merging two documents would overwrite a key.
    #[error("key {0:?} is already present in the document")]
    KeyCollision(String),
    /// The log could not be re-encoded as a document.
    #[error("failed to encode log as a document: {0}")]
    Encode(#[from] serde_json::Error),
}
