//! Decoders for oracle logs.
//!
//! Everything here is stateless. [`validate_run_log`] is a filtering predicate: it reports
//! why a log was rejected through `tracing` and never returns an error.

use crate::{
    ABI_HEADER_SIZE, DecodeError, FULFILLMENT_FUNCTION_SELECTOR, LogEvent, RUN_LOG_TOPIC,
    RunLogTopicIndex,
};
use alloy_primitives::{U256, hex};
use ciborium::Value as CborValue;
use serde_json::{Map, Number, Value};
use std::str::FromStr;

/// A generic string-keyed document, the input handed to a job run.
pub type Document = Map<String, Value>;

/// Returns whether `log` has the shape of a `RunRequest`: exactly four topics, the first
/// being [`RUN_LOG_TOPIC`].
pub fn is_run_log(log: &LogEvent) -> bool {
    log.topics.len() == RunLogTopicIndex::COUNT &&
        log.topics[RunLogTopicIndex::Signature.index()] == RUN_LOG_TOPIC
}

/// Recovers the job ID from a topic holding the raw ASCII bytes of the ID.
///
/// Leading zero bytes, left by padding a short ID to a full word, are ignored.
pub fn job_id_from_hex_encoded_topic(log: &LogEvent) -> Result<String, DecodeError> {
    let topic = log
        .topic(RunLogTopicIndex::JobId.index())
        .ok_or(DecodeError::MissingTopic(RunLogTopicIndex::JobId.index()))?;
    let start = topic.iter().position(|b| *b != 0).unwrap_or(topic.len());
    Ok(std::str::from_utf8(&topic[start..])?.to_string())
}

/// Recovers the job ID from a topic holding the hex decoding of the ID, right-padded with
/// zeros: the first 32 characters of the topic's hex form.
///
/// This is a plain substring and is not checked for structure.
pub fn job_id_from_improper_encoded_topic(log: &LogEvent) -> Option<String> {
    let topic = log.topic(RunLogTopicIndex::JobId.index())?;
    Some(hex::encode(&topic[..16]))
}

/// Returns whether `log` is a `RunRequest` addressed to `job_id`, under either job ID
/// encoding.
pub fn validate_run_log(log: &LogEvent, job_id: &str) -> bool {
    if !is_run_log(log) {
        error!(
            target: "runlog",
            job = job_id,
            block_number = log.block_number,
            topics = log.topics.len(),
            "Skipping; unable to retrieve runlog parameters from log"
        );
        return false;
    }

    let recovered = job_id_from_hex_encoded_topic(log);
    if matches!(&recovered, Ok(jid) if jid == job_id) {
        return true;
    }
    if job_id_from_improper_encoded_topic(log).is_some_and(|jid| jid == job_id) {
        return true;
    }

    match recovered {
        Ok(jid) => error!(
            target: "runlog",
            job = job_id,
            block_number = log.block_number,
            "Run log didn't have matching job ID: {jid} != {job_id}"
        ),
        Err(err) => error!(
            target: "runlog",
            job = job_id,
            block_number = log.block_number,
            %err,
            "Failed to retrieve job ID from log"
        ),
    }
    false
}

/// Returns the payment attached to a `RunRequest`, or `None` for any other log.
pub fn contract_payment(log: &LogEvent) -> Result<Option<U256>, DecodeError> {
    if !is_run_log(log) {
        return Ok(None);
    }
    let encoded = hex::encode_prefixed(log.topics[RunLogTopicIndex::Amount.index()]);
    U256::from_str(&encoded).map(Some).map_err(|_| DecodeError::Payment(encoded))
}

/// Decodes the request parameters of a `RunRequest` payload.
///
/// The payload starts with a fixed ABI header (version, location and length words) that is
/// skipped unconditionally; the remainder is a CBOR map.
pub fn decode_abi_payload(data: &[u8]) -> Result<Document, DecodeError> {
    if data.len() < ABI_HEADER_SIZE {
        return Err(DecodeError::PayloadTooShort { len: data.len(), header: ABI_HEADER_SIZE });
    }

    let value: CborValue = ciborium::from_reader(&data[ABI_HEADER_SIZE..])
        .map_err(|e| DecodeError::Cbor(e.to_string()))?;
    match cbor_to_json(value)? {
        Value::Object(document) => Ok(document),
        _ => Err(DecodeError::NotADocument),
    }
}

/// CBOR tag of a positive bignum.
const TAG_POSITIVE_BIGNUM: u64 = 2;
/// CBOR tag of a negative bignum.
const TAG_NEGATIVE_BIGNUM: u64 = 3;

/// Converts a decoded CBOR item into its JSON counterpart.
///
/// Byte strings become `0x`-prefixed hex, bignums become numbers (or decimal strings when
/// they exceed 64 bits), other tags are replaced by the item they wrap and non-finite
/// floats become `null`. Maps must be keyed by text.
fn cbor_to_json(value: CborValue) -> Result<Value, DecodeError> {
    Ok(match value {
        CborValue::Null => Value::Null,
        CborValue::Bool(b) => Value::Bool(b),
        CborValue::Text(text) => Value::String(text),
        CborValue::Bytes(bytes) => Value::String(hex::encode_prefixed(bytes)),
        CborValue::Float(f) => Number::from_f64(f).map_or(Value::Null, Value::Number),
        CborValue::Integer(int) => integer_to_json(i128::from(int)),
        CborValue::Tag(TAG_POSITIVE_BIGNUM, inner) => match *inner {
            CborValue::Bytes(bytes) => bignum_to_json(&bytes, false)?,
            other => cbor_to_json(other)?,
        },
        CborValue::Tag(TAG_NEGATIVE_BIGNUM, inner) => match *inner {
            CborValue::Bytes(bytes) => bignum_to_json(&bytes, true)?,
            other => cbor_to_json(other)?,
        },
        CborValue::Tag(_, inner) => cbor_to_json(*inner)?,
        CborValue::Array(items) => {
            Value::Array(items.into_iter().map(cbor_to_json).collect::<Result<_, _>>()?)
        }
        CborValue::Map(entries) => {
            let mut document = Document::new();
            for (key, value) in entries {
                let CborValue::Text(key) = key else {
                    return Err(DecodeError::KeyNotText);
                };
                document.insert(key, cbor_to_json(value)?);
            }
            Value::Object(document)
        }
        _ => return Err(DecodeError::Cbor("unsupported cbor item".into())),
    })
}

fn integer_to_json(int: i128) -> Value {
    if let Ok(n) = u64::try_from(int) {
        Value::from(n)
    } else if let Ok(n) = i64::try_from(int) {
        Value::from(n)
    } else {
        Value::String(int.to_string())
    }
}

/// A bignum holds the big-endian magnitude `n`; a negative bignum encodes `-1 - n`.
fn bignum_to_json(bytes: &[u8], negative: bool) -> Result<Value, DecodeError> {
    let magnitude = U256::try_from_be_slice(bytes)
        .ok_or_else(|| DecodeError::Cbor(format!("bignum of {} bytes", bytes.len())))?;
    if !negative {
        return Ok(u64::try_from(magnitude)
            .map_or_else(|_| Value::String(magnitude.to_string()), Value::from));
    }
    Ok(match i64::try_from(magnitude) {
        Ok(n) => Value::from(-1 - n),
        Err(_) => Value::String(format!("-{}", magnitude.saturating_add(U256::from(1)))),
    })
}

/// Builds the metadata the fulfillment transaction needs: the emitting contract, the
/// requester's internal ID and the fulfillment function selector.
pub fn fulfillment_metadata(log: &LogEvent) -> Result<Document, DecodeError> {
    let internal_id = log
        .topic(RunLogTopicIndex::InternalId.index())
        .ok_or(DecodeError::MissingTopic(RunLogTopicIndex::InternalId.index()))?;

    let mut metadata = Document::new();
    metadata.insert("address".into(), log.address.to_checksum(None).into());
    metadata.insert("dataPrefix".into(), hex::encode_prefixed(internal_id).into());
    metadata.insert("functionSelector".into(), FULFILLMENT_FUNCTION_SELECTOR.into());
    Ok(metadata)
}

/// Merges `extra` into `base`. A key present in both is an error rather than an overwrite.
pub fn merge_documents(mut base: Document, extra: Document) -> Result<Document, DecodeError> {
    if let Some(key) = extra.keys().find(|k| base.contains_key(*k)) {
        return Err(DecodeError::KeyCollision(key.clone()));
    }
    base.extend(extra);
    Ok(base)
}

/// Decodes a validated `RunRequest` into the document a run starts from.
pub fn run_log_document(log: &LogEvent) -> Result<Document, DecodeError> {
    let params = decode_abi_payload(&log.data)?;
    merge_documents(params, fulfillment_metadata(log)?)
}

/// Re-encodes an arbitrary log structurally as a document.
pub fn eth_log_document(log: &LogEvent) -> Result<Document, DecodeError> {
    match serde_json::to_value(log)? {
        Value::Object(document) => Ok(document),
        _ => Err(DecodeError::NotADocument),
    }
}
