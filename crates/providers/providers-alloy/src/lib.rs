#![doc = include_str!("../README.md")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]

#[macro_use]
extern crate tracing;

mod convert;
pub use convert::{ConvertError, into_log_event, to_alloy_filter};

mod transport;
pub use transport::{AlloyLogTransport, AlloySubscriptionHandle};
