#![doc = include_str!("../README.md")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]

mod error;
pub use error::{CliError, CliResult, PrometheusError};

mod log;
pub use log::{init_tracing_subscriber, verbosity_level};

mod prometheus;
pub use prometheus::init_prometheus_server;

mod styles;
pub use styles::cli_styles;

mod flags;
pub use flags::{GlobalArgs, MetricsArgs};
