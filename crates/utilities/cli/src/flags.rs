//! Flags shared across binaries.

use clap::{ArgAction, Parser};
use std::net::{IpAddr, Ipv4Addr};

/// Arguments every herald binary accepts.
#[derive(Parser, Default, Debug, Clone, PartialEq, Eq)]
pub struct GlobalArgs {
    /// Verbosity level (0-2)
    #[arg(long, short, global = true, action = ArgAction::Count)]
    pub v: u8,
    /// Prometheus CLI arguments.
    #[command(flatten)]
    pub metrics: MetricsArgs,
}

/// Prometheus metrics flags.
#[derive(Parser, Debug, Clone, PartialEq, Eq)]
pub struct MetricsArgs {
    /// Serve prometheus metrics.
    #[arg(long = "metrics.enabled", global = true, env = "HERALD_METRICS_ENABLED")]
    pub enabled: bool,
    /// Address the metrics server listens on.
    #[arg(
        long = "metrics.addr",
        global = true,
        default_value = "0.0.0.0",
        env = "HERALD_METRICS_ADDR"
    )]
    pub addr: IpAddr,
    /// Port the metrics server listens on. `0` picks a free port.
    #[arg(
        long = "metrics.port",
        global = true,
        default_value_t = 9090,
        env = "HERALD_METRICS_PORT"
    )]
    pub port: u16,
}

impl Default for MetricsArgs {
    fn default() -> Self {
        Self { enabled: false, addr: IpAddr::V4(Ipv4Addr::UNSPECIFIED), port: 9090 }
    }
}
