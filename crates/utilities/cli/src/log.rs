//! Tracing subscriber setup.

use crate::CliResult;
use tracing::Level;
use tracing_subscriber::EnvFilter;

/// Maps a `-v` count to the most verbose level that is logged.
pub const fn verbosity_level(verbosity: u8) -> Level {
    match verbosity {
        0 => Level::INFO,
        1 => Level::DEBUG,
        _ => Level::TRACE,
    }
}

/// Installs a global fmt subscriber.
///
/// Without an explicit `filter`, directives are read from `RUST_LOG`. The level derived from
/// `verbosity` is added on top.
pub fn init_tracing_subscriber(
    verbosity: u8,
    filter: Option<impl Into<EnvFilter>>,
) -> CliResult<()> {
    let filter = filter.map(Into::into).unwrap_or_else(EnvFilter::from_default_env);
    let filter = filter.add_directive(verbosity_level(verbosity).into());
    let subscriber = tracing_subscriber::fmt().with_env_filter(filter).finish();
    tracing::subscriber::set_global_default(subscriber)?;
    Ok(())
}
