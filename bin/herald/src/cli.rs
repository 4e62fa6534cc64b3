//! Contains the herald CLI.

use crate::engine::LoggingRunEngine;
use alloy_primitives::B256;
use alloy_provider::{ProviderBuilder, WsConnect};
use anyhow::{Context, Result};
use clap::Parser;
use herald_cli::{GlobalArgs, cli_styles, init_prometheus_server, init_tracing_subscriber};
use herald_providers_alloy::AlloyLogTransport;
use herald_subscriber::{BlockHead, JobSpec, Metrics, start_job_subscription};
use std::{fs::File, path::PathBuf, sync::Arc};
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;
use url::Url;

/// Herald's CLI.
#[derive(Parser, Clone, Debug)]
#[command(author, version, about, styles = cli_styles(), long_about = None)]
pub struct Cli {
    /// Global arguments for the CLI.
    #[command(flatten)]
    pub global: GlobalArgs,
    /// Websocket URL of the ethereum node.
    #[arg(long, visible_alias = "eth", env = "HERALD_ETH_URL")]
    pub eth_url: Url,
    /// Path to the JSON definition of the job to listen for.
    #[arg(long, env = "HERALD_JOB")]
    pub job: PathBuf,
    /// Number of the current head block. Listening starts at the block after it.
    #[arg(long, requires = "head_hash", env = "HERALD_HEAD_NUMBER")]
    pub head_number: Option<u64>,
    /// Hash of the current head block.
    #[arg(long, requires = "head_number", env = "HERALD_HEAD_HASH")]
    pub head_hash: Option<B256>,
}

impl Cli {
    /// Runs the CLI.
    pub fn run(self) -> Result<()> {
        init_tracing_subscriber(self.global.v, None::<EnvFilter>)?;
        if self.global.metrics.enabled {
            init_prometheus_server(self.global.metrics.addr, self.global.metrics.port)?;
        }
        Metrics::init();

        Self::tokio_runtime()?.block_on(self.start())
    }

    /// Creates a new default tokio multi-thread [Runtime](tokio::runtime::Runtime) with all
    /// features enabled
    pub fn tokio_runtime() -> Result<tokio::runtime::Runtime, std::io::Error> {
        tokio::runtime::Builder::new_multi_thread().enable_all().build()
    }

    /// Listens for the job until ctrl-c is pressed.
    pub async fn start(self) -> Result<()> {
        let job = self.load_job()?;
        let head = self.head();

        let provider = ProviderBuilder::new()
            .connect_ws(WsConnect::new(self.eth_url.as_str()))
            .await
            .with_context(|| format!("Failed to connect to {}", self.eth_url))?;
        let transport = AlloyLogTransport::new(provider);
        let engine = Arc::new(LoggingRunEngine::default());

        let sub = start_job_subscription(job, head, &transport, engine).await?;
        for err in sub.errors().iter() {
            warn!(target: "herald", job = %sub.job().id, %err, "Initiator not listening");
        }
        info!(target: "herald", job = %sub.job().id, initiators = sub.len(), "Listening for job");

        tokio::signal::ctrl_c().await?;
        info!(target: "herald", "Received ctrl-c, shutting down");
        sub.unsubscribe();
        Ok(())
    }

    /// Reads the job definition from [`Cli::job`].
    pub fn load_job(&self) -> Result<JobSpec> {
        debug!(target: "herald", path = ?self.job, "Loading job");
        let file = File::open(&self.job)
            .with_context(|| format!("Failed to open job file {}", self.job.display()))?;
        serde_json::from_reader(file)
            .with_context(|| format!("Failed to parse job file {}", self.job.display()))
    }

    /// The head to start listening after, if one was given.
    pub const fn head(&self) -> Option<BlockHead> {
        match (self.head_number, self.head_hash) {
            (Some(number), Some(hash)) => Some(BlockHead::new(number, hash)),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use herald_subscriber::InitiatorKind;
    use std::io::Write;

    const URL: &str = "ws://localhost:8546";

    #[test]
    fn test_head_requires_both_flags() {
        let cli = Cli::try_parse_from(["herald", "--eth-url", URL, "--job", "job.json"]).unwrap();
        assert_eq!(cli.head(), None);

        let err = Cli::try_parse_from([
            "herald",
            "--eth-url",
            URL,
            "--job",
            "job.json",
            "--head-number",
            "7",
        ]);
        assert!(err.is_err());
    }

    #[test]
    fn test_head_parses() {
        let hash = B256::repeat_byte(0xab);
        let cli = Cli::try_parse_from([
            "herald",
            "--eth",
            URL,
            "--job",
            "job.json",
            "--head-number",
            "7",
            "--head-hash",
            &alloy_primitives::hex::encode_prefixed(hash),
        ])
        .unwrap();
        assert_eq!(cli.head(), Some(BlockHead::new(7, hash)));
        assert_eq!(cli.eth_url.as_str(), "ws://localhost:8546/");
    }

    #[test]
    fn test_load_job() {
        let path = std::env::temp_dir().join(format!("herald-job-{}.json", std::process::id()));
        let mut file = File::create(&path).unwrap();
        write!(
            file,
            r#"{{
                "id": "4a1eb0e8df314cb894024a38991cff0f",
                "initiators": [
                    {{
                        "type": "runlog",
                        "address": "0x9fbda871d559710256a2502a2517b794b482db40",
                        "jobId": "4a1eb0e8df314cb894024a38991cff0f"
                    }},
                    {{"type": "web"}}
                ]
            }}"#
        )
        .unwrap();

        let cli = Cli::try_parse_from(["herald", "--eth-url", URL, "--job", path.to_str().unwrap()])
            .unwrap();
        let job = cli.load_job().unwrap();
        std::fs::remove_file(&path).unwrap();

        assert_eq!(job.id, "4a1eb0e8df314cb894024a38991cff0f");
        assert_eq!(job.initiators.len(), 2);
        assert_eq!(job.initiators[0].kind, InitiatorKind::RunLog);
        assert_eq!(job.initiators[1].kind, InitiatorKind::Web);
        assert!(job.initiators[1].job_id.is_empty());
    }

    #[test]
    fn test_missing_job_file_is_an_error() {
        let args = ["herald", "--eth-url", URL, "--job", "/nonexistent/job.json"];
        let cli = Cli::try_parse_from(args).unwrap();
        assert!(cli.load_job().is_err());
    }
}
