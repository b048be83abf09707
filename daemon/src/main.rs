//! Gora oracle daemon: replays operation scripts against a node and inspects
//! sortition and configuration.

mod script;

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use serde_json::json;
use tracing::{info, warn};

use gora_consensus::{Delivery, ResponseSink};
use gora_node::{init_logging, NodeConfig, OracleNode};
use gora_sortition::{votes_for_hex_output, HashVrf};

#[derive(Parser)]
#[command(name = "gora-daemon", about = "Gora oracle node daemon")]
struct Cli {
    /// Path to a TOML configuration file. If provided, file settings
    /// are used as the base; CLI flags and env vars override them.
    #[arg(long, env = "GORA_CONFIG")]
    config: Option<PathBuf>,

    /// Directory holding the state snapshot.
    #[arg(long, env = "GORA_DATA_DIR")]
    data_dir: Option<PathBuf>,

    /// Log level: "trace", "debug", "info", "warn", "error".
    #[arg(long, env = "GORA_LOG_LEVEL")]
    log_level: Option<String>,

    /// Log format: "human" or "json".
    #[arg(long, env = "GORA_LOG_FORMAT")]
    log_format: Option<String>,

    /// Collect Prometheus metrics and print them after a replay.
    #[arg(long, env = "GORA_ENABLE_METRICS")]
    metrics: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(clap::Subcommand)]
enum Command {
    /// Apply a JSON-lines operation script to the node.
    Replay {
        /// Script file, one operation per line.
        file: PathBuf,

        /// Ignore any existing snapshot and start from empty state.
        #[arg(long)]
        fresh: bool,

        /// Write the resulting state to the snapshot file.
        #[arg(long)]
        save: bool,
    },
    /// Compute the sortition weight for a VRF output and stake.
    Weight {
        /// VRF output as hex.
        #[arg(long)]
        vrf_output: String,

        /// Stake in base token units.
        #[arg(long)]
        stake: u64,
    },
    /// Print the effective configuration as TOML.
    Config,
}

/// Logs every delivery; stands in for the destination application.
struct LogSink;

impl ResponseSink for LogSink {
    fn deliver(&self, delivery: &Delivery) -> Result<(), String> {
        info!(
            request_id = %delivery.request_id,
            app_id = delivery.destination.app_id,
            value = %String::from_utf8_lossy(&delivery.value),
            "response delivered"
        );
        Ok(())
    }

    fn name(&self) -> &str {
        "log"
    }
}

fn load_config(cli: &Cli) -> anyhow::Result<NodeConfig> {
    let mut config = match &cli.config {
        Some(path) => NodeConfig::from_toml_file(path)
            .with_context(|| format!("loading config from {}", path.display()))?,
        None => NodeConfig::default(),
    };
    if let Some(dir) = &cli.data_dir {
        config.data_dir = dir.clone();
    }
    if let Some(level) = &cli.log_level {
        config.log_level = level.clone();
    }
    if let Some(format) = &cli.log_format {
        config.log_format = format.clone();
    }
    config.enable_metrics |= cli.metrics;
    config.validate()?;
    Ok(config)
}

async fn replay(config: NodeConfig, file: PathBuf, fresh: bool, save: bool) -> anyhow::Result<()> {
    let enable_metrics = config.enable_metrics;
    let sink: Arc<dyn ResponseSink> = Arc::new(LogSink);
    let verifier = Arc::new(HashVrf::new());
    let node = if fresh {
        OracleNode::new(config, sink, verifier)?
    } else {
        OracleNode::open(config, sink, verifier)?
    };

    let reader = BufReader::new(
        File::open(&file).with_context(|| format!("opening script {}", file.display()))?,
    );
    let mut runner = script::Runner::new(&node);
    let (mut applied, mut failed) = (0usize, 0usize);
    for (index, line) in reader.lines().enumerate() {
        let line = line?;
        let number = index + 1;
        let op = match script::parse_line(&line) {
            None => continue,
            Some(Ok(op)) => op,
            Some(Err(e)) => {
                failed += 1;
                println!("{}", json!({ "line": number, "ok": false, "error": format!("parse: {e}") }));
                continue;
            }
        };
        let name = op.name();
        match runner.apply(op).await {
            Ok(result) => {
                applied += 1;
                println!("{}", json!({ "line": number, "op": name, "ok": true, "result": result }));
            }
            Err(e) => {
                failed += 1;
                println!("{}", json!({ "line": number, "op": name, "ok": false, "error": e.to_string() }));
            }
        }
    }
    info!(applied, failed, "replay finished");

    if save {
        let path = node.save_snapshot().await?;
        info!(path = %path.display(), "snapshot written");
    }
    if enable_metrics {
        print!("{}", node.metrics.encode()?);
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = load_config(&cli)?;
    init_logging(config.log_format()?, &config.log_level)?;

    match cli.command {
        Command::Replay { file, fresh, save } => replay(config, file, fresh, save).await?,
        Command::Weight { vrf_output, stake } => {
            let weight = votes_for_hex_output(&vrf_output, stake)?;
            println!("{}", json!({ "stake": stake, "weight": weight }));
        }
        Command::Config => {
            if cli.config.is_none() {
                warn!("no config file given; printing defaults");
            }
            print!("{}", config.to_toml_string()?);
        }
    }
    Ok(())
}
