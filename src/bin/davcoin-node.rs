#![forbid(unsafe_code)]
//! Davcoin ledger node: loads config, then serves the HTTP API

use clap::Parser;
use colored::*;
use std::path::PathBuf;
use std::sync::Arc;
use davcoin::config::{load_config_from, DEFAULT_CONFIG_PATH};
use davcoin::node::{init_tracing, Node};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the TOML configuration file
    #[arg(long, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,
    /// Port to serve the API on (overrides network.api_port)
    #[arg(long)]
    port: Option<u16>,
    /// Interface to bind (overrides network.host)
    #[arg(long)]
    host: Option<String>,
    /// Peer to register at startup; may be repeated
    #[arg(long = "peer")]
    peers: Vec<String>,
    /// Leading zero hex digits required of a proof (overrides miner.difficulty)
    #[arg(long)]
    difficulty: Option<usize>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();
    let args = Args::parse();

    let mut config = load_config_from(&args.config)?;
    if let Some(port) = args.port {
        config.network.api_port = port;
    }
    if let Some(host) = args.host {
        config.network.host = host;
    }
    if let Some(difficulty) = args.difficulty {
        config.miner.difficulty = difficulty;
    }
    config.network.bootstrap_peers.extend(args.peers);

    println!("{}", "Davcoin Node".bright_cyan().bold());
    println!(
        "  {} http://{}:{}",
        "API:".bright_green(),
        config.network.host,
        config.network.api_port
    );
    println!(
        "  {} {}",
        "Difficulty:".bright_green(),
        config.miner.difficulty
    );
    if !config.network.bootstrap_peers.is_empty() {
        println!(
            "  {} {}",
            "Peers:".bright_green(),
            config.network.bootstrap_peers.join(", ")
        );
    }
    println!();

    let node = Arc::new(Node::from_config(config)?);
    node.start().await
}
