#![forbid(unsafe_code)]
//! Command-line client for a running Davcoin node

use clap::{Parser, Subcommand};
use colored::*;
use comfy_table::presets::UTF8_FULL;
use comfy_table::{Attribute, Cell, Color as TableColor, ContentArrangement, Table};
use davcoin::blockchain::{Block, ChainResponse};
use indicatif::{ProgressBar, ProgressStyle};
use reqwest::{Client, Response};
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;

type CliResult<T> = Result<T, Box<dyn std::error::Error>>;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Base URL of the node's API
    #[arg(long, global = true, default_value = "http://127.0.0.1:5000")]
    node: String,
    /// Request timeout in seconds
    #[arg(long, global = true, default_value_t = 120)]
    timeout: u64,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Mines a block with the node's pending transactions
    Mine,
    /// Lists every block on the node's chain
    Chain,
    /// Asks the node whether its chain is valid
    Valid,
    /// Queues a transaction on the node
    AddTx {
        sender: String,
        receiver: String,
        /// Any JSON number
        amount: String,
    },
    /// Registers peers with the node
    Connect {
        #[arg(required = true)]
        nodes: Vec<String>,
    },
    /// Runs consensus against the node's peers
    Resolve,
}

#[derive(Deserialize)]
struct Mined {
    message: String,
    #[serde(flatten)]
    block: Block,
}

#[tokio::main]
async fn main() -> CliResult<()> {
    let cli = Cli::parse();
    let client = Client::builder()
        .timeout(Duration::from_secs(cli.timeout))
        .build()?;
    let base = cli.node.trim_end_matches('/').to_string();

    let result = match cli.command {
        Commands::Mine => mine(&client, &base).await,
        Commands::Chain => chain(&client, &base).await,
        Commands::Valid => valid(&client, &base).await,
        Commands::AddTx {
            sender,
            receiver,
            amount,
        } => add_tx(&client, &base, sender, receiver, &amount).await,
        Commands::Connect { nodes } => connect(&client, &base, nodes).await,
        Commands::Resolve => resolve(&client, &base).await,
    };

    if let Err(e) = &result {
        eprintln!("{} {}", "❌".red(), e.to_string().red());
    }
    result
}

fn spinner(message: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(ProgressStyle::default_spinner().template("{spinner:.green} {msg}").unwrap());
    pb.set_message(message.to_string());
    pb.enable_steady_tick(Duration::from_millis(100));
    pb
}

/// Turn a non-success response into an error carrying the node's message.
async fn check(response: Response) -> CliResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body: Value = response.json().await.unwrap_or(Value::Null);
    let message = body["error"]
        .as_str()
        .map(str::to_string)
        .unwrap_or_else(|| format!("node answered {}", status));
    Err(message.into())
}

fn short(hash: &str) -> String {
    if hash.chars().count() > 16 {
        format!("{}...", hash.chars().take(13).collect::<String>())
    } else {
        hash.to_string()
    }
}

async fn mine(client: &Client, base: &str) -> CliResult<()> {
    let pb = spinner("Mining block...");
    let response = client.get(format!("{}/mine_block", base)).send().await;
    pb.finish_and_clear();

    let mined: Mined = check(response?).await?.json().await?;
    println!("{}", mined.message.bright_green().bold());
    println!("  {} #{}", "Index:".bright_cyan(), mined.block.index);
    println!("  {} {}", "Proof:".bright_cyan(), mined.block.proof);
    println!("  {} {}", "Timestamp:".bright_cyan(), mined.block.timestamp);
    println!(
        "  {} {}",
        "Previous:".bright_cyan(),
        mined.block.previous_hash
    );
    println!(
        "  {} {}",
        "Transactions:".bright_cyan(),
        mined.block.transactions.len()
    );
    Ok(())
}

async fn chain(client: &Client, base: &str) -> CliResult<()> {
    let response = client.get(format!("{}/get_chain", base)).send().await?;
    let chain: ChainResponse = check(response).await?.json().await?;

    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec![
            Cell::new("Index").add_attribute(Attribute::Bold),
            Cell::new("Timestamp").add_attribute(Attribute::Bold),
            Cell::new("Proof").add_attribute(Attribute::Bold),
            Cell::new("Previous Hash").add_attribute(Attribute::Bold),
            Cell::new("Txs").add_attribute(Attribute::Bold),
        ]);

    for block in &chain.chain {
        let color = if block.index == 1 {
            TableColor::Yellow
        } else {
            TableColor::Cyan
        };
        table.add_row(vec![
            Cell::new(block.index).fg(color),
            Cell::new(&block.timestamp),
            Cell::new(block.proof),
            Cell::new(short(&block.previous_hash)),
            Cell::new(block.transactions.len()),
        ]);
    }

    println!("{table}");
    println!("{} {}", "Length:".bright_green(), chain.length);
    Ok(())
}

async fn valid(client: &Client, base: &str) -> CliResult<()> {
    let response = client.get(format!("{}/is_valid", base)).send().await?;
    let body: Value = check(response).await?.json().await?;
    let message = body["message"].as_str().unwrap_or_default();
    if body["valid"].as_bool().unwrap_or(false) {
        println!("{} {}", "✅".green(), message.green());
    } else {
        println!("{} {}", "⚠️".red(), message.red().bold());
    }
    Ok(())
}

async fn add_tx(
    client: &Client,
    base: &str,
    sender: String,
    receiver: String,
    amount: &str,
) -> CliResult<()> {
    let amount: serde_json::Number = serde_json::from_str(amount)
        .map_err(|_| format!("amount must be a number, got {:?}", amount))?;
    let response = client
        .post(format!("{}/add_transaction", base))
        .json(&json!({ "sender": sender, "receiver": receiver, "amount": amount }))
        .send()
        .await?;
    let body: Value = check(response).await?.json().await?;
    println!(
        "{} {}",
        "📝".bright_cyan(),
        body["message"].as_str().unwrap_or_default().bright_green()
    );
    Ok(())
}

async fn connect(client: &Client, base: &str, nodes: Vec<String>) -> CliResult<()> {
    let response = client
        .post(format!("{}/connect_node", base))
        .json(&json!({ "nodes": nodes }))
        .send()
        .await?;
    let body: Value = check(response).await?.json().await?;
    println!("{}", body["message"].as_str().unwrap_or_default().bright_green());
    if let Some(peers) = body["total_nodes"].as_array() {
        for peer in peers {
            println!("  - {}", peer.as_str().unwrap_or_default().bright_white());
        }
    }
    Ok(())
}

async fn resolve(client: &Client, base: &str) -> CliResult<()> {
    let pb = spinner("Asking peers for their chains...");
    let response = client.get(format!("{}/replace_chain", base)).send().await;
    pb.finish_and_clear();

    let body: Value = check(response?).await?.json().await?;
    let message = body["message"].as_str().unwrap_or_default();
    let (label, chain) = if body["replaced"].as_bool().unwrap_or(false) {
        (message.yellow().bold(), &body["new_chain"])
    } else {
        (message.green(), &body["actual_chain"])
    };
    println!("{}", label);
    let length = chain.as_array().map(Vec::len).unwrap_or(0);
    println!("{} {}", "Length:".bright_green(), length);
    Ok(())
}
