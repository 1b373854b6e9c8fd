#![forbid(unsafe_code)]

use colored::*;

fn main() {
    println!("{}", "Davcoin".bright_cyan().bold());
    println!("{}", "-------".bright_cyan());
    println!();
    println!(
        "{}",
        "The ledger node and its client live in separate binaries.".yellow()
    );
    println!(
        "{}",
        "Use 'cargo run --bin <binary_name>' to run one.".yellow()
    );
    println!();
    println!("{}", "Available binaries:".bright_green().underline());
    println!(
        "  - {}  {}",
        "davcoin-node".bright_white(),
        "serve a ledger node over HTTP".dimmed()
    );
    println!(
        "  - {}   {}",
        "davcoin-cli".bright_white(),
        "mine, inspect and connect nodes".dimmed()
    );
    println!();
    println!("{}", "Example:".bright_green().underline());
    println!("{}", "  cargo run --bin davcoin-node -- --port 5001".italic());
    println!(
        "{}",
        "  cargo run --bin davcoin-cli -- --node http://127.0.0.1:5001 mine".italic()
    );
}
