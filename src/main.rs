//! Meritnet - trust-weighted auction ledger
//!
//! Single binary with subcommands:
//!   meritnet node      - Run a node
//!   meritnet keygen    - Generate an identity keypair
//!   meritnet inspect   - Summarize a stored chain snapshot

mod keygen;
mod node;

use std::path::PathBuf;

use chrono::{DateTime, Utc};

fn main() {
    let args: Vec<String> = std::env::args().collect();

    match args.get(1).map(|s| s.as_str()) {
        Some("node") => {
            // Pass remaining args (skip binary name and "node" subcommand)
            let node_args = args[2..].to_vec();
            if let Err(e) = node::run(node_args) {
                eprintln!("Node error: {}", e);
                std::process::exit(1);
            }
        }
        Some("keygen") => {
            keygen::run(&args[2..]);
        }
        Some("inspect") => {
            if let Err(e) = inspect(&args[2..]) {
                eprintln!("Inspect error: {}", e);
                std::process::exit(1);
            }
        }
        Some("--help") | Some("-h") => {
            print_help();
        }
        Some("--version") | Some("-V") => {
            println!("meritnet {}", meritnet::VERSION);
        }
        _ => {
            print_help();
        }
    }
}

/// Print a block-by-block summary of the snapshot in a data directory
fn inspect(args: &[String]) -> anyhow::Result<()> {
    let mut dir = dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".meritnet");

    let mut i = 0;
    while i < args.len() {
        if args[i] == "--data-dir" {
            i += 1;
            if i < args.len() {
                dir = PathBuf::from(&args[i]);
            }
        }
        i += 1;
    }

    let store = meritnet::ledger::ChainStore::in_dir(&dir);
    let Some(blocks) = store.load()? else {
        println!("No chain snapshot at {}", store.path().display());
        return Ok(());
    };

    println!(
        "Chain at {} ({} blocks)",
        store.path().display(),
        blocks.len()
    );
    println!();
    for (height, block) in blocks.iter().enumerate() {
        let when = DateTime::<Utc>::from_timestamp_millis(block.timestamp).map_or_else(
            || "?".to_string(),
            |t| t.format("%Y-%m-%d %H:%M:%S").to_string(),
        );
        println!(
            "#{:<4} {}  {}  nonce {:<8} {} tx",
            height,
            &block.hash[..12],
            when,
            block.nonce,
            block.transactions.len()
        );
        for tx in &block.transactions {
            println!("        {}  {}", tx.sender_id, tx.payload);
        }
    }
    Ok(())
}

fn print_help() {
    println!("Meritnet v{}", meritnet::VERSION);
    println!("Trust-weighted dual-consensus auction ledger");
    println!();
    println!("USAGE:");
    println!("    meritnet [COMMAND]");
    println!();
    println!("COMMANDS:");
    println!("    node        Run a node");
    println!("    keygen      Generate an identity keypair");
    println!("    inspect     Summarize a stored chain snapshot");
    println!("                  --data-dir <PATH>  Directory holding the snapshot");
    println!();
    println!("OPTIONS:");
    println!("    -h, --help      Print help");
    println!("    -V, --version   Print version");
    println!();
    println!("EXAMPLES:");
    println!("    meritnet node                      Run with defaults");
    println!("    meritnet node --config node.toml   Run from a config file");
    println!("    meritnet node --help               Show node options");
    println!("    meritnet keygen                    Generate an identity");
}
