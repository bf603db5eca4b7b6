//! Key generation for a local raffle node
//!
//! Usage: cargo run --bin generate-keys -- --players 3 --output configs/local
//!
//! This generates:
//! - node.yaml pointing at local oracle services
//! - keys.yaml with the owner, coordinator and player seeds and public keys

use anyhow::{Context, Result};
use clap::Parser;
use commonware_cryptography::{ed25519::PrivateKey, Signer};
use commonware_utils::hex;
use raffle_node::defaults::{
    DEFAULT_LOG_LEVEL, DEFAULT_METRICS_PORT, DEFAULT_MINIMUM_ENTRY_VALUE, DEFAULT_PORT,
};
use std::fs;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "generate-keys")]
#[command(about = "Generate keys and a config for a local raffle node")]
struct Args {
    /// Number of player keys to generate
    #[arg(short, long, default_value_t = 3)]
    players: u64,

    /// Output directory for configuration files
    #[arg(short, long, default_value = "configs/local")]
    output: PathBuf,

    /// Seed of the owner key (coordinator uses seed+1, players seed+2..)
    #[arg(short, long, default_value_t = 42)]
    seed: u64,

    /// Port of the HTTP API
    #[arg(long, default_value_t = DEFAULT_PORT)]
    port: u16,

    /// Port for Prometheus metrics
    #[arg(long, default_value_t = DEFAULT_METRICS_PORT)]
    metrics_port: u16,

    /// Base URL shared by the price feed, coordinator and treasury services
    #[arg(long, default_value = "http://localhost:7000")]
    oracle: String,

    /// Randomness subscription
    #[arg(long, default_value_t = 1)]
    subscription_id: u64,
}

fn main() {
    if let Err(err) = run() {
        eprintln!("generate-keys failed: {err:#}");
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let args = Args::parse();
    let oracle = args.oracle.trim_end_matches('/');

    println!("Generating keys for a raffle node");
    println!("  Players: {}", args.players);
    println!("  Output: {}", args.output.display());
    println!();

    fs::create_dir_all(&args.output).with_context(|| {
        format!(
            "Failed to create output directory {}",
            args.output.display()
        )
    })?;

    let owner = PrivateKey::from_seed(args.seed).public_key();
    let coordinator_seed = args.seed + 1;
    let coordinator = PrivateKey::from_seed(coordinator_seed).public_key();

    // Key hash is derived from the seed so repeated runs produce the same file
    let mut key_hash = [0u8; 32];
    key_hash[24..].copy_from_slice(&args.seed.to_be_bytes());

    let node_yaml = format!(
        r#"owner: "{owner}"
coordinator: "{coordinator}"
port: {port}
metrics_port: {metrics_port}
log_level: "{log_level}"
minimum_entry_value: {minimum_entry_value}
price_feed: "{oracle}/feed"
randomness_coordinator: "{oracle}/randomness"
treasury: "{oracle}/custody"
subscription_id: {subscription_id}
key_hash: "{key_hash}"
"#,
        owner = hex(owner.as_ref()),
        coordinator = hex(coordinator.as_ref()),
        port = args.port,
        metrics_port = args.metrics_port,
        log_level = DEFAULT_LOG_LEVEL,
        minimum_entry_value = DEFAULT_MINIMUM_ENTRY_VALUE,
        subscription_id = args.subscription_id,
        key_hash = hex(&key_hash),
    );
    let node_path = args.output.join("node.yaml");
    fs::write(&node_path, node_yaml)
        .with_context(|| format!("Failed to write {}", node_path.display()))?;
    println!("  Created: {}", node_path.display());

    let mut keys_yaml = format!(
        "owner:\n  seed: {}\n  public_key: \"{}\"\ncoordinator:\n  seed: {}\n  public_key: \"{}\"\nplayers:\n",
        args.seed,
        hex(owner.as_ref()),
        coordinator_seed,
        hex(coordinator.as_ref()),
    );
    for i in 0..args.players {
        let seed = args.seed + 2 + i;
        let public = PrivateKey::from_seed(seed).public_key();
        keys_yaml.push_str(&format!(
            "  - seed: {seed}\n    public_key: \"{}\"\n",
            hex(public.as_ref())
        ));
    }
    let keys_path = args.output.join("keys.yaml");
    fs::write(&keys_path, keys_yaml)
        .with_context(|| format!("Failed to write {}", keys_path.display()))?;
    println!("  Created: {}", keys_path.display());

    println!();
    println!("Start the node with:");
    println!(
        "  cargo run --release --bin raffle-node -- --config {}",
        node_path.display()
    );
    Ok(())
}
