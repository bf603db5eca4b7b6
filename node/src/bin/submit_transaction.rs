//! Sign and submit raffle commands to a running node
//!
//! Usage:
//!   cargo run --bin submit-transaction -- --seed 44 enter --payment 25000000000000000
//!   cargo run --bin submit-transaction -- --seed 42 close
//!   cargo run --bin submit-transaction -- --seed 43 fulfill --request-id 1 --word 7

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use commonware_codec::Encode;
use commonware_cryptography::{ed25519::PrivateKey, Signer};
use commonware_utils::hex;
use raffle_types::{Amount, Fulfillment, Instruction, RandomWord, RequestId, Transaction};
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(name = "submit-transaction")]
#[command(about = "Sign and submit a raffle command")]
struct Args {
    /// Node URL
    #[arg(short, long, default_value = "http://localhost:8080")]
    url: String,

    /// Seed of the signing key
    #[arg(short, long)]
    seed: u64,

    /// Nonce to sign with (fetched from the node when omitted)
    #[arg(short, long)]
    nonce: Option<u64>,

    /// Request timeout in milliseconds
    #[arg(long, default_value_t = 10_000)]
    timeout_ms: u64,

    #[command(subcommand)]
    command: Action,
}

#[derive(Subcommand, Debug)]
enum Action {
    /// Open a round (owner)
    Open,
    /// Buy a ticket
    Enter {
        /// Payment in base units
        #[arg(long)]
        payment: Amount,
    },
    /// Close the round and request randomness (owner)
    Close,
    /// Retry a refused payout (owner)
    Retry,
    /// Deliver randomness for a pending request (coordinator)
    Fulfill {
        #[arg(long)]
        request_id: u64,
        /// Random word, as an integer
        #[arg(long)]
        word: u64,
    },
}

#[derive(Deserialize)]
struct NonceResponse {
    nonce: u64,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let client = Client::builder()
        .timeout(Duration::from_millis(args.timeout_ms))
        .build()
        .context("Failed to build HTTP client")?;
    let url = args.url.trim_end_matches('/');
    let signer = PrivateKey::from_seed(args.seed);
    let public_key = signer.public_key();

    // First, check health
    let resp = client.get(format!("{url}/healthz")).send().await?;
    if !resp.status().is_success() {
        anyhow::bail!("Health check failed: {}", resp.status());
    }

    let instruction = match args.command {
        Action::Open => Instruction::Open,
        Action::Enter { payment } => Instruction::Enter { payment },
        Action::Close => Instruction::Close,
        Action::Retry => Instruction::RetryPayout,
        Action::Fulfill { request_id, word } => {
            let fulfillment =
                Fulfillment::sign(&signer, RequestId(request_id), vec![RandomWord::from(word)]);
            println!(
                "Fulfilling request {request_id} as {}...",
                &hex(public_key.as_ref())[..16]
            );
            return post(&client, &format!("{url}/fulfill"), fulfillment.encode().to_vec()).await;
        }
    };

    let nonce = match args.nonce {
        Some(nonce) => nonce,
        None => {
            let resp = client
                .get(format!("{url}/nonce/{}", hex(public_key.as_ref())))
                .send()
                .await?;
            if !resp.status().is_success() {
                anyhow::bail!("Nonce lookup failed: {}", resp.status());
            }
            resp.json::<NonceResponse>().await?.nonce
        }
    };

    println!(
        "Submitting {instruction:?} from {}... (nonce {nonce})",
        &hex(public_key.as_ref())[..16]
    );
    let tx = Transaction::sign(&signer, nonce, instruction);
    post(&client, &format!("{url}/submit"), tx.encode().to_vec()).await
}

async fn post(client: &Client, url: &str, body: Vec<u8>) -> Result<()> {
    let resp = client
        .post(url)
        .body(body)
        .header("Content-Type", "application/octet-stream")
        .send()
        .await?;
    let status = resp.status();
    let text = resp.text().await.unwrap_or_default();
    if !status.is_success() {
        anyhow::bail!("Rejected: {status} - {text}");
    }
    println!("  Accepted: {text}");
    Ok(())
}
