//! Consumable CLI
//!
//! Entry points for the voucher pipeline: batch generation, secret
//! issuance, gas funding and redemption.
//!
//! Usage:
//!   consumable generate-wallets <AMOUNT> [--out <FILE>]
//!   consumable generate-secrets <DUMP> <CHAIN_ID> <CONTRACT> <SIGNATURE> [--out <FILE>]
//!   consumable fund-wallets <DUMP> <FUNDER_KEY> <CHAIN_ID> <AMOUNT> [--rpc-url <URL>]
//!   consumable consume <SECRET> <RECIPIENT>

use std::fs;
use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};

use alloy_primitives::{Address, B256, U256};
use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use zeroize::Zeroize;

use consumable_core::{
    generate_wallets, issue_secrets, parse_method_signature, BatchDump, ChainNetwork,
    CommitmentTree, FundingOrchestrator, FundingPlan, HttpProvider, RedemptionClient,
};

#[derive(Parser, Debug)]
#[command(name = "consumable")]
#[command(about = "Merkle-gated one-time voucher toolkit", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Generate a wallet batch, build its commitment tree and write the dump file
    GenerateWallets {
        /// Number of wallets (one voucher each)
        amount: usize,
        /// Output dump file (default: dump/data_<timestamp>.json)
        #[arg(short, long)]
        out: Option<PathBuf>,
    },
    /// Issue secret tokens for every wallet in a dump file
    GenerateSecrets {
        /// Batch dump file
        dump: PathBuf,
        /// Chain the secrets will be redeemed on
        chain_id: u64,
        /// Consumable contract address
        contract: Address,
        /// Method signature, e.g. 'consumeSecret(bytes32[] proof, address receiver)'
        method_signature: String,
        /// Output secrets file (default: secrets/data_<timestamp>.json)
        #[arg(short, long)]
        out: Option<PathBuf>,
    },
    /// Transfer gas funds to every wallet in a dump file
    FundWallets {
        /// Batch dump file
        dump: PathBuf,
        /// Funder private key (hex), or '-' to read it from stdin
        funder_key: String,
        /// Chain to fund on
        chain_id: u64,
        /// ETH per wallet, e.g. '0.01'
        amount: String,
        /// RPC endpoint override (default: the registry entry for the chain)
        #[arg(long)]
        rpc_url: Option<String>,
    },
    /// Redeem a secret token to a recipient address
    Consume {
        /// Secret token
        secret: String,
        /// Address that receives the voucher value
        recipient: Address,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::GenerateWallets { amount, out } => generate_wallets_cmd(amount, out),
        Commands::GenerateSecrets {
            dump,
            chain_id,
            contract,
            method_signature,
            out,
        } => generate_secrets_cmd(dump, chain_id, contract, &method_signature, out),
        Commands::FundWallets {
            dump,
            funder_key,
            chain_id,
            amount,
            rpc_url,
        } => fund_wallets_cmd(dump, &funder_key, chain_id, &amount, rpc_url).await,
        Commands::Consume { secret, recipient } => consume_cmd(&secret, recipient).await,
    }
}

fn generate_wallets_cmd(amount: usize, out: Option<PathBuf>) -> anyhow::Result<()> {
    if amount == 0 {
        bail!("amount must be positive");
    }

    tracing::info!(amount, "generating wallet batch");
    let wallets = generate_wallets(amount);
    let addresses: Vec<Address> = wallets.iter().map(|w| w.address()).collect();
    let tree = CommitmentTree::build(&addresses)?;
    let dump = BatchDump::capture(&tree, &wallets);

    let path = out.unwrap_or_else(|| timestamped_path("dump"));
    ensure_parent_dir(&path)?;
    dump.write(&path)?;

    println!("Merkle root: {}", tree.root());
    println!("Dump written to {}", path.display());
    Ok(())
}

fn generate_secrets_cmd(
    dump_path: PathBuf,
    chain_id: u64,
    contract: Address,
    method_signature: &str,
    out: Option<PathBuf>,
) -> anyhow::Result<()> {
    // Issuing secrets for a chain nobody can redeem on is operator error
    if ChainNetwork::for_chain_id(chain_id).is_none() {
        bail!("unsupported chain id {chain_id}");
    }

    let dump = BatchDump::read(&dump_path)
        .with_context(|| format!("failed to load dump {}", dump_path.display()))?;
    let (tree, wallets) = dump.restore()?;

    let (method_name, method_args) = parse_method_signature(method_signature)?;
    tracing::info!(
        wallets = wallets.len(),
        %contract,
        chain_id,
        method = %method_name,
        "issuing secrets"
    );
    let secrets = issue_secrets(&tree, &wallets, contract, &method_name, &method_args, chain_id)?;

    let path = out.unwrap_or_else(|| timestamped_path("secrets"));
    ensure_parent_dir(&path)?;
    fs::write(&path, serde_json::to_string_pretty(&secrets)?)?;

    println!("{} secrets written to {}", secrets.len(), path.display());
    Ok(())
}

async fn fund_wallets_cmd(
    dump_path: PathBuf,
    funder_key: &str,
    chain_id: u64,
    amount: &str,
    rpc_url: Option<String>,
) -> anyhow::Result<()> {
    let endpoint = match rpc_url {
        Some(url) => url,
        None => ChainNetwork::for_chain_id(chain_id)
            .map(|c| c.rpc_url().to_string())
            .with_context(|| format!("unsupported chain id {chain_id} and no --rpc-url given"))?,
    };

    let funder_key = read_private_key(funder_key)?;
    let amount_wei = parse_ether(amount)?;

    let dump = BatchDump::read(&dump_path)
        .with_context(|| format!("failed to load dump {}", dump_path.display()))?;
    let (_tree, wallets) = dump.restore()?;
    let recipients: Vec<Address> = wallets.iter().map(|w| w.address()).collect();

    tracing::info!(
        recipients = recipients.len(),
        chain_id,
        endpoint = %endpoint,
        "funding wallet batch"
    );
    let provider = HttpProvider::new(endpoint);
    let orchestrator = FundingOrchestrator::new(&provider, chain_id);
    let report = orchestrator
        .fund(funder_key, &recipients, FundingPlan::new(amount_wei))
        .await?;

    println!("Funded {} wallets with {amount} ETH each", report.funded.len());
    Ok(())
}

async fn consume_cmd(secret: &str, recipient: Address) -> anyhow::Result<()> {
    let payload = consumable_core::decode(secret)?;
    tracing::info!(
        chain_id = payload.chain_id,
        contract = %payload.contract_address,
        %recipient,
        "redeeming secret"
    );
    let client = RedemptionClient::for_payload(&payload)?;
    let redemption = client.consume(&payload, recipient).await?;

    println!(
        "Secret consumed in block {} (tx {})",
        redemption.block_number, redemption.tx_hash
    );
    Ok(())
}

fn timestamped_path(dir: &str) -> PathBuf {
    let timestamp = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0);
    PathBuf::from(dir).join(format!("data_{timestamp}.json"))
}

fn ensure_parent_dir(path: &PathBuf) -> anyhow::Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
    }
    Ok(())
}

/// Read a hex private key from the argument, or from stdin when it is '-'.
fn read_private_key(arg: &str) -> anyhow::Result<B256> {
    let mut text = if arg == "-" {
        let mut buffer = String::new();
        std::io::stdin()
            .read_line(&mut buffer)
            .context("failed to read private key from stdin")?;
        let trimmed = buffer.trim().to_string();
        buffer.zeroize();
        trimmed
    } else {
        arg.to_string()
    };

    let mut bytes = [0u8; 32];
    let result = hex::decode_to_slice(text.trim_start_matches("0x"), &mut bytes)
        .context("private key must be 32 bytes of hex");
    text.zeroize();
    result?;
    Ok(B256::from(bytes))
}

/// Parse a decimal ETH amount ("0.01") into wei.
fn parse_ether(amount: &str) -> anyhow::Result<U256> {
    let amount = amount.trim();
    let (whole, frac) = match amount.split_once('.') {
        Some((w, f)) => (w, f),
        None => (amount, ""),
    };
    if whole.is_empty() && frac.is_empty() {
        bail!("empty amount");
    }
    if frac.len() > 18 {
        bail!("amount has more than 18 decimal places");
    }
    if !whole.chars().all(|c| c.is_ascii_digit()) || !frac.chars().all(|c| c.is_ascii_digit()) {
        bail!("amount must be a decimal number, got '{amount}'");
    }

    let wei_per_eth = U256::from(10u64).pow(U256::from(18u64));
    let whole_wei = if whole.is_empty() {
        U256::ZERO
    } else {
        U256::from_str_radix(whole, 10)
            .context("bad integer part")?
            .checked_mul(wei_per_eth)
            .context("amount too large")?
    };
    let frac_wei = if frac.is_empty() {
        U256::ZERO
    } else {
        U256::from_str_radix(frac, 10).context("bad fractional part")?
            * U256::from(10u64).pow(U256::from((18 - frac.len()) as u64))
    };
    whole_wei.checked_add(frac_wei).context("amount too large")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_ether() {
        let eth = U256::from(10u64).pow(U256::from(18u64));
        assert_eq!(parse_ether("1").unwrap(), eth);
        assert_eq!(parse_ether("0.5").unwrap(), eth / U256::from(2));
        assert_eq!(parse_ether("0.01").unwrap(), eth / U256::from(100));
        assert_eq!(parse_ether(".25").unwrap(), eth / U256::from(4));
        assert_eq!(
            parse_ether("2.000000000000000001").unwrap(),
            eth * U256::from(2) + U256::from(1)
        );

        assert!(parse_ether("").is_err());
        assert!(parse_ether(".").is_err());
        // An overflowing whole part is an error, not a panic
        assert!(parse_ether(&"9".repeat(78)).is_err());
        assert!(parse_ether("1.0000000000000000001").is_err());
        assert!(parse_ether("-1").is_err());
        assert!(parse_ether("one").is_err());
    }

    #[test]
    fn test_read_private_key() {
        let key = read_private_key(
            "0x0101010101010101010101010101010101010101010101010101010101010101",
        )
        .unwrap();
        assert_eq!(key, B256::repeat_byte(0x01));

        assert!(read_private_key("0x1234").is_err());
        assert!(read_private_key("not hex").is_err());
    }

    #[test]
    fn test_cli_parses_all_subcommands() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }
}
