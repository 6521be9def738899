//! satchel — command-line front end for the Satchel HD wallet.
//!
//! Wallet state (extended public keys, issued addresses and known
//! unspents) lives in a JSON file. The seed is never written to disk; it
//! is supplied again whenever a transaction has to be signed.

mod config;
mod snapshot;

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use satchel_wallet::{AccountKeys, CreatedTransaction, Seed, TransactionRequest, Wallet, WalletConfig};
use tracing::info;

use crate::config::CliConfig;
use crate::snapshot::Snapshot;

/// Satchel BIP32 wallet.
#[derive(Parser)]
#[command(name = "satchel")]
#[command(version, about = "BIP32 wallet with gap-limit discovery and deterministic coin selection")]
struct Cli {
    /// Configuration file (TOML).
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Wallet state file, overriding the configured path.
    #[arg(short, long, global = true)]
    wallet: Option<PathBuf>,

    /// Network, overriding the configured one.
    #[arg(short, long, global = true)]
    network: Option<String>,

    /// Log level filter when RUST_LOG is unset.
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    /// Log output format: text or json.
    #[arg(long, global = true, default_value = "text")]
    log_format: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a new wallet from a fresh or supplied seed.
    Create(CreateArgs),
    /// Show a receive or change address.
    Address(AddressArgs),
    /// List every issued address.
    Addresses,
    /// Scan both chains for used addresses.
    Discover(SnapshotArgs),
    /// Replace known unspents with those found in a snapshot.
    Sync(SnapshotArgs),
    /// Show the wallet balance.
    Balance,
    /// Build and sign a payment.
    Send(SendArgs),
}

#[derive(Args)]
struct CreateArgs {
    /// Hex-encoded seed (16 to 64 bytes). A random seed is generated if omitted.
    #[arg(short, long)]
    seed: Option<String>,
}

#[derive(Args)]
struct AddressArgs {
    /// Issue a new address instead of showing the current one.
    #[arg(long)]
    next: bool,

    /// Use the change chain.
    #[arg(long)]
    change: bool,
}

#[derive(Args)]
struct SnapshotArgs {
    /// JSON file with `used` addresses and `unspents`.
    #[arg(short, long)]
    snapshot: PathBuf,
}

#[derive(Args)]
struct SendArgs {
    /// Recipient address.
    #[arg(short, long)]
    to: String,

    /// Amount in satoshis.
    #[arg(short, long)]
    amount: u64,

    /// Hex-encoded wallet seed, used for signing only.
    #[arg(short, long)]
    seed: String,

    /// Fee rate in satoshis per kilobyte.
    #[arg(long, conflicts_with = "fixed_fee")]
    fee_per_kb: Option<u64>,

    /// Absolute fee in satoshis.
    #[arg(long)]
    fixed_fee: Option<u64>,

    /// Pay change here instead of the wallet's change address.
    #[arg(long)]
    change_address: Option<String>,

    /// Transaction lock time.
    #[arg(long)]
    lock_time: Option<u32>,

    /// Minimum confirmations for spendable unspents.
    #[arg(long)]
    min_confirmations: Option<u32>,

    /// Sync unspents from this snapshot before selecting coins.
    #[arg(long)]
    snapshot: Option<PathBuf>,
}

/// Resolved configuration and wallet location for one invocation.
struct Session {
    config: WalletConfig,
    path: PathBuf,
}

impl Session {
    fn open(cli: &Cli) -> Result<Self> {
        let mut settings = CliConfig::load(cli.config.as_deref())?;
        if let Some(network) = &cli.network {
            settings.network = network.clone();
        }
        if let Some(path) = &cli.wallet {
            settings.wallet_path = Some(path.clone());
        }
        Ok(Self {
            config: settings.wallet_config()?,
            path: settings.wallet_path()?,
        })
    }

    fn load(&self) -> Result<Wallet> {
        Wallet::load_from_file(&self.path, self.config.clone())
            .with_context(|| format!("Failed to load wallet: {}", self.path.display()))
    }

    fn save(&self, wallet: &Wallet) -> Result<()> {
        wallet.save_to_file(&self.path).context("Failed to save wallet")
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(&cli.log_level, &cli.log_format);

    let session = Session::open(&cli)?;
    match cli.command {
        Commands::Create(args) => wallet_create(&session, args).await,
        Commands::Address(args) => wallet_address(&session, args).await,
        Commands::Addresses => wallet_addresses(&session).await,
        Commands::Discover(args) => wallet_discover(&session, args).await,
        Commands::Sync(args) => wallet_sync(&session, args).await,
        Commands::Balance => wallet_balance(&session).await,
        Commands::Send(args) => wallet_send(&session, args).await,
    }
}

/// Create a wallet file and show its first receive address.
async fn wallet_create(session: &Session, args: CreateArgs) -> Result<()> {
    if session.path.exists() {
        bail!("Wallet file already exists: {}", session.path.display());
    }

    let generated = args.seed.is_none();
    let seed = match args.seed {
        Some(hex) => Seed::from_hex(&hex).context("Invalid seed")?,
        None => Seed::generate(),
    };
    let (wallet, _keys) = Wallet::from_seed(&seed, session.config.clone())?;

    if let Some(parent) = session.path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
    }
    session.save(&wallet)?;
    info!(path = %session.path.display(), network = %wallet.network(), "wallet created");

    println!("\n=== WALLET CREATED ===");
    println!("Network: {}", wallet.network());
    println!("Receive address: {}", wallet.receive_address()?);
    if generated {
        println!("\nSEED (BACKUP THIS): {}", hex::encode(seed.as_bytes()));
        println!("WARNING: The seed is not stored and will NOT be shown again.");
    }
    println!("\nWallet saved to: {}", session.path.display());
    Ok(())
}

async fn wallet_address(session: &Session, args: AddressArgs) -> Result<()> {
    let mut wallet = session.load()?;
    let address = match (args.next, args.change) {
        (false, false) => wallet.receive_address()?,
        (false, true) => wallet.change_address()?,
        (true, false) => wallet.next_address()?,
        (true, true) => wallet.next_change_address()?,
    };
    if args.next {
        session.save(&wallet)?;
    }
    println!("{address}");
    Ok(())
}

async fn wallet_addresses(session: &Session) -> Result<()> {
    let wallet = session.load()?;
    for address in wallet.all_addresses() {
        let role = if wallet.is_change_address(&address) { "change" } else { "receive" };
        println!("{role:<8} {address}");
    }
    Ok(())
}

/// Gap-limit discovery against a snapshot.
async fn wallet_discover(session: &Session, args: SnapshotArgs) -> Result<()> {
    let snapshot = Snapshot::load(&args.snapshot)?;
    let mut wallet = session.load()?;
    let (external, internal) = wallet.discover(&snapshot).await.context("Discovery failed")?;
    session.save(&wallet)?;

    println!("Receive chain: {} used, {} issued", external.used, external.frontier);
    println!("Change chain:  {} used, {} issued", internal.used, internal.frontier);
    println!("Next receive address: {}", wallet.receive_address()?);
    Ok(())
}

async fn wallet_sync(session: &Session, args: SnapshotArgs) -> Result<()> {
    let snapshot = Snapshot::load(&args.snapshot)?;
    let mut wallet = session.load()?;
    let count = wallet.sync_unspents(&snapshot).await.context("Sync failed")?;
    session.save(&wallet)?;

    println!("{count} unspent outputs, balance {} sat", wallet.balance());
    Ok(())
}

async fn wallet_balance(session: &Session) -> Result<()> {
    let wallet = session.load()?;
    println!("Balance:   {} sat", wallet.balance());
    println!(
        "Spendable: {} sat ({}+ confirmations)",
        wallet.confirmed_balance(),
        wallet.config().min_confirmations
    );
    println!("Unspents:  {}", wallet.unspents().len());
    Ok(())
}

async fn wallet_send(session: &Session, args: SendArgs) -> Result<()> {
    let created = build_payment(session, args).await?;

    println!("\n=== TRANSACTION SIGNED ===");
    println!("TxID: {}", created.txid());
    println!("Inputs: {}", created.inputs.len());
    println!("Fee: {} sat", created.fee);
    if let Some(change_address) = &created.change_address {
        println!("Change: {} sat to {change_address}", created.change);
    }
    println!("\n{}", created.to_hex());
    Ok(())
}

/// Select, sign and verify a payment without broadcasting it.
async fn build_payment(session: &Session, args: SendArgs) -> Result<CreatedTransaction> {
    let mut wallet = session.load()?;
    if let Some(path) = &args.snapshot {
        let snapshot = Snapshot::load(path)?;
        wallet.sync_unspents(&snapshot).await.context("Sync failed")?;
        session.save(&wallet)?;
    }

    let seed = Seed::from_hex(&args.seed).context("Invalid seed")?;
    let keys = AccountKeys::from_seed(&seed, wallet.network())?;

    let mut request = TransactionRequest::pay(args.to, args.amount);
    if let Some(rate) = args.fee_per_kb {
        request = request.fee_per_kb(rate);
    }
    if let Some(fee) = args.fixed_fee {
        request = request.fixed_fee(fee);
    }
    if let Some(address) = args.change_address {
        request = request.change_address(address);
    }
    if let Some(lock_time) = args.lock_time {
        request = request.lock_time(lock_time);
    }
    if let Some(min) = args.min_confirmations {
        request = request.min_confirmations(min);
    }

    let created = wallet
        .create_transaction(&request, &keys)
        .context("Failed to create transaction")?;
    info!(txid = %created.txid(), fee = created.fee, change = created.change, "transaction signed");
    Ok(created)
}

/// Initialize tracing with the given level and output format.
///
/// `format = "json"` emits structured JSON lines; anything else is text.
fn init_logging(level_str: &str, format: &str) {
    use tracing_subscriber::filter::EnvFilter;
    use tracing_subscriber::fmt;
    use tracing_subscriber::prelude::*;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level_str));

    if format == "json" {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_target(true).with_level(true).with_writer(std::io::stderr))
            .init();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bitcoin::Network;
    use clap::CommandFactory;

    // BIP32 test vector 1 seed.
    const SEED_HEX: &str = "000102030405060708090a0b0c0d0e0f";

    fn session(dir: &tempfile::TempDir) -> Session {
        Session {
            config: WalletConfig::for_network(Network::Testnet),
            path: dir.path().join("wallet.json"),
        }
    }

    fn send_args(to: String, amount: u64) -> SendArgs {
        SendArgs {
            to,
            amount,
            seed: SEED_HEX.into(),
            fee_per_kb: None,
            fixed_fee: None,
            change_address: None,
            lock_time: None,
            min_confirmations: None,
            snapshot: None,
        }
    }

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parse_send_with_global_flags() {
        let cli = Cli::try_parse_from([
            "satchel", "send", "--to", "mzBc4XEFSdzCDcTxAgf6EZXgsZWpztRhef", "--amount", "1000",
            "--seed", SEED_HEX, "--network", "regtest", "--fixed-fee", "500",
        ])
        .unwrap();
        assert_eq!(cli.network.as_deref(), Some("regtest"));
        match cli.command {
            Commands::Send(args) => {
                assert_eq!(args.amount, 1000);
                assert_eq!(args.fixed_fee, Some(500));
                assert_eq!(args.fee_per_kb, None);
            }
            _ => panic!("expected send"),
        }
    }

    #[test]
    fn fee_flags_conflict() {
        let parsed = Cli::try_parse_from([
            "satchel", "send", "--to", "x", "--amount", "1", "--seed", SEED_HEX,
            "--fee-per-kb", "1000", "--fixed-fee", "500",
        ]);
        assert!(parsed.is_err());
    }

    #[tokio::test]
    async fn create_refuses_to_overwrite() {
        let dir = tempfile::tempdir().unwrap();
        let session = session(&dir);
        wallet_create(&session, CreateArgs { seed: Some(SEED_HEX.into()) }).await.unwrap();
        let again = wallet_create(&session, CreateArgs { seed: None }).await;
        assert!(again.is_err());
    }

    #[tokio::test]
    async fn next_address_is_persisted() {
        let dir = tempfile::tempdir().unwrap();
        let session = session(&dir);
        wallet_create(&session, CreateArgs { seed: Some(SEED_HEX.into()) }).await.unwrap();
        let first = session.load().unwrap().receive_address().unwrap();

        wallet_address(&session, AddressArgs { next: true, change: false }).await.unwrap();

        let wallet = session.load().unwrap();
        assert_ne!(wallet.receive_address().unwrap(), first);
        assert!(wallet.is_receive_address(&first));
    }

    #[tokio::test]
    async fn sync_then_send() {
        let dir = tempfile::tempdir().unwrap();
        let session = session(&dir);
        wallet_create(&session, CreateArgs { seed: Some(SEED_HEX.into()) }).await.unwrap();
        let funded = session.load().unwrap().receive_address().unwrap();

        let snapshot_path = dir.path().join("snapshot.json");
        let snapshot = serde_json::json!({
            "used": [],
            "unspents": [{
                "txId": "a0b1c2d3e4f5a6b7c8d9e0f1a2b3c4d5e6f7a8b9c0d1e2f3a4b5c6d7e8f9a0b1",
                "vout": 0,
                "address": &funded,
                "value": 100_000,
                "confirmations": 6
            }]
        });
        std::fs::write(&snapshot_path, snapshot.to_string()).unwrap();

        let mut args = send_args(funded.clone(), 40_000);
        args.snapshot = Some(snapshot_path);
        let created = build_payment(&session, args).await.unwrap();

        // 8 + 2 * 34 + 148 = 224 bytes, one started kilobyte at the default rate
        assert_eq!(created.fee, 10_000);
        assert_eq!(created.change, 50_000);
        assert_eq!(created.inputs.len(), 1);
        assert_eq!(created.transaction.output.len(), 2);
        assert_eq!(session.load().unwrap().balance(), 100_000);
    }

    #[tokio::test]
    async fn send_with_wrong_seed_fails() {
        let dir = tempfile::tempdir().unwrap();
        let session = session(&dir);
        wallet_create(&session, CreateArgs { seed: Some(SEED_HEX.into()) }).await.unwrap();
        let mut wallet = session.load().unwrap();
        let funded = wallet.receive_address().unwrap();
        wallet
            .set_unspent_outputs(vec![satchel_core::types::Unspent {
                tx_id: "11".repeat(32),
                vout: 0,
                address: funded.clone(),
                value: 100_000,
                confirmations: 6,
            }])
            .unwrap();
        session.save(&wallet).unwrap();

        let mut args = send_args(funded, 40_000);
        args.seed = "ff".repeat(32);
        assert!(build_payment(&session, args).await.is_err());
    }
}
