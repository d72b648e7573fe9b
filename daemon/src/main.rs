//! tally daemon: runs the ledger node and exposes its operations as subcommands.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{anyhow, bail, Context};
use clap::Parser;
use serde_json::json;

use tally_crypto::{generate_keypair, open_secret, seal_secret, sign_payload, signing_key_from_bytes};
use tally_ledger::canonical_payload;
use tally_ledger::dto::{CommitRequest, TransferRequest};
use tally_ledger::format_timestamp;
use tally_node::{init_logging, LedgerNode, LevyScheduler, LogFormat, NodeConfig};
use tally_types::{Amount, Timestamp, WalletId};

#[derive(Parser)]
#[command(name = "tally", about = "tally UTXO ledger node")]
struct Cli {
    /// Data directory for ledger storage.
    #[arg(long, env = "TALLY_DATA_DIR")]
    data_dir: Option<PathBuf>,

    /// Log level: "trace", "debug", "info", "warn", "error".
    #[arg(long, env = "TALLY_LOG_LEVEL")]
    log_level: Option<String>,

    /// Log format: "human" or "json".
    #[arg(long, env = "TALLY_LOG_FORMAT")]
    log_format: Option<String>,

    /// Default block difficulty in leading zero hex digits.
    #[arg(long, env = "TALLY_DIFFICULTY")]
    difficulty: Option<u32>,

    /// Proof-of-work threads.
    #[arg(long, env = "TALLY_WORK_THREADS")]
    work_threads: Option<usize>,

    /// Abort a nonce search after this many seconds (0 = never).
    #[arg(long, env = "TALLY_MINING_TIMEOUT_SECS")]
    mining_timeout_secs: Option<u64>,

    /// Hex id of the wallet that receives levies.
    #[arg(long, env = "TALLY_LEVY_SYSTEM_WALLET")]
    levy_system_wallet: Option<String>,

    /// Path to a TOML configuration file. If provided, file settings
    /// are used as the base; CLI flags and env vars override them.
    #[arg(long, env = "TALLY_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(clap::Subcommand)]
enum Command {
    /// Run the node and the levy scheduler until SIGINT/SIGTERM.
    Run,
    /// Generate a P-256 key pair and register it as a wallet.
    WalletNew {
        #[arg(long)]
        owner: String,
        /// 32-byte AES key (hex) sealing the private key at rest.
        #[arg(long, env = "TALLY_MASTER_KEY", hide_env_values = true)]
        master_key: String,
    },
    /// Credit a wallet with a fresh unspent output.
    Fund {
        #[arg(long)]
        wallet: String,
        #[arg(long)]
        amount: u64,
    },
    /// Sign a transfer with the sender's sealed key and submit it.
    Transfer {
        #[arg(long)]
        from: String,
        #[arg(long)]
        to: String,
        #[arg(long)]
        amount: i64,
        #[arg(long)]
        nonce: String,
        #[arg(long)]
        fee: Option<i64>,
        #[arg(long, default_value = "")]
        note: String,
        #[arg(long, env = "TALLY_MASTER_KEY", hide_env_values = true)]
        master_key: String,
    },
    /// Seal pending transactions into a block.
    Commit {
        /// Oldest N pending transactions; 0 takes all.
        #[arg(long, default_value_t = 0)]
        max_tx: usize,
        #[arg(long)]
        difficulty: Option<u32>,
    },
    /// Validate the whole chain.
    Validate,
    /// List the wallets registered by an owner.
    Wallets {
        #[arg(long)]
        owner: String,
    },
    /// Show one wallet's registration record.
    Wallet {
        #[arg(long)]
        wallet: String,
    },
    /// Show a wallet's balance.
    Balance {
        #[arg(long)]
        wallet: String,
    },
    /// List recent blocks, newest first.
    Blocks {
        #[arg(long, default_value_t = 100)]
        limit: usize,
    },
    /// Run one levy pass and seal it.
    LevyOnce,
}

fn load_config(cli: &Cli) -> anyhow::Result<NodeConfig> {
    let mut config = match &cli.config {
        Some(path) => {
            let path = path.to_string_lossy();
            NodeConfig::from_toml_file(&path).with_context(|| format!("loading {path}"))?
        }
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
    if let Some(difficulty) = cli.difficulty {
        config.difficulty = difficulty;
    }
    if let Some(threads) = cli.work_threads {
        config.work_threads = threads;
    }
    if let Some(secs) = cli.mining_timeout_secs {
        config.mining_timeout_secs = secs;
    }
    if let Some(wallet) = &cli.levy_system_wallet {
        config.levy.system_wallet = Some(wallet.clone());
        config.levy.enabled = true;
    }
    config.validate()?;
    Ok(config)
}

fn master_key(hex_key: &str) -> anyhow::Result<Vec<u8>> {
    let key = hex::decode(hex_key.trim()).context("master key must be hex")?;
    if key.len() != 32 {
        bail!("master key must be 32 bytes, got {}", key.len());
    }
    Ok(key)
}

fn wallet_id(hex_id: &str) -> anyhow::Result<WalletId> {
    hex_id
        .parse::<WalletId>()
        .map_err(|e| anyhow!("invalid wallet id: {e}"))
}

fn print_json(value: &impl serde::Serialize) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = load_config(&cli)?;
    init_logging(config.log_format.parse::<LogFormat>()?, &config.log_level)?;

    let node = Arc::new(LedgerNode::open(config)?);

    match cli.command {
        Command::Run => run(node).await?,
        Command::WalletNew { owner, master_key: key } => {
            let key = master_key(&key)?;
            let keys = generate_keypair();
            let sealed = seal_secret(&key, &keys.private_key_bytes())?;
            let record = node
                .register_wallet(owner, keys.public_key.clone(), sealed)
                .await?;
            print_json(&json!({
                "wallet": record.id.to_hex(),
                "owner": record.owner,
                "public_key": keys.public_key_hex(),
            }))?;
        }
        Command::Fund { wallet, amount } => {
            let utxo = node
                .fund_wallet(wallet_id(&wallet)?, Amount::new(amount))
                .await?;
            print_json(&tally_ledger::dto::UtxoView::from(&utxo))?;
        }
        Command::Transfer {
            from,
            to,
            amount,
            nonce,
            fee,
            note,
            master_key: key,
        } => {
            let key = master_key(&key)?;
            let sender = node.wallet(wallet_id(&from)?).await?;
            let secret = open_secret(&key, &sender.encrypted_private_key)?;
            let signing_key = signing_key_from_bytes(&secret)?;
            let timestamp = format_timestamp(Timestamp::now())
                .ok_or_else(|| anyhow!("system clock out of range"))?;
            let to_id = wallet_id(&to)?;
            let payload =
                canonical_payload(&sender.id.to_hex(), &to_id.to_hex(), amount, &timestamp, &note);
            let signature = sign_payload(&signing_key, payload.as_bytes());
            let request = TransferRequest {
                from: sender.id.to_hex(),
                to: to_id.to_hex(),
                amount,
                fee,
                nonce,
                timestamp,
                note,
                signature_r: signature.r_hex(),
                signature_s: signature.s_hex(),
            };
            let response = node.submit_transfer(sender.owner, request).await?;
            print_json(&response)?;
        }
        Command::Commit { max_tx, difficulty } => {
            let block = node
                .commit_pending(CommitRequest { max_tx, difficulty })
                .await?;
            print_json(&block)?;
        }
        Command::Validate => {
            let report = node.validate_chain().await?;
            print_json(&report)?;
            if !report.valid {
                std::process::exit(2);
            }
        }
        Command::Wallets { owner } => {
            let wallets = node.query(move |e| e.owner_wallets(&owner)).await?;
            print_json(&json!({ "wallets": wallets }))?;
        }
        Command::Wallet { wallet } => {
            let id = wallet_id(&wallet)?;
            let detail = node.query(move |e| e.wallet_detail(&id)).await?;
            print_json(&detail)?;
        }
        Command::Balance { wallet } => {
            let id = wallet_id(&wallet)?;
            let balance = node.query(move |e| e.wallet_balance(&id)).await?;
            print_json(&balance)?;
        }
        Command::Blocks { limit } => {
            let blocks = node.query(move |e| e.list_blocks(limit)).await?;
            print_json(&blocks)?;
        }
        Command::LevyOnce => {
            let report = LevyScheduler::new(node.clone())?.tick().await?;
            let levied: Vec<_> = report
                .levies
                .iter()
                .map(|e| {
                    json!({
                        "wallet": e.wallet.to_hex(),
                        "balance": e.balance.raw(),
                        "levy": e.levy.raw(),
                        "tx_id": e.tx_id.to_hex(),
                    })
                })
                .collect();
            print_json(&json!({ "levies": levied, "block": report.block }))?;
        }
    }

    Ok(())
}

async fn run(node: Arc<LedgerNode>) -> anyhow::Result<()> {
    let config = node.config();
    tracing::info!(
        data_dir = %config.data_dir.display(),
        difficulty = config.difficulty,
        work_threads = config.work_threads,
        levy = config.levy.enabled,
        "starting tally node"
    );
    let scheduler = if config.levy.enabled {
        Some(LevyScheduler::new(node.clone())?.start())
    } else {
        tracing::info!("levy scheduler disabled");
        None
    };

    let shutdown = node.shutdown_controller();
    shutdown.wait_for_signal().await;

    if let Some(handle) = scheduler {
        handle.stop().await?;
    }
    node.stop();
    if config.enable_metrics {
        tracing::info!(metrics = %node.metrics().encode(), "final metrics");
    }
    tracing::info!("tally daemon exited cleanly");
    Ok(())
}
