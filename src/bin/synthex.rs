//! synthex CLI
//!
//! Operator interface for a locally persisted synthex deployment.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use console::style;

use synthex::cli::{parse_identity, CliConfig, OutputFormat, OutputFormatter, StateStore};
use synthex::oracle::gateway::MockOracleGateway;
use synthex::oracle::requests::{OracleResult, RequestId};
use synthex::oracle::unix_now;
use synthex::protocol::deployment::{Deployment, DeploymentBuilder};
use synthex::utils::crypto::{Address, Hash};

/// synthex - synthetic assets backed by stablecoin collateral
#[derive(Parser)]
#[command(name = "synthex")]
#[command(author = "synthex Team")]
#[command(version = synthex::VERSION)]
#[command(about = "Command-line interface for the synthex protocol", long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Path to the config file
    #[arg(short, long, env = "SYNTHEX_CONFIG")]
    config: Option<PathBuf>,

    /// Output format (text, json)
    #[arg(short, long, default_value = "text")]
    format: OutputFormat,

    /// Identity to act as (label or 0x address)
    #[arg(long = "as", default_value = "owner", global = true)]
    identity: String,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Deploy a fresh protocol instance owned by `--as`
    Init {
        /// Overwrite an existing deployment
        #[arg(long)]
        force: bool,
    },

    /// Credit test stablecoins to a user and approve the vault
    Fund {
        /// Recipient
        user: String,
        /// Amount in stablecoin units
        amount: u64,
    },

    /// Deposit collateral as `--as`
    Deposit {
        /// Amount in stablecoin units
        amount: u64,
    },

    /// Withdraw collateral as `--as`
    Withdraw {
        /// Amount in stablecoin units
        amount: u64,
    },

    /// Mint a synthetic asset
    Mint {
        /// Asset symbol
        symbol: String,
        /// Units to mint
        amount: u64,
        /// Recipient (defaults to `--as`)
        #[arg(long)]
        to: Option<String>,
    },

    /// Burn a synthetic asset
    Burn {
        /// Asset symbol
        symbol: String,
        /// Units to burn
        amount: u64,
        /// Holder (defaults to `--as`)
        #[arg(long)]
        from: Option<String>,
    },

    /// Register a new synthetic asset
    AddAsset {
        /// Asset symbol
        symbol: String,
        /// Display name
        #[arg(long)]
        name: Option<String>,
    },

    /// Price tracker operations
    #[command(subcommand)]
    Price(PriceCommands),

    /// Show protocol or user status
    Status {
        /// Show a single user's position
        #[arg(long)]
        user: Option<String>,
    },

    /// Run the canonical end-to-end scenario in memory
    Demo,

    /// Run the background upkeep poller against the stored deployment
    #[cfg(feature = "keeper")]
    Keeper {
        /// Seconds to run before saving and exiting
        #[arg(long, default_value = "60")]
        duration: u64,
        /// Stable-feed answer served by the local gateway
        #[arg(long, default_value = "1")]
        stable_answer: i128,
    },

    /// Configuration management
    #[command(subcommand)]
    Config(ConfigCommands),
}

#[derive(Subcommand)]
enum PriceCommands {
    /// Show cached prices and pending requests
    Show,
    /// Override an asset price (owner)
    Set {
        /// Asset symbol
        symbol: String,
        /// New price
        price: u64,
    },
    /// Override the stablecoin price (owner)
    SetUsdc {
        /// New price
        price: u64,
    },
    /// Refresh the stablecoin price from the local feed
    RefreshUsdc {
        /// Feed answer
        #[arg(long, default_value = "1")]
        answer: i128,
    },
    /// Issue an oracle request for an asset
    Request {
        /// Asset symbol
        symbol: String,
    },
    /// Deliver an oracle answer as the configured oracle
    Fulfill {
        /// Request id (hex)
        request_id: String,
        /// Price to deliver
        price: u64,
    },
    /// Run the automated refresh if due
    Upkeep {
        /// Stable-feed answer
        #[arg(long, default_value = "1")]
        answer: i128,
    },
    /// Pause the tracker
    Pause,
    /// Resume the tracker
    Unpause,
    /// Withdraw accumulated oracle fees (owner)
    WithdrawFees,
}

#[derive(Subcommand)]
enum ConfigCommands {
    /// Write the resolved configuration to disk
    Init {
        /// Destination (defaults to the standard location)
        #[arg(long)]
        path: Option<PathBuf>,
    },
    /// Print the resolved configuration
    Show,
}

// ═══════════════════════════════════════════════════════════════════════════════
// MAIN
// ═══════════════════════════════════════════════════════════════════════════════

fn main() {
    let cli = Cli::parse();

    let config = match CliConfig::resolve(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{} {}", style("Error:").red().bold(), e);
            std::process::exit(1);
        }
    };

    // Initialize logging
    let filter = if cli.verbose { "synthex=debug" } else { config.log_filter.as_str() };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_writer(std::io::stderr)
        .init();

    let out = OutputFormatter::new(cli.format);
    if let Err(e) = run_command(&cli, &config, &out) {
        out.error(&e.to_string());
        std::process::exit(1);
    }
}

fn run_command(cli: &Cli, config: &CliConfig, out: &OutputFormatter) -> anyhow::Result<()> {
    let store = StateStore::from_config(config);
    let caller = parse_identity(&cli.identity)?;

    match &cli.command {
        Commands::Init { force } => cmd_init(&store, config, caller, *force, out),
        Commands::Fund { user, amount } => {
            let user = parse_identity(user)?;
            with_deployment(&store, |d| {
                d.fund_collateral(&user, *amount)?;
                out.success(&format!("Credited {} USDC to {}", amount, user.short()));
                Ok(())
            })
        }
        Commands::Deposit { amount } => with_deployment(&store, |d| {
            let total = d.deposit(&caller, *amount)?;
            out.success(&format!("Deposited {}; position is now {}", amount, total));
            Ok(())
        }),
        Commands::Withdraw { amount } => with_deployment(&store, |d| {
            let remaining = d.withdraw(&caller, *amount)?;
            out.success(&format!("Withdrew {}; position is now {}", amount, remaining));
            Ok(())
        }),
        Commands::Mint { symbol, amount, to } => {
            let to = resolve_or(to.as_deref(), caller)?;
            with_deployment(&store, |d| {
                d.mint(symbol, *amount, &to)?;
                out.success(&format!("Minted {} {} to {}", amount, symbol, to.short()));
                Ok(())
            })
        }
        Commands::Burn { symbol, amount, from } => {
            let from = resolve_or(from.as_deref(), caller)?;
            with_deployment(&store, |d| {
                d.burn(symbol, *amount, &from)?;
                out.success(&format!("Burned {} {} from {}", amount, symbol, from.short()));
                Ok(())
            })
        }
        Commands::AddAsset { symbol, name } => with_deployment(&store, |d| {
            let name = name.clone().unwrap_or_else(|| format!("Synthetic {}", symbol));
            let ledger = d.add_synth_asset(&caller, symbol, &name)?;
            out.success(&format!("Registered {} at {}", symbol, ledger));
            Ok(())
        }),
        Commands::Price(cmd) => cmd_price(&store, caller, cmd, out),
        Commands::Status { user } => cmd_status(&store, user.as_deref(), out),
        Commands::Demo => cmd_demo(out),
        #[cfg(feature = "keeper")]
        Commands::Keeper { duration, stable_answer } => cmd_keeper(&store, config, *duration, *stable_answer, out),
        Commands::Config(cmd) => cmd_config(cli, config, cmd, out),
    }
}

/// Load the snapshot, apply `f`, and persist only if `f` succeeded
fn with_deployment<F>(store: &StateStore, f: F) -> anyhow::Result<()>
where
    F: FnOnce(&mut Deployment) -> anyhow::Result<()>,
{
    let mut deployment = store.load()?;
    f(&mut deployment)?;
    store.save(&deployment)?;
    Ok(())
}

fn resolve_or(identity: Option<&str>, fallback: Address) -> anyhow::Result<Address> {
    match identity {
        Some(s) => Ok(parse_identity(s)?),
        None => Ok(fallback),
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// COMMANDS
// ═══════════════════════════════════════════════════════════════════════════════

fn cmd_init(store: &StateStore, config: &CliConfig, owner: Address, force: bool, out: &OutputFormatter) -> anyhow::Result<()> {
    out.info(&format!("Deploying synthex at {}", store.path().display()));
    let deployment = store.init(config, owner, unix_now(), force)?;

    out.success("Deployment created");
    out.kv("Owner", deployment.owner());
    out.kv("Hub", deployment.addresses.hub);
    out.kv("Vault", deployment.addresses.vault);
    out.kv("Price tracker", deployment.addresses.tracker);
    for (symbol, ledger) in &deployment.addresses.ledgers {
        out.kv(&format!("Ledger {}", symbol), ledger);
    }
    Ok(())
}

fn cmd_price(store: &StateStore, caller: Address, cmd: &PriceCommands, out: &OutputFormatter) -> anyhow::Result<()> {
    match cmd {
        PriceCommands::Show => {
            let deployment = store.load()?;
            let tracker = deployment.tracker()?;
            out.header("Prices");
            out.kv("USDC", tracker.get_usdc_price());
            for symbol in tracker.get_asset_list() {
                out.kv(symbol, tracker.get_asset_price(symbol)?);
            }
            out.header("Pending requests");
            for request in tracker.pending_requests().iter_sorted() {
                out.kv(&request.symbol, request.request_id);
            }
            out.kv("Paused", tracker.is_paused());
            Ok(())
        }
        PriceCommands::Set { symbol, price } => with_deployment(store, |d| {
            d.tracker_mut()?.set_asset_price(&caller, symbol, *price)?;
            out.success(&format!("{} price set to {}", symbol, price));
            Ok(())
        }),
        PriceCommands::SetUsdc { price } => with_deployment(store, |d| {
            d.tracker_mut()?.set_usdc_price(&caller, *price)?;
            out.success(&format!("USDC price set to {}", price));
            Ok(())
        }),
        PriceCommands::RefreshUsdc { answer } => with_deployment(store, |d| {
            let gateway = MockOracleGateway::new(*answer);
            let price = d.tracker_mut()?.update_usdc_price(&caller, &gateway)?;
            out.success(&format!("USDC price refreshed to {}", price));
            Ok(())
        }),
        PriceCommands::Request { symbol } => with_deployment(store, |d| {
            let mut gateway = MockOracleGateway::new(1);
            let id = d.request_price(&caller, symbol, &mut gateway, unix_now())?;
            out.success(&format!("Requested {} price", symbol));
            out.kv("Request id", id);
            Ok(())
        }),
        PriceCommands::Fulfill { request_id, price } => with_deployment(store, |d| {
            let id = RequestId::from_hash(Hash::from_hex(request_id)?);
            let oracle = d.addresses.oracle;
            let applied = d.fulfill(&oracle, &id, &OracleResult::from_price(*price))?;
            out.success(&format!("Request {} fulfilled at {}", id, applied));
            Ok(())
        }),
        PriceCommands::Upkeep { answer } => with_deployment(store, |d| {
            let mut gateway = MockOracleGateway::new(*answer);
            let keeper = d.addresses.keepers_registry;
            match d.run_upkeep(&keeper, &mut gateway, unix_now())? {
                Some(ids) => out.success(&format!("Upkeep performed; {} requests issued", ids.len())),
                None => out.info("Upkeep not needed"),
            }
            Ok(())
        }),
        PriceCommands::Pause => with_deployment(store, |d| {
            d.tracker_mut()?.pause(&caller, unix_now())?;
            out.success("Price tracker paused");
            Ok(())
        }),
        PriceCommands::Unpause => with_deployment(store, |d| {
            d.tracker_mut()?.unpause(&caller)?;
            out.success("Price tracker resumed");
            Ok(())
        }),
        PriceCommands::WithdrawFees => with_deployment(store, |d| {
            let tracker = d.addresses.tracker;
            let amount = d.components.withdraw_fees(&tracker, &caller)?;
            out.success(&format!("Withdrew {} in oracle fees", amount));
            Ok(())
        }),
    }
}

fn cmd_status(store: &StateStore, user: Option<&str>, out: &OutputFormatter) -> anyhow::Result<()> {
    let deployment = store.load()?;

    if let Some(user) = user {
        let user = parse_identity(user)?;
        out.header(&format!("Account {}", user.short()));
        out.kv("Collateral", deployment.vault()?.get_user_collateral_amount(&user));
        out.kv("Collateral value", deployment.collateral_value(&user)?);
        out.kv("Total value minted", deployment.hub.get_user_total_value_minted(&user));
        for symbol in deployment.addresses.ledgers.keys() {
            let ledger = deployment.ledger(symbol)?;
            out.kv(
                &format!("{} balance / eligible", symbol),
                format!("{} / {}", ledger.balance_of(&user), ledger.get_amount_eligible_to_burn(&user)?),
            );
        }
        return Ok(());
    }

    let vault = deployment.vault()?;
    let tracker = deployment.tracker()?;
    out.header("synthex Protocol Status");
    out.kv("Version", synthex::VERSION);
    out.kv("Collateral ratio", deployment.hub.collateral_ratio());
    out.kv("Total collateral", vault.total_collateral());
    out.kv("Funders", vault.get_funders().len());
    out.kv("Tracker paused", tracker.is_paused());
    out.kv("Last upkeep", tracker.last_upkeep());
    out.kv("Pending requests", tracker.pending_requests().len());
    for symbol in deployment.addresses.ledgers.keys() {
        out.kv(&format!("{} supply", symbol), deployment.ledger(symbol)?.total_supply());
    }
    out.kv("Invariants hold", deployment.verify_invariants());
    out.kv("State hash", deployment.state_hash());
    Ok(())
}

fn cmd_demo(out: &OutputFormatter) -> anyhow::Result<()> {
    let owner = Address::from_label("owner");
    let alice = Address::from_label("alice");
    let mut d = DeploymentBuilder::new(owner).asset("TSLA", "Synthetic Tesla").build(unix_now())?;

    out.header("Canonical scenario");
    d.fund_collateral(&alice, 100)?;
    d.deposit(&alice, 100)?;
    out.success("alice deposited 100 USDC");

    d.tracker_mut()?.set_usdc_price(&owner, 1)?;
    d.tracker_mut()?.set_asset_price(&owner, "TSLA", 40)?;
    out.info("USDC = 1, TSLA = 40, collateral ratio = 2");

    match d.mint("TSLA", 10, &alice) {
        Ok(()) => out.error("minting 10 TSLA unexpectedly succeeded"),
        Err(e) => out.success(&format!("minting 10 TSLA rejected: {}", e)),
    }

    d.mint("TSLA", 1, &alice)?;
    out.success("minted 1 TSLA");
    out.kv("TSLA balance", d.ledger("TSLA")?.balance_of(&alice));
    out.kv("Total value minted", d.hub.get_user_total_value_minted(&alice));
    out.kv("Collateral value", d.collateral_value(&alice)?);
    Ok(())
}

#[cfg(feature = "keeper")]
fn cmd_keeper(
    store: &StateStore,
    config: &CliConfig,
    duration: u64,
    stable_answer: i128,
    out: &OutputFormatter,
) -> anyhow::Result<()> {
    use std::sync::Arc;
    use synthex::oracle::{KeeperConfig, UpkeepService};
    use tokio::sync::RwLock;

    let deployment = store.load()?;
    let keeper = KeeperConfig::new(deployment.addresses.keepers_registry).with_poll_interval(config.keeper_poll_secs);
    let deployment = Arc::new(RwLock::new(deployment));
    let gateway = Arc::new(RwLock::new(MockOracleGateway::new(stable_answer)));

    let runtime = tokio::runtime::Runtime::new()?;
    let stats = runtime.block_on(async {
        let service = UpkeepService::new(keeper, Arc::clone(&deployment), gateway);
        let handle = service.start();
        tokio::time::sleep(std::time::Duration::from_secs(duration)).await;
        service.stop().await;
        let _ = handle.await;
        service.statistics().await
    });

    store.save(&*deployment.blocking_read())?;
    out.success("Keeper stopped");
    out.data(&stats);
    Ok(())
}

fn cmd_config(cli: &Cli, config: &CliConfig, cmd: &ConfigCommands, out: &OutputFormatter) -> anyhow::Result<()> {
    match cmd {
        ConfigCommands::Init { path } => {
            let path = path
                .clone()
                .or_else(|| cli.config.clone())
                .unwrap_or_else(CliConfig::default_path);
            config.save(&path)?;
            out.success(&format!("Configuration written to {}", path.display()));
            Ok(())
        }
        ConfigCommands::Show => {
            out.data(config);
            Ok(())
        }
    }
}
