//! transfer-ledger command line client.
//!
//! Connects a wallet, sends value transfers that are also recorded on the
//! ledger contract, and prints the ledger history.
//!
//! ```text
//! transfer-ledger connect
//! transfer-ledger send --to 0x7099… --amount 0.01 --keyword coffee --message "thanks"
//! transfer-ledger history
//! ```

use clap::{Parser, Subcommand};
use serde_json::json;
use std::io::{BufRead, Write};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use alloy::primitives::Address;
use transfer_ledger::blockchain::provider::TransferRequest;
use transfer_ledger::blockchain::consent::{AutoApprove, ConsentPrompt, ContractCall};
use transfer_ledger::config::loader::{load_config, ConfigError};
use transfer_ledger::config::validation::validate_config;
use transfer_ledger::config::AppConfig;
use transfer_ledger::coordinator::{FormField, WalletTransactionCoordinator};
use transfer_ledger::ledger::types::format_amount;
use transfer_ledger::lifecycle::{build_coordinator, signals, Shutdown};
use transfer_ledger::observability::{logging, metrics};

#[derive(Parser)]
#[command(name = "transfer-ledger")]
#[command(about = "Send transfers and browse the on-chain transfer ledger", long_about = None)]
struct Cli {
    /// Path to the TOML configuration file.
    #[arg(short, long, default_value = "transfer-ledger.toml")]
    config: PathBuf,

    /// Override `blockchain.rpc_url`.
    #[arg(long)]
    rpc_url: Option<String>,

    /// Override `ledger.contract_address`.
    #[arg(long)]
    contract: Option<String>,

    /// Approve wallet prompts without asking.
    #[arg(short, long)]
    yes: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Authorize a wallet account
    Connect,
    /// Show session, cached count and history
    Status,
    /// Send a transfer and record it on the ledger
    Send {
        #[arg(long)]
        to: String,
        /// Amount in ether, e.g. 0.01
        #[arg(long)]
        amount: String,
        #[arg(long, default_value = "")]
        keyword: String,
        #[arg(long, default_value = "")]
        message: String,
    },
    /// Print every ledger record
    History,
    /// Refresh and cache the ledger record count
    Count,
    /// Follow wallet account and network changes until interrupted
    Watch,
}

/// Asks on the terminal before connecting or signing.
struct TerminalPrompt;

impl TerminalPrompt {
    fn confirm(question: &str) -> bool {
        eprint!("{} [y/N] ", question);
        let _ = std::io::stderr().flush();

        let mut answer = String::new();
        if std::io::stdin().lock().read_line(&mut answer).is_err() {
            return false;
        }
        matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes")
    }
}

impl ConsentPrompt for TerminalPrompt {
    fn approve_connection(&self, accounts: &[Address]) -> bool {
        let list: Vec<String> = accounts.iter().map(ToString::to_string).collect();
        Self::confirm(&format!("Connect account(s) {}?", list.join(", ")))
    }

    fn approve_transaction(&self, request: &TransferRequest) -> bool {
        Self::confirm(&format!(
            "Send {} ETH from {} to {}?",
            format_amount(request.value),
            request.from,
            request.to
        ))
    }

    fn approve_contract_call(&self, call: &ContractCall) -> bool {
        Self::confirm(&format!(
            "Call {} on {} from {}: {}?",
            call.function, call.contract, call.from, call.summary
        ))
    }
}

fn resolve_config(cli: &Cli) -> Result<AppConfig, ConfigError> {
    let mut config = if cli.config.exists() {
        load_config(&cli.config).or_else(|e| match e {
            // Overrides may fix what validation rejected.
            ConfigError::Validation(_) => {
                let content = std::fs::read_to_string(&cli.config).map_err(ConfigError::Io)?;
                toml::from_str(&content).map_err(ConfigError::Parse)
            }
            other => Err(other),
        })?
    } else {
        AppConfig::default()
    };

    if let Some(rpc_url) = &cli.rpc_url {
        config.blockchain.rpc_url = rpc_url.clone();
    }
    if let Some(contract) = &cli.contract {
        config.ledger.contract_address = contract.clone();
    }
    if cli.yes {
        config.wallet.auto_approve = true;
    }

    validate_config(&config).map_err(ConfigError::Validation)?;
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let config = resolve_config(&cli)?;

    logging::init_logging(&config.observability);
    tracing::info!(
        rpc_url = %config.blockchain.rpc_url,
        chain_id = config.blockchain.chain_id,
        contract = %config.ledger.contract_address,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let consent: Arc<dyn ConsentPrompt> = if config.wallet.auto_approve {
        Arc::new(AutoApprove)
    } else {
        Arc::new(TerminalPrompt)
    };
    let context = build_coordinator(&config, consent).await?;
    let coordinator = context.coordinator;

    match cli.command {
        Commands::Connect => {
            let account = coordinator.connect().await?;
            print_json(&json!({ "account": account }))?;
        }
        Commands::Status => {
            coordinator.load_on_startup().await;
            print_json(&coordinator.state())?;
        }
        Commands::Send {
            to,
            amount,
            keyword,
            message,
        } => {
            coordinator.load_on_startup().await;
            coordinator.update_form_field(FormField::AddressTo, to);
            coordinator.update_form_field(FormField::Amount, amount);
            coordinator.update_form_field(FormField::Keyword, keyword);
            coordinator.update_form_field(FormField::Message, message);

            let receipt = coordinator.submit_transfer().await?;
            print_json(&receipt)?;
        }
        Commands::History => {
            coordinator.refresh_transaction_history().await?;
            print_history(&coordinator)?;
        }
        Commands::Count => {
            let count = coordinator.refresh_transaction_count().await?;
            print_json(&json!({ "transactionCount": count }))?;
        }
        Commands::Watch => {
            coordinator.load_on_startup().await;
            print_json(&coordinator.state())?;

            let shutdown = Shutdown::new();
            let mut updates = coordinator.subscribe();
            let watcher = coordinator.watch_provider_events(shutdown.subscribe());
            if watcher.is_none() {
                tracing::warn!("Wallet provider emits no events");
            }
            let monitor = context.provider.spawn_monitor(
                Duration::from_millis(config.wallet.poll_interval_ms),
                shutdown.subscribe(),
            );

            let mut stop = shutdown.subscribe();
            tokio::spawn(async move { signals::shutdown_on_signal(&shutdown).await });

            loop {
                tokio::select! {
                    _ = stop.recv() => break,
                    changed = updates.changed() => {
                        if changed.is_err() {
                            break;
                        }
                        let snapshot = updates.borrow_and_update().clone();
                        print_json(&snapshot)?;
                    }
                }
            }

            let _ = monitor.await;
            if let Some(watcher) = watcher {
                let _ = watcher.await;
            }
        }
    }

    Ok(())
}

fn print_history(coordinator: &WalletTransactionCoordinator) -> Result<(), Box<dyn std::error::Error>> {
    let records: Vec<_> = coordinator
        .transactions()
        .iter()
        .map(|record| {
            json!({
                "addressFrom": record.address_from,
                "addressTo": record.address_to,
                "amountEther": record.amount_ether,
                "keyword": record.keyword,
                "message": record.message,
                "timestamp": record.timestamp_display(),
            })
        })
        .collect();
    print_json(&records)
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
