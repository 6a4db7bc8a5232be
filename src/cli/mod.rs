// CLI module
// Command-line interface, argument parsing and command dispatch

mod args;

pub use args::{ApplyArgs, CliArgs, Command, StrategyType};

use crate::core::{
    ApplyDeltaRequest, InMemoryLedgerStore, LedgerEngine, LedgerStore, Page, QueryService,
    SetupRequest,
};
use crate::io::{write_transactions_csv, JournalOptions, JournalStore};
use crate::strategy;
use crate::types::{LedgerError, RawAmount, WalletId};
use clap::Parser;
use serde::Serialize;
use std::io::Write;
use std::str::FromStr;
use std::sync::Arc;

/// Parse command-line arguments using clap
///
/// If parsing fails (invalid arguments, missing required arguments, or
/// --help), clap displays an error message or help text and exits the process.
pub fn parse_args() -> CliArgs {
    CliArgs::parse()
}

/// Execute the parsed command, writing its result to `output`
///
/// With `--journal` the command runs against a [`JournalStore`], which is
/// closed afterwards; otherwise against a fresh in-memory store.
///
/// # Errors
///
/// Returns the ledger error of the failed operation, or `Storage` if the
/// journal cannot be opened or closed.
pub fn run(args: &CliArgs, output: &mut dyn Write) -> Result<(), LedgerError> {
    let config = args.to_ledger_config();

    match &config.journal {
        Some(path) => {
            let store = Arc::new(JournalStore::open(path, JournalOptions::from(&config))?);
            let result = execute(&args.command, Arc::clone(&store), output);

            match Arc::try_unwrap(store) {
                Ok(store) => store.close()?,
                Err(_) => tracing::warn!("journal still in use, leaving it to be flushed on drop"),
            }
            result
        }
        None => {
            let store = Arc::new(InMemoryLedgerStore::new(config.lock_timeout));
            execute(&args.command, store, output)
        }
    }
}

fn execute<S: LedgerStore + 'static>(
    command: &Command,
    store: Arc<S>,
    output: &mut dyn Write,
) -> Result<(), LedgerError> {
    let engine = LedgerEngine::new(Arc::clone(&store));
    let query = QueryService::new(Arc::clone(&store));

    match command {
        Command::Setup { name, balance } => {
            let receipt = engine.setup(SetupRequest {
                name: name.clone(),
                balance: balance.clone().map(RawAmount::Text),
            })?;
            write_json(&receipt, output)
        }
        Command::Transact {
            wallet_id,
            amount,
            description,
        } => {
            let receipt = engine.apply_delta(ApplyDeltaRequest {
                wallet_id: WalletId::from_str(wallet_id)?,
                amount: RawAmount::Text(amount.clone()),
                description: description.clone(),
            })?;
            write_json(&receipt, output)
        }
        Command::Wallet { wallet_id } => {
            let wallet = query.get_wallet(WalletId::from_str(wallet_id)?)?;
            write_json(&wallet, output)
        }
        Command::Transactions {
            wallet_id,
            skip,
            limit,
        } => {
            let wallet_id = WalletId::from_str(wallet_id)?;
            let page = Page::new(*skip, *limit)?;
            let records = query.list_transactions(wallet_id, page)?;
            write_json(&records, output)
        }
        Command::Export { wallet_id } => {
            let records = query.history(WalletId::from_str(wallet_id)?)?;
            write_transactions_csv(&records, output)
        }
        Command::Audit { wallet_id } => {
            let report = query.audit(WalletId::from_str(wallet_id)?)?;
            write_json(&report, output)
        }
        Command::Apply(apply) => {
            let config = if matches!(apply.strategy, StrategyType::Async) {
                Some(apply.to_batch_config())
            } else {
                None
            };
            let strategy = strategy::create_strategy(apply.strategy, store, config);
            strategy.process(&apply.input_file, output)
        }
    }
}

fn write_json<T: Serialize>(value: &T, output: &mut dyn Write) -> Result<(), LedgerError> {
    serde_json::to_writer_pretty(&mut *output, value).map_err(|e| LedgerError::Io {
        message: format!("Failed to write JSON output: {}", e),
    })?;
    writeln!(output)?;
    Ok(())
}
