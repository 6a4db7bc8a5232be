use crate::config::LedgerConfig;
use crate::strategy::BatchConfig;
use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use std::time::Duration;

/// Track wallet balances and their transaction history
#[derive(Parser, Debug)]
#[command(name = "wallet-ledger")]
#[command(about = "Track wallet balances and their transaction history", long_about = None)]
pub struct CliArgs {
    /// Journal file for durable storage
    #[arg(
        long = "journal",
        value_name = "PATH",
        env = "WALLET_LEDGER_JOURNAL",
        global = true,
        help = "Journal file; without it the ledger lives in memory for this run only"
    )]
    pub journal: Option<PathBuf>,

    /// Upper bound on waiting for a busy wallet
    #[arg(
        long = "lock-timeout-ms",
        value_name = "MILLIS",
        env = "WALLET_LEDGER_LOCK_TIMEOUT_MS",
        default_value_t = 5000,
        global = true
    )]
    pub lock_timeout_ms: u64,

    /// Fsync the journal after every write
    #[arg(long = "sync-writes", global = true)]
    pub sync_writes: bool,

    /// Log at debug level
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

/// Ledger operations
#[derive(Subcommand, Debug, PartialEq)]
pub enum Command {
    /// Create a wallet with an optional opening balance
    Setup {
        #[arg(long)]
        name: String,

        #[arg(long, allow_negative_numbers = true)]
        balance: Option<String>,
    },

    /// Apply a signed amount to a wallet
    Transact {
        #[arg(value_name = "WALLET_ID")]
        wallet_id: String,

        #[arg(long, allow_negative_numbers = true)]
        amount: String,

        #[arg(long)]
        description: Option<String>,
    },

    /// Show a wallet
    Wallet {
        #[arg(value_name = "WALLET_ID")]
        wallet_id: String,
    },

    /// List a wallet's transactions, newest first
    Transactions {
        #[arg(value_name = "WALLET_ID")]
        wallet_id: String,

        #[arg(long, default_value_t = 0, allow_negative_numbers = true)]
        skip: i64,

        #[arg(long, default_value_t = 10, allow_negative_numbers = true)]
        limit: i64,
    },

    /// Export a wallet's history as CSV, oldest first
    Export {
        #[arg(value_name = "WALLET_ID")]
        wallet_id: String,
    },

    /// Replay a wallet's history and check it against its balances
    Audit {
        #[arg(value_name = "WALLET_ID")]
        wallet_id: String,
    },

    /// Apply an operations CSV file and print wallet summaries
    Apply(ApplyArgs),
}

/// Arguments of the `apply` command
#[derive(Args, Debug, PartialEq)]
pub struct ApplyArgs {
    /// Input CSV file path containing operation rows
    #[arg(value_name = "INPUT", help = "Path to the operations CSV file")]
    pub input_file: PathBuf,

    /// Processing strategy
    #[arg(
        long = "strategy",
        value_name = "STRATEGY",
        default_value = "async",
        help = "Processing strategy: 'sync' for sequential or 'async' for concurrent batches"
    )]
    pub strategy: StrategyType,

    /// Number of operations per batch (async mode only)
    #[arg(
        long = "batch-size",
        value_name = "SIZE",
        help = "Number of operations per batch (default: 1000)"
    )]
    pub batch_size: Option<usize>,

    /// Maximum number of wallets processed concurrently (async mode only)
    #[arg(
        long = "max-concurrent",
        value_name = "COUNT",
        help = "Maximum number of wallets processed concurrently (default: CPU cores)"
    )]
    pub max_concurrent: Option<usize>,
}

/// Available processing strategies for operation files
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum StrategyType {
    Sync,
    Async,
}

impl CliArgs {
    /// Store and engine settings from the global arguments
    pub fn to_ledger_config(&self) -> LedgerConfig {
        LedgerConfig::new(
            Duration::from_millis(self.lock_timeout_ms),
            self.journal.clone(),
            self.sync_writes,
        )
    }
}

impl ApplyArgs {
    /// Create a BatchConfig from CLI arguments
    ///
    /// Missing values take the defaults; zero values fall back to the
    /// defaults with a warning.
    pub fn to_batch_config(&self) -> BatchConfig {
        if self.batch_size.is_some() || self.max_concurrent.is_some() {
            let default = BatchConfig::default();
            BatchConfig::new(
                self.batch_size.unwrap_or(default.batch_size),
                self.max_concurrent.unwrap_or(default.max_concurrent),
            )
        } else {
            BatchConfig::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    const WALLET: &str = "01890a5d-ac96-774b-bcce-b302099a8057";

    fn apply_args(args: &[&str]) -> ApplyArgs {
        match CliArgs::try_parse_from(args).unwrap().command {
            Command::Apply(apply) => apply,
            other => panic!("expected apply, got {:?}", other),
        }
    }

    #[rstest]
    #[case::setup(
        &["program", "setup", "--name", "Alice", "--balance", "10"],
        Command::Setup { name: "Alice".into(), balance: Some("10".into()) }
    )]
    #[case::setup_without_balance(
        &["program", "setup", "--name", "Alice"],
        Command::Setup { name: "Alice".into(), balance: None }
    )]
    #[case::transact_debit(
        &["program", "transact", WALLET, "--amount", "-15.5", "--description", "rent"],
        Command::Transact { wallet_id: WALLET.into(), amount: "-15.5".into(), description: Some("rent".into()) }
    )]
    #[case::wallet(&["program", "wallet", WALLET], Command::Wallet { wallet_id: WALLET.into() })]
    #[case::transactions_defaults(
        &["program", "transactions", WALLET],
        Command::Transactions { wallet_id: WALLET.into(), skip: 0, limit: 10 }
    )]
    #[case::transactions_paged(
        &["program", "transactions", WALLET, "--skip", "-1", "--limit", "3"],
        Command::Transactions { wallet_id: WALLET.into(), skip: -1, limit: 3 }
    )]
    #[case::export(&["program", "export", WALLET], Command::Export { wallet_id: WALLET.into() })]
    #[case::audit(&["program", "audit", WALLET], Command::Audit { wallet_id: WALLET.into() })]
    fn test_command_parsing(#[case] args: &[&str], #[case] expected: Command) {
        let parsed = CliArgs::try_parse_from(args).unwrap();
        assert_eq!(parsed.command, expected);
    }

    #[rstest]
    #[case::default_strategy(&["program", "apply", "input.csv"], StrategyType::Async)]
    #[case::explicit_sync(&["program", "apply", "--strategy", "sync", "input.csv"], StrategyType::Sync)]
    #[case::explicit_async(&["program", "apply", "--strategy", "async", "input.csv"], StrategyType::Async)]
    fn test_strategy_parsing(#[case] args: &[&str], #[case] expected: StrategyType) {
        assert_eq!(apply_args(args).strategy, expected);
    }

    #[rstest]
    #[case::all_defaults(&["program", "apply", "input.csv"], 1000, num_cpus::get())]
    #[case::custom_batch_size(&["program", "apply", "--batch-size", "2000", "input.csv"], 2000, num_cpus::get())]
    #[case::custom_max_concurrent(&["program", "apply", "--max-concurrent", "8", "input.csv"], 1000, 8)]
    #[case::zero_batch_size(&["program", "apply", "--batch-size", "0", "input.csv"], 1000, num_cpus::get())]
    #[case::zero_max_concurrent(&["program", "apply", "--max-concurrent", "0", "input.csv"], 1000, num_cpus::get())]
    fn test_batch_config_conversion(
        #[case] args: &[&str],
        #[case] expected_batch_size: usize,
        #[case] expected_max_concurrent: usize,
    ) {
        let config = apply_args(args).to_batch_config();
        assert_eq!(config.batch_size, expected_batch_size);
        assert_eq!(config.max_concurrent, expected_max_concurrent);
    }

    #[rstest]
    #[case::defaults(&["program", "wallet", WALLET], None, 5000, false)]
    #[case::global_after_command(
        &["program", "wallet", WALLET, "--journal", "ledger.csv", "--lock-timeout-ms", "250", "--sync-writes"],
        Some("ledger.csv"),
        250,
        true
    )]
    #[case::zero_timeout_uses_default(&["program", "--lock-timeout-ms", "0", "wallet", WALLET], None, 5000, false)]
    fn test_ledger_config(
        #[case] args: &[&str],
        #[case] journal: Option<&str>,
        #[case] timeout_ms: u64,
        #[case] sync_writes: bool,
    ) {
        let config = CliArgs::try_parse_from(args).unwrap().to_ledger_config();
        assert_eq!(config.journal, journal.map(PathBuf::from));
        assert_eq!(config.lock_timeout, Duration::from_millis(timeout_ms));
        assert_eq!(config.sync_writes, sync_writes);
    }

    #[rstest]
    #[case::missing_command(&["program"])]
    #[case::setup_without_name(&["program", "setup"])]
    #[case::transact_without_amount(&["program", "transact", WALLET])]
    #[case::apply_without_input(&["program", "apply"])]
    #[case::invalid_strategy(&["program", "apply", "--strategy", "invalid", "input.csv"])]
    #[case::non_numeric_limit(&["program", "transactions", WALLET, "--limit", "ten"])]
    fn test_parsing_errors(#[case] args: &[&str]) {
        assert!(CliArgs::try_parse_from(args).is_err());
    }
}
