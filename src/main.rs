//! Wallet Ledger CLI
//!
//! Command-line interface for creating wallets, applying balance deltas and
//! inspecting transaction history.
//!
//! # Usage
//!
//! ```bash
//! wallet-ledger --journal ledger.csv setup --name Alice --balance 10
//! wallet-ledger --journal ledger.csv transact <WALLET_ID> --amount -2.5 --description rent
//! wallet-ledger --journal ledger.csv wallet <WALLET_ID>
//! wallet-ledger --journal ledger.csv transactions <WALLET_ID> --skip 0 --limit 10
//! wallet-ledger --journal ledger.csv export <WALLET_ID> > history.csv
//! wallet-ledger --journal ledger.csv audit <WALLET_ID>
//! wallet-ledger apply --strategy async --batch-size 2000 operations.csv > wallets.csv
//! ```
//!
//! Results are written to stdout (JSON for single operations, CSV for
//! `export` and `apply`). Logs go to stderr.
//!
//! # Exit Codes
//!
//! - 0: Success
//! - 1: Error, printed as `Error [KIND]: message`

use wallet_ledger::{cli, telemetry};
use std::process;

fn main() {
    let args = cli::parse_args();
    telemetry::init(args.verbose);

    let mut output = std::io::stdout();
    if let Err(e) = cli::run(&args, &mut output) {
        eprintln!("Error [{}]: {}", e.kind(), e);
        process::exit(1);
    }
}
