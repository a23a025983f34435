//! Fair Share CLI
//!
//! Reads a CSV ledger of participants, bills and items and prints the
//! settlement plan.
//!
//! # Usage
//!
//! ```bash
//! cargo run -- ledger.csv > plan.csv
//! cargo run -- ledger.csv --balances > balances.csv
//! ```
//!
//! # Environment Variables
//!
//! - `RUST_LOG`: Set to `debug` or `warn` to control logging verbosity

use fair_share::{Ledger, LedgerError, Result};
use std::env;
use std::fs::File;
use std::io::{self, BufReader};
use std::process;

fn main() {
    env_logger::init();

    if let Err(e) = run() {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

fn run() -> Result<()> {
    let args: Vec<String> = env::args().skip(1).collect();
    let balances_only = args.iter().any(|a| a == "--balances");
    let input_path = args
        .iter()
        .find(|a| !a.starts_with("--"))
        .ok_or(LedgerError::MissingArgument)?;

    let file = File::open(input_path)?;
    let reader = BufReader::new(file);

    let mut ledger = Ledger::new();
    ledger.process_csv(reader)?;

    let stdout = io::stdout();
    let handle = stdout.lock();
    if balances_only {
        ledger.write_balances(handle)?;
    } else {
        ledger.write_settlement(handle)?;
    }

    Ok(())
}
