//! # testkit
//!
//! Resolves what a rollup integration suite would see at startup: the suite name derived from
//! its path, the network it targets and its funded account. The test context is read from the
//! `ZKSYNC_JEST_TEST_CONTEXT` environment variable.

#![allow(missing_docs)]

use alloy::primitives::utils::format_ether;
use clap::{Parser, Subcommand};
use testkit_testing::TestMaster;
use tracing::debug;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "testkit", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Resolve the suite name and funded account for a suite file.
    Resolve {
        /// Path of the suite file, containing `ts-integration/tests/`.
        suite_path: String,
    },
    /// Print the rollup-layer balance of the suite's funded account.
    Balance {
        /// Path of the suite file, containing `ts-integration/tests/`.
        suite_path: String,
    },
}

#[tokio::main]
async fn main() -> eyre::Result<()> {
    // Enable backtraces unless a RUST_BACKTRACE value has already been explicitly provided.
    if std::env::var_os("RUST_BACKTRACE").is_none() {
        std::env::set_var("RUST_BACKTRACE", "1");
    }
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    debug!(target: "testkit::cli", ?cli, "parsed arguments");

    match cli.command {
        Command::Resolve { suite_path } => {
            let master = TestMaster::get_instance(&suite_path)?;
            println!("suite:        {}", master.suite_name());
            println!("network:      {}", master.environment().network);
            println!("localhost:    {}", master.is_local_host());
            println!("fast mode:    {}", master.is_fast_mode());
            println!("main account: {}", master.main_account().address());
        }
        Command::Balance { suite_path } => {
            let master = TestMaster::get_instance(&suite_path)?;
            let account = master.main_account();
            let balance = account.balance().await?;
            println!("{} {} ETH", account.address(), format_ether(balance));
        }
    }

    Ok(())
}
