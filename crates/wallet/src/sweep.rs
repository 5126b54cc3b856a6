use crate::{fee::PopulateTransaction, Account, AccountError};
use alloy::providers::Provider;
use alloy_network::TransactionBuilder;
use alloy_primitives::{Address, TxHash, U256};
use alloy_rpc_types::TransactionRequest;
use futures::future::join_all;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Pending settlement of a single account's sweep.
pub type SweepHandle = JoinHandle<Result<SweepOutcome, AccountError>>;

/// Result of sweeping one account.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SweepOutcome {
    /// The residual balance was transferred.
    Swept {
        /// Swept account.
        from: Address,
        /// Amount that reached the destination.
        amount: U256,
        /// Hash of the transfer.
        tx_hash: TxHash,
    },
    /// Nothing was sent.
    Skipped {
        /// Skipped account.
        from: Address,
        /// Balance at the time of the sweep.
        balance: U256,
        /// Fee a transfer would have cost.
        fee: U256,
    },
}

/// Aggregated outcome of [`settle`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SettleReport {
    /// Accounts whose balance was transferred.
    pub swept: usize,
    /// Accounts with nothing left to transfer.
    pub skipped: usize,
    /// Sweeps that returned an error or whose task did not complete.
    pub failed: usize,
}

impl SettleReport {
    /// Whether every sweep settled without error.
    pub const fn is_clean(&self) -> bool {
        self.failed == 0
    }
}

/// Spawns one transfer per account moving its residual L2 balance to `destination`.
///
/// All transfers are started before this returns; await the handles with [`settle`]. Must be
/// called from within a tokio runtime.
pub fn sweep_back(accounts: &[Account], destination: Address) -> Vec<SweepHandle> {
    accounts
        .iter()
        .cloned()
        .map(|account| tokio::spawn(sweep_account(account, destination)))
        .collect()
}

async fn sweep_account(
    account: Account,
    destination: Address,
) -> Result<SweepOutcome, AccountError> {
    let from = account.address();
    let balance = account.balance().await?;
    if balance.is_zero() {
        return Ok(SweepOutcome::Skipped { from, balance, fee: U256::ZERO });
    }

    // fee is priced with a 1 wei probe so the estimate does not fail on insufficient funds
    let probe = TransactionRequest::default()
        .with_from(from)
        .with_to(destination)
        .with_value(U256::from(1));
    let gas_limit = account.l2().estimate_gas(&probe).await?;
    let gas_price = account.l2().get_gas_price().await?;

    let Some(amount) = sweep_amount(balance, gas_limit, gas_price) else {
        let fee = transfer_fee(gas_limit, gas_price);
        debug!(target: "testkit::sweep", %from, %balance, %fee, "balance does not cover the fee");
        return Ok(SweepOutcome::Skipped { from, balance, fee });
    };

    let tx = sweep_request(destination, amount, gas_limit, gas_price);
    let populated = account.populate(tx).await?;
    let receipt = account.sign_and_send(populated).await?;

    debug!(target: "testkit::sweep", %from, %destination, %amount, "swept account");
    Ok(SweepOutcome::Swept { from, amount, tx_hash: receipt.transaction_hash })
}

fn transfer_fee(gas_limit: u64, gas_price: u128) -> U256 {
    U256::from(gas_limit) * U256::from(gas_price)
}

/// Amount left to transfer once the fee of `gas_limit * gas_price` is paid, `None` when the
/// balance does not exceed the fee.
fn sweep_amount(balance: U256, gas_limit: u64, gas_price: u128) -> Option<U256> {
    let fee = transfer_fee(gas_limit, gas_price);
    (balance > fee).then(|| balance - fee)
}

/// Legacy transfer priced with exactly the gas limit and price the fee was computed from.
fn sweep_request(
    destination: Address,
    amount: U256,
    gas_limit: u64,
    gas_price: u128,
) -> TransactionRequest {
    TransactionRequest::default()
        .with_to(destination)
        .with_value(amount)
        .with_gas_limit(gas_limit)
        .with_gas_price(gas_price)
}

/// Waits for every handle. A failing or panicking sweep is logged and counted, and never
/// prevents the remaining ones from settling.
pub async fn settle(handles: Vec<SweepHandle>) -> SettleReport {
    let mut report = SettleReport::default();

    for result in join_all(handles).await {
        match result {
            Ok(Ok(SweepOutcome::Swept { .. })) => report.swept += 1,
            Ok(Ok(SweepOutcome::Skipped { .. })) => report.skipped += 1,
            Ok(Err(err)) => {
                warn!(target: "testkit::sweep", %err, "failed to sweep account");
                report.failed += 1;
            }
            Err(err) => {
                warn!(target: "testkit::sweep", %err, "sweep task did not complete");
                report.failed += 1;
            }
        }
    }

    report
}
