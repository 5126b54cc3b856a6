//! # Testkit wallet.
//!
//! Accounts used by rollup integration test suites.
//!
//! - [`Account`] binds a local private key to a base-layer (L1) and a rollup-layer (L2) client.
//! - [`BumpFee`] decorates any [`PopulateTransaction`] implementation and inflates the fee fields
//!   of the populated transaction on chains whose fee token is not the native asset.
//! - [`sweep_back`] and [`settle`] move the residual balance of ephemeral accounts back to a
//!   funded account once a suite is done.
//!
//! # Restrictions
//!
//! Signing and RPC transport are provided by `alloy`; this crate only decides *what* gets
//! populated and sent.

#![cfg_attr(not(test), warn(unused_crate_dependencies))]

use alloy::{
    providers::RootProvider,
    transports::{BoxTransport, TransportError},
};
use alloy_network::{Ethereum, TransactionBuilderError};
use alloy_primitives::TxHash;

mod account;
pub use account::Account;

/// Fee adjustment for chains with a non-native fee token.
pub mod fee;
pub use fee::{BaseTokenSource, BumpFee, PopulateTransaction};

/// Fund recovery from ephemeral accounts.
pub mod sweep;
pub use sweep::{settle, sweep_back, SettleReport, SweepHandle, SweepOutcome};

/// JSON-RPC client shared by all accounts of a test session.
pub type RpcProvider = RootProvider<BoxTransport>;

/// Errors returned by [`Account`] operations.
#[derive(Debug, thiserror::Error)]
pub enum AccountError {
    #[error("invalid private key: {0}")]
    InvalidKey(#[from] alloy_signer_local::LocalSignerError),
    #[error(transparent)]
    Rpc(#[from] TransportError),
    #[error("failed to build transaction: {0}")]
    Build(#[from] TransactionBuilderError<Ethereum>),
    #[error("transaction was not confirmed: {0}")]
    Confirmation(String),
    #[error("transaction {0} reverted")]
    Reverted(TxHash),
}
