use crate::{Account, AccountError};
use alloy_primitives::{address, Address, U256};
use alloy_rpc_types::{TransactionReceipt, TransactionRequest};
use std::future::Future;
use tracing::debug;

/// Address standing for the native asset in the rollup's system contracts.
pub const ETH_ADDRESS_IN_CONTRACTS: Address = address!("0000000000000000000000000000000000000001");

/// Percentage added to the estimated fee when gas is paid in a non-native token, to absorb
/// token price movements between estimation and inclusion.
pub const FEE_ADJUSTMENT_PERCENT: u64 = 30;

/// Turns a transaction request into its fully populated form.
pub trait PopulateTransaction: Send + Sync {
    /// Populates the request.
    fn populate(
        &self,
        tx: TransactionRequest,
    ) -> impl Future<Output = Result<TransactionRequest, AccountError>> + Send;
}

/// Resolves the token the chain charges gas in.
pub trait BaseTokenSource: Send + Sync {
    /// L1 address of the fee token. [`ETH_ADDRESS_IN_CONTRACTS`] when fees are paid in ETH.
    fn base_token(&self) -> impl Future<Output = Result<Address, AccountError>> + Send;
}

/// Decorates a [`PopulateTransaction`] implementation, raising `max_fee_per_gas` and
/// `gas_price` by [`FEE_ADJUSTMENT_PERCENT`] unless the chain pays fees in ETH.
#[derive(Clone, Debug)]
pub struct BumpFee<P> {
    inner: P,
}

impl<P> BumpFee<P> {
    /// Wraps `inner`.
    pub const fn new(inner: P) -> Self {
        Self { inner }
    }

    /// The decorated value.
    pub const fn inner(&self) -> &P {
        &self.inner
    }

    /// Unwraps the decorated value.
    pub fn into_inner(self) -> P {
        self.inner
    }
}

impl<P> PopulateTransaction for BumpFee<P>
where
    P: PopulateTransaction + BaseTokenSource,
{
    async fn populate(&self, tx: TransactionRequest) -> Result<TransactionRequest, AccountError> {
        let base_token = self.inner.base_token().await?;
        let mut populated = self.inner.populate(tx).await?;

        if base_token == ETH_ADDRESS_IN_CONTRACTS {
            return Ok(populated);
        }

        bump_fee_fields(&mut populated, FEE_ADJUSTMENT_PERCENT);
        debug!(
            target: "testkit::fee",
            %base_token,
            max_fee_per_gas = ?populated.max_fee_per_gas,
            gas_price = ?populated.gas_price,
            "bumped fee for non-ETH base token"
        );
        Ok(populated)
    }
}

impl BumpFee<Account> {
    /// Populates with the adjusted fee, then signs and submits with the wrapped account.
    pub async fn send_transaction(
        &self,
        tx: TransactionRequest,
    ) -> Result<TransactionReceipt, AccountError> {
        let populated = self.populate(tx).await?;
        self.inner.sign_and_send(populated).await
    }
}

/// Raises every fee field present on `tx` by `adjustment_percent`.
pub fn bump_fee_fields(tx: &mut TransactionRequest, adjustment_percent: u64) {
    if let Some(max_fee_per_gas) = tx.max_fee_per_gas {
        tx.max_fee_per_gas = Some(bump_fee_value(max_fee_per_gas, adjustment_percent));
    }
    if let Some(gas_price) = tx.gas_price {
        tx.gas_price = Some(bump_fee_value(gas_price, adjustment_percent));
    }
}

/// `floor(value * (100 + adjustment_percent) / 100)`, saturating at `u128::MAX`.
///
/// The product is computed on 256 bits so it cannot overflow before the division.
pub fn bump_fee_value(value: u128, adjustment_percent: u64) -> u128 {
    let hundred = U256::from(100u64);
    let bumped = U256::from(value) * (hundred + U256::from(adjustment_percent)) / hundred;
    u128::try_from(bumped).unwrap_or(u128::MAX)
}
