use crate::{
    fee::{BaseTokenSource, BumpFee, PopulateTransaction},
    AccountError, RpcProvider,
};
use alloy::providers::Provider;
use alloy_network::{EthereumWallet, TransactionBuilder};
use alloy_primitives::{Address, B256, U256};
use alloy_rpc_types::{TransactionReceipt, TransactionRequest};
use alloy_signer_local::PrivateKeySigner;
use tracing::trace;

/// JSON-RPC method returning the L1 address of the token gas is paid in.
const BASE_TOKEN_METHOD: &str = "zks_getBaseTokenL1Address";

/// A private key bound to the L2 and L1 clients of a test session.
///
/// Cloning is cheap: both clients are reference counted and shared with every other account
/// created from the same session.
#[derive(Clone, Debug)]
pub struct Account {
    signer: PrivateKeySigner,
    l2: RpcProvider,
    l1: RpcProvider,
}

impl Account {
    /// Creates an account from an existing signer.
    pub fn new(signer: PrivateKeySigner, l2: RpcProvider, l1: RpcProvider) -> Self {
        Self { signer, l2, l1 }
    }

    /// Creates an account from a hex encoded private key, with or without the `0x` prefix.
    pub fn from_hex(key: &str, l2: RpcProvider, l1: RpcProvider) -> Result<Self, AccountError> {
        let signer = key.trim().parse::<PrivateKeySigner>()?;
        Ok(Self::new(signer, l2, l1))
    }

    /// Creates an account with a freshly generated key pair.
    pub fn random(l2: RpcProvider, l1: RpcProvider) -> Self {
        Self::new(PrivateKeySigner::random(), l2, l1)
    }

    /// Address of the account.
    pub fn address(&self) -> Address {
        self.signer.address()
    }

    /// Raw private key of the account.
    pub fn private_key(&self) -> B256 {
        B256::from_slice(&self.signer.credential().to_bytes())
    }

    /// Rollup-layer client.
    pub const fn l2(&self) -> &RpcProvider {
        &self.l2
    }

    /// Base-layer client.
    pub const fn l1(&self) -> &RpcProvider {
        &self.l1
    }

    /// Wraps the account so that populated fees are adjusted for the chain's fee token.
    pub fn bump_fee(self) -> BumpFee<Self> {
        BumpFee::new(self)
    }

    /// L2 balance of the account.
    pub async fn balance(&self) -> Result<U256, AccountError> {
        Ok(self.l2.get_balance(self.address()).await?)
    }

    /// Populates, signs and submits the transaction, then waits for its receipt.
    pub async fn send_transaction(
        &self,
        tx: TransactionRequest,
    ) -> Result<TransactionReceipt, AccountError> {
        let populated = self.populate(tx).await?;
        self.sign_and_send(populated).await
    }

    /// Sends `value` wei to `to`.
    pub async fn transfer(
        &self,
        to: Address,
        value: U256,
    ) -> Result<TransactionReceipt, AccountError> {
        self.send_transaction(TransactionRequest::default().with_to(to).with_value(value)).await
    }

    /// Signs an already populated transaction and submits it to L2.
    pub(crate) async fn sign_and_send(
        &self,
        tx: TransactionRequest,
    ) -> Result<TransactionReceipt, AccountError> {
        let wallet = EthereumWallet::from(self.signer.clone());
        let envelope = tx.build(&wallet).await?;

        let receipt = self
            .l2
            .send_tx_envelope(envelope)
            .await?
            .get_receipt()
            .await
            .map_err(|err| AccountError::Confirmation(err.to_string()))?;
        trace!(
            target: "testkit::account",
            from = %self.address(),
            tx = %receipt.transaction_hash,
            "transaction included"
        );

        if !receipt.status() {
            return Err(AccountError::Reverted(receipt.transaction_hash));
        }
        Ok(receipt)
    }
}

impl PopulateTransaction for Account {
    /// Fills `from`, nonce, chain id, gas limit and fees, leaving fields that are already set
    /// untouched.
    async fn populate(
        &self,
        mut tx: TransactionRequest,
    ) -> Result<TransactionRequest, AccountError> {
        let address = self.address();
        tx.from = Some(address);

        if tx.nonce.is_none() {
            tx.nonce = Some(self.l2.get_transaction_count(address).pending().await?);
        }
        if tx.chain_id.is_none() {
            tx.chain_id = Some(self.l2.get_chain_id().await?);
        }
        if tx.gas.is_none() {
            tx.gas = Some(self.l2.estimate_gas(&tx).await?);
        }
        // legacy pricing is kept when the caller asked for it
        if tx.gas_price.is_none() && tx.max_fee_per_gas.is_none() {
            let estimate = self.l2.estimate_eip1559_fees(None).await?;
            tx.max_fee_per_gas = Some(estimate.max_fee_per_gas);
            tx.max_priority_fee_per_gas = Some(estimate.max_priority_fee_per_gas);
        }

        trace!(target: "testkit::account", ?tx, "populated transaction");
        Ok(tx)
    }
}

impl BaseTokenSource for Account {
    async fn base_token(&self) -> Result<Address, AccountError> {
        Ok(self.l2.raw_request::<_, Address>(BASE_TOKEN_METHOD.into(), ()).await?)
    }
}

impl From<Account> for EthereumWallet {
    fn from(val: Account) -> Self {
        val.signer.into()
    }
}
