//! The JSON-RPC capabilities the deployment needs from a node.
//!
//! The [`Node`] trait is the seam between the deployment workflow and the
//! transport. It is implemented for an `alloy` provider and mocked in tests.

use {
    alloy::{
        eips::{BlockId, eip1559::Eip1559Estimation},
        primitives::{Address, B256, Bytes},
        providers::{DynProvider, Provider, ProviderBuilder},
        rpc::{client::ClientBuilder, types::TransactionRequest},
        sol_types::decode_revert_reason,
        transports::{
            RpcError,
            TransportError,
            http::{Http, reqwest},
        },
    },
    std::time::Duration,
    url::Url,
};

/// The parts of a transaction receipt relevant for a deployment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Receipt {
    pub transaction_hash: B256,
    /// Whether the transaction executed successfully.
    pub status: bool,
    pub contract_address: Option<Address>,
    pub block_number: Option<u64>,
}

#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum NodeError {
    /// The node could not be reached or answered with something that isn't a
    /// JSON-RPC response.
    #[error("{0}")]
    Transport(String),
    /// The node answered with a JSON-RPC error. Contains the raw message.
    #[error("{0}")]
    Rejected(String),
}

impl From<TransportError> for NodeError {
    fn from(err: TransportError) -> Self {
        match err {
            RpcError::ErrorResp(payload) => Self::Rejected(payload.message.to_string()),
            err => Self::Transport(err.to_string()),
        }
    }
}

/// Abstracts the JSON-RPC endpoint used for submitting a deployment.
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait Node: Send + Sync {
    /// `eth_chainId`
    async fn chain_id(&self) -> Result<u64, NodeError>;

    /// Number of transactions sent from `address`, including the ones still
    /// pending in the node's mempool.
    async fn transaction_count(&self, address: Address) -> Result<u64, NodeError>;

    /// The node's suggestion for EIP-1559 fees.
    async fn estimate_fees(&self) -> Result<Eip1559Estimation, NodeError>;

    /// `eth_estimateGas`
    async fn estimate_gas(&self, tx: TransactionRequest) -> Result<u64, NodeError>;

    /// `eth_sendRawTransaction`, returns the hash of the submitted transaction.
    async fn send_raw_transaction(&self, raw: Bytes) -> Result<B256, NodeError>;

    /// `eth_getTransactionReceipt`, `None` while the transaction isn't
    /// included.
    async fn transaction_receipt(&self, hash: B256) -> Result<Option<Receipt>, NodeError>;

    /// Executes `tx` as a call on top of `block` and returns the revert
    /// reason if it reverts with one.
    async fn revert_reason(
        &self,
        tx: TransactionRequest,
        block: u64,
    ) -> Result<Option<String>, NodeError>;
}

/// Builds a provider without any fillers, transactions are fully prepared and
/// signed before they reach it.
///
/// Every request fails with [`NodeError::Transport`] when the node doesn't
/// answer within `timeout`.
pub fn provider(url: &Url, timeout: Duration) -> Result<DynProvider, NodeError> {
    let client = reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|err| NodeError::Transport(format!("failed to build http client: {err}")))?;
    let transport = Http::with_client(client, url.clone());
    let is_local = transport.guess_local();
    let rpc = ClientBuilder::default().transport(transport, is_local);
    Ok(ProviderBuilder::new()
        .disable_recommended_fillers()
        .connect_client(rpc)
        .erased())
}

#[async_trait::async_trait]
impl Node for DynProvider {
    async fn chain_id(&self) -> Result<u64, NodeError> {
        Ok(self.get_chain_id().await?)
    }

    async fn transaction_count(&self, address: Address) -> Result<u64, NodeError> {
        Ok(self.get_transaction_count(address).pending().await?)
    }

    async fn estimate_fees(&self) -> Result<Eip1559Estimation, NodeError> {
        Ok(self.estimate_eip1559_fees().await?)
    }

    async fn estimate_gas(&self, tx: TransactionRequest) -> Result<u64, NodeError> {
        Ok(Provider::estimate_gas(self, tx).await?)
    }

    async fn send_raw_transaction(&self, raw: Bytes) -> Result<B256, NodeError> {
        let pending = Provider::send_raw_transaction(self, &raw).await?;
        Ok(*pending.tx_hash())
    }

    async fn transaction_receipt(&self, hash: B256) -> Result<Option<Receipt>, NodeError> {
        let receipt = self.get_transaction_receipt(hash).await?;
        Ok(receipt.map(|receipt| Receipt {
            transaction_hash: receipt.transaction_hash,
            status: receipt.status(),
            contract_address: receipt.contract_address,
            block_number: receipt.block_number,
        }))
    }

    async fn revert_reason(
        &self,
        tx: TransactionRequest,
        block: u64,
    ) -> Result<Option<String>, NodeError> {
        match self.call(tx).block(BlockId::number(block)).await {
            Ok(_) => Ok(None),
            Err(RpcError::ErrorResp(payload)) => Ok(payload
                .as_revert_data()
                .and_then(|data| decode_revert_reason(&data))
                .or_else(|| Some(payload.message.to_string()))),
            Err(err) => Err(err.into()),
        }
    }
}
