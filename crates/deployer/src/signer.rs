//! Signing and submission of deployment transactions.
//!
//! Transactions are signed locally and handed to the node as raw bytes, the
//! node never sees the private key. Nonce acquisition, signing and submission
//! are serialized per [`Signer`] so that concurrent submissions from the same
//! key cannot end up with the same nonce.

use {
    crate::{
        error::DeployError,
        node::{self, Node, NodeError},
    },
    alloy::{
        eips::eip2718::Encodable2718,
        network::{EthereumWallet, TransactionBuilder},
        primitives::{Address, B256, Bytes},
        rpc::types::TransactionRequest,
        signers::local::PrivateKeySigner,
    },
    std::{
        fmt::{self, Display, Formatter},
        str::FromStr,
        sync::Arc,
        time::Duration,
    },
    tokio::sync::{Mutex, OnceCell},
    url::Url,
};

/// How the gas price of the deployment transaction is determined.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum GasPricePolicy {
    /// A legacy transaction with exactly this gas price in wei.
    Fixed(u128),
    /// An EIP-1559 transaction with the fees suggested by the node.
    #[default]
    Automatic,
}

impl FromStr for GasPricePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "auto" | "automatic" => Ok(Self::Automatic),
            value => value
                .replace('_', "")
                .parse()
                .map(Self::Fixed)
                .map_err(|err| format!("expected \"auto\" or a gas price in wei: {err}")),
        }
    }
}

impl Display for GasPricePolicy {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::Fixed(wei) => write!(f, "{wei} wei"),
            Self::Automatic => f.write_str("auto"),
        }
    }
}

/// What should be submitted: a contract creation carrying `data`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionIntent {
    pub data: Bytes,
    /// The chain the transaction is meant for. When not set, the chain id
    /// reported by the node is used.
    pub chain_id: Option<u64>,
}

/// A transaction that was accepted by the node but is not confirmed yet.
#[derive(Debug, Clone)]
pub struct PendingDeployment {
    pub tx_hash: B256,
    pub sender: Address,
    pub nonce: u64,
    /// The unsigned request the transaction was built from. Used to replay
    /// the creation when it reverted.
    pub request: TransactionRequest,
}

pub struct Signer {
    key: PrivateKeySigner,
    wallet: EthereumWallet,
    node: Arc<dyn Node>,
    gas_price: GasPricePolicy,
    gas_limit: Option<u64>,
    chain_id: OnceCell<u64>,
    /// The last nonce that was accepted by the node. Holding the lock
    /// serializes submissions.
    last_nonce: Mutex<Option<u64>>,
}

impl Signer {
    /// Creates a signer submitting through `node`. Fails if the key can not
    /// be decoded, without touching the network.
    pub fn new(
        private_key: &str,
        node: Arc<dyn Node>,
        gas_price: GasPricePolicy,
        gas_limit: Option<u64>,
    ) -> Result<Self, DeployError> {
        // Don't include the input in the error, it's a secret.
        let key = PrivateKeySigner::from_str(private_key.trim())
            .map_err(|_| DeployError::Signing("invalid private key".to_string()))?;
        Ok(Self {
            wallet: EthereumWallet::from(key.clone()),
            key,
            node,
            gas_price,
            gas_limit,
            chain_id: OnceCell::new(),
            last_nonce: Mutex::new(None),
        })
    }

    /// Creates a signer submitting to the JSON-RPC endpoint at `url`. The key
    /// is validated before a connection is established. Requests the node
    /// doesn't answer within `request_timeout` fail.
    pub fn connect(
        url: &Url,
        request_timeout: Duration,
        private_key: &str,
        gas_price: GasPricePolicy,
        gas_limit: Option<u64>,
    ) -> Result<Self, DeployError> {
        let node = Arc::new(node::provider(url, request_timeout).map_err(submission_error)?);
        Self::new(private_key, node, gas_price, gas_limit)
    }

    pub fn address(&self) -> Address {
        self.key.address()
    }

    pub fn node(&self) -> &dyn Node {
        self.node.as_ref()
    }

    /// Resolves the chain id the transaction is signed for. The node is asked
    /// once; a configured chain id has to agree with it.
    async fn chain_id(&self, configured: Option<u64>) -> Result<u64, DeployError> {
        let actual = *self
            .chain_id
            .get_or_try_init(|| async {
                self.node.chain_id().await.map_err(|err| match err {
                    NodeError::Transport(err) | NodeError::Rejected(err) => {
                        DeployError::Connection(err)
                    }
                })
            })
            .await?;
        match configured {
            Some(configured) if configured != actual => {
                Err(DeployError::ChainIdMismatch { configured, actual })
            }
            _ => Ok(actual),
        }
    }

    /// Picks the next nonce, prices, signs and submits the transaction.
    pub async fn sign_and_send(
        &self,
        intent: TransactionIntent,
    ) -> Result<PendingDeployment, DeployError> {
        let chain_id = self.chain_id(intent.chain_id).await?;
        let sender = self.address();

        let mut last_nonce = self.last_nonce.lock().await;
        // The node's count includes pending transactions. Never go below a
        // nonce this process already used in case the node hasn't seen it
        // yet.
        let pending_count = self
            .node
            .transaction_count(sender)
            .await
            .map_err(submission_error)?;
        let nonce = match *last_nonce {
            Some(last) => pending_count.max(last + 1),
            None => pending_count,
        };

        let tx = TransactionRequest::default()
            .with_from(sender)
            .with_deploy_code(intent.data)
            .with_nonce(nonce)
            .with_chain_id(chain_id);
        let tx = match self.gas_price {
            GasPricePolicy::Fixed(gas_price) => tx.with_gas_price(gas_price),
            GasPricePolicy::Automatic => {
                let fees = self
                    .node
                    .estimate_fees()
                    .await
                    .map_err(submission_error)?;
                tx.with_max_fee_per_gas(fees.max_fee_per_gas)
                    .with_max_priority_fee_per_gas(fees.max_priority_fee_per_gas)
            }
        };
        let gas_limit = match self.gas_limit {
            Some(gas_limit) => gas_limit,
            None => self
                .node
                .estimate_gas(tx.clone())
                .await
                .map_err(estimation_error)?,
        };
        let tx = tx.with_gas_limit(gas_limit);

        let signed = tx
            .clone()
            .build(&self.wallet)
            .await
            .map_err(|err| DeployError::Signing(err.to_string()))?;
        let tx_hash = self
            .node
            .send_raw_transaction(signed.encoded_2718().into())
            .await
            .map_err(submission_error)?;
        *last_nonce = Some(nonce);

        tracing::info!(
            ?tx_hash,
            %sender,
            nonce,
            gas_limit,
            gas_price = %self.gas_price,
            "submitted deployment transaction"
        );
        Ok(PendingDeployment {
            tx_hash,
            sender,
            nonce,
            request: tx,
        })
    }
}

/// Substrings of node error messages by which rejections are classified.
/// Different clients word the same condition differently.
const INSUFFICIENT_FUNDS: &[&str] = &["insufficient funds", "insufficient balance"];
const NONCE_TOO_LOW: &[&str] = &["nonce too low", "nonce is too low", "oldnonce"];
const UNDERPRICED: &[&str] = &[
    "underpriced",
    "fee too low",
    "gas price too low",
    "less than block base fee",
];

/// A creation that reverts while its gas is estimated would revert on chain
/// as well. Nothing has been submitted at that point.
fn estimation_error(err: NodeError) -> DeployError {
    match err {
        NodeError::Rejected(message) if message.to_lowercase().contains("revert") => {
            DeployError::DeploymentReverted {
                tx_hash: None,
                reason: Some(message),
            }
        }
        err => submission_error(err),
    }
}

/// Maps a failed node interaction during submission to the error taxonomy,
/// keeping the node's message verbatim.
pub fn submission_error(err: NodeError) -> DeployError {
    match err {
        NodeError::Transport(message) => DeployError::Connection(message),
        NodeError::Rejected(message) => {
            let lowercase = message.to_lowercase();
            let matches = |patterns: &[&str]| patterns.iter().any(|p| lowercase.contains(p));
            if matches(INSUFFICIENT_FUNDS) {
                DeployError::InsufficientFunds(message)
            } else if matches(NONCE_TOO_LOW) {
                DeployError::NonceTooLow(message)
            } else if matches(UNDERPRICED) {
                DeployError::Underpriced(message)
            } else {
                DeployError::Rejected(message)
            }
        }
    }
}
