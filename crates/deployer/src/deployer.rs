use {
    crate::{
        artifact::ContractArtifact,
        encoding,
        error::DeployError,
        node::Receipt,
        signer::{PendingDeployment, Signer, TransactionIntent},
    },
    alloy::primitives::{Address, B256},
    serde::Serialize,
    std::time::Duration,
};

/// How long and how often to wait for a submitted transaction to be included.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Confirmation {
    pub timeout: Duration,
    pub poll_interval: Duration,
}

impl Default for Confirmation {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(120),
            poll_interval: Duration::from_secs(1),
        }
    }
}

/// The outcome of a confirmed deployment. Serializes to the line printed by
/// the binary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeploymentResult {
    pub address: Address,
    pub transaction_hash: B256,
    #[serde(skip)]
    pub sender: Address,
    #[serde(skip)]
    pub nonce: u64,
    #[serde(skip)]
    pub block_number: Option<u64>,
}

pub struct Deployer {
    signer: Signer,
    chain_id: Option<u64>,
    confirmation: Confirmation,
}

impl Deployer {
    pub fn new(signer: Signer, chain_id: Option<u64>, confirmation: Confirmation) -> Self {
        Self {
            signer,
            chain_id,
            confirmation,
        }
    }

    /// Deploys `artifact` with the given constructor arguments and waits for
    /// the creation transaction to be included.
    ///
    /// A [`DeployError::ConfirmationTimeout`] only means that this process
    /// stopped waiting: the transaction was submitted and can still be
    /// included afterwards.
    pub async fn deploy(
        &self,
        artifact: &ContractArtifact,
        constructor_args: &[String],
    ) -> Result<DeploymentResult, DeployError> {
        let data = encoding::creation_payload(artifact, constructor_args)?;
        tracing::debug!(
            contract = %artifact.name,
            bytecode = artifact.bytecode.len(),
            payload = data.len(),
            "encoded creation payload"
        );

        let pending = self
            .signer
            .sign_and_send(TransactionIntent {
                data,
                chain_id: self.chain_id,
            })
            .await?;
        let receipt = self.wait_for_receipt(pending.tx_hash).await?;

        if !receipt.status {
            let reason = self.revert_reason(&pending, receipt.block_number).await;
            return Err(DeployError::DeploymentReverted {
                tx_hash: Some(pending.tx_hash),
                reason,
            });
        }

        // Every node we know of reports the address, derive it if one doesn't.
        let address = receipt
            .contract_address
            .unwrap_or_else(|| pending.sender.create(pending.nonce));
        tracing::info!(
            contract = %artifact.name,
            %address,
            tx_hash = ?pending.tx_hash,
            block = ?receipt.block_number,
            "contract deployed"
        );
        Ok(DeploymentResult {
            address,
            transaction_hash: pending.tx_hash,
            sender: pending.sender,
            nonce: pending.nonce,
            block_number: receipt.block_number,
        })
    }

    async fn wait_for_receipt(&self, tx_hash: B256) -> Result<Receipt, DeployError> {
        let node = self.signer.node();
        let poll = async {
            loop {
                match node.transaction_receipt(tx_hash).await {
                    Ok(Some(receipt)) => return receipt,
                    Ok(None) => tracing::trace!(?tx_hash, "transaction not included yet"),
                    Err(err) => tracing::warn!(?tx_hash, ?err, "failed to fetch receipt"),
                }
                tokio::time::sleep(self.confirmation.poll_interval).await;
            }
        };
        tokio::time::timeout(self.confirmation.timeout, poll)
            .await
            .map_err(|_| DeployError::ConfirmationTimeout {
                tx_hash,
                timeout: self.confirmation.timeout,
            })
    }

    /// Replays the creation on top of the inclusion block to recover the revert
    /// message. Best effort, failures are only logged.
    async fn revert_reason(
        &self,
        pending: &PendingDeployment,
        block: Option<u64>,
    ) -> Option<String> {
        let block = block?;
        // The state before the transaction is the parent block's.
        let replay_at = block.saturating_sub(1);
        match self
            .signer
            .node()
            .revert_reason(pending.request.clone(), replay_at)
            .await
        {
            Ok(reason) => reason,
            Err(err) => {
                tracing::debug!(
                    ?err,
                    tx_hash = ?pending.tx_hash,
                    "could not replay reverted deployment"
                );
                None
            }
        }
    }
}
