//! An in-memory node for exercising the deployment workflow end to end.

use {
    crate::node::{Node, NodeError, Receipt},
    alloy::{
        consensus::{Transaction, TxEnvelope},
        eips::{eip1559::Eip1559Estimation, eip2718::Decodable2718},
        primitives::{Address, B256, Bytes, keccak256},
        rpc::types::TransactionRequest,
    },
    std::{collections::HashMap, sync::Mutex},
};

/// Behaves like a node with a single funded account: accepts transactions with
/// the expected nonce and includes them immediately.
pub struct TestNode {
    chain_id: u64,
    sender: Address,
    state: Mutex<State>,
}

#[derive(Default)]
struct State {
    count: u64,
    submitted: HashMap<B256, Submitted>,
    reject_next: Option<String>,
    revert_next: Option<String>,
    stalled: bool,
    receipt_requests: usize,
}

struct Submitted {
    nonce: u64,
    block: u64,
    revert_reason: Option<Option<String>>,
}

impl TestNode {
    pub fn new(chain_id: u64, sender: Address) -> Self {
        Self {
            chain_id,
            sender,
            state: Default::default(),
        }
    }

    /// The next submission fails with `message` as the node's reason.
    pub fn reject_next_submission(&self, message: &str) {
        self.state.lock().unwrap().reject_next = Some(message.to_string());
    }

    /// The next transaction is included but its execution reverts with
    /// `reason`.
    pub fn revert_next_transaction(&self, reason: Option<&str>) {
        self.state.lock().unwrap().revert_next = Some(reason.unwrap_or_default().to_string());
    }

    /// Transactions are accepted but never included.
    pub fn stall(&self) {
        self.state.lock().unwrap().stalled = true;
    }

    pub fn submissions(&self) -> usize {
        self.state.lock().unwrap().submitted.len()
    }

    pub fn receipt_requests(&self) -> usize {
        self.state.lock().unwrap().receipt_requests
    }
}

#[async_trait::async_trait]
impl Node for TestNode {
    async fn chain_id(&self) -> Result<u64, NodeError> {
        Ok(self.chain_id)
    }

    async fn transaction_count(&self, address: Address) -> Result<u64, NodeError> {
        let state = self.state.lock().unwrap();
        Ok(if address == self.sender { state.count } else { 0 })
    }

    async fn estimate_fees(&self) -> Result<Eip1559Estimation, NodeError> {
        Ok(Eip1559Estimation {
            max_fee_per_gas: 2_000_000_000,
            max_priority_fee_per_gas: 1_000_000_000,
        })
    }

    async fn estimate_gas(&self, _: TransactionRequest) -> Result<u64, NodeError> {
        Ok(1_000_000)
    }

    async fn send_raw_transaction(&self, raw: Bytes) -> Result<B256, NodeError> {
        let mut state = self.state.lock().unwrap();
        if let Some(message) = state.reject_next.take() {
            return Err(NodeError::Rejected(message));
        }
        let envelope = TxEnvelope::decode_2718(&mut &raw[..])
            .map_err(|err| NodeError::Rejected(format!("invalid transaction: {err}")))?;
        if envelope.chain_id() != Some(self.chain_id) {
            return Err(NodeError::Rejected("invalid chain id for signer".to_string()));
        }
        let nonce = envelope.nonce();
        if nonce < state.count {
            return Err(NodeError::Rejected(format!(
                "nonce too low: next nonce {}, tx nonce {nonce}",
                state.count
            )));
        }

        let hash = keccak256(&raw);
        let revert_reason = state
            .revert_next
            .take()
            .map(|reason| Some(reason).filter(|reason| !reason.is_empty()));
        state.count = nonce + 1;
        let block = state.submitted.len() as u64 + 1;
        state.submitted.insert(
            hash,
            Submitted {
                nonce,
                block,
                revert_reason,
            },
        );
        Ok(hash)
    }

    async fn transaction_receipt(&self, hash: B256) -> Result<Option<Receipt>, NodeError> {
        let mut state = self.state.lock().unwrap();
        state.receipt_requests += 1;
        if state.stalled {
            return Ok(None);
        }
        Ok(state.submitted.get(&hash).map(|submitted| {
            let status = submitted.revert_reason.is_none();
            Receipt {
                transaction_hash: hash,
                status,
                contract_address: status.then(|| self.sender.create(submitted.nonce)),
                block_number: Some(submitted.block),
            }
        }))
    }

    async fn revert_reason(
        &self,
        tx: TransactionRequest,
        block: u64,
    ) -> Result<Option<String>, NodeError> {
        // A replay happens on top of the parent of the inclusion block.
        let state = self.state.lock().unwrap();
        Ok(state
            .submitted
            .values()
            .find(|submitted| submitted.block == block + 1 && Some(submitted.nonce) == tx.nonce)
            .and_then(|submitted| submitted.revert_reason.clone().flatten()))
    }
}
