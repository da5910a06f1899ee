use {
    crate::{artifact::ArtifactError, encoding::EncodingError},
    alloy::primitives::B256,
    std::time::Duration,
};

/// Every way a single deployment attempt can fail. None of them are retried;
/// the caller has to issue a fresh deployment.
#[derive(Debug, thiserror::Error)]
pub enum DeployError {
    #[error("artifact not found: {0}")]
    ArtifactNotFound(String),
    #[error("artifact malformed: {0}")]
    ArtifactMalformed(String),
    #[error("artifact ambiguous: {0}")]
    ArtifactAmbiguous(String),
    #[error("artifact unreadable: {0}")]
    ArtifactUnreadable(String),
    #[error("could not encode constructor arguments: {0}")]
    ArgumentEncoding(#[from] EncodingError),
    #[error("connection to node failed: {0}")]
    Connection(String),
    #[error("signing failed: {0}")]
    Signing(String),
    #[error("node reports chain id {actual} but {configured} was configured")]
    ChainIdMismatch { configured: u64, actual: u64 },
    #[error("insufficient funds: {0}")]
    InsufficientFunds(String),
    #[error("nonce too low: {0}")]
    NonceTooLow(String),
    #[error("transaction underpriced: {0}")]
    Underpriced(String),
    #[error("transaction rejected by node: {0}")]
    Rejected(String),
    /// The creation reverted. Without a transaction hash it already reverted
    /// while the gas limit was estimated and nothing was submitted.
    #[error("{}", display_revert(.tx_hash, .reason))]
    DeploymentReverted {
        tx_hash: Option<B256>,
        reason: Option<String>,
    },
    #[error(
        "transaction {tx_hash} was not confirmed within {}; it was submitted and may still be \
         included later",
        display_duration(.timeout)
    )]
    ConfirmationTimeout { tx_hash: B256, timeout: Duration },
    #[error("invalid configuration: {0}")]
    Config(String),
}

fn display_revert(tx_hash: &Option<B256>, reason: &Option<String>) -> String {
    let reason = reason
        .as_deref()
        .map(|reason| format!(": {reason}"))
        .unwrap_or_default();
    match tx_hash {
        Some(tx_hash) => format!("deployment transaction {tx_hash} reverted{reason}"),
        None => format!("deployment reverted during gas estimation{reason}"),
    }
}

fn display_duration(duration: &Duration) -> humantime::FormattedDuration {
    humantime::format_duration(*duration)
}

impl From<ArtifactError> for DeployError {
    fn from(err: ArtifactError) -> Self {
        match err {
            ArtifactError::NotFound(_) => Self::ArtifactNotFound(err.to_string()),
            ArtifactError::Ambiguous { .. } => Self::ArtifactAmbiguous(err.to_string()),
            ArtifactError::Malformed { .. } => Self::ArtifactMalformed(err.to_string()),
            ArtifactError::Io { .. } => Self::ArtifactUnreadable(err.to_string()),
        }
    }
}
