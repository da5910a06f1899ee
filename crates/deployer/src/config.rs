use {
    crate::{
        arguments::{Arguments, PrivateKey},
        artifact::ArtifactFormat,
        deployer::Confirmation,
        error::DeployError,
        signer::GasPricePolicy,
    },
    std::{path::PathBuf, time::Duration},
    tracing::Level,
    url::Url,
};

/// Everything a deployment needs, assembled once from the command line and
/// the environment.
#[derive(Debug, Clone)]
pub struct Config {
    pub node_url: Url,
    pub node_timeout: Duration,
    pub chain_id: Option<u64>,
    pub gas_price: GasPricePolicy,
    pub gas_limit: Option<u64>,
    pub private_key: PrivateKey,
    pub artifacts: PathBuf,
    pub artifact_format: ArtifactFormat,
    pub confirmation: Confirmation,
    pub contract: String,
    pub constructor_args: Vec<String>,
    pub logging: observe::Config,
}

impl TryFrom<Arguments> for Config {
    type Error = DeployError;

    fn try_from(args: Arguments) -> Result<Self, Self::Error> {
        if args.confirmation_timeout.is_zero() {
            return Err(DeployError::Config(
                "confirmation timeout must not be zero".to_string(),
            ));
        }
        if args.node_timeout.is_zero() {
            return Err(DeployError::Config(
                "node timeout must not be zero".to_string(),
            ));
        }
        if args.poll_interval.is_zero() {
            return Err(DeployError::Config(
                "poll interval must not be zero".to_string(),
            ));
        }
        if args.gas_limit == Some(0) {
            return Err(DeployError::Config("gas limit must not be zero".to_string()));
        }
        if args.contract.trim().is_empty() {
            return Err(DeployError::Config("contract name is empty".to_string()));
        }

        // Arguments on the command line take precedence over the environment.
        let constructor_args = if args.constructor_args.is_empty() {
            args.constructor_args_json.unwrap_or_default().0
        } else {
            args.constructor_args
        };

        Ok(Self {
            logging: observe::Config::new(
                &args.logging.log_filter,
                Some(Level::ERROR),
                args.logging.log_json,
            ),
            node_url: args.node_url,
            node_timeout: args.node_timeout,
            chain_id: args.chain_id,
            gas_price: args.gas_price,
            gas_limit: args.gas_limit,
            private_key: args.private_key,
            artifacts: args.artifacts,
            artifact_format: args.artifact_format,
            confirmation: Confirmation {
                timeout: args.confirmation_timeout,
                poll_interval: args.poll_interval,
            },
            contract: args.contract.trim().to_string(),
            constructor_args,
        })
    }
}
