//! Deploys a compiled contract through a JSON-RPC node: the creation
//! transaction is signed locally, submitted and awaited until it is included.

pub mod arguments;
pub mod artifact;
pub mod config;
pub mod deployer;
pub mod encoding;
pub mod error;
pub mod node;
pub mod signer;
#[cfg(test)]
mod testing;

use {
    crate::{
        arguments::Arguments,
        config::Config,
        deployer::{Deployer, DeploymentResult},
        error::DeployError,
        signer::Signer,
    },
    anyhow::Context,
    clap::Parser,
    std::process::ExitCode,
};

/// Runs a single deployment as configured by `args` and the environment.
///
/// On success the deployed address is printed to stdout as a JSON line.
/// Everything else, logs and errors, goes to stderr.
pub async fn start(args: impl IntoIterator<Item = String>) -> ExitCode {
    // A missing .env file is fine, the environment is used as is then.
    dotenvy::dotenv().ok();

    let args = match Arguments::try_parse_from(args) {
        Ok(args) => args,
        Err(err) => {
            // Also covers --help and --version which are not failures.
            let _ = err.print();
            return if err.use_stderr() {
                ExitCode::FAILURE
            } else {
                ExitCode::SUCCESS
            };
        }
    };
    let summary = args.to_string();
    let config = match Config::try_from(args) {
        Ok(config) => config,
        Err(err) => {
            eprintln!("{err}");
            return ExitCode::FAILURE;
        }
    };

    observe::tracing::initialize(&config.logging);
    tracing::info!("running deploy-contract with validated arguments:\n{summary}");

    match deploy(&config).await {
        Ok(line) => {
            println!("{line}");
            ExitCode::SUCCESS
        }
        Err(err) => {
            tracing::error!(?err, contract = %config.contract, "deployment failed");
            eprintln!("{err:#}");
            ExitCode::FAILURE
        }
    }
}

async fn deploy(config: &Config) -> anyhow::Result<String> {
    let result = run(config)
        .await
        .with_context(|| format!("failed to deploy {}", config.contract))?;
    serde_json::to_string(&result).context("failed to serialize deployment result")
}

/// Loads the artifact, connects to the node and deploys the contract once.
pub async fn run(config: &Config) -> Result<DeploymentResult, DeployError> {
    let artifact = config
        .artifact_format
        .source(config.artifacts.clone())
        .get(&config.contract)?;
    let signer = Signer::connect(
        &config.node_url,
        config.node_timeout,
        config.private_key.expose(),
        config.gas_price,
        config.gas_limit,
    )?;
    tracing::info!(
        contract = %artifact.name,
        sender = %signer.address(),
        node = %config.node_url,
        "deploying contract"
    );

    Deployer::new(signer, config.chain_id, config.confirmation)
        .deploy(&artifact, &config.constructor_args)
        .await
}
