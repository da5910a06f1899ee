use {
    crate::{artifact::ArtifactFormat, signer::GasPricePolicy},
    anyhow::Context,
    std::{
        convert::Infallible,
        fmt::{self, Debug, Display, Formatter},
        path::PathBuf,
        str::FromStr,
        time::Duration,
    },
    url::Url,
};

/// Deploys a single compiled contract and prints its address.
#[derive(clap::Parser)]
#[clap(name = "deploy-contract", version)]
pub struct Arguments {
    #[clap(flatten)]
    pub logging: LoggingArguments,

    /// The Ethereum node URL to connect to.
    #[clap(long, env, default_value = "http://127.0.0.1:8545")]
    pub node_url: Url,

    /// Maximum time the node gets to answer a single request.
    #[clap(long, env, default_value = "10s", value_parser = humantime::parse_duration)]
    pub node_timeout: Duration,

    /// The chain the deployment is meant for. The chain id reported by the
    /// node is used when not set; a node reporting a different one is an
    /// error.
    #[clap(long, env)]
    pub chain_id: Option<u64>,

    /// Either "auto" to use the node's EIP-1559 fee estimation or a fixed gas
    /// price in wei for a legacy transaction.
    #[clap(long, env, default_value = "auto")]
    pub gas_price: GasPricePolicy,

    /// Gas limit of the creation transaction. Estimated by the node when not
    /// set.
    #[clap(long, env)]
    pub gas_limit: Option<u64>,

    /// Hex encoded private key of the deploying account.
    #[clap(long, env, hide_env_values = true)]
    pub private_key: PrivateKey,

    /// Directory containing the compiler output.
    #[clap(long, env, default_value = "artifacts")]
    pub artifacts: PathBuf,

    /// Layout of the compiler output.
    #[clap(long, env, value_enum, default_value_t)]
    pub artifact_format: ArtifactFormat,

    /// How long to wait for the deployment transaction to be included.
    #[clap(long, env, default_value = "2m", value_parser = humantime::parse_duration)]
    pub confirmation_timeout: Duration,

    /// How often the node is asked for the transaction receipt.
    #[clap(long, env, default_value = "1s", value_parser = humantime::parse_duration)]
    pub poll_interval: Duration,

    /// Name of the contract to deploy. With Hardhat artifacts it can be fully
    /// qualified as `contracts/Lock.sol:Lock`.
    #[clap(long, env)]
    pub contract: String,

    /// Constructor arguments as a JSON array, for example
    /// `[1700000000, "0x01..."]`. Ignored when arguments are passed
    /// positionally.
    #[clap(long = "constructor-args", env = "CONSTRUCTOR_ARGS")]
    pub constructor_args_json: Option<ConstructorArgs>,

    /// Constructor arguments in declaration order.
    #[clap(trailing_var_arg = true, allow_hyphen_values = true)]
    pub constructor_args: Vec<String>,
}

#[derive(clap::Parser)]
#[group(skip)]
pub struct LoggingArguments {
    #[clap(long, env, default_value = "warn,deployer=info")]
    pub log_filter: String,

    /// Output logs as JSON.
    #[clap(long, env, action = clap::ArgAction::Set, default_value = "false")]
    pub log_json: bool,
}

/// A private key that is never printed.
#[derive(Clone)]
pub struct PrivateKey(String);

impl PrivateKey {
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl FromStr for PrivateKey {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(s.to_string()))
    }
}

impl Debug for PrivateKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str("SECRET")
    }
}

impl Display for PrivateKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str("SECRET")
    }
}

/// Constructor arguments given as one JSON array. Strings are taken verbatim,
/// every other value as its JSON text, so `[1, [2, 3], true]` and
/// `["1", "[2,3]", "true"]` are equivalent.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ConstructorArgs(pub Vec<String>);

impl FromStr for ConstructorArgs {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let values: Vec<serde_json::Value> =
            serde_json::from_str(s).context("expected a JSON array of constructor arguments")?;
        Ok(Self(
            values
                .into_iter()
                .map(|value| match value {
                    serde_json::Value::String(value) => value,
                    value => value.to_string(),
                })
                .collect(),
        ))
    }
}

impl Display for LoggingArguments {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let Self {
            log_filter,
            log_json,
        } = self;

        writeln!(f, "log_filter: {log_filter}")?;
        writeln!(f, "log_json: {log_json}")?;
        Ok(())
    }
}

impl Display for Arguments {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let Self {
            logging,
            node_url,
            node_timeout,
            chain_id,
            gas_price,
            gas_limit,
            private_key,
            artifacts,
            artifact_format,
            confirmation_timeout,
            poll_interval,
            contract,
            constructor_args_json,
            constructor_args,
        } = self;

        write!(f, "{logging}")?;
        writeln!(f, "node_url: {node_url}")?;
        writeln!(
            f,
            "node_timeout: {}",
            humantime::format_duration(*node_timeout)
        )?;
        display_option(f, "chain_id", chain_id)?;
        writeln!(f, "gas_price: {gas_price}")?;
        display_option(f, "gas_limit", gas_limit)?;
        writeln!(f, "private_key: {private_key}")?;
        writeln!(f, "artifacts: {}", artifacts.display())?;
        writeln!(f, "artifact_format: {artifact_format}")?;
        writeln!(
            f,
            "confirmation_timeout: {}",
            humantime::format_duration(*confirmation_timeout)
        )?;
        writeln!(
            f,
            "poll_interval: {}",
            humantime::format_duration(*poll_interval)
        )?;
        writeln!(f, "contract: {contract}")?;
        display_option(
            f,
            "constructor_args_json",
            &constructor_args_json
                .as_ref()
                .map(|args| format!("{:?}", args.0)),
        )?;
        writeln!(f, "constructor_args: {constructor_args:?}")?;
        Ok(())
    }
}

fn display_option(
    f: &mut Formatter<'_>,
    name: &str,
    option: &Option<impl Display>,
) -> fmt::Result {
    write!(f, "{name}: ")?;
    match option {
        Some(display) => writeln!(f, "{display}"),
        None => writeln!(f, "None"),
    }
}

#[cfg(test)]
mod tests {
    use {
        super::*,
        clap::{CommandFactory, Parser},
        std::ffi::OsStr,
    };

    const KEY: &str = "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";

    fn parse(args: &[&str]) -> Result<Arguments, clap::Error> {
        Arguments::try_parse_from(std::iter::once("deploy-contract").chain(args.iter().copied()))
    }

    #[test]
    fn defaults() {
        let args = parse(&["--private-key", KEY, "--contract", "Lock", "1700000000"]).unwrap();

        assert_eq!(args.node_url.as_str(), "http://127.0.0.1:8545/");
        assert_eq!(args.node_timeout, Duration::from_secs(10));
        assert_eq!(args.chain_id, None);
        assert_eq!(args.gas_price, GasPricePolicy::Automatic);
        assert_eq!(args.gas_limit, None);
        assert_eq!(args.artifacts, PathBuf::from("artifacts"));
        assert_eq!(args.artifact_format, ArtifactFormat::Hardhat);
        assert_eq!(args.confirmation_timeout, Duration::from_secs(120));
        assert_eq!(args.poll_interval, Duration::from_secs(1));
        assert_eq!(args.logging.log_filter, "warn,deployer=info");
        assert!(!args.logging.log_json);
        assert_eq!(args.contract, "Lock");
        assert_eq!(args.constructor_args, vec!["1700000000".to_string()]);
        assert_eq!(args.private_key.expose(), KEY);
    }

    #[test]
    fn parses_every_flag() {
        let args = parse(&[
            "--node-url",
            "http://127.0.0.1:7545",
            "--node-timeout",
            "3s",
            "--chain-id",
            "1337",
            "--gas-price",
            "200000000",
            "--gas-limit",
            "3000000",
            "--private-key",
            KEY,
            "--artifacts",
            "contracts",
            "--artifact-format",
            "solc",
            "--confirmation-timeout",
            "30s",
            "--poll-interval",
            "250ms",
            "--log-json",
            "true",
            "--contract",
            "Token",
            "Mystery Chinese Chess",
            "-5",
        ])
        .unwrap();

        assert_eq!(args.node_url.port(), Some(7545));
        assert_eq!(args.node_timeout, Duration::from_secs(3));
        assert_eq!(args.chain_id, Some(1337));
        assert_eq!(args.gas_price, GasPricePolicy::Fixed(200_000_000));
        assert_eq!(args.gas_limit, Some(3_000_000));
        assert_eq!(args.artifact_format, ArtifactFormat::Solc);
        assert_eq!(args.confirmation_timeout, Duration::from_secs(30));
        assert_eq!(args.poll_interval, Duration::from_millis(250));
        assert!(args.logging.log_json);
        assert_eq!(args.contract, "Token");
        assert_eq!(args.constructor_args, vec![
            "Mystery Chinese Chess".to_string(),
            "-5".to_string()
        ]);
    }

    #[test]
    fn positional_values_are_never_the_contract() {
        let args = parse(&["--private-key", KEY, "--contract", "Lock", "1700000000"]).unwrap();
        assert_eq!(args.contract, "Lock");
        assert_eq!(args.constructor_args, vec!["1700000000".to_string()]);

        // Without a contract name the positional value isn't mistaken for it.
        assert!(parse(&["--private-key", KEY, "1700000000"]).is_err());
    }

    #[test]
    fn every_setting_has_an_environment_variable() {
        let command = Arguments::command();
        let env = |id: &str| {
            command
                .get_arguments()
                .find(|arg| arg.get_id() == id)
                .and_then(|arg| arg.get_env())
                .map(OsStr::to_os_string)
        };

        assert_eq!(env("contract"), Some("CONTRACT".into()));
        assert_eq!(env("constructor_args_json"), Some("CONSTRUCTOR_ARGS".into()));
        assert_eq!(env("private_key"), Some("PRIVATE_KEY".into()));
        assert_eq!(env("node_url"), Some("NODE_URL".into()));
        assert_eq!(env("chain_id"), Some("CHAIN_ID".into()));
        assert_eq!(env("gas_price"), Some("GAS_PRICE".into()));
    }

    #[test]
    fn parses_constructor_args_json() {
        let args = parse(&[
            "--private-key",
            KEY,
            "--contract",
            "Token",
            "--constructor-args",
            r#"["  padded  ", 1700000000, [1, 2], true]"#,
        ])
        .unwrap();

        assert!(args.constructor_args.is_empty());
        assert_eq!(
            args.constructor_args_json,
            Some(ConstructorArgs(vec![
                "  padded  ".to_string(),
                "1700000000".to_string(),
                "[1,2]".to_string(),
                "true".to_string(),
            ]))
        );
        assert!("1700000000 2".parse::<ConstructorArgs>().is_err());
        assert!(r#"{"a": 1}"#.parse::<ConstructorArgs>().is_err());
    }

    #[test]
    fn rejects_invalid_values() {
        let base = ["--private-key", KEY, "--contract", "Lock"];
        let with = |extra: &[&'static str]| {
            let mut args = base.to_vec();
            args.extend_from_slice(extra);
            parse(&args)
        };

        assert!(with(&["--gas-price", "cheap"]).is_err());
        assert!(with(&["--node-url", "not a url"]).is_err());
        assert!(with(&["--confirmation-timeout", "soon"]).is_err());
        assert!(with(&["--node-timeout", "never"]).is_err());
    }

    #[test]
    fn display_redacts_private_key() {
        let args = parse(&["--private-key", KEY, "--contract", "Lock", "1700000000"]).unwrap();
        let displayed = args.to_string();

        assert!(displayed.contains("private_key: SECRET"));
        assert!(displayed.contains("confirmation_timeout: 2m"));
        assert!(displayed.contains("node_timeout: 10s"));
        assert!(displayed.contains("chain_id: None"));
        assert!(!displayed.contains(&KEY[2..]));
        assert_eq!(format!("{:?}", args.private_key), "SECRET");
    }
}
