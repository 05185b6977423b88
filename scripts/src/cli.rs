//! Definitions of CLI arguments and commands for deploy scripts

use std::{
    fmt::{self, Display},
    path::{Path, PathBuf},
    str::FromStr,
    time::Duration,
};

use alloy::{primitives::Address, signers::local::PrivateKeySigner};
use clap::{Args, Parser, Subcommand, ValueEnum};

use crate::{
    commands::{deploy, dry_run, remap, show_plan},
    constants::{
        ADMIN_ADDRESS_KEY, DEFAULT_ARTIFACTS_DIR, DEFAULT_CONFIRMATION_TIMEOUT_SECS,
        DEFAULT_REMAPPINGS_FILE, LOCALHOST_RPC_URL, NETWORK_ENV_VAR, PORCINI_RPC_URL,
        PRIVATE_KEY_ENV_VAR, PUBLIC_ADDRESS_ENV_VAR, ROOT_RPC_URL, RPC_URL_ENV_VAR, SEED_RPC_URL,
    },
    deployments::read_deployments,
    errors::ScriptError,
    plan::DeploymentPlan,
    presets::Preset,
    types::ExternalAddresses,
};

/// Deploy contracts to an EVM chain from a deployment plan
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Private key of the deployer
    #[arg(short, long, env = PRIVATE_KEY_ENV_VAR, hide_env_values = true)]
    pub priv_key: Option<String>,

    /// The named network to deploy to
    #[arg(short, long, env = NETWORK_ENV_VAR, default_value = "localhost")]
    pub network: Network,

    /// Network RPC URL, overriding that of the named network
    #[arg(short, long, env = RPC_URL_ENV_VAR)]
    pub rpc_url: Option<String>,

    /// Upgrade admin of deployed proxies, available to plans as `admin`
    #[arg(long, env = PUBLIC_ADDRESS_ENV_VAR)]
    pub admin: Option<String>,

    /// An additional address available to plans, as `NAME=ADDRESS`
    #[arg(short, long = "external", value_parser = parse_external)]
    pub externals: Vec<(String, Address)>,

    /// A deployments file from an earlier run, whose addresses are made
    /// available to plans by step label
    #[arg(long)]
    pub import_deployments: Option<PathBuf>,

    /// The Hardhat artifacts directory
    #[arg(long, default_value = DEFAULT_ARTIFACTS_DIR)]
    pub artifacts: PathBuf,

    /// Seconds to wait for each transaction to be confirmed
    #[arg(long, default_value_t = DEFAULT_CONFIRMATION_TIMEOUT_SECS)]
    pub confirmation_timeout: u64,

    /// Path to the file in which deployed addresses are recorded
    #[arg(short, long)]
    pub deployments_path: Option<PathBuf>,

    /// The command to run
    #[command(subcommand)]
    pub command: Command,
}

impl Cli {
    /// Run the selected command
    pub async fn run(self) -> Result<(), ScriptError> {
        match &self.command {
            Command::Deploy(args) => deploy(args, &self).await,
            Command::DryRun(args) => dry_run(args, &self).await,
            Command::ShowPlan(args) => show_plan(args),
            Command::Remap(args) => remap(args),
        }
    }

    /// The RPC URL to connect to
    pub fn rpc_url(&self) -> String {
        self.rpc_url
            .clone()
            .unwrap_or_else(|| self.network.rpc_url().to_string())
    }

    /// The deployer's signer
    pub fn signer(&self) -> Result<PrivateKeySigner, ScriptError> {
        let priv_key = self.priv_key.as_deref().ok_or_else(|| {
            ScriptError::Configuration(format!(
                "no private key, set {PRIVATE_KEY_ENV_VAR} or pass --priv-key"
            ))
        })?;

        // The parse error is not propagated, as it may echo the key
        PrivateKeySigner::from_str(priv_key)
            .map_err(|_| ScriptError::Configuration("malformed private key".to_string()))
    }

    /// The confirmation timeout for each transaction
    pub fn confirmation_timeout(&self) -> Duration {
        Duration::from_secs(self.confirmation_timeout)
    }

    /// The configured addresses available to plans.
    ///
    /// Explicit `--external` values take precedence over the admin, which in
    /// turn takes precedence over imported deployments.
    pub fn externals(&self) -> Result<ExternalAddresses, ScriptError> {
        let mut externals = match &self.import_deployments {
            Some(path) => read_deployments(path)?,
            None => ExternalAddresses::new(),
        };

        if let Some(admin) = &self.admin {
            let address = Address::from_str(admin).map_err(|e| {
                ScriptError::Configuration(format!("malformed admin address: {e}"))
            })?;
            externals.insert(ADMIN_ADDRESS_KEY.to_string(), address);
        }

        externals.extend(self.externals.iter().cloned());
        Ok(externals)
    }
}

/// Parse a `NAME=ADDRESS` pair
fn parse_external(s: &str) -> Result<(String, Address), String> {
    let (name, address) = s
        .split_once('=')
        .ok_or_else(|| format!("expected NAME=ADDRESS, got `{s}`"))?;
    let address = Address::from_str(address.trim()).map_err(|e| e.to_string())?;

    Ok((name.trim().to_string(), address))
}

/// The deploy script commands
#[derive(Subcommand)]
pub enum Command {
    /// Deploy a plan to the network
    Deploy(PlanArgs),
    /// Preview the addresses a plan would deploy to, without sending
    /// any transactions
    DryRun(DryRunArgs),
    /// Print the steps of a plan
    ShowPlan(PlanArgs),
    /// Rewrite import paths in Solidity sources
    Remap(RemapArgs),
}

/// Selects the plan to execute
#[derive(Args)]
#[group(required = true, multiple = false)]
pub struct PlanArgs {
    /// A built-in plan
    #[arg(long)]
    pub preset: Option<Preset>,

    /// A JSON plan file
    #[arg(long)]
    pub plan: Option<PathBuf>,
}

impl PlanArgs {
    /// Build or read the selected plan
    pub fn load(&self) -> Result<DeploymentPlan, ScriptError> {
        match (&self.preset, &self.plan) {
            (Some(preset), None) => preset.plan(),
            (None, Some(path)) => DeploymentPlan::from_file(path),
            _ => Err(ScriptError::Configuration(
                "exactly one of --preset and --plan is required".to_string(),
            )),
        }
    }

    /// A name for the selected plan, for logging
    pub fn name(&self) -> String {
        match (&self.preset, &self.plan) {
            (Some(preset), _) => preset.to_string(),
            (None, Some(path)) => path.display().to_string(),
            (None, None) => String::new(),
        }
    }
}

/// Preview a plan's deployment against a simulated chain
#[derive(Args)]
pub struct DryRunArgs {
    /// The plan to preview
    #[command(flatten)]
    pub plan: PlanArgs,

    /// The deployer nonce to simulate from. If omitted, the deployer's
    /// current nonce is fetched from the network.
    #[arg(long)]
    pub nonce: Option<u64>,

    /// The deployer address to simulate from a given nonce, in place of
    /// the private key's address
    #[arg(long, requires = "nonce")]
    pub deployer: Option<Address>,
}

impl DryRunArgs {
    /// The address to simulate the deployment from. Only reads the private
    /// key if no deployer address was given.
    pub fn deployer(&self, cli: &Cli) -> Result<Address, ScriptError> {
        match self.deployer {
            Some(deployer) => Ok(deployer),
            None => Ok(cli.signer()?.address()),
        }
    }
}

/// Rewrite import paths in Solidity sources, in place
#[derive(Args)]
pub struct RemapArgs {
    /// The remappings file, one `from=to` rule per line
    #[arg(long, default_value = DEFAULT_REMAPPINGS_FILE)]
    pub remappings: PathBuf,

    /// The source files to rewrite
    #[arg(required = true)]
    pub files: Vec<PathBuf>,
}

impl RemapArgs {
    /// The source files to rewrite
    pub fn files(&self) -> impl Iterator<Item = &Path> {
        self.files.iter().map(PathBuf::as_path)
    }
}

/// The networks with well-known RPC endpoints
#[derive(ValueEnum, Copy, Clone, Debug, PartialEq, Eq)]
pub enum Network {
    /// A local development node
    Localhost,
    /// A local seed node
    Seed,
    /// The Porcini testnet
    Porcini,
    /// The Root mainnet
    Root,
}

impl Network {
    /// The network's RPC URL
    pub fn rpc_url(&self) -> &'static str {
        match self {
            Network::Localhost => LOCALHOST_RPC_URL,
            Network::Seed => SEED_RPC_URL,
            Network::Porcini => PORCINI_RPC_URL,
            Network::Root => ROOT_RPC_URL,
        }
    }
}

impl Display for Network {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Network::Localhost => write!(f, "localhost"),
            Network::Seed => write!(f, "seed"),
            Network::Porcini => write!(f, "porcini"),
            Network::Root => write!(f, "root"),
        }
    }
}
