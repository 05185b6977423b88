//! Constants used in the deploy scripts

/// The RPC URL of a local development node
pub const LOCALHOST_RPC_URL: &str = "http://127.0.0.1:8545";

/// The RPC URL of a local seed node
pub const SEED_RPC_URL: &str = "http://127.0.0.1:9933";

/// The RPC URL of the Porcini testnet
pub const PORCINI_RPC_URL: &str = "https://porcini.au.rootnet.app/";

/// The RPC URL of the Root mainnet
pub const ROOT_RPC_URL: &str = "https://root.rootnet.live";

/// The environment variable holding the deployer's private key
pub const PRIVATE_KEY_ENV_VAR: &str = "PRIVATE_KEY";

/// The environment variable holding the proxy upgrade admin address
pub const PUBLIC_ADDRESS_ENV_VAR: &str = "PUBLIC_ADDRESS";

/// The environment variable holding an explicit RPC URL
pub const RPC_URL_ENV_VAR: &str = "RPC_URL";

/// The environment variable selecting a named network
pub const NETWORK_ENV_VAR: &str = "NETWORK";

/// The name under which the proxy upgrade admin is exposed to plans
pub const ADMIN_ADDRESS_KEY: &str = "admin";

/// The default directory containing compiled contract artifacts
pub const DEFAULT_ARTIFACTS_DIR: &str = "artifacts";

/// The default file containing import-path remappings
pub const DEFAULT_REMAPPINGS_FILE: &str = "remappings.txt";

/// The default number of seconds to wait for a transaction receipt
pub const DEFAULT_CONFIRMATION_TIMEOUT_SECS: u64 = 120;

/// The interval, in milliseconds, at which receipts are polled
pub const RECEIPT_POLL_INTERVAL_MS: u64 = 500;

/// The extension of a compilation artifact file
pub const ARTIFACT_EXTENSION: &str = "json";

/// The directory in which Hardhat stores full compiler outputs
pub const BUILD_INFO_DIR: &str = "build-info";

/// The marker beginning an unlinked library placeholder in bytecode
pub const LINK_PLACEHOLDER_MARKER: &str = "__";

/// The deployments key in the `deployments.json` file
pub const DEPLOYMENTS_KEY: &str = "deployments";

/// The name of the upgradeable proxy contract
pub const PROXY_CONTRACT_NAME: &str = "TransparentUpgradeableProxy";

/// The name of the utilities library linked into the identity registries
pub const UTILS_LIBRARY_NAME: &str = "Utils";

/// The number of bytes in an Ethereum address
pub const NUM_BYTES_ADDRESS: usize = 20;
