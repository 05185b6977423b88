//! Definitions of errors that can occur while planning and executing a deployment

use std::{
    error::Error,
    fmt::{self, Display, Formatter},
    time::Duration,
};

use alloy::primitives::TxHash;

/// Errors that can occur during the execution of the deploy scripts
#[derive(Debug)]
pub enum ScriptError {
    /// A required configuration value (signer, network, external address)
    /// is missing or malformed
    Configuration(String),
    /// The artifact source has no artifact for the requested contract name
    FactoryResolution(String),
    /// Error parsing a compilation artifact
    ArtifactParsing(String),
    /// Error substituting library addresses into bytecode
    Linking(String),
    /// Error constructing constructor or initializer calldata
    CalldataConstruction(String),
    /// The deployment plan is malformed
    InvalidPlan(String),
    /// Error initializing the RPC client
    ClientInitialization(String),
    /// The network rejected a transaction
    Submission(String),
    /// A transaction was included but reverted
    Revert(TxHash),
    /// No receipt was observed within the confirmation timeout
    ConfirmationTimeout(Duration),
    /// The run was interrupted by the operator
    Cancelled,
    /// Error reading a file
    ReadFile(String),
    /// Error writing a file
    WriteFile(String),
    /// A step of the deployment plan failed, aborting the run
    StepFailed(Box<StepFailure>),
}

impl Display for ScriptError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            ScriptError::Configuration(s) => write!(f, "configuration error: {}", s),
            ScriptError::FactoryResolution(s) => write!(f, "unknown contract: {}", s),
            ScriptError::ArtifactParsing(s) => write!(f, "error parsing artifact: {}", s),
            ScriptError::Linking(s) => write!(f, "error linking libraries: {}", s),
            ScriptError::CalldataConstruction(s) => write!(f, "error constructing calldata: {}", s),
            ScriptError::InvalidPlan(s) => write!(f, "invalid deployment plan: {}", s),
            ScriptError::ClientInitialization(s) => write!(f, "error initializing client: {}", s),
            ScriptError::Submission(s) => write!(f, "error submitting transaction: {}", s),
            ScriptError::Revert(tx_hash) => write!(f, "transaction {:#x} reverted", tx_hash),
            ScriptError::ConfirmationTimeout(timeout) => {
                write!(f, "no receipt after {}s", timeout.as_secs_f64())
            }
            ScriptError::Cancelled => write!(f, "deployment cancelled"),
            ScriptError::ReadFile(s) => write!(f, "error reading file: {}", s),
            ScriptError::WriteFile(s) => write!(f, "error writing file: {}", s),
            ScriptError::StepFailed(failure) => write!(f, "{}", failure),
        }
    }
}

impl Error for ScriptError {}

/// The identity of the step that aborted a run, along with its cause
#[derive(Debug)]
pub struct StepFailure {
    /// The zero-based index of the step in the plan
    pub index: usize,
    /// The label of the step
    pub label: String,
    /// The contract the step deploys
    pub contract: String,
    /// The underlying error
    pub error: ScriptError,
}

impl Display for StepFailure {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "step {} ({}, contract `{}`) failed: {}",
            self.index + 1,
            self.label,
            self.contract,
            self.error
        )
    }
}
