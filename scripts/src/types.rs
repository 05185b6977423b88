//! Type definitions used throughout the scripts

use std::{
    collections::BTreeMap,
    fmt::{self, Display},
};

use alloy::{
    dyn_abi::DynSolValue,
    primitives::{Address, Bytes, TxHash},
};
use serde::Deserialize;

use crate::errors::{ScriptError, StepFailure};

/// Addresses supplied by configuration rather than produced by the plan,
/// e.g. the upgrade admin of a proxy
pub type ExternalAddresses = BTreeMap<String, Address>;

/// A handle to a step that has already been appended to a plan.
///
/// Handles are only minted by the plan builder, so a step holding one can
/// only refer to a step that precedes it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct StepId(pub(crate) usize);

impl StepId {
    /// The zero-based position of the step in its plan
    pub fn index(&self) -> usize {
        self.0
    }
}

/// What kind of on-chain artifact a step produces
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactKind {
    /// A regular contract
    #[default]
    Contract,
    /// A library linked into other contracts
    Library,
}

impl Display for ArtifactKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArtifactKind::Contract => write!(f, "contract"),
            ArtifactKind::Library => write!(f, "library"),
        }
    }
}

/// An argument to a constructor or function call, resolved at execution time
#[derive(Debug, Clone, PartialEq)]
pub enum Argument {
    /// The address of an earlier step
    Step(StepId),
    /// An address supplied by configuration under the given name
    External(String),
    /// A literal ABI value
    Value(DynSolValue),
    /// An encoded function call, passed as `bytes`
    Call(FunctionCall),
}

impl Argument {
    /// The address deployed by the given step
    pub fn step(id: StepId) -> Self {
        Argument::Step(id)
    }

    /// The configured address with the given name
    pub fn external(name: &str) -> Self {
        Argument::External(name.to_string())
    }

    /// A literal address
    pub fn address(address: Address) -> Self {
        Argument::Value(DynSolValue::Address(address))
    }

    /// The calldata of the given function call
    pub fn call(signature: &str, args: Vec<Argument>) -> Self {
        Argument::Call(FunctionCall::new(signature, args))
    }

    /// The step ids this argument refers to, including nested call arguments
    pub fn step_refs(&self) -> Vec<StepId> {
        match self {
            Argument::Step(id) => vec![*id],
            Argument::Call(call) => call.step_refs(),
            Argument::External(_) | Argument::Value(_) => vec![],
        }
    }
}

/// A function call given by its human-readable signature,
/// e.g. `initialize(address,address)`
#[derive(Debug, Clone, PartialEq)]
pub struct FunctionCall {
    /// The function signature
    pub signature: String,
    /// The arguments to the function
    pub args: Vec<Argument>,
}

impl FunctionCall {
    /// Constructor
    pub fn new(signature: &str, args: Vec<Argument>) -> Self {
        Self { signature: signature.to_string(), args }
    }

    /// The step ids referenced by the call's arguments
    pub fn step_refs(&self) -> Vec<StepId> {
        self.args.iter().flat_map(Argument::step_refs).collect()
    }
}

/// A single contract or library deployment
#[derive(Debug, Clone, PartialEq)]
pub struct DeploymentStep {
    /// A label unique within the plan, defaults to the contract name
    pub label: String,
    /// The name under which the artifact source knows the contract
    pub contract: String,
    /// The kind of artifact deployed, used for reporting
    pub kind: ArtifactKind,
    /// The constructor arguments
    pub args: Vec<Argument>,
    /// Libraries to link, keyed by library name
    pub libraries: BTreeMap<String, StepId>,
    /// A call made on the deployed contract once its creation is confirmed
    pub initializer: Option<FunctionCall>,
}

impl DeploymentStep {
    /// A step deploying the given contract
    pub fn contract(name: &str) -> Self {
        Self::new(name, ArtifactKind::Contract)
    }

    /// A step deploying the given library
    pub fn library(name: &str) -> Self {
        Self::new(name, ArtifactKind::Library)
    }

    /// A step deploying the given artifact, labelled by its name
    fn new(name: &str, kind: ArtifactKind) -> Self {
        Self {
            label: name.to_string(),
            contract: name.to_string(),
            kind,
            args: Vec::new(),
            libraries: BTreeMap::new(),
            initializer: None,
        }
    }

    /// Set the step's label
    pub fn with_label(mut self, label: &str) -> Self {
        self.label = label.to_string();
        self
    }

    /// Append a constructor argument
    pub fn arg(mut self, arg: Argument) -> Self {
        self.args.push(arg);
        self
    }

    /// Link the named library to the address deployed by the given step
    pub fn link(mut self, library: &str, step: StepId) -> Self {
        self.libraries.insert(library.to_string(), step);
        self
    }

    /// Call the given function once the contract is deployed
    pub fn initializer(mut self, signature: &str, args: Vec<Argument>) -> Self {
        self.initializer = Some(FunctionCall::new(signature, args));
        self
    }

    /// Every step id referenced by this step
    pub fn step_refs(&self) -> Vec<StepId> {
        let args = self.args.iter().flat_map(Argument::step_refs);
        let links = self.libraries.values().copied();
        let init = self.initializer.iter().flat_map(FunctionCall::step_refs);
        args.chain(links).chain(init).collect()
    }
}

/// The result of a confirmed step
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeployedArtifact {
    /// The label of the step
    pub label: String,
    /// The contract name
    pub contract: String,
    /// The kind of artifact
    pub kind: ArtifactKind,
    /// The address the artifact was deployed to
    pub address: Address,
    /// The hash of the creation transaction
    pub tx_hash: TxHash,
    /// The hash of the initializer transaction, if the step had one
    pub initializer_tx_hash: Option<TxHash>,
}

/// The account submitting every transaction of a run.
///
/// A run holds the only mutable borrow of its context, so the nonce is
/// advanced by exactly one writer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignerContext {
    /// The signer's address
    pub address: Address,
    /// The chain the signer submits to
    pub chain_id: u64,
    /// The nonce of the next transaction
    pub next_nonce: u64,
}

impl SignerContext {
    /// Constructor
    pub fn new(address: Address, chain_id: u64, next_nonce: u64) -> Self {
        Self { address, chain_id, next_nonce }
    }

    /// Mark the current nonce as used
    pub fn advance(&mut self) {
        self.next_nonce += 1;
    }
}

/// A transaction to submit
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TxRequest {
    /// A contract creation with the given init code
    Create {
        /// Linked bytecode followed by encoded constructor arguments
        code: Bytes,
    },
    /// A call to a deployed contract
    Call {
        /// The callee
        to: Address,
        /// The calldata
        input: Bytes,
    },
}

/// The outcome of an included transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Receipt {
    /// The transaction hash
    pub tx_hash: TxHash,
    /// The created contract, for creation transactions
    pub contract_address: Option<Address>,
    /// Whether execution succeeded
    pub success: bool,
}

/// The lifecycle of a single step
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepStatus {
    /// Not yet started
    Pending,
    /// A transaction of the step is awaiting confirmation
    Submitted,
    /// The step's transactions are confirmed
    Confirmed,
    /// The step failed
    Failed,
}

/// The lifecycle of a whole run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    /// Not yet started
    Pending,
    /// Steps are executing
    Running,
    /// Every step was confirmed
    Completed,
    /// A step failed and the remaining steps were skipped
    Aborted,
}

/// The outcome of executing a plan
#[derive(Debug)]
pub struct DeploymentReport {
    /// The final status of the run
    pub status: RunStatus,
    /// The status of each step, in plan order
    pub steps: Vec<StepStatus>,
    /// The confirmed artifacts, in plan order
    pub artifacts: Vec<DeployedArtifact>,
    /// The step that aborted the run, if any
    pub failure: Option<StepFailure>,
}

impl DeploymentReport {
    /// Whether every step was confirmed
    pub fn is_complete(&self) -> bool {
        self.status == RunStatus::Completed
    }

    /// The artifacts of a completed run, or the failure that aborted it
    pub fn into_result(self) -> Result<Vec<DeployedArtifact>, ScriptError> {
        match self.failure {
            Some(failure) => Err(ScriptError::StepFailed(Box::new(failure))),
            None => Ok(self.artifacts),
        }
    }
}
