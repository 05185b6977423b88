//! Construction of deployment plans, either programmatically or from a JSON file
//!
//! A plan is an ordered list of steps in which every address reference points
//! at an earlier step. The builder enforces this by only handing out a
//! [`StepId`] once the referenced step has been appended.

use std::{
    collections::{BTreeMap, HashMap},
    fs,
    path::Path,
    str::FromStr,
};

use alloy::{
    dyn_abi::DynSolValue,
    hex,
    primitives::{Address, U256},
};
use itertools::Itertools;
use serde::Deserialize;

use crate::{
    errors::ScriptError,
    types::{Argument, ArtifactKind, DeploymentStep, FunctionCall, StepId},
};

/// An ordered, dependency-respecting list of deployment steps
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DeploymentPlan {
    /// The steps, in execution order
    steps: Vec<DeploymentStep>,
}

impl DeploymentPlan {
    /// An empty plan
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a step, returning the handle by which later steps refer to it.
    ///
    /// Rejects duplicate labels, and references to steps that are not already
    /// in the plan (which can only arise from handles minted by another plan).
    pub fn push(&mut self, step: DeploymentStep) -> Result<StepId, ScriptError> {
        let id = StepId(self.steps.len());
        if let Some(bad) = step.step_refs().into_iter().find(|r| *r >= id) {
            return Err(ScriptError::InvalidPlan(format!(
                "step `{}` refers to step {} which does not precede it",
                step.label,
                bad.index() + 1
            )));
        }
        if self.steps.iter().any(|s| s.label == step.label) {
            return Err(ScriptError::InvalidPlan(format!(
                "duplicate step label `{}`",
                step.label
            )));
        }

        self.steps.push(step);
        Ok(id)
    }

    /// The steps, in execution order
    pub fn steps(&self) -> &[DeploymentStep] {
        &self.steps
    }

    /// The number of steps
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    /// Whether the plan has no steps
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// The handle of the step with the given label
    pub fn find(&self, label: &str) -> Option<StepId> {
        self.steps.iter().position(|s| s.label == label).map(StepId)
    }

    /// Render an argument for display, naming referenced steps by label
    pub fn describe(&self, arg: &Argument) -> String {
        match arg {
            Argument::Step(id) => match self.steps.get(id.index()) {
                Some(step) => format!("<{}>", step.label),
                None => format!("<step {}>", id.index() + 1),
            },
            Argument::External(name) => format!("${name}"),
            Argument::Value(value) => describe_value(value),
            Argument::Call(call) => self.describe_call(call),
        }
    }

    /// Render a function call for display
    pub fn describe_call(&self, call: &FunctionCall) -> String {
        let name = call.signature.split('(').next().unwrap_or_default();
        format!("{}({})", name, call.args.iter().map(|a| self.describe(a)).join(", "))
    }

    /// Render the whole plan, one line per step
    pub fn summary(&self) -> Vec<String> {
        self.steps
            .iter()
            .enumerate()
            .map(|(i, step)| {
                let mut line = format!("{}. [{}] {}", i + 1, step.kind, step.label);
                if step.label != step.contract {
                    line.push_str(&format!(" ({})", step.contract));
                }
                if !step.args.is_empty() {
                    let args = step.args.iter().map(|a| self.describe(a)).join(", ");
                    line.push_str(&format!(" args: {args}"));
                }
                if !step.libraries.is_empty() {
                    let links = step
                        .libraries
                        .iter()
                        .map(|(lib, id)| format!("{lib}={}", self.describe(&Argument::Step(*id))))
                        .join(", ");
                    line.push_str(&format!(" links: {links}"));
                }
                if let Some(init) = &step.initializer {
                    line.push_str(&format!(" then {}", self.describe_call(init)));
                }
                line
            })
            .collect()
    }

    /// Load a plan from a JSON plan file
    pub fn from_file(path: &Path) -> Result<Self, ScriptError> {
        let contents = fs::read_to_string(path)
            .map_err(|e| ScriptError::ReadFile(format!("{}: {}", path.display(), e)))?;
        Self::from_json(&contents)
    }

    /// Parse a plan from JSON, resolving step references by label against
    /// the steps that precede each step
    pub fn from_json(json: &str) -> Result<Self, ScriptError> {
        let file: PlanFile =
            serde_json::from_str(json).map_err(|e| ScriptError::InvalidPlan(e.to_string()))?;

        let mut plan = DeploymentPlan::new();
        let mut labels = HashMap::new();
        for spec in file.steps {
            let label = spec.label.clone().unwrap_or_else(|| spec.contract.clone());
            let step = spec.into_step(&label, &labels)?;
            let id = plan.push(step)?;
            labels.insert(label, id);
        }

        Ok(plan)
    }
}

/// Render a literal ABI value for display
fn describe_value(value: &DynSolValue) -> String {
    match value {
        DynSolValue::Address(a) => format!("{a:#x}"),
        DynSolValue::Bool(b) => b.to_string(),
        DynSolValue::Uint(v, _) => v.to_string(),
        DynSolValue::Int(v, _) => v.to_string(),
        DynSolValue::String(s) => format!("{s:?}"),
        DynSolValue::Bytes(b) => format!("0x{}", hex::encode(b)),
        other => format!("{other:?}"),
    }
}

// -------------
// | Plan file |
// -------------

/// The JSON representation of a plan
#[derive(Deserialize)]
struct PlanFile {
    /// The steps, in execution order
    steps: Vec<StepSpec>,
}

/// The JSON representation of a step
#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct StepSpec {
    /// The contract name
    contract: String,
    /// The step label, defaulting to the contract name
    #[serde(default)]
    label: Option<String>,
    /// Whether a contract or library is deployed
    #[serde(default)]
    kind: ArtifactKind,
    /// The constructor arguments
    #[serde(default)]
    args: Vec<ArgSpec>,
    /// Library names mapped to the labels of the steps deploying them
    #[serde(default)]
    libraries: BTreeMap<String, String>,
    /// The post-deploy call
    #[serde(default)]
    initializer: Option<CallSpec>,
}

/// The JSON representation of an argument; literals are written as strings
#[derive(Deserialize)]
#[serde(rename_all = "snake_case")]
enum ArgSpec {
    /// The address of the earlier step with this label
    Step(String),
    /// A configured address
    External(String),
    /// A literal address
    Address(String),
    /// A decimal or `0x`-prefixed hex integer
    Uint(String),
    /// A literal boolean
    Bool(bool),
    /// A literal string
    String(String),
    /// Hex-encoded bytes
    Bytes(String),
    /// An encoded function call, passed as `bytes`
    Call(CallSpec),
}

/// The JSON representation of a function call
#[derive(Deserialize)]
struct CallSpec {
    /// The human-readable signature
    signature: String,
    /// The call arguments
    #[serde(default)]
    args: Vec<ArgSpec>,
}

impl StepSpec {
    /// Resolve the step's references against the labels of earlier steps
    fn into_step(
        self,
        label: &str,
        labels: &HashMap<String, StepId>,
    ) -> Result<DeploymentStep, ScriptError> {
        let mut step = match self.kind {
            ArtifactKind::Contract => DeploymentStep::contract(&self.contract),
            ArtifactKind::Library => DeploymentStep::library(&self.contract),
        }
        .with_label(label);

        for arg in self.args {
            step = step.arg(arg.into_argument(labels)?);
        }
        for (library, target) in self.libraries {
            step = step.link(&library, lookup(&target, labels)?);
        }
        if let Some(init) = self.initializer {
            step.initializer = Some(init.into_call(labels)?);
        }

        Ok(step)
    }
}

impl ArgSpec {
    /// Resolve the argument's references
    fn into_argument(self, labels: &HashMap<String, StepId>) -> Result<Argument, ScriptError> {
        Ok(match self {
            ArgSpec::Step(label) => Argument::Step(lookup(&label, labels)?),
            ArgSpec::External(name) => Argument::External(name),
            ArgSpec::Address(s) => {
                let address = Address::from_str(&s)
                    .map_err(|e| ScriptError::InvalidPlan(format!("address {s}: {e}")))?;
                Argument::address(address)
            }
            ArgSpec::Uint(s) => {
                let value = U256::from_str(&s)
                    .map_err(|e| ScriptError::InvalidPlan(format!("uint {s}: {e}")))?;
                Argument::Value(DynSolValue::Uint(value, 256))
            }
            ArgSpec::Bool(b) => Argument::Value(DynSolValue::Bool(b)),
            ArgSpec::String(s) => Argument::Value(DynSolValue::String(s)),
            ArgSpec::Bytes(s) => {
                let bytes = hex::decode(&s)
                    .map_err(|e| ScriptError::InvalidPlan(format!("bytes {s}: {e}")))?;
                Argument::Value(DynSolValue::Bytes(bytes))
            }
            ArgSpec::Call(call) => Argument::Call(call.into_call(labels)?),
        })
    }
}

impl CallSpec {
    /// Resolve the call's references
    fn into_call(self, labels: &HashMap<String, StepId>) -> Result<FunctionCall, ScriptError> {
        let args = self
            .args
            .into_iter()
            .map(|a| a.into_argument(labels))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(FunctionCall { signature: self.signature, args })
    }
}

/// Find an earlier step by label
fn lookup(label: &str, labels: &HashMap<String, StepId>) -> Result<StepId, ScriptError> {
    labels.get(label).copied().ok_or_else(|| {
        ScriptError::InvalidPlan(format!("`{label}` does not name an earlier step"))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const PLAN: &str = r#"{
        "steps": [
            { "contract": "Utils", "kind": "library" },
            { "contract": "Registry", "libraries": { "Utils": "Utils" } },
            {
                "contract": "TransparentUpgradeableProxy",
                "label": "RegistryProxy",
                "args": [
                    { "step": "Registry" },
                    { "external": "admin" },
                    { "call": { "signature": "initialize(uint256)", "args": [{ "uint": "7" }] } }
                ]
            }
        ]
    }"#;

    #[test]
    fn test_parse_plan_file() {
        let plan = DeploymentPlan::from_json(PLAN).unwrap();
        assert_eq!(plan.len(), 3);

        let steps = plan.steps();
        assert_eq!(steps[0].kind, ArtifactKind::Library);
        assert_eq!(steps[1].libraries.get("Utils"), Some(&StepId(0)));
        assert_eq!(steps[2].label, "RegistryProxy");
        assert_eq!(steps[2].contract, "TransparentUpgradeableProxy");
        assert_eq!(steps[2].args[0], Argument::Step(StepId(1)));
        assert_eq!(steps[2].args[1], Argument::external("admin"));
        assert_eq!(plan.find("RegistryProxy"), Some(StepId(2)));
    }

    #[test]
    fn test_forward_reference_rejected() {
        let json = r#"{ "steps": [
            { "contract": "Registry", "libraries": { "Utils": "Utils" } },
            { "contract": "Utils", "kind": "library" }
        ] }"#;

        assert!(matches!(
            DeploymentPlan::from_json(json),
            Err(ScriptError::InvalidPlan(msg)) if msg.contains("Utils")
        ));
    }

    #[test]
    fn test_self_reference_rejected() {
        let json = r#"{ "steps": [
            { "contract": "Registry", "args": [{ "step": "Registry" }] }
        ] }"#;
        assert!(DeploymentPlan::from_json(json).is_err());
    }

    #[test]
    fn test_duplicate_label_rejected() {
        let json = r#"{ "steps": [
            { "contract": "Utils", "kind": "library" },
            { "contract": "Utils", "kind": "library" }
        ] }"#;
        assert!(matches!(
            DeploymentPlan::from_json(json),
            Err(ScriptError::InvalidPlan(msg)) if msg.contains("duplicate")
        ));
    }

    #[test]
    fn test_foreign_step_id_rejected() {
        let mut plan = DeploymentPlan::new();
        let err = plan
            .push(DeploymentStep::contract("Registry").link("Utils", StepId(3)))
            .unwrap_err();
        assert!(matches!(err, ScriptError::InvalidPlan(_)));
    }

    #[test]
    fn test_summary_names_steps_by_label() {
        let plan = DeploymentPlan::from_json(PLAN).unwrap();
        let summary = plan.summary();

        assert_eq!(summary[0], "1. [library] Utils");
        assert_eq!(summary[1], "2. [contract] Registry links: Utils=<Utils>");
        assert_eq!(
            summary[2],
            "3. [contract] RegistryProxy (TransparentUpgradeableProxy) args: <Registry>, $admin, initialize(7)"
        );
    }
}
