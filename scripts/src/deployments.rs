//! Reading and writing the `deployments.json` file of deployed addresses

use std::{collections::BTreeMap, fs, path::Path, str::FromStr};

use alloy::primitives::Address;
use serde_json::{Map, Value};

use crate::{constants::DEPLOYMENTS_KEY, errors::ScriptError, types::DeployedArtifact};

/// Parse the deployments file at the given path
fn read_json(path: &Path) -> Result<Value, ScriptError> {
    let contents = fs::read_to_string(path)
        .map_err(|e| ScriptError::ReadFile(format!("{}: {}", path.display(), e)))?;
    serde_json::from_str(&contents).map_err(|e| ScriptError::ReadFile(e.to_string()))
}

/// Read every address recorded in a deployments file, keyed by step label
pub fn read_deployments(path: &Path) -> Result<BTreeMap<String, Address>, ScriptError> {
    let parsed = read_json(path)?;
    let Some(entries) = parsed.get(DEPLOYMENTS_KEY).and_then(Value::as_object) else {
        return Ok(BTreeMap::new());
    };

    entries
        .iter()
        .map(|(label, value)| {
            let address = value
                .as_str()
                .and_then(|s| Address::from_str(s).ok())
                .ok_or_else(|| {
                    ScriptError::ReadFile(format!("could not parse address for `{label}`"))
                })?;
            Ok((label.clone(), address))
        })
        .collect()
}

/// Record the given artifacts' addresses in the deployments file, creating
/// it if needed and keeping entries for other labels
pub fn write_deployments(path: &Path, artifacts: &[DeployedArtifact]) -> Result<(), ScriptError> {
    let mut parsed = if path.exists() {
        read_json(path)?
    } else {
        Value::Object(Map::new())
    };

    let root = parsed
        .as_object_mut()
        .ok_or_else(|| ScriptError::WriteFile(format!("{} is not a JSON object", path.display())))?;
    let entries = root
        .entry(DEPLOYMENTS_KEY)
        .or_insert_with(|| Value::Object(Map::new()))
        .as_object_mut()
        .ok_or_else(|| ScriptError::WriteFile(format!("`{DEPLOYMENTS_KEY}` is not a JSON object")))?;

    for artifact in artifacts {
        entries.insert(
            artifact.label.clone(),
            Value::String(format!("{:#x}", artifact.address)),
        );
    }

    let contents =
        serde_json::to_string_pretty(&parsed).map_err(|e| ScriptError::WriteFile(e.to_string()))?;
    fs::write(path, contents).map_err(|e| ScriptError::WriteFile(e.to_string()))
}
