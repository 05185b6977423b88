//! Resolution of contract names to deployable bytecode, and library linking

use std::{
    collections::{BTreeMap, HashMap},
    fs,
    path::{Path, PathBuf},
};

use alloy::{
    hex,
    json_abi::{Constructor, JsonAbi},
    primitives::{Address, Bytes},
};
use serde::Deserialize;

use crate::{
    constants::{
        ARTIFACT_EXTENSION, BUILD_INFO_DIR, LINK_PLACEHOLDER_MARKER, NUM_BYTES_ADDRESS,
    },
    errors::ScriptError,
};

/// A lookup from contract names to compiled artifacts
pub trait ArtifactSource {
    /// Resolve the artifact for the given contract name
    fn resolve(&self, name: &str) -> Result<Artifact, ScriptError>;
}

/// The byte range of a library placeholder within unlinked bytecode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct LinkOffset {
    /// The offset of the placeholder, in bytes
    pub start: usize,
    /// The length of the placeholder, in bytes
    pub length: usize,
}

/// The placeholders for a single library within unlinked bytecode
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkReference {
    /// The source file defining the library
    pub source: String,
    /// The library's name
    pub library: String,
    /// Every placeholder for the library
    pub offsets: Vec<LinkOffset>,
}

impl LinkReference {
    /// Whether the given name refers to this library, either plainly
    /// (`Utils`) or fully qualified (`src/Utils.sol:Utils`)
    pub fn matches(&self, name: &str) -> bool {
        name == self.library || name == format!("{}:{}", self.source, self.library)
    }
}

/// A compiled contract, possibly awaiting library addresses
#[derive(Debug, Clone, PartialEq)]
pub struct Artifact {
    /// The contract name
    pub name: String,
    /// The contract ABI, when the artifact carries one
    pub abi: Option<JsonAbi>,
    /// The creation bytecode as hex, without the `0x` prefix.
    /// Placeholders are not valid hex until linked.
    bytecode: String,
    /// The libraries the bytecode must be linked against
    link_references: Vec<LinkReference>,
}

/// The subset of a Hardhat artifact file used for deployment
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct HardhatArtifact {
    /// The contract name
    contract_name: String,
    /// The contract ABI
    #[serde(default)]
    abi: Option<JsonAbi>,
    /// The unlinked creation bytecode
    bytecode: String,
    /// Library placeholders, keyed by source file then library name
    #[serde(default)]
    link_references: BTreeMap<String, BTreeMap<String, Vec<LinkOffset>>>,
}

impl Artifact {
    /// An artifact with the given creation bytecode
    pub fn new(name: &str, bytecode: &str) -> Self {
        Self {
            name: name.to_string(),
            abi: None,
            bytecode: bytecode.trim_start_matches("0x").to_string(),
            link_references: Vec::new(),
        }
    }

    /// Attach an ABI to the artifact
    pub fn with_abi(mut self, abi: JsonAbi) -> Self {
        self.abi = Some(abi);
        self
    }

    /// Record a library placeholder in the bytecode
    pub fn with_link_reference(
        mut self,
        source: &str,
        library: &str,
        offsets: &[LinkOffset],
    ) -> Self {
        self.link_references.push(LinkReference {
            source: source.to_string(),
            library: library.to_string(),
            offsets: offsets.to_vec(),
        });
        self
    }

    /// Parse an artifact in the format Hardhat writes to its artifacts directory
    pub fn from_hardhat_json(json: &str) -> Result<Self, ScriptError> {
        let parsed: HardhatArtifact =
            serde_json::from_str(json).map_err(|e| ScriptError::ArtifactParsing(e.to_string()))?;

        if !parsed.bytecode.is_ascii() {
            return Err(ScriptError::ArtifactParsing(format!(
                "bytecode of {} is not hex",
                parsed.contract_name
            )));
        }

        let mut artifact = Artifact::new(&parsed.contract_name, &parsed.bytecode);
        artifact.abi = parsed.abi;
        for (source, libraries) in parsed.link_references {
            for (library, offsets) in libraries {
                artifact = artifact.with_link_reference(&source, &library, &offsets);
            }
        }

        Ok(artifact)
    }

    /// The libraries the bytecode references
    pub fn link_references(&self) -> &[LinkReference] {
        &self.link_references
    }

    /// The constructor declared in the artifact's ABI, if any
    pub fn constructor(&self) -> Option<&Constructor> {
        self.abi.as_ref().and_then(|abi| abi.constructor.as_ref())
    }

    /// Substitute the given library addresses into the bytecode.
    ///
    /// Every referenced library must be supplied, and every supplied library
    /// must be referenced.
    pub fn link(&self, libraries: &BTreeMap<String, Address>) -> Result<Bytes, ScriptError> {
        if let Some(unused) = libraries
            .keys()
            .find(|name| !self.link_references.iter().any(|r| r.matches(name)))
        {
            return Err(ScriptError::Linking(format!(
                "{} does not reference library {}",
                self.name, unused
            )));
        }

        let mut code = self.bytecode.as_bytes().to_vec();
        for reference in &self.link_references {
            let address = libraries
                .iter()
                .find_map(|(name, address)| reference.matches(name).then_some(address))
                .ok_or_else(|| {
                    ScriptError::Linking(format!(
                        "{} requires library {} which was not linked",
                        self.name, reference.library
                    ))
                })?;
            let address_hex = hex::encode(address);

            for offset in &reference.offsets {
                if offset.length != NUM_BYTES_ADDRESS {
                    return Err(ScriptError::Linking(format!(
                        "placeholder for {} spans {} bytes",
                        reference.library, offset.length
                    )));
                }

                // Offsets are in bytes, the bytecode is hex
                let range = offset
                    .start
                    .checked_mul(2)
                    .and_then(|start| Some(start..start.checked_add(offset.length * 2)?));
                let placeholder = range.and_then(|r| code.get_mut(r)).ok_or_else(|| {
                    ScriptError::Linking(format!(
                        "placeholder for {} lies outside the bytecode of {}",
                        reference.library, self.name
                    ))
                })?;
                placeholder.copy_from_slice(address_hex.as_bytes());
            }
        }

        if code
            .windows(LINK_PLACEHOLDER_MARKER.len())
            .any(|w| w == LINK_PLACEHOLDER_MARKER.as_bytes())
        {
            return Err(ScriptError::Linking(format!(
                "bytecode of {} has an unresolved library placeholder",
                self.name
            )));
        }

        hex::decode(&code)
            .map(Bytes::from)
            .map_err(|e| ScriptError::ArtifactParsing(e.to_string()))
    }
}

/// Artifacts read from a Hardhat `artifacts/` directory
#[derive(Debug, Clone)]
pub struct HardhatArtifacts {
    /// The root of the artifacts directory
    root: PathBuf,
}

impl HardhatArtifacts {
    /// Constructor
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Find the artifact file for a contract name, which may be fully
    /// qualified as `<source path>:<contract>`
    fn find(&self, name: &str) -> Result<PathBuf, ScriptError> {
        if let Some((source, contract)) = name.rsplit_once(':') {
            let path = self
                .root
                .join(source)
                .join(format!("{contract}.{ARTIFACT_EXTENSION}"));
            return if path.is_file() {
                Ok(path)
            } else {
                Err(ScriptError::FactoryResolution(name.to_string()))
            };
        }

        let file_name = format!("{name}.{ARTIFACT_EXTENSION}");
        let mut found = Vec::new();
        collect_artifact_files(&self.root, &file_name, &mut found)?;

        match found.len() {
            0 => Err(ScriptError::FactoryResolution(name.to_string())),
            1 => Ok(found.remove(0)),
            _ => Err(ScriptError::FactoryResolution(format!(
                "{name} is ambiguous, use a fully qualified name"
            ))),
        }
    }
}

impl ArtifactSource for HardhatArtifacts {
    fn resolve(&self, name: &str) -> Result<Artifact, ScriptError> {
        let path = self.find(name)?;
        let contents = fs::read_to_string(&path)
            .map_err(|e| ScriptError::ReadFile(format!("{}: {}", path.display(), e)))?;

        Artifact::from_hardhat_json(&contents)
    }
}

/// Recursively collect files with the given name, skipping compiler outputs
fn collect_artifact_files(
    dir: &Path,
    file_name: &str,
    found: &mut Vec<PathBuf>,
) -> Result<(), ScriptError> {
    let entries = fs::read_dir(dir)
        .map_err(|e| ScriptError::ReadFile(format!("{}: {}", dir.display(), e)))?;

    for entry in entries {
        let path = entry.map_err(|e| ScriptError::ReadFile(e.to_string()))?.path();
        if path.is_dir() {
            if path.file_name().is_some_and(|n| n == BUILD_INFO_DIR) {
                continue;
            }
            collect_artifact_files(&path, file_name, found)?;
        } else if path.file_name().is_some_and(|n| n == file_name) {
            found.push(path);
        }
    }

    Ok(())
}

/// Artifacts held in memory, keyed by contract name
#[derive(Debug, Clone, Default)]
pub struct InMemoryArtifacts {
    /// The artifacts, keyed by contract name
    artifacts: HashMap<String, Artifact>,
}

impl InMemoryArtifacts {
    /// Constructor
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an artifact, replacing any with the same name
    pub fn with(mut self, artifact: Artifact) -> Self {
        self.artifacts.insert(artifact.name.clone(), artifact);
        self
    }
}

impl ArtifactSource for InMemoryArtifacts {
    fn resolve(&self, name: &str) -> Result<Artifact, ScriptError> {
        self.artifacts
            .get(name)
            .cloned()
            .ok_or_else(|| ScriptError::FactoryResolution(name.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// A solc-style placeholder for a library
    fn placeholder() -> String {
        format!("__${}$__", "ab".repeat(17))
    }

    /// Bytecode with a placeholder at byte offsets 2 and 23
    fn unlinked() -> Artifact {
        let bytecode = format!("0x6080{}60{}00", placeholder(), placeholder());
        let offsets = [LinkOffset { start: 2, length: 20 }, LinkOffset { start: 23, length: 20 }];
        Artifact::new("Registry", &bytecode).with_link_reference("src/Utils.sol", "Utils", &offsets)
    }

    #[test]
    fn test_link_substitutes_every_placeholder() {
        let utils = Address::repeat_byte(0x11);
        let libraries = BTreeMap::from([("Utils".to_string(), utils)]);

        let code = unlinked().link(&libraries).unwrap();

        assert_eq!(code.len(), 2 + 20 + 1 + 20 + 1);
        assert_eq!(&code[2..22], utils.as_slice());
        assert_eq!(&code[23..43], utils.as_slice());
        assert_eq!(code[0], 0x60);
    }

    #[test]
    fn test_link_accepts_fully_qualified_name() {
        let utils = Address::repeat_byte(0x22);
        let libraries = BTreeMap::from([("src/Utils.sol:Utils".to_string(), utils)]);

        let code = unlinked().link(&libraries).unwrap();
        assert_eq!(&code[2..22], utils.as_slice());
    }

    #[test]
    fn test_link_missing_library() {
        let err = unlinked().link(&BTreeMap::new()).unwrap_err();
        assert!(matches!(err, ScriptError::Linking(_)));
    }

    #[test]
    fn test_link_unreferenced_library() {
        let libraries = BTreeMap::from([
            ("Utils".to_string(), Address::repeat_byte(1)),
            ("Math".to_string(), Address::repeat_byte(2)),
        ]);

        let err = unlinked().link(&libraries).unwrap_err();
        assert!(matches!(err, ScriptError::Linking(msg) if msg.contains("Math")));
    }

    #[test]
    fn test_link_detects_unrecorded_placeholder() {
        let artifact = Artifact::new("Registry", &format!("6080{}", placeholder()));
        let err = artifact.link(&BTreeMap::new()).unwrap_err();
        assert!(matches!(err, ScriptError::Linking(_)));
    }

    #[test]
    fn test_unlinked_bytecode_passes_through() {
        let code = Artifact::new("Utils", "0x60806040").link(&BTreeMap::new()).unwrap();
        assert_eq!(code, Bytes::from(vec![0x60, 0x80, 0x60, 0x40]));
    }

    #[test]
    fn test_parse_hardhat_artifact() {
        let json = format!(
            r#"{{
                "_format": "hh-sol-artifact-1",
                "contractName": "Registry",
                "sourceName": "src/Registry.sol",
                "abi": [{{"type": "constructor", "inputs": [{{"name": "owner", "type": "address"}}], "stateMutability": "nonpayable"}}],
                "bytecode": "0x6080{}00",
                "deployedBytecode": "0x",
                "linkReferences": {{"src/Utils.sol": {{"Utils": [{{"start": 2, "length": 20}}]}}}},
                "deployedLinkReferences": {{}}
            }}"#,
            placeholder()
        );

        let artifact = Artifact::from_hardhat_json(&json).unwrap();
        assert_eq!(artifact.name, "Registry");
        assert_eq!(artifact.link_references().len(), 1);
        assert_eq!(artifact.link_references()[0].library, "Utils");
        assert_eq!(artifact.constructor().map(|c| c.inputs.len()), Some(1));
    }

    #[test]
    fn test_hardhat_directory_lookup() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        let contract_dir = root.join("src").join("Utils.sol");
        fs::create_dir_all(&contract_dir).unwrap();
        fs::create_dir_all(root.join(BUILD_INFO_DIR)).unwrap();
        fs::write(
            contract_dir.join("Utils.json"),
            r#"{"contractName": "Utils", "abi": [], "bytecode": "0x6080"}"#,
        )
        .unwrap();
        fs::write(contract_dir.join("Utils.dbg.json"), r#"{"buildInfo": "x"}"#).unwrap();

        let artifacts = HardhatArtifacts::new(root);
        assert_eq!(artifacts.resolve("Utils").unwrap().name, "Utils");
        assert_eq!(artifacts.resolve("src/Utils.sol:Utils").unwrap().name, "Utils");
        assert!(matches!(
            artifacts.resolve("Missing"),
            Err(ScriptError::FactoryResolution(_))
        ));
    }

    #[test]
    fn test_offset_overflow_is_a_linking_error() {
        let artifact = Artifact::new("Registry", &format!("6080{}00", placeholder()))
            .with_link_reference(
                "src/Utils.sol",
                "Utils",
                &[LinkOffset { start: usize::MAX / 2 + 1, length: 20 }],
            );
        let libraries = BTreeMap::from([("Utils".to_string(), Address::repeat_byte(1))]);

        assert!(matches!(artifact.link(&libraries), Err(ScriptError::Linking(_))));
    }
}
