//! Import-path remapping for Solidity sources
//!
//! A remappings file holds one `from=to` rule per line. Rules apply to import
//! lines only, and the first rule whose prefix occurs in a line wins.

use std::{fs, path::Path};

use crate::errors::ScriptError;

/// A single `from=to` rule
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Remapping {
    /// The path fragment to replace
    pub from: String,
    /// Its replacement
    pub to: String,
}

/// An ordered set of remapping rules
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Remappings {
    /// The rules, in priority order
    rules: Vec<Remapping>,
}

impl Remappings {
    /// Parse the contents of a remappings file
    pub fn parse(contents: &str) -> Result<Self, ScriptError> {
        let rules = contents
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(|line| {
                let (from, to) = line.split_once('=').ok_or_else(|| {
                    ScriptError::Configuration(format!("malformed remapping `{line}`"))
                })?;
                Ok(Remapping { from: from.to_string(), to: to.to_string() })
            })
            .collect::<Result<Vec<_>, ScriptError>>()?;

        Ok(Self { rules })
    }

    /// Read a remappings file
    pub fn from_file(path: &Path) -> Result<Self, ScriptError> {
        let contents = fs::read_to_string(path)
            .map_err(|e| ScriptError::ReadFile(format!("{}: {}", path.display(), e)))?;
        Self::parse(&contents)
    }

    /// The rules, in priority order
    pub fn rules(&self) -> &[Remapping] {
        &self.rules
    }

    /// Rewrite a single source line
    pub fn apply_to_line(&self, line: &str) -> String {
        if !is_import_path_line(line) {
            return line.to_string();
        }

        match self.rules.iter().find(|r| line.contains(&r.from)) {
            Some(rule) => line.replacen(&rule.from, &rule.to, 1),
            None => line.to_string(),
        }
    }

    /// Rewrite every line of a source file
    pub fn apply(&self, source: &str) -> String {
        source
            .split('\n')
            .map(|line| self.apply_to_line(line))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Whether the line ends in a quoted `.sol` path, e.g. `import "a/B.sol";`
fn is_import_path_line(line: &str) -> bool {
    let Some(rest) = line.strip_suffix("sol\";") else {
        return false;
    };
    rest.find('"').is_some_and(|quote| quote + 1 < rest.len())
}

#[cfg(test)]
mod tests {
    use super::*;

    const REMAPPINGS: &str = "\n@openzeppelin/=lib/openzeppelin-contracts/\n@openzeppelin/contracts/=unused/\n\nforge-std/=lib/forge-std/src/\n";

    #[test]
    fn test_parse_skips_blank_lines() {
        let remappings = Remappings::parse(REMAPPINGS).unwrap();
        assert_eq!(remappings.rules().len(), 3);
        assert_eq!(remappings.rules()[2].to, "lib/forge-std/src/");
    }

    #[test]
    fn test_malformed_rule() {
        assert!(Remappings::parse("no-equals-sign").is_err());
    }

    #[test]
    fn test_first_matching_rule_wins() {
        let remappings = Remappings::parse(REMAPPINGS).unwrap();
        let line = r#"import "@openzeppelin/contracts/proxy/Proxy.sol";"#;

        assert_eq!(
            remappings.apply_to_line(line),
            r#"import "lib/openzeppelin-contracts/contracts/proxy/Proxy.sol";"#
        );
    }

    #[test]
    fn test_only_import_lines_are_rewritten() {
        let remappings = Remappings::parse(REMAPPINGS).unwrap();
        let source = "// see @openzeppelin/ docs\nimport {Test} from \"forge-std/Test.sol\";\nuint x;";

        assert_eq!(
            remappings.apply(source),
            "// see @openzeppelin/ docs\nimport {Test} from \"lib/forge-std/src/Test.sol\";\nuint x;"
        );
    }
}
