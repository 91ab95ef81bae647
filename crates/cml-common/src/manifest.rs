use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use serde::Deserialize;

pub const MANIFEST_FILE: &str = "Cml.toml";

/// How the two branches of a ternary expression are checked.
///
/// Earlier revisions of the language disagreed here, so both rules are kept
/// and the choice is left to the project.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TernaryPolicy {
    /// Both branches must themselves be Boolean; the result is Boolean.
    #[default]
    Boolean,
    /// Branches must be compatible with each other; the result is the type
    /// of the `then` branch, or of the `else` branch when `then` is `null`.
    Matching,
}

impl std::str::FromStr for TernaryPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "boolean" => Ok(TernaryPolicy::Boolean),
            "matching" => Ok(TernaryPolicy::Matching),
            other => Err(format!(
                "unknown ternary policy '{}' (expected 'boolean' or 'matching')",
                other
            )),
        }
    }
}

/// Independently switchable groups of checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckGroup {
    Aggregate,
    Entity,
    AntiCorruption,
    ContextMap,
    Constructor,
    Operation,
    Invariant,
    Uniqueness,
}

/// Analyzer settings, from the `[analysis]` table of `Cml.toml`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AnalyzerConfig {
    #[serde(default)]
    pub ternary_branches: TernaryPolicy,
    #[serde(default)]
    pub parallel: bool,
    #[serde(default)]
    pub skip: BTreeSet<CheckGroup>,
}

impl AnalyzerConfig {
    pub fn enabled(&self, group: CheckGroup) -> bool {
        !self.skip.contains(&group)
    }
}

/// The parsed Cml.toml manifest.
#[derive(Debug, Clone)]
pub struct CmlManifest {
    pub analysis: AnalyzerConfig,
    /// The directory containing the Cml.toml file.
    pub root_dir: PathBuf,
}

/// Raw TOML structure for deserialization.
#[derive(Deserialize)]
struct RawManifest {
    #[serde(default)]
    analysis: AnalyzerConfig,
}

/// Errors that can occur when loading a manifest.
#[derive(Debug, thiserror::Error)]
pub enum ManifestError {
    #[error("no Cml.toml found (searched from {0})")]
    NotFound(String),
    #[error("failed to read Cml.toml: {0}")]
    ReadError(#[from] std::io::Error),
    #[error("invalid Cml.toml: {0}")]
    ParseError(String),
}

/// Walk up from `start_dir` looking for `Cml.toml`.
pub fn find_manifest(start_dir: &Path) -> Option<PathBuf> {
    let mut current = start_dir.to_path_buf();
    loop {
        let candidate = current.join(MANIFEST_FILE);
        if candidate.is_file() {
            return Some(candidate);
        }
        if !current.pop() {
            return None;
        }
    }
}

/// Load a Cml.toml manifest from a file path.
pub fn load_manifest(path: &Path) -> Result<CmlManifest, ManifestError> {
    let content = std::fs::read_to_string(path)?;
    let root_dir = path
        .parent()
        .unwrap_or_else(|| Path::new("."))
        .to_path_buf();
    parse_manifest(&content, root_dir)
}

/// Parse a Cml.toml manifest from a string.
pub fn parse_manifest(content: &str, root_dir: PathBuf) -> Result<CmlManifest, ManifestError> {
    let raw: RawManifest =
        toml::from_str(content).map_err(|e| ManifestError::ParseError(e.to_string()))?;
    Ok(CmlManifest {
        analysis: raw.analysis,
        root_dir,
    })
}

/// Find and load the manifest starting from a model file's directory.
pub fn find_and_load_manifest(model_file: &Path) -> Result<CmlManifest, ManifestError> {
    let start_dir = model_file.parent().unwrap_or_else(|| Path::new("."));
    let manifest_path = find_manifest(start_dir)
        .ok_or_else(|| ManifestError::NotFound(start_dir.display().to_string()))?;
    load_manifest(&manifest_path)
}
