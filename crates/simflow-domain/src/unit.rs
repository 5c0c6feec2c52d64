//! Test units discovered from testbench sources.

use crate::error::{FlowError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Which representation of the design a test exercises.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "snake_case")]
pub enum Target {
    /// The RTL design sources.
    #[default]
    Rtl,
    /// The gate-level netlist produced by synthesis.
    PostSynthesis,
}

impl std::fmt::Display for Target {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Target::Rtl => write!(f, "rtl"),
            Target::PostSynthesis => write!(f, "post_synthesis"),
        }
    }
}

/// A single simulation test.
///
/// The unit name is the source file's stem and is expected to match the
/// top-level module the file declares.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct TestUnit {
    name: String,
    source: PathBuf,
    target: Target,
}

impl TestUnit {
    /// Derive a test unit from its source path.
    pub fn from_path(source: impl Into<PathBuf>, target: Target) -> Result<Self> {
        let source = source.into();
        let stem = source
            .file_stem()
            .and_then(|s| s.to_str())
            .ok_or_else(|| FlowError::InvalidTestUnit {
                path: source.clone(),
                reason: "file name is not valid UTF-8".to_string(),
            })?;

        if !is_identifier(stem) {
            return Err(FlowError::InvalidTestUnit {
                path: source.clone(),
                reason: format!("{:?} is not a legal top-level unit name", stem),
            });
        }

        Ok(Self {
            name: stem.to_string(),
            source,
            target,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn source(&self) -> &Path {
        &self.source
    }

    pub fn target(&self) -> Target {
        self.target
    }

    /// Same source, retargeted (e.g. re-verifying against a netlist).
    pub fn retarget(&self, target: Target) -> Self {
        Self {
            target,
            ..self.clone()
        }
    }
}

impl std::fmt::Display for TestUnit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name)
    }
}

/// Sort units into the canonical campaign order (lexicographic by source
/// path) and drop duplicate sources.
pub fn canonical_order(mut units: Vec<TestUnit>) -> Vec<TestUnit> {
    units.sort_by(|a, b| a.source.cmp(&b.source));
    units.dedup_by(|a, b| a.source == b.source);
    units
}

/// Legal (non-escaped) Verilog/SystemVerilog identifier.
fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '$')
}
