//! External tool identities and the immutable toolchain configuration.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

/// Logical external tools driven by the flow.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum Tool {
    /// Creates library storage (vlib).
    Librarian,

    /// Compiles sources into a library (vlog).
    Compiler,

    /// Runs a simulation (vsim).
    Simulator,

    /// Lists the design units in a library (vdir).
    LibraryLister,

    /// Merges and reports coverage databases (vcover).
    Coverage,

    /// Synthesis shell (dc_shell).
    SynthesisShell,
}

impl Tool {
    pub const ALL: [Tool; 6] = [
        Tool::Librarian,
        Tool::Compiler,
        Tool::Simulator,
        Tool::LibraryLister,
        Tool::Coverage,
        Tool::SynthesisShell,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Tool::Librarian => "librarian",
            Tool::Compiler => "compiler",
            Tool::Simulator => "simulator",
            Tool::LibraryLister => "library_lister",
            Tool::Coverage => "coverage",
            Tool::SynthesisShell => "synthesis_shell",
        }
    }

    /// Executable name looked up on `PATH` (or under the tool directory).
    pub fn default_executable(&self) -> &'static str {
        match self {
            Tool::Librarian => "vlib",
            Tool::Compiler => "vlog",
            Tool::Simulator => "vsim",
            Tool::LibraryLister => "vdir",
            Tool::Coverage => "vcover",
            Tool::SynthesisShell => "dc_shell",
        }
    }
}

impl std::fmt::Display for Tool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Where each tool lives and which environment it runs under.
///
/// Built once when a flow starts and shared read-only afterwards.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ToolchainConfig {
    /// Directory prepended to default executable names.
    pub tool_dir: Option<PathBuf>,

    /// Per-tool executable overrides; take precedence over `tool_dir`.
    pub executables: BTreeMap<Tool, PathBuf>,

    /// Variables layered over the inherited environment of every child.
    pub env: BTreeMap<String, String>,
}

impl ToolchainConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_tool_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.tool_dir = Some(dir.into());
        self
    }

    pub fn with_executable(mut self, tool: Tool, path: impl Into<PathBuf>) -> Self {
        self.executables.insert(tool, path.into());
        self
    }

    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    /// Resolve the executable for a tool.
    pub fn executable(&self, tool: Tool) -> PathBuf {
        if let Some(path) = self.executables.get(&tool) {
            return path.clone();
        }
        match &self.tool_dir {
            Some(dir) => dir.join(tool.default_executable()),
            None => PathBuf::from(tool.default_executable()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_resolution_uses_path_lookup() {
        let config = ToolchainConfig::new();
        assert_eq!(config.executable(Tool::Simulator), PathBuf::from("vsim"));
        assert_eq!(config.executable(Tool::Coverage), PathBuf::from("vcover"));
    }

    #[test]
    fn test_tool_dir_prefix() {
        let config = ToolchainConfig::new().with_tool_dir("/opt/questasim/bin");
        assert_eq!(
            config.executable(Tool::Compiler),
            PathBuf::from("/opt/questasim/bin/vlog")
        );
    }

    #[test]
    fn test_override_beats_tool_dir() {
        let config = ToolchainConfig::new()
            .with_tool_dir("/opt/questasim/bin")
            .with_executable(Tool::SynthesisShell, "/opt/synopsys/bin/dc_shell-t");
        assert_eq!(
            config.executable(Tool::SynthesisShell),
            PathBuf::from("/opt/synopsys/bin/dc_shell-t")
        );
        assert_eq!(
            config.executable(Tool::Librarian),
            PathBuf::from("/opt/questasim/bin/vlib")
        );
    }

    #[test]
    fn test_tool_names_unique() {
        let names: std::collections::HashSet<_> = Tool::ALL.iter().map(|t| t.name()).collect();
        assert_eq!(names.len(), Tool::ALL.len());
    }
}
