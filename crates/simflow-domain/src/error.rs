//! Error types for build and verification flows

use std::path::PathBuf;
use thiserror::Error;

/// Faults raised by the flow. Classifiable simulator results are not errors;
/// they are reported as [`crate::SimulationOutcome`] values.
#[derive(Error, Debug)]
pub enum FlowError {
    #[error("failed to start {tool} ({executable}): {source}")]
    Spawn {
        tool: String,
        executable: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{tool} timed out after {limit_secs}s")]
    Timeout { tool: String, limit_secs: u64 },

    #[error("failed to create library {library}:\n{output}")]
    LibraryInit { library: String, output: String },

    #[error("library {0} has not been initialized")]
    LibraryNotInitialized(String),

    #[error("compilation into library {library} failed:\n{output}")]
    Compile { library: String, output: String },

    #[error("top-level unit {unit} not found in library {library} (derived from {source_path:?})")]
    UnknownTopLevel {
        unit: String,
        library: String,
        source_path: PathBuf,
    },

    #[error("no coverage databases to merge")]
    NoCoverageData,

    #[error("coverage {stage} failed with exit code {exit_code}:\n{output}")]
    CoverageTool {
        stage: String,
        exit_code: i32,
        output: String,
    },

    #[error("synthesis failed with exit code {exit_code}:\n{output}")]
    Synthesis { exit_code: i32, output: String },

    #[error("template error: {0}")]
    Template(String),

    #[error("invalid test unit {path:?}: {reason}")]
    InvalidTestUnit { path: PathBuf, reason: String },

    #[error("invalid campaign state transition: {current} -> {requested}")]
    InvalidStateTransition { current: String, requested: String },

    #[error("directory does not exist: {0:?}")]
    MissingDirectory(PathBuf),

    #[error("missing artifact: {0:?}")]
    MissingArtifact(PathBuf),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl FlowError {
    /// Whether this error happened while building the simulation library,
    /// i.e. before any test could run.
    pub fn is_build_fault(&self) -> bool {
        matches!(
            self,
            FlowError::LibraryInit { .. }
                | FlowError::LibraryNotInitialized(_)
                | FlowError::Compile { .. }
                | FlowError::UnknownTopLevel { .. }
        )
    }
}

/// Result type for flow operations
pub type Result<T> = std::result::Result<T, FlowError>;
