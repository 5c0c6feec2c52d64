//! Coverage database merging and reporting.

use crate::process::{Invocation, ProcessRunner};
use crate::toolchain::Tool;
use simflow_domain::{FlowError, Result};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// File name of the merged database inside the coverage directory.
pub const MERGED_DATABASE: &str = "merged.ucdb";

const DATABASE_EXTENSION: &str = "ucdb";

pub struct CoverageAggregator {
    runner: Arc<dyn ProcessRunner>,
    coverage_dir: PathBuf,
}

impl CoverageAggregator {
    pub fn new(runner: Arc<dyn ProcessRunner>, coverage_dir: impl Into<PathBuf>) -> Self {
        Self {
            runner,
            coverage_dir: coverage_dir.into(),
        }
    }

    pub fn coverage_dir(&self) -> &Path {
        &self.coverage_dir
    }

    pub fn merged_path(&self) -> PathBuf {
        self.coverage_dir.join(MERGED_DATABASE)
    }

    /// Per-test databases in the coverage directory, sorted. A previous
    /// merge output is not included.
    pub fn collect(&self) -> Result<Vec<PathBuf>> {
        if !self.coverage_dir.is_dir() {
            return Err(FlowError::MissingDirectory(self.coverage_dir.clone()));
        }

        let mut databases = Vec::new();
        for entry in std::fs::read_dir(&self.coverage_dir)? {
            let path = entry?.path();
            let extension = path.extension().and_then(|e| e.to_str());
            let is_database = extension == Some(DATABASE_EXTENSION);
            let is_merged = path.file_name().and_then(|n| n.to_str()) == Some(MERGED_DATABASE);
            if path.is_file() && is_database && !is_merged {
                databases.push(path);
            }
        }
        databases.sort();
        Ok(databases)
    }

    /// Remove every database, the merge output included, so a new campaign
    /// does not pick up runs from an earlier one.
    pub fn clear(&self) -> Result<usize> {
        if !self.coverage_dir.is_dir() {
            return Ok(0);
        }
        let mut stale = self.collect()?;
        let merged = self.merged_path();
        if merged.is_file() {
            stale.push(merged);
        }
        for path in &stale {
            std::fs::remove_file(path)?;
        }
        if !stale.is_empty() {
            debug!(
                removed = stale.len(),
                dir = %self.coverage_dir.display(),
                "Cleared coverage"
            );
        }
        Ok(stale.len())
    }

    /// Merge `databases` into [`MERGED_DATABASE`].
    ///
    /// Inputs are sorted and de-duplicated first, so any permutation of the
    /// same set produces the same command line.
    pub async fn merge(&self, databases: &[PathBuf]) -> Result<PathBuf> {
        let inputs: BTreeSet<&PathBuf> = databases.iter().collect();
        if inputs.is_empty() {
            return Err(FlowError::NoCoverageData);
        }

        let merged = self.merged_path();
        info!(inputs = inputs.len(), merged = %merged.display(), "Merging coverage");

        let mut invocation = Invocation::new(Tool::Coverage, &self.coverage_dir)
            .arg("merge")
            .arg("-out")
            .path_arg(&merged);
        for db in inputs {
            invocation = invocation.path_arg(db);
        }

        self.run_stage("merge", &invocation).await?;
        Ok(merged)
    }

    /// Render an HTML report of `merged` into `output_dir`.
    pub async fn report(&self, merged: &Path, output_dir: &Path) -> Result<PathBuf> {
        if !merged.is_file() {
            return Err(FlowError::MissingArtifact(merged.to_path_buf()));
        }
        std::fs::create_dir_all(output_dir)?;

        info!(report = %output_dir.display(), "Rendering coverage report");

        let invocation = Invocation::new(Tool::Coverage, &self.coverage_dir)
            .arg("report")
            .arg("-html")
            .arg("-output")
            .path_arg(output_dir)
            .path_arg(merged);

        self.run_stage("report", &invocation).await?;
        Ok(output_dir.to_path_buf())
    }

    async fn run_stage(&self, stage: &str, invocation: &Invocation) -> Result<()> {
        let output = self.runner.execute(invocation).await?;
        if !output.success() {
            warn!(stage, exit_code = output.exit_code, "Coverage tool failed");
            return Err(FlowError::CoverageTool {
                stage: stage.to_string(),
                exit_code: output.exit_code,
                output: output.combined(),
            });
        }
        Ok(())
    }
}
