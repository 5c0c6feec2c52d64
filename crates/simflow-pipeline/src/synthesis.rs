//! Synthesis script rendering and invocation.

use crate::process::{Invocation, ProcessRunner};
use crate::toolchain::Tool;
use simflow_domain::{render, FlowError, Result, SynthesisManifest};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{error, info};

/// Transcript of the synthesis shell, written next to the reports.
pub const SYNTHESIS_LOG: &str = "synth.log";

/// Outcome of a successful synthesis run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SynthesisRun {
    pub script_path: PathBuf,
    pub log_path: PathBuf,
    pub netlist_path: PathBuf,
    pub duration_ms: u64,
}

pub struct SynthesisJob {
    runner: Arc<dyn ProcessRunner>,
    manifest: SynthesisManifest,
    work_dir: PathBuf,
}

impl SynthesisJob {
    pub fn new(
        runner: Arc<dyn ProcessRunner>,
        manifest: SynthesisManifest,
        work_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            runner,
            manifest,
            work_dir: work_dir.into(),
        }
    }

    pub fn manifest(&self) -> &SynthesisManifest {
        &self.manifest
    }

    pub fn work_dir(&self) -> &Path {
        &self.work_dir
    }

    pub fn render(&self, template: &str) -> Result<String> {
        render(template, &self.manifest)
    }

    /// Write `script` and run the synthesis shell on it. Any nonzero exit
    /// fails the job; there is no partial success.
    pub async fn invoke(&self, script: &str) -> Result<SynthesisRun> {
        if let Some(parent) = self.manifest.script_path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::create_dir_all(&self.manifest.reports_dir).await?;
        tokio::fs::create_dir_all(&self.work_dir).await?;
        tokio::fs::write(&self.manifest.script_path, script).await?;

        info!(
            top = %self.manifest.top,
            script = %self.manifest.script_path.display(),
            "Running synthesis"
        );

        let invocation = Invocation::new(Tool::SynthesisShell, &self.work_dir)
            .arg("-f")
            .path_arg(&self.manifest.script_path);
        let output = self.runner.execute(&invocation).await?;

        let log_path = self.manifest.reports_dir.join(SYNTHESIS_LOG);
        tokio::fs::write(&log_path, output.combined()).await?;

        if !output.success() {
            error!(exit_code = output.exit_code, log = %log_path.display(), "Synthesis failed");
            return Err(FlowError::Synthesis {
                exit_code: output.exit_code,
                output: output.combined(),
            });
        }

        Ok(SynthesisRun {
            script_path: self.manifest.script_path.clone(),
            log_path,
            netlist_path: self.manifest.netlist_path.clone(),
            duration_ms: output.duration_ms,
        })
    }

    /// Render `template` and invoke the result.
    pub async fn run(&self, template: &str) -> Result<SynthesisRun> {
        let script = self.render(template)?;
        self.invoke(&script).await
    }

    /// Files in the reports directory, sorted.
    pub fn collect_reports(&self) -> Result<Vec<PathBuf>> {
        let dir = &self.manifest.reports_dir;
        if !dir.is_dir() {
            return Err(FlowError::MissingDirectory(dir.clone()));
        }
        let mut reports = Vec::new();
        for entry in std::fs::read_dir(dir)? {
            let path = entry?.path();
            if path.is_file() {
                reports.push(path);
            }
        }
        reports.sort();
        Ok(reports)
    }
}
