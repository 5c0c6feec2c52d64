//! Simulator invocation and outcome classification.

use crate::library::Library;
use crate::process::Invocation;
use crate::toolchain::Tool;
use serde::{Deserialize, Serialize};
use simflow_domain::{classify, FlowError, Result, SimulationOutcome};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Post-run directives used when no post-run script is configured.
const DEFAULT_POST_RUN: &str = "run -all; quit -f";

/// Per-run simulator options.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct SimOptions {
    /// Log every signal in the design.
    pub dump_all_signals: bool,

    /// Write a VCD covering the whole hierarchy.
    pub generate_waveform: bool,

    /// Record coverage into a per-test database.
    pub enable_coverage_recording: bool,

    /// Suppress setup/hold timing checks.
    pub timing_checks_disabled: bool,

    /// Extra libraries searched at elaboration (gate-level cell libraries).
    pub extra_search_libraries: Vec<String>,

    /// Wall-clock budget per run.
    pub timeout_secs: Option<u64>,
}

impl SimOptions {
    /// Layer `extra` over these options: flags are OR-ed, libraries
    /// appended without duplicates, and the tighter timeout kept.
    pub fn merged_with(&self, extra: &SimOptions) -> SimOptions {
        let mut libraries = self.extra_search_libraries.clone();
        for lib in &extra.extra_search_libraries {
            if !libraries.contains(lib) {
                libraries.push(lib.clone());
            }
        }

        let timeout_secs = match (self.timeout_secs, extra.timeout_secs) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        };

        SimOptions {
            dump_all_signals: self.dump_all_signals || extra.dump_all_signals,
            generate_waveform: self.generate_waveform || extra.generate_waveform,
            enable_coverage_recording: self.enable_coverage_recording
                || extra.enable_coverage_recording,
            timing_checks_disabled: self.timing_checks_disabled || extra.timing_checks_disabled,
            extra_search_libraries: libraries,
            timeout_secs,
        }
    }
}

/// Directories and scripts shared by every run of a campaign.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SimulationSetup {
    /// Working directory of the simulator; must already exist.
    pub output_dir: PathBuf,

    /// Where per-test coverage databases are saved.
    pub coverage_dir: PathBuf,

    /// Script sourced after the option directives.
    pub post_run_script: Option<PathBuf>,
}

impl SimulationSetup {
    /// Coverage database written by a run of `top`.
    pub fn coverage_database(&self, top: &str) -> PathBuf {
        self.coverage_dir.join(format!("{}.ucdb", top))
    }
}

/// A top-level unit bound to the library it was compiled into.
pub struct Simulator<'a> {
    library: &'a Library,
    top: String,
    setup: &'a SimulationSetup,
}

impl<'a> Simulator<'a> {
    pub fn new(library: &'a Library, top: impl Into<String>, setup: &'a SimulationSetup) -> Self {
        Self {
            library,
            top: top.into(),
            setup,
        }
    }

    /// `{library}.{top}` as passed to the simulator.
    pub fn qualified_name(&self) -> String {
        format!("{}.{}", self.library.name(), self.top)
    }

    /// Option directives followed by the post-run script.
    pub fn command_script(&self, options: &SimOptions) -> String {
        let mut directives: Vec<String> = Vec::new();

        if options.dump_all_signals {
            directives.push("log -r /*".to_string());
        }
        if options.generate_waveform {
            directives.push(format!("vcd file {}.vcd", self.top));
            directives.push("vcd add -r /*".to_string());
        }
        if options.enable_coverage_recording {
            directives.push(format!(
                "coverage save -onexit {}",
                self.setup.coverage_database(&self.top).display()
            ));
        }

        match &self.setup.post_run_script {
            Some(script) => directives.push(format!("do {}", script.display())),
            None => directives.push(DEFAULT_POST_RUN.to_string()),
        }

        directives.join("; ")
    }

    /// Full simulator argument list.
    pub fn arguments(&self, options: &SimOptions) -> Vec<String> {
        let mut args = vec![
            "-batch".to_string(),
            "-do".to_string(),
            self.command_script(options),
        ];

        if options.enable_coverage_recording {
            args.push("-coverage".to_string());
        }
        if options.timing_checks_disabled {
            args.push("+notimingchecks".to_string());
        }
        for lib in &options.extra_search_libraries {
            args.push("-L".to_string());
            args.push(lib.clone());
        }

        args.push(self.qualified_name());
        args
    }

    /// Run the unit once. Every completed run yields exactly one outcome;
    /// only a failure to start the simulator is an error.
    pub async fn run(&self, options: &SimOptions) -> Result<SimulationOutcome> {
        if !self.setup.output_dir.is_dir() {
            return Err(FlowError::MissingDirectory(self.setup.output_dir.clone()));
        }

        let invocation = Invocation::new(Tool::Simulator, &self.setup.output_dir)
            .args(self.arguments(options))
            .timeout(options.timeout_secs.map(Duration::from_secs));

        debug!(unit = %self.qualified_name(), args = ?invocation.args, "Starting simulation");

        let outcome = match self.library.runner().execute(&invocation).await {
            Ok(output) => classify(output.exit_code),
            Err(FlowError::Timeout { limit_secs, .. }) => {
                SimulationOutcome::TimedOut { limit_secs }
            }
            Err(e) => return Err(e),
        };

        if outcome.is_passed() {
            info!(unit = %self.qualified_name(), "Simulation passed");
        } else {
            warn!(unit = %self.qualified_name(), outcome = %outcome, "Simulation did not pass");
        }
        Ok(outcome)
    }
}
