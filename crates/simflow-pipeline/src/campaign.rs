//! Test campaign orchestration.
//!
//! A campaign moves through
//! `Idle → BuildingDut → BuildingSupport → Running → Reported`.
//! Either build stage may instead end in `BuildFailed`, in which case no
//! test is run. A fault that stops the simulator from starting at all while
//! running ends the campaign in `Aborted`.

use crate::coverage::CoverageAggregator;
use crate::layout::BuildLayout;
use crate::library::Library;
use crate::process::ProcessRunner;
use crate::simulator::{SimOptions, SimulationSetup, Simulator};
use chrono::Utc;
use futures::stream::{self, StreamExt, TryStreamExt};
use serde::{Deserialize, Serialize};
use simflow_domain::{
    canonical_order, CampaignResult, FlowError, Result, Target, TestRecord, TestUnit,
};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info, warn};

/// Compiler flags that instrument the design for coverage.
pub const COVERAGE_COMPILE_FLAGS: [&str; 1] = ["+cover=bcesf"];

/// Lifecycle of a campaign.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum CampaignState {
    Idle,
    BuildingDut,
    BuildingSupport,
    Running,
    Reported,
    BuildFailed,
    Aborted,
}

impl CampaignState {
    pub fn can_transition_to(self, next: CampaignState) -> bool {
        use CampaignState::*;
        matches!(
            (self, next),
            (Idle, BuildingDut)
                | (BuildingDut, BuildingSupport)
                | (BuildingDut, BuildFailed)
                | (BuildingSupport, Running)
                | (BuildingSupport, BuildFailed)
                | (Running, Reported)
                | (Running, Aborted)
        )
    }

    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            CampaignState::Reported | CampaignState::BuildFailed | CampaignState::Aborted
        )
    }
}

impl std::fmt::Display for CampaignState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            CampaignState::Idle => "idle",
            CampaignState::BuildingDut => "building_dut",
            CampaignState::BuildingSupport => "building_support",
            CampaignState::Running => "running",
            CampaignState::Reported => "reported",
            CampaignState::BuildFailed => "build_failed",
            CampaignState::Aborted => "aborted",
        };
        write!(f, "{}", s)
    }
}

/// Inputs for verifying a synthesized netlist instead of the RTL.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PostSynthesisConfig {
    /// Gate-level netlist compiled in place of the design sources.
    pub netlist: PathBuf,

    /// Timescale forced on the netlist compile (e.g. `1ns/1ps`).
    pub timescale: Option<String>,

    /// RTL models needed only for simulation (reset synchronizers, serial
    /// I/O shims). Compiled with the support sources.
    pub sim_models: Vec<PathBuf>,

    /// Cell libraries searched at elaboration.
    pub extra_libraries: Vec<String>,
}

/// Everything a campaign needs.
#[derive(Debug, Clone)]
pub struct CampaignConfig {
    /// Simulation library name.
    pub library: String,

    pub layout: BuildLayout,

    /// Design (DUT) sources, in compile order.
    pub design_sources: Vec<PathBuf>,

    /// Behavioral models and shared packages, in compile order. Test
    /// sources are compiled after them.
    pub support_sources: Vec<PathBuf>,

    /// Tests to run; normalized to canonical order.
    pub tests: Vec<TestUnit>,

    /// Set to verify a netlist instead of the RTL.
    pub post_synthesis: Option<PostSynthesisConfig>,

    /// Instrument the DUT and record coverage per test.
    pub coverage: bool,

    /// Options applied to every test.
    pub options: SimOptions,

    pub post_run_script: Option<PathBuf>,

    /// Maximum concurrent simulations.
    pub jobs: usize,

    /// Check that every test's unit exists in the library before running.
    pub validate_units: bool,
}

impl CampaignConfig {
    pub fn new(library: impl Into<String>, layout: BuildLayout) -> Self {
        Self {
            library: library.into(),
            layout,
            design_sources: Vec::new(),
            support_sources: Vec::new(),
            tests: Vec::new(),
            post_synthesis: None,
            coverage: false,
            options: SimOptions::default(),
            post_run_script: None,
            jobs: 1,
            validate_units: false,
        }
    }

    pub fn target(&self) -> Target {
        if self.post_synthesis.is_some() {
            Target::PostSynthesis
        } else {
            Target::Rtl
        }
    }

    /// Per-test options: global flags plus what the target requires.
    pub fn test_options(&self) -> SimOptions {
        let mut needs = SimOptions {
            enable_coverage_recording: self.coverage,
            ..Default::default()
        };
        if let Some(post) = &self.post_synthesis {
            needs.timing_checks_disabled = true;
            needs.extra_search_libraries = post.extra_libraries.clone();
        }
        self.options.merged_with(&needs)
    }
}

/// Drives one campaign from library build to report.
pub struct TestCampaign {
    config: CampaignConfig,
    runner: Arc<dyn ProcessRunner>,
    state: CampaignState,
}

impl TestCampaign {
    pub fn new(config: CampaignConfig, runner: Arc<dyn ProcessRunner>) -> Self {
        Self {
            config,
            runner,
            state: CampaignState::Idle,
        }
    }

    pub fn state(&self) -> CampaignState {
        self.state
    }

    pub fn config(&self) -> &CampaignConfig {
        &self.config
    }

    fn transition(&mut self, next: CampaignState) -> Result<()> {
        if !self.state.can_transition_to(next) {
            return Err(FlowError::InvalidStateTransition {
                current: self.state.to_string(),
                requested: next.to_string(),
            });
        }
        info!(from = %self.state, to = %next, "Campaign state change");
        self.state = next;
        Ok(())
    }

    /// Build the library and run every test.
    ///
    /// Build faults are returned as errors and no test runs. Per-test
    /// failures are recorded in the result and never stop the campaign.
    pub async fn run(&mut self) -> Result<CampaignResult> {
        let started_at = Utc::now();
        let tests: Vec<TestUnit> = canonical_order(self.config.tests.clone())
            .into_iter()
            .map(|u| u.retarget(self.config.target()))
            .collect();

        self.transition(CampaignState::BuildingDut)?;

        let mut library = Library::new(
            self.config.library.clone(),
            self.config.layout.sim_dir(),
            self.runner.clone(),
        );

        if let Err(e) = self.build_dut(&mut library).await {
            return self.build_failed(e);
        }

        self.transition(CampaignState::BuildingSupport)?;
        if let Err(e) = self.build_support(&mut library, &tests).await {
            return self.build_failed(e);
        }

        self.transition(CampaignState::Running)?;
        let records = match self.run_tests(&library, &tests).await {
            Ok(records) => records,
            Err(e) => {
                error!(error = %e, "Campaign aborted");
                self.transition(CampaignState::Aborted)?;
                return Err(e);
            }
        };

        self.transition(CampaignState::Reported)?;
        let result = CampaignResult::new(
            self.config.library.clone(),
            self.config.target(),
            started_at,
            records,
        );
        info!(
            run_id = %result.run_id,
            passed = result.passed(),
            total = result.total(),
            "Campaign finished"
        );
        Ok(result)
    }

    fn build_failed(&mut self, e: FlowError) -> Result<CampaignResult> {
        error!(error = %e, "Build failed, no tests attempted");
        self.transition(CampaignState::BuildFailed)?;
        Err(e)
    }

    async fn build_dut(&self, library: &mut Library) -> Result<()> {
        self.config.layout.ensure()?;
        library.open_or_initialize().await?;

        let mut flags: Vec<String> = Vec::new();
        if self.config.coverage {
            CoverageAggregator::new(self.runner.clone(), self.config.layout.coverage_dir())
                .clear()?;
            flags.extend(COVERAGE_COMPILE_FLAGS.iter().map(|f| f.to_string()));
        }

        let sources = match &self.config.post_synthesis {
            Some(post) => {
                if !post.netlist.is_file() {
                    return Err(FlowError::MissingArtifact(post.netlist.clone()));
                }
                if let Some(ts) = &post.timescale {
                    flags.push("-timescale".to_string());
                    flags.push(ts.clone());
                }
                vec![post.netlist.clone()]
            }
            None => self.config.design_sources.clone(),
        };

        library.compile(&sources, &flags).await
    }

    async fn build_support(&self, library: &mut Library, tests: &[TestUnit]) -> Result<()> {
        let mut sources = Vec::new();
        if let Some(post) = &self.config.post_synthesis {
            sources.extend(post.sim_models.iter().cloned());
        }
        sources.extend(self.config.support_sources.iter().cloned());
        for test in tests {
            let source = test.source().to_path_buf();
            if !sources.contains(&source) {
                sources.push(source);
            }
        }

        library.compile(&sources, &[]).await?;

        if self.config.validate_units {
            let units = library.units().await?;
            for test in tests {
                if !units.contains(&test.name().to_ascii_lowercase()) {
                    return Err(FlowError::UnknownTopLevel {
                        unit: test.name().to_string(),
                        library: library.name().to_string(),
                        source_path: test.source().to_path_buf(),
                    });
                }
            }
        }
        Ok(())
    }

    /// Results come back in `tests` order regardless of completion order.
    /// The first fault stops scheduling further tests.
    async fn run_tests(&self, library: &Library, tests: &[TestUnit]) -> Result<Vec<TestRecord>> {
        let setup = SimulationSetup {
            output_dir: self.config.layout.sim_dir(),
            coverage_dir: self.config.layout.coverage_dir(),
            post_run_script: self.config.post_run_script.clone(),
        };
        let setup = &setup;

        stream::iter(tests)
            .map(|unit| {
                Ok::<_, FlowError>(async move {
                    info!(test = %unit, "Running test");
                    let options = self.config.test_options();
                    let start = Instant::now();
                    let outcome = Simulator::new(library, unit.name(), setup)
                        .run(&options)
                        .await?;
                    if !outcome.is_passed() {
                        warn!(test = %unit, outcome = %outcome, "Test failed");
                    }
                    Ok::<_, FlowError>(TestRecord {
                        unit: unit.clone(),
                        outcome,
                        duration_ms: start.elapsed().as_millis() as u64,
                    })
                })
            })
            .try_buffered(self.config.jobs.max(1))
            .try_collect()
            .await
    }
}
