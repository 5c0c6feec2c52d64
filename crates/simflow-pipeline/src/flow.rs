//! Full build flow: RTL campaign, synthesis, post-synthesis campaign,
//! packaging.

use crate::campaign::{CampaignConfig, PostSynthesisConfig, TestCampaign};
use crate::package::{package, PackageManifest};
use crate::process::ProcessRunner;
use crate::synthesis::{SynthesisJob, SynthesisRun};
use simflow_domain::{CampaignResult, Result, SynthesisManifest};
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};

/// Suffix of the library the netlist is simulated from, so the RTL library
/// is left intact.
pub const POST_SYNTHESIS_LIBRARY_SUFFIX: &str = "_syn";

/// Synthesis stage of a flow.
#[derive(Debug, Clone)]
pub struct SynthesisPlan {
    pub manifest: SynthesisManifest,

    /// Script template rendered against `manifest`.
    pub template: String,

    /// Post-synthesis campaign settings. The netlist path is taken from the
    /// manifest.
    pub post_synthesis: PostSynthesisConfig,

    /// Re-run the tests against the netlist.
    pub verify_netlist: bool,

    /// Copy the netlist and reports into the package directory.
    pub package: bool,
}

#[derive(Debug, Clone)]
pub struct FlowConfig {
    /// RTL campaign. The post-synthesis campaign is derived from it.
    pub campaign: CampaignConfig,

    pub synthesis: Option<SynthesisPlan>,

    /// Carry on to the next stage even when a campaign has failing tests.
    pub continue_on_test_failure: bool,
}

/// What each stage of a flow produced.
#[derive(Debug, Clone)]
pub struct FlowReport {
    pub rtl: CampaignResult,
    pub synthesis: Option<SynthesisRun>,
    pub post_synthesis: Option<CampaignResult>,
    pub package: Option<PackageManifest>,

    /// A failing campaign kept later stages from running.
    pub stopped_early: bool,

    pub duration_ms: u64,
}

impl FlowReport {
    /// Every campaign passed and no stage was skipped because of it.
    pub fn success(&self) -> bool {
        !self.stopped_early
            && self.rtl.all_passed()
            && self
                .post_synthesis
                .as_ref()
                .map(|r| r.all_passed())
                .unwrap_or(true)
    }

    pub fn campaigns(&self) -> Vec<&CampaignResult> {
        std::iter::once(&self.rtl)
            .chain(self.post_synthesis.as_ref())
            .collect()
    }
}

pub struct Flow {
    config: FlowConfig,
    runner: Arc<dyn ProcessRunner>,
}

impl Flow {
    pub fn new(config: FlowConfig, runner: Arc<dyn ProcessRunner>) -> Self {
        Self { config, runner }
    }

    /// Campaign settings for re-verifying the netlist of `plan`.
    pub fn post_synthesis_campaign(&self, plan: &SynthesisPlan) -> CampaignConfig {
        let mut config = self.config.campaign.clone();
        config.library = format!("{}{}", config.library, POST_SYNTHESIS_LIBRARY_SUFFIX);
        config.post_synthesis = Some(PostSynthesisConfig {
            netlist: plan.manifest.netlist_path.clone(),
            ..plan.post_synthesis.clone()
        });
        // Gate-level coverage would overwrite the RTL databases.
        config.coverage = false;
        config
    }

    /// Run every stage in order. Build faults and synthesis failures are
    /// errors; failing tests stop the flow unless
    /// `continue_on_test_failure` is set.
    pub async fn run(&self) -> Result<FlowReport> {
        let start = Instant::now();
        info!(library = %self.config.campaign.library, "Starting flow");

        let rtl = TestCampaign::new(self.config.campaign.clone(), self.runner.clone())
            .run()
            .await?;

        let mut report = FlowReport {
            rtl,
            synthesis: None,
            post_synthesis: None,
            package: None,
            stopped_early: false,
            duration_ms: 0,
        };

        let Some(plan) = &self.config.synthesis else {
            report.duration_ms = start.elapsed().as_millis() as u64;
            return Ok(report);
        };

        if !self.may_proceed(&report.rtl) {
            report.stopped_early = true;
            report.duration_ms = start.elapsed().as_millis() as u64;
            return Ok(report);
        }

        let job = SynthesisJob::new(
            self.runner.clone(),
            plan.manifest.clone(),
            self.config.campaign.layout.synth_dir(),
        );
        report.synthesis = Some(job.run(&plan.template).await?);

        if plan.verify_netlist {
            let post = TestCampaign::new(self.post_synthesis_campaign(plan), self.runner.clone())
                .run()
                .await?;
            let proceed = self.may_proceed(&post);
            report.post_synthesis = Some(post);
            if !proceed {
                report.stopped_early = true;
                report.duration_ms = start.elapsed().as_millis() as u64;
                return Ok(report);
            }
        }

        if plan.package {
            let reports = job.collect_reports()?;
            report.package = Some(package(
                &self.config.campaign.layout.package_dir(),
                &plan.manifest,
                &reports,
            )?);
        }

        report.duration_ms = start.elapsed().as_millis() as u64;
        info!(
            success = report.success(),
            duration_ms = report.duration_ms,
            "Flow finished"
        );
        Ok(report)
    }

    fn may_proceed(&self, result: &CampaignResult) -> bool {
        if result.all_passed() {
            return true;
        }
        if self.config.continue_on_test_failure {
            warn!(failed = result.failed(), "Continuing despite failing tests");
            true
        } else {
            warn!(
                failed = result.failed(),
                target = %result.target,
                "Stopping flow: campaign has failing tests"
            );
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fakes::ScriptedProcessRunner;
    use crate::layout::BuildLayout;
    use std::path::PathBuf;

    #[test]
    fn test_post_synthesis_campaign_uses_separate_library() {
        let mut campaign = CampaignConfig::new("work", BuildLayout::new("build"));
        campaign.coverage = true;
        let plan = SynthesisPlan {
            manifest: SynthesisManifest::new(
                "uart",
                vec![],
                PathBuf::from("build/synth/uart.dc"),
                PathBuf::from("build/synth/reports"),
                PathBuf::from("build/synth/uart.vg"),
            ),
            template: String::new(),
            post_synthesis: PostSynthesisConfig {
                timescale: Some("1ns/1ps".to_string()),
                ..Default::default()
            },
            verify_netlist: true,
            package: false,
        };
        let flow = Flow::new(
            FlowConfig {
                campaign,
                synthesis: Some(plan.clone()),
                continue_on_test_failure: false,
            },
            Arc::new(ScriptedProcessRunner::new()),
        );

        let post = flow.post_synthesis_campaign(&plan);
        assert_eq!(post.library, "work_syn");
        assert!(!post.coverage);
        let syn = post.post_synthesis.unwrap();
        assert_eq!(syn.netlist, PathBuf::from("build/synth/uart.vg"));
        assert_eq!(syn.timescale.as_deref(), Some("1ns/1ps"));
    }
}
