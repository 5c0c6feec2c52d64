//! simflow - build and verification flow for HDL projects
//!
//! The `simflow` command drives the HDL toolchain for a project.
//!
//! ## Commands
//!
//! - `testall`: build the simulation library and run every testbench
//! - `synth`: render the synthesis script and run the synthesis shell
//! - `coverage`: merge per-test coverage and render the HTML report
//! - `package`: collect the netlist and synthesis reports
//! - `flow`: all of the above in order
//! - `clean`: remove the build directory

mod config;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use simflow_domain::{CampaignResult, FlowError, Target};
use simflow_pipeline::flow::POST_SYNTHESIS_LIBRARY_SUFFIX;
use simflow_pipeline::{
    package, render_summary, write_campaign_json, BuildLayout, CoverageAggregator, Flow,
    FlowConfig, ProcessRunner, SimOptions, SynthesisJob, SystemProcessRunner, TestCampaign,
};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, Level};

use config::{Project, DEFAULT_CONFIG_FILE};

#[derive(Parser)]
#[command(name = "simflow")]
#[command(author = "Stevedores Org")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Build and verification flow for HDL projects", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long, global = true)]
    json: bool,

    /// Project file (default: simflow.toml in the current directory)
    #[arg(short, long, global = true, env = "SIMFLOW_CONFIG")]
    config: Option<PathBuf>,

    /// Build directory, overriding [project] build_dir
    #[arg(long, global = true, env = "SIMFLOW_BUILD_DIR")]
    build_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args, Debug, Clone, Default)]
struct SimArgs {
    /// Instrument the design and record coverage
    #[arg(long)]
    coverage: bool,

    /// Write a VCD for each test
    #[arg(long)]
    waves: bool,

    /// Log every signal
    #[arg(long)]
    log_all: bool,

    /// Maximum concurrent simulations
    #[arg(short, long)]
    jobs: Option<usize>,

    /// Per-test wall-clock limit in seconds
    #[arg(long)]
    timeout_secs: Option<u64>,
}

#[derive(Subcommand)]
enum Commands {
    /// Build the simulation library and run every testbench
    Testall {
        #[command(flatten)]
        sim: SimArgs,

        /// Verify the synthesized netlist instead of the RTL
        #[arg(long)]
        post_synth: bool,
    },

    /// Render the synthesis script and run synthesis
    Synth,

    /// Merge coverage databases and render the HTML report
    Coverage,

    /// Package the netlist and synthesis reports
    Package,

    /// RTL tests, synthesis, netlist tests and packaging in one go
    Flow {
        #[command(flatten)]
        sim: SimArgs,

        /// Keep going when a campaign has failing tests
        #[arg(long)]
        continue_on_failure: bool,

        /// Skip re-running the tests against the netlist
        #[arg(long)]
        no_verify_netlist: bool,
    },

    /// Remove the build directory
    Clean,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup logging
    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    simflow_pipeline::init_tracing(cli.json, level);

    let required = cli.config.is_some();
    let config_path = cli
        .config
        .clone()
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE));
    let project = Project::open(&config_path, required, cli.build_dir.clone())
        .context("Failed to load project")?;

    match cli.command {
        Commands::Testall { sim, post_synth } => cmd_testall(&project, &sim, post_synth).await,
        Commands::Synth => cmd_synth(&project).await,
        Commands::Coverage => cmd_coverage(&project).await,
        Commands::Package => cmd_package(&project),
        Commands::Flow {
            sim,
            continue_on_failure,
            no_verify_netlist,
        } => cmd_flow(&project, &sim, continue_on_failure, !no_verify_netlist).await,
        Commands::Clean => cmd_clean(&project),
    }
}

fn runner(project: &Project) -> Arc<dyn ProcessRunner> {
    Arc::new(SystemProcessRunner::new(Arc::new(project.toolchain())))
}

fn sim_options(project: &Project, sim: &SimArgs) -> SimOptions {
    SimOptions {
        dump_all_signals: sim.log_all,
        generate_waveform: sim.waves,
        timeout_secs: sim.timeout_secs.or(project.file.simulation.timeout_secs),
        ..Default::default()
    }
}

fn report_path(layout: &BuildLayout, target: Target) -> PathBuf {
    match target {
        Target::Rtl => layout.reports_dir().join("campaign.json"),
        Target::PostSynthesis => layout.reports_dir().join("campaign_post_synthesis.json"),
    }
}

/// Persist and print a finished campaign.
fn report_campaign(layout: &BuildLayout, result: &CampaignResult) -> Result<()> {
    let path = report_path(layout, result.target);
    write_campaign_json(&path, result)?;

    println!("{}", render_summary(result));
    println!("Report: {}", path.display());
    Ok(())
}

fn report_build_failure(error: &FlowError) {
    println!("✗ Build failed: 0 tests attempted");
    println!();
    println!("{}", error);
}

/// Build the library and run every testbench
async fn cmd_testall(project: &Project, sim: &SimArgs, post_synth: bool) -> Result<()> {
    let layout = project.layout();
    let mut config = project.campaign(sim_options(project, sim), sim.coverage && !post_synth)?;
    if let Some(jobs) = sim.jobs {
        config.jobs = jobs.max(1);
    }
    if post_synth {
        let manifest = project.synthesis_manifest()?;
        config.library = format!("{}{}", config.library, POST_SYNTHESIS_LIBRARY_SUFFIX);
        config.post_synthesis = Some(project.post_synthesis(manifest.netlist_path));
    }

    println!(
        "Running {} tests ({} target) in {:?}",
        config.tests.len(),
        config.target(),
        layout.root()
    );
    println!();

    let runner = runner(project);
    let mut campaign = TestCampaign::new(config, runner.clone());
    let result = match campaign.run().await {
        Ok(result) => result,
        Err(e) if e.is_build_fault() => {
            report_build_failure(&e);
            anyhow::bail!("Build failed");
        }
        Err(e) => return Err(e).context("Test campaign failed to run"),
    };

    report_campaign(&layout, &result)?;

    if sim.coverage && !post_synth {
        merge_coverage(runner, &layout).await?;
    }

    if result.all_passed() {
        println!("\n✓ All tests passed!");
        Ok(())
    } else {
        anyhow::bail!("{} of {} tests failed", result.failed(), result.total())
    }
}

async fn merge_coverage(runner: Arc<dyn ProcessRunner>, layout: &BuildLayout) -> Result<()> {
    let aggregator = CoverageAggregator::new(runner, layout.coverage_dir());
    let databases = aggregator.collect()?;
    println!("Merging {} coverage databases", databases.len());

    let merged = aggregator
        .merge(&databases)
        .await
        .context("Coverage merge failed")?;
    let html = aggregator
        .report(&merged, &layout.coverage_report_dir())
        .await
        .context("Coverage report failed")?;

    println!("Coverage: {}", merged.display());
    println!("Report: {}", html.display());
    Ok(())
}

/// Merge coverage databases and render the HTML report
async fn cmd_coverage(project: &Project) -> Result<()> {
    merge_coverage(runner(project), &project.layout()).await
}

/// Render the synthesis script and run synthesis
async fn cmd_synth(project: &Project) -> Result<()> {
    let layout = project.layout();
    layout.ensure()?;

    let manifest = project.synthesis_manifest()?;
    let template = project.synthesis_template()?;
    info!(top = %manifest.top, digest = %manifest.digest(), "Synthesis manifest");

    let job = SynthesisJob::new(runner(project), manifest, layout.synth_dir());
    let run = job.run(&template).await.context("Synthesis failed")?;

    println!("✓ Synthesis finished in {}ms", run.duration_ms);
    println!("Netlist: {}", run.netlist_path.display());
    println!("Log: {}", run.log_path.display());
    for report in job.collect_reports()? {
        println!("  {}", report.display());
    }
    Ok(())
}

/// Package the netlist and synthesis reports
fn cmd_package(project: &Project) -> Result<()> {
    let layout = project.layout();
    let manifest = project.synthesis_manifest()?;
    let job = SynthesisJob::new(runner(project), manifest.clone(), layout.synth_dir());
    let reports = job.collect_reports()?;

    let index = package(&layout.package_dir(), &manifest, &reports).context("Packaging failed")?;

    println!("Package: {}", layout.package_dir().display());
    println!("Manifest digest: {}", index.manifest_digest);
    for entry in &index.files {
        println!("  {} {} ({} bytes)", &entry.sha256[..12], entry.name, entry.size);
    }
    Ok(())
}

/// RTL tests, synthesis, netlist tests and packaging
async fn cmd_flow(
    project: &Project,
    sim: &SimArgs,
    continue_on_failure: bool,
    verify_netlist: bool,
) -> Result<()> {
    let layout = project.layout();
    let mut campaign = project.campaign(sim_options(project, sim), sim.coverage)?;
    if let Some(jobs) = sim.jobs {
        campaign.jobs = jobs.max(1);
    }

    let synthesis = if project.file.synthesis.template.is_some() {
        Some(project.synthesis_plan(verify_netlist, true)?)
    } else {
        println!("No [synthesis] template configured; running RTL tests only");
        None
    };

    let config = FlowConfig {
        campaign,
        synthesis,
        continue_on_test_failure: continue_on_failure,
    };

    let runner = runner(project);
    let report = match Flow::new(config, runner.clone()).run().await {
        Ok(report) => report,
        Err(e) if e.is_build_fault() => {
            report_build_failure(&e);
            anyhow::bail!("Build failed");
        }
        Err(e) => return Err(e).context("Flow failed"),
    };

    for result in report.campaigns() {
        report_campaign(&layout, result)?;
    }

    if sim.coverage {
        merge_coverage(runner, &layout).await?;
    }

    if let Some(run) = &report.synthesis {
        println!("Netlist: {}", run.netlist_path.display());
    }
    if let Some(index) = &report.package {
        println!(
            "Package: {} ({} files)",
            layout.package_dir().display(),
            index.files.len()
        );
    }
    if report.stopped_early {
        println!("Flow stopped early because of failing tests");
    }

    println!("Duration: {}ms", report.duration_ms);
    if report.success() {
        println!("\n✓ Flow completed!");
        Ok(())
    } else {
        anyhow::bail!("Flow failed")
    }
}

/// Remove the build directory
fn cmd_clean(project: &Project) -> Result<()> {
    let layout = project.layout();
    layout
        .clean()
        .with_context(|| format!("Failed to remove {:?}", layout.root()))?;
    println!("Removed {}", layout.root().display());
    Ok(())
}
