//! simflow pipeline - drives the HDL toolchain
//!
//! Provides the process-facing half of simflow:
//! - Runs librarian, compiler, simulator, coverage and synthesis tools
//!   through a swappable `ProcessRunner`
//! - Builds simulation libraries and runs test campaigns with
//!   fail-fast builds and fail-isolated tests
//! - Merges coverage, renders and runs synthesis, packages the results

pub mod campaign;
pub mod coverage;
pub mod discovery;
pub mod fakes;
pub mod flow;
pub mod layout;
pub mod library;
pub mod package;
pub mod process;
pub mod report;
pub mod simulator;
pub mod synthesis;
pub mod telemetry;
pub mod toolchain;

// Re-export key types
pub use campaign::{CampaignConfig, CampaignState, PostSynthesisConfig, TestCampaign};
pub use coverage::CoverageAggregator;
pub use discovery::{discover_sources, discover_tests};
pub use flow::{Flow, FlowConfig, FlowReport, SynthesisPlan};
pub use layout::BuildLayout;
pub use library::Library;
pub use package::{package, PackageEntry, PackageManifest};
pub use process::{Invocation, ProcessOutput, ProcessRunner, SystemProcessRunner};
pub use report::{render_summary, write_campaign_json};
pub use simulator::{SimOptions, SimulationSetup, Simulator};
pub use synthesis::{SynthesisJob, SynthesisRun};
pub use telemetry::init_tracing;
pub use toolchain::{Tool, ToolchainConfig};
