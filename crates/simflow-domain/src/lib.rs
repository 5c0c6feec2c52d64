//! simflow domain model
//!
//! Plain data for the build/verification flow:
//! - SimulationOutcome: the closed set of results a simulator run can have,
//!   plus the fixed exit-code classifier
//! - TestUnit: a testbench and the top-level unit it names
//! - CampaignResult: ordered per-test outcomes with derived counts
//! - SynthesisManifest: inputs to the synthesis script template
//! - FlowError: every fault the flow can raise
//!
//! Nothing in this crate spawns processes or touches the build directory.

pub mod error;
pub mod manifest;
pub mod outcome;
pub mod result;
pub mod unit;

pub use error::{FlowError, Result};
pub use manifest::{render, SynthesisManifest};
pub use outcome::{classify, SimulationOutcome};
pub use result::{CampaignResult, TestRecord};
pub use unit::{canonical_order, Target, TestUnit};

/// simflow domain version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
