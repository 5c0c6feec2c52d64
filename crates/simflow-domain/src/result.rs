//! Campaign results and aggregation.

use crate::outcome::SimulationOutcome;
use crate::unit::{Target, TestUnit};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Outcome of one test in a campaign.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TestRecord {
    pub unit: TestUnit,
    pub outcome: SimulationOutcome,
    pub duration_ms: u64,
}

/// Ordered results of a test campaign.
///
/// Records are kept in discovery order, one per discovered unit.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CampaignResult {
    pub run_id: String,
    pub library: String,
    pub target: Target,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub records: Vec<TestRecord>,
}

impl CampaignResult {
    pub fn new(
        library: String,
        target: Target,
        started_at: DateTime<Utc>,
        records: Vec<TestRecord>,
    ) -> Self {
        Self {
            run_id: Uuid::new_v4().to_string(),
            library,
            target,
            started_at,
            finished_at: Utc::now(),
            records,
        }
    }

    pub fn total(&self) -> usize {
        self.records.len()
    }

    pub fn passed(&self) -> usize {
        self.records.iter().filter(|r| r.outcome.is_passed()).count()
    }

    pub fn failed(&self) -> usize {
        self.total() - self.passed()
    }

    pub fn all_passed(&self) -> bool {
        self.passed() == self.total()
    }

    /// Non-passing tests, in discovery order.
    pub fn failures(&self) -> Vec<&TestRecord> {
        self.records
            .iter()
            .filter(|r| !r.outcome.is_passed())
            .collect()
    }

    /// Names of non-passing tests, in discovery order.
    pub fn failed_names(&self) -> Vec<&str> {
        self.failures().iter().map(|r| r.unit.name()).collect()
    }

    pub fn outcome_of(&self, name: &str) -> Option<SimulationOutcome> {
        self.records
            .iter()
            .find(|r| r.unit.name() == name)
            .map(|r| r.outcome)
    }

    pub fn duration_ms(&self) -> u64 {
        (self.finished_at - self.started_at)
            .num_milliseconds()
            .max(0) as u64
    }
}
