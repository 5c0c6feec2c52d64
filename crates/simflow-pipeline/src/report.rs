//! Campaign report artifacts.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use simflow_domain::CampaignResult;
use std::path::Path;

pub const REPORT_SCHEMA_VERSION: &str = "1.0";

/// Counts persisted alongside the full result so CI can read them without
/// walking the records.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CampaignSummaryArtifact {
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    pub all_passed: bool,
    pub failed_tests: Vec<String>,
}

impl From<&CampaignResult> for CampaignSummaryArtifact {
    fn from(result: &CampaignResult) -> Self {
        Self {
            total: result.total(),
            passed: result.passed(),
            failed: result.failed(),
            all_passed: result.all_passed(),
            failed_tests: result.failed_names().iter().map(|s| s.to_string()).collect(),
        }
    }
}

/// Contents of `campaign.json`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CampaignReportArtifact {
    pub schema_version: String,
    pub generated_at: DateTime<Utc>,
    pub summary: CampaignSummaryArtifact,
    pub result: CampaignResult,
}

impl CampaignReportArtifact {
    pub fn new(result: &CampaignResult) -> Self {
        Self {
            schema_version: REPORT_SCHEMA_VERSION.to_string(),
            generated_at: Utc::now(),
            summary: CampaignSummaryArtifact::from(result),
            result: result.clone(),
        }
    }
}

/// Write the campaign report in pretty JSON format.
pub fn write_campaign_json(path: &Path, result: &CampaignResult) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).with_context(|| format!("create {:?}", parent))?;
    }
    let artifact = CampaignReportArtifact::new(result);
    let content = serde_json::to_string_pretty(&artifact).context("serialize campaign report")?;
    std::fs::write(path, content).with_context(|| format!("write {:?}", path))?;
    Ok(())
}

/// Console summary: one ✓/✗ line per test, then the counts.
pub fn render_summary(result: &CampaignResult) -> String {
    let mut out = String::new();
    out.push_str(&format!(
        "Campaign {} ({} target, library {})\n",
        result.run_id, result.target, result.library
    ));
    for record in &result.records {
        let mark = if record.outcome.is_passed() { "✓" } else { "✗" };
        out.push_str(&format!(
            "  {} {} - {} ({}ms)\n",
            mark,
            record.unit.name(),
            record.outcome,
            record.duration_ms
        ));
    }
    out.push_str(&format!(
        "Summary: {}/{} tests passed\n",
        result.passed(),
        result.total()
    ));
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use simflow_domain::{SimulationOutcome, Target, TestRecord, TestUnit};

    fn result() -> CampaignResult {
        let record = |name: &str, outcome| TestRecord {
            unit: TestUnit::from_path(format!("tests/{}.sv", name), Target::Rtl).unwrap(),
            outcome,
            duration_ms: 7,
        };
        CampaignResult::new(
            "work".to_string(),
            Target::Rtl,
            Utc::now(),
            vec![
                record("alu_tb", SimulationOutcome::Passed),
                record("uart_tb", SimulationOutcome::AssertionFailure),
            ],
        )
    }

    #[test]
    fn campaign_json_has_expected_keys() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("reports/campaign.json");
        write_campaign_json(&path, &result()).unwrap();

        let raw: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(raw["schema_version"], json!("1.0"));
        assert_eq!(raw["summary"]["total"], json!(2));
        assert_eq!(raw["summary"]["passed"], json!(1));
        assert_eq!(raw["summary"]["failed_tests"], json!(["uart_tb"]));
        assert_eq!(
            raw["result"]["records"][1]["outcome"]["status"],
            json!("assertion_failure")
        );
    }

    #[test]
    fn summary_lists_each_test() {
        let summary = render_summary(&result());
        assert!(summary.contains("  ✓ alu_tb - test passed (7ms)\n"));
        assert!(summary.contains("  ✗ uart_tb - assertion failed (7ms)\n"));
        assert!(summary.ends_with("Summary: 1/2 tests passed\n"));
    }
}
