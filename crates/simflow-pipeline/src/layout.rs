//! Build directory layout.
//!
//! ```text
//! <root>/
//!   sim/             simulation library and per-test outputs
//!   synth/           rendered script, netlist, synth.log
//!     reports/       synthesis reports
//!   coverage/        per-test coverage databases, merged.ucdb
//!     html/          coverage report
//!   reports/         campaign JSON artifacts
//!   package/         packaged netlist + reports
//! ```

use simflow_domain::Result;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildLayout {
    root: PathBuf,
}

impl BuildLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn sim_dir(&self) -> PathBuf {
        self.root.join("sim")
    }

    pub fn synth_dir(&self) -> PathBuf {
        self.root.join("synth")
    }

    pub fn synth_reports_dir(&self) -> PathBuf {
        self.synth_dir().join("reports")
    }

    pub fn coverage_dir(&self) -> PathBuf {
        self.root.join("coverage")
    }

    pub fn coverage_report_dir(&self) -> PathBuf {
        self.coverage_dir().join("html")
    }

    pub fn reports_dir(&self) -> PathBuf {
        self.root.join("reports")
    }

    pub fn package_dir(&self) -> PathBuf {
        self.root.join("package")
    }

    /// Create every directory of the layout.
    pub fn ensure(&self) -> Result<()> {
        for dir in [
            self.sim_dir(),
            self.synth_reports_dir(),
            self.coverage_dir(),
            self.reports_dir(),
            self.package_dir(),
        ] {
            std::fs::create_dir_all(&dir)?;
        }
        Ok(())
    }

    /// Remove the whole build tree. This also discards every compiled
    /// library.
    pub fn clean(&self) -> Result<()> {
        if self.root.exists() {
            std::fs::remove_dir_all(&self.root)?;
        }
        Ok(())
    }
}
