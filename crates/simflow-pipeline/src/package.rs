//! Release packaging of synthesis artifacts.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use simflow_domain::{FlowError, Result, SynthesisManifest};
use std::path::{Path, PathBuf};
use tracing::info;

/// Name of the index written into the package directory.
pub const PACKAGE_INDEX: &str = "package.json";

pub const PACKAGE_SCHEMA_VERSION: u32 = 1;

/// One file in the package.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PackageEntry {
    /// Path relative to the package directory.
    pub name: String,
    pub sha256: String,
    pub size: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PackageManifest {
    pub schema_version: u32,
    pub generated_at: DateTime<Utc>,
    pub top: String,
    /// Digest of the synthesis manifest the netlist was produced from.
    pub manifest_digest: String,
    pub files: Vec<PackageEntry>,
}

impl PackageManifest {
    pub fn entry(&self, name: &str) -> Option<&PackageEntry> {
        self.files.iter().find(|f| f.name == name)
    }
}

/// Hex SHA-256 of a file's contents.
pub fn file_sha256(path: &Path) -> Result<String> {
    let bytes = std::fs::read(path)?;
    Ok(hex::encode(Sha256::digest(&bytes)))
}

/// Copy the netlist and `reports` into `package_dir` and write the index.
///
/// Reports land under `reports/`. Entries are listed netlist first, then
/// reports sorted by name.
pub fn package(
    package_dir: &Path,
    manifest: &SynthesisManifest,
    reports: &[PathBuf],
) -> Result<PackageManifest> {
    if !manifest.netlist_path.is_file() {
        return Err(FlowError::MissingArtifact(manifest.netlist_path.clone()));
    }

    let reports_out = package_dir.join("reports");
    std::fs::create_dir_all(&reports_out)?;

    let mut files = Vec::new();
    files.push(copy_entry(&manifest.netlist_path, package_dir, package_dir)?);

    let mut reports: Vec<&PathBuf> = reports.iter().collect();
    reports.sort();
    for report in reports {
        if !report.is_file() {
            return Err(FlowError::MissingArtifact(report.clone()));
        }
        files.push(copy_entry(report, &reports_out, package_dir)?);
    }

    let index = PackageManifest {
        schema_version: PACKAGE_SCHEMA_VERSION,
        generated_at: Utc::now(),
        top: manifest.top.clone(),
        manifest_digest: manifest.digest(),
        files,
    };

    let json = serde_json::to_string_pretty(&index)?;
    std::fs::write(package_dir.join(PACKAGE_INDEX), json)?;

    info!(
        dir = %package_dir.display(),
        files = index.files.len(),
        "Package written"
    );
    Ok(index)
}

fn copy_entry(source: &Path, dest_dir: &Path, package_root: &Path) -> Result<PackageEntry> {
    let file_name = source
        .file_name()
        .ok_or_else(|| FlowError::MissingArtifact(source.to_path_buf()))?;
    let dest = dest_dir.join(file_name);
    let size = std::fs::copy(source, &dest)?;

    let name = dest
        .strip_prefix(package_root)
        .unwrap_or(&dest)
        .to_string_lossy()
        .replace('\\', "/");

    Ok(PackageEntry {
        name,
        sha256: file_sha256(&dest)?,
        size,
    })
}
