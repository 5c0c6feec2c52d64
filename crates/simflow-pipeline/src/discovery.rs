//! Source and test discovery.

use simflow_domain::{canonical_order, FlowError, Result, Target, TestUnit};
use std::path::{Path, PathBuf};
use tracing::debug;

/// HDL sources directly inside `dir` whose extension is one of
/// `extensions`, sorted by path.
pub fn discover_sources(dir: &Path, extensions: &[&str]) -> Result<Vec<PathBuf>> {
    let mut sources = list_files(dir, |path| {
        path.extension()
            .and_then(|e| e.to_str())
            .map(|e| extensions.contains(&e))
            .unwrap_or(false)
    })?;
    sources.sort();
    debug!(dir = %dir.display(), count = sources.len(), "Discovered sources");
    Ok(sources)
}

/// Testbenches directly inside `dir` whose file name ends with `suffix`
/// (e.g. `_tb.sv`), in canonical campaign order.
pub fn discover_tests(dir: &Path, suffix: &str, target: Target) -> Result<Vec<TestUnit>> {
    let files = list_files(dir, |path| {
        path.file_name()
            .and_then(|n| n.to_str())
            .map(|n| n.ends_with(suffix) && n.len() > suffix.len())
            .unwrap_or(false)
    })?;

    let units = files
        .into_iter()
        .map(|path| TestUnit::from_path(path, target))
        .collect::<Result<Vec<_>>>()?;

    let units = canonical_order(units);
    debug!(dir = %dir.display(), count = units.len(), "Discovered tests");
    Ok(units)
}

fn list_files(dir: &Path, keep: impl Fn(&Path) -> bool) -> Result<Vec<PathBuf>> {
    if !dir.is_dir() {
        return Err(FlowError::MissingDirectory(dir.to_path_buf()));
    }

    let mut files = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_file() && keep(&path) {
            files.push(path);
        }
    }
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn touch(dir: &Path, name: &str) {
        std::fs::write(dir.join(name), "module m; endmodule\n").unwrap();
    }

    #[test]
    fn test_discover_sources_filters_and_sorts() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "uart.sv");
        touch(dir.path(), "alu.sv");
        touch(dir.path(), "notes.txt");
        touch(dir.path(), "legacy.v");

        let sources = discover_sources(dir.path(), &["sv"]).unwrap();
        let names: Vec<_> = sources
            .iter()
            .map(|p| p.file_name().unwrap().to_str().unwrap().to_string())
            .collect();
        assert_eq!(names, vec!["alu.sv", "uart.sv"]);

        let both = discover_sources(dir.path(), &["sv", "v"]).unwrap();
        assert_eq!(both.len(), 3);
    }

    #[test]
    fn test_discover_tests_by_suffix() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "uart_tb.sv");
        touch(dir.path(), "alu_tb.sv");
        touch(dir.path(), "alu.sv");
        touch(dir.path(), "_tb.sv");

        let tests = discover_tests(dir.path(), "_tb.sv", Target::Rtl).unwrap();
        let names: Vec<_> = tests.iter().map(|t| t.name()).collect();
        assert_eq!(names, vec!["alu_tb", "uart_tb"]);
    }

    #[test]
    fn test_discover_tests_rejects_bad_names() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "fifo-async_tb.sv");

        let err = discover_tests(dir.path(), "_tb.sv", Target::Rtl).unwrap_err();
        assert!(matches!(err, FlowError::InvalidTestUnit { .. }));
    }

    #[test]
    fn test_missing_dir() {
        let err = discover_sources(Path::new("/nonexistent/simflow/src"), &["sv"]).unwrap_err();
        assert!(matches!(err, FlowError::MissingDirectory(_)));
    }
}
