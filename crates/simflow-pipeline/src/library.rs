//! Named simulation libraries.

use crate::process::{Invocation, ProcessRunner};
use crate::toolchain::Tool;
use simflow_domain::{FlowError, Result};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Unit kinds printed by the library lister, one `<KIND> <name>` per line.
const UNIT_KINDS: [&str; 7] = [
    "MODULE",
    "ENTITY",
    "PACKAGE",
    "INTERFACE",
    "PROGRAM",
    "CONFIGURATION",
    "CLASS",
];

/// A compilation target that tests are simulated from.
///
/// Sources accumulate across `compile` calls; order matters, since later
/// sources may reference units compiled earlier.
pub struct Library {
    name: String,
    work_dir: PathBuf,
    runner: Arc<dyn ProcessRunner>,
    initialized: bool,
    compiled: Vec<PathBuf>,
}

impl Library {
    pub fn new(
        name: impl Into<String>,
        work_dir: impl Into<PathBuf>,
        runner: Arc<dyn ProcessRunner>,
    ) -> Self {
        Self {
            name: name.into(),
            work_dir: work_dir.into(),
            runner,
            initialized: false,
            compiled: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn work_dir(&self) -> &Path {
        &self.work_dir
    }

    /// On-disk storage created by the librarian.
    pub fn path(&self) -> PathBuf {
        self.work_dir.join(&self.name)
    }

    pub(crate) fn runner(&self) -> &dyn ProcessRunner {
        self.runner.as_ref()
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    /// Sources compiled so far, in compile order.
    pub fn compiled_sources(&self) -> &[PathBuf] {
        &self.compiled
    }

    /// Create the library storage. Call at most once per fresh build
    /// directory; the librarian may refuse to recreate an existing library.
    pub async fn initialize(&mut self) -> Result<()> {
        info!(library = %self.name, work_dir = %self.work_dir.display(), "Creating library");

        let invocation = Invocation::new(Tool::Librarian, &self.work_dir).arg(self.name.clone());
        let output = self.runner.execute(&invocation).await?;

        if !output.success() {
            warn!(library = %self.name, exit_code = output.exit_code, "Library creation failed");
            return Err(FlowError::LibraryInit {
                library: self.name.clone(),
                output: output.combined(),
            });
        }

        self.initialized = true;
        Ok(())
    }

    /// Use the library if it already exists on disk, otherwise create it.
    pub async fn open_or_initialize(&mut self) -> Result<()> {
        if self.path().is_dir() {
            debug!(library = %self.name, "Reusing existing library");
            self.initialized = true;
            return Ok(());
        }
        self.initialize().await
    }

    /// Compile `sources` into the library. All-or-nothing: a failure in any
    /// source fails the whole call and nothing from it is recorded.
    pub async fn compile(&mut self, sources: &[PathBuf], extra_args: &[String]) -> Result<()> {
        if !self.initialized {
            return Err(FlowError::LibraryNotInitialized(self.name.clone()));
        }
        if sources.is_empty() {
            debug!(library = %self.name, "Nothing to compile");
            return Ok(());
        }

        info!(library = %self.name, count = sources.len(), "Compiling sources");

        let mut invocation = Invocation::new(Tool::Compiler, &self.work_dir)
            .arg("-work")
            .arg(self.name.clone())
            .args(extra_args.iter().cloned());
        for source in sources {
            invocation = invocation.path_arg(&absolute(source)?);
        }

        let output = self.runner.execute(&invocation).await?;
        if !output.success() {
            warn!(library = %self.name, exit_code = output.exit_code, "Compilation failed");
            return Err(FlowError::Compile {
                library: self.name.clone(),
                output: output.combined(),
            });
        }

        self.compiled.extend(sources.iter().cloned());
        Ok(())
    }

    /// Names of the design units compiled into the library, lowercased.
    pub async fn units(&self) -> Result<BTreeSet<String>> {
        let invocation = Invocation::new(Tool::LibraryLister, &self.work_dir)
            .arg("-lib")
            .arg(self.name.clone());
        let output = self.runner.execute(&invocation).await?;

        if !output.success() {
            return Err(FlowError::Compile {
                library: self.name.clone(),
                output: output.combined(),
            });
        }

        Ok(parse_unit_listing(&output.stdout))
    }
}

/// Sources are passed as absolute paths because the compiler runs inside
/// the library's work directory.
fn absolute(path: &Path) -> Result<PathBuf> {
    if path.is_absolute() {
        Ok(path.to_path_buf())
    } else {
        Ok(std::env::current_dir()?.join(path))
    }
}

fn parse_unit_listing(listing: &str) -> BTreeSet<String> {
    listing
        .lines()
        .filter_map(|line| {
            let mut parts = line.split_whitespace();
            let kind = parts.next()?;
            let name = parts.next()?;
            UNIT_KINDS
                .contains(&kind.to_ascii_uppercase().as_str())
                .then(|| name.to_ascii_lowercase())
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fakes::{Response, ScriptedProcessRunner};

    fn library(runner: &Arc<ScriptedProcessRunner>, dir: &Path) -> Library {
        Library::new("work", dir, runner.clone())
    }

    #[tokio::test]
    async fn test_initialize_invokes_librarian() {
        let dir = tempfile::tempdir().unwrap();
        let runner = Arc::new(ScriptedProcessRunner::new());
        let mut lib = library(&runner, dir.path());

        lib.initialize().await.unwrap();
        assert!(lib.is_initialized());

        let calls = runner.calls_for(Tool::Librarian);
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].args, vec!["work"]);
        assert_eq!(calls[0].cwd, dir.path());
    }

    #[tokio::test]
    async fn test_initialize_failure() {
        let dir = tempfile::tempdir().unwrap();
        let runner = Arc::new(
            ScriptedProcessRunner::new()
                .on(Tool::Librarian, Response::stderr(1, "** Error: cannot create library")),
        );
        let mut lib = library(&runner, dir.path());

        let err = lib.initialize().await.unwrap_err();
        match err {
            FlowError::LibraryInit { library, output } => {
                assert_eq!(library, "work");
                assert!(output.contains("cannot create library"));
            }
            other => panic!("unexpected error {:?}", other),
        }
        assert!(!lib.is_initialized());
    }

    #[tokio::test]
    async fn test_open_existing_skips_librarian() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("work")).unwrap();
        let runner = Arc::new(ScriptedProcessRunner::new());
        let mut lib = library(&runner, dir.path());

        lib.open_or_initialize().await.unwrap();
        assert!(lib.is_initialized());
        assert!(runner.calls().is_empty());
    }

    #[tokio::test]
    async fn test_compile_requires_initialize() {
        let dir = tempfile::tempdir().unwrap();
        let runner = Arc::new(ScriptedProcessRunner::new());
        let mut lib = library(&runner, dir.path());

        let err = lib
            .compile(&[PathBuf::from("/src/alu.sv")], &[])
            .await
            .unwrap_err();
        assert!(matches!(err, FlowError::LibraryNotInitialized(_)));
        assert!(runner.calls().is_empty());
    }

    #[tokio::test]
    async fn test_compile_accumulates_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let runner = Arc::new(ScriptedProcessRunner::new());
        let mut lib = library(&runner, dir.path());
        lib.initialize().await.unwrap();

        lib.compile(&[PathBuf::from("/src/alu.sv")], &["+cover=bcesf".to_string()])
            .await
            .unwrap();
        lib.compile(&[PathBuf::from("/tests/alu_tb.sv")], &[])
            .await
            .unwrap();

        assert_eq!(
            lib.compiled_sources(),
            &[PathBuf::from("/src/alu.sv"), PathBuf::from("/tests/alu_tb.sv")]
        );

        let calls = runner.calls_for(Tool::Compiler);
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0].args, vec!["-work", "work", "+cover=bcesf", "/src/alu.sv"]);
        assert_eq!(calls[1].args, vec!["-work", "work", "/tests/alu_tb.sv"]);
    }

    #[tokio::test]
    async fn test_compile_failure_is_all_or_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let runner = Arc::new(ScriptedProcessRunner::new().on(
            Tool::Compiler,
            Response::stdout(2, "** Error: (vlog-13069) uart.sv(40): near \"end\": syntax error"),
        ));
        let mut lib = library(&runner, dir.path());
        lib.initialize().await.unwrap();

        let err = lib
            .compile(&[PathBuf::from("/src/alu.sv"), PathBuf::from("/src/uart.sv")], &[])
            .await
            .unwrap_err();
        match err {
            FlowError::Compile { output, .. } => assert!(output.contains("vlog-13069")),
            other => panic!("unexpected error {:?}", other),
        }
        assert!(lib.compiled_sources().is_empty());
    }

    #[tokio::test]
    async fn test_compile_empty_is_noop() {
        let dir = tempfile::tempdir().unwrap();
        let runner = Arc::new(ScriptedProcessRunner::new());
        let mut lib = library(&runner, dir.path());
        lib.initialize().await.unwrap();

        lib.compile(&[], &[]).await.unwrap();
        assert!(runner.calls_for(Tool::Compiler).is_empty());
    }

    #[tokio::test]
    async fn test_units_parsed_from_listing() {
        let dir = tempfile::tempdir().unwrap();
        let listing = "Library: work\nMODULE alu\nMODULE Alu_TB\nPACKAGE uart_pkg\n";
        let runner = Arc::new(
            ScriptedProcessRunner::new().on(Tool::LibraryLister, Response::stdout(0, listing)),
        );
        let lib = library(&runner, dir.path());

        let units = lib.units().await.unwrap();
        assert!(units.contains("alu"));
        assert!(units.contains("alu_tb"));
        assert!(units.contains("uart_pkg"));
        assert!(!units.contains("library:"));
        assert_eq!(runner.calls()[0].args, vec!["-lib", "work"]);
    }
}
