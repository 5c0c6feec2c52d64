//! External process execution.
//!
//! The runner reports exit codes as-is; deciding what a code means is the
//! caller's job.

use crate::toolchain::{Tool, ToolchainConfig};
use async_trait::async_trait;
use simflow_domain::{FlowError, Result};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::process::Command;
use tracing::{debug, info, warn};

/// One request to run an external tool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub tool: Tool,
    pub args: Vec<String>,
    pub cwd: PathBuf,
    pub timeout: Option<Duration>,
}

impl Invocation {
    pub fn new(tool: Tool, cwd: impl Into<PathBuf>) -> Self {
        Self {
            tool,
            args: Vec::new(),
            cwd: cwd.into(),
            timeout: None,
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn path_arg(self, path: &Path) -> Self {
        self.arg(path.to_string_lossy().into_owned())
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn timeout(mut self, limit: Option<Duration>) -> Self {
        self.timeout = limit;
        self
    }

    /// Whether any argument contains `needle`.
    pub fn mentions(&self, needle: &str) -> bool {
        self.args.iter().any(|a| a.contains(needle))
    }
}

/// Captured result of a finished process.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcessOutput {
    /// Exit code, or `-signal` when the child was killed by a signal.
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
    pub duration_ms: u64,
}

impl ProcessOutput {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }

    /// Stdout followed by stderr, for diagnostics. Most HDL tools print
    /// their errors on stdout.
    pub fn combined(&self) -> String {
        match (self.stdout.trim_end().is_empty(), self.stderr.trim_end().is_empty()) {
            (false, false) => format!("{}\n{}", self.stdout.trim_end(), self.stderr.trim_end()),
            (false, true) => self.stdout.trim_end().to_string(),
            (true, false) => self.stderr.trim_end().to_string(),
            (true, true) => String::new(),
        }
    }
}

/// Runs external tools.
///
/// Implementations must return `FlowError::Spawn` when the executable cannot
/// be started and `FlowError::Timeout` when the invocation's time limit
/// expires; any exit code, zero or not, is an `Ok`.
#[async_trait]
pub trait ProcessRunner: Send + Sync {
    async fn execute(&self, invocation: &Invocation) -> Result<ProcessOutput>;
}

/// Runs tools as real child processes.
pub struct SystemProcessRunner {
    config: Arc<ToolchainConfig>,
}

impl SystemProcessRunner {
    pub fn new(config: Arc<ToolchainConfig>) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ToolchainConfig {
        &self.config
    }
}

#[async_trait]
impl ProcessRunner for SystemProcessRunner {
    async fn execute(&self, invocation: &Invocation) -> Result<ProcessOutput> {
        let executable = self.config.executable(invocation.tool);

        if !invocation.cwd.is_dir() {
            return Err(FlowError::MissingDirectory(invocation.cwd.clone()));
        }

        debug!(
            tool = %invocation.tool,
            executable = %executable.display(),
            args = ?invocation.args,
            cwd = %invocation.cwd.display(),
            "Spawning tool"
        );

        let start = Instant::now();
        let child = Command::new(&executable)
            .args(&invocation.args)
            .current_dir(&invocation.cwd)
            .envs(&self.config.env)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| FlowError::Spawn {
                tool: invocation.tool.to_string(),
                executable: executable.display().to_string(),
                source,
            })?;

        // Dropping the wait future on timeout drops the child, which kills it.
        let output = match invocation.timeout {
            Some(limit) => tokio::time::timeout(limit, child.wait_with_output())
                .await
                .map_err(|_| {
                    warn!(tool = %invocation.tool, limit_secs = limit.as_secs(), "Tool timed out");
                    FlowError::Timeout {
                        tool: invocation.tool.to_string(),
                        limit_secs: limit.as_secs(),
                    }
                })??,
            None => child.wait_with_output().await?,
        };

        let duration_ms = start.elapsed().as_millis() as u64;
        let exit_code = exit_code(&output.status);

        info!(
            tool = %invocation.tool,
            exit_code,
            duration_ms,
            "Tool finished"
        );

        Ok(ProcessOutput {
            exit_code,
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
            duration_ms,
        })
    }
}

fn exit_code(status: &std::process::ExitStatus) -> i32 {
    if let Some(code) = status.code() {
        return code;
    }
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return -signal;
        }
    }
    -1
}

#[cfg(test)]
mod tests {
    use super::*;

    fn runner_with(tool: Tool, exe: &str) -> SystemProcessRunner {
        SystemProcessRunner::new(Arc::new(ToolchainConfig::new().with_executable(tool, exe)))
    }

    #[test]
    fn test_combined_output() {
        let output = ProcessOutput {
            exit_code: 2,
            stdout: "** Error: bad\n".to_string(),
            stderr: "Errors: 1\n".to_string(),
            duration_ms: 1,
        };
        assert_eq!(output.combined(), "** Error: bad\nErrors: 1");
        assert!(!output.success());
    }

    #[test]
    fn test_invocation_builder() {
        let inv = Invocation::new(Tool::Compiler, "/tmp")
            .args(["-work", "work"])
            .path_arg(Path::new("src/alu.sv"));
        assert_eq!(inv.args, vec!["-work", "work", "src/alu.sv"]);
        assert!(inv.mentions("alu"));
        assert!(inv.timeout.is_none());
    }

    #[tokio::test]
    async fn test_exit_code_propagated_unaltered() {
        let dir = tempfile::tempdir().unwrap();
        let runner = runner_with(Tool::Simulator, "sh");
        let inv = Invocation::new(Tool::Simulator, dir.path()).args(["-c", "exit 12"]);

        let output = runner.execute(&inv).await.expect("execute failed");
        assert_eq!(output.exit_code, 12);
    }

    #[tokio::test]
    async fn test_stdout_captured_and_cwd_used() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("marker.txt"), "hello").unwrap();
        let runner = runner_with(Tool::Compiler, "sh");
        let inv = Invocation::new(Tool::Compiler, dir.path()).args(["-c", "cat marker.txt"]);

        let output = runner.execute(&inv).await.expect("execute failed");
        assert!(output.success());
        assert_eq!(output.stdout, "hello");
    }

    #[tokio::test]
    async fn test_env_overlay_wins() {
        let dir = tempfile::tempdir().unwrap();
        let config = ToolchainConfig::new()
            .with_executable(Tool::Simulator, "sh")
            .with_env("SIMFLOW_TEST_LICENSE", "1717@license.example")
            .with_env("HOME", "/overlaid");
        let runner = SystemProcessRunner::new(Arc::new(config));
        let inv = Invocation::new(Tool::Simulator, dir.path())
            .args(["-c", "echo \"$SIMFLOW_TEST_LICENSE $HOME\"; test -n \"$PATH\""]);

        let output = runner.execute(&inv).await.expect("execute failed");
        assert!(output.success(), "PATH should be inherited");
        assert_eq!(output.stdout.trim(), "1717@license.example /overlaid");
    }

    #[tokio::test]
    async fn test_missing_executable_is_spawn_error() {
        let dir = tempfile::tempdir().unwrap();
        let runner = runner_with(Tool::Librarian, "/nonexistent/simflow/vlib");
        let inv = Invocation::new(Tool::Librarian, dir.path()).arg("work");

        let err = runner.execute(&inv).await.unwrap_err();
        assert!(matches!(err, FlowError::Spawn { .. }), "got {:?}", err);
    }

    #[tokio::test]
    async fn test_missing_cwd() {
        let runner = runner_with(Tool::Librarian, "true");
        let inv = Invocation::new(Tool::Librarian, "/nonexistent/simflow/dir");

        let err = runner.execute(&inv).await.unwrap_err();
        assert!(matches!(err, FlowError::MissingDirectory(_)));
    }

    #[tokio::test]
    async fn test_timeout() {
        let dir = tempfile::tempdir().unwrap();
        let runner = runner_with(Tool::Simulator, "sleep");
        let inv = Invocation::new(Tool::Simulator, dir.path())
            .arg("5")
            .timeout(Some(Duration::from_millis(100)));

        let err = runner.execute(&inv).await.unwrap_err();
        assert!(matches!(err, FlowError::Timeout { .. }));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_signal_reported_as_negative_code() {
        let dir = tempfile::tempdir().unwrap();
        let runner = runner_with(Tool::Simulator, "sh");
        let inv = Invocation::new(Tool::Simulator, dir.path()).args(["-c", "kill -9 $$"]);

        let output = runner.execute(&inv).await.expect("execute failed");
        assert_eq!(output.exit_code, -9);
    }
}
