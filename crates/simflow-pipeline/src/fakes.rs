//! In-memory process runner fake (testing only)
//!
//! `ScriptedProcessRunner` answers invocations from a list of rules instead
//! of spawning processes, and records every invocation it sees.

use std::sync::Mutex;

use async_trait::async_trait;

use crate::process::{Invocation, ProcessOutput, ProcessRunner};
use crate::toolchain::Tool;
use simflow_domain::{FlowError, Result};

/// What the fake does when a rule matches.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Response {
    Exit {
        code: i32,
        stdout: String,
        stderr: String,
    },
    SpawnFailure,
    Timeout,
}

impl Response {
    pub fn exit(code: i32) -> Self {
        Response::Exit {
            code,
            stdout: String::new(),
            stderr: String::new(),
        }
    }

    pub fn stdout(code: i32, stdout: impl Into<String>) -> Self {
        Response::Exit {
            code,
            stdout: stdout.into(),
            stderr: String::new(),
        }
    }

    pub fn stderr(code: i32, stderr: impl Into<String>) -> Self {
        Response::Exit {
            code,
            stdout: String::new(),
            stderr: stderr.into(),
        }
    }
}

#[derive(Debug, Clone)]
struct Rule {
    tool: Tool,
    needle: Option<String>,
    response: Response,
}

/// Process runner driven by scripted responses.
///
/// Rules with an argument needle are consulted before tool-wide rules, most
/// recently added first. Unmatched invocations exit 0 with no output.
#[derive(Debug, Default)]
pub struct ScriptedProcessRunner {
    rules: Vec<Rule>,
    calls: Mutex<Vec<Invocation>>,
}

impl ScriptedProcessRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Respond to every invocation of `tool`.
    pub fn on(mut self, tool: Tool, response: Response) -> Self {
        self.rules.push(Rule {
            tool,
            needle: None,
            response,
        });
        self
    }

    /// Respond to invocations of `tool` with an argument containing `needle`.
    pub fn on_arg(mut self, tool: Tool, needle: impl Into<String>, response: Response) -> Self {
        self.rules.push(Rule {
            tool,
            needle: Some(needle.into()),
            response,
        });
        self
    }

    /// Every invocation seen so far, in call order.
    pub fn calls(&self) -> Vec<Invocation> {
        self.calls.lock().unwrap().clone()
    }

    pub fn calls_for(&self, tool: Tool) -> Vec<Invocation> {
        self.calls()
            .into_iter()
            .filter(|c| c.tool == tool)
            .collect()
    }

    fn response_for(&self, invocation: &Invocation) -> Response {
        let specific = self.rules.iter().rev().find(|r| {
            r.tool == invocation.tool
                && r.needle
                    .as_deref()
                    .map(|n| invocation.mentions(n))
                    .unwrap_or(false)
        });
        let general = || {
            self.rules
                .iter()
                .rev()
                .find(|r| r.tool == invocation.tool && r.needle.is_none())
        };

        specific
            .or_else(general)
            .map(|r| r.response.clone())
            .unwrap_or_else(|| Response::exit(0))
    }
}

#[async_trait]
impl ProcessRunner for ScriptedProcessRunner {
    async fn execute(&self, invocation: &Invocation) -> Result<ProcessOutput> {
        self.calls.lock().unwrap().push(invocation.clone());

        match self.response_for(invocation) {
            Response::Exit {
                code,
                stdout,
                stderr,
            } => Ok(ProcessOutput {
                exit_code: code,
                stdout,
                stderr,
                duration_ms: 0,
            }),
            Response::SpawnFailure => Err(FlowError::Spawn {
                tool: invocation.tool.to_string(),
                executable: invocation.tool.default_executable().to_string(),
                source: std::io::Error::new(
                    std::io::ErrorKind::NotFound,
                    "scripted spawn failure",
                ),
            }),
            Response::Timeout => Err(FlowError::Timeout {
                tool: invocation.tool.to_string(),
                limit_secs: invocation.timeout.map(|t| t.as_secs()).unwrap_or(0),
            }),
        }
    }
}
