//! Synthesis manifest and script template rendering.
//!
//! Templates use two constructs:
//! - `{{ name }}` placeholders, resolved from the manifest
//! - `{% for src in sources %} ... {% endfor %}` blocks, repeated once per
//!   design source with the loop variable bound to the source path
//!
//! Built-in variables are `top`, `sources` (space-separated), `reports_dir`
//! and `netlist`. Extra variables come from [`SynthesisManifest::variables`];
//! built-ins take precedence on name collision.

use crate::error::{FlowError, Result};
use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

/// Everything needed to render and run a synthesis script.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SynthesisManifest {
    /// Top-level design module.
    pub top: String,

    /// Design sources, in read order.
    pub sources: Vec<PathBuf>,

    /// Where the rendered script is written.
    pub script_path: PathBuf,

    /// Directory the synthesis tool writes its reports to.
    pub reports_dir: PathBuf,

    /// Gate-level netlist produced by the script.
    pub netlist_path: PathBuf,

    /// Additional template variables.
    #[serde(default)]
    pub variables: BTreeMap<String, String>,
}

impl SynthesisManifest {
    pub fn new(
        top: impl Into<String>,
        sources: Vec<PathBuf>,
        script_path: PathBuf,
        reports_dir: PathBuf,
        netlist_path: PathBuf,
    ) -> Self {
        Self {
            top: top.into(),
            sources,
            script_path,
            reports_dir,
            netlist_path,
            variables: BTreeMap::new(),
        }
    }

    pub fn with_variable(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.variables.insert(key.into(), value.into());
        self
    }

    /// SHA-256 over the manifest's ordered fields.
    pub fn digest(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.top.as_bytes());
        hasher.update(b"\0");
        for source in &self.sources {
            hasher.update(path_str(source).as_bytes());
            hasher.update(b"\0");
        }
        hasher.update(path_str(&self.script_path).as_bytes());
        hasher.update(b"\0");
        hasher.update(path_str(&self.reports_dir).as_bytes());
        hasher.update(b"\0");
        hasher.update(path_str(&self.netlist_path).as_bytes());
        hasher.update(b"\0");
        for (key, value) in &self.variables {
            hasher.update(key.as_bytes());
            hasher.update(b"=");
            hasher.update(value.as_bytes());
            hasher.update(b"\n");
        }
        hex::encode(hasher.finalize())
    }

    fn bindings(&self) -> BTreeMap<String, String> {
        let mut vars = self.variables.clone();
        vars.insert("top".to_string(), self.top.clone());
        vars.insert(
            "sources".to_string(),
            self.sources
                .iter()
                .map(|s| path_str(s))
                .collect::<Vec<_>>()
                .join(" "),
        );
        vars.insert("reports_dir".to_string(), path_str(&self.reports_dir));
        vars.insert("netlist".to_string(), path_str(&self.netlist_path));
        vars
    }
}

fn placeholder_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\{\{\s*([A-Za-z_][A-Za-z0-9_]*)\s*\}\}").expect("valid regex"))
}

fn for_block_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(concat!(
            r"(?s)\{%\s*for\s+([A-Za-z_][A-Za-z0-9_]*)\s+in\s+sources\s*%\}\n?",
            r"(.*?)\{%\s*endfor\s*%\}\n?",
        ))
        .expect("valid regex")
    })
}

fn path_str(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

/// Render a synthesis script from a template. Pure: identical inputs give
/// byte-identical output.
pub fn render(template: &str, manifest: &SynthesisManifest) -> Result<String> {
    let expanded = expand_loops(template, &manifest.sources);

    if let Some(pos) = expanded.find("{%") {
        let line = expanded[..pos].lines().count().max(1);
        return Err(FlowError::Template(format!(
            "unsupported or unterminated block near line {}",
            line
        )));
    }

    let bindings = manifest.bindings();
    let mut missing = None;
    let rendered = placeholder_re().replace_all(&expanded, |caps: &Captures| {
        let name = &caps[1];
        match bindings.get(name) {
            Some(value) => value.clone(),
            None => {
                missing.get_or_insert_with(|| name.to_string());
                String::new()
            }
        }
    });

    match missing {
        Some(name) => Err(FlowError::Template(format!("undefined variable `{}`", name))),
        None => Ok(rendered.into_owned()),
    }
}

fn expand_loops(template: &str, sources: &[PathBuf]) -> String {
    for_block_re()
        .replace_all(template, |caps: &Captures| {
            let var = &caps[1];
            let body = &caps[2];
            let mut out = String::new();
            for source in sources {
                let source = path_str(source);
                let line = placeholder_re().replace_all(body, |inner: &Captures| {
                    if &inner[1] == var {
                        source.clone()
                    } else {
                        inner[0].to_string()
                    }
                });
                out.push_str(&line);
            }
            out
        })
        .into_owned()
}
