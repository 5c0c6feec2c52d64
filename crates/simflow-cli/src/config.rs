//! Project configuration (`simflow.toml`).
//!
//! Every field has a default, so an empty file (or no file at all) describes
//! the conventional `src/`, `tests/`, `models/`, `build/` layout. Relative
//! paths are resolved against the directory holding the config file.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use simflow_domain::{SynthesisManifest, Target, TestUnit};
use simflow_pipeline::{
    discover_sources, discover_tests, BuildLayout, CampaignConfig, PostSynthesisConfig,
    SimOptions, SynthesisPlan, Tool, ToolchainConfig,
};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::debug;

pub const DEFAULT_CONFIG_FILE: &str = "simflow.toml";

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ProjectFile {
    pub project: ProjectSection,
    pub tools: ToolsSection,
    /// Environment overlay for every tool (license servers and the like).
    pub env: BTreeMap<String, String>,
    pub simulation: SimulationSection,
    pub post_synthesis: PostSynthesisSection,
    pub synthesis: SynthesisSection,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ProjectSection {
    pub name: String,
    /// Simulation library name.
    pub library: String,
    pub src_dir: PathBuf,
    pub test_dir: PathBuf,
    pub model_dir: PathBuf,
    pub build_dir: PathBuf,
    pub source_extensions: Vec<String>,
}

impl Default for ProjectSection {
    fn default() -> Self {
        Self {
            name: "design".to_string(),
            library: "work".to_string(),
            src_dir: PathBuf::from("src"),
            test_dir: PathBuf::from("tests"),
            model_dir: PathBuf::from("models"),
            build_dir: PathBuf::from("build"),
            source_extensions: vec!["sv".to_string(), "v".to_string()],
        }
    }
}

/// Tool executables. Unset entries fall back to `dir/<default name>`, or
/// the bare default name looked up on `PATH`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ToolsSection {
    pub dir: Option<PathBuf>,
    pub vlib: Option<PathBuf>,
    pub vlog: Option<PathBuf>,
    pub vsim: Option<PathBuf>,
    pub vdir: Option<PathBuf>,
    pub vcover: Option<PathBuf>,
    pub dc_shell: Option<PathBuf>,
}

impl ToolsSection {
    fn overrides(&self) -> [(Tool, Option<&PathBuf>); 6] {
        [
            (Tool::Librarian, self.vlib.as_ref()),
            (Tool::Compiler, self.vlog.as_ref()),
            (Tool::Simulator, self.vsim.as_ref()),
            (Tool::LibraryLister, self.vdir.as_ref()),
            (Tool::Coverage, self.vcover.as_ref()),
            (Tool::SynthesisShell, self.dc_shell.as_ref()),
        ]
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct SimulationSection {
    /// Script sourced after the option directives (`do <script>`).
    pub post_run_script: Option<PathBuf>,
    pub timeout_secs: Option<u64>,
    pub jobs: usize,
    /// File name suffix that marks a testbench.
    pub test_suffix: String,
    pub validate_units: bool,
}

impl Default for SimulationSection {
    fn default() -> Self {
        Self {
            post_run_script: None,
            timeout_secs: None,
            jobs: 1,
            test_suffix: "_tb.sv".to_string(),
            validate_units: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct PostSynthesisSection {
    pub timescale: Option<String>,
    /// RTL models compiled alongside the netlist.
    pub sim_models: Vec<PathBuf>,
    pub extra_libraries: Vec<String>,
}

impl Default for PostSynthesisSection {
    fn default() -> Self {
        Self {
            timescale: Some("1ns/1ps".to_string()),
            sim_models: Vec::new(),
            extra_libraries: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct SynthesisSection {
    /// Top module; defaults to the project name.
    pub top: Option<String>,
    pub template: Option<PathBuf>,
    /// Extra template variables.
    pub variables: BTreeMap<String, String>,
}

impl ProjectFile {
    pub fn parse(text: &str) -> Result<Self> {
        toml::from_str(text).context("parse project file")
    }

    /// Read `path`. A missing file yields the defaults unless `required`.
    pub fn load(path: &Path, required: bool) -> Result<Self> {
        if !path.exists() && !required {
            debug!(path = %path.display(), "No project file, using defaults");
            return Ok(Self::default());
        }
        let text = std::fs::read_to_string(path).with_context(|| format!("read {:?}", path))?;
        Self::parse(&text).with_context(|| format!("load {:?}", path))
    }
}

/// A loaded project: configuration plus the directory it is relative to.
#[derive(Debug, Clone)]
pub struct Project {
    pub root: PathBuf,
    pub file: ProjectFile,
    build_dir: PathBuf,
}

impl Project {
    pub fn new(root: impl Into<PathBuf>, file: ProjectFile, build_dir: Option<PathBuf>) -> Self {
        let root = root.into();
        let build_dir = build_dir.unwrap_or_else(|| file.project.build_dir.clone());
        let build_dir = resolve(&root, &build_dir);
        Self {
            root,
            file,
            build_dir,
        }
    }

    /// Load the config at `config_path`; the project root is its directory.
    ///
    /// Tools run inside build subdirectories, so the root is made absolute.
    /// A relative `build_dir` override is taken relative to the current
    /// directory.
    pub fn open(config_path: &Path, required: bool, build_dir: Option<PathBuf>) -> Result<Self> {
        let file = ProjectFile::load(config_path, required)?;
        let cwd = std::env::current_dir().context("resolve current directory")?;
        let root = project_root(&cwd, config_path);
        let build_dir = build_dir.map(|d| resolve(&cwd, &d));
        Ok(Self::new(root, file, build_dir))
    }

    pub fn path(&self, rel: &Path) -> PathBuf {
        resolve(&self.root, rel)
    }

    pub fn layout(&self) -> BuildLayout {
        BuildLayout::new(&self.build_dir)
    }

    pub fn toolchain(&self) -> ToolchainConfig {
        let tools = &self.file.tools;
        let mut config = ToolchainConfig::new();
        if let Some(dir) = &tools.dir {
            config = config.with_tool_dir(self.path(dir));
        }
        for (tool, path) in tools.overrides() {
            if let Some(path) = path {
                config = config.with_executable(tool, self.executable(path));
            }
        }
        for (key, value) in &self.file.env {
            config = config.with_env(key.clone(), value.clone());
        }
        config
    }

    /// Bare names stay bare for the `PATH` lookup; anything with a
    /// directory part is taken relative to the project root.
    fn executable(&self, path: &Path) -> PathBuf {
        match path.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => self.path(path),
            _ => path.to_path_buf(),
        }
    }

    fn extensions(&self) -> Vec<&str> {
        self.file
            .project
            .source_extensions
            .iter()
            .map(String::as_str)
            .collect()
    }

    pub fn design_sources(&self) -> Result<Vec<PathBuf>> {
        let dir = self.path(&self.file.project.src_dir);
        discover_sources(&dir, &self.extensions()).with_context(|| format!("scan {:?}", dir))
    }

    /// Models plus any non-testbench sources in the test directory.
    pub fn support_sources(&self) -> Result<Vec<PathBuf>> {
        let mut sources = Vec::new();

        let model_dir = self.path(&self.file.project.model_dir);
        if model_dir.is_dir() {
            sources.extend(discover_sources(&model_dir, &self.extensions())?);
        }

        let suffix = &self.file.simulation.test_suffix;
        let test_dir = self.path(&self.file.project.test_dir);
        if test_dir.is_dir() {
            sources.extend(
                discover_sources(&test_dir, &self.extensions())?
                    .into_iter()
                    .filter(|p| {
                        !p.file_name()
                            .and_then(|n| n.to_str())
                            .map(|n| n.ends_with(suffix.as_str()))
                            .unwrap_or(false)
                    }),
            );
        }
        Ok(sources)
    }

    pub fn tests(&self) -> Result<Vec<TestUnit>> {
        let dir = self.path(&self.file.project.test_dir);
        discover_tests(&dir, &self.file.simulation.test_suffix, Target::Rtl)
            .with_context(|| format!("discover tests in {:?}", dir))
    }

    /// RTL campaign over the discovered sources and tests.
    pub fn campaign(&self, options: SimOptions, coverage: bool) -> Result<CampaignConfig> {
        let sim = &self.file.simulation;
        let mut config = CampaignConfig::new(self.file.project.library.clone(), self.layout());
        config.design_sources = self.design_sources()?;
        config.support_sources = self.support_sources()?;
        config.tests = self.tests()?;
        config.coverage = coverage;
        config.options = options;
        config.post_run_script = sim.post_run_script.as_ref().map(|p| self.path(p));
        config.jobs = sim.jobs.max(1);
        config.validate_units = sim.validate_units;
        Ok(config)
    }

    pub fn post_synthesis(&self, netlist: PathBuf) -> PostSynthesisConfig {
        let post = &self.file.post_synthesis;
        PostSynthesisConfig {
            netlist,
            timescale: post.timescale.clone(),
            sim_models: post.sim_models.iter().map(|p| self.path(p)).collect(),
            extra_libraries: post.extra_libraries.clone(),
        }
    }

    pub fn synthesis_top(&self) -> String {
        self.file
            .synthesis
            .top
            .clone()
            .unwrap_or_else(|| self.file.project.name.clone())
    }

    pub fn synthesis_manifest(&self) -> Result<SynthesisManifest> {
        let layout = self.layout();
        let top = self.synthesis_top();
        let mut manifest = SynthesisManifest::new(
            top.clone(),
            self.design_sources()?,
            layout.synth_dir().join(format!("{}.dc", top)),
            layout.synth_reports_dir(),
            layout.synth_dir().join(format!("{}.vg", top)),
        );
        for (key, value) in &self.file.synthesis.variables {
            manifest = manifest.with_variable(key.clone(), value.clone());
        }
        Ok(manifest)
    }

    pub fn synthesis_template(&self) -> Result<String> {
        let path = self
            .file
            .synthesis
            .template
            .as_ref()
            .map(|p| self.path(p))
            .context("no [synthesis] template configured")?;
        std::fs::read_to_string(&path).with_context(|| format!("read template {:?}", path))
    }

    pub fn synthesis_plan(&self, verify_netlist: bool, package: bool) -> Result<SynthesisPlan> {
        let manifest = self.synthesis_manifest()?;
        let post_synthesis = self.post_synthesis(manifest.netlist_path.clone());
        Ok(SynthesisPlan {
            manifest,
            template: self.synthesis_template()?,
            post_synthesis,
            verify_netlist,
            package,
        })
    }
}

/// Directory holding `config_path`, absolute against `cwd`.
fn project_root(cwd: &Path, config_path: &Path) -> PathBuf {
    match config_path.parent() {
        Some(p) if !p.as_os_str().is_empty() => resolve(cwd, p),
        _ => cwd.to_path_buf(),
    }
}

fn resolve(root: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        root.join(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_uses_defaults() {
        let file = ProjectFile::parse("").unwrap();
        assert_eq!(file, ProjectFile::default());
        assert_eq!(file.project.library, "work");
        assert_eq!(file.simulation.test_suffix, "_tb.sv");
        assert_eq!(file.simulation.jobs, 1);
        assert_eq!(file.post_synthesis.timescale.as_deref(), Some("1ns/1ps"));
    }

    #[test]
    fn parse_full_file() {
        let text = r#"
            [project]
            name = "uart"
            library = "ece551tb"

            [tools]
            dir = "/opt/questa/bin"
            dc_shell = "/opt/synopsys/bin/dc_shell"

            [env]
            LM_LICENSE_FILE = "1717@license.example.edu"

            [simulation]
            post_run_script = "tests/sim.do"
            timeout_secs = 300
            jobs = 4

            [post_synthesis]
            sim_models = ["models/rst_synch.sv"]
            extra_libraries = ["saed32"]

            [synthesis]
            template = "synth/uart.dc.tmpl"

            [synthesis.variables]
            clock_period = "2.5"
        "#;
        let file = ProjectFile::parse(text).unwrap();
        assert_eq!(file.project.name, "uart");
        assert_eq!(file.project.src_dir, PathBuf::from("src"));
        assert_eq!(file.simulation.jobs, 4);
        assert_eq!(file.simulation.timeout_secs, Some(300));
        assert_eq!(file.synthesis.variables["clock_period"], "2.5");

        let project = Project::new("/proj", file, None);
        let toolchain = project.toolchain();
        assert_eq!(
            toolchain.executable(Tool::Simulator),
            PathBuf::from("/opt/questa/bin/vsim")
        );
        assert_eq!(
            toolchain.executable(Tool::SynthesisShell),
            PathBuf::from("/opt/synopsys/bin/dc_shell")
        );
        assert_eq!(
            toolchain.env.get("LM_LICENSE_FILE").map(String::as_str),
            Some("1717@license.example.edu")
        );
        assert_eq!(project.layout().root(), Path::new("/proj/build"));
        assert_eq!(project.synthesis_top(), "uart");
    }

    #[test]
    fn build_dir_override() {
        let project = Project::new(
            "/proj",
            ProjectFile::default(),
            Some(PathBuf::from("/tmp/out")),
        );
        assert_eq!(project.layout().root(), Path::new("/tmp/out"));
    }

    #[test]
    fn relative_config_path_gives_absolute_root() {
        let cwd = Path::new("/work");
        assert_eq!(
            project_root(cwd, Path::new("hw/simflow.toml")),
            PathBuf::from("/work/hw")
        );
        assert_eq!(
            project_root(cwd, Path::new(DEFAULT_CONFIG_FILE)),
            PathBuf::from("/work")
        );
        assert_eq!(
            project_root(cwd, Path::new("/proj/simflow.toml")),
            PathBuf::from("/proj")
        );

        let project = Project::new(
            project_root(cwd, Path::new("hw/simflow.toml")),
            ProjectFile::default(),
            None,
        );
        assert!(project.layout().root().is_absolute());
        assert_eq!(project.layout().sim_dir(), PathBuf::from("/work/hw/build/sim"));
        assert_eq!(
            project.path(Path::new("tests/sim.do")),
            PathBuf::from("/work/hw/tests/sim.do")
        );
    }

    #[test]
    fn open_yields_absolute_root() {
        let dir = tempfile::tempdir().unwrap();
        let config = dir.path().join("hw").join(DEFAULT_CONFIG_FILE);
        std::fs::create_dir_all(config.parent().unwrap()).unwrap();
        std::fs::write(&config, "[project]\nname = \"uart\"\n").unwrap();

        let project = Project::open(&config, true, None).unwrap();
        assert!(project.root.is_absolute());
        assert!(project.layout().root().is_absolute());
        assert_eq!(project.file.project.name, "uart");
    }

    #[test]
    fn tool_overrides_with_directories_resolve_against_root() {
        let text = r#"
            [tools]
            vsim = "bin/vsim"
            vlog = "vlog-2023"
            vcover = "/opt/questa/bin/vcover"
        "#;
        let project = Project::new("/proj", ProjectFile::parse(text).unwrap(), None);
        let toolchain = project.toolchain();
        assert_eq!(
            toolchain.executable(Tool::Simulator),
            PathBuf::from("/proj/bin/vsim")
        );
        assert_eq!(
            toolchain.executable(Tool::Compiler),
            PathBuf::from("vlog-2023")
        );
        assert_eq!(
            toolchain.executable(Tool::Coverage),
            PathBuf::from("/opt/questa/bin/vcover")
        );
    }

    #[test]
    fn missing_optional_file_is_default() {
        let dir = tempfile::tempdir().unwrap();
        let file = ProjectFile::load(&dir.path().join(DEFAULT_CONFIG_FILE), false).unwrap();
        assert_eq!(file, ProjectFile::default());
        assert!(ProjectFile::load(&dir.path().join(DEFAULT_CONFIG_FILE), true).is_err());
    }

    #[test]
    fn discovers_project_sources() {
        let dir = tempfile::tempdir().unwrap();
        for (sub, name) in [
            ("src", "uart.sv"),
            ("src", "alu.sv"),
            ("models", "ram.sv"),
            ("tests", "uart_tb.sv"),
            ("tests", "tb_pkg.sv"),
        ] {
            std::fs::create_dir_all(dir.path().join(sub)).unwrap();
            std::fs::write(dir.path().join(sub).join(name), "").unwrap();
        }
        let project = Project::new(dir.path(), ProjectFile::default(), None);

        let config = project.campaign(SimOptions::default(), true).unwrap();
        assert_eq!(config.design_sources.len(), 2);
        assert_eq!(
            config.support_sources,
            vec![
                dir.path().join("models/ram.sv"),
                dir.path().join("tests/tb_pkg.sv")
            ]
        );
        assert_eq!(config.tests.len(), 1);
        assert_eq!(config.tests[0].name(), "uart_tb");
        assert!(config.coverage);
    }
}
