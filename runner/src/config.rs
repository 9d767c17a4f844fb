//! Settings of a regression run.
//!
//! Settings are read from a TOML file. Every field has a default, so a file
//! may consist of nothing but `[[testbench]]` tables:
//!
//! ```toml
//! library = "lib"
//! max_configurations = 10000
//! builtins = ["vhdl_builtins", "com", "osvvm", "verification_components"]
//!
//! [backend]
//! default = "ghdl"
//! conflict = "last-wins"  # or "reject"
//!
//! [sources]
//! patterns = ["src/**/hdl/*.vhd", "test/**/*.vhd"]
//!
//! [[options]]
//! backend = "nvc"
//! compile_flags = ["--relaxed"]
//! sim_options = { heap_size = "5000M" }
//!
//! [[testbench]]
//! id = "fifo_tb"
//! [[testbench.axis]]
//! name = "G_OUT_REG"
//! values = [true, false]
//! ```
//!
//! A file that lists `[[options]]` replaces the built-in option table.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::{
    backend::{Backend, BackendSelector, ConflictPolicy},
    framework::BuiltinLibrary,
    locate::SourceLayout,
    matrix::DEFAULT_MAX_CONFIGURATIONS,
    options::{self, BackendOptionSet},
    suite::{self, TestBenchSpec, DEFAULT_SUITE},
};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BackendSettings {
    /// backend used without selector flag
    pub default: Backend,
    pub conflict: ConflictPolicy,
}

impl BackendSettings {
    pub fn selector(&self) -> BackendSelector {
        BackendSelector::new(self.conflict, self.default)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    /// library all sources are compiled into
    pub library: String,
    /// repository root, relative to the settings file
    pub root: Option<PathBuf>,
    /// working directory of the framework, relative to the settings file,
    /// the root by default
    pub workdir: Option<PathBuf>,
    /// Python interpreter running VUnit
    pub python: String,
    pub builtins: Vec<BuiltinLibrary>,
    pub max_configurations: usize,
    pub backend: BackendSettings,
    pub sources: SourceLayout,
    pub options: Vec<BackendOptionSet>,
    #[serde(rename = "testbench")]
    pub test_benches: Vec<TestBenchSpec>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            library: "lib".into(),
            root: None,
            workdir: None,
            python: crate::framework::DEFAULT_PYTHON.into(),
            builtins: BuiltinLibrary::ALL.to_vec(),
            max_configurations: DEFAULT_MAX_CONFIGURATIONS,
            backend: BackendSettings::default(),
            sources: SourceLayout::default(),
            options: options::default_table(),
            test_benches: Vec::new(),
        }
    }
}

impl Settings {
    pub fn parse(src: &str) -> Result<Self> {
        let settings: Settings = toml::from_str(src).context("parse settings")?;
        settings.validate()?;
        Ok(settings)
    }

    /// Settings with the built-in regression suite.
    pub fn embedded() -> Result<Self> {
        Self::parse(DEFAULT_SUITE).context("built-in suite")
    }

    /// Read the settings file at `path`. Relative paths inside are resolved
    /// against the directory of the file, which is also the default root.
    pub fn load(path: &Path) -> Result<Self> {
        let src = std::fs::read_to_string(path)
            .with_context(|| format!("could not read file `{}`", path.display()))?;
        let mut settings =
            Self::parse(&src).with_context(|| format!("in `{}`", path.display()))?;

        let base = base_dir(path);
        settings.root = Some(match settings.root.take() {
            Some(root) => base.join(root),
            None => base.to_path_buf(),
        });
        if let Some(dir) = settings.workdir.take() {
            settings.workdir = Some(base.join(dir));
        }
        tracing::debug!("loaded settings from `{}`", path.display());
        Ok(settings)
    }

    pub fn validate(&self) -> Result<()> {
        anyhow::ensure!(!self.library.trim().is_empty(), "library name is empty");
        anyhow::ensure!(
            self.max_configurations > 0,
            "max_configurations must be positive"
        );
        suite::validate(&self.test_benches)?;
        Ok(())
    }

    /// Repository root, the current directory if unset.
    pub fn root(&self) -> PathBuf {
        self.root.clone().unwrap_or_else(|| PathBuf::from("."))
    }

    pub fn workdir(&self) -> PathBuf {
        self.workdir.clone().unwrap_or_else(|| self.root())
    }
}

/// Directory relative paths of the settings file at `path` refer to.
fn base_dir(path: &Path) -> &Path {
    // a bare file name has the empty path as parent
    match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        _ => Path::new("."),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_embedded() {
        let s = Settings::embedded().unwrap();
        assert_eq!(s.library, "lib");
        assert_eq!(s.builtins.len(), 4);
        assert_eq!(s.options, options::default_table());
        assert_eq!(s.test_benches.len(), 5);
        assert_eq!(s.backend.selector().default, Backend::Ghdl);
        assert_eq!(s.root(), PathBuf::from("."));
    }

    #[test]
    fn test_parse_full() {
        let s = Settings::parse(
            r#"
library = "work"
python = "python3.11"
builtins = ["vhdl_builtins"]
max_configurations = 64

[backend]
default = "nvc"
conflict = "reject"

[sources]
patterns = ["rtl/*.vhd"]
allow_empty = false

[[options]]
backend = "questasim"
compile_flags = ["-2008"]
sim_options = { "vsim_flags" = ["-voptargs=+acc"] }
"#,
        )
        .unwrap();
        assert_eq!(s.library, "work");
        assert_eq!(s.builtins, [BuiltinLibrary::VhdlBuiltins]);
        assert_eq!(s.backend.default, Backend::Nvc);
        assert_eq!(s.backend.conflict, ConflictPolicy::Reject);
        assert_eq!(s.sources.patterns, ["rtl/*.vhd"]);
        assert!(!s.sources.allow_empty);
        assert_eq!(s.options.len(), 1);
        assert_eq!(s.options[0].backend, Backend::Questasim);
        assert_eq!(
            s.options[0].sim_options["vsim_flags"],
            crate::framework::OptionValue::flags(["-voptargs=+acc"])
        );
        assert!(s.test_benches.is_empty());
    }

    #[test]
    fn test_parse_invalid() {
        assert!(Settings::parse("unknown_key = 1").is_err());
        assert!(Settings::parse("library = \"\"").is_err());
        assert!(Settings::parse("max_configurations = 0").is_err());
        assert!(Settings::parse("[backend]\ndefault = \"iverilog\"").is_err());
    }

    #[test]
    fn test_load_relative_paths() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("regress.toml");
        std::fs::write(&path, "root = \"..\"\nworkdir = \"out\"\n")?;
        let s = Settings::load(&path)?;
        assert_eq!(s.root(), dir.path().join(".."));
        assert_eq!(s.workdir(), dir.path().join("out"));

        std::fs::write(&path, "")?;
        let s = Settings::load(&path)?;
        assert_eq!(s.root(), dir.path());
        assert_eq!(s.workdir(), dir.path());
        Ok(())
    }

    #[test]
    fn test_base_dir() {
        assert_eq!(base_dir(Path::new("regress.toml")), Path::new("."));
        assert_eq!(base_dir(Path::new("sub/regress.toml")), Path::new("sub"));
        assert_eq!(base_dir(Path::new("/regress.toml")), Path::new("/"));
    }
}
