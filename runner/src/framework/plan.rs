//! Recorded project model. Serves as the dry-run framework and as the
//! registry behind the VUnit script generator.

use std::{
    collections::BTreeSet,
    io::Write,
    path::{Path, PathBuf},
};

use ansi_term::Colour;
use anyhow::{bail, Context, Result};
use serde::Serialize;

use super::{BuiltinLibrary, Framework, OptionValue};
use crate::{
    backend::Resolution,
    error::ConfigError,
    locate::{self, SourcePattern},
    matrix::Configuration,
};

#[derive(Debug, Clone, Serialize)]
pub struct SourcePlan {
    pub pattern: String,
    pub allow_empty: bool,
    pub files: Vec<PathBuf>,
}

#[derive(Debug, Clone, Serialize)]
pub struct BenchPlan {
    pub name: String,
    pub configs: Vec<Configuration>,
}

#[derive(Debug, Clone, Serialize)]
pub struct LibraryPlan {
    pub name: String,
    pub sources: Vec<SourcePlan>,
    pub test_benches: Vec<BenchPlan>,
    pub compile_options: Vec<(String, OptionValue)>,
    pub sim_options: Vec<(String, OptionValue)>,
    /// entities declared by the sources, lower case
    #[serde(skip)]
    entities: BTreeSet<String>,
}

impl LibraryPlan {
    fn new(name: &str) -> Self {
        Self {
            name: name.into(),
            sources: Vec::new(),
            test_benches: Vec::new(),
            compile_options: Vec::new(),
            sim_options: Vec::new(),
            entities: BTreeSet::new(),
        }
    }

    pub fn bench(&self, name: &str) -> Option<&BenchPlan> {
        self.test_benches
            .iter()
            .find(|b| b.name.eq_ignore_ascii_case(name))
    }

    pub fn files(&self) -> impl Iterator<Item = &PathBuf> {
        self.sources.iter().flat_map(|s| s.files.iter())
    }

    pub fn declares(&self, entity: &str) -> bool {
        self.entities.contains(&entity.to_ascii_lowercase())
    }
}

/// Everything the runner told the framework, in order.
#[derive(Debug, Clone, Serialize)]
pub struct RunPlan {
    pub resolution: Resolution,
    /// arguments for the framework's own command line parser
    pub args: Vec<String>,
    pub builtins: Vec<BuiltinLibrary>,
    pub libraries: Vec<LibraryPlan>,
}

impl RunPlan {
    pub fn new(args: Vec<String>, resolution: Resolution) -> Self {
        Self {
            resolution,
            args,
            builtins: Vec::new(),
            libraries: Vec::new(),
        }
    }

    pub fn library(&self, name: &str) -> Option<&LibraryPlan> {
        self.libraries.iter().find(|l| l.name == name)
    }

    fn library_mut(&mut self, name: &str) -> Result<&mut LibraryPlan> {
        match self.libraries.iter_mut().find(|l| l.name == name) {
            Some(lib) => Ok(lib),
            None => bail!("library `{}` does not exist", name),
        }
    }

    /// Total number of registered configurations.
    pub fn config_count(&self) -> usize {
        self.libraries
            .iter()
            .flat_map(|l| &l.test_benches)
            .map(|b| b.configs.len())
            .sum()
    }

    pub(super) fn add_builtin(&mut self, builtin: BuiltinLibrary) -> Result<()> {
        if !self.builtins.contains(&builtin) {
            self.builtins.push(builtin);
        }
        Ok(())
    }

    pub(super) fn add_library(&mut self, name: &str) -> Result<()> {
        anyhow::ensure!(self.library(name).is_none(), "library `{}` added twice", name);
        self.libraries.push(LibraryPlan::new(name));
        Ok(())
    }

    pub(super) fn add_source_files(&mut self, library: &str, pattern: &SourcePattern) -> Result<usize> {
        let files = pattern.expand()?;
        let lib = self.library_mut(library)?;
        for f in &files {
            match locate::entities_in(f) {
                Ok(names) => lib.entities.extend(names),
                Err(err) => tracing::warn!("{:#}", err),
            }
        }
        let n = files.len();
        lib.sources.push(SourcePlan {
            pattern: pattern.pattern.clone(),
            allow_empty: pattern.allow_empty,
            files,
        });
        Ok(n)
    }

    pub(super) fn test_bench(&mut self, library: &str, name: &str) -> Result<()> {
        let lib = self.library_mut(library)?;
        // VHDL identifiers are case insensitive
        if lib.bench(name).is_some() {
            return Ok(());
        }
        if !lib.declares(name) {
            return Err(ConfigError::UnknownTestBench {
                library: library.into(),
                bench: name.into(),
            }
            .into());
        }
        lib.test_benches.push(BenchPlan {
            name: name.into(),
            configs: Vec::new(),
        });
        Ok(())
    }

    pub(super) fn add_config(&mut self, library: &str, bench: &str, config: &Configuration) -> Result<()> {
        let lib = self.library_mut(library)?;
        let Some(tb) = lib
            .test_benches
            .iter_mut()
            .find(|b| b.name.eq_ignore_ascii_case(bench))
        else {
            bail!("test bench `{}` was not looked up", bench);
        };
        anyhow::ensure!(
            tb.configs.iter().all(|c| c.name != config.name),
            "config `{}` added twice",
            config.name
        );
        tb.configs.push(config.clone());
        Ok(())
    }

    pub(super) fn add_compile_option(&mut self, library: &str, name: &str, value: &OptionValue) -> Result<()> {
        let lib = self.library_mut(library)?;
        lib.compile_options.push((name.into(), value.clone()));
        Ok(())
    }

    pub(super) fn set_sim_option(&mut self, library: &str, name: &str, value: &OptionValue) -> Result<()> {
        let lib = self.library_mut(library)?;
        match lib.sim_options.iter_mut().find(|(k, _)| k == name) {
            Some((_, v)) => *v = value.clone(),
            None => lib.sim_options.push((name.into(), value.clone())),
        }
        Ok(())
    }

    /// Human readable listing of the plan.
    pub fn write_listing(&self, w: &mut impl Write, color: bool) -> std::io::Result<()> {
        let paint = |c: Colour, s: &str| {
            if color {
                c.bold().paint(s).to_string()
            } else {
                s.to_string()
            }
        };
        writeln!(
            w,
            "simulator: {} ({:?})",
            paint(Colour::Green, self.resolution.effective.id()),
            self.resolution.origin
        )?;
        for lib in &self.libraries {
            writeln!(
                w,
                "library {}: {} source files",
                paint(Colour::Yellow, lib.name.as_str()),
                lib.files().count()
            )?;
            for tb in &lib.test_benches {
                writeln!(w, "  {} ({} configs)", paint(Colour::Cyan, tb.name.as_str()), tb.configs.len())?;
                for c in &tb.configs {
                    writeln!(w, "    {}.{}.{}", lib.name, tb.name, c.name)?;
                }
            }
        }
        writeln!(w, "{} configurations", self.config_count())
    }
}

/// Framework that records the project instead of running it.
pub struct PlanProject {
    plan: RunPlan,
    json_out: Option<PathBuf>,
    quiet: bool,
}

impl PlanProject {
    pub fn new(args: Vec<String>, resolution: Resolution) -> Self {
        Self {
            plan: RunPlan::new(args, resolution),
            json_out: None,
            quiet: false,
        }
    }

    /// Also write the plan as JSON to `path` when the run completes.
    pub fn with_json_output(mut self, path: impl AsRef<Path>) -> Self {
        self.json_out = Some(path.as_ref().to_path_buf());
        self
    }

    /// Don't print the listing to stdout.
    pub fn quiet(mut self) -> Self {
        self.quiet = true;
        self
    }

    pub fn plan(&self) -> &RunPlan {
        &self.plan
    }

    pub fn into_plan(self) -> RunPlan {
        self.plan
    }

    /// Write the JSON export and the listing.
    fn report(&self) -> Result<()> {
        if let Some(path) = &self.json_out {
            let json = serde_json::to_string_pretty(&self.plan).context("serialize run plan")?;
            std::fs::write(path, json)
                .with_context(|| format!("could not write file `{}`", path.display()))?;
            tracing::info!("run plan written to `{}`", path.display());
        }
        if !self.quiet {
            let stdout = std::io::stdout();
            self.plan
                .write_listing(&mut stdout.lock(), true)
                .context("write listing")?;
        }
        Ok(())
    }
}

impl Framework for PlanProject {
    fn add_builtin(&mut self, builtin: BuiltinLibrary) -> Result<()> {
        self.plan.add_builtin(builtin)
    }

    fn add_library(&mut self, name: &str) -> Result<()> {
        self.plan.add_library(name)
    }

    fn add_source_files(&mut self, library: &str, pattern: &SourcePattern) -> Result<usize> {
        self.plan.add_source_files(library, pattern)
    }

    fn test_bench(&mut self, library: &str, name: &str) -> Result<()> {
        self.plan.test_bench(library, name)
    }

    fn add_config(&mut self, library: &str, bench: &str, config: &Configuration) -> Result<()> {
        self.plan.add_config(library, bench, config)
    }

    fn add_compile_option(&mut self, library: &str, name: &str, value: &OptionValue) -> Result<()> {
        self.plan.add_compile_option(library, name, value)
    }

    fn set_sim_option(&mut self, library: &str, name: &str, value: &OptionValue) -> Result<()> {
        self.plan.set_sim_option(library, name, value)
    }

    fn main(self: Box<Self>) -> Result<i32> {
        self.report()?;
        Ok(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{Backend, Origin};
    use crate::matrix::Value;

    fn resolution() -> Resolution {
        Resolution {
            cli: Backend::Ghdl,
            effective: Backend::Ghdl,
            origin: Origin::Default,
        }
    }

    fn project_with_bench(dir: &Path) -> PlanProject {
        let tb = dir.join("test/fifo_tb.vhd");
        std::fs::create_dir_all(tb.parent().unwrap()).unwrap();
        std::fs::write(&tb, "entity fifo_tb is\nend entity;\n").unwrap();

        let mut p = PlanProject::new(vec![], resolution()).quiet();
        p.add_library("lib").unwrap();
        let pattern = SourcePattern {
            pattern: format!("{}/test/**/*.vhd", dir.display()),
            allow_empty: true,
        };
        assert_eq!(p.add_source_files("lib", &pattern).unwrap(), 1);
        p
    }

    #[test]
    fn test_bench_lookup() {
        let dir = tempfile::tempdir().unwrap();
        let mut p = project_with_bench(dir.path());
        p.test_bench("lib", "fifo_tb").unwrap();
        // VHDL identifiers are case insensitive
        p.test_bench("lib", "FIFO_TB").unwrap();
        assert_eq!(p.plan().library("lib").unwrap().test_benches.len(), 1);
        let err = p.test_bench("lib", "axil_ram_tb").unwrap_err();
        assert_eq!(
            err.downcast_ref::<ConfigError>(),
            Some(&ConfigError::UnknownTestBench {
                library: "lib".into(),
                bench: "axil_ram_tb".into()
            })
        );
        assert!(p.test_bench("other", "fifo_tb").is_err());
    }

    #[test]
    fn test_config_registration() {
        let dir = tempfile::tempdir().unwrap();
        let mut p = project_with_bench(dir.path());
        let c = Configuration::new(vec![("G_OUT_REG".into(), Value::Bool(true))]);

        // unknown bench handle
        assert!(p.add_config("lib", "fifo_tb", &c).is_err());

        p.test_bench("lib", "fifo_tb").unwrap();
        p.add_config("lib", "fifo_tb", &c).unwrap();
        assert!(p.add_config("lib", "fifo_tb", &c).is_err());

        let plan = p.into_plan();
        assert_eq!(plan.config_count(), 1);
        assert_eq!(
            plan.library("lib").unwrap().bench("fifo_tb").unwrap().configs[0].name,
            "G_OUT_REG=true"
        );
    }

    #[test]
    fn test_options() {
        let mut p = PlanProject::new(vec![], resolution()).quiet();
        p.add_library("lib").unwrap();
        p.add_compile_option("lib", "nvc.a_flags", &OptionValue::flags(["--relaxed"]))
            .unwrap();
        p.set_sim_option("lib", "nvc.heap_size", &OptionValue::Text("1G".into()))
            .unwrap();
        p.set_sim_option("lib", "nvc.heap_size", &OptionValue::Text("5000M".into()))
            .unwrap();

        let lib = p.plan().library("lib").unwrap();
        assert_eq!(lib.compile_options.len(), 1);
        assert_eq!(
            lib.sim_options,
            [("nvc.heap_size".to_string(), OptionValue::Text("5000M".into()))]
        );
    }

    #[test]
    fn test_listing_and_json() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let mut p = project_with_bench(dir.path());
        p.test_bench("lib", "fifo_tb")?;
        p.add_config(
            "lib",
            "fifo_tb",
            &Configuration::new(vec![("G_AXIS_STALL_PROB".into(), Value::Int(50))]),
        )?;

        let mut out = Vec::new();
        p.plan().write_listing(&mut out, false)?;
        let out = String::from_utf8(out)?;
        assert!(out.contains("simulator: ghdl (Default)"));
        assert!(out.contains("lib.fifo_tb.G_AXIS_STALL_PROB=50"));
        assert!(out.ends_with("1 configurations\n"));

        let json_path = dir.path().join("plan.json");
        let p = p.with_json_output(&json_path);
        Box::new(p).main()?;
        let json: serde_json::Value = serde_json::from_str(&std::fs::read_to_string(&json_path)?)?;
        assert_eq!(json["resolution"]["effective"], "ghdl");
        assert_eq!(
            json["libraries"][0]["test_benches"][0]["configs"][0]["bindings"][0][1],
            50
        );
        Ok(())
    }
}
