//! VUnit backed framework.
//!
//! VUnit is a Python library, so the project is recorded first and rendered
//! into a small run script when [`Framework::main`] is called. The script is
//! executed with the configured interpreter. Arguments the runner did not
//! consume are forwarded to VUnit's own argument parser.

use std::{
    fmt::Write as _,
    io::Write as _,
    path::{Path, PathBuf},
    process::Command,
};

use anyhow::{Context, Result};

use super::{plan::RunPlan, BuiltinLibrary, Framework, OptionValue};
use crate::{
    backend::Resolution,
    locate::SourcePattern,
    matrix::{Configuration, Value},
};

pub const DEFAULT_PYTHON: &str = "python3";

pub struct VunitProject {
    plan: RunPlan,
    python: String,
    workdir: PathBuf,
    script_copy: Option<PathBuf>,
}

impl VunitProject {
    /// Create a project. `args` are passed to `VUnit.from_argv`.
    pub fn from_argv(args: Vec<String>, resolution: Resolution) -> Self {
        Self {
            plan: RunPlan::new(args, resolution),
            python: DEFAULT_PYTHON.into(),
            workdir: PathBuf::from("."),
            script_copy: None,
        }
    }

    /// Interpreter to run the script with.
    pub fn python(mut self, exe: impl Into<String>) -> Self {
        self.python = exe.into();
        self
    }

    /// Working directory of the test run. VUnit puts its output below it.
    pub fn workdir(mut self, dir: impl AsRef<Path>) -> Self {
        self.workdir = dir.as_ref().to_path_buf();
        self
    }

    /// Keep a copy of the generated script at `path`.
    pub fn keep_script(mut self, path: impl AsRef<Path>) -> Self {
        self.script_copy = Some(path.as_ref().to_path_buf());
        self
    }

    pub fn plan(&self) -> &RunPlan {
        &self.plan
    }

    fn command(&self, script: &Path) -> Command {
        let mut cmd = Command::new(&self.python);
        cmd.arg(script)
            .args(&self.plan.args)
            .current_dir(&self.workdir);
        if let Some((key, value)) = self.plan.resolution.env_override() {
            cmd.env(key, value);
        }
        cmd
    }
}

impl Framework for VunitProject {
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
        let script = render_script(&self.plan);
        if let Some(path) = &self.script_copy {
            std::fs::write(path, &script)
                .with_context(|| format!("could not write file `{}`", path.display()))?;
            tracing::info!("run script written to `{}`", path.display());
        }

        let mut file = tempfile::Builder::new()
            .prefix("hdlrun-")
            .suffix(".py")
            .tempfile()
            .context("create run script")?;
        file.write_all(script.as_bytes())
            .and_then(|_| file.flush())
            .context("write run script")?;

        let mut cmd = self.command(file.path());
        tracing::info!(
            "running VUnit with {} ({} configurations)",
            self.plan.resolution.effective,
            self.plan.config_count()
        );
        tracing::debug!("{:?}", cmd);
        let status = cmd
            .status()
            .with_context(|| format!("could not start `{}`", self.python))?;

        // the script must outlive the child
        drop(file);

        match status.code() {
            Some(code) => Ok(code),
            None => {
                tracing::error!("VUnit terminated by signal: {}", status);
                Ok(1)
            }
        }
    }
}

fn builtin_call(builtin: BuiltinLibrary) -> &'static str {
    match builtin {
        BuiltinLibrary::VhdlBuiltins => "add_vhdl_builtins",
        BuiltinLibrary::Com => "add_com",
        BuiltinLibrary::Osvvm => "add_osvvm",
        BuiltinLibrary::VerificationComponents => "add_verification_components",
    }
}

/// Python string literal.
fn py_str(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    for c in s.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if c.is_control() => {
                let _ = write!(out, "\\U{:08x}", c as u32);
            }
            c => out.push(c),
        }
    }
    out.push('"');
    out
}

fn py_value(v: &Value) -> String {
    match v {
        Value::Bool(true) => "True".into(),
        Value::Bool(false) => "False".into(),
        Value::Int(i) => i.to_string(),
        Value::Str(s) => py_str(s),
    }
}

fn py_option(v: &OptionValue) -> String {
    match v {
        OptionValue::Flags(flags) => {
            let items: Vec<_> = flags.iter().map(|f| py_str(f)).collect();
            format!("[{}]", items.join(", "))
        }
        OptionValue::Text(s) => py_str(s),
    }
}

/// Render the VUnit run script of `plan`.
pub fn render_script(plan: &RunPlan) -> String {
    let mut s = String::new();
    let mut line = |l: String| {
        s.push_str(&l);
        s.push('\n');
    };

    line("# Generated by hdlrun, do not edit.".into());
    line("import sys".into());
    line("from vunit import VUnit".into());
    line(String::new());
    line("vu = VUnit.from_argv(argv=sys.argv[1:])".into());
    for b in &plan.builtins {
        line(format!("vu.{}()", builtin_call(*b)));
    }

    for lib in &plan.libraries {
        line(String::new());
        line(format!("lib = vu.add_library({})", py_str(&lib.name)));
        for src in &lib.sources {
            line(format!(
                "lib.add_source_files({}, allow_empty={})",
                py_str(&src.pattern),
                if src.allow_empty { "True" } else { "False" }
            ));
        }
        for tb in &lib.test_benches {
            line(format!("tb = lib.test_bench({})", py_str(&tb.name)));
            for c in &tb.configs {
                let generics: Vec<_> = c
                    .bindings
                    .iter()
                    .map(|(k, v)| format!("{}: {}", py_str(k), py_value(v)))
                    .collect();
                line(format!(
                    "tb.add_config(name={}, generics={{{}}})",
                    py_str(&c.name),
                    generics.join(", ")
                ));
            }
        }
        for (name, value) in &lib.compile_options {
            line(format!(
                "lib.add_compile_option({}, {})",
                py_str(name),
                py_option(value)
            ));
        }
        for (name, value) in &lib.sim_options {
            line(format!("lib.set_sim_option({}, {})", py_str(name), py_option(value)));
        }
    }

    line(String::new());
    line("vu.main()".into());
    s
}
