use std::{collections::HashMap, ffi::OsString, path::PathBuf};

use anyhow::{Context, Result};
use binutils::{clap, verbose};
use clap::Parser;
use hdl_runner::{
    driver,
    framework::{Framework, PlanProject, VunitProject},
    Backend, ConflictPolicy, Settings,
};

const AFTER_HELP: &str = "\
Simulator selection:
  --ghdl, --nvc, --questasim, --modelsim, --rivierapro, --activehdl
      Run with the given simulator (default: ghdl). The flags are accepted
      anywhere on the command line. VUNIT_SIMULATOR takes precedence.

Everything from the first unknown argument on, or after `--`, is passed to
VUnit, e.g. `hdlrun --nvc -- 'lib.fifo_tb.*' -p 8 -v`.";

/// Regression runner for the VHDL component library
#[derive(Parser, Debug)]
#[command(
    name = "hdlrun",
    author,
    version,
    about,
    long_about = None,
    styles = binutils::get_styles(),
    after_help = AFTER_HELP,
)]
struct Args {
    /// Settings file (TOML). The built-in suite is run if omitted.
    #[arg(short = 'c', long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Repository root, overrides the settings file
    #[arg(long, value_name = "DIR")]
    root: Option<PathBuf>,

    /// Python interpreter running VUnit
    #[arg(long, value_name = "EXE")]
    python: Option<String>,

    /// Fail if different simulator flags are given instead of using the last
    #[arg(long)]
    strict_backend: bool,

    /// List the generated configurations instead of running them
    #[arg(long)]
    dry_run: bool,

    /// Write the run plan as JSON (dry run only)
    #[arg(long, value_name = "FILE", requires = "dry_run")]
    plan_json: Option<PathBuf>,

    /// Keep a copy of the generated VUnit script
    #[arg(long, value_name = "FILE", conflicts_with = "dry_run")]
    emit_script: Option<PathBuf>,

    /// Write logs to a file instead of stderr
    #[arg(long, value_name = "FILE")]
    log_file: Option<PathBuf>,

    /// Log as JSON lines
    #[arg(long)]
    log_json: bool,

    #[command(flatten)]
    verbose: verbose::Verbosity,

    /// Arguments for VUnit
    #[arg(
        value_name = "VUNIT_ARGS",
        trailing_var_arg = true,
        allow_hyphen_values = true
    )]
    framework_args: Vec<String>,
}

fn main() -> Result<()> {
    // simulator flags may appear anywhere, even among the VUnit arguments
    // non unicode arguments are never selectors, clap reports them
    let mut selectors = Vec::new();
    let mut argv: Vec<OsString> = Vec::new();
    for arg in std::env::args_os() {
        let flag = arg
            .to_str()
            .filter(|a| Backend::from_flag(a).is_some())
            .map(str::to_string);
        match flag {
            Some(flag) => selectors.push(flag),
            None => argv.push(arg),
        }
    }
    let args = Args::parse_from(argv);

    let log_file = match &args.log_file {
        Some(path) => Some(
            std::fs::File::create(path)
                .with_context(|| format!("could not create file `{}`", path.display()))?,
        ),
        None => None,
    };
    let format = if args.log_json {
        binutils::LogFormat::Json
    } else {
        binutils::LogFormat::Text
    };
    let log_level = binutils::verbose_level_to_trace(args.verbose.log_level());
    binutils::logging_setup(log_level, log_file.as_ref(), format);

    let mut settings = match &args.config {
        Some(path) => Settings::load(path)?,
        None => Settings::embedded()?,
    };
    if let Some(root) = args.root {
        settings.root = Some(root);
    }
    if let Some(python) = args.python {
        settings.python = python;
    }
    if args.strict_backend {
        settings.backend.conflict = ConflictPolicy::Reject;
    }

    let env: HashMap<String, String> = std::env::vars_os()
        .filter_map(|(k, v)| Some((k.into_string().ok()?, v.into_string().ok()?)))
        .collect();

    let mut fw_args = selectors;
    fw_args.extend(args.framework_args);

    let python = settings.python.clone();
    let workdir = settings.workdir();
    let code = driver::run(&settings, fw_args, &env, |rest, resolution| {
        let fw: Box<dyn Framework> = if args.dry_run {
            let mut p = PlanProject::new(rest, resolution);
            if let Some(path) = &args.plan_json {
                p = p.with_json_output(path);
            }
            Box::new(p)
        } else {
            let mut p = VunitProject::from_argv(rest, resolution)
                .python(python)
                .workdir(workdir);
            if let Some(path) = &args.emit_script {
                p = p.keep_script(path);
            }
            Box::new(p)
        };
        Ok(fw)
    })?;

    tracing::debug!("exit status {}", code);
    std::process::exit(code)
}
