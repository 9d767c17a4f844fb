//! Sequencing of a regression run.

use std::collections::HashMap;

use anyhow::{Context, Result};

use crate::{
    backend::Resolution,
    config::Settings,
    framework::Framework,
    locate, options, suite,
};

/// Describe the whole project to `fw`: builtin libraries, the library with
/// its sources, the configurations of every test bench and the simulator
/// options. Returns the number of registered configurations.
pub fn prepare(settings: &Settings, fw: &mut dyn Framework) -> Result<usize> {
    let library = settings.library.as_str();

    for b in &settings.builtins {
        fw.add_builtin(*b)
            .with_context(|| format!("add builtin library {:?}", b))?;
    }
    fw.add_library(library)
        .with_context(|| format!("add library `{}`", library))?;

    let patterns = locate::discover(&settings.root(), &settings.sources)?;
    locate::register(fw, library, &patterns)?;

    let n = suite::register(fw, library, &settings.test_benches, settings.max_configurations)?;

    options::bind(fw, library, &settings.options)?;
    Ok(n)
}

/// Run the regression.
///
/// The backend is resolved from `args` and `env` first, then `init` creates
/// the framework from the remaining arguments and the resolution. The exit
/// status of the framework is returned unchanged. If anything fails before,
/// the framework is never run.
pub fn run<F>(
    settings: &Settings,
    args: Vec<String>,
    env: &HashMap<String, String>,
    init: F,
) -> Result<i32>
where
    F: FnOnce(Vec<String>, Resolution) -> Result<Box<dyn Framework>>,
{
    settings.validate()?;

    let (resolution, rest) = settings.backend.selector().resolve(args, env)?;
    tracing::info!(
        "simulator {} ({:?}), cli selection {}",
        resolution.effective,
        resolution.origin,
        resolution.cli
    );

    let mut fw = init(rest, resolution).context("initialize framework")?;
    prepare(settings, fw.as_mut())?;
    fw.main()
}
