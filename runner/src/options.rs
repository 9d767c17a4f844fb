//! Simulator specific compile, elaboration and simulation options.
//!
//! Options are named `<simulator>.<option>` and the framework applies only
//! those of the simulator in use, so the whole table is always emitted.

use std::collections::BTreeMap;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::{
    backend::Backend,
    framework::{Framework, OptionValue},
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackendOptionSet {
    pub backend: Backend,
    /// analysis flags, `<simulator>.a_flags`
    #[serde(default)]
    pub compile_flags: Vec<String>,
    /// elaboration flags, `<simulator>.elab_flags`
    #[serde(default)]
    pub elaborate_flags: Vec<String>,
    /// further simulation options without the simulator prefix, e.g.
    /// `heap_size`
    #[serde(default)]
    pub sim_options: BTreeMap<String, OptionValue>,
}

impl BackendOptionSet {
    pub fn new(backend: Backend) -> Self {
        Self {
            backend,
            compile_flags: Vec::new(),
            elaborate_flags: Vec::new(),
            sim_options: BTreeMap::new(),
        }
    }
}

/// Options of the library sources: relaxed rules and a larger heap for nvc.
pub fn default_table() -> Vec<BackendOptionSet> {
    vec![
        BackendOptionSet {
            compile_flags: vec![
                "-frelaxed-rules".into(),
                "-Wno-hide".into(),
                "-Wno-shared".into(),
            ],
            elaborate_flags: vec!["-frelaxed".into()],
            ..BackendOptionSet::new(Backend::Ghdl)
        },
        BackendOptionSet {
            compile_flags: vec!["--relaxed".into()],
            sim_options: BTreeMap::from([(
                "heap_size".to_string(),
                OptionValue::Text("5000M".into()),
            )]),
            ..BackendOptionSet::new(Backend::Nvc)
        },
    ]
}

/// Apply all option sets of `table` to `library`, regardless of the active
/// backend.
pub fn bind(fw: &mut dyn Framework, library: &str, table: &[BackendOptionSet]) -> Result<()> {
    for set in table {
        let sim = set.backend.id();
        if !set.compile_flags.is_empty() {
            let name = format!("{sim}.a_flags");
            fw.add_compile_option(library, &name, &OptionValue::flags(&set.compile_flags))
                .with_context(|| format!("add compile option `{name}`"))?;
        }
        if !set.elaborate_flags.is_empty() {
            let name = format!("{sim}.elab_flags");
            fw.set_sim_option(library, &name, &OptionValue::flags(&set.elaborate_flags))
                .with_context(|| format!("set sim option `{name}`"))?;
        }
        for (option, value) in &set.sim_options {
            let name = format!("{sim}.{option}");
            fw.set_sim_option(library, &name, value)
                .with_context(|| format!("set sim option `{name}`"))?;
        }
        tracing::debug!("bound options of {}", sim);
    }
    Ok(())
}
