//! The test execution framework seen from the runner.
//!
//! The runner never compiles or simulates anything itself. It describes the
//! project (libraries, sources, test bench configurations and simulator
//! options) to a [`Framework`] and then hands control over to it.
//!
//! Two frameworks are provided:
//!
//! - [`VunitProject`] drives VUnit through a generated Python script.
//! - [`PlanProject`] only records the project and prints it, used for dry
//!   runs.

mod plan;
mod vunit;

use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::{locate::SourcePattern, matrix::Configuration};

pub use plan::{BenchPlan, LibraryPlan, PlanProject, RunPlan, SourcePlan};
pub use vunit::{render_script, VunitProject, DEFAULT_PYTHON};

/// Pre-compiled libraries shipped with the framework.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BuiltinLibrary {
    VhdlBuiltins,
    Com,
    Osvvm,
    VerificationComponents,
}

impl BuiltinLibrary {
    pub const ALL: [BuiltinLibrary; 4] = [
        BuiltinLibrary::VhdlBuiltins,
        BuiltinLibrary::Com,
        BuiltinLibrary::Osvvm,
        BuiltinLibrary::VerificationComponents,
    ];
}

/// Value of a compile or simulation option.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OptionValue {
    Flags(Vec<String>),
    Text(String),
}

impl OptionValue {
    pub fn flags<S: Into<String>>(flags: impl IntoIterator<Item = S>) -> Self {
        OptionValue::Flags(flags.into_iter().map(Into::into).collect())
    }
}

/// Project model of the test execution framework.
///
/// Calls arrive in the order libraries, sources, test benches with their
/// configurations, options, and finally [`Framework::main`].
pub trait Framework {
    fn add_builtin(&mut self, builtin: BuiltinLibrary) -> Result<()>;

    fn add_library(&mut self, name: &str) -> Result<()>;

    /// Add all files matching `pattern`. Returns the number of files found,
    /// which may be zero if the pattern allows it.
    fn add_source_files(&mut self, library: &str, pattern: &SourcePattern) -> Result<usize>;

    /// Look up a test bench. Fails if no source of the library declares it.
    fn test_bench(&mut self, library: &str, name: &str) -> Result<()>;

    /// Add a named configuration to a test bench obtained by
    /// [`Framework::test_bench`].
    fn add_config(&mut self, library: &str, bench: &str, config: &Configuration) -> Result<()>;

    /// Add a compile option, e.g. `ghdl.a_flags`.
    fn add_compile_option(&mut self, library: &str, name: &str, value: &OptionValue) -> Result<()>;

    /// Set a simulation option, e.g. `nvc.heap_size`.
    fn set_sim_option(&mut self, library: &str, name: &str, value: &OptionValue) -> Result<()>;

    /// Run the project. Returns the exit status of the test run.
    fn main(self: Box<Self>) -> Result<i32>;
}
