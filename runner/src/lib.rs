//! Regression launcher for a VHDL component library.
//!
//! The runner selects a simulator, collects the sources of the repository and
//! expands the parameter sweeps of every test bench into named
//! configurations. Compilation, simulation and reporting are left to the test
//! framework (VUnit), see [`framework`].

pub mod backend;
pub mod config;
pub mod driver;
mod error;
pub mod framework;
pub mod locate;
pub mod matrix;
pub mod options;
pub mod suite;

pub use backend::{Backend, BackendSelector, ConflictPolicy, Resolution, SIMULATOR_ENV};
pub use config::Settings;
pub use error::ConfigError;
pub use matrix::{AxisSet, Configuration, ParameterAxis, Value};
pub use suite::TestBenchSpec;
