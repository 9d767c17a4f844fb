//! Errors raised while assembling a run, before anything is handed to the
//! framework. Everything else travels as [`anyhow::Error`].

use std::path::PathBuf;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("conflicting backend flags: `{first}` and `{second}`")]
    ConflictingBackends { first: String, second: String },

    #[error("unknown simulator `{value}` in {key}")]
    UnknownBackend { key: String, value: String },

    #[error("axis name must not be empty")]
    EmptyAxisName,

    #[error("`=` is not allowed in `{text}` of axis `{axis}`")]
    ReservedCharacter { axis: String, text: String },

    #[error("duplicate axis `{0}`")]
    DuplicateAxis(String),

    #[error("axis `{0}` has no values")]
    EmptyAxis(String),

    #[error("axis `{axis}` lists value `{value}` twice")]
    DuplicateValue { axis: String, value: String },

    #[error("test bench `{0}` is declared twice")]
    DuplicateTestBench(String),

    #[error("too many generated configurations for `{bench}`: {count} exceeds the limit of {limit}")]
    TooManyConfigurations {
        bench: String,
        count: String,
        limit: usize,
    },

    #[error("test bench `{bench}` not found in library `{library}`")]
    UnknownTestBench { library: String, bench: String },

    #[error("no source file matches `{}`", .0.display())]
    NoMatch(PathBuf),
}
