//! Simulator backend selection.
//!
//! The backend is picked once per run from the selector flags on the command
//! line (`--ghdl`, `--nvc`, ...). The framework reads the simulator from
//! [`SIMULATOR_ENV`]; if that variable is already set by the caller it wins
//! over the flags, otherwise the flag selection is written into the
//! environment of the framework process.

use std::{collections::HashMap, fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Environment variable the framework reads its simulator from.
pub const SIMULATOR_ENV: &str = "VUNIT_SIMULATOR";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    #[default]
    Ghdl,
    Nvc,
    Questasim,
    Modelsim,
    RivieraPro,
    ActiveHdl,
}

impl Backend {
    pub const ALL: [Backend; 6] = [
        Backend::Ghdl,
        Backend::Nvc,
        Backend::Questasim,
        Backend::Modelsim,
        Backend::RivieraPro,
        Backend::ActiveHdl,
    ];

    /// Name of the simulator as understood by the framework. Also the prefix
    /// of backend specific option names (`ghdl.a_flags`).
    pub fn id(self) -> &'static str {
        match self {
            Backend::Ghdl => "ghdl",
            Backend::Nvc => "nvc",
            Backend::Questasim => "questasim",
            Backend::Modelsim => "modelsim",
            Backend::RivieraPro => "rivierapro",
            Backend::ActiveHdl => "activehdl",
        }
    }

    /// Command line flag selecting this backend.
    pub fn flag(self) -> &'static str {
        match self {
            Backend::Ghdl => "--ghdl",
            Backend::Nvc => "--nvc",
            Backend::Questasim => "--questasim",
            Backend::Modelsim => "--modelsim",
            Backend::RivieraPro => "--rivierapro",
            Backend::ActiveHdl => "--activehdl",
        }
    }

    pub fn from_flag(flag: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|b| b.flag() == flag)
    }
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

impl FromStr for Backend {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        Self::ALL
            .into_iter()
            .find(|b| b.id().eq_ignore_ascii_case(s))
            .ok_or_else(|| ConfigError::UnknownBackend {
                key: SIMULATOR_ENV.into(),
                value: s.into(),
            })
    }
}

/// What to do when more than one distinct backend flag is given.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ConflictPolicy {
    /// The flag that comes last on the command line is used.
    #[default]
    LastWins,
    /// Fail with [`ConfigError::ConflictingBackends`].
    Reject,
}

/// Where the effective backend came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Origin {
    Default,
    Cli,
    Environment,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Resolution {
    /// Selection made by the command line (or the default).
    pub cli: Backend,
    /// Backend the framework actually runs with.
    pub effective: Backend,
    pub origin: Origin,
}

impl Resolution {
    /// The variable to put into the framework environment, `None` if the
    /// caller already set it.
    pub fn env_override(&self) -> Option<(&'static str, &'static str)> {
        match self.origin {
            Origin::Environment => None,
            Origin::Default | Origin::Cli => Some((SIMULATOR_ENV, self.effective.id())),
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct BackendSelector {
    pub policy: ConflictPolicy,
    pub default: Backend,
}

impl BackendSelector {
    pub fn new(policy: ConflictPolicy, default: Backend) -> Self {
        Self { policy, default }
    }

    /// Remove all backend flags from `args`, returning the selected backend
    /// (if any flag was present) and the remaining arguments in order.
    pub fn extract(&self, args: Vec<String>) -> Result<(Option<Backend>, Vec<String>), ConfigError> {
        let mut selected: Option<Backend> = None;
        let mut rest = Vec::with_capacity(args.len());
        for arg in args {
            let Some(backend) = Backend::from_flag(&arg) else {
                rest.push(arg);
                continue;
            };
            if let Some(prev) = selected {
                if prev != backend {
                    if self.policy == ConflictPolicy::Reject {
                        return Err(ConfigError::ConflictingBackends {
                            first: prev.flag().into(),
                            second: backend.flag().into(),
                        });
                    }
                    tracing::debug!("`{}` overrides `{}`", backend.flag(), prev.flag());
                }
            }
            selected = Some(backend);
        }
        Ok((selected, rest))
    }

    /// Resolve the backend of this run. Returns the resolution and the
    /// arguments left for the framework.
    pub fn resolve(
        &self,
        args: Vec<String>,
        env: &HashMap<String, String>,
    ) -> Result<(Resolution, Vec<String>), ConfigError> {
        let (selected, rest) = self.extract(args)?;
        let (cli, origin) = match selected {
            Some(b) => (b, Origin::Cli),
            None => (self.default, Origin::Default),
        };

        let overridden = match env.get(SIMULATOR_ENV).map(|v| v.trim()) {
            Some("") => {
                tracing::warn!("{} is set but empty, ignoring it", SIMULATOR_ENV);
                None
            }
            Some(v) => Some(v.parse::<Backend>()?),
            None => None,
        };

        let resolution = match overridden {
            Some(effective) => {
                if origin == Origin::Cli && effective != cli {
                    tracing::warn!(
                        "{}={} takes precedence over `{}`",
                        SIMULATOR_ENV,
                        effective,
                        cli.flag()
                    );
                }
                Resolution {
                    cli,
                    effective,
                    origin: Origin::Environment,
                }
            }
            None => Resolution {
                cli,
                effective: cli,
                origin,
            },
        };
        Ok((resolution, rest))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(v: &[&str]) -> Vec<String> {
        v.iter().map(|s| s.to_string()).collect()
    }

    fn env(v: Option<&str>) -> HashMap<String, String> {
        v.map(|v| (SIMULATOR_ENV.to_string(), v.to_string()))
            .into_iter()
            .collect()
    }

    #[test]
    fn test_default_backend() {
        let (r, rest) = BackendSelector::default()
            .resolve(args(&["-p", "4"]), &env(None))
            .unwrap();
        assert_eq!(r.effective, Backend::Ghdl);
        assert_eq!(r.origin, Origin::Default);
        assert_eq!(r.env_override(), Some((SIMULATOR_ENV, "ghdl")));
        assert_eq!(rest, args(&["-p", "4"]));
    }

    #[test]
    fn test_flags_removed_in_place() {
        let (r, rest) = BackendSelector::default()
            .resolve(args(&["lib.fifo_tb.*", "--nvc", "-v"]), &env(None))
            .unwrap();
        assert_eq!(r.effective, Backend::Nvc);
        assert_eq!(r.origin, Origin::Cli);
        assert_eq!(rest, args(&["lib.fifo_tb.*", "-v"]));
    }

    #[test]
    fn test_last_flag_wins() {
        let (r, rest) = BackendSelector::default()
            .resolve(args(&["--ghdl", "--nvc"]), &env(None))
            .unwrap();
        assert_eq!(r.effective, Backend::Nvc);
        assert!(rest.is_empty());
    }

    #[test]
    fn test_reject_conflict() {
        let sel = BackendSelector::new(ConflictPolicy::Reject, Backend::Ghdl);
        let err = sel
            .resolve(args(&["--ghdl", "--nvc"]), &env(None))
            .unwrap_err();
        assert_eq!(
            err,
            ConfigError::ConflictingBackends {
                first: "--ghdl".into(),
                second: "--nvc".into()
            }
        );
        // the same flag twice is not a conflict
        let (r, _) = sel.resolve(args(&["--nvc", "--nvc"]), &env(None)).unwrap();
        assert_eq!(r.effective, Backend::Nvc);
    }

    #[test]
    fn test_env_precedence() {
        let (r, _) = BackendSelector::default()
            .resolve(args(&["--ghdl"]), &env(Some("nvc")))
            .unwrap();
        assert_eq!(r.cli, Backend::Ghdl);
        assert_eq!(r.effective, Backend::Nvc);
        assert_eq!(r.origin, Origin::Environment);
        assert_eq!(r.env_override(), None);

        let (r, _) = BackendSelector::default()
            .resolve(vec![], &env(Some(" RivieraPro ")))
            .unwrap();
        assert_eq!(r.effective, Backend::RivieraPro);
    }

    #[test]
    fn test_env_unknown_or_empty() {
        let err = BackendSelector::default()
            .resolve(vec![], &env(Some("iverilog")))
            .unwrap_err();
        assert!(matches!(err, ConfigError::UnknownBackend { .. }));

        let (r, _) = BackendSelector::default()
            .resolve(args(&["--nvc"]), &env(Some("  ")))
            .unwrap();
        assert_eq!(r.effective, Backend::Nvc);
        assert_eq!(r.origin, Origin::Cli);
    }

    #[test]
    fn test_backend_names() {
        for b in Backend::ALL {
            assert_eq!(b.id().parse::<Backend>().unwrap(), b);
            assert_eq!(Backend::from_flag(b.flag()), Some(b));
            assert_eq!(b.flag(), format!("--{}", b.id()));
        }
    }
}
