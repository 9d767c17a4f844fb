//! Test benches of the regression suite and their parameter axes.

use std::collections::HashSet;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::{error::ConfigError, framework::Framework, matrix};

/// Suite run when no settings file is given.
pub const DEFAULT_SUITE: &str = include_str!("default.toml");

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TestBenchSpec {
    /// entity name of the test bench
    pub id: String,
    #[serde(default, rename = "axis")]
    pub axes: matrix::AxisSet,
}

/// Check that no test bench is declared twice. VHDL names are case
/// insensitive.
pub fn validate(specs: &[TestBenchSpec]) -> Result<(), ConfigError> {
    let mut seen = HashSet::new();
    for spec in specs {
        if !seen.insert(spec.id.to_ascii_lowercase()) {
            return Err(ConfigError::DuplicateTestBench(spec.id.clone()));
        }
    }
    Ok(())
}

/// Look up every test bench and register its configuration matrix. Returns
/// the number of registered configurations.
pub fn register(
    fw: &mut dyn Framework,
    library: &str,
    specs: &[TestBenchSpec],
    limit: usize,
) -> Result<usize> {
    validate(specs)?;
    let mut total = 0;
    for spec in specs {
        fw.test_bench(library, &spec.id)
            .with_context(|| format!("look up test bench `{}`", spec.id))?;
        total += matrix::register(fw, library, spec, limit)?;
    }
    tracing::info!("{} configurations in {} test benches", total, specs.len());
    Ok(total)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matrix::Value;

    #[derive(Debug, Deserialize)]
    struct Suite {
        testbench: Vec<TestBenchSpec>,
    }

    fn default_suite() -> Vec<TestBenchSpec> {
        toml::from_str::<Suite>(DEFAULT_SUITE).unwrap().testbench
    }

    #[test]
    fn test_default_suite() {
        let specs = default_suite();
        validate(&specs).unwrap();
        let sizes: Vec<_> = specs
            .iter()
            .map(|s| (s.id.as_str(), s.axes.product_size().unwrap()))
            .collect();
        assert_eq!(
            sizes,
            [
                ("strm_pipes_tb", 16),
                ("fifo_tb", 4),
                ("fifo_async_tb", 28),
                ("cdc_vector_tb", 14),
                ("axil_ram_tb", 8),
            ]
        );

        let first = specs[0].axes.expand().next().unwrap();
        assert_eq!(
            first.name,
            "G_STAGES=1-G_READY_PIPE=true-G_DATA_PIPE=true-G_AXIS_STALL_PROB=0"
        );
        assert_eq!(first.get("G_READY_PIPE"), Some(&Value::Bool(true)));
    }

    #[test]
    fn test_parse_errors() {
        let src = r#"
[[testbench]]
id = "a_tb"
[[testbench.axis]]
name = "G_A"
values = [1, 1]
"#;
        let err = toml::from_str::<Suite>(src).unwrap_err();
        assert!(err.to_string().contains("lists value `1` twice"), "{err}");

        let src = r#"
[[testbench]]
id = "a_tb"
[[testbench]]
id = "A_TB"
"#;
        let specs = toml::from_str::<Suite>(src).unwrap().testbench;
        assert!(specs[0].axes.is_empty());
        assert_eq!(
            validate(&specs),
            Err(ConfigError::DuplicateTestBench("A_TB".into()))
        );
    }

    #[test]
    fn test_mixed_values() {
        let src = r#"
[[testbench]]
id = "a_tb"
[[testbench.axis]]
name = "G_MODE"
values = ["fast", "slow"]
[[testbench.axis]]
name = "G_EN"
values = [false]
"#;
        let specs = toml::from_str::<Suite>(src).unwrap().testbench;
        let names: Vec<_> = specs[0].axes.expand().map(|c| c.name).collect();
        assert_eq!(names, ["G_MODE=fast-G_EN=false", "G_MODE=slow-G_EN=false"]);
    }
}
