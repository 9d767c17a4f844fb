//! Expansion of parameter sweeps into named test bench configurations.
//!
//! A test bench declares a number of independent axes, each one a generic
//! and the values to try. Every element of the Cartesian product of the axes
//! becomes one configuration, named after its bindings, e.g.
//! `G_STAGES=1-G_READY_PIPE=true`.

use std::{collections::HashSet, fmt};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::{error::ConfigError, framework::Framework, suite::TestBenchSpec};

/// Joins the `name=value` fragments of a configuration name.
pub const NAME_SEPARATOR: &str = "-";

/// Upper bound of configurations per test bench unless configured otherwise.
pub const DEFAULT_MAX_CONFIGURATIONS: usize = 10_000;

/// Value of a generic.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Bool(bool),
    Int(i64),
    Str(String),
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Bool(b) => write!(f, "{b}"),
            Value::Int(i) => write!(f, "{i}"),
            Value::Str(s) => f.write_str(s),
        }
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Int(value)
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Value::Int(value.into())
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Str(value.into())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParameterAxis {
    pub name: String,
    pub values: Vec<Value>,
}

impl ParameterAxis {
    pub fn new<V: Into<Value>>(name: impl Into<String>, values: impl IntoIterator<Item = V>) -> Self {
        Self {
            name: name.into(),
            values: values.into_iter().map(Into::into).collect(),
        }
    }
}

/// Ordered set of axes of one test bench.
///
/// Axis names are unique and non-empty, every axis has at least one value
/// and no value is listed twice on the same axis. Neither names nor values
/// contain `=`, so each `name=` fragment is found again in a generated name.
/// Together this makes every generated configuration name unique.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<ParameterAxis>", into = "Vec<ParameterAxis>")]
pub struct AxisSet {
    axes: Vec<ParameterAxis>,
}

impl AxisSet {
    pub fn new(axes: Vec<ParameterAxis>) -> Result<Self, ConfigError> {
        let mut names = HashSet::new();
        for axis in &axes {
            if axis.name.trim().is_empty() {
                return Err(ConfigError::EmptyAxisName);
            }
            let reserved = |text: &str| ConfigError::ReservedCharacter {
                axis: axis.name.clone(),
                text: text.into(),
            };
            if axis.name.contains('=') {
                return Err(reserved(&axis.name));
            }
            if !names.insert(axis.name.as_str()) {
                return Err(ConfigError::DuplicateAxis(axis.name.clone()));
            }
            if axis.values.is_empty() {
                return Err(ConfigError::EmptyAxis(axis.name.clone()));
            }
            // compare rendered values, `1` and `"1"` would give the same name
            let mut seen = HashSet::new();
            for v in &axis.values {
                let v = v.to_string();
                if v.contains('=') {
                    return Err(reserved(&v));
                }
                if !seen.insert(v.clone()) {
                    return Err(ConfigError::DuplicateValue {
                        axis: axis.name.clone(),
                        value: v,
                    });
                }
            }
        }
        Ok(Self { axes })
    }

    pub fn axes(&self) -> &[ParameterAxis] {
        &self.axes
    }

    pub fn is_empty(&self) -> bool {
        self.axes.is_empty()
    }

    /// Number of configurations [`AxisSet::expand`] yields, `None` on
    /// overflow.
    pub fn product_size(&self) -> Option<usize> {
        self.axes
            .iter()
            .try_fold(1usize, |acc, a| acc.checked_mul(a.values.len()))
    }

    /// Iterate over the Cartesian product of all axes. The last axis varies
    /// fastest, so the order only depends on the declared order of axes and
    /// values.
    pub fn expand(&self) -> Expand<'_> {
        let cursor = if self.axes.iter().any(|a| a.values.is_empty()) {
            None
        } else {
            Some(vec![0; self.axes.len()])
        };
        Expand {
            axes: &self.axes,
            cursor,
        }
    }
}

impl TryFrom<Vec<ParameterAxis>> for AxisSet {
    type Error = ConfigError;

    fn try_from(axes: Vec<ParameterAxis>) -> Result<Self, Self::Error> {
        Self::new(axes)
    }
}

impl From<AxisSet> for Vec<ParameterAxis> {
    fn from(value: AxisSet) -> Self {
        value.axes
    }
}

/// One concrete assignment of values to all axes of a test bench.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Configuration {
    pub name: String,
    /// (generic, value), in axis order
    pub bindings: Vec<(String, Value)>,
}

impl Configuration {
    pub fn new(bindings: Vec<(String, Value)>) -> Self {
        let name = bindings
            .iter()
            .map(|(k, v)| format!("{k}={v}"))
            .collect::<Vec<_>>()
            .join(NAME_SEPARATOR);
        Self { name, bindings }
    }

    pub fn get(&self, generic: &str) -> Option<&Value> {
        self.bindings
            .iter()
            .find(|(k, _)| k == generic)
            .map(|(_, v)| v)
    }

    /// A configuration without bindings runs the test bench with its default
    /// generics.
    pub fn is_default(&self) -> bool {
        self.bindings.is_empty()
    }
}

/// Iterator returned by [`AxisSet::expand`].
pub struct Expand<'a> {
    axes: &'a [ParameterAxis],
    /// value index per axis, `None` once exhausted
    cursor: Option<Vec<usize>>,
}

impl<'a> Iterator for Expand<'a> {
    type Item = Configuration;

    fn next(&mut self) -> Option<Self::Item> {
        let cursor = self.cursor.as_mut()?;
        let bindings = self
            .axes
            .iter()
            .zip(cursor.iter())
            .map(|(axis, &i)| (axis.name.clone(), axis.values[i].clone()))
            .collect();

        // odometer step
        let mut exhausted = true;
        for (i, axis) in cursor.iter_mut().zip(self.axes).rev() {
            *i += 1;
            if *i < axis.values.len() {
                exhausted = false;
                break;
            }
            *i = 0;
        }
        if exhausted {
            self.cursor = None;
        }

        Some(Configuration::new(bindings))
    }
}

/// Expand the axes of `bench` and add every configuration to the test bench
/// in the framework. Nothing is registered if the product exceeds `limit`.
///
/// Returns the number of registered configurations.
pub fn register(
    fw: &mut dyn Framework,
    library: &str,
    bench: &TestBenchSpec,
    limit: usize,
) -> Result<usize> {
    let size = bench.axes.product_size();
    match size {
        Some(n) if n <= limit => {}
        _ => {
            return Err(ConfigError::TooManyConfigurations {
                bench: bench.id.clone(),
                count: size.map_or_else(|| "more than usize::MAX".into(), |n| n.to_string()),
                limit,
            }
            .into())
        }
    }

    let mut count = 0;
    for config in bench.axes.expand() {
        if config.is_default() {
            tracing::debug!("{}: no axes, using default generics", bench.id);
            continue;
        }
        tracing::trace!("{}: add config {}", bench.id, config.name);
        fw.add_config(library, &bench.id, &config)
            .with_context(|| format!("add config `{}` to `{}`", config.name, bench.id))?;
        count += 1;
    }
    tracing::debug!("{}: {} configurations", bench.id, count);
    Ok(count)
}
