//! Discovery of the HDL sources of the repository.

use std::{
    collections::BTreeSet,
    path::{Path, PathBuf},
    sync::OnceLock,
};

use anyhow::{Context, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::{error::ConfigError, framework::Framework};

/// Glob patterns of the source files, relative to the repository root.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceLayout {
    pub patterns: Vec<String>,
    /// Whether a pattern may match no file at all. Generated sources do not
    /// exist before the register generator ran.
    pub allow_empty: bool,
}

impl Default for SourceLayout {
    fn default() -> Self {
        Self {
            patterns: vec![
                // modules of this library
                "src/**/hdl/*.vhd".into(),
                // vendored libraries
                "lib/**/src/**/hdl/*.vhd".into(),
                // test benches
                "test/**/*.vhd".into(),
                // register generator output
                "build/regs_out/**/hdl/*.vhd".into(),
            ],
            allow_empty: true,
        }
    }
}

/// A glob pattern anchored at the repository root.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SourcePattern {
    pub pattern: String,
    pub allow_empty: bool,
}

impl SourcePattern {
    /// All files matching the pattern, sorted.
    pub fn expand(&self) -> Result<Vec<PathBuf>> {
        let paths = glob::glob(&self.pattern)
            .with_context(|| format!("invalid source pattern `{}`", self.pattern))?;
        let mut files = Vec::new();
        for entry in paths {
            match entry {
                Ok(p) if p.is_file() => files.push(p),
                Ok(_) => {}
                Err(err) => tracing::warn!("skipping unreadable path: {}", err),
            }
        }
        files.sort();

        if files.is_empty() && !self.allow_empty {
            return Err(ConfigError::NoMatch(PathBuf::from(&self.pattern)).into());
        }
        Ok(files)
    }
}

/// Anchor the patterns of `layout` at `root`. The patterns are absolute, so
/// they match the same files from any working directory.
pub fn discover(root: &Path, layout: &SourceLayout) -> Result<Vec<SourcePattern>> {
    let root = if root.as_os_str().is_empty() {
        Path::new(".")
    } else {
        root
    };
    let root = std::path::absolute(root)
        .with_context(|| format!("could not resolve root `{}`", root.display()))?;
    let root = root
        .to_str()
        .with_context(|| format!("root `{}` is not valid unicode", root.display()))?;
    let root = glob::Pattern::escape(root.trim_end_matches(['/', '\\']));
    Ok(layout
        .patterns
        .iter()
        .map(|p| SourcePattern {
            pattern: format!("{}/{}", root, p.trim_start_matches('/')),
            allow_empty: layout.allow_empty,
        })
        .collect())
}

/// Add the source patterns to `library`. Returns the number of files found.
pub fn register(fw: &mut dyn Framework, library: &str, patterns: &[SourcePattern]) -> Result<usize> {
    let mut total = 0;
    for p in patterns {
        let n = fw
            .add_source_files(library, p)
            .with_context(|| format!("add sources `{}`", p.pattern))?;
        if n == 0 {
            tracing::debug!("no file matches `{}`", p.pattern);
        } else {
            tracing::debug!("{} files match `{}`", n, p.pattern);
        }
        total += n;
    }
    tracing::info!("{} source files in library `{}`", total, library);
    Ok(total)
}

fn entity_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?im)^[ \t]*entity[ \t]+([a-z][a-z0-9_]*)[ \t\r\n]+is\b").unwrap()
    })
}

/// Names of the entities declared in a VHDL source, lower case.
pub fn entities(src: &str) -> BTreeSet<String> {
    entity_regex()
        .captures_iter(src)
        .map(|c| c[1].to_ascii_lowercase())
        .collect()
}

/// Like [`entities`], reading the file at `path`.
pub fn entities_in(path: &Path) -> Result<BTreeSet<String>> {
    let bytes =
        std::fs::read(path).with_context(|| format!("could not read file `{}`", path.display()))?;
    Ok(entities(&String::from_utf8_lossy(&bytes)))
}
