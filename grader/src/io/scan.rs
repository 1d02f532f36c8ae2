//! Literal pattern counting across submission files.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};

/// Occurrences of a pattern, per file, in the order the files were given.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatternCounts {
    pub per_file: Vec<(PathBuf, usize)>,
}

impl PatternCounts {
    pub fn total(&self) -> usize {
        self.per_file.iter().map(|(_, count)| count).sum()
    }

    /// Files with at least one occurrence.
    pub fn offenders(&self) -> impl Iterator<Item = &(PathBuf, usize)> {
        self.per_file.iter().filter(|(_, count)| *count > 0)
    }
}

/// Count non-overlapping literal occurrences of `pattern` in each file.
///
/// Fails on the first file that cannot be read.
pub fn count_pattern(root: &Path, pattern: &str, paths: &[PathBuf]) -> Result<PatternCounts> {
    if pattern.is_empty() {
        bail!("pattern must be non-empty");
    }
    let mut per_file = Vec::with_capacity(paths.len());
    for path in paths {
        let full_path = root.join(path);
        let bytes = fs::read(&full_path).with_context(|| format!("read {}", path.display()))?;
        let count = String::from_utf8_lossy(&bytes).matches(pattern).count();
        per_file.push((path.clone(), count));
    }
    Ok(PatternCounts { per_file })
}
