//! Required-file presence checks.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

/// Return every path from `paths` that does not exist under `root`.
///
/// The result is sorted and deduplicated so diagnostics are stable.
pub fn missing_files(root: &Path, paths: &[PathBuf]) -> Vec<PathBuf> {
    paths
        .iter()
        .filter(|path| !root.join(path).exists())
        .cloned()
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}
