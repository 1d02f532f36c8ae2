//! Contributor metadata read from the submission.
//!
//! The contributors file holds a header line followed by one contributor per
//! line, up to the first blank line:
//!
//! ```text
//! Group members:
//!
//! Ada Lovelace adalovelace@example.edu
//! ```
//!
//! Blank lines directly after the header are tolerated. Leading list markers
//! (`-`, `*`) are stripped.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ContributorsConfig {
    /// Contributors file, relative to the submission root.
    pub path: PathBuf,
    /// Line that introduces the contributor list.
    pub header: String,
    /// Names distributed with the starter code.
    pub placeholders: Vec<String>,
}

impl Default for ContributorsConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("README.md"),
            header: "Group members:".to_string(),
            placeholders: vec!["Ada Lovelace".to_string()],
        }
    }
}

impl ContributorsConfig {
    pub fn validate(&self) -> Result<()> {
        if self.path.as_os_str().is_empty() {
            bail!("contributors.path must be non-empty");
        }
        if self.header.trim().is_empty() {
            bail!("contributors.header must be non-empty");
        }
        if self.placeholders.iter().any(|name| name.trim().is_empty()) {
            bail!("contributors.placeholders must not contain empty names");
        }
        Ok(())
    }
}

/// What the contributors file says.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Contributors {
    FileMissing,
    HeaderMissing,
    Listed(Vec<String>),
}

pub fn read_contributors(root: &Path, config: &ContributorsConfig) -> Result<Contributors> {
    let path = root.join(&config.path);
    let contents = match fs::read_to_string(&path) {
        Ok(contents) => contents,
        Err(err) if err.kind() == ErrorKind::NotFound => return Ok(Contributors::FileMissing),
        Err(err) => return Err(err).with_context(|| format!("read {}", path.display())),
    };
    Ok(parse_contributors(&contents, &config.header))
}

pub fn parse_contributors(contents: &str, header: &str) -> Contributors {
    let header = header.trim();
    let mut lines = contents.lines();
    if !lines.by_ref().any(|line| line.trim() == header) {
        return Contributors::HeaderMissing;
    }
    let names = lines
        .map(str::trim)
        .skip_while(|line| line.is_empty())
        .take_while(|line| !line.is_empty())
        .map(|line| line.trim_start_matches(['-', '*']).trim().to_string())
        .filter(|line| !line.is_empty())
        .collect();
    Contributors::Listed(names)
}

/// Contributors that still carry a placeholder name (case-insensitive).
pub fn placeholder_entries<'a>(names: &'a [String], placeholders: &[String]) -> Vec<&'a str> {
    let placeholders: Vec<String> = placeholders
        .iter()
        .map(|name| name.trim().to_lowercase())
        .collect();
    names
        .iter()
        .filter(|name| {
            let name = name.to_lowercase();
            placeholders.iter().any(|placeholder| name.contains(placeholder))
        })
        .map(String::as_str)
        .collect()
}
