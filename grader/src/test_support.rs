//! Test-only helpers for building submission directories.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tempfile::TempDir;

use crate::io::digest::file_sha256;

/// A throwaway submission directory.
pub struct TestSubmission {
    dir: TempDir,
}

impl TestSubmission {
    pub fn new() -> Result<Self> {
        let dir = tempfile::tempdir().context("create submission dir")?;
        Ok(Self { dir })
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Write `contents` to `relative`, creating parent directories.
    pub fn write(&self, relative: &str, contents: &str) -> Result<PathBuf> {
        let path = self.dir.path().join(relative);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| format!("create {}", parent.display()))?;
        }
        fs::write(&path, contents).with_context(|| format!("write {}", path.display()))?;
        Ok(path)
    }

    pub fn digest(&self, relative: &str) -> Result<String> {
        file_sha256(&self.dir.path().join(relative))
    }

    /// Write an executable `sh` script.
    #[cfg(unix)]
    pub fn write_script(&self, relative: &str, body: &str) -> Result<PathBuf> {
        use std::os::unix::fs::PermissionsExt;

        let path = self.write(relative, &format!("#!/bin/sh\n{body}"))?;
        let mut perms = fs::metadata(&path)
            .with_context(|| format!("stat {}", path.display()))?
            .permissions();
        perms.set_mode(0o755);
        fs::set_permissions(&path, perms).with_context(|| format!("chmod {}", path.display()))?;
        Ok(path)
    }

    /// Write a script that behaves like a GoogleTest binary.
    ///
    /// It prints `console`, writes `json` to the `--gtest_output=json:` path
    /// when given, appends one line to `<name>.runs` per invocation, and exits
    /// with `exit_code`.
    #[cfg(unix)]
    pub fn write_fake_gtest(
        &self,
        relative: &str,
        json: Option<&str>,
        console: &str,
        exit_code: i32,
    ) -> Result<PathBuf> {
        let mut body = String::new();
        body.push_str("echo run >> \"$0.runs\"\n");
        body.push_str("report=\"\"\n");
        body.push_str("for arg in \"$@\"; do\n");
        body.push_str("  case \"$arg\" in\n");
        body.push_str("    --gtest_output=json:*) report=\"${arg#--gtest_output=json:}\" ;;\n");
        body.push_str("  esac\n");
        body.push_str("done\n");
        body.push_str("cat <<'GTEST_CONSOLE'\n");
        body.push_str(console);
        if !console.is_empty() && !console.ends_with('\n') {
            body.push('\n');
        }
        body.push_str("GTEST_CONSOLE\n");
        if let Some(json) = json {
            body.push_str("cat > \"$report\" <<'GTEST_JSON'\n");
            body.push_str(json);
            body.push_str("\nGTEST_JSON\n");
        }
        body.push_str(&format!("exit {exit_code}\n"));
        self.write_script(relative, &body)
    }

    /// How many times a fake GoogleTest binary was run.
    pub fn invocations(&self, relative: &str) -> Result<usize> {
        let path = self.dir.path().join(format!("{relative}.runs"));
        if !path.exists() {
            return Ok(0);
        }
        let contents =
            fs::read_to_string(&path).with_context(|| format!("read {}", path.display()))?;
        Ok(contents.lines().count())
    }
}

/// Render a minimal GoogleTest JSON report: `(suite, [(test, passed)])`.
pub fn gtest_json(suites: &[(&str, &[(&str, bool)])]) -> String {
    let suites: Vec<serde_json::Value> = suites
        .iter()
        .map(|(suite, tests)| {
            let tests: Vec<serde_json::Value> = tests
                .iter()
                .map(|(name, passed)| {
                    let mut test = serde_json::json!({
                        "name": name,
                        "status": "RUN",
                        "result": "COMPLETED",
                    });
                    if !passed {
                        test["failures"] = serde_json::json!([
                            { "failure": format!("{name} failed"), "type": "" }
                        ]);
                    }
                    test
                })
                .collect();
            serde_json::json!({ "name": suite, "tests": tests.len(), "testsuite": tests })
        })
        .collect();
    serde_json::json!({ "name": "AllTests", "testsuites": suites }).to_string()
}
