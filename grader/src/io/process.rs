//! Child processes with optional timeouts and bounded output.

use std::collections::VecDeque;
use std::io::Read;
use std::path::Path;
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread;
use std::time::Duration;

use anyhow::{Context, Result, anyhow, bail};
use tracing::{debug, error, instrument, warn};
use wait_timeout::ChildExt;

/// Limits applied to one child process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProcessLimits {
    /// Kill the child and everything it started after this long. `None` waits
    /// indefinitely.
    pub timeout: Option<Duration>,
    /// Maximum bytes kept from the end of each of stdout and stderr.
    pub output_limit_bytes: usize,
}

/// Captured child process output.
#[derive(Debug)]
pub struct CommandOutput {
    pub status: ExitStatus,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
    /// Bytes dropped from the start of stdout.
    pub stdout_truncated: usize,
    /// Bytes dropped from the start of stderr.
    pub stderr_truncated: usize,
    pub timed_out: bool,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        !self.timed_out && self.status.success()
    }

    /// Stdout followed by stderr, lossily decoded, with truncation notices.
    pub fn combined(&self) -> String {
        let mut buf = String::new();
        if self.stdout_truncated > 0 {
            buf.push_str(&format!("[stdout: {} earlier bytes dropped]\n", self.stdout_truncated));
        }
        buf.push_str(&String::from_utf8_lossy(&self.stdout));
        if !buf.is_empty() && !buf.ends_with('\n') && !self.stderr.is_empty() {
            buf.push('\n');
        }
        if self.stderr_truncated > 0 {
            buf.push_str(&format!("[stderr: {} earlier bytes dropped]\n", self.stderr_truncated));
        }
        buf.push_str(&String::from_utf8_lossy(&self.stderr));
        buf
    }

    /// Human-readable exit description: `exit status 2`, `killed by signal`, ...
    pub fn describe_exit(&self, limits: &ProcessLimits) -> String {
        if self.timed_out {
            let secs = limits.timeout.map(|timeout| timeout.as_secs()).unwrap_or_default();
            return format!("timed out after {secs}s");
        }
        match self.status.code() {
            Some(code) => format!("exit status {code}"),
            None => "terminated by signal".to_string(),
        }
    }
}

/// Run `cmd[0]` with `cmd[1..]` in `workdir` and capture its output.
///
/// Launch failures are returned as errors so callers can report them.
pub fn run_tokens(cmd: &[String], workdir: &Path, limits: ProcessLimits) -> Result<CommandOutput> {
    let Some((program, args)) = cmd.split_first() else {
        bail!("command must be non-empty");
    };
    let mut command = Command::new(program);
    command.args(args).current_dir(workdir);
    run_command(command, limits).with_context(|| format!("run {cmd:?}"))
}

/// Run a command and capture stdout/stderr without risking pipe deadlocks.
///
/// Output is read concurrently while the child runs, keeping the last
/// `output_limit_bytes` of each stream. With a timeout the child leads its own
/// process group, and the whole group is killed when the timeout expires so
/// no grandchild keeps the pipes open.
#[instrument(skip_all, fields(timeout = ?limits.timeout, output_limit_bytes = limits.output_limit_bytes))]
pub fn run_command(mut cmd: Command, limits: ProcessLimits) -> Result<CommandOutput> {
    cmd.stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());
    #[cfg(unix)]
    if limits.timeout.is_some() {
        use std::os::unix::process::CommandExt;
        cmd.process_group(0);
    }

    debug!("spawning child process");
    let mut child = match cmd.spawn() {
        Ok(child) => child,
        Err(err) => {
            error!(err = %err, "failed to spawn command");
            return Err(err).context("spawn command");
        }
    };

    let stdout = child
        .stdout
        .take()
        .ok_or_else(|| anyhow!("stdout was not piped"))?;
    let stderr = child
        .stderr
        .take()
        .ok_or_else(|| anyhow!("stderr was not piped"))?;

    let limit = limits.output_limit_bytes;
    let stdout_handle = thread::spawn(move || read_stream_tail(stdout, limit));
    let stderr_handle = thread::spawn(move || read_stream_tail(stderr, limit));

    let mut timed_out = false;
    let status = match limits.timeout {
        None => child.wait().context("wait for command")?,
        Some(timeout) => match child.wait_timeout(timeout).context("wait for command")? {
            Some(status) => status,
            None => {
                warn!(timeout_secs = timeout.as_secs(), "command timed out, killing");
                timed_out = true;
                kill_process_group(&mut child)?;
                child.wait().context("wait command after kill")?
            }
        },
    };

    let (stdout, stdout_truncated) = join_output(stdout_handle).context("join stdout")?;
    let (stderr, stderr_truncated) = join_output(stderr_handle).context("join stderr")?;

    if stdout_truncated > 0 || stderr_truncated > 0 {
        warn!(stdout_truncated, stderr_truncated, "output truncated");
    }

    debug!(exit_code = ?status.code(), timed_out, "command finished");
    Ok(CommandOutput {
        status,
        stdout,
        stderr,
        stdout_truncated,
        stderr_truncated,
        timed_out,
    })
}

/// Last `lines` lines of `text`, prefixed with a marker when lines were cut.
pub fn tail_lines(text: &str, lines: usize) -> String {
    let all: Vec<&str> = text.trim_end().lines().collect();
    if all.len() <= lines {
        return all.join("\n");
    }
    let skipped = all.len() - lines;
    format!("[... {skipped} earlier lines]\n{}", all[skipped..].join("\n"))
}

fn join_output(handle: thread::JoinHandle<Result<(Vec<u8>, usize)>>) -> Result<(Vec<u8>, usize)> {
    match handle.join() {
        Ok(result) => result,
        Err(_) => Err(anyhow!("output reader thread panicked")),
    }
}

/// Kill the child's process group, falling back to the child alone.
fn kill_process_group(child: &mut Child) -> Result<()> {
    #[cfg(unix)]
    {
        use nix::sys::signal::{Signal, killpg};
        use nix::unistd::Pid;

        let pgid = i32::try_from(child.id()).context("child pid out of range")?;
        match killpg(Pid::from_raw(pgid), Signal::SIGKILL) {
            Ok(()) => return Ok(()),
            Err(err) => warn!(err = %err, "killpg failed, killing child only"),
        }
    }
    child.kill().context("kill command")
}

/// Drain `reader`, keeping only the last `limit` bytes.
///
/// When bytes were dropped, the kept buffer starts at a line boundary.
fn read_stream_tail<R: Read>(mut reader: R, limit: usize) -> Result<(Vec<u8>, usize)> {
    let mut tail: VecDeque<u8> = VecDeque::new();
    let mut dropped = 0usize;
    let mut chunk = [0u8; 8192];

    loop {
        let n = reader.read(&mut chunk).context("read output")?;
        if n == 0 {
            break;
        }
        tail.extend(&chunk[..n]);
        if tail.len() > limit {
            let excess = tail.len() - limit;
            tail.drain(..excess);
            dropped += excess;
        }
    }

    let mut kept = Vec::from(tail);
    if dropped > 0
        && let Some(newline) = kept.iter().position(|byte| *byte == b'\n')
    {
        kept.drain(..=newline);
        dropped += newline + 1;
    }
    Ok((kept, dropped))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;
    use tempfile::tempdir;

    fn sh(script: &str) -> Vec<String> {
        vec!["sh".to_string(), "-c".to_string(), script.to_string()]
    }

    fn limits() -> ProcessLimits {
        ProcessLimits {
            timeout: Some(Duration::from_secs(5)),
            output_limit_bytes: 1024,
        }
    }

    #[test]
    fn captures_exit_status_and_output() {
        let temp = tempdir().expect("tempdir");
        let output = run_tokens(&sh("echo out; echo err >&2; exit 3"), temp.path(), limits())
            .expect("run");
        assert!(!output.success());
        assert_eq!(output.status.code(), Some(3));
        assert_eq!(output.combined(), "out\nerr\n");
        assert_eq!(output.describe_exit(&limits()), "exit status 3");
    }

    #[test]
    fn runs_in_workdir_without_timeout() {
        let temp = tempdir().expect("tempdir");
        std::fs::write(temp.path().join("marker"), "here").expect("write");
        let no_timeout = ProcessLimits {
            timeout: None,
            output_limit_bytes: 1024,
        };
        let output = run_tokens(&sh("cat marker"), temp.path(), no_timeout).expect("run");
        assert!(output.success());
        assert_eq!(output.stdout, b"here");
    }

    #[test]
    fn output_is_truncated() {
        let temp = tempdir().expect("tempdir");
        let small = ProcessLimits {
            timeout: Some(Duration::from_secs(5)),
            output_limit_bytes: 4,
        };
        let output = run_tokens(&sh("printf 'abcdef'"), temp.path(), small).expect("run");
        assert_eq!(output.stdout, b"cdef");
        assert_eq!(output.stdout_truncated, 2);
        assert!(output.combined().starts_with("[stdout: 2 earlier bytes dropped]\n"));
    }

    #[test]
    fn truncation_keeps_the_final_lines() {
        let temp = tempdir().expect("tempdir");
        let script = "i=0; while [ $i -lt 2000 ]; do echo \"warning: unused variable $i\" >&2; \
                      i=$((i+1)); done; echo 'a.cpp:3: error: expected semicolon' >&2; exit 1";
        let output = run_tokens(&sh(script), temp.path(), limits()).expect("run");
        assert!(output.stderr_truncated > 0);
        assert!(output.stderr.len() <= 1024);
        assert!(output.stderr.starts_with(b"warning: unused variable "));
        let tail = tail_lines(&output.combined(), 3);
        assert_eq!(tail.lines().last(), Some("a.cpp:3: error: expected semicolon"));
        assert!(tail.contains("warning: unused variable 1999"));
    }

    #[test]
    fn timeout_kills_child() {
        let temp = tempdir().expect("tempdir");
        let short = ProcessLimits {
            timeout: Some(Duration::from_millis(200)),
            output_limit_bytes: 1024,
        };
        let started = Instant::now();
        let output = run_tokens(&sh("exec sleep 5"), temp.path(), short).expect("run");
        assert!(started.elapsed() < Duration::from_secs(4));
        assert!(output.timed_out);
        assert!(!output.success());
        assert!(output.describe_exit(&short).starts_with("timed out"));
    }

    #[test]
    fn timeout_kills_grandchildren_holding_the_pipes() {
        let temp = tempdir().expect("tempdir");
        let short = ProcessLimits {
            timeout: Some(Duration::from_secs(1)),
            output_limit_bytes: 1024,
        };
        let started = Instant::now();
        let output =
            run_tokens(&sh("echo started; sleep 6; echo done"), temp.path(), short).expect("run");
        assert!(started.elapsed() < Duration::from_secs(4));
        assert!(output.timed_out);
        assert_eq!(output.stdout, b"started\n");
        assert_eq!(output.describe_exit(&short), "timed out after 1s");
    }

    #[test]
    fn missing_executable_is_an_error() {
        let temp = tempdir().expect("tempdir");
        let cmd = vec!["definitely-not-a-real-binary-5521".to_string()];
        let err = run_tokens(&cmd, temp.path(), limits()).expect_err("spawn fails");
        assert!(format!("{err:#}").contains("spawn command"));
    }

    #[test]
    fn empty_command_is_an_error() {
        let temp = tempdir().expect("tempdir");
        assert!(run_tokens(&[], temp.path(), limits()).is_err());
    }

    #[test]
    fn tail_keeps_last_lines() {
        assert_eq!(tail_lines("a\nb\nc\n", 5), "a\nb\nc");
        assert_eq!(tail_lines("a\nb\nc\nd", 2), "[... 2 earlier lines]\nc\nd");
    }
}
