//! Running `RUN_SHELL` commands with a timeout and bounded output.

use std::io::Read;
use std::path::Path;
use std::process::{Command, ExitStatus, Stdio};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use tracing::{debug, instrument, warn};
use wait_timeout::ChildExt;

/// Bytes kept from one output stream, plus how many were dropped past the limit.
#[derive(Debug, Default)]
pub struct Captured {
    pub bytes: Vec<u8>,
    pub dropped: usize,
}

impl Captured {
    fn text(&self, stream: &str) -> String {
        let mut text = String::from_utf8_lossy(&self.bytes).into_owned();
        if self.dropped > 0 {
            text.push_str(&format!("\n[{stream} truncated {} bytes]\n", self.dropped));
        }
        text
    }
}

/// Exit status and captured streams of a shell command.
#[derive(Debug)]
pub struct CommandOutput {
    pub status: ExitStatus,
    pub stdout: Captured,
    pub stderr: Captured,
    /// The command was killed after exceeding its timeout.
    pub timed_out: bool,
}

impl CommandOutput {
    pub fn stdout_text(&self) -> String {
        self.stdout.text("stdout")
    }

    pub fn stderr_text(&self) -> String {
        self.stderr.text("stderr")
    }
}

/// `sh -c <command>` (or `cmd /C` on Windows) with `cwd` as working directory.
pub fn shell_command(command: &str, cwd: &Path) -> Command {
    let (program, flag) = if cfg!(windows) {
        ("cmd", "/C")
    } else {
        ("sh", "-c")
    };
    let mut cmd = Command::new(program);
    cmd.arg(flag).arg(command).current_dir(cwd);
    cmd
}

/// Run `cmd` to completion or until `timeout` elapses, then kill it.
///
/// Both pipes are drained on their own threads while the child runs, keeping at
/// most `output_limit_bytes` of each.
#[instrument(skip_all, fields(timeout_secs = timeout.as_secs(), output_limit_bytes))]
pub fn run_command_with_timeout(
    mut cmd: Command,
    timeout: Duration,
    output_limit_bytes: usize,
) -> Result<CommandOutput> {
    let mut child = cmd
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .context("spawn command")?;
    debug!(pid = child.id(), "spawned shell command");

    let stdout = drain(child.stdout.take(), output_limit_bytes);
    let stderr = drain(child.stderr.take(), output_limit_bytes);

    let (status, timed_out) = match child.wait_timeout(timeout).context("wait for command")? {
        Some(status) => (status, false),
        None => {
            warn!(timeout_secs = timeout.as_secs(), "command timed out, killing");
            child.kill().context("kill command")?;
            (child.wait().context("reap killed command")?, true)
        }
    };

    let stdout = collect(stdout).context("capture stdout")?;
    let stderr = collect(stderr).context("capture stderr")?;
    if stdout.dropped > 0 || stderr.dropped > 0 {
        warn!(
            stdout_dropped = stdout.dropped,
            stderr_dropped = stderr.dropped,
            "command output truncated"
        );
    }

    debug!(exit_code = ?status.code(), timed_out, "command finished");
    Ok(CommandOutput {
        status,
        stdout,
        stderr,
        timed_out,
    })
}

fn drain<R: Read + Send + 'static>(
    pipe: Option<R>,
    limit: usize,
) -> Option<JoinHandle<Result<Captured>>> {
    pipe.map(|reader| thread::spawn(move || read_limited(reader, limit)))
}

fn collect(handle: Option<JoinHandle<Result<Captured>>>) -> Result<Captured> {
    match handle {
        Some(handle) => handle
            .join()
            .map_err(|_| anyhow!("output reader thread panicked"))?,
        None => Ok(Captured::default()),
    }
}

fn read_limited<R: Read>(mut reader: R, limit: usize) -> Result<Captured> {
    let mut captured = Captured::default();
    let mut buf = [0u8; 8192];
    loop {
        let read = reader.read(&mut buf).context("read command output")?;
        if read == 0 {
            return Ok(captured);
        }
        let keep = read.min(limit.saturating_sub(captured.bytes.len()));
        captured.bytes.extend_from_slice(&buf[..keep]);
        captured.dropped += read - keep;
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    #[test]
    fn captures_stdout_and_stderr_in_cwd() {
        let temp = tempfile::tempdir().expect("tempdir");
        std::fs::write(temp.path().join("marker.txt"), "here").expect("write");

        let output = run_command_with_timeout(
            shell_command("cat marker.txt; echo oops >&2", temp.path()),
            Duration::from_secs(10),
            1000,
        )
        .expect("run");

        assert!(output.status.success());
        assert_eq!(output.stdout_text(), "here");
        assert_eq!(output.stderr_text(), "oops\n");
        assert!(!output.timed_out);
    }

    #[test]
    fn reports_non_zero_exit() {
        let temp = tempfile::tempdir().expect("tempdir");
        let output = run_command_with_timeout(
            shell_command("exit 3", temp.path()),
            Duration::from_secs(10),
            1000,
        )
        .expect("run");
        assert_eq!(output.status.code(), Some(3));
    }

    #[test]
    fn truncates_output_beyond_limit() {
        let temp = tempfile::tempdir().expect("tempdir");
        let output = run_command_with_timeout(
            shell_command("printf 'abcdefghij'", temp.path()),
            Duration::from_secs(10),
            4,
        )
        .expect("run");
        assert_eq!(output.stdout.bytes, b"abcd");
        assert_eq!(output.stdout.dropped, 6);
        assert!(output.stdout_text().contains("[stdout truncated 6 bytes]"));
    }

    #[test]
    fn kills_command_after_timeout() {
        let temp = tempfile::tempdir().expect("tempdir");
        let output = run_command_with_timeout(
            shell_command("exec sleep 5", temp.path()),
            Duration::from_millis(200),
            1000,
        )
        .expect("run");
        assert!(output.timed_out);
    }

    #[test]
    fn missing_cwd_fails_to_spawn() {
        let temp = tempfile::tempdir().expect("tempdir");
        let err = run_command_with_timeout(
            shell_command("true", &temp.path().join("missing")),
            Duration::from_secs(1),
            1000,
        )
        .unwrap_err();
        assert!(err.to_string().contains("spawn command"));
    }
}
