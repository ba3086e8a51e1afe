//! Bounded command execution.
//!
//! [`CommandRunner`] is the seam between the gate and the operating system.
//! [`ShellExecutor`] is the production runner: it starts one subprocess per
//! command in its own process group, captures stdout and stderr separately
//! under byte caps, and kills the whole group when the timeout expires or a
//! cap is exceeded.
//!
//! Runners perform no validation. They only ever see sanitized output of an
//! accepted command.

use crate::error::{ExecFailure, Stream};
use crate::outcome::{ExecutionOutcome, Termination};
use std::future::Future;
use std::os::unix::process::ExitStatusExt;
use std::path::PathBuf;
use std::process::{ExitStatus, Stdio};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::{Child, Command};

/// Shell used for [`ExecMode::Shell`].
pub const DEFAULT_SHELL: &str = "/bin/sh";

/// Default stdout cap: 10 MB.
pub const DEFAULT_MAX_STDOUT: usize = 10 * 1024 * 1024;

/// Default stderr cap: 1 MB.
pub const DEFAULT_MAX_STDERR: usize = 1024 * 1024;

/// Runs an already accepted and sanitized command.
pub trait CommandRunner: Send + Sync {
    /// Run `command`, giving up after `timeout`.
    ///
    /// Never returns an error: spawn problems, timeouts and non-zero exits are
    /// all reported through the returned outcome.
    fn run(
        &self,
        command: &str,
        timeout: Duration,
    ) -> impl Future<Output = ExecutionOutcome> + Send;
}

impl<T: CommandRunner> CommandRunner for Arc<T> {
    fn run(
        &self,
        command: &str,
        timeout: Duration,
    ) -> impl Future<Output = ExecutionOutcome> + Send {
        (**self).run(command, timeout)
    }
}

/// How the command line reaches the operating system.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExecMode {
    /// Pass the whole string to `sh -c` (default).
    #[default]
    Shell,

    /// Split the string into words once and exec the first word directly.
    ///
    /// Pipes, redirections, globs, `;` and `&&` become literal arguments, so
    /// nothing is re-interpreted after validation.
    Direct,
}

/// Subprocess runner with a wall-clock timeout and output caps.
#[derive(Debug, Clone)]
pub struct ShellExecutor {
    shell: PathBuf,
    mode: ExecMode,
    max_stdout: usize,
    max_stderr: usize,
}

impl Default for ShellExecutor {
    fn default() -> Self {
        Self {
            shell: PathBuf::from(DEFAULT_SHELL),
            mode: ExecMode::Shell,
            max_stdout: DEFAULT_MAX_STDOUT,
            max_stderr: DEFAULT_MAX_STDERR,
        }
    }
}

impl ShellExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use a different shell binary for [`ExecMode::Shell`].
    pub fn shell(mut self, shell: impl Into<PathBuf>) -> Self {
        self.shell = shell.into();
        self
    }

    /// Set the execution mode.
    pub fn mode(mut self, mode: ExecMode) -> Self {
        self.mode = mode;
        self
    }

    /// Set maximum stdout bytes.
    pub fn max_stdout(mut self, max: usize) -> Self {
        self.max_stdout = max;
        self
    }

    /// Set maximum stderr bytes.
    pub fn max_stderr(mut self, max: usize) -> Self {
        self.max_stderr = max;
        self
    }

    fn build_command(&self, command: &str) -> Result<Command, ExecFailure> {
        match self.mode {
            ExecMode::Shell => {
                let mut cmd = Command::new(&self.shell);
                cmd.arg("-c").arg(command);
                Ok(cmd)
            }
            ExecMode::Direct => {
                let words = shell_words::split(command).map_err(|e| ExecFailure::SpawnFailed {
                    reason: format!("cannot split command: {e}"),
                })?;
                let (program, args) =
                    words
                        .split_first()
                        .ok_or_else(|| ExecFailure::SpawnFailed {
                            reason: "no program name".to_string(),
                        })?;
                let mut cmd = Command::new(program);
                cmd.args(args);
                Ok(cmd)
            }
        }
    }

    /// Execute a command.
    ///
    /// # Returns
    ///
    /// - `Exited`/`Signaled` when the process finished within `timeout`
    /// - `TimedOut` when it did not; the process group is killed
    /// - `Failed(SpawnFailed)` when it never started
    /// - `Failed(OutputLimitExceeded)` when a stream passed its cap; the process group is killed
    pub async fn execute(&self, command: &str, timeout: Duration) -> ExecutionOutcome {
        let start = Instant::now();

        let mut cmd = match self.build_command(command) {
            Ok(cmd) => cmd,
            Err(failure) => return ExecutionOutcome::failed(failure, start.elapsed()),
        };
        cmd.stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .process_group(0)
            .kill_on_drop(true);

        let mut child = match cmd.spawn() {
            Ok(child) => child,
            Err(e) => {
                tracing::warn!(error = %e, mode = ?self.mode, "Failed to spawn command");
                return ExecutionOutcome::failed(
                    ExecFailure::SpawnFailed {
                        reason: e.to_string(),
                    },
                    start.elapsed(),
                );
            }
        };

        let (Some(mut stdout), Some(mut stderr)) = (child.stdout.take(), child.stderr.take())
        else {
            kill_process_group(&mut child).await;
            return ExecutionOutcome::failed(
                ExecFailure::Io {
                    reason: "output pipes unavailable".to_string(),
                },
                start.elapsed(),
            );
        };

        let mut stdout_buf = Vec::new();
        let mut stderr_buf = Vec::new();

        let result = {
            let run = async {
                tokio::try_join!(
                    read_capped(&mut stdout, &mut stdout_buf, self.max_stdout, Stream::Stdout),
                    read_capped(&mut stderr, &mut stderr_buf, self.max_stderr, Stream::Stderr),
                )?;
                child.wait().await.map_err(|e| ExecFailure::Io {
                    reason: format!("wait error: {e}"),
                })
            };
            tokio::time::timeout(timeout, run).await
        };

        let termination = match result {
            Ok(Ok(status)) => termination_from(status),
            Ok(Err(failure)) => {
                tracing::warn!(%failure, "Command failed, killing process group");
                kill_process_group(&mut child).await;
                Termination::Failed { failure }
            }
            Err(_) => {
                tracing::warn!(?timeout, "Command timed out, killing process group");
                kill_process_group(&mut child).await;
                Termination::TimedOut
            }
        };

        let duration = start.elapsed();
        tracing::info!(
            termination = ?termination,
            ?duration,
            stdout_bytes = stdout_buf.len(),
            stderr_bytes = stderr_buf.len(),
            "Command finished"
        );

        ExecutionOutcome {
            stdout: stdout_buf,
            stderr: stderr_buf,
            termination,
            duration,
        }
    }
}

impl CommandRunner for ShellExecutor {
    async fn run(&self, command: &str, timeout: Duration) -> ExecutionOutcome {
        self.execute(command, timeout).await
    }
}

/// Read a stream to EOF, keeping at most `limit` bytes.
async fn read_capped<R: AsyncRead + Unpin>(
    reader: &mut R,
    buf: &mut Vec<u8>,
    limit: usize,
    stream: Stream,
) -> Result<(), ExecFailure> {
    let mut chunk = [0u8; 8192];
    loop {
        let n = reader.read(&mut chunk).await.map_err(|e| ExecFailure::Io {
            reason: format!("{stream} read error: {e}"),
        })?;
        if n == 0 {
            return Ok(());
        }
        if buf.len() + n > limit {
            let remaining = limit.saturating_sub(buf.len());
            buf.extend_from_slice(&chunk[..remaining]);
            return Err(ExecFailure::OutputLimitExceeded { stream, limit });
        }
        buf.extend_from_slice(&chunk[..n]);
    }
}

/// SIGKILL the child's whole process group, then reap the child.
///
/// The child was spawned with `process_group(0)`, so its pid is the group id.
/// It has not been reaped yet, so the pid cannot have been recycled.
async fn kill_process_group(child: &mut Child) {
    if let Some(pid) = child.id() {
        let rc = unsafe { libc::killpg(pid as libc::pid_t, libc::SIGKILL) };
        if rc == -1 {
            let err = std::io::Error::last_os_error();
            tracing::debug!(pid, error = %err, "killpg failed");
        }
    }
    if let Err(e) = child.kill().await {
        tracing::debug!(error = %e, "Failed to reap killed child");
    }
}

fn termination_from(status: ExitStatus) -> Termination {
    if let Some(code) = status.code() {
        return Termination::Exited { code };
    }
    if let Some(signal) = status.signal() {
        return Termination::Signaled { signal };
    }
    Termination::Failed {
        failure: ExecFailure::Io {
            reason: format!("unrecognized exit status: {status}"),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SHORT: Duration = Duration::from_millis(300);
    const LONG: Duration = Duration::from_secs(10);

    #[tokio::test]
    async fn test_captures_stdout() {
        let outcome = ShellExecutor::new().execute("echo hello", LONG).await;

        assert!(outcome.success());
        assert_eq!(outcome.stdout_string(), "hello\n");
        assert!(outcome.stderr.is_empty());
    }

    #[tokio::test]
    async fn test_streams_captured_separately() {
        let outcome = ShellExecutor::new()
            .execute("echo out; echo err 1>&2", LONG)
            .await;

        assert_eq!(outcome.stdout_string(), "out\n");
        assert_eq!(outcome.stderr_string(), "err\n");
    }

    #[tokio::test]
    async fn test_nonzero_exit_is_reported_not_failed() {
        let outcome = ShellExecutor::new().execute("exit 3", LONG).await;

        assert_eq!(outcome.termination, Termination::Exited { code: 3 });
        assert!(outcome.failure().is_none());
    }

    #[tokio::test]
    async fn test_stdin_is_closed() {
        // cat would block forever on an inherited terminal
        let outcome = ShellExecutor::new().execute("cat", LONG).await;

        assert!(outcome.success());
        assert!(outcome.stdout.is_empty());
    }

    #[tokio::test]
    async fn test_timeout() {
        let outcome = ShellExecutor::new().execute("sleep 5", SHORT).await;

        assert_eq!(outcome.termination, Termination::TimedOut);
        assert!(outcome.duration < Duration::from_secs(5));
    }

    #[tokio::test]
    async fn test_timeout_keeps_partial_output() {
        let outcome = ShellExecutor::new()
            .execute("echo started; sleep 5", SHORT)
            .await;

        assert!(outcome.timed_out());
        assert_eq!(outcome.stdout_string(), "started\n");
    }

    #[tokio::test]
    async fn test_spawn_failure() {
        let outcome = ShellExecutor::new()
            .shell("/nonexistent/shell")
            .execute("echo hi", LONG)
            .await;

        assert!(matches!(
            outcome.failure(),
            Some(ExecFailure::SpawnFailed { .. })
        ));
        assert!(!outcome.timed_out());
    }

    #[tokio::test]
    async fn test_stdout_limit() {
        let outcome = ShellExecutor::new()
            .max_stdout(16)
            .execute("printf '%0100d' 0", LONG)
            .await;

        assert_eq!(
            outcome.failure(),
            Some(&ExecFailure::OutputLimitExceeded {
                stream: Stream::Stdout,
                limit: 16
            })
        );
        assert_eq!(outcome.stdout.len(), 16);
    }

    #[tokio::test]
    async fn test_stderr_limit() {
        let outcome = ShellExecutor::new()
            .max_stderr(8)
            .execute("printf '%050d' 0 1>&2", LONG)
            .await;

        assert!(matches!(
            outcome.failure(),
            Some(ExecFailure::OutputLimitExceeded {
                stream: Stream::Stderr,
                ..
            })
        ));
    }

    #[tokio::test]
    async fn test_killed_by_signal() {
        let outcome = ShellExecutor::new().execute("kill -9 $$", LONG).await;

        assert_eq!(outcome.termination, Termination::Signaled { signal: 9 });
        assert_eq!(outcome.code(), None);
    }

    #[tokio::test]
    async fn test_direct_mode_does_not_interpret_shell_syntax() {
        let outcome = ShellExecutor::new()
            .mode(ExecMode::Direct)
            .execute("echo hi; echo 'there | wc'", LONG)
            .await;

        assert!(outcome.success());
        assert_eq!(outcome.stdout_string(), "hi; echo there | wc\n");
    }

    #[tokio::test]
    async fn test_direct_mode_unparseable() {
        let outcome = ShellExecutor::new()
            .mode(ExecMode::Direct)
            .execute("echo 'open", LONG)
            .await;

        assert!(matches!(
            outcome.failure(),
            Some(ExecFailure::SpawnFailed { .. })
        ));
    }

    #[tokio::test]
    async fn test_direct_mode_missing_program() {
        let outcome = ShellExecutor::new()
            .mode(ExecMode::Direct)
            .execute("definitely-not-a-real-program-42", LONG)
            .await;

        assert!(matches!(
            outcome.failure(),
            Some(ExecFailure::SpawnFailed { .. })
        ));
    }
}
