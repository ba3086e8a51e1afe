//! Execution outcome.

use crate::error::ExecFailure;
use serde::Serialize;
use std::time::Duration;

/// How an executed command ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Termination {
    /// The process exited on its own with this code. Non-zero is not an error.
    Exited { code: i32 },

    /// The process was killed by a signal the gate did not send.
    Signaled { signal: i32 },

    /// The wall-clock timeout expired and the process group was killed.
    TimedOut,

    /// The process could not be run to completion.
    Failed { failure: ExecFailure },
}

/// Result of running one command.
///
/// On timeout or output-limit failure, `stdout` and `stderr` hold whatever was
/// captured before the process group was killed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExecutionOutcome {
    /// Standard output bytes.
    pub stdout: Vec<u8>,

    /// Standard error bytes.
    pub stderr: Vec<u8>,

    /// How the process ended.
    pub termination: Termination,

    /// Wall-clock time from spawn to reap.
    pub duration: Duration,
}

impl ExecutionOutcome {
    /// An outcome for a command that never started.
    pub fn failed(failure: ExecFailure, duration: Duration) -> Self {
        Self {
            stdout: Vec::new(),
            stderr: Vec::new(),
            termination: Termination::Failed { failure },
            duration,
        }
    }

    /// Get stdout as a string (lossy UTF-8 conversion).
    pub fn stdout_string(&self) -> String {
        String::from_utf8_lossy(&self.stdout).into_owned()
    }

    /// Get stderr as a string (lossy UTF-8 conversion).
    pub fn stderr_string(&self) -> String {
        String::from_utf8_lossy(&self.stderr).into_owned()
    }

    /// Check if the process exited with code 0.
    pub fn success(&self) -> bool {
        self.code() == Some(0)
    }

    /// Get the exit code if the process exited on its own.
    pub fn code(&self) -> Option<i32> {
        match self.termination {
            Termination::Exited { code } => Some(code),
            _ => None,
        }
    }

    pub fn timed_out(&self) -> bool {
        self.termination == Termination::TimedOut
    }

    /// The failure, if the process could not be run to completion.
    pub fn failure(&self) -> Option<&ExecFailure> {
        match &self.termination {
            Termination::Failed { failure } => Some(failure),
            _ => None,
        }
    }

    /// Stdout followed by a `STDERR:` section when stderr is non-empty.
    pub fn combined_output(&self) -> String {
        let mut out = self.stdout_string();
        if !self.stderr.is_empty() {
            out.push_str("\nSTDERR: ");
            out.push_str(&self.stderr_string());
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn outcome(termination: Termination) -> ExecutionOutcome {
        ExecutionOutcome {
            stdout: b"out\n".to_vec(),
            stderr: Vec::new(),
            termination,
            duration: Duration::from_millis(5),
        }
    }

    #[test]
    fn test_exit_code_accessors() {
        let ok = outcome(Termination::Exited { code: 0 });
        assert!(ok.success());
        assert_eq!(ok.code(), Some(0));

        let nonzero = outcome(Termination::Exited { code: 2 });
        assert!(!nonzero.success());
        assert_eq!(nonzero.code(), Some(2));
        assert!(nonzero.failure().is_none());
    }

    #[test]
    fn test_timeout_has_no_code() {
        let timed_out = outcome(Termination::TimedOut);
        assert!(timed_out.timed_out());
        assert_eq!(timed_out.code(), None);
        assert!(!timed_out.success());
    }

    #[test]
    fn test_failed_outcome() {
        let failed = ExecutionOutcome::failed(
            ExecFailure::SpawnFailed {
                reason: "No such file or directory".to_string(),
            },
            Duration::ZERO,
        );
        assert!(failed.stdout.is_empty());
        assert!(matches!(
            failed.failure(),
            Some(ExecFailure::SpawnFailed { .. })
        ));
    }

    #[test]
    fn test_combined_output() {
        let mut o = outcome(Termination::Exited { code: 1 });
        assert_eq!(o.combined_output(), "out\n");

        o.stderr = b"boom".to_vec();
        assert_eq!(o.combined_output(), "out\n\nSTDERR: boom");
    }
}
