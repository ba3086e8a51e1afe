//! Error types for cmd_gate.
//!
//! This module defines three error categories:
//! - [`Rejection`]: policy rejections produced by validation - the command never runs
//! - [`ExecFailure`]: execution failures - the command was accepted but did not run to completion
//! - [`PolicyError`]: problems building or loading a policy - no gate exists yet

use serde::Serialize;
use std::path::PathBuf;
use thiserror::Error;

/// Which captured stream an output limit applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Stream {
    Stdout,
    Stderr,
}

impl std::fmt::Display for Stream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Stream::Stdout => write!(f, "stdout"),
            Stream::Stderr => write!(f, "stderr"),
        }
    }
}

/// Reason a command was rejected by validation.
///
/// Rejections are expected and recoverable. Each one names the concrete check
/// that failed so callers can display or log it. Messages are safe to log.
#[derive(Debug, Error, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Rejection {
    /// Command is empty or whitespace only
    #[error("empty command")]
    Empty,

    /// Command exceeds the policy's length bound
    #[error("command too long: {len} characters (max {max})")]
    TooLong { len: usize, max: usize },

    /// Command contains a forbidden literal substring
    #[error("forbidden command pattern detected: {matched}")]
    ForbiddenSubstring { matched: String },

    /// Command matches a dangerous regular expression
    #[error("dangerous command pattern detected: {id}")]
    DangerousPattern { id: String },

    /// Leading program is not in the allowlist
    #[error("command '{program}' not in allowed list")]
    CommandNotAllowlisted { program: String },

    /// Command could not be split into shell words
    #[error("command could not be parsed: {reason}")]
    Unparseable { reason: String },
}

/// Execution failure: the command was accepted but never produced an exit status.
///
/// Distinct from a timeout (which is its own outcome) and from a non-zero exit
/// (which is a normal result, not a failure).
#[derive(Debug, Error, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ExecFailure {
    /// Failed to spawn the process
    #[error("failed to spawn process: {reason}")]
    SpawnFailed { reason: String },

    /// Process exceeded an output cap and was killed
    #[error("{stream} limit exceeded: {limit} bytes")]
    OutputLimitExceeded { stream: Stream, limit: usize },

    /// I/O error while talking to a running process
    #[error("process i/o error: {reason}")]
    Io { reason: String },
}

/// Error building or loading a [`PolicyConfig`](crate::PolicyConfig).
#[derive(Debug, Error)]
pub enum PolicyError {
    /// `max_command_length` must be positive
    #[error("max_command_length must be greater than zero")]
    ZeroMaxLength,

    /// `timeout_seconds` must be positive
    #[error("timeout_seconds must be greater than zero")]
    ZeroTimeout,

    /// A dangerous pattern failed to compile
    #[error("invalid dangerous pattern {id}: {reason}")]
    InvalidPattern { id: String, reason: String },

    /// Two dangerous patterns share an id
    #[error("duplicate dangerous pattern id: {id}")]
    DuplicatePatternId { id: String },

    /// A forbidden substring is empty (it would match every command)
    #[error("forbidden substring must not be empty")]
    EmptyForbiddenSubstring,

    /// Policy file could not be read
    #[error("failed to read policy file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Policy source is not valid JSON for a policy
    #[error("invalid policy json: {0}")]
    Json(#[from] serde_json::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejection_messages() {
        assert_eq!(Rejection::Empty.to_string(), "empty command");
        assert_eq!(
            Rejection::TooLong { len: 501, max: 500 }.to_string(),
            "command too long: 501 characters (max 500)"
        );
        assert_eq!(
            Rejection::CommandNotAllowlisted {
                program: "nc".to_string()
            }
            .to_string(),
            "command 'nc' not in allowed list"
        );
    }

    #[test]
    fn test_rejection_serializes_with_kind_tag() {
        let json = serde_json::to_value(Rejection::DangerousPattern {
            id: "dd-to-device".to_string(),
        })
        .unwrap();
        assert_eq!(json["kind"], "dangerous_pattern");
        assert_eq!(json["id"], "dd-to-device");

        let json = serde_json::to_value(Rejection::Empty).unwrap();
        assert_eq!(json["kind"], "empty");

        let json = serde_json::to_value(Rejection::Unparseable {
            reason: "missing closing quote".to_string(),
        })
        .unwrap();
        assert_eq!(json["kind"], "unparseable");
        assert_eq!(json["reason"], "missing closing quote");
    }

    #[test]
    fn test_output_limit_message_names_stream() {
        let failure = ExecFailure::OutputLimitExceeded {
            stream: Stream::Stderr,
            limit: 1024,
        };
        assert_eq!(failure.to_string(), "stderr limit exceeded: 1024 bytes");
    }
}
