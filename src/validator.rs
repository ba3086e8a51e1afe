//! Command validation.
//!
//! `validate` is a pure function of the command string and a policy. Checks run
//! in a fixed order and the first failure wins:
//!
//! 1. emptiness
//! 2. length bound
//! 3. forbidden literal substrings (case-insensitive)
//! 4. dangerous patterns, in policy order, against the lower-cased command
//! 5. the leading shell word must be an allowlisted program
//!
//! Only the leading program is allowlisted; arguments are left to the
//! substring and pattern layers. Neither layer is sufficient alone.

use crate::error::Rejection;
use crate::pattern::first_match;
use crate::policy::PolicyConfig;
use serde::Serialize;

/// Result of validating one command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidationOutcome {
    /// The command passed every check. Holds the original, untransformed string.
    Accepted(String),
    /// The command failed a check.
    Rejected(Rejection),
}

impl ValidationOutcome {
    pub fn is_accepted(&self) -> bool {
        matches!(self, ValidationOutcome::Accepted(_))
    }

    /// The accepted command, if any.
    pub fn accepted(&self) -> Option<&str> {
        match self {
            ValidationOutcome::Accepted(command) => Some(command),
            ValidationOutcome::Rejected(_) => None,
        }
    }

    /// The rejection reason, if any.
    pub fn rejection(&self) -> Option<&Rejection> {
        match self {
            ValidationOutcome::Accepted(_) => None,
            ValidationOutcome::Rejected(reason) => Some(reason),
        }
    }

    /// Convert into a `Result`, for callers that prefer `?`.
    pub fn into_result(self) -> Result<String, Rejection> {
        match self {
            ValidationOutcome::Accepted(command) => Ok(command),
            ValidationOutcome::Rejected(reason) => Err(reason),
        }
    }
}

/// Validate a command against a policy.
pub fn validate(command: &str, policy: &PolicyConfig) -> ValidationOutcome {
    match check(command, policy) {
        Ok(()) => ValidationOutcome::Accepted(command.to_string()),
        Err(reason) => {
            tracing::debug!(%reason, "Command rejected");
            ValidationOutcome::Rejected(reason)
        }
    }
}

fn check(command: &str, policy: &PolicyConfig) -> Result<(), Rejection> {
    if command.trim().is_empty() {
        return Err(Rejection::Empty);
    }

    let len = command.chars().count();
    if len > policy.max_command_length() {
        return Err(Rejection::TooLong {
            len,
            max: policy.max_command_length(),
        });
    }

    let lowered = command.to_lowercase();

    if let Some(matched) = policy
        .forbidden_substrings()
        .iter()
        .find(|s| lowered.contains(s.as_str()))
    {
        return Err(Rejection::ForbiddenSubstring {
            matched: matched.clone(),
        });
    }

    if let Some(pattern) = first_match(policy.dangerous_patterns(), &lowered) {
        return Err(Rejection::DangerousPattern {
            id: pattern.id().to_string(),
        });
    }

    let words = shell_words::split(command).map_err(|e| Rejection::Unparseable {
        reason: e.to_string(),
    })?;
    let program = words.first().ok_or_else(|| Rejection::Unparseable {
        reason: "no program name".to_string(),
    })?;

    if !policy.is_allowed(program) {
        return Err(Rejection::CommandNotAllowlisted {
            program: program.clone(),
        });
    }

    Ok(())
}
