//! Command execution request.

use serde::Serialize;

/// Where a command string came from.
///
/// Recorded for audit only. Origin never relaxes or tightens any check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Origin {
    /// Typed directly by a person.
    #[default]
    UserTyped,
    /// Produced by a language model or other generator.
    AiGenerated,
}

impl std::fmt::Display for Origin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Origin::UserTyped => write!(f, "user-typed"),
            Origin::AiGenerated => write!(f, "ai-generated"),
        }
    }
}

/// A proposed command.
///
/// This struct represents what the caller wants to run, exactly as received.
/// It must pass through a [`Gate`](crate::Gate) before anything executes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandRequest {
    /// The raw command line.
    pub command: String,

    /// Who produced it.
    pub origin: Origin,
}

impl CommandRequest {
    /// Create a new request.
    pub fn new(command: impl Into<String>, origin: Origin) -> Self {
        Self {
            command: command.into(),
            origin,
        }
    }

    /// A command typed by a person.
    pub fn user(command: impl Into<String>) -> Self {
        Self::new(command, Origin::UserTyped)
    }

    /// A command produced by a model.
    pub fn ai(command: impl Into<String>) -> Self {
        Self::new(command, Origin::AiGenerated)
    }
}
