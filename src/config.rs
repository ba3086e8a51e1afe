//! Loading a `PolicyConfig` from JSON.
//!
//! The accepted document is the policy subset of a CLI config file:
//!
//! ```json
//! {
//!   "allowed_commands": ["ls", "cat", "git"],
//!   "forbidden_commands": ["rm -rf /", "shutdown"],
//!   "dangerous_patterns": ["curl\\s.*\\|\\s*sh", {"id": "chmod-777", "pattern": "chmod\\s+777"}],
//!   "max_command_length": 500,
//!   "timeout_seconds": 30
//! }
//! ```
//!
//! Missing keys take the stock defaults. A key that is present replaces the
//! default entirely, so `"allowed_commands": []` permits nothing. `null` is a
//! type error, never "use the default". Keys that are not policy (API keys,
//! model names, history paths) are ignored.

use crate::error::PolicyError;
use crate::pattern::BUILTIN_PATTERNS;
use crate::policy::{
    PolicyConfig, DEFAULT_ALLOWED_COMMANDS, DEFAULT_FORBIDDEN_SUBSTRINGS,
    DEFAULT_MAX_COMMAND_LENGTH, DEFAULT_TIMEOUT_SECONDS,
};
use serde::Deserialize;
use std::path::Path;

/// A dangerous pattern entry: a bare regex (its source doubles as the id) or
/// an explicit `{id, pattern}` object.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum PatternEntry {
    Named { id: String, pattern: String },
    Bare(String),
}

impl PatternEntry {
    fn into_parts(self) -> (String, String) {
        match self {
            PatternEntry::Named { id, pattern } => (id, pattern),
            PatternEntry::Bare(pattern) => (pattern.clone(), pattern),
        }
    }
}

#[derive(Debug, Deserialize)]
struct PolicyFile {
    #[serde(default = "default_allowed")]
    allowed_commands: Vec<String>,

    #[serde(default = "default_forbidden", alias = "forbidden_substrings")]
    forbidden_commands: Vec<String>,

    #[serde(default = "default_patterns")]
    dangerous_patterns: Vec<PatternEntry>,

    #[serde(default = "default_max_length")]
    max_command_length: usize,

    #[serde(default = "default_timeout")]
    timeout_seconds: u64,
}

fn default_allowed() -> Vec<String> {
    DEFAULT_ALLOWED_COMMANDS.iter().map(|s| s.to_string()).collect()
}

fn default_forbidden() -> Vec<String> {
    DEFAULT_FORBIDDEN_SUBSTRINGS
        .iter()
        .map(|s| s.to_string())
        .collect()
}

fn default_patterns() -> Vec<PatternEntry> {
    BUILTIN_PATTERNS
        .iter()
        .map(|(id, pattern)| PatternEntry::Named {
            id: id.to_string(),
            pattern: pattern.to_string(),
        })
        .collect()
}

fn default_max_length() -> usize {
    DEFAULT_MAX_COMMAND_LENGTH
}

fn default_timeout() -> u64 {
    DEFAULT_TIMEOUT_SECONDS
}

impl PolicyFile {
    fn into_policy(self) -> Result<PolicyConfig, PolicyError> {
        let mut builder = PolicyConfig::builder()
            .clear_dangerous_patterns()
            .allow_commands(self.allowed_commands)
            .forbid_substrings(self.forbidden_commands)
            .max_command_length(self.max_command_length)
            .timeout_seconds(self.timeout_seconds);

        for entry in self.dangerous_patterns {
            let (id, pattern) = entry.into_parts();
            builder = builder.dangerous_pattern(id, pattern);
        }

        builder.build()
    }
}

impl PolicyConfig {
    /// Parse a policy from a JSON document.
    ///
    /// # Errors
    ///
    /// - `PolicyError::Json` for malformed JSON or wrongly typed fields
    /// - any error from [`PolicyConfigBuilder::build`](crate::PolicyConfigBuilder::build)
    pub fn from_json_str(json: &str) -> Result<Self, PolicyError> {
        let file: PolicyFile = serde_json::from_str(json)?;
        file.into_policy()
    }

    /// Read and parse a policy file.
    ///
    /// A missing or unreadable file is an error; the gate does not fall back to
    /// defaults behind the caller's back.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, PolicyError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|source| PolicyError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let policy = Self::from_json_str(&json)?;
        tracing::debug!(
            path = %path.display(),
            allowed = policy.allowed_commands().len(),
            patterns = policy.dangerous_patterns().len(),
            "Loaded command policy"
        );
        Ok(policy)
    }
}
