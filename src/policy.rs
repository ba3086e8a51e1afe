//! Command policy.
//!
//! `PolicyConfig` is the immutable snapshot every validation runs against:
//! which programs may lead a command, which literal substrings and regex
//! patterns reject a command outright, and the length and time bounds.
//!
//! Policies are built once (via [`PolicyConfig::builder`], [`PolicyConfig::default`]
//! or JSON via `PolicyConfig::from_json_str`) and never mutated. Reloading means swapping
//! the whole snapshot through a [`SharedPolicy`].

use crate::error::PolicyError;
use crate::pattern::{builtin_patterns, DangerousPattern, BUILTIN_PATTERNS};
use crate::validator::{validate, ValidationOutcome};
use parking_lot::RwLock;
use std::collections::{BTreeSet, HashSet};
use std::sync::Arc;
use std::time::Duration;

/// Programs allowed by the default policy.
pub const DEFAULT_ALLOWED_COMMANDS: &[&str] = &[
    "ls", "pwd", "cd", "cat", "head", "tail", "grep", "find", "mkdir", "rmdir", "cp", "mv", "rm",
    "chmod", "chown", "ps", "top", "df", "du", "tar", "zip", "unzip", "git", "docker", "kubectl",
    "aws", "terraform",
];

/// Literal substrings rejected by the default policy.
///
/// These overlap with [`BUILTIN_PATTERNS`] on purpose: the literal scan and the
/// pattern scan are independent layers.
///
/// Matching is plain substring containment, so short entries also reject
/// harmless commands: `dd` blocks `git add .` and `format` blocks
/// `git log --format=%h`. Build a custom policy when that matters.
pub const DEFAULT_FORBIDDEN_SUBSTRINGS: &[&str] = &[
    "rm -rf /", "dd", "mkfs", "fdisk", "format", "shutdown", "reboot", "init", "killall", "pkill",
];

/// Default maximum command length, in characters.
pub const DEFAULT_MAX_COMMAND_LENGTH: usize = 500;

/// Default wall-clock timeout, in seconds.
pub const DEFAULT_TIMEOUT_SECONDS: u64 = 30;

/// Immutable command policy.
///
/// Create using `PolicyConfig::builder()`, `PolicyConfig::default()` or
/// `PolicyConfig::from_json_str()`.
#[derive(Debug, Clone)]
pub struct PolicyConfig {
    /// Program names permitted as the leading token.
    ///
    /// Empty means nothing is permitted.
    allowed_commands: HashSet<String>,

    /// Lower-cased literal substrings, sorted so the reported match is stable.
    forbidden_substrings: BTreeSet<String>,

    /// Dangerous patterns in evaluation order.
    dangerous_patterns: Vec<DangerousPattern>,

    /// Maximum command length in characters.
    max_command_length: usize,

    /// Wall-clock timeout for execution.
    timeout_seconds: u64,
}

impl PolicyConfig {
    /// Create a new policy builder.
    pub fn builder() -> PolicyConfigBuilder {
        PolicyConfigBuilder::new()
    }

    /// Validate a command against this policy.
    pub fn validate(&self, command: &str) -> ValidationOutcome {
        validate(command, self)
    }

    /// Whether `program` may lead a command.
    pub fn is_allowed(&self, program: &str) -> bool {
        self.allowed_commands.contains(program)
    }

    pub fn allowed_commands(&self) -> &HashSet<String> {
        &self.allowed_commands
    }

    pub fn forbidden_substrings(&self) -> &BTreeSet<String> {
        &self.forbidden_substrings
    }

    pub fn dangerous_patterns(&self) -> &[DangerousPattern] {
        &self.dangerous_patterns
    }

    pub fn max_command_length(&self) -> usize {
        self.max_command_length
    }

    pub fn timeout_seconds(&self) -> u64 {
        self.timeout_seconds
    }

    /// Execution timeout as a `Duration`.
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }
}

impl Default for PolicyConfig {
    /// The stock policy: a read-mostly developer toolset, the literal denylist,
    /// every built-in pattern, 500 characters and 30 seconds.
    fn default() -> Self {
        Self {
            allowed_commands: DEFAULT_ALLOWED_COMMANDS
                .iter()
                .map(|s| s.to_string())
                .collect(),
            forbidden_substrings: DEFAULT_FORBIDDEN_SUBSTRINGS
                .iter()
                .map(|s| s.to_lowercase())
                .collect(),
            dangerous_patterns: builtin_patterns(),
            max_command_length: DEFAULT_MAX_COMMAND_LENGTH,
            timeout_seconds: DEFAULT_TIMEOUT_SECONDS,
        }
    }
}

/// Builder for `PolicyConfig`.
///
/// Starts from an empty allowlist, an empty denylist and the built-in
/// dangerous patterns.
#[derive(Debug, Clone)]
pub struct PolicyConfigBuilder {
    allowed_commands: HashSet<String>,
    forbidden_substrings: Vec<String>,

    /// `(id, source)` pairs, compiled at build time.
    patterns: Vec<(String, String)>,

    max_command_length: usize,
    timeout_seconds: u64,
}

impl PolicyConfigBuilder {
    /// Create a new builder with default settings.
    pub fn new() -> Self {
        Self {
            allowed_commands: HashSet::new(),
            forbidden_substrings: Vec::new(),
            patterns: BUILTIN_PATTERNS
                .iter()
                .map(|(id, source)| (id.to_string(), source.to_string()))
                .collect(),
            max_command_length: DEFAULT_MAX_COMMAND_LENGTH,
            timeout_seconds: DEFAULT_TIMEOUT_SECONDS,
        }
    }

    /// Allow a program as the leading token.
    pub fn allow_command(mut self, program: impl Into<String>) -> Self {
        self.allowed_commands.insert(program.into());
        self
    }

    /// Allow several programs.
    pub fn allow_commands<I, S>(mut self, programs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.allowed_commands
            .extend(programs.into_iter().map(Into::into));
        self
    }

    /// Reject any command containing `substring` (case-insensitive).
    pub fn forbid_substring(mut self, substring: impl Into<String>) -> Self {
        self.forbidden_substrings.push(substring.into());
        self
    }

    /// Reject several substrings.
    pub fn forbid_substrings<I, S>(mut self, substrings: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.forbidden_substrings
            .extend(substrings.into_iter().map(Into::into));
        self
    }

    /// Append a dangerous pattern. Evaluated after the ones already present.
    pub fn dangerous_pattern(mut self, id: impl Into<String>, source: impl Into<String>) -> Self {
        self.patterns.push((id.into(), source.into()));
        self
    }

    /// Drop every dangerous pattern added so far, built-ins included.
    pub fn clear_dangerous_patterns(mut self) -> Self {
        self.patterns.clear();
        self
    }

    /// Set the maximum command length in characters.
    pub fn max_command_length(mut self, max: usize) -> Self {
        self.max_command_length = max;
        self
    }

    /// Set the execution timeout in seconds.
    pub fn timeout_seconds(mut self, seconds: u64) -> Self {
        self.timeout_seconds = seconds;
        self
    }

    /// Build the policy.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - `max_command_length` or `timeout_seconds` is zero
    /// - a forbidden substring is empty
    /// - a pattern fails to compile or reuses an id
    pub fn build(self) -> Result<PolicyConfig, PolicyError> {
        if self.max_command_length == 0 {
            return Err(PolicyError::ZeroMaxLength);
        }
        if self.timeout_seconds == 0 {
            return Err(PolicyError::ZeroTimeout);
        }

        let mut forbidden_substrings = BTreeSet::new();
        for substring in self.forbidden_substrings {
            if substring.is_empty() {
                return Err(PolicyError::EmptyForbiddenSubstring);
            }
            forbidden_substrings.insert(substring.to_lowercase());
        }

        let mut seen = HashSet::new();
        let mut dangerous_patterns = Vec::with_capacity(self.patterns.len());
        for (id, source) in self.patterns {
            if !seen.insert(id.clone()) {
                return Err(PolicyError::DuplicatePatternId { id });
            }
            dangerous_patterns.push(DangerousPattern::new(id, &source)?);
        }

        Ok(PolicyConfig {
            allowed_commands: self.allowed_commands,
            forbidden_substrings,
            dangerous_patterns,
            max_command_length: self.max_command_length,
            timeout_seconds: self.timeout_seconds,
        })
    }
}

impl Default for PolicyConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A policy slot that can be swapped atomically.
///
/// Readers take an `Arc` snapshot and keep it for the whole request, so a
/// concurrent [`replace`](SharedPolicy::replace) is never observed half-way.
#[derive(Debug, Clone)]
pub struct SharedPolicy {
    current: Arc<RwLock<Arc<PolicyConfig>>>,
}

impl SharedPolicy {
    pub fn new(policy: PolicyConfig) -> Self {
        Self {
            current: Arc::new(RwLock::new(Arc::new(policy))),
        }
    }

    /// The policy in effect right now.
    pub fn snapshot(&self) -> Arc<PolicyConfig> {
        Arc::clone(&self.current.read())
    }

    /// Publish a new policy, returning the one it replaced.
    pub fn replace(&self, policy: PolicyConfig) -> Arc<PolicyConfig> {
        let allowed = policy.allowed_commands.len();
        let patterns = policy.dangerous_patterns.len();
        let previous = std::mem::replace(&mut *self.current.write(), Arc::new(policy));
        tracing::info!(allowed, patterns, "Command policy replaced");
        previous
    }
}

impl From<PolicyConfig> for SharedPolicy {
    fn from(policy: PolicyConfig) -> Self {
        Self::new(policy)
    }
}
