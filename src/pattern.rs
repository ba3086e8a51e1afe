//! Dangerous command patterns.
//!
//! A dangerous pattern is a named regular expression describing a class of
//! destructive invocations that a literal substring match cannot express, such
//! as `rm` with a recursive or forced flag aimed at an absolute path.
//!
//! Patterns are always evaluated against the lower-cased command.
//!
//! # Limitations
//!
//! Regex matching cannot enumerate every dangerous invocation. A pattern scan
//! is one layer among several (allowlist, literal denylist, sanitizer,
//! bounded execution) and must never be treated as complete on its own.

use crate::error::PolicyError;
use regex::Regex;
use std::sync::LazyLock;

/// Built-in dangerous patterns as `(id, regex)` pairs, in evaluation order.
pub const BUILTIN_PATTERNS: &[(&str, &str)] = &[
    // rm with a flag containing r or f, followed by an absolute path
    (
        "rm-recursive-root",
        r#"\brm\s+(?:-{1,2}[a-z-]*\s+)*-{1,2}[a-z-]*[rf][a-z-]*\s+(?:-{1,2}[a-z-]*\s+)*["']?/"#,
    ),
    ("dd-to-device", r#"\bdd\b.*\bof=\s*["']?/dev/"#),
    (
        "format-filesystem",
        r"\b(?:mkfs(?:\.[a-z0-9]+)?|mke2fs|fdisk|sfdisk|wipefs)\b",
    ),
    ("power-control", r"\b(?:shutdown|reboot|poweroff)\b"),
    ("runlevel-change", r"\b(?:init|telinit)\s+[06]\b"),
    ("mass-kill", r"\b(?:killall|pkill)\b"),
    // covers >, >> and fd redirects such as 2>
    ("redirect-to-device", r#">\s*["']?/dev/"#),
    ("tee-to-device", r#"\|\s*tee\s+(?:-[a-z-]+\s+)*["']?/dev/"#),
];

static BUILTIN: LazyLock<Vec<DangerousPattern>> = LazyLock::new(|| {
    BUILTIN_PATTERNS
        .iter()
        .map(|(id, source)| {
            DangerousPattern::new(*id, source).expect("built-in dangerous pattern compiles")
        })
        .collect()
});

/// A named, compiled dangerous pattern.
#[derive(Debug, Clone)]
pub struct DangerousPattern {
    id: String,
    regex: Regex,
}

impl DangerousPattern {
    /// Compile a pattern.
    ///
    /// # Errors
    ///
    /// Returns `PolicyError::InvalidPattern` if `source` is not a valid regex.
    pub fn new(id: impl Into<String>, source: &str) -> Result<Self, PolicyError> {
        let id = id.into();
        let regex = Regex::new(source).map_err(|e| PolicyError::InvalidPattern {
            id: id.clone(),
            reason: e.to_string(),
        })?;
        Ok(Self { id, regex })
    }

    /// Stable identifier reported in rejections.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// The regex source text.
    pub fn source(&self) -> &str {
        self.regex.as_str()
    }

    /// Check the pattern against an already lower-cased command.
    pub fn is_match(&self, lowered: &str) -> bool {
        self.regex.is_match(lowered)
    }
}

/// The built-in pattern set, compiled once per process.
pub fn builtin_patterns() -> Vec<DangerousPattern> {
    BUILTIN.clone()
}

/// Return the first pattern, in order, that matches the lower-cased command.
pub fn first_match<'a>(
    patterns: &'a [DangerousPattern],
    lowered: &str,
) -> Option<&'a DangerousPattern> {
    patterns.iter().find(|p| p.is_match(lowered))
}
