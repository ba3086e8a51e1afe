//! Post-acceptance sanitization.
//!
//! Removes redirections and pipes whose target lives under a sensitive system
//! root (`/dev/`, `/etc/`, `/var/`, `/usr/`), e.g. `cat notes > /etc/passwd`
//! becomes `cat notes`. The erased fragment covers the operator, an optional
//! `tee` with its flags and the whole target path. A quoted target is erased
//! up to its closing quote, spaces and newlines included. The fragment is
//! replaced by a single space so the words around it stay separate.
//!
//! Erasure can still turn an accepted command into a different one, so the
//! gate validates the sanitized form again before running it.
//!
//! This only reduces the blast radius of commands that validation already
//! accepted. It is not a substitute for rejecting them.

use regex::Regex;
use std::sync::LazyLock;

/// Operator (`>`, `>>`, `N>`, `&>`, `|`), optional `tee`, then a sensitive path.
///
/// Quoted targets run to the closing quote; an unterminated quote falls back to
/// the next whitespace.
static SENSITIVE_TARGET: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(concat!(
        r#"(?:\b[0-9]+>>?|&>>?|>>?|\|)\s*(?:tee\s+(?:-[A-Za-z-]+\s+)*)?"#,
        r#"(?:"/(?:dev|etc|var|usr)/[^"]*"|'/(?:dev|etc|var|usr)/[^']*'|["']?/(?:dev|etc|var|usr)/\S*)"#,
    ))
    .expect("sanitizer regex compiles")
});

/// Strip sensitive redirections from an accepted command.
///
/// Erasure is repeated until nothing matches, then surrounding whitespace is
/// trimmed, so `sanitize(&sanitize(x)) == sanitize(x)`.
pub fn sanitize(command: &str) -> String {
    let mut current = command.to_string();
    while SENSITIVE_TARGET.is_match(&current) {
        let next = SENSITIVE_TARGET.replace_all(&current, " ").into_owned();
        tracing::debug!(before = %current, after = %next, "Stripped sensitive redirection");
        current = next;
    }
    current.trim().to_string()
}
