//! # cmd_gate
//!
//! Command safety gate for human-typed and AI-generated shell commands.
//!
//! `cmd_gate` decides whether a shell command string may run, strips residual
//! risky fragments from the commands it accepts, runs them under a wall-clock
//! timeout with captured output, and reports one outcome per request.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use cmd_gate::{CommandRequest, Gate, PolicyConfig, ValidationOutcome};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! // Define a policy
//! let policy = PolicyConfig::builder()
//!     .allow_commands(["ls", "cat", "grep"])
//!     .forbid_substrings(["rm -rf /", "shutdown"])
//!     .max_command_length(500)
//!     .timeout_seconds(30)
//!     .build()?;
//!
//! let gate = Gate::new(policy);
//!
//! // Validate, sanitize and execute
//! let outcome = gate.handle(&CommandRequest::ai("ls -la")).await;
//!
//! match (&outcome.validation, &outcome.execution) {
//!     (ValidationOutcome::Rejected(reason), _) => println!("blocked: {reason}"),
//!     (_, Some(execution)) => println!("{}", execution.combined_output()),
//!     _ => {}
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Layers
//!
//! Checks run in a fixed order and the first failure wins:
//!
//! 1. **Empty / too long**: trivially rejected
//! 2. **Forbidden substrings**: case-insensitive literal denylist over the whole string
//! 3. **Dangerous patterns**: regexes over the lower-cased string
//! 4. **Allowlist**: the leading shell word must be a permitted program
//!
//! Accepted commands are then **sanitized** (redirections into `/dev`, `/etc`,
//! `/var`, `/usr` are erased) and **executed** in their own process group with
//! a timeout and output caps.
//!
//! ## Design Principles
//!
//! - **Fail closed**: anything unparseable or ambiguous is rejected
//! - **Defense in depth**: no single layer is trusted to be complete
//! - **Immutable policy**: validation reads a snapshot; reload swaps the whole policy
//! - **Injected collaborators**: policy, runner and audit sink are constructor arguments
//!
//! ## Platform Support
//!
//! Unix only (Linux, macOS). Execution relies on `/bin/sh` and POSIX process
//! groups for reliable timeout cleanup.

#[cfg(windows)]
compile_error!(
    "cmd_gate does not support Windows. \
     Timeout cleanup relies on POSIX process groups."
);

mod audit;
mod config;
mod error;
mod executor;
mod gate;
mod outcome;
mod pattern;
mod policy;
mod request;
mod sanitizer;
mod validator;

// Public API
pub use audit::{AuditEntry, AuditSink, NoopAuditSink, TracingAuditSink};
pub use error::{ExecFailure, PolicyError, Rejection, Stream};
pub use executor::{
    CommandRunner, ExecMode, ShellExecutor, DEFAULT_MAX_STDERR, DEFAULT_MAX_STDOUT, DEFAULT_SHELL,
};
pub use gate::{Gate, GateOutcome};
pub use outcome::{ExecutionOutcome, Termination};
pub use pattern::{builtin_patterns, DangerousPattern, BUILTIN_PATTERNS};
pub use policy::{
    PolicyConfig, PolicyConfigBuilder, SharedPolicy, DEFAULT_ALLOWED_COMMANDS,
    DEFAULT_FORBIDDEN_SUBSTRINGS, DEFAULT_MAX_COMMAND_LENGTH, DEFAULT_TIMEOUT_SECONDS,
};
pub use request::{CommandRequest, Origin};
pub use sanitizer::sanitize;
pub use validator::{validate, ValidationOutcome};
