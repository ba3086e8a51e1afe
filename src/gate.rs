//! The command gate.
//!
//! `Gate` is the composition root: validate, sanitize, execute, audit. It is
//! the only place that hands a command string to a [`CommandRunner`], and it
//! only does so after the command was accepted by the current policy.

use crate::audit::{AuditEntry, AuditSink, TracingAuditSink};
use crate::error::ExecFailure;
use crate::executor::{CommandRunner, ShellExecutor};
use crate::outcome::ExecutionOutcome;
use crate::policy::{PolicyConfig, SharedPolicy};
use crate::request::CommandRequest;
use crate::sanitizer::sanitize;
use crate::validator::{validate, ValidationOutcome};
use chrono::Utc;
use std::future::Future;
use std::sync::Arc;
use std::time::Instant;

/// Everything the gate decided and observed for one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GateOutcome {
    /// Validation result. A rejection may come from re-validating the
    /// sanitized command even when the original passed.
    pub validation: ValidationOutcome,

    /// The command that was handed to the runner, if any.
    pub sanitized: Option<String>,

    /// Execution result. `None` exactly when validation rejected the command.
    pub execution: Option<ExecutionOutcome>,
}

impl GateOutcome {
    pub fn is_rejected(&self) -> bool {
        !self.validation.is_accepted()
    }

    /// Split into the `(validation, execution)` pair.
    pub fn into_parts(self) -> (ValidationOutcome, Option<ExecutionOutcome>) {
        (self.validation, self.execution)
    }
}

/// Validates, sanitizes and runs commands under a policy.
///
/// The policy, the runner and the audit sink are all injected, so a gate can
/// be tested with a fixed policy and a fake runner. A gate is `Send + Sync`
/// whenever its runner and sink are, and concurrent calls share nothing but
/// the read-only policy snapshot.
#[derive(Debug, Clone)]
pub struct Gate<R = ShellExecutor, A = TracingAuditSink> {
    policy: SharedPolicy,
    runner: R,
    audit: A,
}

impl Gate {
    /// A gate with the default shell runner and tracing audit sink.
    pub fn new(policy: impl Into<SharedPolicy>) -> Self {
        Self::with_parts(policy, ShellExecutor::default(), TracingAuditSink)
    }
}

impl<R: CommandRunner, A: AuditSink> Gate<R, A> {
    /// A gate from explicit collaborators.
    pub fn with_parts(policy: impl Into<SharedPolicy>, runner: R, audit: A) -> Self {
        Self {
            policy: policy.into(),
            runner,
            audit,
        }
    }

    /// Replace the runner.
    pub fn with_runner<R2: CommandRunner>(self, runner: R2) -> Gate<R2, A> {
        Gate {
            policy: self.policy,
            runner,
            audit: self.audit,
        }
    }

    /// Replace the audit sink.
    pub fn with_audit_sink<A2: AuditSink>(self, audit: A2) -> Gate<R, A2> {
        Gate {
            policy: self.policy,
            runner: self.runner,
            audit,
        }
    }

    /// The policy in effect right now.
    pub fn policy(&self) -> Arc<PolicyConfig> {
        self.policy.snapshot()
    }

    /// The reloadable policy slot, for sharing with a config watcher.
    pub fn shared_policy(&self) -> &SharedPolicy {
        &self.policy
    }

    /// Publish a new policy. Requests already in flight keep their snapshot.
    pub fn replace_policy(&self, policy: PolicyConfig) {
        self.policy.replace(policy);
    }

    /// Validate and sanitize without executing or auditing.
    ///
    /// Returns the validation outcome and, when accepted, the command that
    /// [`handle`](Self::handle) would run.
    pub fn preview(&self, request: &CommandRequest) -> (ValidationOutcome, Option<String>) {
        screen(request, &self.policy.snapshot())
    }

    /// Process one request under the current policy.
    pub async fn handle(&self, request: &CommandRequest) -> GateOutcome {
        let policy = self.policy.snapshot();
        self.handle_with_policy(request, &policy).await
    }

    /// Process one request under an explicit policy.
    pub async fn handle_with_policy(
        &self,
        request: &CommandRequest,
        policy: &PolicyConfig,
    ) -> GateOutcome {
        let (validation, sanitized) = screen(request, policy);
        let execution = match &sanitized {
            Some(command) => Some(self.runner.run(command, policy.timeout()).await),
            None => None,
        };
        self.finish(request, validation, sanitized, execution)
    }

    /// Process one request, blocking the calling thread.
    ///
    /// Safe to call from inside an async context: execution is then driven by
    /// a private runtime on a helper thread.
    pub fn handle_blocking(&self, request: &CommandRequest) -> GateOutcome {
        let policy = self.policy.snapshot();
        let (validation, sanitized) = screen(request, &policy);
        let execution = sanitized.as_deref().map(|command| {
            let start = Instant::now();
            let run = || block_on_fresh(self.runner.run(command, policy.timeout()));
            let result = if tokio::runtime::Handle::try_current().is_ok() {
                std::thread::scope(|s| s.spawn(run).join()).unwrap_or_else(|_| {
                    Err(std::io::Error::other("execution thread panicked"))
                })
            } else {
                run()
            };
            result.unwrap_or_else(|e| {
                ExecutionOutcome::failed(
                    ExecFailure::SpawnFailed {
                        reason: format!("failed to drive execution: {e}"),
                    },
                    start.elapsed(),
                )
            })
        });
        self.finish(request, validation, sanitized, execution)
    }

    fn finish(
        &self,
        request: &CommandRequest,
        validation: ValidationOutcome,
        sanitized: Option<String>,
        execution: Option<ExecutionOutcome>,
    ) -> GateOutcome {
        let entry = AuditEntry {
            timestamp: Utc::now(),
            origin: request.origin,
            raw_input: request.command.clone(),
            sanitized: sanitized.clone(),
            validation,
            execution,
        };
        self.audit.record(&entry);

        GateOutcome {
            validation: entry.validation,
            sanitized,
            execution: entry.execution,
        }
    }
}

/// Validate, sanitize, then validate the sanitized form.
///
/// Erasing a fragment can join its neighbours into a command the policy
/// rejects (`rm -rf>/etc/x /home` becomes `rm -rf  /home`), so only a
/// sanitized string that passes validation on its own is returned.
fn screen(request: &CommandRequest, policy: &PolicyConfig) -> (ValidationOutcome, Option<String>) {
    let validation = validate(&request.command, policy);
    let Some(accepted) = validation.accepted() else {
        return (validation, None);
    };

    let sanitized = sanitize(accepted);
    if sanitized == accepted {
        return (validation, Some(sanitized));
    }
    match validate(&sanitized, policy) {
        ValidationOutcome::Accepted(_) => (validation, Some(sanitized)),
        ValidationOutcome::Rejected(reason) => {
            tracing::warn!(
                command = %accepted,
                %sanitized,
                %reason,
                "Sanitized command rejected"
            );
            (ValidationOutcome::Rejected(reason), None)
        }
    }
}

fn block_on_fresh<F: Future>(future: F) -> std::io::Result<F::Output> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    Ok(runtime.block_on(future))
}
