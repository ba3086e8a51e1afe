//! Audit records.
//!
//! The gate emits one [`AuditEntry`] per request to an injected [`AuditSink`].
//! Persisting entries (history files, databases) is the sink owner's business.

use crate::outcome::ExecutionOutcome;
use crate::request::Origin;
use crate::validator::ValidationOutcome;
use chrono::{DateTime, Utc};
use serde::Serialize;

/// Everything that happened to one request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuditEntry {
    pub timestamp: DateTime<Utc>,
    pub origin: Origin,

    /// The command exactly as received.
    pub raw_input: String,

    /// What actually ran, when the command was accepted.
    pub sanitized: Option<String>,

    pub validation: ValidationOutcome,
    pub execution: Option<ExecutionOutcome>,
}

impl AuditEntry {
    /// Serialize to a single JSON line.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

/// Receives audit entries.
pub trait AuditSink: Send + Sync {
    fn record(&self, entry: &AuditEntry);
}

/// Default sink: one `tracing` event per entry.
///
/// Rejections are logged at `warn`, executions at `info`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingAuditSink;

impl AuditSink for TracingAuditSink {
    fn record(&self, entry: &AuditEntry) {
        match (&entry.validation, &entry.execution) {
            (ValidationOutcome::Rejected(reason), _) => {
                tracing::warn!(
                    origin = %entry.origin,
                    command = %entry.raw_input,
                    %reason,
                    "Command rejected"
                );
            }
            (ValidationOutcome::Accepted(_), Some(execution)) => {
                tracing::info!(
                    origin = %entry.origin,
                    command = %entry.raw_input,
                    sanitized = entry.sanitized.as_deref().unwrap_or_default(),
                    termination = ?execution.termination,
                    duration = ?execution.duration,
                    "Command executed"
                );
            }
            (ValidationOutcome::Accepted(_), None) => {
                tracing::info!(
                    origin = %entry.origin,
                    command = %entry.raw_input,
                    "Command accepted"
                );
            }
        }
    }
}

/// Sink that drops every entry.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopAuditSink;

impl AuditSink for NoopAuditSink {
    fn record(&self, _entry: &AuditEntry) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Rejection;

    #[test]
    fn test_entry_serializes() {
        let entry = AuditEntry {
            timestamp: Utc::now(),
            origin: Origin::AiGenerated,
            raw_input: "shutdown now".to_string(),
            sanitized: None,
            validation: ValidationOutcome::Rejected(Rejection::ForbiddenSubstring {
                matched: "shutdown".to_string(),
            }),
            execution: None,
        };

        let json: serde_json::Value = serde_json::from_str(&entry.to_json().unwrap()).unwrap();
        assert_eq!(json["origin"], "ai-generated");
        assert_eq!(json["raw_input"], "shutdown now");
        assert_eq!(json["validation"]["rejected"]["kind"], "forbidden_substring");
        assert!(json["execution"].is_null());
    }
}
