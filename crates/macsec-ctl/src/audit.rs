//! Structured audit trail for MACsec control-plane actions.
//!
//! MACsec state changes are security relevant: turning the engine off or
//! into bypass, opening a controlled port, loading or wiping an SAK. Each of
//! these emits an [`AuditRecord`] through [`audit_log!`] so a collector can
//! reconstruct who changed what on which port.
//!
//! Records follow the NIST SP 800-53 AU-3 content list (timestamp, source,
//! event type, object, outcome, details) and serialize to one JSON object
//! per event for SIEM ingestion.
//!
//! Key material never enters a record. Callers pass AN, PN and flags in
//! `details`; `Sak` redacts itself under `Debug` as a second line.
//!
//! | macro              | level          | use                                   |
//! |--------------------|----------------|---------------------------------------|
//! | `debug_log!`       | debug          | register-level tracing                |
//! | `info_log!`        | info           | lifecycle milestones                  |
//! | `warn_log!`        | warn           | degraded paths, best-effort failures  |
//! | `error_log!`       | error          | failed operations                     |
//! | `audit_log!`       | by outcome     | configuration and key events          |
//! | `security_audit!`  | warn, separate target | key install failures           |

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Audit event categories (AU-2).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuditCategory {
    /// Engine enable, bypass and port-level policy changes
    ConfigurationChange,
    /// SecY, SC or rule created
    ResourceCreate,
    /// SecY, SC or rule updated in place
    ResourceModify,
    /// SecY, SC or rule removed
    ResourceDelete,
    /// Board attach and detach
    SystemLifecycle,
    /// Controlled-port gating
    SecurityPolicy,
    /// SA key install, activation and wipe
    KeyManagement,
    /// Error and failure events
    ErrorCondition,
}

impl fmt::Display for AuditCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuditCategory::ConfigurationChange => write!(f, "CONFIGURATION_CHANGE"),
            AuditCategory::ResourceCreate => write!(f, "RESOURCE_CREATE"),
            AuditCategory::ResourceModify => write!(f, "RESOURCE_MODIFY"),
            AuditCategory::ResourceDelete => write!(f, "RESOURCE_DELETE"),
            AuditCategory::SystemLifecycle => write!(f, "SYSTEM_LIFECYCLE"),
            AuditCategory::SecurityPolicy => write!(f, "SECURITY_POLICY"),
            AuditCategory::KeyManagement => write!(f, "KEY_MANAGEMENT"),
            AuditCategory::ErrorCondition => write!(f, "ERROR_CONDITION"),
        }
    }
}

/// Outcome of an audited action (AU-3(e)).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuditOutcome {
    Success,
    Failure,
    InProgress,
    /// Refused by a state check before touching hardware
    Denied,
}

impl fmt::Display for AuditOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuditOutcome::Success => write!(f, "success"),
            AuditOutcome::Failure => write!(f, "failure"),
            AuditOutcome::InProgress => write!(f, "in_progress"),
            AuditOutcome::Denied => write!(f, "denied"),
        }
    }
}

/// One audit event.
///
/// Built with the `with_*` methods and consumed by [`audit_log!`] or
/// [`security_audit!`]. The timestamp is taken at construction, in UTC.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditRecord {
    pub timestamp: DateTime<Utc>,

    pub category: AuditCategory,

    /// Component emitting the event, e.g. `MacsecBoard`.
    pub source: String,

    /// Operation name, e.g. `tx_sa_set`.
    pub action: String,

    pub outcome: AuditOutcome,

    /// Handle of the affected object, e.g. `port3/svc0/pid1 an0`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub object_id: Option<String>,

    /// `macsec_engine`, `macsec_secy`, `macsec_sc`, `macsec_sa` or `macsec_rule`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub object_type: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    /// Groups the steps of one multi-call sequence, such as a key rollover.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub correlation_id: Option<String>,
}

impl AuditRecord {
    /// New record with outcome `InProgress`.
    pub fn new(
        category: AuditCategory,
        source: impl Into<String>,
        action: impl Into<String>,
    ) -> Self {
        Self {
            timestamp: Utc::now(),
            category,
            source: source.into(),
            action: action.into(),
            outcome: AuditOutcome::InProgress,
            object_id: None,
            object_type: None,
            details: None,
            error: None,
            correlation_id: None,
        }
    }

    pub fn with_outcome(mut self, outcome: AuditOutcome) -> Self {
        self.outcome = outcome;
        self
    }

    pub fn with_object_id(mut self, id: impl Into<String>) -> Self {
        self.object_id = Some(id.into());
        self
    }

    pub fn with_object_type(mut self, obj_type: impl Into<String>) -> Self {
        self.object_type = Some(obj_type.into());
        self
    }

    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }

    /// Sets the error text and marks the outcome `Failure`.
    pub fn with_error(mut self, error: impl Into<String>) -> Self {
        self.error = Some(error.into());
        self.outcome = AuditOutcome::Failure;
        self
    }

    pub fn with_correlation_id(mut self, id: impl Into<String>) -> Self {
        self.correlation_id = Some(id.into());
        self
    }

    /// Completes the record from an operation result.
    pub fn with_result<T, E: fmt::Display>(self, result: &Result<T, E>) -> Self {
        match result {
            Ok(_) => self.with_outcome(AuditOutcome::Success),
            Err(e) => self.with_error(e.to_string()),
        }
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string(self)
            .unwrap_or_else(|e| format!(r#"{{"error":"serialization_failed","message":"{}"}}"#, e))
    }
}

/// Debug-level log line tagged with its source component.
///
/// ```ignore
/// debug_log!("MacsecBoard", port = %port, "engine enabled");
/// ```
#[macro_export]
macro_rules! debug_log {
    ($source:expr, $($arg:tt)*) => {
        tracing::debug!(
            source = $source,
            $($arg)*
        )
    };
}

/// Info-level log line tagged with its source component.
#[macro_export]
macro_rules! info_log {
    ($source:expr, $($arg:tt)*) => {
        tracing::info!(
            source = $source,
            $($arg)*
        )
    };
}

/// Warn-level log line tagged with its source component.
#[macro_export]
macro_rules! warn_log {
    ($source:expr, $($arg:tt)*) => {
        tracing::warn!(
            source = $source,
            $($arg)*
        )
    };
}

/// Error-level log line tagged with its source component.
#[macro_export]
macro_rules! error_log {
    ($source:expr, $($arg:tt)*) => {
        tracing::error!(
            source = $source,
            $($arg)*
        )
    };
}

/// Emits an [`AuditRecord`] on the `audit` target.
///
/// Success logs at info, in-progress at debug, failure and denial at warn.
///
/// ```ignore
/// let record = AuditRecord::new(AuditCategory::ResourceCreate, "MacsecBoard", "secy_create")
///     .with_outcome(AuditOutcome::Success)
///     .with_object_id("port3/svc0/pid1")
///     .with_object_type("macsec_secy");
/// audit_log!(record);
/// ```
#[macro_export]
macro_rules! audit_log {
    ($record:expr) => {
        let record = $record;
        match record.outcome {
            $crate::audit::AuditOutcome::Success => {
                tracing::info!(
                    target: "audit",
                    category = %record.category,
                    source = %record.source,
                    action = %record.action,
                    outcome = %record.outcome,
                    audit_json = %record.to_json(),
                    "AUDIT: {} - {} - {}",
                    record.category,
                    record.action,
                    record.outcome
                );
            }
            $crate::audit::AuditOutcome::InProgress => {
                tracing::debug!(
                    target: "audit",
                    category = %record.category,
                    source = %record.source,
                    action = %record.action,
                    outcome = %record.outcome,
                    audit_json = %record.to_json(),
                    "AUDIT: {} - {} - {}",
                    record.category,
                    record.action,
                    record.outcome
                );
            }
            $crate::audit::AuditOutcome::Failure | $crate::audit::AuditOutcome::Denied => {
                tracing::warn!(
                    target: "audit",
                    category = %record.category,
                    source = %record.source,
                    action = %record.action,
                    outcome = %record.outcome,
                    error = record.error.as_deref().unwrap_or(""),
                    audit_json = %record.to_json(),
                    "AUDIT: {} - {} - {}",
                    record.category,
                    record.action,
                    record.outcome
                );
            }
        }
    };
}

/// Emits an [`AuditRecord`] on the `security_audit` target, always at warn.
///
/// Reserved for events an operator must see, such as an SAK that failed to
/// load and was wiped.
#[macro_export]
macro_rules! security_audit {
    ($record:expr) => {
        let record = $record;
        tracing::warn!(
            target: "security_audit",
            category = %record.category,
            source = %record.source,
            action = %record.action,
            outcome = %record.outcome,
            error = record.error.as_deref().unwrap_or(""),
            audit_json = %record.to_json(),
            "SECURITY_AUDIT: {} - {} - {}",
            record.category,
            record.action,
            record.outcome
        );
    };
}

/// Installs a JSON `tracing` subscriber. `RUST_LOG` overrides `log_level`.
pub fn init_logging(log_level: &str) {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));

    tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .with_target(true)
                .with_thread_ids(true)
                .with_file(true)
                .with_line_number(true)
                .json(),
        )
        .init();
}

/// Human-readable variant of [`init_logging`] for bench work.
pub fn init_logging_pretty(log_level: &str) {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));

    tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .with_target(true)
                .with_thread_ids(false)
                .with_file(true)
                .with_line_number(true)
                .pretty(),
        )
        .init();
}
