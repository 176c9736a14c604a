//! PHY status codes and the MACsec error taxonomy.
//!
//! Register transports report raw status codes; this module turns them into
//! Rust's Result type and defines the error kinds every MACsec operation can
//! return.

use std::fmt;
use thiserror::Error;

/// Status codes returned by a register transport.
#[repr(i32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PhyStatus {
    Ok = 0,
    Error = -1,
    NotImplemented = -2,
    InvalidParameter = -3,
    NoResource = -4,
    Busy = -5,
    Timeout = -6,
    NoDevice = -7,
}

impl PhyStatus {
    /// Creates a PhyStatus from a raw i32 value.
    pub fn from_raw(status: i32) -> Self {
        match status {
            0 => PhyStatus::Ok,
            -2 => PhyStatus::NotImplemented,
            -3 => PhyStatus::InvalidParameter,
            -4 => PhyStatus::NoResource,
            -5 => PhyStatus::Busy,
            -6 => PhyStatus::Timeout,
            -7 => PhyStatus::NoDevice,
            _ => PhyStatus::Error,
        }
    }

    pub fn is_ok(&self) -> bool {
        *self == PhyStatus::Ok
    }

    /// Converts to a Result, returning Ok(()) for success.
    pub fn into_result(self) -> MacsecResult<()> {
        if self.is_ok() {
            Ok(())
        } else {
            Err(MacsecError::from_status(self))
        }
    }
}

impl fmt::Display for PhyStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            PhyStatus::Ok => "PHY_RC_OK",
            PhyStatus::Error => "PHY_RC_ERROR",
            PhyStatus::NotImplemented => "PHY_RC_NOT_IMPLEMENTED",
            PhyStatus::InvalidParameter => "PHY_RC_INVALID_PARAMETER",
            PhyStatus::NoResource => "PHY_RC_NO_RESOURCE",
            PhyStatus::Busy => "PHY_RC_BUSY",
            PhyStatus::Timeout => "PHY_RC_TIMEOUT",
            PhyStatus::NoDevice => "PHY_RC_NO_DEVICE",
        };
        write!(f, "{}", s)
    }
}

/// Error type for MACsec operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MacsecError {
    /// A referenced SecY, SC, SA or rule does not exist.
    #[error("Not found: {what}")]
    NotFound { what: String },

    /// Create called on an existing handle.
    #[error("Already exists: {what}")]
    AlreadyExists { what: String },

    #[error("Invalid argument: {message}")]
    InvalidArgument { message: String },

    /// Disable requested on an association that is not active.
    #[error("Not active: {what}")]
    NotActive { what: String },

    /// Activate or delete requested on an association that is active.
    #[error("Already active: {what}")]
    AlreadyActive { what: String },

    #[error("MACsec engine not enabled on port {port}")]
    EngineNotEnabled { port: u32 },

    /// Feature absent on this PHY family.
    #[error("Not implemented: {feature}")]
    NotImplemented { feature: String },

    /// A bounded hardware-completion poll ran out of attempts.
    #[error("Timeout waiting for {operation} after {attempts} attempts")]
    Timeout { operation: String, attempts: u32 },

    /// Register I/O failed.
    #[error("Transport failure: {status}")]
    Transport { status: PhyStatus },
}

impl MacsecError {
    /// Creates an error from a transport status code.
    pub fn from_status(status: PhyStatus) -> Self {
        match status {
            PhyStatus::NotImplemented => MacsecError::NotImplemented {
                feature: "transport operation".to_string(),
            },
            PhyStatus::InvalidParameter => MacsecError::InvalidArgument {
                message: format!("transport returned {}", status),
            },
            _ => MacsecError::Transport { status },
        }
    }

    pub fn not_found(what: impl Into<String>) -> Self {
        MacsecError::NotFound { what: what.into() }
    }

    pub fn already_exists(what: impl Into<String>) -> Self {
        MacsecError::AlreadyExists { what: what.into() }
    }

    pub fn invalid_argument(message: impl Into<String>) -> Self {
        MacsecError::InvalidArgument {
            message: message.into(),
        }
    }

    pub fn not_active(what: impl Into<String>) -> Self {
        MacsecError::NotActive { what: what.into() }
    }

    pub fn already_active(what: impl Into<String>) -> Self {
        MacsecError::AlreadyActive { what: what.into() }
    }

    pub fn not_implemented(feature: impl Into<String>) -> Self {
        MacsecError::NotImplemented {
            feature: feature.into(),
        }
    }

    pub fn timeout(operation: impl Into<String>, attempts: u32) -> Self {
        MacsecError::Timeout {
            operation: operation.into(),
            attempts,
        }
    }

    /// Returns the underlying transport status if this is a Transport error.
    pub fn status(&self) -> Option<PhyStatus> {
        match self {
            MacsecError::Transport { status } => Some(*status),
            _ => None,
        }
    }

    /// Returns true if the caller may reasonably retry the same call.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            MacsecError::Timeout { .. }
                | MacsecError::Transport {
                    status: PhyStatus::Busy | PhyStatus::Timeout
                }
        )
    }

    /// Returns true for the "feature absent on this PHY" outcome, which
    /// callers are expected to skip rather than abort on.
    pub fn is_not_implemented(&self) -> bool {
        matches!(self, MacsecError::NotImplemented { .. })
    }
}

impl From<PhyStatus> for MacsecError {
    fn from(status: PhyStatus) -> Self {
        MacsecError::from_status(status)
    }
}

impl From<macsec_types::ParseError> for MacsecError {
    fn from(err: macsec_types::ParseError) -> Self {
        MacsecError::invalid_argument(err.to_string())
    }
}

/// Result type for MACsec operations.
pub type MacsecResult<T> = Result<T, MacsecError>;

/// Extension trait for converting raw transport status codes.
pub trait PhyStatusExt {
    fn to_result(self) -> MacsecResult<()>;
}

impl PhyStatusExt for i32 {
    fn to_result(self) -> MacsecResult<()> {
        PhyStatus::from_raw(self).into_result()
    }
}
