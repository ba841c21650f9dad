//! Error types shared by driver implementations.
//!
//! Every call into the device driver module returns a [`DriverResult`]. The
//! harness never swallows these: a failing construction surfaces as a setup
//! failure, a failing `close` as a teardown failure, and so on.

use thiserror::Error;

// =============================================================================
// Driver Errors
// =============================================================================

/// Broad category of a driver failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriverErrorKind {
    /// Handle construction failed (controller bring-up, namespace attach, ...)
    Initialization,
    /// Driver configuration word could not be applied
    Configuration,
    /// Transport-level failure talking to the device
    Communication,
    /// Closing or releasing a handle failed
    Shutdown,
    /// Device reported a hardware fault
    Hardware,
    /// Operation did not complete in time
    Timeout,
    /// Caller passed an argument the driver rejects
    InvalidParameter,
    /// Anything else
    Unknown,
}

impl std::fmt::Display for DriverErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            DriverErrorKind::Initialization => "initialization",
            DriverErrorKind::Configuration => "configuration",
            DriverErrorKind::Communication => "communication",
            DriverErrorKind::Shutdown => "shutdown",
            DriverErrorKind::Hardware => "hardware",
            DriverErrorKind::Timeout => "timeout",
            DriverErrorKind::InvalidParameter => "invalid_parameter",
            DriverErrorKind::Unknown => "unknown",
        };
        write!(f, "{}", label)
    }
}

/// Error returned by a [`crate::driver::DeviceDriver`] or one of its handles.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Driver '{driver_type}' {kind} error: {message}")]
pub struct DriverError {
    /// Driver that produced the error (e.g. "mock_nvme")
    pub driver_type: String,
    /// Failure category
    pub kind: DriverErrorKind,
    /// Human-readable detail
    pub message: String,
}

impl DriverError {
    /// Create a new driver error.
    pub fn new(
        driver_type: impl Into<String>,
        kind: DriverErrorKind,
        message: impl Into<String>,
    ) -> Self {
        Self {
            driver_type: driver_type.into(),
            kind,
            message: message.into(),
        }
    }
}

/// Result alias for driver calls.
pub type DriverResult<T> = std::result::Result<T, DriverError>;
