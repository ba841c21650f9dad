//! Custom error types for the harness.
//!
//! This module defines the primary error type, `HarnessError`. Using the
//! `thiserror` crate, it consolidates the failures the fixture layer can
//! produce, from configuration loading to driver calls made while acquiring
//! or releasing a fixture.
//!
//! ## Error Hierarchy
//!
//! - **`Driver`**: A call into the device driver module failed. These are never
//!   swallowed; the runner reports them as a failure of the phase in which
//!   they happened.
//! - **`Config`** / **`Configuration`**: The configuration could not be
//!   loaded, or loaded but failed validation.
//! - **`UnknownFixture`**, **`DependencyCycle`**, **`ScopeMismatch`**: The
//!   fixture graph is malformed. Reported as setup failures.
//! - **`FixtureNotRequested`**: A test body asked its context for a fixture it
//!   did not declare.
//! - **`ReleasePanicked`**: A release callback panicked. The remaining
//!   fixtures of the scope are still released.
//! - **`PhaseAlreadyRecorded`**: A report stage tried to store a second
//!   outcome for the same phase of one test.
//!
//! Test bodies themselves return `anyhow::Result<()>`; a `HarnessError`
//! converts into `anyhow::Error` with `?`.

use crate::fixture::FixtureKind;
use crate::report::Phase;
use nvme_core::DriverError;
use std::any::Any;
use thiserror::Error;

/// Convenience alias for results using the harness error type.
pub type HarnessResult<T> = std::result::Result<T, HarnessError>;

/// Primary error type for the harness.
#[derive(Error, Debug)]
pub enum HarnessError {
    /// The device driver module reported a failure.
    #[error(transparent)]
    Driver(#[from] DriverError),

    /// Configuration sources could not be merged or deserialized.
    #[error("Configuration error: {0}")]
    Config(#[from] figment::Error),

    /// Configuration loaded but a value is out of range.
    #[error("Configuration validation error: {0}")]
    Configuration(String),

    /// No factory is registered for the fixture.
    #[error("No factory registered for fixture '{0}'")]
    UnknownFixture(FixtureKind),

    /// The fixture was not part of the test's declared fixtures.
    #[error("Fixture '{0}' was not requested by this test")]
    FixtureNotRequested(FixtureKind),

    /// Fixture dependencies form a cycle.
    #[error("Fixture dependency cycle: {}", format_cycle(.0))]
    DependencyCycle(Vec<FixtureKind>),

    /// A session-scoped fixture depends on a function-scoped one.
    #[error("Session fixture '{fixture}' cannot depend on function fixture '{dependency}'")]
    ScopeMismatch {
        /// The session-scoped fixture
        fixture: FixtureKind,
        /// Its function-scoped dependency
        dependency: FixtureKind,
    },

    /// A phase outcome was written twice for one test.
    #[error("Outcome for phase '{phase}' of '{test}' already recorded")]
    PhaseAlreadyRecorded {
        /// Test name
        test: String,
        /// Phase that was written twice
        phase: Phase,
    },

    /// A fixture's release callback panicked.
    #[error("Release of fixture '{fixture}' panicked: {message}")]
    ReleasePanicked {
        /// Fixture being released
        fixture: FixtureKind,
        /// Panic payload
        message: String,
    },
}

/// Text of a panic payload caught with `catch_unwind`.
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        (*msg).to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

fn format_cycle(kinds: &[FixtureKind]) -> String {
    kinds
        .iter()
        .map(|k| k.name())
        .collect::<Vec<_>>()
        .join(" -> ")
}
