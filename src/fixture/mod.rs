//! Scoped resource fixtures.
//!
//! A fixture is an acquire → hand-off → release unit. Acquisition produces an
//! [`Acquired`] value carrying the handle plus an optional release callback;
//! the runner pushes it on a [`ScopeStack`] and unwinds the stack in reverse
//! order when the scope ends, whatever the test's outcome.
//!
//! # Built-in fixtures
//!
//! | Fixture | Scope | Depends on |
//! |---------|-------|------------|
//! | `address` | session | option value |
//! | `controller` | session | `address` |
//! | `subsystem` | session | `controller` |
//! | `pcie` | session | `controller` |
//! | `namespace` | function | `controller` |
//! | `buffer` | session | |
//! | `aer` | function | `controller` |
//! | `verify` | function | |
//!
//! Acquisition order is derived from [`FixtureFactory::dependencies`] by the
//! [`scheduler`]; tests only name what they use.

pub mod aer;
pub mod device;
pub mod registry;
pub mod scheduler;
pub mod scope;
pub mod verify;

pub use aer::{AerFixture, AerRegistrar};
pub use device::{
    AddressFixture, BufferFixture, ControllerFixture, NamespaceFixture, PcieFixture,
    SubsystemFixture,
};
pub use registry::FixtureRegistry;
pub use scheduler::acquisition_order;
pub use scope::{ScopeStack, ScopeView};
pub use verify::VerifyFixture;

use crate::config::FixtureSettings;
use crate::error::{HarnessError, HarnessResult};
use crate::options::DeviceAddress;
use nvme_core::{Buffer, Controller, DeviceDriver, Namespace, Pcie, Subsystem};
use std::fmt;
use std::sync::Arc;

// =============================================================================
// Identity
// =============================================================================

/// Names of the fixtures a test can request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum FixtureKind {
    /// Configured device address
    Address,
    /// Controller handle
    Controller,
    /// Subsystem handle
    Subsystem,
    /// PCIe handle
    Pcie,
    /// Namespace 1 of the controller
    Namespace,
    /// Session data buffer
    Buffer,
    /// AER callback registrar
    Aer,
    /// Whether toggling read verification changes the config word
    Verify,
}

impl FixtureKind {
    /// Every fixture kind.
    pub const ALL: [FixtureKind; 8] = [
        FixtureKind::Address,
        FixtureKind::Controller,
        FixtureKind::Subsystem,
        FixtureKind::Pcie,
        FixtureKind::Namespace,
        FixtureKind::Buffer,
        FixtureKind::Aer,
        FixtureKind::Verify,
    ];

    /// Name used in logs and error messages.
    pub fn name(self) -> &'static str {
        match self {
            FixtureKind::Address => "address",
            FixtureKind::Controller => "controller",
            FixtureKind::Subsystem => "subsystem",
            FixtureKind::Pcie => "pcie",
            FixtureKind::Namespace => "namespace",
            FixtureKind::Buffer => "buffer",
            FixtureKind::Aer => "aer",
            FixtureKind::Verify => "verify",
        }
    }
}

impl fmt::Display for FixtureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Lifetime of an acquired fixture.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    /// Acquired on first use, released when the session finishes
    Session,
    /// Acquired for one test, released when that test ends
    Function,
}

// =============================================================================
// Values
// =============================================================================

/// Value handed to tests and to dependent fixtures.
#[derive(Debug, Clone)]
pub enum FixtureValue {
    /// Device address string
    Address(String),
    /// Controller handle
    Controller(Arc<dyn Controller>),
    /// Subsystem handle
    Subsystem(Arc<dyn Subsystem>),
    /// PCIe handle
    Pcie(Arc<dyn Pcie>),
    /// Namespace handle
    Namespace(Arc<dyn Namespace>),
    /// Buffer handle
    Buffer(Arc<dyn Buffer>),
    /// AER registrar
    Aer(AerRegistrar),
    /// Verify toggle result
    Verify(bool),
}

/// Release callback run when the owning scope ends.
pub type ReleaseFn = Box<dyn FnOnce(FixtureValue) -> HarnessResult<()> + Send>;

/// A fully acquired fixture, ready to be pushed on a scope stack.
pub struct Acquired {
    kind: FixtureKind,
    value: FixtureValue,
    release: Option<ReleaseFn>,
}

impl Acquired {
    /// Value released by dropping it.
    pub fn new(kind: FixtureKind, value: FixtureValue) -> Self {
        Self {
            kind,
            value,
            release: None,
        }
    }

    /// Value released by running `release` on it.
    pub fn with_release<F>(kind: FixtureKind, value: FixtureValue, release: F) -> Self
    where
        F: FnOnce(FixtureValue) -> HarnessResult<()> + Send + 'static,
    {
        Self {
            kind,
            value,
            release: Some(Box::new(release)),
        }
    }

    /// Which fixture this is.
    pub fn kind(&self) -> FixtureKind {
        self.kind
    }

    /// The acquired value.
    pub fn value(&self) -> &FixtureValue {
        &self.value
    }

    /// Run the release callback, consuming the value.
    pub fn release(self) -> HarnessResult<()> {
        match self.release {
            Some(release) => release(self.value),
            None => Ok(()),
        }
    }
}

impl fmt::Debug for Acquired {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Acquired")
            .field("kind", &self.kind)
            .field("value", &self.value)
            .field("has_release", &self.release.is_some())
            .finish()
    }
}

// =============================================================================
// Lookup
// =============================================================================

/// Read access to fixtures that are already acquired.
///
/// Implemented by the scope view used during acquisition and by the test
/// context handed to test bodies. The typed getters fail with
/// [`HarnessError::FixtureNotRequested`] when the fixture is absent.
pub trait FixtureLookup {
    /// Raw value of `kind`, if present.
    fn lookup(&self, kind: FixtureKind) -> Option<&FixtureValue>;

    /// Device address.
    fn address(&self) -> HarnessResult<String> {
        match self.lookup(FixtureKind::Address) {
            Some(FixtureValue::Address(addr)) => Ok(addr.clone()),
            _ => Err(HarnessError::FixtureNotRequested(FixtureKind::Address)),
        }
    }

    /// Controller handle.
    fn controller(&self) -> HarnessResult<Arc<dyn Controller>> {
        match self.lookup(FixtureKind::Controller) {
            Some(FixtureValue::Controller(ctrl)) => Ok(ctrl.clone()),
            _ => Err(HarnessError::FixtureNotRequested(FixtureKind::Controller)),
        }
    }

    /// Subsystem handle.
    fn subsystem(&self) -> HarnessResult<Arc<dyn Subsystem>> {
        match self.lookup(FixtureKind::Subsystem) {
            Some(FixtureValue::Subsystem(subsystem)) => Ok(subsystem.clone()),
            _ => Err(HarnessError::FixtureNotRequested(FixtureKind::Subsystem)),
        }
    }

    /// PCIe handle.
    fn pcie(&self) -> HarnessResult<Arc<dyn Pcie>> {
        match self.lookup(FixtureKind::Pcie) {
            Some(FixtureValue::Pcie(pcie)) => Ok(pcie.clone()),
            _ => Err(HarnessError::FixtureNotRequested(FixtureKind::Pcie)),
        }
    }

    /// Namespace handle.
    fn namespace(&self) -> HarnessResult<Arc<dyn Namespace>> {
        match self.lookup(FixtureKind::Namespace) {
            Some(FixtureValue::Namespace(ns)) => Ok(ns.clone()),
            _ => Err(HarnessError::FixtureNotRequested(FixtureKind::Namespace)),
        }
    }

    /// Buffer handle.
    fn buffer(&self) -> HarnessResult<Arc<dyn Buffer>> {
        match self.lookup(FixtureKind::Buffer) {
            Some(FixtureValue::Buffer(buf)) => Ok(buf.clone()),
            _ => Err(HarnessError::FixtureNotRequested(FixtureKind::Buffer)),
        }
    }

    /// AER registrar.
    fn aer(&self) -> HarnessResult<AerRegistrar> {
        match self.lookup(FixtureKind::Aer) {
            Some(FixtureValue::Aer(registrar)) => Ok(registrar.clone()),
            _ => Err(HarnessError::FixtureNotRequested(FixtureKind::Aer)),
        }
    }

    /// Whether toggling verification changed the config word.
    fn verify(&self) -> HarnessResult<bool> {
        match self.lookup(FixtureKind::Verify) {
            Some(FixtureValue::Verify(changed)) => Ok(*changed),
            _ => Err(HarnessError::FixtureNotRequested(FixtureKind::Verify)),
        }
    }
}

// =============================================================================
// Factories
// =============================================================================

/// Everything a factory may use besides its dependencies.
#[derive(Clone)]
pub struct FixtureEnv {
    /// Device driver module
    pub driver: Arc<dyn DeviceDriver>,
    /// Configured device address
    pub address: DeviceAddress,
    /// Fixture parameters
    pub settings: FixtureSettings,
}

impl fmt::Debug for FixtureEnv {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FixtureEnv")
            .field("driver", &self.driver.driver_type())
            .field("address", &self.address)
            .field("settings", &self.settings)
            .finish()
    }
}

/// Produces one kind of fixture.
///
/// `acquire` constructs at most one driver object and returns it fully
/// initialized; if it fails, nothing was registered for release.
pub trait FixtureFactory: Send + Sync {
    /// Fixture produced.
    fn kind(&self) -> FixtureKind;

    /// How long the produced value lives.
    fn scope(&self) -> Scope;

    /// Fixtures that must be acquired first.
    fn dependencies(&self) -> &'static [FixtureKind] {
        &[]
    }

    /// Build the fixture.
    fn acquire(&self, deps: &dyn FixtureLookup, env: &FixtureEnv) -> HarnessResult<Acquired>;
}
