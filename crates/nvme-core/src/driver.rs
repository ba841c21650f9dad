//! Device Driver Interface
//!
//! The harness treats the native NVMe driver as a black box reached through
//! [`DeviceDriver`]. Each constructor returns an opaque handle; the harness
//! owns the handle's lifetime and releases it by dropping it.
//!
//! # Handle graph
//!
//! ```text
//!            ┌──────────────┐
//!  address ─▶│  Controller  │◀──────────────┐
//!            └──────────────┘               │
//!              ▲     ▲     ▲                │
//!              │     │     │                │
//!     Subsystem    Pcie    Namespace(nsid)  │ register_aer_cb
//!                                           │
//!   Buffer(size, label)       config(verify)┘ (driver-global)
//! ```
//!
//! Derived handles keep an `Arc` to their controller. The harness still drops
//! them before the controller so that the driver sees dependents go away
//! first.

use crate::error::DriverResult;
use std::fmt;
use std::sync::Arc;

// =============================================================================
// Config Word
// =============================================================================

/// Global driver configuration word, as reported by `config`.
///
/// Two words compare equal iff every bit matches, which is what the verify
/// fixture relies on to tell whether toggling verification changed anything.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct ConfigWord(pub u64);

impl ConfigWord {
    /// Verify data read back against the driver's CRC table
    pub const VERIFY_READ: u64 = 1 << 0;
    /// Use MSI-X interrupts
    pub const ENABLE_MSIX: u64 = 1 << 1;
    /// Force unit access on reads
    pub const FUA_READ: u64 = 1 << 2;
    /// Force unit access on writes
    pub const FUA_WRITE: u64 = 1 << 3;
    /// Terminate outstanding ioworker commands on error
    pub const IOW_TERM: u64 = 1 << 4;

    /// Raw bits.
    pub fn bits(self) -> u64 {
        self.0
    }

    /// Whether all bits of `flag` are set.
    pub fn contains(self, flag: u64) -> bool {
        self.0 & flag == flag
    }

    /// Copy of this word with `flag` set or cleared.
    pub fn with(self, flag: u64, enabled: bool) -> Self {
        if enabled {
            Self(self.0 | flag)
        } else {
            Self(self.0 & !flag)
        }
    }

    /// Whether read verification is on.
    pub fn verify(self) -> bool {
        self.contains(Self::VERIFY_READ)
    }
}

// =============================================================================
// Asynchronous Event Callbacks
// =============================================================================

/// Completion entry delivered with an asynchronous event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AerCompletion {
    /// Command specific dword 0 (event type / info / log page)
    pub cdw0: u32,
    /// Status field of the completion
    pub status: u16,
}

/// A named asynchronous-event callback.
///
/// The name is the callback's identity for logging; two callbacks with the
/// same name are still distinct registrations.
#[derive(Clone)]
pub struct AerCallback {
    name: String,
    func: Arc<dyn Fn(&AerCompletion) + Send + Sync>,
}

impl AerCallback {
    /// Wrap a closure under `name`.
    pub fn new<F>(name: impl Into<String>, func: F) -> Self
    where
        F: Fn(&AerCompletion) + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            func: Arc::new(func),
        }
    }

    /// Callback name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Invoke the callback.
    pub fn call(&self, cpl: &AerCompletion) {
        (self.func)(cpl);
    }
}

impl fmt::Debug for AerCallback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AerCallback")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

// =============================================================================
// Handles
// =============================================================================

/// An attached NVMe controller.
pub trait Controller: fmt::Debug + Send + Sync {
    /// Address the controller was constructed from.
    fn address(&self) -> &str;

    /// Install `cb` as the AER callback, or clear it with `None`.
    fn register_aer_cb(&self, cb: Option<AerCallback>) -> DriverResult<()>;
}

/// NVM subsystem view of a controller (power cycle, reset).
pub trait Subsystem: fmt::Debug + Send + Sync {
    /// Controller this subsystem was derived from.
    fn controller(&self) -> &Arc<dyn Controller>;
}

/// PCIe function behind a controller (config space access).
pub trait Pcie: fmt::Debug + Send + Sync {
    /// Controller this function was derived from.
    fn controller(&self) -> &Arc<dyn Controller>;
}

/// An attached namespace.
pub trait Namespace: fmt::Debug + Send + Sync {
    /// Namespace id.
    fn nsid(&self) -> u32;

    /// Detach from the namespace. Called once before the handle is dropped.
    fn close(&self) -> DriverResult<()>;
}

/// DMA-able host buffer.
pub trait Buffer: fmt::Debug + Send + Sync {
    /// Size in bytes.
    fn size(&self) -> usize;

    /// Label given at construction.
    fn label(&self) -> &str;
}

// =============================================================================
// Driver
// =============================================================================

/// Entry points of the native device driver module.
///
/// Implementations own whatever global state the driver has (random
/// generator, configuration word). Handles are released by dropping them.
pub trait DeviceDriver: Send + Sync {
    /// Short identifier used in errors and logs.
    fn driver_type(&self) -> &'static str;

    /// Seed the driver's random generator.
    fn srand(&self, seed: u32);

    /// Attach to the controller at `address` (UTF-8 bytes of a BDF string).
    fn controller(&self, address: &[u8]) -> DriverResult<Arc<dyn Controller>>;

    /// Subsystem handle for `controller`.
    fn subsystem(&self, controller: &Arc<dyn Controller>) -> DriverResult<Arc<dyn Subsystem>>;

    /// PCIe handle for `controller`.
    fn pcie(&self, controller: &Arc<dyn Controller>) -> DriverResult<Arc<dyn Pcie>>;

    /// Namespace `nsid` of `controller`.
    fn namespace(
        &self,
        controller: &Arc<dyn Controller>,
        nsid: u32,
    ) -> DriverResult<Arc<dyn Namespace>>;

    /// Allocate a buffer of `size` bytes.
    fn buffer(&self, size: usize, label: &str) -> DriverResult<Arc<dyn Buffer>>;

    /// Turn read verification on or off and report the resulting config word.
    fn config(&self, verify: bool) -> DriverResult<ConfigWord>;
}
