//! Mock implementation of the device driver module.
//!
//! Handles are plain structs that journal their construction and drop. The
//! global config word follows the native driver's layout (bit 0 is
//! read-verify); a driver built with [`MockDriver::without_verify`] ignores
//! verify requests so the word never changes.

use crate::common::{ErrorConfig, MockRng};
use crate::journal::{DriverEvent, HandleKind, Journal};
use nvme_core::driver::{
    AerCallback, AerCompletion, Buffer, ConfigWord, Controller, DeviceDriver, Namespace, Pcie,
    Subsystem,
};
use nvme_core::error::{DriverError, DriverErrorKind, DriverResult};
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

/// Driver type reported in errors.
pub const DRIVER_TYPE: &str = "mock_nvme";

/// State shared between the driver and every handle it constructed.
#[derive(Debug)]
struct Shared {
    journal: Journal,
    rng: MockRng,
    errors: ErrorConfig,
    config: Mutex<ConfigWord>,
    verify_supported: bool,
    aer_callbacks: Mutex<BTreeMap<u64, AerCallback>>,
    next_id: AtomicU64,
}

impl Shared {
    fn check(&self, operation: &'static str) -> DriverResult<()> {
        self.errors.check_operation(DRIVER_TYPE, operation, &self.rng)
    }

    fn allocate_id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::SeqCst) + 1
    }

    fn constructed(&self, kind: HandleKind) -> u64 {
        let id = self.allocate_id();
        tracing::trace!(?kind, id, "mock handle constructed");
        self.journal.push(DriverEvent::Constructed { kind, id });
        id
    }
}

// =============================================================================
// Driver
// =============================================================================

/// In-memory stand-in for the native NVMe driver.
#[derive(Debug, Clone)]
pub struct MockDriver {
    shared: Arc<Shared>,
}

impl MockDriver {
    /// Driver with verification support and no injected errors.
    pub fn new() -> Self {
        Self::build(true, ErrorConfig::none())
    }

    /// Driver whose config word does not react to verify requests.
    pub fn without_verify() -> Self {
        Self::build(false, ErrorConfig::none())
    }

    /// Driver that injects failures according to `errors`.
    pub fn with_errors(errors: ErrorConfig) -> Self {
        Self::build(true, errors)
    }

    fn build(verify_supported: bool, errors: ErrorConfig) -> Self {
        Self {
            shared: Arc::new(Shared {
                journal: Journal::new(),
                rng: MockRng::new(Some(0)),
                errors,
                config: Mutex::new(ConfigWord::default()),
                verify_supported,
                aer_callbacks: Mutex::new(BTreeMap::new()),
                next_id: AtomicU64::new(0),
            }),
        }
    }

    /// Journal of everything this driver did.
    pub fn journal(&self) -> &Journal {
        &self.shared.journal
    }

    /// Current config word.
    pub fn config_word(&self) -> ConfigWord {
        *self.shared.config.lock()
    }

    /// Draw from the driver's random generator.
    pub fn next_random(&self) -> u64 {
        self.shared.rng.next_u64()
    }

    /// Deliver an asynchronous event to every installed callback.
    ///
    /// Returns how many callbacks ran.
    pub fn raise_aer(&self, cpl: AerCompletion) -> usize {
        let callbacks: Vec<AerCallback> =
            self.shared.aer_callbacks.lock().values().cloned().collect();
        for cb in &callbacks {
            cb.call(&cpl);
        }
        callbacks.len()
    }
}

impl Default for MockDriver {
    fn default() -> Self {
        Self::new()
    }
}

impl DeviceDriver for MockDriver {
    fn driver_type(&self) -> &'static str {
        DRIVER_TYPE
    }

    fn srand(&self, seed: u32) {
        self.shared.rng.reseed(u64::from(seed));
        self.shared.journal.push(DriverEvent::Srand { seed });
    }

    fn controller(&self, address: &[u8]) -> DriverResult<Arc<dyn Controller>> {
        self.shared.check("controller")?;
        let address = String::from_utf8(address.to_vec()).map_err(|e| {
            DriverError::new(
                DRIVER_TYPE,
                DriverErrorKind::InvalidParameter,
                format!("address is not UTF-8: {}", e),
            )
        })?;
        let id = self.shared.constructed(HandleKind::Controller);
        Ok(Arc::new(MockController {
            id,
            address,
            shared: self.shared.clone(),
        }))
    }

    fn subsystem(&self, controller: &Arc<dyn Controller>) -> DriverResult<Arc<dyn Subsystem>> {
        self.shared.check("subsystem")?;
        let id = self.shared.constructed(HandleKind::Subsystem);
        Ok(Arc::new(MockSubsystem {
            id,
            controller: controller.clone(),
            journal: self.shared.journal.clone(),
        }))
    }

    fn pcie(&self, controller: &Arc<dyn Controller>) -> DriverResult<Arc<dyn Pcie>> {
        self.shared.check("pcie")?;
        let id = self.shared.constructed(HandleKind::Pcie);
        Ok(Arc::new(MockPcie {
            id,
            controller: controller.clone(),
            journal: self.shared.journal.clone(),
        }))
    }

    fn namespace(
        &self,
        controller: &Arc<dyn Controller>,
        nsid: u32,
    ) -> DriverResult<Arc<dyn Namespace>> {
        self.shared.check("namespace")?;
        if nsid == 0 {
            return Err(DriverError::new(
                DRIVER_TYPE,
                DriverErrorKind::InvalidParameter,
                "namespace id 0 is reserved",
            ));
        }
        let id = self.shared.constructed(HandleKind::Namespace);
        Ok(Arc::new(MockNamespace {
            id,
            nsid,
            controller: controller.clone(),
            closed: AtomicBool::new(false),
            shared: self.shared.clone(),
        }))
    }

    fn buffer(&self, size: usize, label: &str) -> DriverResult<Arc<dyn Buffer>> {
        self.shared.check("buffer")?;
        let id = self.shared.constructed(HandleKind::Buffer);
        Ok(Arc::new(MockBuffer {
            id,
            size,
            label: label.to_string(),
            journal: self.shared.journal.clone(),
        }))
    }

    fn config(&self, verify: bool) -> DriverResult<ConfigWord> {
        self.shared.check("config")?;
        let word = {
            let mut current = self.shared.config.lock();
            if self.shared.verify_supported {
                *current = current.with(ConfigWord::VERIFY_READ, verify);
            }
            *current
        };
        self.shared
            .journal
            .push(DriverEvent::Config { verify, word });
        Ok(word)
    }
}

// =============================================================================
// Handles
// =============================================================================

/// Mock controller handle.
#[derive(Debug)]
pub struct MockController {
    id: u64,
    address: String,
    shared: Arc<Shared>,
}

impl Controller for MockController {
    fn address(&self) -> &str {
        &self.address
    }

    fn register_aer_cb(&self, cb: Option<AerCallback>) -> DriverResult<()> {
        self.shared.check("register_aer_cb")?;
        let name = cb.as_ref().map(|c| c.name().to_string());
        {
            let mut callbacks = self.shared.aer_callbacks.lock();
            match cb {
                Some(cb) => {
                    callbacks.insert(self.id, cb);
                }
                None => {
                    callbacks.remove(&self.id);
                }
            }
        }
        self.shared.journal.push(DriverEvent::AerRegistered {
            controller: self.id,
            callback: name,
        });
        Ok(())
    }
}

impl Drop for MockController {
    fn drop(&mut self) {
        self.shared.aer_callbacks.lock().remove(&self.id);
        self.shared.journal.push(DriverEvent::Released {
            kind: HandleKind::Controller,
            id: self.id,
        });
    }
}

/// Mock subsystem handle.
#[derive(Debug)]
pub struct MockSubsystem {
    id: u64,
    controller: Arc<dyn Controller>,
    journal: Journal,
}

impl Subsystem for MockSubsystem {
    fn controller(&self) -> &Arc<dyn Controller> {
        &self.controller
    }
}

impl Drop for MockSubsystem {
    fn drop(&mut self) {
        self.journal.push(DriverEvent::Released {
            kind: HandleKind::Subsystem,
            id: self.id,
        });
    }
}

/// Mock PCIe handle.
#[derive(Debug)]
pub struct MockPcie {
    id: u64,
    controller: Arc<dyn Controller>,
    journal: Journal,
}

impl Pcie for MockPcie {
    fn controller(&self) -> &Arc<dyn Controller> {
        &self.controller
    }
}

impl Drop for MockPcie {
    fn drop(&mut self) {
        self.journal.push(DriverEvent::Released {
            kind: HandleKind::Pcie,
            id: self.id,
        });
    }
}

/// Mock namespace handle.
#[derive(Debug)]
pub struct MockNamespace {
    id: u64,
    nsid: u32,
    #[allow(dead_code)]
    controller: Arc<dyn Controller>,
    closed: AtomicBool,
    shared: Arc<Shared>,
}

impl Namespace for MockNamespace {
    fn nsid(&self) -> u32 {
        self.nsid
    }

    fn close(&self) -> DriverResult<()> {
        self.shared.check("close")?;
        if self.closed.swap(true, Ordering::SeqCst) {
            return Err(DriverError::new(
                DRIVER_TYPE,
                DriverErrorKind::Shutdown,
                format!("namespace {} already closed", self.nsid),
            ));
        }
        self.shared.journal.push(DriverEvent::Closed { id: self.id });
        Ok(())
    }
}

impl Drop for MockNamespace {
    fn drop(&mut self) {
        self.shared.journal.push(DriverEvent::Released {
            kind: HandleKind::Namespace,
            id: self.id,
        });
    }
}

/// Mock buffer handle.
#[derive(Debug)]
pub struct MockBuffer {
    id: u64,
    size: usize,
    label: String,
    journal: Journal,
}

impl Buffer for MockBuffer {
    fn size(&self) -> usize {
        self.size
    }

    fn label(&self) -> &str {
        &self.label
    }
}

impl Drop for MockBuffer {
    fn drop(&mut self) {
        self.journal.push(DriverEvent::Released {
            kind: HandleKind::Buffer,
            id: self.id,
        });
    }
}
