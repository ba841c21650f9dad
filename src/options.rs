//! Command-line option surface.
//!
//! The harness contributes one option to the runner, `--pciaddr`, naming the
//! device under test. The value is handed to fixtures through
//! [`DeviceAddress`], which logs it the first time it is read.

use clap::Args;
use once_cell::sync::OnceCell;
use std::fmt;
use std::sync::Arc;

/// Options contributed to the command line by the fixture layer.
#[derive(Args, Debug, Clone, Default, PartialEq, Eq)]
pub struct DeviceOptions {
    /// pci (BDF) address of the device under test, e.g.: 02:00.0
    #[arg(long = "pciaddr", value_name = "BDF")]
    pub pciaddr: Option<String>,
}

/// Configured device address, fixed for the whole session.
///
/// Clones share the same "already logged" state, so the address is logged
/// once per session no matter how many fixtures read it.
#[derive(Clone)]
pub struct DeviceAddress {
    inner: Arc<AddressInner>,
}

struct AddressInner {
    value: String,
    announced: OnceCell<()>,
}

impl DeviceAddress {
    /// Wrap `value`. No validation; an empty string is a valid address.
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            inner: Arc::new(AddressInner {
                value: value.into(),
                announced: OnceCell::new(),
            }),
        }
    }

    /// Read the address, logging it at info level on first read.
    pub fn get(&self) -> &str {
        self.inner.announced.get_or_init(|| {
            tracing::info!("running tests on DUT {}", self.inner.value);
        });
        &self.inner.value
    }

    /// Read the address without logging.
    pub fn peek(&self) -> &str {
        &self.inner.value
    }
}

impl fmt::Debug for DeviceAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("DeviceAddress").field(&self.inner.value).finish()
    }
}

impl From<&DeviceOptions> for DeviceAddress {
    fn from(options: &DeviceOptions) -> Self {
        Self::new(options.pciaddr.clone().unwrap_or_default())
    }
}
