//! `nvme-core`
//!
//! Driver-facing types for the NVMe test harness.
//!
//! This crate defines the narrow interface through which the harness talks to
//! the native device driver module: the [`DeviceDriver`] entry points, the
//! opaque handle traits it hands out, and the error type every call returns.
//! Nothing in here knows about fixtures or tests.
//!
//! ## Key Types
//!
//! - [`DeviceDriver`]: constructors for controller, subsystem, PCIe,
//!   namespace and buffer handles, plus `srand` and `config`
//! - [`ConfigWord`]: the driver's global configuration bits
//! - [`AerCallback`]: named asynchronous-event callback
//! - [`DriverError`]: error returned by every driver call

pub mod driver;
pub mod error;

pub use driver::{
    AerCallback, AerCompletion, Buffer, ConfigWord, Controller, DeviceDriver, Namespace, Pcie,
    Subsystem,
};
pub use error::{DriverError, DriverErrorKind, DriverResult};
