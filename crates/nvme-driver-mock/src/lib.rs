//! Mock NVMe Driver for nvme_harness
//!
//! This crate provides an in-memory implementation of
//! [`nvme_core::DeviceDriver`] so the fixture layer can be exercised without a
//! device under test.
//!
//! # What the mock models
//!
//! - Handle lifecycles: every construction, namespace close and drop is
//!   recorded in a [`Journal`]
//! - The global config word: bit 0 toggles with `config(verify)` unless the
//!   driver was built with [`MockDriver::without_verify`]
//! - `srand`: reseeds the driver's [`MockRng`]
//! - AER callbacks: installed per controller, fired with
//!   [`MockDriver::raise_aer`]
//! - Failure injection through [`ErrorConfig`]
//!
//! # Example
//!
//! ```rust
//! use nvme_core::DeviceDriver;
//! use nvme_driver_mock::{HandleKind, MockDriver};
//!
//! let driver = MockDriver::new();
//! let ctrl = driver.controller(b"02:00.0").unwrap();
//! let ns = driver.namespace(&ctrl, 1).unwrap();
//! ns.close().unwrap();
//! drop(ns);
//!
//! assert_eq!(driver.journal().constructed(HandleKind::Namespace), 1);
//! assert_eq!(driver.journal().released(HandleKind::Namespace), 1);
//! ```

pub mod common;
pub mod journal;
mod mock_driver;

pub use common::{ErrorConfig, ErrorScenario, MockRng};
pub use journal::{DriverEvent, HandleKind, Journal};
pub use mock_driver::{
    MockBuffer, MockController, MockDriver, MockNamespace, MockPcie, MockSubsystem, DRIVER_TYPE,
};
