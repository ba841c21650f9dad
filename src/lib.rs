//! # NVMe Harness Library
//!
//! Fixture and lifecycle layer of a hardware-in-the-loop test harness for an
//! NVMe controller. It sits between a test runner and the native device
//! driver module (reached through [`nvme_core::DeviceDriver`]) and provides
//! per-test and per-session resource scoping, per-test seeding, a skip
//! signal for placeholder tests and per-phase outcome records.
//!
//! ## Crate Structure
//!
//! - **`config`**: Figment-backed [`HarnessConfig`](config::HarnessConfig)
//!   (defaults, TOML file, `NVME_HARNESS_` environment).
//! - **`error`**: The [`HarnessError`](error::HarnessError) enum.
//! - **`fixture`**: Fixture kinds, factories, scope stacks, the registry and
//!   the dependency-ordered acquisition scheduler. Built-in device, AER and
//!   verify fixtures live here.
//! - **`interceptor`**: Hooks run around every test; the standard
//!   [`Instrumentation`](interceptor::Instrumentation) does stub skipping,
//!   seeding and duration logging.
//! - **`options`**: The `--pciaddr` option and the session's device address.
//! - **`report`**: Phase reports, the report pipeline and run summaries.
//! - **`rng`**: The per-session random generator.
//! - **`session`**: The serial test runner tying everything together.
//! - **`suite`**: A smoke suite touching every fixture.
//! - **`test_case`**: Test definitions and the context given to test bodies.
//! - **`tracing_setup`**: Subscriber initialization for the binary.
//!
//! ## Example
//!
//! ```rust
//! use nvme_harness::fixture::{FixtureKind, FixtureLookup};
//! use nvme_harness::session::Session;
//! use nvme_harness::test_case::TestCase;
//! use nvme_driver_mock::MockDriver;
//! use std::sync::Arc;
//!
//! let driver = MockDriver::new();
//! let mut session = Session::builder(Arc::new(driver.clone()))
//!     .address("02:00.0")
//!     .build();
//!
//! let case = TestCase::new("test_namespace", |ctx| {
//!     anyhow::ensure!(ctx.namespace()?.nsid() == 1);
//!     Ok(())
//! })
//! .with_fixtures(&[FixtureKind::Namespace]);
//!
//! assert!(session.run(&case).outcome_call().unwrap().passed());
//! let report = session.finish();
//! assert!(report.summary.all_passed());
//! ```

pub mod config;
pub mod error;
pub mod fixture;
pub mod interceptor;
pub mod options;
pub mod report;
pub mod rng;
pub mod session;
pub mod suite;
pub mod test_case;
pub mod tracing_setup;

pub use config::HarnessConfig;
pub use error::{HarnessError, HarnessResult};
pub use session::{Session, SessionBuilder, SessionReport};
pub use test_case::{TestCase, TestContext};
