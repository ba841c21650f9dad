//! Common infrastructure for the mock driver.
//!
//! - **errors**: Error injection framework
//! - **rng**: Seeded random number generator (the driver's `srand` target)

pub mod errors;
pub mod rng;

pub use errors::{ErrorConfig, ErrorScenario};
pub use rng::MockRng;
