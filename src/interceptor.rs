//! Instrumentation around every test.
//!
//! The session calls [`TestInterceptor::before`] ahead of fixture
//! acquisition and [`TestInterceptor::after`] once the test's function
//! fixtures have been released. The standard [`Instrumentation`]:
//!
//! 1. skips stub tests before anything is acquired;
//! 2. derives a seed from the wall clock (microseconds, low 32 bits) and
//!    seeds both the driver and the session generator with it;
//! 3. logs the elapsed time when the test is done, whatever its outcome.

use crate::rng::SessionRng;
use crate::test_case::TestCase;
use chrono::Utc;
use nvme_core::DeviceDriver;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Source of wall-clock time.
pub trait Clock: Send + Sync {
    /// Microseconds since the Unix epoch.
    fn now_micros(&self) -> i64;
}

/// Real wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_micros(&self) -> i64 {
        Utc::now().timestamp_micros()
    }
}

/// Clock frozen at a given instant.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub i64);

impl Clock for FixedClock {
    fn now_micros(&self) -> i64 {
        self.0
    }
}

/// Seed for a test started at `micros`: the low 32 bits.
pub fn seed_from_micros(micros: i64) -> u32 {
    (micros as u64 & 0xffff_ffff) as u32
}

/// Session resources the interceptor may touch.
#[derive(Clone, Copy)]
pub struct InterceptEnv<'a> {
    /// Device driver module
    pub driver: &'a dyn DeviceDriver,
    /// Session generator
    pub rng: &'a SessionRng,
}

/// State carried from `before` to `after`.
#[derive(Debug, Clone, Copy)]
pub struct InterceptContext {
    /// When the test started
    pub started: Instant,
    /// Seed the test runs with
    pub seed: u32,
}

/// Decision taken before a test.
#[derive(Debug, Clone)]
pub enum Intercept {
    /// Do not run the test
    Skip(String),
    /// Run it
    Proceed(InterceptContext),
}

/// Hooks bracketing every test.
pub trait TestInterceptor: Send + Sync {
    /// Called before any fixture is acquired.
    fn before(&self, case: &TestCase, env: InterceptEnv<'_>) -> Intercept;

    /// Called after the test's function fixtures are released. Returns the
    /// test's wall time.
    fn after(&self, case: &TestCase, ctx: InterceptContext) -> Duration;
}

/// Standard interceptor: stub skip, seeding and duration logging.
#[derive(Clone)]
pub struct Instrumentation {
    clock: Arc<dyn Clock>,
}

impl Instrumentation {
    /// Reason reported for stub tests.
    pub const STUB_REASON: &'static str = "empty test function";

    /// Interceptor using the real wall clock.
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    /// Interceptor reading time from `clock`.
    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self { clock }
    }
}

impl Default for Instrumentation {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Instrumentation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Instrumentation").finish_non_exhaustive()
    }
}

impl TestInterceptor for Instrumentation {
    fn before(&self, case: &TestCase, env: InterceptEnv<'_>) -> Intercept {
        if case.is_stub() {
            return Intercept::Skip(Self::STUB_REASON.to_string());
        }

        let seed = seed_from_micros(self.clock.now_micros());
        env.driver.srand(seed);
        env.rng.reseed(seed);
        tracing::debug!(test = case.name(), seed, "seeded random generators");

        Intercept::Proceed(InterceptContext {
            started: Instant::now(),
            seed,
        })
    }

    fn after(&self, _case: &TestCase, ctx: InterceptContext) -> Duration {
        let elapsed = ctx.started.elapsed();
        tracing::info!("test duration: {:.3} sec", elapsed.as_secs_f64());
        elapsed
    }
}
