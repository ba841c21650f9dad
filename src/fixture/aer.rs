//! AER callback registration fixture.
//!
//! Hands the test a registrar bound to the session controller. Whatever the
//! test registers, the callback is cleared when the test ends.

use super::{Acquired, FixtureEnv, FixtureFactory, FixtureKind, FixtureLookup, FixtureValue, Scope};
use crate::error::HarnessResult;
use nvme_core::{AerCallback, Controller};
use std::sync::Arc;

/// Registers asynchronous-event callbacks on one controller.
#[derive(Debug, Clone)]
pub struct AerRegistrar {
    controller: Arc<dyn Controller>,
}

impl AerRegistrar {
    /// Registrar for `controller`.
    pub fn new(controller: Arc<dyn Controller>) -> Self {
        Self { controller }
    }

    /// Install `callback` on the controller.
    pub fn register(&self, callback: AerCallback) -> HarnessResult<()> {
        tracing::debug!("register aer callback function: {}", callback.name());
        self.controller.register_aer_cb(Some(callback))?;
        Ok(())
    }

    /// Clear whatever callback is installed.
    pub fn unregister(&self) -> HarnessResult<()> {
        tracing::debug!("unregister aer callback function");
        self.controller.register_aer_cb(None)?;
        Ok(())
    }
}

/// Function-scoped [`AerRegistrar`].
#[derive(Debug, Clone, Copy, Default)]
pub struct AerFixture;

impl FixtureFactory for AerFixture {
    fn kind(&self) -> FixtureKind {
        FixtureKind::Aer
    }

    fn scope(&self) -> Scope {
        Scope::Function
    }

    fn dependencies(&self) -> &'static [FixtureKind] {
        &[FixtureKind::Controller]
    }

    fn acquire(&self, deps: &dyn FixtureLookup, _env: &FixtureEnv) -> HarnessResult<Acquired> {
        let registrar = AerRegistrar::new(deps.controller()?);
        Ok(Acquired::with_release(
            FixtureKind::Aer,
            FixtureValue::Aer(registrar),
            |value| match value {
                FixtureValue::Aer(registrar) => registrar.unregister(),
                _ => Ok(()),
            },
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nvme_core::{AerCompletion, DeviceDriver};
    use nvme_driver_mock::{ErrorConfig, MockDriver};
    use std::sync::atomic::{AtomicU32, Ordering};
    use tracing_test::traced_test;

    #[test]
    #[traced_test]
    fn test_register_then_release_clears() {
        let driver = MockDriver::new();
        let ctrl = driver.controller(b"02:00.0").unwrap();
        let registrar = AerRegistrar::new(ctrl);

        let seen = Arc::new(AtomicU32::new(0));
        let counter = seen.clone();
        registrar
            .register(AerCallback::new("count_aer", move |cpl| {
                counter.fetch_add(cpl.cdw0, Ordering::SeqCst);
            }))
            .unwrap();
        driver.raise_aer(AerCompletion { cdw0: 5, status: 0 });
        assert_eq!(seen.load(Ordering::SeqCst), 5);
        assert!(logs_contain("register aer callback function: count_aer"));

        registrar.unregister().unwrap();
        assert_eq!(driver.raise_aer(AerCompletion::default()), 0);
        assert!(logs_contain("unregister aer callback function"));
        assert_eq!(
            driver.journal().aer_registrations(),
            vec![Some("count_aer".to_string()), None]
        );
    }

    #[test]
    fn test_registration_failure_propagates() {
        let driver = MockDriver::with_errors(ErrorConfig::always("register_aer_cb"));
        let registrar = AerRegistrar::new(driver.controller(b"02:00.0").unwrap());
        assert!(registrar
            .register(AerCallback::new("never", |_| {}))
            .is_err());
        assert!(registrar.unregister().is_err());
    }
}
