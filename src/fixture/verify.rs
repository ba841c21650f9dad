//! Verify-toggle fixture.
//!
//! Reads the config word with read verification off, then on, and yields
//! whether the two words differ. A driver without verification support
//! reports the same word twice. Verification is switched off again when the
//! test ends.

use super::{Acquired, FixtureEnv, FixtureFactory, FixtureKind, FixtureLookup, FixtureValue, Scope};
use crate::error::HarnessResult;

/// Function-scoped verify toggle.
#[derive(Debug, Clone, Copy, Default)]
pub struct VerifyFixture;

impl FixtureFactory for VerifyFixture {
    fn kind(&self) -> FixtureKind {
        FixtureKind::Verify
    }

    fn scope(&self) -> Scope {
        Scope::Function
    }

    fn acquire(&self, _deps: &dyn FixtureLookup, env: &FixtureEnv) -> HarnessResult<Acquired> {
        let disabled = env.driver.config(false)?;
        let enabled = env.driver.config(true)?;
        let changed = disabled != enabled;
        tracing::trace!(?disabled, ?enabled, changed, "verify toggle");

        let driver = env.driver.clone();
        Ok(Acquired::with_release(
            FixtureKind::Verify,
            FixtureValue::Verify(changed),
            move |_| {
                driver.config(false)?;
                Ok(())
            },
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FixtureSettings;
    use crate::fixture::{ScopeStack, ScopeView};
    use crate::options::DeviceAddress;
    use nvme_driver_mock::{DriverEvent, ErrorConfig, ErrorScenario, MockDriver};
    use std::sync::Arc;

    fn acquire(driver: &MockDriver) -> HarnessResult<Acquired> {
        let env = FixtureEnv {
            driver: Arc::new(driver.clone()),
            address: DeviceAddress::new(""),
            settings: FixtureSettings::default(),
        };
        let session = ScopeStack::new(Scope::Session);
        let function = ScopeStack::new(Scope::Function);
        VerifyFixture.acquire(&ScopeView::new(&session, &function), &env)
    }

    #[test]
    fn test_supported_verify_yields_true_and_restores() {
        let driver = MockDriver::new();
        let acquired = acquire(&driver).unwrap();
        assert!(matches!(acquired.value(), FixtureValue::Verify(true)));
        assert!(driver.config_word().verify());

        acquired.release().unwrap();
        assert!(!driver.config_word().verify());

        let requests: Vec<bool> = driver
            .journal()
            .events()
            .into_iter()
            .filter_map(|e| match e {
                DriverEvent::Config { verify, .. } => Some(verify),
                _ => None,
            })
            .collect();
        assert_eq!(requests, vec![false, true, false]);
    }

    #[test]
    fn test_unsupported_verify_yields_false() {
        let driver = MockDriver::without_verify();
        let acquired = acquire(&driver).unwrap();
        assert!(matches!(acquired.value(), FixtureValue::Verify(false)));
        acquired.release().unwrap();
        assert!(!driver.config_word().verify());
    }

    #[test]
    fn test_config_failure_propagates() {
        let driver = MockDriver::with_errors(ErrorConfig::scenario(ErrorScenario::FailAfterN {
            operation: "config",
            count: 1,
        }));
        assert!(acquire(&driver).is_err());
    }
}
