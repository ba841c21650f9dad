//! Device handle fixtures.
//!
//! Session-scoped handles are released by dropping the scope stack's
//! reference at session end. The namespace is closed before its reference is
//! dropped.

use super::{Acquired, FixtureEnv, FixtureFactory, FixtureKind, FixtureLookup, FixtureValue, Scope};
use crate::error::HarnessResult;

/// Configured device address.
#[derive(Debug, Clone, Copy, Default)]
pub struct AddressFixture;

impl FixtureFactory for AddressFixture {
    fn kind(&self) -> FixtureKind {
        FixtureKind::Address
    }

    fn scope(&self) -> Scope {
        Scope::Session
    }

    fn acquire(&self, _deps: &dyn FixtureLookup, env: &FixtureEnv) -> HarnessResult<Acquired> {
        Ok(Acquired::new(
            FixtureKind::Address,
            FixtureValue::Address(env.address.get().to_string()),
        ))
    }
}

/// Controller attached at the configured address.
#[derive(Debug, Clone, Copy, Default)]
pub struct ControllerFixture;

impl FixtureFactory for ControllerFixture {
    fn kind(&self) -> FixtureKind {
        FixtureKind::Controller
    }

    fn scope(&self) -> Scope {
        Scope::Session
    }

    fn dependencies(&self) -> &'static [FixtureKind] {
        &[FixtureKind::Address]
    }

    fn acquire(&self, deps: &dyn FixtureLookup, env: &FixtureEnv) -> HarnessResult<Acquired> {
        let address = deps.address()?;
        let ctrl = env.driver.controller(address.as_bytes())?;
        Ok(Acquired::new(
            FixtureKind::Controller,
            FixtureValue::Controller(ctrl),
        ))
    }
}

/// Subsystem of the session controller.
#[derive(Debug, Clone, Copy, Default)]
pub struct SubsystemFixture;

impl FixtureFactory for SubsystemFixture {
    fn kind(&self) -> FixtureKind {
        FixtureKind::Subsystem
    }

    fn scope(&self) -> Scope {
        Scope::Session
    }

    fn dependencies(&self) -> &'static [FixtureKind] {
        &[FixtureKind::Controller]
    }

    fn acquire(&self, deps: &dyn FixtureLookup, env: &FixtureEnv) -> HarnessResult<Acquired> {
        let ctrl = deps.controller()?;
        let subsystem = env.driver.subsystem(&ctrl)?;
        Ok(Acquired::new(
            FixtureKind::Subsystem,
            FixtureValue::Subsystem(subsystem),
        ))
    }
}

/// PCIe function of the session controller.
#[derive(Debug, Clone, Copy, Default)]
pub struct PcieFixture;

impl FixtureFactory for PcieFixture {
    fn kind(&self) -> FixtureKind {
        FixtureKind::Pcie
    }

    fn scope(&self) -> Scope {
        Scope::Session
    }

    fn dependencies(&self) -> &'static [FixtureKind] {
        &[FixtureKind::Controller]
    }

    fn acquire(&self, deps: &dyn FixtureLookup, env: &FixtureEnv) -> HarnessResult<Acquired> {
        let ctrl = deps.controller()?;
        let pcie = env.driver.pcie(&ctrl)?;
        Ok(Acquired::new(FixtureKind::Pcie, FixtureValue::Pcie(pcie)))
    }
}

/// Fresh namespace for every test that asks for one.
#[derive(Debug, Clone, Copy, Default)]
pub struct NamespaceFixture;

impl FixtureFactory for NamespaceFixture {
    fn kind(&self) -> FixtureKind {
        FixtureKind::Namespace
    }

    fn scope(&self) -> Scope {
        Scope::Function
    }

    fn dependencies(&self) -> &'static [FixtureKind] {
        &[FixtureKind::Controller]
    }

    fn acquire(&self, deps: &dyn FixtureLookup, env: &FixtureEnv) -> HarnessResult<Acquired> {
        let ctrl = deps.controller()?;
        let ns = env.driver.namespace(&ctrl, env.settings.namespace_id)?;
        Ok(Acquired::with_release(
            FixtureKind::Namespace,
            FixtureValue::Namespace(ns),
            |value| {
                if let FixtureValue::Namespace(ns) = value {
                    ns.close()?;
                }
                Ok(())
            },
        ))
    }
}

/// Session data buffer.
#[derive(Debug, Clone, Copy, Default)]
pub struct BufferFixture;

impl FixtureFactory for BufferFixture {
    fn kind(&self) -> FixtureKind {
        FixtureKind::Buffer
    }

    fn scope(&self) -> Scope {
        Scope::Session
    }

    fn acquire(&self, _deps: &dyn FixtureLookup, env: &FixtureEnv) -> HarnessResult<Acquired> {
        let buf = env
            .driver
            .buffer(env.settings.buffer_size, &env.settings.buffer_label)?;
        Ok(Acquired::new(FixtureKind::Buffer, FixtureValue::Buffer(buf)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FixtureSettings;
    use crate::fixture::{ScopeStack, ScopeView};
    use crate::options::DeviceAddress;
    use nvme_driver_mock::{ErrorConfig, HandleKind, MockDriver};
    use std::sync::Arc;

    fn env(driver: &MockDriver) -> FixtureEnv {
        FixtureEnv {
            driver: Arc::new(driver.clone()),
            address: DeviceAddress::new("02:00.0"),
            settings: FixtureSettings::default(),
        }
    }

    fn acquire_into(
        factory: &dyn FixtureFactory,
        stack: &mut ScopeStack,
        env: &FixtureEnv,
    ) -> HarnessResult<()> {
        let empty = ScopeStack::new(Scope::Function);
        let acquired = factory.acquire(&ScopeView::new(stack, &empty), env)?;
        stack.push(acquired);
        Ok(())
    }

    #[test]
    fn test_controller_uses_address() {
        let driver = MockDriver::new();
        let env = env(&driver);
        let mut stack = ScopeStack::new(Scope::Session);
        acquire_into(&AddressFixture, &mut stack, &env).unwrap();
        acquire_into(&ControllerFixture, &mut stack, &env).unwrap();

        let view_stack = ScopeStack::new(Scope::Function);
        let view = ScopeView::new(&stack, &view_stack);
        assert_eq!(view.controller().unwrap().address(), "02:00.0");
    }

    #[test]
    fn test_controller_requires_address() {
        let driver = MockDriver::new();
        let mut stack = ScopeStack::new(Scope::Session);
        assert!(acquire_into(&ControllerFixture, &mut stack, &env(&driver)).is_err());
        assert_eq!(driver.journal().constructed(HandleKind::Controller), 0);
    }

    #[test]
    fn test_namespace_closed_then_released() {
        let driver = MockDriver::new();
        let env = env(&driver);
        let mut session = ScopeStack::new(Scope::Session);
        acquire_into(&AddressFixture, &mut session, &env).unwrap();
        acquire_into(&ControllerFixture, &mut session, &env).unwrap();

        let mut function = ScopeStack::new(Scope::Function);
        let ns = NamespaceFixture
            .acquire(&ScopeView::new(&session, &function), &env)
            .unwrap();
        function.push(ns);

        assert!(function.release_all().is_empty());
        let journal = driver.journal();
        assert_eq!(journal.closed(), 1);
        assert_eq!(journal.released(HandleKind::Namespace), 1);
        assert_eq!(journal.released(HandleKind::Controller), 0);
    }

    #[test]
    fn test_buffer_defaults() {
        let driver = MockDriver::new();
        let env = env(&driver);
        let mut stack = ScopeStack::new(Scope::Session);
        acquire_into(&BufferFixture, &mut stack, &env).unwrap();

        let empty = ScopeStack::new(Scope::Function);
        let buf = ScopeView::new(&stack, &empty).buffer().unwrap();
        assert_eq!(buf.size(), 4096);
        assert_eq!(buf.label(), "default buffer");
    }

    #[test]
    fn test_failed_acquire_registers_nothing() {
        let driver = MockDriver::with_errors(ErrorConfig::always("subsystem"));
        let env = env(&driver);
        let mut stack = ScopeStack::new(Scope::Session);
        acquire_into(&AddressFixture, &mut stack, &env).unwrap();
        acquire_into(&ControllerFixture, &mut stack, &env).unwrap();

        assert!(acquire_into(&SubsystemFixture, &mut stack, &env).is_err());
        assert_eq!(
            stack.kinds(),
            vec![FixtureKind::Address, FixtureKind::Controller]
        );
    }
}
