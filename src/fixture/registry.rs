//! Fixture registry.
//!
//! Maps each [`FixtureKind`] to the factory that produces it. The built-in
//! factories are registered by [`FixtureRegistry::with_builtin`]; any of them
//! can be replaced, which is how tests inject failing or instrumented
//! fixtures.

use super::{
    AddressFixture, AerFixture, BufferFixture, ControllerFixture, FixtureFactory, FixtureKind,
    NamespaceFixture, PcieFixture, SubsystemFixture, VerifyFixture,
};
use crate::error::{HarnessError, HarnessResult};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// Registered fixture factories, keyed by kind.
#[derive(Clone, Default)]
pub struct FixtureRegistry {
    factories: BTreeMap<FixtureKind, Arc<dyn FixtureFactory>>,
}

impl FixtureRegistry {
    /// Registry with no factories.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with every built-in fixture.
    pub fn with_builtin() -> Self {
        let mut registry = Self::new();
        registry.register(AddressFixture);
        registry.register(ControllerFixture);
        registry.register(SubsystemFixture);
        registry.register(PcieFixture);
        registry.register(NamespaceFixture);
        registry.register(BufferFixture);
        registry.register(AerFixture);
        registry.register(VerifyFixture);
        registry
    }

    /// Register `factory`, replacing any factory of the same kind.
    pub fn register<F: FixtureFactory + 'static>(&mut self, factory: F) -> &mut Self {
        self.register_arc(Arc::new(factory))
    }

    /// Register an already shared factory.
    pub fn register_arc(&mut self, factory: Arc<dyn FixtureFactory>) -> &mut Self {
        let kind = factory.kind();
        if self.factories.insert(kind, factory).is_some() {
            tracing::debug!(fixture = %kind, "replaced fixture factory");
        }
        self
    }

    /// Factory for `kind`.
    pub fn get(&self, kind: FixtureKind) -> HarnessResult<Arc<dyn FixtureFactory>> {
        self.factories
            .get(&kind)
            .cloned()
            .ok_or(HarnessError::UnknownFixture(kind))
    }

    /// Whether a factory for `kind` is registered.
    pub fn contains(&self, kind: FixtureKind) -> bool {
        self.factories.contains_key(&kind)
    }

    /// Registered kinds.
    pub fn kinds(&self) -> Vec<FixtureKind> {
        self.factories.keys().copied().collect()
    }
}

impl fmt::Debug for FixtureRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FixtureRegistry")
            .field("kinds", &self.kinds())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixture::Scope;

    #[test]
    fn test_builtin_covers_every_kind() {
        let registry = FixtureRegistry::with_builtin();
        for kind in FixtureKind::ALL {
            let factory = registry.get(kind).unwrap();
            assert_eq!(factory.kind(), kind);
        }
    }

    #[test]
    fn test_builtin_scopes() {
        let registry = FixtureRegistry::with_builtin();
        let scope = |kind| registry.get(kind).unwrap().scope();
        assert_eq!(scope(FixtureKind::Controller), Scope::Session);
        assert_eq!(scope(FixtureKind::Buffer), Scope::Session);
        assert_eq!(scope(FixtureKind::Namespace), Scope::Function);
        assert_eq!(scope(FixtureKind::Aer), Scope::Function);
        assert_eq!(scope(FixtureKind::Verify), Scope::Function);
    }

    #[test]
    fn test_missing_factory() {
        let registry = FixtureRegistry::new();
        assert!(matches!(
            registry.get(FixtureKind::Buffer),
            Err(HarnessError::UnknownFixture(FixtureKind::Buffer))
        ));
        assert!(!registry.contains(FixtureKind::Buffer));
    }
}
