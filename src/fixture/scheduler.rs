//! Acquisition scheduler.
//!
//! Expands the fixtures a test requests into the full dependency closure and
//! orders it so every fixture comes after its dependencies. Ties keep request
//! order, so a test asking for `[namespace, buffer]` acquires
//! `address, controller, namespace, buffer`.

use super::{FixtureKind, FixtureRegistry, Scope};
use crate::error::{HarnessError, HarnessResult};
use std::collections::BTreeMap;

#[derive(Clone, Copy, PartialEq, Eq)]
enum Mark {
    Visiting,
    Done,
}

/// Dependency-ordered acquisition list for `requested`.
///
/// Fails on unknown fixtures, dependency cycles and session fixtures that
/// depend on function fixtures.
pub fn acquisition_order(
    registry: &FixtureRegistry,
    requested: &[FixtureKind],
) -> HarnessResult<Vec<FixtureKind>> {
    let mut marks = BTreeMap::new();
    let mut path = Vec::new();
    let mut order = Vec::new();
    for &kind in requested {
        visit(registry, kind, &mut marks, &mut path, &mut order)?;
    }
    Ok(order)
}

fn visit(
    registry: &FixtureRegistry,
    kind: FixtureKind,
    marks: &mut BTreeMap<FixtureKind, Mark>,
    path: &mut Vec<FixtureKind>,
    order: &mut Vec<FixtureKind>,
) -> HarnessResult<()> {
    match marks.get(&kind) {
        Some(Mark::Done) => return Ok(()),
        Some(Mark::Visiting) => {
            let start = path.iter().position(|k| *k == kind).unwrap_or(0);
            let mut cycle = path[start..].to_vec();
            cycle.push(kind);
            return Err(HarnessError::DependencyCycle(cycle));
        }
        None => {}
    }

    let factory = registry.get(kind)?;
    marks.insert(kind, Mark::Visiting);
    path.push(kind);

    for &dep in factory.dependencies() {
        if factory.scope() == Scope::Session && registry.get(dep)?.scope() == Scope::Function {
            return Err(HarnessError::ScopeMismatch {
                fixture: kind,
                dependency: dep,
            });
        }
        visit(registry, dep, marks, path, order)?;
    }

    path.pop();
    marks.insert(kind, Mark::Done);
    order.push(kind);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixture::{Acquired, FixtureEnv, FixtureFactory, FixtureLookup};

    struct Custom {
        kind: FixtureKind,
        scope: Scope,
        deps: &'static [FixtureKind],
    }

    impl FixtureFactory for Custom {
        fn kind(&self) -> FixtureKind {
            self.kind
        }

        fn scope(&self) -> Scope {
            self.scope
        }

        fn dependencies(&self) -> &'static [FixtureKind] {
            self.deps
        }

        fn acquire(&self, _: &dyn FixtureLookup, _: &FixtureEnv) -> HarnessResult<Acquired> {
            unreachable!("scheduler never acquires")
        }
    }

    #[test]
    fn test_dependencies_come_first() {
        let registry = FixtureRegistry::with_builtin();
        let order =
            acquisition_order(&registry, &[FixtureKind::Namespace, FixtureKind::Buffer]).unwrap();
        assert_eq!(
            order,
            vec![
                FixtureKind::Address,
                FixtureKind::Controller,
                FixtureKind::Namespace,
                FixtureKind::Buffer
            ]
        );
    }

    #[test]
    fn test_shared_dependency_listed_once() {
        let registry = FixtureRegistry::with_builtin();
        let order = acquisition_order(
            &registry,
            &[FixtureKind::Subsystem, FixtureKind::Pcie, FixtureKind::Aer],
        )
        .unwrap();
        assert_eq!(
            order,
            vec![
                FixtureKind::Address,
                FixtureKind::Controller,
                FixtureKind::Subsystem,
                FixtureKind::Pcie,
                FixtureKind::Aer
            ]
        );
    }

    #[test]
    fn test_empty_request() {
        let registry = FixtureRegistry::with_builtin();
        assert!(acquisition_order(&registry, &[]).unwrap().is_empty());
    }

    #[test]
    fn test_cycle_detected() {
        let mut registry = FixtureRegistry::with_builtin();
        registry.register(Custom {
            kind: FixtureKind::Address,
            scope: Scope::Session,
            deps: &[FixtureKind::Subsystem],
        });

        let err = acquisition_order(&registry, &[FixtureKind::Pcie]).unwrap_err();
        match err {
            HarnessError::DependencyCycle(cycle) => assert_eq!(
                cycle,
                vec![
                    FixtureKind::Controller,
                    FixtureKind::Address,
                    FixtureKind::Subsystem,
                    FixtureKind::Controller
                ]
            ),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_session_cannot_depend_on_function() {
        let mut registry = FixtureRegistry::with_builtin();
        registry.register(Custom {
            kind: FixtureKind::Buffer,
            scope: Scope::Session,
            deps: &[FixtureKind::Namespace],
        });

        assert!(matches!(
            acquisition_order(&registry, &[FixtureKind::Buffer]),
            Err(HarnessError::ScopeMismatch {
                fixture: FixtureKind::Buffer,
                dependency: FixtureKind::Namespace
            })
        ));
    }

    #[test]
    fn test_unknown_fixture() {
        let registry = FixtureRegistry::new();
        assert!(matches!(
            acquisition_order(&registry, &[FixtureKind::Verify]),
            Err(HarnessError::UnknownFixture(FixtureKind::Verify))
        ));
    }
}
