//! Scope stacks.
//!
//! Fixtures acquired within a scope are pushed in acquisition order and
//! released in reverse. Release continues past failures, including panicking
//! release callbacks, so a broken fixture cannot strand the ones acquired
//! before it. A stack dropped with live entries releases them.

use super::{Acquired, FixtureKind, FixtureLookup, FixtureValue, Scope};
use crate::error::{panic_message, HarnessError};
use std::panic::{catch_unwind, AssertUnwindSafe};

/// Fixtures alive in one scope, in acquisition order.
#[derive(Debug)]
pub struct ScopeStack {
    scope: Scope,
    entries: Vec<Acquired>,
}

impl ScopeStack {
    /// Empty stack for `scope`.
    pub fn new(scope: Scope) -> Self {
        Self {
            scope,
            entries: Vec::new(),
        }
    }

    /// Scope this stack holds.
    pub fn scope(&self) -> Scope {
        self.scope
    }

    /// Push a fully acquired fixture.
    pub fn push(&mut self, acquired: Acquired) {
        tracing::trace!(fixture = %acquired.kind(), scope = ?self.scope, "fixture acquired");
        self.entries.push(acquired);
    }

    /// Value of `kind`, if acquired in this scope.
    pub fn get(&self, kind: FixtureKind) -> Option<&FixtureValue> {
        self.entries
            .iter()
            .find(|a| a.kind() == kind)
            .map(Acquired::value)
    }

    /// Whether `kind` is acquired in this scope.
    pub fn contains(&self, kind: FixtureKind) -> bool {
        self.entries.iter().any(|a| a.kind() == kind)
    }

    /// Kinds in acquisition order.
    pub fn kinds(&self) -> Vec<FixtureKind> {
        self.entries.iter().map(Acquired::kind).collect()
    }

    /// Number of live fixtures.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether nothing is acquired.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Release everything, last acquired first.
    ///
    /// Every fixture is released even if an earlier release fails or
    /// panics; the failures are returned in release order.
    pub fn release_all(&mut self) -> Vec<HarnessError> {
        let mut errors = Vec::new();
        while let Some(acquired) = self.entries.pop() {
            let kind = acquired.kind();
            let result = catch_unwind(AssertUnwindSafe(move || acquired.release()))
                .unwrap_or_else(|payload| {
                    Err(HarnessError::ReleasePanicked {
                        fixture: kind,
                        message: panic_message(payload.as_ref()),
                    })
                });
            match result {
                Ok(()) => tracing::trace!(fixture = %kind, "fixture released"),
                Err(e) => {
                    tracing::warn!(fixture = %kind, error = %e, "fixture release failed");
                    errors.push(e);
                }
            }
        }
        errors
    }
}

impl Drop for ScopeStack {
    fn drop(&mut self) {
        if !self.entries.is_empty() {
            tracing::debug!(
                scope = ?self.scope,
                live = self.entries.len(),
                "releasing dropped scope"
            );
            self.release_all();
        }
    }
}

/// Combined view of the session and function stacks.
///
/// Function-scoped values shadow session-scoped ones of the same kind.
#[derive(Debug, Clone, Copy)]
pub struct ScopeView<'a> {
    session: &'a ScopeStack,
    function: &'a ScopeStack,
}

impl<'a> ScopeView<'a> {
    /// View over both stacks.
    pub fn new(session: &'a ScopeStack, function: &'a ScopeStack) -> Self {
        Self { session, function }
    }
}

impl FixtureLookup for ScopeView<'_> {
    fn lookup(&self, kind: FixtureKind) -> Option<&FixtureValue> {
        self.function.get(kind).or_else(|| self.session.get(kind))
    }
}
