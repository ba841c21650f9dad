//! Test definitions and the context handed to test bodies.

use crate::fixture::{FixtureKind, FixtureLookup, FixtureValue};
use crate::rng::SessionRng;
use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;

/// Body of a test. Returning an error fails the call phase.
pub type TestBody = Box<dyn Fn(&TestContext) -> anyhow::Result<()> + Send + Sync>;

/// Whether a test has a real body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BodyMarker {
    /// Run the body
    Runnable,
    /// Placeholder; skipped before any fixture is acquired
    Stub,
}

/// Classification of test source text.
///
/// Legacy rule for tests that were written as placeholders: fewer than five
/// lines and a last line containing `pass`.
#[derive(Debug, Clone, Copy)]
pub struct SourceShape;

impl SourceShape {
    /// Maximum line count (exclusive) of a stub.
    pub const MAX_STUB_LINES: usize = 5;

    /// Marker for a test whose source is `source`.
    pub fn classify(source: &str) -> BodyMarker {
        let lines: Vec<&str> = source.trim_end().lines().collect();
        match lines.last() {
            Some(last) if lines.len() < Self::MAX_STUB_LINES && last.contains("pass") => {
                BodyMarker::Stub
            }
            _ => BodyMarker::Runnable,
        }
    }
}

/// A named test: the fixtures it needs and the body to run.
pub struct TestCase {
    name: String,
    fixtures: Vec<FixtureKind>,
    marker: BodyMarker,
    body: TestBody,
}

impl TestCase {
    /// Runnable test with no fixtures.
    pub fn new<F>(name: impl Into<String>, body: F) -> Self
    where
        F: Fn(&TestContext) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            fixtures: Vec::new(),
            marker: BodyMarker::Runnable,
            body: Box::new(body),
        }
    }

    /// Placeholder test that is always skipped.
    pub fn stub(name: impl Into<String>) -> Self {
        Self::new(name, |_| Ok(())).with_marker(BodyMarker::Stub)
    }

    /// Request `fixtures`, in order.
    pub fn with_fixtures(mut self, fixtures: &[FixtureKind]) -> Self {
        self.fixtures = fixtures.to_vec();
        self
    }

    /// Set the marker explicitly.
    pub fn with_marker(mut self, marker: BodyMarker) -> Self {
        self.marker = marker;
        self
    }

    /// Derive the marker from the test's source text.
    pub fn with_source(self, source: &str) -> Self {
        self.with_marker(SourceShape::classify(source))
    }

    /// Test name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Requested fixtures.
    pub fn fixtures(&self) -> &[FixtureKind] {
        &self.fixtures
    }

    /// Body marker.
    pub fn marker(&self) -> BodyMarker {
        self.marker
    }

    /// Whether this is a placeholder.
    pub fn is_stub(&self) -> bool {
        self.marker == BodyMarker::Stub
    }

    /// Run the body.
    pub fn run(&self, ctx: &TestContext) -> anyhow::Result<()> {
        (self.body)(ctx)
    }
}

impl fmt::Debug for TestCase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TestCase")
            .field("name", &self.name)
            .field("fixtures", &self.fixtures)
            .field("marker", &self.marker)
            .finish_non_exhaustive()
    }
}

/// Raised by a body to report itself skipped.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("skipped: {0}")]
pub struct SkipTest(pub String);

/// What a test body sees: its fixtures, its seed and the session generator.
pub struct TestContext {
    name: String,
    fixtures: BTreeMap<FixtureKind, FixtureValue>,
    rng: SessionRng,
    seed: u32,
}

impl TestContext {
    /// Context for test `name`.
    pub fn new(
        name: impl Into<String>,
        fixtures: BTreeMap<FixtureKind, FixtureValue>,
        rng: SessionRng,
        seed: u32,
    ) -> Self {
        Self {
            name: name.into(),
            fixtures,
            rng,
            seed,
        }
    }

    /// Test name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Session generator, reseeded for this test.
    pub fn rng(&self) -> &SessionRng {
        &self.rng
    }

    /// Seed this test ran with.
    pub fn seed(&self) -> u32 {
        self.seed
    }

    /// Error that marks the test skipped when returned from the body.
    pub fn skip(reason: impl Into<String>) -> anyhow::Error {
        SkipTest(reason.into()).into()
    }
}

impl FixtureLookup for TestContext {
    fn lookup(&self, kind: FixtureKind) -> Option<&FixtureValue> {
        self.fixtures.get(&kind)
    }
}

impl fmt::Debug for TestContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TestContext")
            .field("name", &self.name)
            .field("fixtures", &self.fixtures.keys().collect::<Vec<_>>())
            .field("seed", &self.seed)
            .finish()
    }
}
