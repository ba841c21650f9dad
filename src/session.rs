//! Test session.
//!
//! A [`Session`] owns everything that lives for the whole run: the driver,
//! the configured device address, the session-scoped fixture stack and the
//! per-session random generator. Tests run serially through
//! [`Session::run`]:
//!
//! ```text
//! interceptor.before ──skip──▶ record setup (skipped) ─────────────────┐
//!        │                                                             │
//!        ▼                                                             │
//!  acquire fixtures ──error/panic──▶ record setup (failed)             │
//!        │                           release function scope ────┐      │
//!        ▼                                                      │      │
//!  record setup (passed)                                        │      │
//!  run body (panics caught) ──▶ record call                     │      │
//!  release function scope   ──▶ record teardown                 │      │
//!        │                                                      ▼      │
//!        └──────────────────────────────────────────▶ interceptor.after│
//!                                                   (wall time on item)│
//!                                                               │      │
//!                                                               ▼      ▼
//!                                                            item stored
//! ```
//!
//! Session-scoped fixtures are acquired on first use and released, in
//! reverse order, by [`Session::finish`] (or when the session is dropped).

use crate::config::{FixtureSettings, HarnessConfig};
use crate::error::{panic_message, HarnessError, HarnessResult};
use crate::fixture::{
    acquisition_order, FixtureEnv, FixtureFactory, FixtureKind, FixtureLookup, FixtureRegistry,
    FixtureValue, Scope, ScopeStack, ScopeView,
};
use crate::interceptor::{Instrumentation, Intercept, InterceptEnv, TestInterceptor};
use crate::options::DeviceAddress;
use crate::report::{
    Phase, PhaseExecution, PhaseResult, ReportPipeline, ReportStage, RunSummary, TestItem,
};
use crate::rng::SessionRng;
use crate::test_case::{SkipTest, TestCase, TestContext};
use nvme_core::DeviceDriver;
use std::collections::BTreeMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::time::{Duration, Instant};

// =============================================================================
// Builder
// =============================================================================

/// Configures a [`Session`].
pub struct SessionBuilder {
    driver: Arc<dyn DeviceDriver>,
    address: String,
    settings: FixtureSettings,
    registry: FixtureRegistry,
    interceptor: Arc<dyn TestInterceptor>,
    pipeline: ReportPipeline,
}

impl SessionBuilder {
    /// Builder with built-in fixtures, standard instrumentation and an empty
    /// device address.
    pub fn new(driver: Arc<dyn DeviceDriver>) -> Self {
        Self {
            driver,
            address: String::new(),
            settings: FixtureSettings::default(),
            registry: FixtureRegistry::with_builtin(),
            interceptor: Arc::new(Instrumentation::new()),
            pipeline: ReportPipeline::new(),
        }
    }

    /// Device address handed to the `address` fixture.
    pub fn address(mut self, address: impl Into<String>) -> Self {
        self.address = address.into();
        self
    }

    /// Fixture parameters.
    pub fn settings(mut self, settings: FixtureSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Replace the whole fixture registry.
    pub fn registry(mut self, registry: FixtureRegistry) -> Self {
        self.registry = registry;
        self
    }

    /// Register `factory`, replacing the one of the same kind.
    pub fn fixture<F: FixtureFactory + 'static>(mut self, factory: F) -> Self {
        self.registry.register(factory);
        self
    }

    /// Interceptor run around every test.
    pub fn interceptor(mut self, interceptor: Arc<dyn TestInterceptor>) -> Self {
        self.interceptor = interceptor;
        self
    }

    /// Append a report stage after the phase recorder.
    pub fn report_stage(mut self, stage: Box<dyn ReportStage>) -> Self {
        self.pipeline = self.pipeline.with_stage(stage);
        self
    }

    /// Start the session.
    pub fn build(self) -> Session {
        tracing::debug!(
            driver = self.driver.driver_type(),
            fixtures = ?self.registry.kinds(),
            "session started"
        );
        Session {
            env: FixtureEnv {
                driver: self.driver,
                address: DeviceAddress::new(self.address),
                settings: self.settings,
            },
            registry: self.registry,
            interceptor: self.interceptor,
            pipeline: self.pipeline,
            rng: SessionRng::default(),
            session_stack: ScopeStack::new(Scope::Session),
            items: Vec::new(),
            finished: false,
        }
    }
}

// =============================================================================
// Session
// =============================================================================

/// Result of a finished session.
#[derive(Debug)]
pub struct SessionReport {
    /// Counts over all tests
    pub summary: RunSummary,
    /// Every test, in run order
    pub items: Vec<TestItem>,
    /// Failures while releasing session fixtures
    pub teardown_errors: Vec<HarnessError>,
}

/// The whole run.
pub struct Session {
    env: FixtureEnv,
    registry: FixtureRegistry,
    interceptor: Arc<dyn TestInterceptor>,
    pipeline: ReportPipeline,
    rng: SessionRng,
    session_stack: ScopeStack,
    items: Vec<TestItem>,
    finished: bool,
}

impl Session {
    /// Builder for a session on `driver`.
    pub fn builder(driver: Arc<dyn DeviceDriver>) -> SessionBuilder {
        SessionBuilder::new(driver)
    }

    /// Session configured from `config`.
    pub fn from_config(config: &HarnessConfig, driver: Arc<dyn DeviceDriver>) -> Self {
        SessionBuilder::new(driver)
            .address(config.pciaddr.clone())
            .settings(config.fixtures.clone())
            .build()
    }

    /// Configured device address.
    pub fn address(&self) -> &DeviceAddress {
        &self.env.address
    }

    /// Session generator.
    pub fn rng(&self) -> &SessionRng {
        &self.rng
    }

    /// Session fixtures acquired so far, in acquisition order.
    pub fn session_fixtures(&self) -> Vec<FixtureKind> {
        self.session_stack.kinds()
    }

    /// Tests run so far.
    pub fn items(&self) -> &[TestItem] {
        &self.items
    }

    /// Counts over the tests run so far.
    pub fn summary(&self) -> RunSummary {
        RunSummary::from_items(&self.items)
    }

    /// Run every case in order.
    pub fn run_all(&mut self, cases: &[TestCase]) -> RunSummary {
        for case in cases {
            self.run(case);
        }
        self.summary()
    }

    /// Run one test and return its item.
    pub fn run(&mut self, case: &TestCase) -> &TestItem {
        let span = tracing::info_span!("test", name = case.name());
        let _enter = span.enter();

        let mut item = TestItem::new(case.name());
        let env = InterceptEnv {
            driver: self.env.driver.as_ref(),
            rng: &self.rng,
        };
        let ctx = match self.interceptor.before(case, env) {
            Intercept::Skip(reason) => {
                tracing::debug!(reason = %reason, "test skipped");
                self.record(
                    &mut item,
                    Phase::Setup,
                    PhaseResult::Skipped(reason),
                    Duration::ZERO,
                );
                return self.store(item);
            }
            Intercept::Proceed(ctx) => ctx,
        };

        let mut function_stack = ScopeStack::new(Scope::Function);
        let started = Instant::now();
        let setup = catch_unwind(AssertUnwindSafe(|| self.setup(case, &mut function_stack)));
        match setup_result(setup) {
            Err(message) => {
                tracing::warn!(error = %message, "fixture setup failed");
                self.record(
                    &mut item,
                    Phase::Setup,
                    PhaseResult::Failed(message),
                    started.elapsed(),
                );
                // Whatever was acquired before the failure is still released
                function_stack.release_all();
            }
            Ok(fixtures) => {
                self.record(&mut item, Phase::Setup, PhaseResult::Ok, started.elapsed());

                let test_ctx = TestContext::new(case.name(), fixtures, self.rng.clone(), ctx.seed);
                let started = Instant::now();
                let result = call_result(catch_unwind(AssertUnwindSafe(|| case.run(&test_ctx))));
                drop(test_ctx);
                self.record(&mut item, Phase::Call, result, started.elapsed());

                let started = Instant::now();
                let errors = function_stack.release_all();
                self.record(
                    &mut item,
                    Phase::Teardown,
                    teardown_result(&errors),
                    started.elapsed(),
                );
            }
        }

        item.set_wall_time(self.interceptor.after(case, ctx));
        self.store(item)
    }

    /// Release session fixtures and report on the run.
    pub fn finish(mut self) -> SessionReport {
        let teardown_errors = self.release_session();
        let items = std::mem::take(&mut self.items);
        let summary = RunSummary::from_items(&items);
        tracing::debug!(%summary, "session finished");
        SessionReport {
            summary,
            items,
            teardown_errors,
        }
    }

    fn setup(
        &mut self,
        case: &TestCase,
        function_stack: &mut ScopeStack,
    ) -> HarnessResult<BTreeMap<FixtureKind, FixtureValue>> {
        for kind in acquisition_order(&self.registry, case.fixtures())? {
            let factory = self.registry.get(kind)?;
            let scope = factory.scope();
            let live = match scope {
                Scope::Session => self.session_stack.contains(kind),
                Scope::Function => function_stack.contains(kind),
            };
            if live {
                continue;
            }

            let acquired =
                factory.acquire(&ScopeView::new(&self.session_stack, function_stack), &self.env)?;
            match scope {
                Scope::Session => self.session_stack.push(acquired),
                Scope::Function => function_stack.push(acquired),
            }
        }

        let view = ScopeView::new(&self.session_stack, function_stack);
        Ok(case
            .fixtures()
            .iter()
            .filter_map(|&kind| view.lookup(kind).map(|value| (kind, value.clone())))
            .collect())
    }

    fn record(&self, item: &mut TestItem, phase: Phase, result: PhaseResult, duration: Duration) {
        let execution = PhaseExecution::new(phase, result, duration);
        if let Err(e) = self.pipeline.make_report(item, execution) {
            tracing::warn!(error = %e, "report stage failed");
        }
    }

    fn store(&mut self, item: TestItem) -> &TestItem {
        tracing::debug!(outcome = %item.outcome(), "test finished");
        self.items.push(item);
        &self.items[self.items.len() - 1]
    }

    fn release_session(&mut self) -> Vec<HarnessError> {
        self.finished = true;
        self.session_stack.release_all()
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        if !self.finished {
            self.release_session();
        }
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("env", &self.env)
            .field("session_fixtures", &self.session_stack.kinds())
            .field("items", &self.items.len())
            .finish_non_exhaustive()
    }
}

fn setup_result<T>(result: std::thread::Result<HarnessResult<T>>) -> Result<T, String> {
    match result {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(e)) => Err(e.to_string()),
        Err(payload) => Err(format!(
            "fixture setup panicked: {}",
            panic_message(payload.as_ref())
        )),
    }
}

fn call_result(result: std::thread::Result<anyhow::Result<()>>) -> PhaseResult {
    match result {
        Ok(Ok(())) => PhaseResult::Ok,
        Ok(Err(e)) => match e.downcast_ref::<SkipTest>() {
            Some(SkipTest(reason)) => PhaseResult::Skipped(reason.clone()),
            None => PhaseResult::Failed(format!("{:#}", e)),
        },
        Err(payload) => PhaseResult::Failed(format!(
            "test panicked: {}",
            panic_message(payload.as_ref())
        )),
    }
}

fn teardown_result(errors: &[HarnessError]) -> PhaseResult {
    if errors.is_empty() {
        PhaseResult::Ok
    } else {
        PhaseResult::Failed(
            errors
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join("; "),
        )
    }
}
