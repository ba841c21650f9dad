//! Phase reports and their aggregation onto test items.
//!
//! Each executed phase of a test goes through a [`ReportPipeline`]: the
//! generator turns the raw [`PhaseExecution`] into a [`PhaseReport`], then
//! every registered [`ReportStage`] sees the finished report. The built-in
//! [`PhaseRecorder`] stage stores it on the [`TestItem`] under its phase, so
//! later inspection (fixtures, summaries, the binary) can ask
//! `outcome_setup` / `outcome_call` / `outcome_teardown`. An absent record
//! means the phase did not run.

use crate::error::{HarnessError, HarnessResult};
use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

/// Phase of a single test.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Phase {
    /// Fixture acquisition
    Setup,
    /// Test body
    Call,
    /// Function-scope release
    Teardown,
}

impl Phase {
    /// Phase name.
    pub fn name(self) -> &'static str {
        match self {
            Phase::Setup => "setup",
            Phase::Call => "call",
            Phase::Teardown => "teardown",
        }
    }

    /// Attribute under which the outcome is stored on the test item.
    pub fn attribute(self) -> &'static str {
        match self {
            Phase::Setup => "outcome_setup",
            Phase::Call => "outcome_call",
            Phase::Teardown => "outcome_teardown",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Outcome of a phase or test.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Completed without error
    Passed,
    /// Returned an error or panicked
    Failed,
    /// Did not run to completion by choice
    Skipped,
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Outcome::Passed => "passed",
            Outcome::Failed => "failed",
            Outcome::Skipped => "skipped",
        })
    }
}

/// How a phase ended, before report generation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PhaseResult {
    /// Finished normally
    Ok,
    /// Failed with a message
    Failed(String),
    /// Skipped with a reason
    Skipped(String),
}

/// Raw result of executing one phase.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhaseExecution {
    /// Which phase ran
    pub phase: Phase,
    /// How it ended
    pub result: PhaseResult,
    /// Wall time spent in the phase
    pub duration: Duration,
}

impl PhaseExecution {
    /// Execution of `phase` that ended with `result`.
    pub fn new(phase: Phase, result: PhaseResult, duration: Duration) -> Self {
        Self {
            phase,
            result,
            duration,
        }
    }
}

/// Generated report of one phase.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhaseReport {
    /// Which phase
    pub phase: Phase,
    /// Outcome
    pub outcome: Outcome,
    /// Wall time spent in the phase
    pub duration: Duration,
    /// Failure message or skip reason
    pub message: Option<String>,
}

impl PhaseReport {
    /// Whether the phase passed.
    pub fn passed(&self) -> bool {
        self.outcome == Outcome::Passed
    }

    /// Whether the phase failed.
    pub fn failed(&self) -> bool {
        self.outcome == Outcome::Failed
    }

    /// Whether the phase was skipped.
    pub fn skipped(&self) -> bool {
        self.outcome == Outcome::Skipped
    }
}

// =============================================================================
// Test Item
// =============================================================================

/// One test invocation and its phase records.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestItem {
    name: String,
    records: BTreeMap<Phase, PhaseReport>,
    wall_time: Option<Duration>,
}

impl TestItem {
    /// Item for test `name` with no records.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            records: BTreeMap::new(),
            wall_time: None,
        }
    }

    /// Test name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Store `report` under its phase. Each phase can be written once.
    pub fn record(&mut self, report: PhaseReport) -> HarnessResult<()> {
        if self.records.contains_key(&report.phase) {
            return Err(HarnessError::PhaseAlreadyRecorded {
                test: self.name.clone(),
                phase: report.phase,
            });
        }
        self.records.insert(report.phase, report);
        Ok(())
    }

    /// Record of `phase`, if it ran.
    pub fn report(&self, phase: Phase) -> Option<&PhaseReport> {
        self.records.get(&phase)
    }

    /// Setup record.
    pub fn outcome_setup(&self) -> Option<&PhaseReport> {
        self.report(Phase::Setup)
    }

    /// Call record.
    pub fn outcome_call(&self) -> Option<&PhaseReport> {
        self.report(Phase::Call)
    }

    /// Teardown record.
    pub fn outcome_teardown(&self) -> Option<&PhaseReport> {
        self.report(Phase::Teardown)
    }

    /// Records in phase order.
    pub fn reports(&self) -> impl Iterator<Item = &PhaseReport> {
        self.records.values()
    }

    /// Overall outcome: failed if any phase failed, skipped if any phase was
    /// skipped, passed otherwise.
    pub fn outcome(&self) -> Outcome {
        if self.reports().any(PhaseReport::failed) {
            Outcome::Failed
        } else if self.reports().any(PhaseReport::skipped) {
            Outcome::Skipped
        } else {
            Outcome::Passed
        }
    }

    /// Total time across recorded phases.
    pub fn duration(&self) -> Duration {
        self.reports().map(|r| r.duration).sum()
    }

    /// Time from seeding to the end of function teardown, as measured by
    /// the interceptor. `None` for tests that never started.
    pub fn wall_time(&self) -> Option<Duration> {
        self.wall_time
    }

    /// Store the measured wall time.
    pub fn set_wall_time(&mut self, elapsed: Duration) {
        self.wall_time = Some(elapsed);
    }
}

// =============================================================================
// Pipeline
// =============================================================================

/// Produces the report of an executed phase.
pub trait ReportGenerator: Send + Sync {
    /// Build the report for `execution` of `item`.
    fn generate(&self, item: &TestItem, execution: PhaseExecution) -> PhaseReport;
}

/// Default generator: maps the phase result to an outcome.
#[derive(Debug, Clone, Copy, Default)]
pub struct StandardGenerator;

impl ReportGenerator for StandardGenerator {
    fn generate(&self, _item: &TestItem, execution: PhaseExecution) -> PhaseReport {
        let (outcome, message) = match execution.result {
            PhaseResult::Ok => (Outcome::Passed, None),
            PhaseResult::Failed(msg) => (Outcome::Failed, Some(msg)),
            PhaseResult::Skipped(reason) => (Outcome::Skipped, Some(reason)),
        };
        PhaseReport {
            phase: execution.phase,
            outcome,
            duration: execution.duration,
            message,
        }
    }
}

/// Runs after the generator for every phase report.
pub trait ReportStage: Send + Sync {
    /// Observe `report` of `item`.
    fn on_report(&self, item: &mut TestItem, report: &PhaseReport) -> HarnessResult<()>;
}

/// Stores each report on its test item.
#[derive(Debug, Clone, Copy, Default)]
pub struct PhaseRecorder;

impl ReportStage for PhaseRecorder {
    fn on_report(&self, item: &mut TestItem, report: &PhaseReport) -> HarnessResult<()> {
        item.record(report.clone())
    }
}

/// Generator followed by the report stages, in registration order.
pub struct ReportPipeline {
    generator: Box<dyn ReportGenerator>,
    stages: Vec<Box<dyn ReportStage>>,
}

impl ReportPipeline {
    /// Standard generator with the [`PhaseRecorder`] stage.
    pub fn new() -> Self {
        Self {
            generator: Box::new(StandardGenerator),
            stages: vec![Box::new(PhaseRecorder)],
        }
    }

    /// Replace the generator.
    pub fn with_generator(mut self, generator: Box<dyn ReportGenerator>) -> Self {
        self.generator = generator;
        self
    }

    /// Append a stage after the existing ones.
    pub fn with_stage(mut self, stage: Box<dyn ReportStage>) -> Self {
        self.stages.push(stage);
        self
    }

    /// Generate the report for `execution`, then run every stage on it.
    ///
    /// Stops at the first failing stage.
    pub fn make_report(
        &self,
        item: &mut TestItem,
        execution: PhaseExecution,
    ) -> HarnessResult<PhaseReport> {
        let report = self.generator.generate(item, execution);
        for stage in &self.stages {
            stage.on_report(item, &report)?;
        }
        Ok(report)
    }
}

impl Default for ReportPipeline {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ReportPipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReportPipeline")
            .field("stages", &self.stages.len())
            .finish_non_exhaustive()
    }
}

// =============================================================================
// Summary
// =============================================================================

/// Aggregate counts over a run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    /// Tests that passed
    pub passed: usize,
    /// Tests that failed in any phase
    pub failed: usize,
    /// Tests that were skipped
    pub skipped: usize,
}

impl RunSummary {
    /// Summary over `items`.
    pub fn from_items<'a>(items: impl IntoIterator<Item = &'a TestItem>) -> Self {
        let mut summary = Self::default();
        for item in items {
            match item.outcome() {
                Outcome::Passed => summary.passed += 1,
                Outcome::Failed => summary.failed += 1,
                Outcome::Skipped => summary.skipped += 1,
            }
        }
        summary
    }

    /// Number of tests.
    pub fn total(&self) -> usize {
        self.passed + self.failed + self.skipped
    }

    /// Whether no test failed.
    pub fn all_passed(&self) -> bool {
        self.failed == 0
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} passed, {} failed, {} skipped ({} total)",
            self.passed,
            self.failed,
            self.skipped,
            self.total()
        )
    }
}
