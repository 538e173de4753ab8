use std::collections::HashMap;

use super::{
    context::ExecutionContext,
    pattern::PatternSet,
    registry::{Registry, UnknownRequirementError},
    snapshot::{CoverageSnapshot, TestRecord},
    test::{Outcome, Phase, TestId},
};

/// Accumulates requirement coverage over one test-run process.
///
/// Each worker process owns exactly one collector; workers never share state.
/// The collector observes test documentation as tests are collected and
/// outcomes as they finish, then yields a self-contained
/// [`CoverageSnapshot`] fragment for the coordinating process to merge.
///
/// Per test, the state machine over one run is: unseen → documented
/// (requirements extracted) → outcome-recorded, with `unknown` as the
/// terminal fallback when a run aborts before the outcome arrives.
///
/// This component never performs I/O.
#[derive(Debug)]
pub struct Collector {
    patterns: PatternSet,
    registry: Registry,
    records: Vec<TestRecord>,
    positions: HashMap<TestId, usize>,
}

impl Collector {
    /// Creates a collector from compiled patterns and a registry.
    #[must_use]
    pub fn new(patterns: PatternSet, registry: Registry) -> Self {
        Self {
            patterns,
            registry,
            records: Vec::new(),
            positions: HashMap::new(),
        }
    }

    /// Observes a test's documentation, extracting and validating its
    /// requirement references.
    ///
    /// A test whose documentation is absent or contains no recognized
    /// identifiers is simply not part of the coverage model — that is not an
    /// error. Re-observing a test replaces its requirement set and keeps any
    /// previously recorded outcome.
    ///
    /// # Errors
    ///
    /// Propagates [`UnknownRequirementError`] immediately when the extracted
    /// set contains identifiers outside the registry's valid set. This is a
    /// hard validation failure attributed to the responsible test, not
    /// something to log and continue past.
    pub fn observe_documentation(
        &mut self,
        test: &TestId,
        documentation: Option<&str>,
    ) -> Result<(), UnknownRequirementError> {
        let Some(text) = documentation else {
            return Ok(());
        };

        let requirements = self.patterns.extract(text);
        if requirements.is_empty() {
            return Ok(());
        }

        self.registry.validate(&requirements, test)?;

        if let Some(&position) = self.positions.get(test) {
            self.records[position].requirements = requirements;
        } else {
            self.positions.insert(test.clone(), self.records.len());
            self.records.push(TestRecord {
                test: test.clone(),
                requirements,
                outcome: Outcome::Unknown,
            });
        }
        Ok(())
    }

    /// Records a terminal outcome for a test; last write wins.
    ///
    /// Outcomes for tests that never entered the coverage model (no
    /// recognized requirement references) are ignored.
    pub fn record_outcome(&mut self, test: &TestId, outcome: Outcome) {
        if let Some(&position) = self.positions.get(test) {
            self.records[position].outcome = outcome;
        }
    }

    /// Applies the test runner's phase filter before recording an outcome.
    ///
    /// Only `call`-phase outcomes count, except that a `setup`-phase
    /// `skipped` is accepted because skipped tests never reach a call phase.
    pub fn observe_report(&mut self, test: &TestId, phase: Phase, outcome: Outcome) {
        match (phase, outcome) {
            (Phase::Call, outcome) => self.record_outcome(test, outcome),
            (Phase::Setup, Outcome::Skipped) => self.record_outcome(test, Outcome::Skipped),
            _ => {}
        }
    }

    /// Whether any test with requirement references has been observed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Produces a self-contained snapshot fragment of the collected state.
    #[must_use]
    pub fn snapshot(&self, context: ExecutionContext) -> CoverageSnapshot {
        CoverageSnapshot::new(self.records.clone(), context)
    }
}
