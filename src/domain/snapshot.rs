use std::collections::{BTreeMap, BTreeSet, HashMap};

use serde::{Deserialize, Serialize};

use super::{
    context::ExecutionContext,
    requirement::RequirementId,
    test::{Outcome, TestId},
};

/// One test's contribution to the coverage model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestRecord {
    /// The test's fully-qualified identity.
    pub test: TestId,
    /// The requirements the test's documentation references.
    pub requirements: BTreeSet<RequirementId>,
    /// The test's last recorded outcome.
    pub outcome: Outcome,
}

/// The coverage model for one test run.
///
/// Holds the observed test records (in observation order), the derived
/// inverse index from requirement to covering tests, and the run's execution
/// context. The index is always rebuilt from the records — never merged or
/// mutated directly — so the two views cannot drift apart: every test in the
/// index appears in the records, and every requirement referenced by a
/// record appears as an index key.
///
/// A snapshot is self-contained and serializable, so one produced by a
/// worker process's [`Collector`](crate::domain::Collector) can travel over
/// any byte channel to the coordinating process as a merge fragment. The
/// persisted form is the JSON layout of
/// [`StoredCoverage`](crate::storage::StoredCoverage).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(
    from = "crate::storage::StoredCoverage",
    into = "crate::storage::StoredCoverage"
)]
pub struct CoverageSnapshot {
    records: Vec<TestRecord>,
    index: BTreeMap<RequirementId, Vec<TestId>>,
    context: ExecutionContext,
}

impl CoverageSnapshot {
    /// Builds a snapshot from test records, deriving the requirement index.
    #[must_use]
    pub fn new(records: Vec<TestRecord>, context: ExecutionContext) -> Self {
        let index = build_index(&records);
        Self {
            records,
            index,
            context,
        }
    }

    /// Merges worker fragments into one consistent snapshot.
    ///
    /// Records are unioned by test identity. Fragments must not legitimately
    /// overlap on identity; when they do (a re-run or flaky collection rather
    /// than genuine conflict) the last-merged fragment wins, outcome and
    /// requirement set alike. The index is rebuilt from the merged records.
    ///
    /// The merged snapshot carries the context of the last data-carrying
    /// fragment; the coordinator may substitute its own via
    /// [`set_context`](Self::set_context) before persisting. Zero
    /// data-carrying fragments yield an empty snapshot — the caller should
    /// skip persistence in that case rather than overwrite a previous run's
    /// data with nothing.
    #[must_use]
    pub fn merge<I: IntoIterator<Item = Self>>(fragments: I) -> Self {
        let mut merged: Vec<TestRecord> = Vec::new();
        let mut positions: HashMap<TestId, usize> = HashMap::new();
        let mut last_context = None;
        let mut data_context = None;

        for fragment in fragments {
            if !fragment.records.is_empty() {
                data_context = Some(fragment.context.clone());
            }
            last_context = Some(fragment.context);

            for record in fragment.records {
                if let Some(&position) = positions.get(&record.test) {
                    merged[position] = record;
                } else {
                    positions.insert(record.test.clone(), merged.len());
                    merged.push(record);
                }
            }
        }

        let context = data_context.or(last_context).unwrap_or_default();
        Self::new(merged, context)
    }

    /// The test records, in observation order.
    #[must_use]
    pub fn records(&self) -> &[TestRecord] {
        &self.records
    }

    /// The derived requirement → covering-tests index.
    ///
    /// Tests appear in observation order, duplicates suppressed.
    #[must_use]
    pub const fn requirement_index(&self) -> &BTreeMap<RequirementId, Vec<TestId>> {
        &self.index
    }

    /// The tests covering a requirement, if any.
    #[must_use]
    pub fn tests_for(&self, requirement: &RequirementId) -> Option<&[TestId]> {
        self.index.get(requirement).map(Vec::as_slice)
    }

    /// The last recorded outcome of a test in this snapshot.
    #[must_use]
    pub fn outcome_of(&self, test: &TestId) -> Option<Outcome> {
        self.records
            .iter()
            .find(|record| &record.test == test)
            .map(|record| record.outcome)
    }

    /// The execution context the snapshot was captured under.
    #[must_use]
    pub const fn context(&self) -> &ExecutionContext {
        &self.context
    }

    /// Replaces the execution context (used by the coordinating process
    /// after a merge).
    pub fn set_context(&mut self, context: ExecutionContext) {
        self.context = context;
    }

    /// Whether the snapshot carries no coverage data.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Number of tests with requirement references.
    #[must_use]
    pub fn total_tests(&self) -> usize {
        self.records.len()
    }

    /// Number of distinct requirements covered.
    #[must_use]
    pub fn total_requirements(&self) -> usize {
        self.index.len()
    }
}

fn build_index(records: &[TestRecord]) -> BTreeMap<RequirementId, Vec<TestId>> {
    let mut index: BTreeMap<RequirementId, Vec<TestId>> = BTreeMap::new();
    for record in records {
        for requirement in &record.requirements {
            let tests = index.entry(requirement.clone()).or_default();
            if !tests.contains(&record.test) {
                tests.push(record.test.clone());
            }
        }
    }
    index
}

/// Derived coverage-matrix statistics, persisted so the matrix generator can
/// decide whether its "Last updated" date should change without re-parsing
/// the rendered document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatrixStats {
    /// The date the matrix content last meaningfully changed.
    pub timestamp: String,
    /// Total requirements defined in the document.
    pub total_requirements: usize,
    /// Requirements covered by at least one passing test.
    pub tested_requirements: usize,
    /// Tested over total, as a percentage.
    pub coverage_percentage: f64,
}

impl MatrixStats {
    /// Builds stats from counts, computing the percentage.
    #[must_use]
    pub fn new(timestamp: String, total_requirements: usize, tested_requirements: usize) -> Self {
        #[allow(clippy::cast_precision_loss)]
        let coverage_percentage = if total_requirements > 0 {
            tested_requirements as f64 / total_requirements as f64 * 100.0
        } else {
            0.0
        };
        Self {
            timestamp,
            total_requirements,
            tested_requirements,
            coverage_percentage,
        }
    }

    /// Whether the coverage figures meaningfully differ from `previous`:
    /// either count differs, or the percentage moved by more than 0.1.
    #[must_use]
    pub fn differs_from(&self, previous: &Self) -> bool {
        self.total_requirements != previous.total_requirements
            || self.tested_requirements != previous.tested_requirements
            || (self.coverage_percentage - previous.coverage_percentage).abs() > 0.1
    }
}
