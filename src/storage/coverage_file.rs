use std::collections::{BTreeMap, BTreeSet, HashMap};

use serde::{Deserialize, Serialize};

use crate::domain::{CoverageSnapshot, ExecutionContext, Outcome, RequirementId, TestId, TestRecord};

/// The persisted JSON representation of a [`CoverageSnapshot`].
///
/// Layout: `command_info` (execution context), `requirements` (identifier →
/// ordered list of test entries), `summary` (totals). The file is overwritten
/// wholesale each run; no history is retained.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredCoverage {
    /// Execution context of the run that produced the data.
    pub command_info: ExecutionContext,
    /// Covering tests per requirement, in observation order.
    pub requirements: BTreeMap<RequirementId, Vec<StoredTest>>,
    /// Derived totals.
    pub summary: StoredSummary,
}

/// One covering test as persisted under a requirement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredTest {
    /// Short test name, for display.
    pub test_name: String,
    /// Fully-qualified test name, the stable join key.
    pub full_name: String,
    /// The test's last recorded outcome.
    pub result: Outcome,
}

/// Summary totals of a persisted snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredSummary {
    /// Number of tests with requirement references.
    pub total_tests: usize,
    /// Number of distinct requirements covered.
    pub total_requirements: usize,
}

impl From<CoverageSnapshot> for StoredCoverage {
    fn from(snapshot: CoverageSnapshot) -> Self {
        let requirements = snapshot
            .requirement_index()
            .iter()
            .map(|(id, tests)| {
                let entries = tests
                    .iter()
                    .map(|test| StoredTest {
                        test_name: test.short_name().to_string(),
                        full_name: test.as_str().to_string(),
                        result: snapshot.outcome_of(test).unwrap_or_default(),
                    })
                    .collect();
                (id.clone(), entries)
            })
            .collect();

        Self {
            summary: StoredSummary {
                total_tests: snapshot.total_tests(),
                total_requirements: snapshot.total_requirements(),
            },
            command_info: snapshot.context().clone(),
            requirements,
        }
    }
}

impl From<StoredCoverage> for CoverageSnapshot {
    fn from(stored: StoredCoverage) -> Self {
        let mut records: Vec<TestRecord> = Vec::new();
        let mut positions: HashMap<TestId, usize> = HashMap::new();

        for (id, entries) in &stored.requirements {
            for entry in entries {
                let test = TestId::new(entry.full_name.clone());
                let position = *positions.entry(test.clone()).or_insert_with(|| {
                    records.push(TestRecord {
                        test,
                        requirements: BTreeSet::new(),
                        outcome: entry.result,
                    });
                    records.len() - 1
                });
                records[position].requirements.insert(id.clone());
                records[position].outcome = entry.result;
            }
        }

        Self::new(records, stored.command_info)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(test: &str, requirements: &[&str], outcome: Outcome) -> TestRecord {
        TestRecord {
            test: TestId::new(test),
            requirements: requirements.iter().map(RequirementId::new).collect(),
            outcome,
        }
    }

    #[test]
    fn persisted_layout_has_the_documented_shape() {
        let snapshot = CoverageSnapshot::new(
            vec![record("tests/orders.rs::test_create", &["FR-1.1"], Outcome::Passed)],
            ExecutionContext::default(),
        );

        let value = serde_json::to_value(&snapshot).unwrap();
        assert!(value.get("command_info").is_some());
        assert!(value.get("summary").is_some());

        let entry = &value["requirements"]["FR-1.1"][0];
        assert_eq!(entry["test_name"], "test_create");
        assert_eq!(entry["full_name"], "tests/orders.rs::test_create");
        assert_eq!(entry["result"], "passed");
        assert_eq!(value["summary"]["total_tests"], 1);
        assert_eq!(value["summary"]["total_requirements"], 1);
    }

    #[test]
    fn snapshot_round_trips_through_the_persisted_layout() {
        let snapshot = CoverageSnapshot::new(
            vec![
                record("tests::a", &["FR-1.1", "FR-1.2"], Outcome::Passed),
                record("tests::b", &["FR-1.1"], Outcome::Failed),
                record("tests::c", &["BR-2"], Outcome::Unknown),
            ],
            ExecutionContext::default(),
        );

        let json = serde_json::to_string(&snapshot).unwrap();
        let restored: CoverageSnapshot = serde_json::from_str(&json).unwrap();

        assert_eq!(restored.requirement_index(), snapshot.requirement_index());

        let mut original: Vec<TestRecord> = snapshot.records().to_vec();
        let mut reconstructed: Vec<TestRecord> = restored.records().to_vec();
        original.sort_by(|a, b| a.test.cmp(&b.test));
        reconstructed.sort_by(|a, b| a.test.cmp(&b.test));
        assert_eq!(original, reconstructed);

        assert_eq!(restored.context(), snapshot.context());
        assert_eq!(restored.total_tests(), snapshot.total_tests());
        assert_eq!(restored.total_requirements(), snapshot.total_requirements());
    }

    #[test]
    fn reconstruction_preserves_test_order_within_a_requirement() {
        let snapshot = CoverageSnapshot::new(
            vec![
                record("tests::later_alphabetically", &["FR-1.1"], Outcome::Passed),
                record("tests::earlier", &["FR-1.1"], Outcome::Passed),
            ],
            ExecutionContext::default(),
        );

        let json = serde_json::to_string(&snapshot).unwrap();
        let restored: CoverageSnapshot = serde_json::from_str(&json).unwrap();

        assert_eq!(
            restored.requirement_index()[&RequirementId::new("FR-1.1")],
            [
                TestId::new("tests::later_alphabetically"),
                TestId::new("tests::earlier")
            ]
        );
    }
}
