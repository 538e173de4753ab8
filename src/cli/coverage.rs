use std::{
    collections::{BTreeMap, BTreeSet},
    fs,
};

use clap::Parser;
use tracing::instrument;
use treq::{CoverageSnapshot, MatrixStats, Outcome, PatternSet, Registry, RequirementId, Store};

use super::terminal::Colorize;

#[derive(Debug, Parser)]
#[command(about = "Generate the Markdown coverage matrix document")]
pub struct Coverage {}

impl Coverage {
    #[instrument(level = "debug", skip_all)]
    pub fn run(self, config: &treq::Config) -> anyhow::Result<()> {
        let requirements_file = config.requirements_file();
        if !requirements_file.exists() {
            anyhow::bail!(
                "Requirements file not found: {}. Please check your treq configuration.",
                requirements_file.display()
            );
        }

        println!("Extracting requirements from specifications...");
        let patterns = PatternSet::compile(config.requirement_patterns())?;
        let registry = Registry::new(requirements_file, patterns);
        let requirements = registry.descriptions();
        if requirements.is_empty() {
            anyhow::bail!(
                "No requirements found in {}",
                registry.requirements_file().display()
            );
        }

        println!("Analyzing test coverage...");
        let store = Store::from_config(config);
        let coverage = passing_tests(store.load_coverage().as_ref());

        let today = chrono::Local::now().format("%Y-%m-%d").to_string();
        let current = MatrixStats::new(today, requirements.len(), coverage.len());
        // Keep the previous date when coverage has not meaningfully changed,
        // so untouched matrices do not churn in version control.
        let stats = match store.load_matrix_stats() {
            Some(previous) if !current.differs_from(&previous) => MatrixStats {
                timestamp: previous.timestamp,
                ..current
            },
            _ => current,
        };

        let document = render_matrix(&requirements, &coverage, &stats);

        let output_dir = config.reports_output_dir();
        fs::create_dir_all(&output_dir)?;
        let output_path = output_dir.join(config.coverage_filename());
        fs::write(&output_path, document)?;

        if let Err(error) = store.save_matrix_stats(&stats) {
            tracing::warn!(%error, "could not persist matrix statistics");
        }

        println!(
            "{}",
            format!("✅ Coverage report generated: {}", output_path.display()).success()
        );
        println!(
            "📊 Coverage summary: {} total requirements",
            requirements.len()
        );
        Ok(())
    }
}

/// Covering tests per requirement, passing outcomes only, by short name.
fn passing_tests(
    snapshot: Option<&CoverageSnapshot>,
) -> BTreeMap<RequirementId, BTreeSet<String>> {
    let mut coverage: BTreeMap<RequirementId, BTreeSet<String>> = BTreeMap::new();
    let Some(snapshot) = snapshot else {
        return coverage;
    };

    for (requirement, tests) in snapshot.requirement_index() {
        let passing: BTreeSet<String> = tests
            .iter()
            .filter(|test| snapshot.outcome_of(test) == Some(Outcome::Passed))
            .map(|test| test.short_name().to_string())
            .collect();
        if !passing.is_empty() {
            coverage.insert(requirement.clone(), passing);
        }
    }
    coverage
}

fn render_matrix(
    requirements: &BTreeMap<RequirementId, String>,
    coverage: &BTreeMap<RequirementId, BTreeSet<String>>,
    stats: &MatrixStats,
) -> String {
    let mut lines = vec![
        "# Test Coverage Matrix".to_string(),
        String::new(),
        "This document shows the traceability between requirements and test cases.".to_string(),
        String::new(),
        format!("**Last updated**: {}", stats.timestamp),
        String::new(),
        "## Coverage Summary".to_string(),
        String::new(),
        format!("- **Total Requirements**: {}", stats.total_requirements),
        format!("- **Requirements with Tests**: {}", stats.tested_requirements),
        format!(
            "- **Requirements without Tests**: {}",
            stats.total_requirements - stats.tested_requirements
        ),
        String::new(),
        format!("**Coverage Percentage**: {:.1}%", stats.coverage_percentage),
        String::new(),
        "## Requirements Coverage".to_string(),
        String::new(),
    ];

    for (requirement, description) in requirements {
        let tests = coverage.get(requirement);
        let status = if tests.is_some() {
            "✅ **Tested**"
        } else {
            "❌ **Not Tested**"
        };

        lines.push(format!("### {requirement}: {description}"));
        lines.push(format!("**Status**: {status}"));
        lines.push(String::new());

        if let Some(tests) = tests {
            lines.push("**Test Cases**:".to_string());
            lines.extend(tests.iter().map(|test| format!("- `{test}`")));
        } else {
            lines.push("**Test Cases**: None".to_string());
            lines.push("⚠️ *This requirement needs test coverage*".to_string());
        }
        lines.push(String::new());
    }

    let untested: Vec<&RequirementId> = requirements
        .keys()
        .filter(|requirement| !coverage.contains_key(*requirement))
        .collect();
    if !untested.is_empty() {
        lines.push("## Requirements Needing Tests".to_string());
        lines.push(String::new());
        lines.push("The following requirements have no test coverage:".to_string());
        lines.push(String::new());
        for requirement in untested {
            lines.push(format!("- **{requirement}**: {}", requirements[requirement]));
        }
        lines.push(String::new());
    }

    let total_tests: usize = coverage.values().map(BTreeSet::len).sum();
    lines.push("## Test Statistics".to_string());
    lines.push(String::new());
    lines.push(format!(
        "- **Total Test Cases with Requirements**: {total_tests}"
    ));
    lines.push(format!(
        "- **Unique Requirements Tested**: {}",
        coverage.len()
    ));
    if coverage.is_empty() {
        lines.push("- **Average Tests per Requirement**: 0".to_string());
    } else {
        #[allow(clippy::cast_precision_loss)]
        let average = total_tests as f64 / coverage.len() as f64;
        lines.push(format!("- **Average Tests per Requirement**: {average:.1}"));
    }
    lines.extend([
        String::new(),
        "---".to_string(),
        String::new(),
        "*This file is auto-generated by treq*".to_string(),
        "*To update, run: `treq coverage`*".to_string(),
    ]);

    lines.join("\n") + "\n"
}

#[cfg(test)]
mod tests {
    use treq::{ExecutionContext, TestId, TestRecord};

    use super::*;

    fn sample_requirements() -> BTreeMap<RequirementId, String> {
        [
            (RequirementId::new("FR-1.1"), "Do X".to_string()),
            (RequirementId::new("FR-1.2"), "Do Y".to_string()),
        ]
        .into()
    }

    #[test]
    fn matrix_lists_tested_and_untested_requirements() {
        let coverage: BTreeMap<RequirementId, BTreeSet<String>> = [(
            RequirementId::new("FR-1.1"),
            ["test_x".to_string()].into(),
        )]
        .into();
        let stats = MatrixStats::new("2025-06-01".to_string(), 2, 1);

        let document = render_matrix(&sample_requirements(), &coverage, &stats);

        assert!(document.contains("**Last updated**: 2025-06-01"));
        assert!(document.contains("- **Total Requirements**: 2"));
        assert!(document.contains("**Coverage Percentage**: 50.0%"));
        assert!(document.contains("### FR-1.1: Do X"));
        assert!(document.contains("- `test_x`"));
        assert!(document.contains("### FR-1.2: Do Y"));
        assert!(document.contains("## Requirements Needing Tests"));
        assert!(document.contains("- **FR-1.2**: Do Y"));
        assert!(document.ends_with("*To update, run: `treq coverage`*\n"));
    }

    #[test]
    fn only_passing_tests_count_as_coverage() {
        let snapshot = CoverageSnapshot::new(
            vec![
                TestRecord {
                    test: TestId::new("tests::passing"),
                    requirements: [RequirementId::new("FR-1.1")].into(),
                    outcome: Outcome::Passed,
                },
                TestRecord {
                    test: TestId::new("tests::failing"),
                    requirements: [RequirementId::new("FR-1.1"), RequirementId::new("FR-1.2")]
                        .into(),
                    outcome: Outcome::Failed,
                },
            ],
            ExecutionContext::default(),
        );

        let coverage = passing_tests(Some(&snapshot));
        assert_eq!(coverage.len(), 1);
        assert_eq!(
            coverage[&RequirementId::new("FR-1.1")],
            ["passing".to_string()].into()
        );
    }

    #[test]
    fn generation_writes_document_and_persists_stats() {
        let tmp = tempfile::tempdir().unwrap();
        let config = treq::Config::discover(tmp.path());
        fs::write(
            tmp.path().join("requirements.md"),
            "- **FR-1.1**: Do X\n- **FR-1.2**: Do Y\n",
        )
        .unwrap();

        Coverage {}.run(&config).expect("generation should succeed");

        let document = fs::read_to_string(tmp.path().join("TEST_COVERAGE.md")).unwrap();
        assert!(document.contains("# Test Coverage Matrix"));

        let stats = Store::from_config(&config).load_matrix_stats().unwrap();
        assert_eq!(stats.total_requirements, 2);
        assert_eq!(stats.tested_requirements, 0);
    }

    #[test]
    fn unchanged_coverage_keeps_the_previous_date() {
        let tmp = tempfile::tempdir().unwrap();
        let config = treq::Config::discover(tmp.path());
        fs::write(tmp.path().join("requirements.md"), "- **FR-1.1**: Do X\n").unwrap();

        let store = Store::from_config(&config);
        store
            .save_matrix_stats(&MatrixStats::new("1999-12-31".to_string(), 1, 0))
            .unwrap();

        Coverage {}.run(&config).expect("generation should succeed");

        let document = fs::read_to_string(tmp.path().join("TEST_COVERAGE.md")).unwrap();
        assert!(document.contains("**Last updated**: 1999-12-31"));
        assert_eq!(store.load_matrix_stats().unwrap().timestamp, "1999-12-31");
    }

    #[test]
    fn missing_requirements_file_is_an_error() {
        let tmp = tempfile::tempdir().unwrap();
        let config = treq::Config::discover(tmp.path());
        assert!(Coverage {}.run(&config).is_err());
    }
}
