use std::collections::BTreeSet;

use clap::Parser;
use tracing::instrument;
use treq::{PatternSet, Registry, RequirementId, Store};

use super::terminal::{terminal_width, Colorize};

#[derive(Debug, Parser)]
#[command(about = "Show detailed requirements coverage statistics")]
pub struct Stats {
    /// Output format
    #[arg(long, value_name = "FORMAT", default_value = "text")]
    format: StatsFormat,
}

#[derive(Debug, Clone, Copy, Default, clap::ValueEnum)]
enum StatsFormat {
    #[default]
    Text,
    Json,
    Csv,
}

impl Stats {
    #[instrument(level = "debug", skip_all)]
    pub fn run(self, config: &treq::Config) -> anyhow::Result<()> {
        let patterns = PatternSet::compile(config.requirement_patterns())?;
        let mut registry = Registry::new(config.requirements_file(), patterns);
        let valid = registry.load_valid().clone();

        let store = Store::from_config(config);
        let Some(snapshot) = store.load_coverage() else {
            println!(
                "{}",
                "❌ No cached coverage data found. Run your test suite first.".warning()
            );
            return Ok(());
        };

        let covered: BTreeSet<RequirementId> =
            snapshot.requirement_index().keys().cloned().collect();
        // Only identifiers that are still in the document count as tested.
        let tested: BTreeSet<RequirementId> = if valid.is_empty() {
            covered
        } else {
            covered.intersection(&valid).cloned().collect()
        };
        let untested: BTreeSet<RequirementId> = valid.difference(&tested).cloned().collect();

        let total = valid.len();
        let percentage = percent(tested.len(), total);

        match self.format {
            StatsFormat::Json => Self::output_json(&tested, &untested, total, percentage)?,
            StatsFormat::Csv => Self::output_csv(config, &valid, &tested),
            StatsFormat::Text => Self::output_text(config, &valid, &tested, &untested, percentage),
        }

        Ok(())
    }

    fn output_json(
        tested: &BTreeSet<RequirementId>,
        untested: &BTreeSet<RequirementId>,
        total: usize,
        percentage: f64,
    ) -> anyhow::Result<()> {
        use serde_json::json;

        let output = json!({
            "total_requirements": total,
            "tested_requirements": tested.len(),
            "untested_requirements": untested.len(),
            "coverage_percentage": (percentage * 10.0).round() / 10.0,
            "tested": tested.iter().map(RequirementId::as_str).collect::<Vec<_>>(),
            "untested": untested.iter().map(RequirementId::as_str).collect::<Vec<_>>(),
        });

        println!("{}", serde_json::to_string_pretty(&output)?);
        Ok(())
    }

    fn output_csv(
        config: &treq::Config,
        valid: &BTreeSet<RequirementId>,
        tested: &BTreeSet<RequirementId>,
    ) {
        println!("Requirement,Status,Category");
        for requirement in valid {
            let status = if tested.contains(requirement) {
                "Tested"
            } else {
                "Not Tested"
            };
            let category = category_of(config, requirement)
                .unwrap_or_else(|| "Unknown".to_string());
            println!("{requirement},{status},{category}");
        }
    }

    fn output_text(
        config: &treq::Config,
        valid: &BTreeSet<RequirementId>,
        tested: &BTreeSet<RequirementId>,
        untested: &BTreeSet<RequirementId>,
        percentage: f64,
    ) {
        let rule = "─".repeat(usize::from(terminal_width().unwrap_or(60)).min(60));

        println!();
        println!("{}", "📊 Requirements Coverage Statistics".info());
        println!("{}", rule.dim());
        println!("{:<26} {}", "Total Requirements", valid.len());
        println!("{:<26} {}", "Tested Requirements", tested.len());
        println!("{:<26} {}", "Untested Requirements", untested.len());
        println!("{:<26} {percentage:.1}%", "Coverage Percentage");

        println!();
        println!("{}", "📋 Breakdown by Category".info());
        println!("{}", rule.dim());
        println!("{:<34} {:>6} {:>6} {:>9}", "Category", "Tested", "Total", "Coverage");

        for pattern in config.requirement_patterns() {
            let Some(prefix) = pattern_prefix(pattern) else {
                continue;
            };
            let in_category = |id: &&RequirementId| category_matches(id, &prefix);
            let category_total = valid.iter().filter(in_category).count();
            if category_total == 0 {
                continue;
            }
            let category_tested = tested.iter().filter(in_category).count();
            println!(
                "{:<34} {:>6} {:>6} {:>8.1}%",
                category_name(&prefix),
                category_tested,
                category_total,
                percent(category_tested, category_total)
            );
        }
        println!();
    }
}

#[allow(clippy::cast_precision_loss)]
fn percent(part: usize, whole: usize) -> f64 {
    if whole == 0 {
        return 0.0;
    }
    part as f64 / whole as f64 * 100.0
}

/// The category prefix a pattern contributes, e.g. `FR` for `FR-\d+\.?\d*`.
fn pattern_prefix(pattern: &str) -> Option<String> {
    let prefix = pattern.split('-').next().unwrap_or_default();
    let alphabetic = prefix.chars().all(char::is_alphanumeric) && !prefix.is_empty();
    alphabetic.then(|| prefix.to_string())
}

fn category_matches(id: &RequirementId, prefix: &str) -> bool {
    id.as_str()
        .strip_prefix(prefix)
        .is_some_and(|rest| rest.starts_with('-'))
}

fn category_name(prefix: &str) -> String {
    match prefix {
        "FR" => "Functional Requirements (FR)".to_string(),
        "BR" => "Business Rules (BR)".to_string(),
        other => format!("{other} Requirements"),
    }
}

fn category_of(config: &treq::Config, id: &RequirementId) -> Option<String> {
    config
        .requirement_patterns()
        .iter()
        .filter_map(|pattern| pattern_prefix(pattern))
        .find(|prefix| category_matches(id, prefix))
}

#[cfg(test)]
mod tests {
    use test_case::test_case;
    use treq::{CoverageSnapshot, ExecutionContext, Outcome, TestId, TestRecord};

    use super::*;

    #[test_case(r"FR-\d+\.?\d*", Some("FR"); "functional")]
    #[test_case(r"BR-\d+\.?\d*", Some("BR"); "business")]
    #[test_case(r"(\d+)", None; "no usable prefix")]
    fn pattern_prefix_extraction(pattern: &str, expected: Option<&str>) {
        assert_eq!(pattern_prefix(pattern).as_deref(), expected);
    }

    #[test]
    fn category_names_match_known_prefixes() {
        assert_eq!(category_name("FR"), "Functional Requirements (FR)");
        assert_eq!(category_name("BR"), "Business Rules (BR)");
        assert_eq!(category_name("SR"), "SR Requirements");
    }

    #[test]
    fn category_of_requires_full_prefix_segment() {
        let config = treq::Config::default();
        assert_eq!(
            category_of(&config, &RequirementId::new("FR-1.1")).as_deref(),
            Some("FR")
        );
        assert_eq!(category_of(&config, &RequirementId::new("FRX-1")), None);
        assert_eq!(category_of(&config, &RequirementId::new("XX-1")), None);
    }

    #[test]
    fn stats_runs_against_cached_coverage() {
        let tmp = tempfile::tempdir().unwrap();
        let config = treq::Config::discover(tmp.path());
        std::fs::write(
            tmp.path().join("requirements.md"),
            "- **FR-1.1**: Do X\n- **FR-1.2**: Do Y\n- **BR-1**: Rule\n",
        )
        .unwrap();

        let snapshot = CoverageSnapshot::new(
            vec![TestRecord {
                test: TestId::new("tests::t1"),
                requirements: [RequirementId::new("FR-1.1")].into(),
                outcome: Outcome::Passed,
            }],
            ExecutionContext::default(),
        );
        Store::from_config(&config).save_coverage(&snapshot).unwrap();

        for format in [StatsFormat::Text, StatsFormat::Json, StatsFormat::Csv] {
            Stats { format }.run(&config).expect("stats should render");
        }
    }

    #[test]
    fn stats_without_cache_is_not_an_error() {
        let tmp = tempfile::tempdir().unwrap();
        let config = treq::Config::discover(tmp.path());
        Stats {
            format: StatsFormat::Text,
        }
        .run(&config)
        .expect("missing cache degrades to a message");
    }
}
