use clap::Parser;
use tracing::instrument;
use treq::{ChangeDetector, ChangeReport, Store, TestId};

use super::terminal::Colorize;

#[derive(Debug, Parser)]
#[command(about = "Check for requirement changes since the last run")]
pub struct Changes {}

impl Changes {
    #[instrument(level = "debug", skip_all)]
    pub fn run(self, config: &treq::Config) -> anyhow::Result<()> {
        let requirements_file = config.requirements_file();
        if !requirements_file.exists() {
            anyhow::bail!(
                "Requirements file not found: {}. Please check your treq configuration.",
                requirements_file.display()
            );
        }

        let store = Store::from_config(config);
        let detector = ChangeDetector::new(config, &store)?;
        let report = detector.detect();

        print_report(&report);

        // Exit with code 2 so automation can branch on "changes detected".
        if report.document_changed {
            std::process::exit(2);
        }
        Ok(())
    }
}

pub(super) fn print_report(report: &ChangeReport) {
    if !report.document_changed {
        println!("{}", "✅ No changes detected in requirements".success());
        return;
    }

    println!("{}", "🔍 Requirements changes detected!".warning());
    println!();

    if !report.added.is_empty() {
        println!("➕ **Added Requirements:**");
        for id in &report.added {
            println!("   - {id}");
        }
        println!();
    }

    if !report.modified.is_empty() {
        println!("✏️  **Modified Requirements:**");
        for id in &report.modified {
            println!("   - {id}");
        }
        println!();
    }

    if !report.removed.is_empty() {
        println!("❌ **Removed Requirements:**");
        for id in &report.removed {
            println!("   - {id}");
        }
        println!();
    }

    if report.affected_tests.is_empty() {
        println!("ℹ️  No tests directly affected by requirement changes");
    } else {
        println!("🧪 **Tests that may need review:**");
        for test in &report.affected_tests {
            println!("   - {test}");
        }
        println!();
        let sample = report
            .affected_tests
            .iter()
            .take(5)
            .map(TestId::short_name)
            .collect::<Vec<_>>()
            .join(", ");
        println!("{}", format!("💡 Consider re-running first: {sample}").dim());
    }

    println!(
        "\n📊 Total impact: {} tests may need review",
        report.affected_tests.len()
    );
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use treq::RequirementId;

    use super::*;

    #[test]
    fn print_report_covers_both_branches() {
        print_report(&ChangeReport::default());

        let report = ChangeReport {
            document_changed: true,
            added: [RequirementId::new("FR-3")].into_iter().collect(),
            modified: [RequirementId::new("FR-1.1")].into_iter().collect(),
            removed: BTreeSet::new(),
            affected_tests: [TestId::new("tests::t1")].into_iter().collect(),
        };
        print_report(&report);
    }

    #[test]
    fn missing_requirements_file_is_an_error() {
        let tmp = tempfile::tempdir().unwrap();
        let config = treq::Config::discover(tmp.path());
        assert!(Changes {}.run(&config).is_err());
    }
}
