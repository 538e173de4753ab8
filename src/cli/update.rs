use clap::Parser;
use tracing::instrument;
use treq::{ChangeDetector, Store};

use super::terminal::Colorize;

#[derive(Debug, Parser)]
#[command(about = "Refresh all traceability artifacts")]
pub struct Update {}

impl Update {
    #[instrument(level = "debug", skip_all)]
    pub fn run(self, config: &treq::Config) -> anyhow::Result<()> {
        let requirements_file = config.requirements_file();
        if !requirements_file.exists() {
            anyhow::bail!(
                "Requirements file not found: {}. Please check your treq configuration.",
                requirements_file.display()
            );
        }

        println!("🏃 Updating requirements traceability...");
        println!();

        println!("1️⃣  Checking for requirement changes...");
        let store = Store::from_config(config);
        let detector = ChangeDetector::new(config, &store)?;
        let report = detector.detect();
        if report.document_changed {
            println!(
                "   {}",
                "⚠️  Changes detected - continuing with updates...".warning()
            );
            super::changes::print_report(&report);
        } else {
            println!("   {}", "✅ No changes detected".success());
        }
        println!();

        println!("2️⃣  Regenerating coverage report...");
        super::coverage::Coverage {}.run(config)?;
        println!();

        println!("{}", "🎉 Traceability update completed".success());
        let matrix = config.reports_output_dir().join(config.coverage_filename());
        println!("📋 Check {} for the updated coverage matrix", matrix.display());
        println!(
            "{}",
            "Re-run your test suite to refresh outcome data".dim()
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn update_regenerates_artifacts() {
        let tmp = tempfile::tempdir().unwrap();
        let config = treq::Config::discover(tmp.path());
        std::fs::write(
            tmp.path().join("requirements.md"),
            "- **FR-1.1**: Do X\n",
        )
        .unwrap();

        Update {}.run(&config).expect("update should succeed");

        assert!(tmp.path().join("TEST_COVERAGE.md").exists());
        assert!(Store::from_config(&config).load_hashes().is_some());
    }

    #[test]
    fn missing_requirements_file_is_an_error() {
        let tmp = tempfile::tempdir().unwrap();
        let config = treq::Config::discover(tmp.path());
        assert!(Update {}.run(&config).is_err());
    }
}
