use clap::Parser;
use tracing::instrument;
use treq::Store;

use super::terminal::{outcome_symbol, Colorize};

#[derive(Debug, Default, Parser)]
#[command(about = "Show requirements coverage from the last test run")]
pub struct Show {}

impl Show {
    #[instrument(level = "debug", skip_all)]
    pub fn run(self, config: &treq::Config) -> anyhow::Result<()> {
        let store = Store::from_config(config);

        let Some(snapshot) = store.load_coverage() else {
            println!(
                "{}",
                "❌ No cached requirements coverage found. Run your test suite first.".warning()
            );
            return Ok(());
        };

        println!("{}", "Requirements Coverage (Last Run)".success());
        println!();

        let context = snapshot.context();
        println!("{}", format!("Database: {}", context.database).dim());
        println!("{}", format!("Generated: {}", context.timestamp).dim());
        println!("{}", format!("Command: {}", context.command).dim());
        if let Some(git) = &context.git {
            let state = if git.clean { "clean" } else { "dirty" };
            println!(
                "{}",
                format!("Git: {}@{} ({state})", git.branch, git.commit_short).dim()
            );
        }
        if !context.environment_variables.is_empty() {
            let environment = context
                .environment_variables
                .iter()
                .map(|(key, value)| format!("{key}={value}"))
                .collect::<Vec<_>>()
                .join(", ");
            println!("{}", format!("Environment: {environment}").dim());
        }
        println!();

        for (requirement, tests) in snapshot.requirement_index() {
            println!("  {requirement}:");
            for test in tests {
                let outcome = snapshot.outcome_of(test).unwrap_or_default();
                println!("    {} {}", outcome_symbol(outcome), test.short_name());
            }
        }

        println!();
        println!("Requirements Coverage Summary:");
        println!("  Tests with requirements: {}", snapshot.total_tests());
        println!("  Requirements covered: {}", snapshot.total_requirements());

        Ok(())
    }
}
