use clap::Parser;
use tracing::instrument;
use treq::{PatternSet, Registry};

use super::terminal::Colorize;

#[derive(Debug, Parser)]
#[command(about = "Validate the requirements document and list valid identifiers")]
pub struct Validate {}

impl Validate {
    #[instrument(level = "debug", skip_all)]
    pub fn run(self, config: &treq::Config) -> anyhow::Result<()> {
        let patterns = PatternSet::compile(config.requirement_patterns())?;
        let mut registry = Registry::new(config.requirements_file(), patterns);

        let valid = registry.load_valid();
        if valid.is_empty() {
            println!(
                "{}",
                "❌ No requirements found or requirements file not accessible".warning()
            );
            return Ok(());
        }

        println!(
            "{}",
            format!("✅ Found {} valid requirements:", valid.len()).success()
        );
        for id in valid {
            println!("  {id}");
        }

        Ok(())
    }
}
