use std::path::PathBuf;

mod changes;
mod coverage;
mod show;
mod stats;
mod terminal;
mod update;
mod validate;

use changes::Changes;
use clap::ArgAction;
use coverage::Coverage;
use show::Show;
use stats::Stats;
use tracing::instrument;
use update::Update;
use validate::Validate;

#[derive(Debug, clap::Parser)]
#[command(version, about)]
pub struct Cli {
    /// Verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    /// The path to the project root
    #[arg(short, long, default_value = ".", global = true)]
    root: PathBuf,

    #[command(subcommand)]
    command: Option<Command>,
}

impl Cli {
    pub fn run(self) -> anyhow::Result<()> {
        Self::setup_logging(self.verbose);

        let config = treq::Config::discover(&self.root);
        self.command
            .unwrap_or_else(|| Command::Show(Show::default()))
            .run(&config)
    }

    fn setup_logging(verbosity: u8) {
        use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

        let level = match verbosity {
            0 => tracing::Level::WARN,
            1 => tracing::Level::INFO,
            2 => tracing::Level::DEBUG,
            _ => tracing::Level::TRACE,
        };

        let filter = tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into());

        let fmt_layer = tracing_subscriber::fmt::layer()
            .with_target(false)
            .with_thread_names(false)
            .with_line_number(false);

        tracing_subscriber::registry()
            .with(filter)
            .with(fmt_layer)
            .init();
    }
}

#[derive(Debug, clap::Parser)]
pub enum Command {
    /// Show requirements coverage from the last test run (default)
    Show(Show),

    /// Validate the requirements document and list valid identifiers
    Validate(Validate),

    /// Show the resolved configuration
    Config(Config),

    /// Show detailed coverage statistics
    Stats(Stats),

    /// Generate the Markdown coverage matrix document
    Coverage(Coverage),

    /// Check for requirement changes since the last run
    ///
    /// Exits with code 2 when changes were detected, so automation can
    /// branch on the result.
    Changes(Changes),

    /// Refresh all traceability artifacts
    Update(Update),
}

impl Command {
    fn run(self, config: &treq::Config) -> anyhow::Result<()> {
        match self {
            Self::Show(command) => command.run(config)?,
            Self::Validate(command) => command.run(config)?,
            Self::Config(command) => command.run(config)?,
            Self::Stats(command) => command.run(config)?,
            Self::Coverage(command) => command.run(config)?,
            Self::Changes(command) => command.run(config)?,
            Self::Update(command) => command.run(config)?,
        }
        Ok(())
    }
}

#[derive(Debug, clap::Parser)]
#[command(about = "Show the resolved configuration")]
pub struct Config {}

impl Config {
    #[instrument(level = "debug", skip_all)]
    fn run(self, config: &treq::Config) -> anyhow::Result<()> {
        println!("Current treq configuration:");
        println!(
            "  Requirements file: {}",
            config.requirements_file().display()
        );
        println!("  Requirement patterns: {:?}", config.requirement_patterns());
        println!("  Cache directory: {}", config.cache_dir().display());
        println!("  Database type: {}", config.database_type());
        println!(
            "  Reports output dir: {}",
            config.reports_output_dir().display()
        );
        println!("  Coverage filename: {}", config.coverage_filename());
        Ok(())
    }
}
