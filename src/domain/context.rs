use std::{collections::BTreeMap, env, path::Path, process::Command};

use serde::{Deserialize, Serialize};

use super::config::Config;

/// Immutable metadata describing the conditions of one test run.
///
/// Captured once per run and stored alongside the coverage data so a reader
/// can tell *where* the numbers came from. Purely descriptive: nothing here
/// ever affects coverage logic.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionContext {
    /// The command line the run was started with.
    pub command: String,
    /// Local wall-clock time of the run, `YYYY-MM-DD HH:MM:SS`.
    pub timestamp: String,
    /// The detected database/environment label.
    pub database: String,
    /// The working directory of the run.
    pub working_directory: String,
    /// The user the run executed as.
    pub user: String,
    /// The host the run executed on.
    pub hostname: String,
    /// Operating system and architecture.
    pub platform: PlatformInfo,
    /// Captured values of the relevant environment variables.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub environment_variables: BTreeMap<String, String>,
    /// Version-control state, when the working directory is a git checkout.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub git: Option<GitInfo>,
}

/// Operating system and architecture of the run host.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlatformInfo {
    /// Operating system name, e.g. `linux`.
    pub system: String,
    /// Machine architecture, e.g. `x86_64`.
    pub machine: String,
}

/// Version-control state captured at run time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GitInfo {
    /// The checked-out branch.
    pub branch: String,
    /// The full commit hash of `HEAD`.
    pub commit: String,
    /// The first eight characters of the commit hash.
    pub commit_short: String,
    /// Whether the working tree had no uncommitted changes.
    pub clean: bool,
}

impl ExecutionContext {
    /// Captures the current process environment.
    ///
    /// Never fails: anything that cannot be determined (no git checkout, no
    /// `USER` variable, ...) is recorded as absent or `unknown`.
    #[must_use]
    pub fn capture(config: &Config) -> Self {
        let working_directory = env::current_dir()
            .map_or_else(|_| "unknown".to_string(), |dir| dir.display().to_string());

        let mut environment_variables = BTreeMap::new();
        let mut relevant: Vec<&str> = config
            .database_detect_env()
            .iter()
            .map(String::as_str)
            .collect();
        relevant.extend(["CI", "GITHUB_ACTIONS"]);
        for key in relevant {
            if let Ok(value) = env::var(key) {
                environment_variables.insert(key.to_string(), value);
            }
        }

        Self {
            command: env::args().collect::<Vec<_>>().join(" "),
            timestamp: chrono::Local::now().format("%Y-%m-%d %H:%M:%S").to_string(),
            database: config.database_type(),
            working_directory: working_directory.clone(),
            user: env::var("USER")
                .or_else(|_| env::var("USERNAME"))
                .unwrap_or_else(|_| "unknown".to_string()),
            hostname: env::var("HOSTNAME").unwrap_or_else(|_| "unknown".to_string()),
            platform: PlatformInfo {
                system: env::consts::OS.to_string(),
                machine: env::consts::ARCH.to_string(),
            },
            environment_variables,
            git: GitInfo::probe(Path::new(&working_directory)),
        }
    }
}

impl GitInfo {
    /// Probes git state in `dir`, returning `None` when git is unavailable
    /// or the directory is not inside a repository.
    #[must_use]
    pub fn probe(dir: &Path) -> Option<Self> {
        let branch = git_output(dir, &["branch", "--show-current"])?;
        let commit = git_output(dir, &["rev-parse", "HEAD"])?;
        let status = git_output(dir, &["status", "--porcelain"])?;

        let commit_short = commit.chars().take(8).collect();
        Some(Self {
            branch,
            commit,
            commit_short,
            clean: status.is_empty(),
        })
    }
}

fn git_output(dir: &Path, args: &[&str]) -> Option<String> {
    let output = Command::new("git").args(args).current_dir(dir).output().ok()?;
    if !output.status.success() {
        return None;
    }
    Some(String::from_utf8_lossy(&output.stdout).trim().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn capture_fills_every_descriptive_field() {
        let config = Config::default();
        let context = ExecutionContext::capture(&config);

        assert!(!context.command.is_empty());
        assert!(!context.timestamp.is_empty());
        assert!(!context.database.is_empty());
        assert_eq!(context.platform.system, env::consts::OS);
        assert_eq!(context.platform.machine, env::consts::ARCH);
    }

    #[test]
    fn git_probe_outside_a_repository_is_none() {
        let tmp = tempfile::tempdir().unwrap();
        assert_eq!(GitInfo::probe(tmp.path()), None);
    }

    #[test]
    fn context_serializes_without_empty_optional_fields() {
        let context = ExecutionContext::default();
        let json = serde_json::to_string(&context).unwrap();
        assert!(!json.contains("environment_variables"));
        assert!(!json.contains("git"));
    }
}
