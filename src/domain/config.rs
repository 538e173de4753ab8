use std::{
    env,
    path::{Path, PathBuf},
};

use serde::Deserialize;

/// Name of the configuration file searched for at the project root.
pub const CONFIG_FILENAME: &str = "treq.toml";

/// Resolved configuration for a tracked project.
///
/// Loaded once at process start and passed by reference to every component
/// that needs it; there is no ambient global lookup. Relative paths in the
/// file are resolved against the project root the configuration was
/// discovered in.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(from = "Versions")]
pub struct Config {
    root: PathBuf,
    requirements_file: PathBuf,
    requirement_patterns: Vec<String>,
    cache_dir: PathBuf,
    database: DatabaseConfig,
    reports: ReportsConfig,
}

/// Database/environment label detection settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct DatabaseConfig {
    /// Environment variables inspected, in order, to detect the label.
    #[serde(default = "default_detect_from_env")]
    pub detect_from_env: Vec<String>,
    /// Label recorded when no variable matches.
    #[serde(default = "default_database_type")]
    pub default_type: String,
}

/// Report generation settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ReportsConfig {
    /// Directory the coverage matrix is written into.
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
    /// Filename of the generated coverage matrix document.
    #[serde(default = "default_coverage_filename")]
    pub coverage_filename: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            root: PathBuf::from("."),
            requirements_file: default_requirements_file(),
            requirement_patterns: default_requirement_patterns(),
            cache_dir: default_cache_dir(),
            database: DatabaseConfig::default(),
            reports: ReportsConfig::default(),
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            detect_from_env: default_detect_from_env(),
            default_type: default_database_type(),
        }
    }
}

impl Default for ReportsConfig {
    fn default() -> Self {
        Self {
            output_dir: default_output_dir(),
            coverage_filename: default_coverage_filename(),
        }
    }
}

impl Config {
    /// Loads the configuration from a TOML file at the given path.
    ///
    /// Relative paths are resolved against the file's parent directory.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or if the TOML content is
    /// invalid.
    pub fn load(path: &Path) -> Result<Self, String> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| format!("Failed to read config file: {e}"))?;
        let mut config: Self =
            toml::from_str(&content).map_err(|e| format!("Failed to parse config file: {e}"))?;
        config.root = path.parent().map_or_else(|| PathBuf::from("."), Path::to_path_buf);
        Ok(config)
    }

    /// Discovers the configuration for a project root.
    ///
    /// Looks for [`CONFIG_FILENAME`] in `root`; a missing file yields the
    /// defaults, and an unreadable or invalid file degrades to the defaults
    /// with a logged warning. Configuration problems must never make the
    /// tool unusable.
    #[must_use]
    pub fn discover(root: &Path) -> Self {
        let path = root.join(CONFIG_FILENAME);
        if path.exists() {
            match Self::load(&path) {
                Ok(config) => return config,
                Err(error) => {
                    tracing::warn!(path = %path.display(), %error, "ignoring unusable config file");
                }
            }
        }

        let mut config = Self::default();
        config.root = root.to_path_buf();
        config
    }

    /// The project root the configuration was resolved against.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Absolute-or-root-relative path of the requirements document.
    #[must_use]
    pub fn requirements_file(&self) -> PathBuf {
        self.root.join(&self.requirements_file)
    }

    /// The configured identifier patterns, in scan order.
    #[must_use]
    pub fn requirement_patterns(&self) -> &[String] {
        &self.requirement_patterns
    }

    /// Path of the cache directory.
    #[must_use]
    pub fn cache_dir(&self) -> PathBuf {
        self.root.join(&self.cache_dir)
    }

    /// Path of the directory generated reports are written into.
    #[must_use]
    pub fn reports_output_dir(&self) -> PathBuf {
        self.root.join(&self.reports.output_dir)
    }

    /// Filename of the generated coverage matrix document.
    #[must_use]
    pub fn coverage_filename(&self) -> &str {
        &self.reports.coverage_filename
    }

    /// Environment variables inspected for database detection.
    #[must_use]
    pub fn database_detect_env(&self) -> &[String] {
        &self.database.detect_from_env
    }

    /// Determines the database/environment label from the environment.
    #[must_use]
    pub fn database_type(&self) -> String {
        self.detect_database(|key| env::var(key).ok())
    }

    fn detect_database(&self, get: impl Fn(&str) -> Option<String>) -> String {
        for key in &self.database.detect_from_env {
            if let Some(value) = get(key) {
                let value = value.to_lowercase();
                if value.contains("postgres") {
                    return "PostgreSQL".to_string();
                } else if value.contains("mysql") {
                    return "MySQL".to_string();
                } else if value.contains("sqlite") {
                    return "SQLite".to_string();
                }
            }
        }
        self.database.default_type.clone()
    }
}

/// The serialized versions of the configuration.
/// This allows for future changes to the configuration format and to the
/// domain type without breaking compatibility.
#[derive(Debug, Deserialize)]
#[serde(tag = "_version")]
enum Versions {
    #[serde(rename = "1")]
    V1 {
        #[serde(default = "default_requirements_file")]
        requirements_file: PathBuf,

        #[serde(default = "default_requirement_patterns")]
        requirement_patterns: Vec<String>,

        #[serde(default = "default_cache_dir")]
        cache_dir: PathBuf,

        #[serde(default)]
        database: DatabaseConfig,

        #[serde(default)]
        reports: ReportsConfig,
    },
}

impl From<Versions> for Config {
    fn from(versions: Versions) -> Self {
        match versions {
            Versions::V1 {
                requirements_file,
                requirement_patterns,
                cache_dir,
                database,
                reports,
            } => Self {
                root: PathBuf::from("."),
                requirements_file,
                requirement_patterns,
                cache_dir,
                database,
                reports,
            },
        }
    }
}

fn default_requirements_file() -> PathBuf {
    PathBuf::from("requirements.md")
}

fn default_requirement_patterns() -> Vec<String> {
    vec![r"FR-\d+\.?\d*".to_string(), r"BR-\d+\.?\d*".to_string()]
}

fn default_cache_dir() -> PathBuf {
    PathBuf::from(".treq")
}

fn default_detect_from_env() -> Vec<String> {
    vec![
        "TEST_DATABASE".to_string(),
        "DATABASE_URL".to_string(),
        "DB_TYPE".to_string(),
    ]
}

fn default_database_type() -> String {
    "SQLite".to_string()
}

fn default_output_dir() -> PathBuf {
    PathBuf::from(".")
}

fn default_coverage_filename() -> String {
    "TEST_COVERAGE.md".to_string()
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn load_reads_valid_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(
            b"_version = \"1\"\nrequirements_file = \"docs/reqs.md\"\nrequirement_patterns = [\"SR-\\\\d+\"]\ncache_dir = \".cache\"\n\n[reports]\noutput_dir = \"reports\"\ncoverage_filename = \"MATRIX.md\"\n",
        )
        .unwrap();

        let config = Config::load(file.path()).unwrap();

        assert_eq!(config.requirement_patterns(), [r"SR-\d+".to_string()]);
        assert!(config.requirements_file().ends_with("docs/reqs.md"));
        assert!(config.cache_dir().ends_with(".cache"));
        assert!(config.reports_output_dir().ends_with("reports"));
        assert_eq!(config.coverage_filename(), "MATRIX.md");
    }

    #[test]
    fn load_missing_file_returns_error() {
        let tmp = tempfile::tempdir().unwrap();
        let missing = tmp.path().join("missing.toml");

        let error = Config::load(&missing).unwrap_err();
        assert!(error.starts_with("Failed to read config file:"));
    }

    #[test]
    fn load_invalid_toml_returns_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"_version = \"1\"\nrequirement_patterns = \"not-a-list\"\n")
            .unwrap();

        let error = Config::load(file.path()).unwrap_err();
        assert!(error.starts_with("Failed to parse config file:"));
    }

    #[test]
    fn empty_file_returns_default() {
        // Tests that deserialising an empty file returns the default configuration.
        let expected = Config::default();
        let actual: Config = toml::from_str(r#"_version = "1""#).unwrap();
        assert_eq!(actual, expected);
    }

    #[test]
    fn discover_without_file_uses_defaults_at_root() {
        let tmp = tempfile::tempdir().unwrap();
        let config = Config::discover(tmp.path());

        assert_eq!(config.root(), tmp.path());
        assert_eq!(config.requirements_file(), tmp.path().join("requirements.md"));
        assert_eq!(config.cache_dir(), tmp.path().join(".treq"));
        assert_eq!(config.coverage_filename(), "TEST_COVERAGE.md");
    }

    #[test]
    fn discover_with_invalid_file_degrades_to_defaults() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(tmp.path().join(CONFIG_FILENAME), "not valid toml [").unwrap();

        let config = Config::discover(tmp.path());
        assert_eq!(config.requirement_patterns(), Config::default().requirement_patterns());
    }

    #[test]
    fn database_detection_recognizes_common_engines() {
        let config = Config::default();

        let detected = config.detect_database(|key| {
            (key == "DATABASE_URL").then(|| "postgresql://localhost/app".to_string())
        });
        assert_eq!(detected, "PostgreSQL");

        let detected = config.detect_database(|key| {
            (key == "TEST_DATABASE").then(|| "MySQL".to_string())
        });
        assert_eq!(detected, "MySQL");

        let detected = config.detect_database(|key| {
            (key == "DB_TYPE").then(|| "sqlite://".to_string())
        });
        assert_eq!(detected, "SQLite");
    }

    #[test]
    fn database_detection_falls_back_to_default_type() {
        let config = Config::default();
        assert_eq!(config.detect_database(|_| None), "SQLite");

        let detected = config.detect_database(|key| {
            (key == "DATABASE_URL").then(|| "oracle://somewhere".to_string())
        });
        assert_eq!(detected, "SQLite");
    }
}
