use std::{fs, io, path::PathBuf};

use serde::{Serialize, de::DeserializeOwned};

use crate::domain::{Config, CoverageSnapshot, MatrixStats, RequirementHashSnapshot};

/// Filename of the persisted coverage snapshot.
const COVERAGE_FILENAME: &str = "requirements_coverage.json";
/// Filename of the persisted requirement-hash snapshot.
const HASHES_FILENAME: &str = "requirement_hashes.json";
/// Filename of the persisted coverage-matrix statistics.
const MATRIX_STATS_FILENAME: &str = "matrix_stats.json";

/// JSON persistence under the project's cache directory.
///
/// One file per artifact, overwritten wholesale (exact-overwrite semantics,
/// no history). Writes are atomic: content goes to a sibling temporary file
/// that is renamed over the target. Reads fail soft — a missing or malformed
/// file is "no usable cached data", never a crash, because the coverage
/// feature must not be the reason a test suite fails.
#[derive(Debug, Clone)]
pub struct Store {
    cache_dir: PathBuf,
}

/// Error raised when persisting cached state fails.
///
/// Callers surface this as a warning: losing coverage data must never fail
/// the test run itself.
#[derive(Debug, thiserror::Error)]
pub enum PersistenceError {
    /// The cache directory or file could not be written.
    #[error("could not write {path}: {source}")]
    Io {
        /// The path being written.
        path: PathBuf,
        /// The underlying I/O error.
        source: io::Error,
    },

    /// The value could not be encoded as JSON.
    #[error("could not encode {path}: {source}")]
    Encode {
        /// The path being written.
        path: PathBuf,
        /// The underlying encoding error.
        source: serde_json::Error,
    },
}

impl Store {
    /// Creates a store rooted at the given cache directory.
    ///
    /// The directory is created lazily on first write.
    #[must_use]
    pub const fn new(cache_dir: PathBuf) -> Self {
        Self { cache_dir }
    }

    /// Creates a store for the configured cache directory.
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        Self::new(config.cache_dir())
    }

    /// Path of the coverage snapshot file.
    #[must_use]
    pub fn coverage_path(&self) -> PathBuf {
        self.cache_dir.join(COVERAGE_FILENAME)
    }

    /// Path of the requirement-hash snapshot file.
    #[must_use]
    pub fn hashes_path(&self) -> PathBuf {
        self.cache_dir.join(HASHES_FILENAME)
    }

    /// Path of the coverage-matrix statistics file.
    #[must_use]
    pub fn matrix_stats_path(&self) -> PathBuf {
        self.cache_dir.join(MATRIX_STATS_FILENAME)
    }

    /// Loads the latest coverage snapshot, if a usable one exists.
    #[must_use]
    pub fn load_coverage(&self) -> Option<CoverageSnapshot> {
        self.read_json(self.coverage_path())
    }

    /// Persists the coverage snapshot, replacing the previous one.
    ///
    /// Callers should skip this for an empty snapshot rather than clobber
    /// the previous run's data with nothing.
    ///
    /// # Errors
    ///
    /// Returns a [`PersistenceError`] when the cache cannot be written.
    pub fn save_coverage(&self, snapshot: &CoverageSnapshot) -> Result<(), PersistenceError> {
        self.write_json(self.coverage_path(), snapshot)
    }

    /// Loads the latest requirement-hash snapshot, if a usable one exists.
    #[must_use]
    pub fn load_hashes(&self) -> Option<RequirementHashSnapshot> {
        self.read_json(self.hashes_path())
    }

    /// Persists the requirement-hash snapshot, replacing the previous one.
    ///
    /// # Errors
    ///
    /// Returns a [`PersistenceError`] when the cache cannot be written.
    pub fn save_hashes(&self, snapshot: &RequirementHashSnapshot) -> Result<(), PersistenceError> {
        self.write_json(self.hashes_path(), snapshot)
    }

    /// Loads the latest coverage-matrix statistics, if usable ones exist.
    #[must_use]
    pub fn load_matrix_stats(&self) -> Option<MatrixStats> {
        self.read_json(self.matrix_stats_path())
    }

    /// Persists the coverage-matrix statistics, replacing the previous ones.
    ///
    /// # Errors
    ///
    /// Returns a [`PersistenceError`] when the cache cannot be written.
    pub fn save_matrix_stats(&self, stats: &MatrixStats) -> Result<(), PersistenceError> {
        self.write_json(self.matrix_stats_path(), stats)
    }

    fn read_json<T: DeserializeOwned>(&self, path: PathBuf) -> Option<T> {
        let content = match fs::read_to_string(&path) {
            Ok(content) => content,
            Err(error) if error.kind() == io::ErrorKind::NotFound => return None,
            Err(error) => {
                tracing::warn!(path = %path.display(), %error, "could not read cached data");
                return None;
            }
        };

        match serde_json::from_str(&content) {
            Ok(value) => Some(value),
            Err(error) => {
                tracing::warn!(
                    path = %path.display(),
                    %error,
                    "cached data is malformed; treating as absent"
                );
                None
            }
        }
    }

    fn write_json<T: Serialize>(&self, path: PathBuf, value: &T) -> Result<(), PersistenceError> {
        fs::create_dir_all(&self.cache_dir).map_err(|source| PersistenceError::Io {
            path: self.cache_dir.clone(),
            source,
        })?;

        let content =
            serde_json::to_string_pretty(value).map_err(|source| PersistenceError::Encode {
                path: path.clone(),
                source,
            })?;

        // Write-then-rename keeps the previous snapshot intact if the write
        // is interrupted.
        let temporary = path.with_extension("json.tmp");
        fs::write(&temporary, content).map_err(|source| PersistenceError::Io {
            path: temporary.clone(),
            source,
        })?;
        fs::rename(&temporary, &path).map_err(|source| PersistenceError::Io { path, source })
    }
}
