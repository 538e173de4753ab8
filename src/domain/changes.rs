use std::{
    collections::{BTreeMap, BTreeSet},
    fs,
    path::PathBuf,
};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use super::{
    config::Config,
    pattern::{PatternError, PatternSet},
    requirement::RequirementId,
    test::TestId,
};
use crate::storage::Store;

/// The persisted requirement-hash state of the requirements document.
///
/// Compared across runs to classify changes without diffing full documents.
/// Hashes are deterministic across process restarts: SHA-256 over a fixed
/// encoding (`ID:description` for individual requirements, the raw document
/// bytes for the whole file), hex formatted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequirementHashSnapshot {
    /// Hash of the whole requirements document.
    pub file_hash: String,
    /// Per-requirement content hashes.
    pub requirement_hashes: BTreeMap<RequirementId, String>,
    /// When the document was last checked.
    pub last_check: DateTime<Utc>,
}

/// Classification of requirement changes between two document states.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChangeReport {
    /// Whether the document content changed at all.
    pub document_changed: bool,
    /// Requirements present now but not in the previous snapshot.
    pub added: BTreeSet<RequirementId>,
    /// Requirements whose description text changed.
    pub modified: BTreeSet<RequirementId>,
    /// Requirements present previously but not any more.
    pub removed: BTreeSet<RequirementId>,
    /// Tests that covered a changed requirement per the last known coverage.
    pub affected_tests: BTreeSet<TestId>,
}

impl ChangeReport {
    /// All changed identifiers: added, modified and removed.
    #[must_use]
    pub fn changed_requirements(&self) -> BTreeSet<RequirementId> {
        self.added
            .iter()
            .chain(&self.modified)
            .chain(&self.removed)
            .cloned()
            .collect()
    }
}

/// Detects semantic changes to the requirements document between runs.
///
/// Reads the previous hash snapshot from the store, hashes the current
/// document, and classifies each requirement as added, modified, removed or
/// unchanged. Changed requirements are mapped to the tests that previously
/// exercised them via the most recent coverage snapshot.
#[derive(Debug)]
pub struct ChangeDetector<'a> {
    requirements_file: PathBuf,
    patterns: PatternSet,
    store: &'a Store,
}

impl<'a> ChangeDetector<'a> {
    /// Creates a detector for the configured requirements document.
    ///
    /// # Errors
    ///
    /// Returns a [`PatternError`] when a configured pattern does not compile.
    pub fn new(config: &Config, store: &'a Store) -> Result<Self, PatternError> {
        Ok(Self {
            requirements_file: config.requirements_file(),
            patterns: PatternSet::compile(config.requirement_patterns())?,
            store,
        })
    }

    /// Creates a detector from pre-built parts.
    #[must_use]
    pub const fn with_parts(
        requirements_file: PathBuf,
        patterns: PatternSet,
        store: &'a Store,
    ) -> Self {
        Self {
            requirements_file,
            patterns,
            store,
        }
    }

    /// Detects changes and persists the refreshed hash snapshot.
    ///
    /// A document hash equal to the stored one short-circuits to a no-change
    /// report without recomputing or rewriting the per-requirement hashes —
    /// equality already implies the stored snapshot is current, so detection
    /// is idempotent. A missing requirements document is a normal state, not
    /// an error: it yields a no-change report and leaves the stored snapshot
    /// untouched.
    #[must_use]
    pub fn detect(&self) -> ChangeReport {
        let Ok(content) = fs::read_to_string(&self.requirements_file) else {
            tracing::debug!(
                path = %self.requirements_file.display(),
                "no requirements document; nothing to compare"
            );
            return ChangeReport::default();
        };

        let file_hash = sha256_hex(content.as_bytes());
        let previous = self.store.load_hashes();
        if previous
            .as_ref()
            .is_some_and(|snapshot| snapshot.file_hash == file_hash)
        {
            return ChangeReport::default();
        }

        let current_hashes: BTreeMap<RequirementId, String> = self
            .patterns
            .descriptions(&content)
            .iter()
            .map(|(id, description)| (id.clone(), requirement_hash(id, description)))
            .collect();
        let previous_hashes = previous.map(|snapshot| snapshot.requirement_hashes).unwrap_or_default();

        let added: BTreeSet<RequirementId> = current_hashes
            .keys()
            .filter(|id| !previous_hashes.contains_key(*id))
            .cloned()
            .collect();
        let removed: BTreeSet<RequirementId> = previous_hashes
            .keys()
            .filter(|id| !current_hashes.contains_key(*id))
            .cloned()
            .collect();
        let modified: BTreeSet<RequirementId> = current_hashes
            .iter()
            .filter(|(id, hash)| {
                previous_hashes
                    .get(*id)
                    .is_some_and(|previous_hash| previous_hash != *hash)
            })
            .map(|(id, _)| id.clone())
            .collect();

        let mut affected_tests = BTreeSet::new();
        if let Some(coverage) = self.store.load_coverage() {
            for id in added.iter().chain(&modified).chain(&removed) {
                if let Some(tests) = coverage.tests_for(id) {
                    affected_tests.extend(tests.iter().cloned());
                }
            }
        }

        let snapshot = RequirementHashSnapshot {
            file_hash,
            requirement_hashes: current_hashes,
            last_check: Utc::now(),
        };
        if let Err(error) = self.store.save_hashes(&snapshot) {
            tracing::warn!(%error, "could not persist requirement hashes");
        }

        ChangeReport {
            document_changed: true,
            added,
            modified,
            removed,
            affected_tests,
        }
    }
}

fn requirement_hash(id: &RequirementId, description: &str) -> String {
    sha256_hex(format!("{id}:{description}").as_bytes())
}

fn sha256_hex(bytes: &[u8]) -> String {
    format!("{:x}", Sha256::digest(bytes))
}
