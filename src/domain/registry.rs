use std::{
    collections::{BTreeMap, BTreeSet},
    fmt, fs,
    path::PathBuf,
};

use super::{pattern::PatternSet, requirement::RequirementId, test::TestId};

/// The canonical set of valid requirement identifiers.
///
/// Loads the requirements document once, memoizes the extracted identifier
/// set for the process lifetime, and answers validation queries against it.
///
/// Reading the document fails soft: a missing, unreadable, or undecodable
/// document is treated as "no valid requirements known", which disables
/// validation entirely. The tool must remain usable before a requirements
/// document exists.
#[derive(Debug, Clone)]
pub struct Registry {
    requirements_file: PathBuf,
    patterns: PatternSet,
    valid: Option<BTreeSet<RequirementId>>,
}

impl Registry {
    /// Creates a registry over the given requirements document.
    #[must_use]
    pub const fn new(requirements_file: PathBuf, patterns: PatternSet) -> Self {
        Self {
            requirements_file,
            patterns,
            valid: None,
        }
    }

    /// Returns the path of the requirements document.
    #[must_use]
    pub fn requirements_file(&self) -> &std::path::Path {
        &self.requirements_file
    }

    /// Loads the set of valid identifiers, memoized after the first call.
    pub fn load_valid(&mut self) -> &BTreeSet<RequirementId> {
        if self.valid.is_none() {
            let valid = self
                .document_content()
                .map(|content| self.patterns.extract_document(&content))
                .unwrap_or_default();
            self.valid = Some(valid);
        }
        self.valid.as_ref().expect("memoized above")
    }

    /// Validates that every referenced identifier is known.
    ///
    /// Validation is disabled while the valid set is empty (absent or
    /// unreadable requirements document): any reference set passes.
    ///
    /// # Errors
    ///
    /// Returns an [`UnknownRequirementError`] naming the owning test and the
    /// offending identifiers when the valid set is non-empty and `refs` is
    /// not a subset of it.
    pub fn validate(
        &mut self,
        refs: &BTreeSet<RequirementId>,
        owner: &TestId,
    ) -> Result<(), UnknownRequirementError> {
        let valid = self.load_valid();
        if valid.is_empty() {
            return Ok(());
        }

        let unknown: Vec<RequirementId> = refs.difference(valid).cloned().collect();
        if unknown.is_empty() {
            Ok(())
        } else {
            Err(UnknownRequirementError {
                test: owner.clone(),
                unknown,
                requirements_file: self.requirements_file.clone(),
            })
        }
    }

    /// Clears the memoized valid set, forcing a reload on next use.
    pub fn reset(&mut self) {
        self.valid = None;
    }

    /// Extracts identifier → description pairs from the document.
    ///
    /// Not memoized: the change detector calls this after the document is
    /// known to have changed.
    #[must_use]
    pub fn descriptions(&self) -> BTreeMap<RequirementId, String> {
        self.document_content()
            .map(|content| self.patterns.descriptions(&content))
            .unwrap_or_default()
    }

    fn document_content(&self) -> Option<String> {
        match fs::read_to_string(&self.requirements_file) {
            Ok(content) => Some(content),
            Err(error) => {
                tracing::debug!(
                    path = %self.requirements_file.display(),
                    %error,
                    "requirements document not readable; validation disabled"
                );
                None
            }
        }
    }
}

/// Error raised when a test references identifiers outside the valid set.
///
/// This is the one condition in the core that must stop normal flow:
/// silently accepting an unknown reference would corrupt the traceability
/// guarantees.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub struct UnknownRequirementError {
    test: TestId,
    unknown: Vec<RequirementId>,
    requirements_file: PathBuf,
}

impl UnknownRequirementError {
    /// The test whose documentation carried the unknown references.
    #[must_use]
    pub const fn test(&self) -> &TestId {
        &self.test
    }

    /// The offending identifiers, sorted.
    #[must_use]
    pub fn unknown(&self) -> &[RequirementId] {
        &self.unknown
    }
}

impl fmt::Display for UnknownRequirementError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "test '{}' references unknown requirements: ", self.test)?;
        for (i, id) in self.unknown.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{id}")?;
        }
        write!(
            f,
            ". Valid requirements are defined in {}",
            self.requirements_file.display()
        )
    }
}
