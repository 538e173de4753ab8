use std::collections::{BTreeMap, BTreeSet};

use regex::{Regex, RegexBuilder};

use super::requirement::RequirementId;

/// An ordered set of compiled requirement-identifier patterns.
///
/// Patterns are configured once per process and immutable thereafter. Order
/// only determines scan order; matches from all patterns are unioned and
/// duplicates collapse into one set.
///
/// Each configured pattern is compiled in three forms at construction:
/// - *bare*, for scanning test documentation;
/// - *anchored*, for scanning the requirements document's looser markdown
///   layout (identifiers preceded by line-start, whitespace, a bullet-and-bold
///   marker, or a bold marker);
/// - *described*, for pairing identifiers with their description text
///   (`**FR-1.1**: description`).
///
/// All matching is case-insensitive and matched identifiers are upper-cased.
#[derive(Debug, Clone)]
pub struct PatternSet {
    bare: Vec<Regex>,
    anchored: Vec<Regex>,
    described: Vec<Regex>,
}

/// Error returned when a configured requirement pattern is not a valid
/// regular expression.
#[derive(Debug, thiserror::Error)]
#[error("invalid requirement pattern '{pattern}': {source}")]
pub struct PatternError {
    /// The offending pattern, as configured.
    pattern: String,
    /// The underlying regex compilation error.
    source: regex::Error,
}

impl PatternSet {
    /// Compiles the configured patterns.
    ///
    /// # Errors
    ///
    /// Returns a [`PatternError`] naming the first pattern that fails to
    /// compile. This is a configuration error surfaced at startup, never at
    /// scan time.
    pub fn compile<S: AsRef<str>>(patterns: &[S]) -> Result<Self, PatternError> {
        let mut bare = Vec::with_capacity(patterns.len());
        let mut anchored = Vec::with_capacity(patterns.len());
        let mut described = Vec::with_capacity(patterns.len());

        for pattern in patterns {
            let pattern = pattern.as_ref();
            bare.push(build(pattern, pattern, false)?);
            anchored.push(build(
                pattern,
                &format!(r"(?:^|\s|-\s\*\*|\*\*)({pattern})"),
                true,
            )?);
            described.push(build(pattern, &format!(r"\*\*({pattern})\*\*:\s+(.+)"), true)?);
        }

        Ok(Self {
            bare,
            anchored,
            described,
        })
    }

    /// Extracts the set of matching identifiers from free text.
    ///
    /// Empty or absent text yields the empty set, never an error.
    #[must_use]
    pub fn extract(&self, text: &str) -> BTreeSet<RequirementId> {
        if text.is_empty() {
            return BTreeSet::new();
        }

        self.bare
            .iter()
            .flat_map(|regex| regex.find_iter(text))
            .map(|found| RequirementId::new(found.as_str()))
            .collect()
    }

    /// Extracts identifiers from the requirements document's markdown layout.
    ///
    /// Recovers identifiers embedded in `- **FR-1.1**:`, `## FR-1.1`, or bare
    /// prose identically.
    #[must_use]
    pub fn extract_document(&self, content: &str) -> BTreeSet<RequirementId> {
        self.anchored
            .iter()
            .flat_map(|regex| regex.captures_iter(content))
            .filter_map(|captures| captures.get(1))
            .map(|found| RequirementId::new(found.as_str()))
            .collect()
    }

    /// Extracts identifiers paired with their trimmed description text.
    ///
    /// Only identifiers in the `**FR-1.1**: description` form carry a
    /// description; the description is the remainder of the line.
    #[must_use]
    pub fn descriptions(&self, content: &str) -> BTreeMap<RequirementId, String> {
        let mut descriptions = BTreeMap::new();
        for regex in &self.described {
            for captures in regex.captures_iter(content) {
                if let (Some(id), Some(description)) = (captures.get(1), captures.get(2)) {
                    descriptions.insert(
                        RequirementId::new(id.as_str()),
                        description.as_str().trim().to_string(),
                    );
                }
            }
        }
        descriptions
    }
}

fn build(source: &str, pattern: &str, multi_line: bool) -> Result<Regex, PatternError> {
    RegexBuilder::new(pattern)
        .case_insensitive(true)
        .multi_line(multi_line)
        .build()
        .map_err(|error| PatternError {
            pattern: source.to_string(),
            source: error,
        })
}
