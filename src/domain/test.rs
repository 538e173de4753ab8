use std::{borrow::Borrow, fmt};

use serde::{Deserialize, Serialize};

/// A fully-qualified test identity, e.g. `tests/test_orders.rs::test_create`.
///
/// This is the join key between a test's documentation (scanned at collection
/// time) and its outcome (reported at execution time), so it must be stable
/// across both phases of a single run. The segment separator is `::`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TestId(String);

impl TestId {
    /// Creates a test identity from a fully-qualified name.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Returns the fully-qualified name.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns the short name: the segment after the last `::` separator.
    ///
    /// Used in rendered reports where the full path would be noise.
    #[must_use]
    pub fn short_name(&self) -> &str {
        self.0.rsplit("::").next().unwrap_or(&self.0)
    }
}

impl From<&str> for TestId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for TestId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl AsRef<str> for TestId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for TestId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TestId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The terminal outcome of a test.
///
/// `Unknown` is the default until an outcome is recorded, and remains the
/// terminal state for tests that never report one (e.g. when a run aborts).
/// That is a valid state for reporting purposes, not an error condition.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    /// The test passed.
    Passed,
    /// The test failed.
    Failed,
    /// The test was skipped.
    Skipped,
    /// No outcome was reported.
    #[default]
    Unknown,
}

impl Outcome {
    /// Returns the lowercase string form used in persisted data.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Passed => "passed",
            Self::Failed => "failed",
            Self::Skipped => "skipped",
            Self::Unknown => "unknown",
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// The execution phase an outcome was reported from.
///
/// Only `Call` outcomes count towards coverage, with one exception: a test
/// skipped during `Setup` never reaches the call phase, so a `Setup` outcome
/// of [`Outcome::Skipped`] is accepted as terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Fixture setup before the test body.
    Setup,
    /// The test body itself.
    Call,
    /// Fixture teardown after the test body.
    Teardown,
}

#[cfg(test)]
mod tests {
    use test_case::test_case;

    use super::*;

    #[test_case("tests/orders.rs::test_create", "test_create"; "module path")]
    #[test_case("a::b::c", "c"; "nested path")]
    #[test_case("test_standalone", "test_standalone"; "no separator")]
    fn short_name_is_last_segment(full: &str, short: &str) {
        assert_eq!(TestId::new(full).short_name(), short);
    }

    #[test]
    fn outcome_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&Outcome::Passed).unwrap(), "\"passed\"");
        assert_eq!(serde_json::to_string(&Outcome::Unknown).unwrap(), "\"unknown\"");
        let outcome: Outcome = serde_json::from_str("\"skipped\"").unwrap();
        assert_eq!(outcome, Outcome::Skipped);
    }

    #[test]
    fn outcome_defaults_to_unknown() {
        assert_eq!(Outcome::default(), Outcome::Unknown);
    }
}
