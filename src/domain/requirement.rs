use std::{borrow::Borrow, fmt, ops::Deref};

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// A normalized requirement identifier, e.g. `FR-1.2` or `BR-3`.
///
/// Identifiers are upper-cased on construction so that `fr-1.2` and `FR-1.2`
/// compare equal. No internal structure is assumed beyond "matches one of the
/// configured patterns" — pattern matching is the concern of
/// [`PatternSet`](crate::domain::PatternSet), not of this type.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RequirementId(String);

impl RequirementId {
    /// Creates a requirement identifier, normalizing to uppercase.
    #[must_use]
    pub fn new(id: impl AsRef<str>) -> Self {
        Self(id.as_ref().to_uppercase())
    }

    /// Returns the normalized identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for RequirementId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for RequirementId {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

impl AsRef<str> for RequirementId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for RequirementId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl Deref for RequirementId {
    type Target = str;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl fmt::Display for RequirementId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Serialize for RequirementId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for RequirementId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        // Normalize on the way in so hand-edited cache files still compare
        // correctly against freshly extracted identifiers.
        String::deserialize(deserializer).map(Self::new)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn construction_normalizes_to_uppercase() {
        assert_eq!(RequirementId::new("fr-1.2").as_str(), "FR-1.2");
        assert_eq!(RequirementId::new("FR-1.2").as_str(), "FR-1.2");
        assert_eq!(RequirementId::new("Br-3").as_str(), "BR-3");
    }

    #[test]
    fn identity_is_by_normalized_string() {
        assert_eq!(RequirementId::new("fr-1.1"), RequirementId::new("FR-1.1"));
        assert_ne!(RequirementId::new("FR-1.1"), RequirementId::new("FR-1.2"));
    }

    #[test]
    fn ordering_is_lexicographic() {
        let mut ids = vec![
            RequirementId::new("FR-2.1"),
            RequirementId::new("BR-1.1"),
            RequirementId::new("FR-1.1"),
        ];
        ids.sort();
        let sorted: Vec<&str> = ids.iter().map(RequirementId::as_str).collect();
        assert_eq!(sorted, ["BR-1.1", "FR-1.1", "FR-2.1"]);
    }

    #[test]
    fn deserialize_normalizes() {
        let id: RequirementId = serde_json::from_str("\"fr-9.9\"").unwrap();
        assert_eq!(id.as_str(), "FR-9.9");
    }

    #[test]
    fn serialize_round_trip() {
        let id = RequirementId::new("FR-1.1");
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"FR-1.1\"");
        let back: RequirementId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);
    }
}
