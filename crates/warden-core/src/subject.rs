//! The identity established by authentication.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Authenticated (or explicitly anonymous) principal of a request.
///
/// Contextualizers enrich `attributes`; finalizers render them into
/// upstream headers and cookies.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Subject {
    /// Subject identifier. Empty for pass-through authenticators.
    pub id: String,
    /// Arbitrary attributes, typically the raw claims.
    #[serde(default)]
    pub attributes: Map<String, Value>,
}

impl Subject {
    /// Create a subject without attributes.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            attributes: Map::new(),
        }
    }

    /// Add an attribute.
    pub fn with_attribute(mut self, key: impl Into<String>, value: Value) -> Self {
        self.attributes.insert(key.into(), value);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_subject_builder() {
        let subject = Subject::new("alice").with_attribute("group", json!("admin"));
        assert_eq!(subject.id, "alice");
        assert_eq!(subject.attributes["group"], json!("admin"));
    }

    #[test]
    fn test_default_subject_is_anonymous() {
        let subject = Subject::default();
        assert!(subject.id.is_empty());
        assert!(subject.attributes.is_empty());
    }
}
