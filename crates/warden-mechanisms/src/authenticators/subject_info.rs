use serde::Deserialize;
use serde_json::{Map, Value};
use warden_core::{Error, Result, Subject};

/// Where to find the subject id and attributes in a JSON document.
///
/// Paths are dot separated (`ext.user_id`); array elements are addressed by
/// index. An empty attributes path selects the whole document.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SubjectInfo {
    /// Path to the subject id
    #[serde(default = "default_id_path")]
    pub id: String,
    /// Path to the attributes object
    #[serde(default)]
    pub attributes: String,
}

fn default_id_path() -> String {
    "sub".to_string()
}

impl Default for SubjectInfo {
    fn default() -> Self {
        Self {
            id: default_id_path(),
            attributes: String::new(),
        }
    }
}

impl SubjectInfo {
    /// Build a subject from `document`.
    pub fn create_subject(&self, document: &Value) -> Result<Subject> {
        let id = match lookup(document, &self.id) {
            Some(Value::String(s)) if !s.is_empty() => s.clone(),
            Some(Value::Number(n)) => n.to_string(),
            _ => {
                return Err(Error::internal(format!(
                    "could not extract subject identifier using '{}'",
                    self.id
                )));
            }
        };

        let attributes = match lookup(document, &self.attributes) {
            Some(Value::Object(map)) => map.clone(),
            None | Some(Value::Null) => Map::new(),
            Some(_) => {
                return Err(Error::internal(format!(
                    "attributes at '{}' are not an object",
                    self.attributes
                )));
            }
        };

        Ok(Subject { id, attributes })
    }
}

fn lookup<'a>(document: &'a Value, path: &str) -> Option<&'a Value> {
    if path.is_empty() {
        return Some(document);
    }

    path.split('.').try_fold(document, |current, segment| match current {
        Value::Object(map) => map.get(segment),
        Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
        _ => None,
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_defaults_use_sub_and_whole_document() {
        let doc = json!({"sub": "alice", "scope": "read"});
        let subject = SubjectInfo::default().create_subject(&doc).unwrap();
        assert_eq!(subject.id, "alice");
        assert_eq!(subject.attributes.get("scope"), Some(&json!("read")));
        assert_eq!(subject.attributes.len(), 2);
    }

    #[test]
    fn test_nested_paths() {
        let info = SubjectInfo {
            id: "ext.ids.1".into(),
            attributes: "ext".into(),
        };
        let doc = json!({"ext": {"ids": ["x", 42]}});
        let subject = info.create_subject(&doc).unwrap();
        assert_eq!(subject.id, "42");
        assert!(subject.attributes.contains_key("ids"));
    }

    #[test]
    fn test_missing_id_fails() {
        let err = SubjectInfo::default()
            .create_subject(&json!({"user": "bob"}))
            .unwrap_err();
        assert!(err.to_string().contains("could not extract subject identifier"));
    }
}
