//! Rule-set documents as fetched from providers.
//!
//! ```yaml
//! version: "1"
//! name: my rules
//! rules:
//!   - id: public
//!     match:
//!       routes:
//!         - path: /public/**
//!       methods: [GET]
//!     execute:
//!       - authenticator: anon
//!       - finalizer: hdr
//!         config:
//!           headers:
//!             X-User: "{{ subject.id }}"
//!     on_error:
//!       - error_handler: login
//! ```
//!
//! Unknown fields are rejected at every level. JSON documents are accepted
//! too, since YAML is a superset.

use serde::Deserialize;
use warden_core::{Error, MechanismConfig, Result};
use warden_mechanisms::MechanismKind;

/// A versioned snapshot of rules from one source.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RuleSet {
    /// Source identifier, e.g. `http_endpoint:<url>`
    #[serde(skip)]
    pub source: String,
    /// Source-defined version, compared for equality only
    #[serde(default)]
    pub version: String,
    /// Display name
    #[serde(default)]
    pub name: String,
    /// Hex fingerprint of the raw document
    #[serde(skip)]
    pub hash: String,
    /// Rule definitions in declared order
    #[serde(default)]
    pub rules: Vec<RuleConfig>,
}

impl RuleSet {
    /// An empty rule set for `source`. Used to signal deletion.
    pub fn empty(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            ..Default::default()
        }
    }

    /// Decode a raw document from `source`.
    ///
    /// A blank document decodes to an empty rule set.
    pub fn decode(source: &str, raw: &[u8]) -> Result<Self> {
        let hash = content_hash(raw);

        let text = std::str::from_utf8(raw)
            .map_err(|e| Error::configuration(format!("rule set from {source} is not UTF-8: {e}")))?;

        let mut rule_set = if text.trim().is_empty() {
            RuleSet::default()
        } else {
            yaml_serde::from_str::<RuleSet>(text).map_err(|e| {
                Error::configuration(format!("failed to decode rule set from {source}: {e}"))
            })?
        };

        rule_set.source = source.to_string();
        rule_set.hash = hash;
        Ok(rule_set)
    }

    /// Returns `true` if the set carries no rules.
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

/// Hex blake3 digest of a raw document.
pub fn content_hash(raw: &[u8]) -> String {
    blake3::hash(raw).to_hex().to_string()
}

/// Declarative rule.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RuleConfig {
    /// Unique rule id
    pub id: String,
    /// Which requests the rule applies to
    #[serde(rename = "match")]
    pub matcher: MatcherConfig,
    /// Mechanism chain
    #[serde(default)]
    pub execute: Vec<MechanismRef>,
    /// Error handler chain
    #[serde(default)]
    pub on_error: Vec<MechanismRef>,
}

/// Match criteria of a rule.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MatcherConfig {
    /// Path patterns; any may match
    pub routes: Vec<RouteConfig>,
    /// Allowed methods. Empty, or `ALL`, means every method.
    #[serde(default)]
    pub methods: Vec<String>,
}

/// One path pattern.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RouteConfig {
    /// Glob pattern (`*` within a segment, `**` across segments)
    pub path: String,
}

/// The fallback rule applied when no rule matches.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DefaultRuleConfig {
    /// Mechanism chain
    pub execute: Vec<MechanismRef>,
    /// Error handler chain
    #[serde(default)]
    pub on_error: Vec<MechanismRef>,
}

/// Reference to a catalog prototype, with an optional override.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(try_from = "RawMechanismRef")]
pub struct MechanismRef {
    /// Kind of the referenced mechanism
    pub kind: MechanismKind,
    /// Prototype id
    pub id: String,
    /// Rule-specific override
    pub config: Option<MechanismConfig>,
}

impl MechanismRef {
    /// Reference without override.
    pub fn new(kind: MechanismKind, id: impl Into<String>) -> Self {
        Self {
            kind,
            id: id.into(),
            config: None,
        }
    }

    /// Attach an override.
    pub fn with_config(mut self, config: MechanismConfig) -> Self {
        self.config = Some(config);
        self
    }
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct RawMechanismRef {
    #[serde(default)]
    authenticator: Option<String>,
    #[serde(default)]
    authorizer: Option<String>,
    #[serde(default)]
    contextualizer: Option<String>,
    #[serde(default)]
    finalizer: Option<String>,
    #[serde(default)]
    error_handler: Option<String>,
    #[serde(default)]
    config: Option<MechanismConfig>,
}

impl TryFrom<RawMechanismRef> for MechanismRef {
    type Error = String;

    fn try_from(raw: RawMechanismRef) -> std::result::Result<Self, Self::Error> {
        let named = [
            (MechanismKind::Authenticator, raw.authenticator),
            (MechanismKind::Authorizer, raw.authorizer),
            (MechanismKind::Contextualizer, raw.contextualizer),
            (MechanismKind::Finalizer, raw.finalizer),
            (MechanismKind::ErrorHandler, raw.error_handler),
        ];

        let mut found = named
            .into_iter()
            .filter_map(|(kind, id)| id.map(|id| (kind, id)));

        match (found.next(), found.next()) {
            (Some((kind, id)), None) => Ok(MechanismRef {
                kind,
                id,
                config: raw.config,
            }),
            (None, _) => Err("mechanism reference names no mechanism".to_string()),
            (Some(_), Some(_)) => {
                Err("mechanism reference must name exactly one mechanism".to_string())
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    const DOC: &str = r#"
version: "1"
name: test
rules:
  - id: foo
    match:
      routes:
        - path: /foo/**
      methods: [GET, POST]
    execute:
      - authenticator: anon
      - authorizer: allow
        config:
          foo: bar
    on_error:
      - error_handler: default
"#;

    #[test]
    fn test_decode_document() {
        let rs = RuleSet::decode("test:1", DOC.as_bytes()).unwrap();
        assert_eq!(rs.source, "test:1");
        assert_eq!(rs.version, "1");
        assert_eq!(rs.hash, content_hash(DOC.as_bytes()));
        assert_eq!(rs.rules.len(), 1);

        let rule = &rs.rules[0];
        assert_eq!(rule.matcher.routes[0].path, "/foo/**");
        assert_eq!(
            rule.execute[0],
            MechanismRef::new(MechanismKind::Authenticator, "anon")
        );
        assert_eq!(rule.execute[1].kind, MechanismKind::Authorizer);
        assert!(rule.execute[1].config.is_some());
        assert_eq!(rule.on_error[0].kind, MechanismKind::ErrorHandler);
    }

    #[test]
    fn test_decode_json_document() {
        let doc = br#"{"version": "2", "rules": [{"id": "bar", "match": {"routes": [{"path": "/bar"}]}, "execute": [{"authenticator": "anon"}]}]}"#;
        let rs = RuleSet::decode("test:1", doc).unwrap();
        assert_eq!(rs.version, "2");
        assert_eq!(rs.rules[0].id, "bar");
        assert!(rs.rules[0].matcher.methods.is_empty());
    }

    #[test]
    fn test_blank_document_is_empty() {
        let rs = RuleSet::decode("test:1", b"  \n").unwrap();
        assert!(rs.is_empty());
        assert_eq!(rs.source, "test:1");
    }

    #[test]
    fn test_unknown_fields_are_rejected() {
        assert!(RuleSet::decode("s", b"version: '1'\nfoo: bar").is_err());

        let doc = "rules:\n  - id: x\n    match:\n      routes: [{path: /}]\n    priority: 1";
        assert!(RuleSet::decode("s", doc.as_bytes()).is_err());
    }

    #[test]
    fn test_mechanism_ref_must_name_one_mechanism() {
        assert!(yaml_serde::from_str::<MechanismRef>("authenticator: a\nauthorizer: b").is_err());
        assert!(yaml_serde::from_str::<MechanismRef>("config: {}").is_err());
        assert!(yaml_serde::from_str::<MechanismRef>("unifier: a").is_err());
    }
}
