//! OAuth2 token introspection responses and the assertions applied to them.

use std::time::Duration;

use serde::{Deserialize, Deserializer};
use warden_core::config::duration;

use crate::error::{ValidationError, ValidationResult};
use crate::session::SessionLifespan;

/// Algorithms accepted when `allowed_algorithms` is not configured.
pub const DEFAULT_ALGORITHMS: &[&str] = &[
    "RS256", "RS384", "RS512", "PS256", "PS384", "PS512", "ES256", "ES384", "ES512", "EdDSA",
];

/// RFC 7662 introspection response. Unknown members are ignored.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct IntrospectionResponse {
    /// Whether the token is currently active
    #[serde(default)]
    pub active: bool,
    /// Granted scopes (space separated on the wire)
    #[serde(default, deserialize_with = "space_separated")]
    pub scope: Vec<String>,
    /// Client the token was issued to
    #[serde(default)]
    pub client_id: Option<String>,
    /// Resource owner
    #[serde(default)]
    pub username: Option<String>,
    /// Token type
    #[serde(default)]
    pub token_type: Option<String>,
    /// Subject
    #[serde(default)]
    pub sub: Option<String>,
    /// Issuer
    #[serde(default)]
    pub iss: Option<String>,
    /// Audience (string or list on the wire)
    #[serde(default, deserialize_with = "string_or_list")]
    pub aud: Vec<String>,
    /// Expires at
    #[serde(default)]
    pub exp: Option<i64>,
    /// Issued at
    #[serde(default)]
    pub iat: Option<i64>,
    /// Not before
    #[serde(default)]
    pub nbf: Option<i64>,
}

impl IntrospectionResponse {
    /// Validate against `expectation` at the current time.
    pub fn validate(&self, expectation: &Expectation) -> ValidationResult {
        self.validate_at(expectation, chrono::Utc::now().timestamp())
    }

    /// Validate against `expectation` at `now` (Unix seconds).
    pub fn validate_at(&self, expectation: &Expectation, now: i64) -> ValidationResult {
        if !self.active {
            return Err(ValidationError::NotActive);
        }

        expectation.assert_issuer(self.iss.as_deref().unwrap_or_default())?;
        expectation.assert_audience(&self.aud)?;
        expectation.scopes.assert(&self.scope)?;

        SessionLifespan {
            active: self.active,
            issued_at: self.iat.unwrap_or_default(),
            not_before: self.nbf.unwrap_or_default(),
            expires_at: self.exp.unwrap_or_default(),
            leeway: expectation.validity_leeway,
        }
        .assert_at(now)
    }
}

fn space_separated<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<String>::deserialize(deserializer)?;
    Ok(raw
        .map(|s| s.split_whitespace().map(str::to_string).collect())
        .unwrap_or_default())
}

fn string_or_list<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum OneOrMany {
        One(String),
        Many(Vec<String>),
    }

    Ok(match Option::<OneOrMany>::deserialize(deserializer)? {
        Some(OneOrMany::One(s)) => vec![s],
        Some(OneOrMany::Many(v)) => v,
        None => Vec::new(),
    })
}

/// Trust assertions a token must satisfy.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Expectation {
    /// Trusted issuers
    #[serde(default)]
    pub issuers: Vec<String>,
    /// Audiences that must all be present
    #[serde(default)]
    pub audience: Vec<String>,
    /// Required scopes
    #[serde(default)]
    pub scopes: ScopesMatcher,
    /// Allowed signature algorithms for signed tokens
    #[serde(default)]
    pub allowed_algorithms: Vec<String>,
    /// Clock skew tolerance
    #[serde(default, deserialize_with = "duration::deserialize")]
    pub validity_leeway: Duration,
}

impl Expectation {
    /// Fields set in `overrides` replace ours; unset fields are kept.
    pub fn merge(&self, overrides: &Expectation) -> Expectation {
        fn pick<T: Clone>(ours: &[T], theirs: &[T]) -> Vec<T> {
            (if theirs.is_empty() { ours } else { theirs }).to_vec()
        }

        Expectation {
            issuers: pick(&self.issuers, &overrides.issuers),
            audience: pick(&self.audience, &overrides.audience),
            scopes: if overrides.scopes.is_empty() {
                self.scopes.clone()
            } else {
                overrides.scopes.clone()
            },
            allowed_algorithms: pick(&self.allowed_algorithms, &overrides.allowed_algorithms),
            validity_leeway: if overrides.validity_leeway.is_zero() {
                self.validity_leeway
            } else {
                overrides.validity_leeway
            },
        }
    }

    /// The issuer must be one of the trusted issuers.
    pub fn assert_issuer(&self, issuer: &str) -> ValidationResult {
        if self.issuers.iter().any(|i| i == issuer) {
            Ok(())
        } else {
            Err(ValidationError::UntrustedIssuer(issuer.to_string()))
        }
    }

    /// Every expected audience must be present in `audience`.
    pub fn assert_audience(&self, audience: &[String]) -> ValidationResult {
        match self.audience.iter().find(|a| !audience.contains(a)) {
            Some(missing) => Err(ValidationError::MissingAudience(missing.clone())),
            None => Ok(()),
        }
    }

    /// The algorithm must be allowed. An empty list allows [`DEFAULT_ALGORITHMS`].
    pub fn assert_algorithm(&self, algorithm: &str) -> ValidationResult {
        let allowed = if self.allowed_algorithms.is_empty() {
            DEFAULT_ALGORITHMS.contains(&algorithm)
        } else {
            self.allowed_algorithms.iter().any(|a| a == algorithm)
        };

        if allowed {
            Ok(())
        } else {
            Err(ValidationError::DisallowedAlgorithm(algorithm.to_string()))
        }
    }
}

/// How a granted scope satisfies a required one.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScopeMatching {
    /// Identical strings
    #[default]
    Exact,
    /// Granted `foo` satisfies required `foo.bar`
    Hierarchic,
    /// Granted `foo.*` satisfies required `foo.bar`; `**` spans segments
    Wildcard,
}

/// Required scopes and how to match them.
///
/// Configured either as a plain list (exact matching) or as
/// `{matching_strategy: hierarchic, values: [...]}`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(from = "RawScopes")]
pub struct ScopesMatcher {
    matching: ScopeMatching,
    required: Vec<String>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawScopes {
    List(Vec<String>),
    Strategy {
        #[serde(default)]
        matching_strategy: ScopeMatching,
        values: Vec<String>,
    },
}

impl From<RawScopes> for ScopesMatcher {
    fn from(raw: RawScopes) -> Self {
        match raw {
            RawScopes::List(required) => Self::new(ScopeMatching::Exact, required),
            RawScopes::Strategy {
                matching_strategy,
                values,
            } => Self::new(matching_strategy, values),
        }
    }
}

impl ScopesMatcher {
    /// Matcher requiring every scope in `required`.
    pub fn new(matching: ScopeMatching, required: Vec<String>) -> Self {
        Self { matching, required }
    }

    /// Returns `true` if no scopes are required.
    pub fn is_empty(&self) -> bool {
        self.required.is_empty()
    }

    /// Every required scope must be satisfied by some granted scope.
    pub fn assert(&self, granted: &[String]) -> ValidationResult {
        for required in &self.required {
            let satisfied = granted.iter().any(|g| match self.matching {
                ScopeMatching::Exact => g == required,
                ScopeMatching::Hierarchic => {
                    g == required
                        || required
                            .strip_prefix(g.as_str())
                            .is_some_and(|rest| rest.starts_with('.'))
                }
                ScopeMatching::Wildcard => wildcard_match(g, required),
            });

            if !satisfied {
                return Err(ValidationError::MissingScope(required.clone()));
            }
        }
        Ok(())
    }
}

/// Segment-wise match on `.`: `*` matches one segment, `**` the rest.
fn wildcard_match(pattern: &str, value: &str) -> bool {
    let mut pattern = pattern.split('.');
    let mut value = value.split('.');
    loop {
        match (pattern.next(), value.next()) {
            (Some("**"), Some(_)) => return true,
            (Some("*"), Some(_)) => {}
            (Some(p), Some(v)) if p == v => {}
            (None, None) => return true,
            _ => return false,
        }
    }
}
