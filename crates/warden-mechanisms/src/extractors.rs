//! Locating credentials within an inbound request.
//!
//! Strategies are configured as a list; the first one yielding a non-empty
//! value wins:
//!
//! ```yaml
//! token_source:
//!   - header: Authorization
//!     prefix: Bearer
//!   - cookie: access_token
//!   - query_parameter: access_token
//! ```

use serde::Deserialize;
use warden_core::{Error, Request, Result};

/// One place a credential may be found.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum ExtractStrategy {
    /// Request header, optionally with a scheme prefix.
    Header {
        /// Header name
        header: String,
        /// Required value prefix, e.g. `Bearer`
        #[serde(default)]
        prefix: Option<String>,
    },
    /// Cookie value.
    Cookie {
        /// Cookie name
        cookie: String,
    },
    /// URL query parameter.
    Query {
        /// Parameter name
        query_parameter: String,
        /// Required value prefix
        #[serde(default)]
        prefix: Option<String>,
    },
    /// Url-encoded form parameter in the body.
    Form {
        /// Parameter name
        body_parameter: String,
        /// Required value prefix
        #[serde(default)]
        prefix: Option<String>,
    },
}

impl ExtractStrategy {
    /// Header strategy.
    pub fn header(name: impl Into<String>, prefix: Option<&str>) -> Self {
        Self::Header {
            header: name.into(),
            prefix: prefix.map(str::to_string),
        }
    }

    /// Cookie strategy.
    pub fn cookie(name: impl Into<String>) -> Self {
        Self::Cookie {
            cookie: name.into(),
        }
    }

    /// Query parameter strategy.
    pub fn query(name: impl Into<String>, prefix: Option<&str>) -> Self {
        Self::Query {
            query_parameter: name.into(),
            prefix: prefix.map(str::to_string),
        }
    }

    /// Form parameter strategy.
    pub fn form(name: impl Into<String>, prefix: Option<&str>) -> Self {
        Self::Form {
            body_parameter: name.into(),
            prefix: prefix.map(str::to_string),
        }
    }

    /// Extract the value, or `None` if absent, empty, or not carrying the prefix.
    pub fn extract(&self, request: &Request) -> Option<String> {
        let (raw, prefix) = match self {
            Self::Header { header, prefix } => {
                (request.header(header).map(str::to_string), prefix)
            }
            Self::Cookie { cookie } => (request.cookie(cookie), &None),
            Self::Query {
                query_parameter,
                prefix,
            } => (request.query_parameter(query_parameter), prefix),
            Self::Form {
                body_parameter,
                prefix,
            } => (request.form_parameter(body_parameter), prefix),
        };

        let raw = raw?;
        let value = match prefix.as_deref() {
            Some(prefix) => strip_prefix(&raw, prefix)?,
            None => raw.trim(),
        };

        (!value.is_empty()).then(|| value.to_string())
    }
}

fn strip_prefix<'a>(raw: &'a str, prefix: &str) -> Option<&'a str> {
    let rest = raw.strip_prefix(prefix)?;
    if !rest.starts_with(' ') {
        return None;
    }
    Some(rest.trim())
}

/// Ordered list of strategies; the first non-empty result wins.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(transparent)]
pub struct CompositeExtractStrategy {
    strategies: Vec<ExtractStrategy>,
}

impl CompositeExtractStrategy {
    /// Compose `strategies` in the given order.
    pub fn new(strategies: Vec<ExtractStrategy>) -> Self {
        Self { strategies }
    }

    /// Strategies in declared order.
    pub fn strategies(&self) -> &[ExtractStrategy] {
        &self.strategies
    }

    /// Returns the first non-empty value.
    pub fn extract(&self, request: &Request) -> Result<String> {
        self.strategies
            .iter()
            .find_map(|s| s.extract(request))
            .ok_or_else(|| Error::precondition("no credential found"))
    }
}

impl Default for CompositeExtractStrategy {
    /// `Authorization: Bearer`, then the `access_token` cookie, then the
    /// `access_token` query parameter.
    fn default() -> Self {
        Self::new(vec![
            ExtractStrategy::header("Authorization", Some("Bearer")),
            ExtractStrategy::cookie("access_token"),
            ExtractStrategy::query("access_token", None),
        ])
    }
}
