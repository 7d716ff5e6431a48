//! Route matching.

use glob::{MatchOptions, Pattern};
use http::Method;
use warden_core::{Error, Result};

use crate::config::MatcherConfig;

const ALL_METHODS: &str = "ALL";

const OPTIONS: MatchOptions = MatchOptions {
    case_sensitive: true,
    require_literal_separator: true,
    require_literal_leading_dot: false,
};

/// Compiled match criteria of a rule.
#[derive(Debug, Clone)]
pub struct RouteMatcher {
    patterns: Vec<Pattern>,
    methods: Vec<Method>,
}

impl RouteMatcher {
    /// Compile `config`. Invalid patterns or methods are configuration errors.
    pub fn new(config: &MatcherConfig) -> Result<Self> {
        if config.routes.is_empty() {
            return Err(Error::configuration("'match.routes' must not be empty"));
        }

        let patterns = config
            .routes
            .iter()
            .map(|route| {
                Pattern::new(&route.path).map_err(|e| {
                    Error::configuration(format!("invalid path pattern '{}': {e}", route.path))
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let mut methods = Vec::new();
        for raw in &config.methods {
            let upper = raw.trim().to_ascii_uppercase();
            if upper == ALL_METHODS {
                methods.clear();
                break;
            }
            let method = Method::from_bytes(upper.as_bytes())
                .map_err(|_| Error::configuration(format!("invalid method '{raw}'")))?;
            if !methods.contains(&method) {
                methods.push(method);
            }
        }

        Ok(Self { patterns, methods })
    }

    /// Returns `true` if any pattern matches `path`.
    pub fn matches_path(&self, path: &str) -> bool {
        self.patterns.iter().any(|p| p.matches_with(path, OPTIONS))
    }

    /// Returns `true` if `method` is allowed.
    pub fn matches_method(&self, method: &Method) -> bool {
        self.methods.is_empty() || self.methods.contains(method)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::config::RouteConfig;

    fn matcher(paths: &[&str], methods: &[&str]) -> Result<RouteMatcher> {
        RouteMatcher::new(&MatcherConfig {
            routes: paths
                .iter()
                .map(|p| RouteConfig {
                    path: p.to_string(),
                })
                .collect(),
            methods: methods.iter().map(|m| m.to_string()).collect(),
        })
    }

    #[test]
    fn test_single_star_stays_within_segment() {
        let m = matcher(&["/api/*/items"], &[]).unwrap();
        assert!(m.matches_path("/api/v1/items"));
        assert!(!m.matches_path("/api/v1/x/items"));
    }

    #[test]
    fn test_double_star_spans_segments() {
        let m = matcher(&["/api/**"], &[]).unwrap();
        assert!(m.matches_path("/api/v1/items/42"));
        assert!(!m.matches_path("/other"));
    }

    #[test]
    fn test_exact_path() {
        let m = matcher(&["/health", "/ready"], &[]).unwrap();
        assert!(m.matches_path("/ready"));
        assert!(!m.matches_path("/health/x"));
    }

    #[test]
    fn test_methods() {
        let m = matcher(&["/"], &["get", "POST"]).unwrap();
        assert!(m.matches_method(&Method::GET));
        assert!(m.matches_method(&Method::POST));
        assert!(!m.matches_method(&Method::DELETE));

        let all = matcher(&["/"], &["GET", "ALL"]).unwrap();
        assert!(all.matches_method(&Method::DELETE));

        let any = matcher(&["/"], &[]).unwrap();
        assert!(any.matches_method(&Method::PATCH));
    }

    #[test]
    fn test_invalid_config() {
        assert!(matcher(&[], &[]).is_err());
        assert!(matcher(&["/a/[b"], &[]).is_err());
        assert!(matcher(&["/"], &["GE T"]).is_err());
    }
}
