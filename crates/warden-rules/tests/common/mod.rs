//! Common test utilities and harness for Warden rules integration tests.

use std::sync::Arc;

use http::Method;
use warden_core::{MemoryCache, Request};
use warden_mechanisms::{CatalogConfig, MechanismCatalog};
use warden_rules::{
    DefaultRuleConfig, Executor, Repository, RuleSet, RuleSetProcessor, compile_default_rule,
};

/// Catalog used by most tests.
pub const CATALOG: &str = r#"
authenticators:
  - id: anon
    type: anonymous
  - id: deny_all
    type: unauthorized
  - id: basic
    type: basic_auth
    config:
      user_id: alice
      password: secret
authorizers:
  - id: allow
    type: allow
  - id: deny
    type: deny
finalizers:
  - id: hdr
    type: header
    config:
      headers:
        X-User: "{{ subject.id }}"
  - id: session
    type: cookie
    config:
      cookies:
        session_user: "{{ subject.id }}"
error_handlers:
  - id: login
    type: redirect
    config:
      to: http://auth.local/login
      if: [authentication]
      return_to_query_parameter: origin
"#;

/// Test harness wiring a catalog, a repository and an executor.
pub struct TestHarness {
    /// Repository under test
    pub repository: Arc<Repository>,
    /// Executor over `repository`
    pub executor: Executor,
}

impl TestHarness {
    /// Harness over [`CATALOG`] without a default rule.
    pub fn new() -> Self {
        Self::with_catalog(CATALOG, None)
    }

    /// Harness over [`CATALOG`] with the given default rule.
    pub fn with_default_rule(yaml: &str) -> Self {
        Self::with_catalog(CATALOG, Some(yaml))
    }

    /// Harness over a custom catalog.
    pub fn with_catalog(catalog: &str, default_rule: Option<&str>) -> Self {
        let config: CatalogConfig = yaml_serde::from_str(catalog).unwrap();
        let catalog = Arc::new(MechanismCatalog::new(&config).unwrap());

        let default_rule = default_rule.map(|yaml| {
            let config: DefaultRuleConfig = yaml_serde::from_str(yaml).unwrap();
            compile_default_rule(&catalog, &config).unwrap()
        });

        let repository = Arc::new(Repository::new(catalog, default_rule));
        let executor = Executor::new(Arc::clone(&repository), Arc::new(MemoryCache::new()));
        Self {
            repository,
            executor,
        }
    }

    /// Apply `rules` as a newly created rule set from `source`.
    pub async fn apply(&self, source: &str, rules: &str) {
        let rule_set = RuleSet::decode(source, rules.as_bytes()).unwrap();
        self.repository.on_created(&rule_set).await.unwrap();
    }
}

impl Default for TestHarness {
    fn default() -> Self {
        Self::new()
    }
}

/// Request for `method` on `url`.
pub fn request(method: Method, url: &str) -> Request {
    Request::new(method, url.parse().unwrap())
}
