//! Authenticators establish the subject of a request.
//!
//! A rule lists one or more authenticators; the first one that succeeds
//! wins. Insecure authenticators never fail and assert no real identity.

mod anonymous;
mod basic_auth;
mod noop;
mod oauth2_introspection;
mod subject_info;
mod unauthorized;

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use warden_core::{MechanismConfig, RequestContext, Result, Subject};

pub use anonymous::AnonymousAuthenticator;
pub use basic_auth::BasicAuthAuthenticator;
pub use noop::NoopAuthenticator;
pub use oauth2_introspection::OAuth2IntrospectionAuthenticator;
pub use subject_info::SubjectInfo;
pub use unauthorized::UnauthorizedAuthenticator;

/// Establishes the subject of a request.
#[async_trait]
pub trait Authenticator: Send + Sync + fmt::Debug {
    /// Catalog id of this mechanism.
    fn id(&self) -> &str;

    /// Returns `true` for pass-through authenticators that assert no identity.
    fn is_insecure(&self) -> bool {
        false
    }

    /// Authenticate the request.
    async fn execute(&self, ctx: &RequestContext) -> Result<Subject>;

    /// Derive a rule-specific instance. An empty override returns `self`.
    fn with_config(
        self: Arc<Self>,
        config: Option<&MechanismConfig>,
    ) -> Result<Arc<dyn Authenticator>>;
}

/// Builds an authenticator prototype from its id and configuration.
pub type AuthenticatorFactory =
    fn(id: &str, config: Option<&MechanismConfig>) -> Result<Arc<dyn Authenticator>>;

/// Registered authenticator types.
pub(crate) const TYPES: &[(&str, AuthenticatorFactory)] = &[
    ("noop", NoopAuthenticator::create),
    ("anonymous", AnonymousAuthenticator::create),
    ("unauthorized", UnauthorizedAuthenticator::create),
    ("basic_auth", BasicAuthAuthenticator::create),
    ("oauth2_introspection", OAuth2IntrospectionAuthenticator::create),
];
