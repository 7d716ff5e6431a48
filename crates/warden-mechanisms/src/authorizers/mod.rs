//! Authorizers decide whether the established subject may proceed.

mod allow;
mod deny;
mod remote;

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use warden_core::{MechanismConfig, RequestContext, Result, Subject};

pub use allow::AllowAuthorizer;
pub use deny::DenyAuthorizer;
pub use remote::RemoteAuthorizer;

/// Grants or denies access for a subject.
#[async_trait]
pub trait Authorizer: Send + Sync + fmt::Debug {
    /// Catalog id of this mechanism.
    fn id(&self) -> &str;

    /// Authorize `subject`. Denials are authorization errors.
    async fn execute(&self, ctx: &mut RequestContext, subject: &Subject) -> Result<()>;

    /// Derive a rule-specific instance. An empty override returns `self`.
    fn with_config(self: Arc<Self>, config: Option<&MechanismConfig>)
    -> Result<Arc<dyn Authorizer>>;
}

/// Builds an authorizer prototype from its id and configuration.
pub type AuthorizerFactory =
    fn(id: &str, config: Option<&MechanismConfig>) -> Result<Arc<dyn Authorizer>>;

/// Registered authorizer types.
pub(crate) const TYPES: &[(&str, AuthorizerFactory)] = &[
    ("allow", AllowAuthorizer::create),
    ("deny", DenyAuthorizer::create),
    ("remote", RemoteAuthorizer::create),
];
