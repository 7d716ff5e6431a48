//! Finalizers produce what is actually sent to the upstream service.

mod cookie;
mod header;
mod noop;

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use warden_core::{MechanismConfig, RequestContext, Result, Subject};

pub use cookie::CookieFinalizer;
pub use header::HeaderFinalizer;
pub use noop::NoopFinalizer;

/// Applies the terminal mutation for the upstream request.
#[async_trait]
pub trait Finalizer: Send + Sync + fmt::Debug {
    /// Catalog id of this mechanism.
    fn id(&self) -> &str;

    /// Finalize the upstream request for `subject`.
    async fn execute(&self, ctx: &mut RequestContext, subject: &Subject) -> Result<()>;

    /// Derive a rule-specific instance. An empty override returns `self`.
    fn with_config(self: Arc<Self>, config: Option<&MechanismConfig>)
    -> Result<Arc<dyn Finalizer>>;
}

/// Builds a finalizer prototype from its id and configuration.
pub type FinalizerFactory =
    fn(id: &str, config: Option<&MechanismConfig>) -> Result<Arc<dyn Finalizer>>;

/// Registered finalizer types.
pub(crate) const TYPES: &[(&str, FinalizerFactory)] = &[
    ("noop", NoopFinalizer::create),
    ("header", HeaderFinalizer::create),
    ("cookie", CookieFinalizer::create),
];
