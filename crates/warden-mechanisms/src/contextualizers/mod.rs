//! Contextualizers enrich the subject with data from external sources.

mod generic;

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use warden_core::{MechanismConfig, RequestContext, Result, Subject};

pub use generic::GenericContextualizer;

/// Enriches the subject.
#[async_trait]
pub trait Contextualizer: Send + Sync + fmt::Debug {
    /// Catalog id of this mechanism.
    fn id(&self) -> &str;

    /// Enrich `subject`.
    async fn execute(&self, ctx: &mut RequestContext, subject: &mut Subject) -> Result<()>;

    /// Derive a rule-specific instance. An empty override returns `self`.
    fn with_config(
        self: Arc<Self>,
        config: Option<&MechanismConfig>,
    ) -> Result<Arc<dyn Contextualizer>>;
}

/// Builds a contextualizer prototype from its id and configuration.
pub type ContextualizerFactory =
    fn(id: &str, config: Option<&MechanismConfig>) -> Result<Arc<dyn Contextualizer>>;

/// Registered contextualizer types.
pub(crate) const TYPES: &[(&str, ContextualizerFactory)] =
    &[("generic", GenericContextualizer::create)];
