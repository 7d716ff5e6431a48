use std::sync::Arc;

use async_trait::async_trait;
use warden_core::{MechanismConfig, RequestContext, Result, Subject};

use super::Finalizer;
use crate::ensure_no_overrides;

/// Leaves the upstream request untouched.
#[derive(Debug)]
pub struct NoopFinalizer {
    id: String,
}

impl NoopFinalizer {
    /// Create the finalizer. It takes no configuration.
    pub fn new(id: &str, config: Option<&MechanismConfig>) -> Result<Self> {
        ensure_no_overrides(id, config)?;
        Ok(Self { id: id.to_string() })
    }

    pub(crate) fn create(id: &str, config: Option<&MechanismConfig>) -> Result<Arc<dyn Finalizer>> {
        Ok(Arc::new(Self::new(id, config)?))
    }
}

#[async_trait]
impl Finalizer for NoopFinalizer {
    fn id(&self) -> &str {
        &self.id
    }

    async fn execute(&self, _ctx: &mut RequestContext, _subject: &Subject) -> Result<()> {
        tracing::debug!(id = %self.id, "Finalizing using noop finalizer");
        Ok(())
    }

    fn with_config(
        self: Arc<Self>,
        config: Option<&MechanismConfig>,
    ) -> Result<Arc<dyn Finalizer>> {
        ensure_no_overrides(&self.id, config)?;
        Ok(self)
    }
}
