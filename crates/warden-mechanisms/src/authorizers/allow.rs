use std::sync::Arc;

use async_trait::async_trait;
use warden_core::{MechanismConfig, RequestContext, Result, Subject};

use super::Authorizer;
use crate::ensure_no_overrides;

/// Allows every subject.
#[derive(Debug)]
pub struct AllowAuthorizer {
    id: String,
}

impl AllowAuthorizer {
    /// Create the authorizer. It takes no configuration.
    pub fn new(id: &str, config: Option<&MechanismConfig>) -> Result<Self> {
        ensure_no_overrides(id, config)?;
        Ok(Self { id: id.to_string() })
    }

    pub(crate) fn create(id: &str, config: Option<&MechanismConfig>) -> Result<Arc<dyn Authorizer>> {
        Ok(Arc::new(Self::new(id, config)?))
    }
}

#[async_trait]
impl Authorizer for AllowAuthorizer {
    fn id(&self) -> &str {
        &self.id
    }

    async fn execute(&self, _ctx: &mut RequestContext, _subject: &Subject) -> Result<()> {
        tracing::debug!(id = %self.id, "Authorizing using allow authorizer");
        Ok(())
    }

    fn with_config(
        self: Arc<Self>,
        config: Option<&MechanismConfig>,
    ) -> Result<Arc<dyn Authorizer>> {
        ensure_no_overrides(&self.id, config)?;
        Ok(self)
    }
}
