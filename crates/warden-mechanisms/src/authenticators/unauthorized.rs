use std::sync::Arc;

use async_trait::async_trait;
use warden_core::{Error, MechanismConfig, RequestContext, Result, Subject};

use super::Authenticator;
use crate::ensure_no_overrides;

/// Rejects every request.
#[derive(Debug)]
pub struct UnauthorizedAuthenticator {
    id: String,
}

impl UnauthorizedAuthenticator {
    /// Create the authenticator. It takes no configuration.
    pub fn new(id: &str, config: Option<&MechanismConfig>) -> Result<Self> {
        ensure_no_overrides(id, config)?;
        Ok(Self { id: id.to_string() })
    }

    pub(crate) fn create(
        id: &str,
        config: Option<&MechanismConfig>,
    ) -> Result<Arc<dyn Authenticator>> {
        Ok(Arc::new(Self::new(id, config)?))
    }
}

#[async_trait]
impl Authenticator for UnauthorizedAuthenticator {
    fn id(&self) -> &str {
        &self.id
    }

    async fn execute(&self, _ctx: &RequestContext) -> Result<Subject> {
        tracing::debug!(id = %self.id, "Authenticating using unauthorized authenticator");
        Err(Error::authentication(&self.id, "denied by authenticator"))
    }

    fn with_config(
        self: Arc<Self>,
        config: Option<&MechanismConfig>,
    ) -> Result<Arc<dyn Authenticator>> {
        ensure_no_overrides(&self.id, config)?;
        Ok(self)
    }
}
