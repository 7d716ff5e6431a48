use std::sync::Arc;

use async_trait::async_trait;
use warden_core::{MechanismConfig, RequestContext, Result, Subject};

use super::Authenticator;
use crate::ensure_no_overrides;

/// Lets every request through with an empty subject.
#[derive(Debug)]
pub struct NoopAuthenticator {
    id: String,
}

impl NoopAuthenticator {
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
impl Authenticator for NoopAuthenticator {
    fn id(&self) -> &str {
        &self.id
    }

    fn is_insecure(&self) -> bool {
        true
    }

    async fn execute(&self, _ctx: &RequestContext) -> Result<Subject> {
        tracing::debug!(id = %self.id, "Authenticating using noop authenticator");
        Ok(Subject::default())
    }

    fn with_config(
        self: Arc<Self>,
        config: Option<&MechanismConfig>,
    ) -> Result<Arc<dyn Authenticator>> {
        ensure_no_overrides(&self.id, config)?;
        Ok(self)
    }
}
