use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use warden_core::{MechanismConfig, RequestContext, Result, Subject, config};

use super::Authenticator;

const DEFAULT_SUBJECT: &str = "anonymous";

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct Config {
    #[serde(default)]
    subject: Option<String>,
}

/// Establishes a fixed subject without inspecting the request.
#[derive(Debug, PartialEq, Eq)]
pub struct AnonymousAuthenticator {
    id: String,
    subject: String,
}

impl AnonymousAuthenticator {
    /// Create the authenticator. `subject` defaults to `anonymous`.
    pub fn new(id: &str, config: Option<&MechanismConfig>) -> Result<Self> {
        let conf: Config = config::decode(config, "anonymous authenticator")?;
        Ok(Self {
            id: id.to_string(),
            subject: conf
                .subject
                .filter(|s| !s.is_empty())
                .unwrap_or_else(|| DEFAULT_SUBJECT.to_string()),
        })
    }

    pub(crate) fn create(
        id: &str,
        config: Option<&MechanismConfig>,
    ) -> Result<Arc<dyn Authenticator>> {
        Ok(Arc::new(Self::new(id, config)?))
    }
}

#[async_trait]
impl Authenticator for AnonymousAuthenticator {
    fn id(&self) -> &str {
        &self.id
    }

    fn is_insecure(&self) -> bool {
        true
    }

    async fn execute(&self, _ctx: &RequestContext) -> Result<Subject> {
        tracing::debug!(id = %self.id, "Authenticating using anonymous authenticator");
        Ok(Subject::new(&self.subject))
    }

    fn with_config(
        self: Arc<Self>,
        config: Option<&MechanismConfig>,
    ) -> Result<Arc<dyn Authenticator>> {
        if config::is_empty(config) {
            return Ok(self);
        }

        let conf: Config = config::decode(config, "anonymous authenticator")?;
        Ok(Arc::new(Self {
            id: self.id.clone(),
            subject: conf.subject.unwrap_or_else(|| self.subject.clone()),
        }))
    }
}
