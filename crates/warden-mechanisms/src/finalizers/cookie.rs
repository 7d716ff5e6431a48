use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use warden_core::{
    Error, MechanismConfig, RequestContext, Result, Subject, Template, TemplateData, config,
};

use super::Finalizer;

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct Config {
    #[serde(default)]
    cookies: BTreeMap<String, Template>,
}

/// Renders templated cookies for the upstream request.
#[derive(Debug)]
pub struct CookieFinalizer {
    id: String,
    cookies: Arc<BTreeMap<String, Template>>,
}

impl CookieFinalizer {
    /// Create the finalizer. At least one cookie is required.
    pub fn new(id: &str, config: Option<&MechanismConfig>) -> Result<Self> {
        Ok(Self {
            id: id.to_string(),
            cookies: Arc::new(decode(config)?),
        })
    }

    pub(crate) fn create(id: &str, config: Option<&MechanismConfig>) -> Result<Arc<dyn Finalizer>> {
        Ok(Arc::new(Self::new(id, config)?))
    }
}

fn decode(config: Option<&MechanismConfig>) -> Result<BTreeMap<String, Template>> {
    let conf: Config = config::decode(config, "cookie finalizer")?;
    if conf.cookies.is_empty() {
        return Err(Error::configuration("'cookies' is a required field"));
    }
    Ok(conf.cookies)
}

#[async_trait]
impl Finalizer for CookieFinalizer {
    fn id(&self) -> &str {
        &self.id
    }

    async fn execute(&self, ctx: &mut RequestContext, subject: &Subject) -> Result<()> {
        tracing::debug!(id = %self.id, "Finalizing using cookie finalizer");

        let rendered = {
            let data = TemplateData::new(ctx.request(), Some(subject));
            self.cookies
                .iter()
                .map(|(name, template)| Ok((name.clone(), template.render(&data)?)))
                .collect::<Result<Vec<_>>>()?
        };

        for (name, value) in rendered {
            ctx.add_cookie_for_upstream(name, value);
        }
        Ok(())
    }

    fn with_config(
        self: Arc<Self>,
        config: Option<&MechanismConfig>,
    ) -> Result<Arc<dyn Finalizer>> {
        if config::is_empty(config) {
            return Ok(self);
        }
        Ok(Arc::new(Self {
            id: self.id.clone(),
            cookies: Arc::new(decode(config)?),
        }))
    }
}
