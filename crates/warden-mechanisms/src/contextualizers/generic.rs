use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use http::Method;
use serde::Deserialize;
use serde_json::Value;
use warden_core::config::{self, duration};
use warden_core::endpoint::{Endpoint, EndpointConfig};
use warden_core::{
    Error, MechanismConfig, RequestContext, Result, Subject, Template, TemplateData, fingerprint,
};

use super::Contextualizer;

const WHAT: &str = "generic contextualizer";

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct Config {
    #[serde(default)]
    endpoint: Option<EndpointConfig>,
    #[serde(default)]
    payload: Option<Template>,
    #[serde(default)]
    forward_headers: Vec<String>,
    #[serde(default)]
    forward_cookies: Vec<String>,
    #[serde(default, deserialize_with = "duration::deserialize_option")]
    cache_ttl: Option<Duration>,
    #[serde(default)]
    continue_pipeline_on_error: bool,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct Overrides {
    #[serde(default)]
    payload: Option<Template>,
    #[serde(default)]
    forward_headers: Option<Vec<String>>,
    #[serde(default)]
    forward_cookies: Option<Vec<String>>,
    #[serde(default, deserialize_with = "duration::deserialize_option")]
    cache_ttl: Option<Duration>,
    #[serde(default)]
    continue_pipeline_on_error: Option<bool>,
}

/// Calls an endpoint and stores its response under `subject.attributes[<id>]`.
///
/// JSON responses are stored as parsed values, anything else as a string.
#[derive(Debug)]
pub struct GenericContextualizer {
    id: String,
    endpoint: Arc<Endpoint>,
    payload: Option<Arc<Template>>,
    forward_headers: Arc<[String]>,
    forward_cookies: Arc<[String]>,
    cache_ttl: Duration,
    continue_on_error: bool,
}

impl GenericContextualizer {
    /// Create the contextualizer. `endpoint` is required.
    pub fn new(id: &str, config: Option<&MechanismConfig>) -> Result<Self> {
        let conf: Config = config::decode(config, WHAT)?;

        let endpoint = conf
            .endpoint
            .ok_or_else(|| Error::configuration("'endpoint' is a required field"))?
            .build(Method::POST, &[("Accept", "application/json")])?;

        Ok(Self {
            id: id.to_string(),
            endpoint: Arc::new(endpoint),
            payload: conf.payload.map(Arc::new),
            forward_headers: conf.forward_headers.into(),
            forward_cookies: conf.forward_cookies.into(),
            cache_ttl: conf.cache_ttl.unwrap_or_default(),
            continue_on_error: conf.continue_pipeline_on_error,
        })
    }

    pub(crate) fn create(
        id: &str,
        config: Option<&MechanismConfig>,
    ) -> Result<Arc<dyn Contextualizer>> {
        Ok(Arc::new(Self::new(id, config)?))
    }

    async fn fetch(&self, ctx: &RequestContext, subject: &Subject) -> Result<Value> {
        let request = ctx.request();
        let body = match &self.payload {
            Some(template) => Some(
                template
                    .render(&TemplateData::new(request, Some(subject)))?
                    .into_bytes(),
            ),
            None => None,
        };

        let mut headers: Vec<(&str, String)> = self
            .forward_headers
            .iter()
            .filter_map(|name| Some((name.as_str(), request.header(name)?.to_string())))
            .collect();
        let cookies: Vec<String> = self
            .forward_cookies
            .iter()
            .filter_map(|name| Some(format!("{name}={}", request.cookie(name)?)))
            .collect();
        if !cookies.is_empty() {
            headers.push(("Cookie", cookies.join("; ")));
        }

        let mut parts: Vec<&[u8]> = vec![
            self.endpoint.url().as_str().as_bytes(),
            subject.id.as_bytes(),
            body.as_deref().unwrap_or_default(),
        ];
        for (name, value) in &headers {
            parts.push(name.as_bytes());
            parts.push(value.as_bytes());
        }
        let key = fingerprint(parts);

        if let Some(raw) = ctx.cache().get(&key) {
            if let Ok(value) = serde_json::from_slice::<Value>(&raw) {
                tracing::debug!(id = %self.id, "Reusing contextualizer response from cache");
                return Ok(value);
            }
        }

        let extra: Vec<(&str, &str)> = headers.iter().map(|(n, v)| (*n, v.as_str())).collect();
        let response = self.endpoint.send(body, &extra).await?;
        let status = response.status();
        if !status.is_success() {
            return Err(Error::communication(format!(
                "unexpected response code: {}",
                status.as_u16()
            )));
        }

        let text = response.text().await.map_err(|e| {
            Error::communication_with_source("failed to read contextualizer response", e)
        })?;
        let value = if text.is_empty() {
            Value::Null
        } else {
            serde_json::from_str(&text).unwrap_or(Value::String(text))
        };

        if let Ok(bytes) = serde_json::to_vec(&value) {
            ctx.cache().set(&key, bytes, self.cache_ttl);
        }
        Ok(value)
    }
}

#[async_trait]
impl Contextualizer for GenericContextualizer {
    fn id(&self) -> &str {
        &self.id
    }

    async fn execute(&self, ctx: &mut RequestContext, subject: &mut Subject) -> Result<()> {
        tracing::debug!(id = %self.id, "Updating subject using generic contextualizer");

        match self.fetch(ctx, subject).await {
            Ok(value) => {
                subject.attributes.insert(self.id.clone(), value);
                Ok(())
            }
            Err(err) if self.continue_on_error => {
                tracing::warn!(id = %self.id, error = %err, "Contextualizer failed, continuing pipeline");
                Ok(())
            }
            Err(err) => Err(err),
        }
    }

    fn with_config(
        self: Arc<Self>,
        config: Option<&MechanismConfig>,
    ) -> Result<Arc<dyn Contextualizer>> {
        if config::is_empty(config) {
            return Ok(self);
        }

        let overrides: Overrides = config::decode(config, WHAT)?;
        Ok(Arc::new(Self {
            id: self.id.clone(),
            endpoint: Arc::clone(&self.endpoint),
            payload: overrides
                .payload
                .map(Arc::new)
                .or_else(|| self.payload.clone()),
            forward_headers: overrides
                .forward_headers
                .map(Into::into)
                .unwrap_or_else(|| Arc::clone(&self.forward_headers)),
            forward_cookies: overrides
                .forward_cookies
                .map(Into::into)
                .unwrap_or_else(|| Arc::clone(&self.forward_cookies)),
            cache_ttl: overrides.cache_ttl.unwrap_or(self.cache_ttl),
            continue_on_error: overrides
                .continue_pipeline_on_error
                .unwrap_or(self.continue_on_error),
        }))
    }
}
