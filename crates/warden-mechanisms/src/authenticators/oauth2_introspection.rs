use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use http::Method;
use serde::Deserialize;
use serde_json::Value;
use warden_core::config::{self, duration};
use warden_core::endpoint::{Endpoint, EndpointConfig};
use warden_core::{Error, MechanismConfig, RequestContext, Result, Subject, fingerprint};

use super::{Authenticator, SubjectInfo};
use crate::extractors::CompositeExtractStrategy;
use crate::oauth2::{Expectation, IntrospectionResponse};
use crate::session::DEFAULT_LEEWAY;

const WHAT: &str = "oauth2_introspection authenticator";

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct Config {
    #[serde(default)]
    introspection_endpoint: Option<EndpointConfig>,
    #[serde(default)]
    assertions: Option<Expectation>,
    #[serde(default)]
    subject: Option<SubjectInfo>,
    #[serde(default)]
    token_source: Option<CompositeExtractStrategy>,
    #[serde(default, deserialize_with = "duration::deserialize_option")]
    cache_ttl: Option<Duration>,
}

/// The per-rule overridable subset.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct Overrides {
    #[serde(default)]
    assertions: Option<Expectation>,
    #[serde(default, deserialize_with = "duration::deserialize_option")]
    cache_ttl: Option<Duration>,
}

/// Validates opaque access tokens via an RFC 7662 introspection endpoint.
///
/// Endpoint, token source and subject factory are fixed at prototype time.
/// Assertions and the cache TTL can be overridden per rule; everything else
/// is shared with the prototype.
#[derive(Debug)]
pub struct OAuth2IntrospectionAuthenticator {
    id: String,
    endpoint: Arc<Endpoint>,
    expectation: Arc<Expectation>,
    subject_info: Arc<SubjectInfo>,
    token_source: Arc<CompositeExtractStrategy>,
    cache_ttl: Option<Duration>,
}

impl OAuth2IntrospectionAuthenticator {
    /// Create the prototype.
    ///
    /// `introspection_endpoint` and `assertions.issuers` are required.
    pub fn new(id: &str, config: Option<&MechanismConfig>) -> Result<Self> {
        let conf: Config = config::decode(config, WHAT)?;

        let endpoint = conf
            .introspection_endpoint
            .ok_or_else(|| Error::configuration("'introspection_endpoint' is a required field"))?
            .build(
                Method::POST,
                &[
                    ("Content-Type", "application/x-www-form-urlencoded"),
                    ("Accept", "application/json"),
                ],
            )?;

        let expectation = conf
            .assertions
            .filter(|a| !a.issuers.is_empty())
            .ok_or_else(|| Error::configuration("'assertions.issuers' is a required field"))?;

        Ok(Self {
            id: id.to_string(),
            endpoint: Arc::new(endpoint),
            expectation: Arc::new(expectation),
            subject_info: Arc::new(conf.subject.unwrap_or_default()),
            token_source: Arc::new(conf.token_source.unwrap_or_default()),
            cache_ttl: conf.cache_ttl,
        })
    }

    pub(crate) fn create(
        id: &str,
        config: Option<&MechanismConfig>,
    ) -> Result<Arc<dyn Authenticator>> {
        Ok(Arc::new(Self::new(id, config)?))
    }

    /// Derive an instance with `config` applied on top of this one.
    pub fn configure(&self, config: Option<&MechanismConfig>) -> Result<Self> {
        let overrides: Overrides = config::decode(config, WHAT)?;

        Ok(Self {
            id: self.id.clone(),
            endpoint: Arc::clone(&self.endpoint),
            expectation: match overrides.assertions {
                Some(assertions) => Arc::new(self.expectation.merge(&assertions)),
                None => Arc::clone(&self.expectation),
            },
            subject_info: Arc::clone(&self.subject_info),
            token_source: Arc::clone(&self.token_source),
            cache_ttl: overrides.cache_ttl.or(self.cache_ttl),
        })
    }

    async fn introspect(&self, token: &str) -> Result<Value> {
        let body = url::form_urlencoded::Serializer::new(String::new())
            .append_pair("token", token)
            .append_pair("token_type_hint", "access_token")
            .finish();

        let response = self.endpoint.send(Some(body.into_bytes()), &[]).await?;
        let status = response.status();
        if !status.is_success() {
            return Err(Error::communication(format!(
                "unexpected response code: {}",
                status.as_u16()
            )));
        }

        response.json::<Value>().await.map_err(|e| {
            Error::communication_with_source("failed to decode introspection response", e)
        })
    }

    /// Configured TTL, capped by the token's remaining lifetime.
    fn cache_ttl_for(&self, response: &IntrospectionResponse, now: i64) -> Duration {
        let leeway = i64::try_from(DEFAULT_LEEWAY.as_secs()).unwrap_or_default();
        let remaining = response
            .exp
            .map(|exp| Duration::from_secs(u64::try_from(exp - now - leeway).unwrap_or(0)));

        match (self.cache_ttl, remaining) {
            (Some(ttl), Some(remaining)) => ttl.min(remaining),
            (Some(ttl), None) => ttl,
            (None, Some(remaining)) => remaining,
            (None, None) => Duration::ZERO,
        }
    }
}

#[async_trait]
impl Authenticator for OAuth2IntrospectionAuthenticator {
    fn id(&self) -> &str {
        &self.id
    }

    async fn execute(&self, ctx: &RequestContext) -> Result<Subject> {
        tracing::debug!(id = %self.id, "Authenticating using oauth2_introspection authenticator");

        let token = self
            .token_source
            .extract(ctx.request())
            .map_err(|e| Error::authentication_with_source(&self.id, "no access token present", e))?;

        let key = fingerprint([self.endpoint.url().as_str(), token.as_str()]);
        let cached = ctx
            .cache()
            .get(&key)
            .and_then(|raw| serde_json::from_slice::<Value>(&raw).ok());

        let (raw, from_cache) = match cached {
            Some(raw) => {
                tracing::debug!(id = %self.id, "Reusing introspection response from cache");
                (raw, true)
            }
            None => {
                let raw = self.introspect(&token).await.map_err(|e| {
                    Error::authentication_with_source(&self.id, "token introspection failed", e)
                })?;
                (raw, false)
            }
        };

        let response: IntrospectionResponse =
            serde_json::from_value(raw.clone()).map_err(|e| {
                Error::authentication_with_source(
                    &self.id,
                    "received introspection response is malformed",
                    Error::internal_with_source("decoding failed", e),
                )
            })?;

        response.validate(&self.expectation).map_err(|e| {
            Error::authentication(&self.id, format!("access token validation failed: {e}"))
        })?;

        if !from_cache {
            let ttl = self.cache_ttl_for(&response, chrono::Utc::now().timestamp());
            if let Ok(bytes) = serde_json::to_vec(&raw) {
                ctx.cache().set(&key, bytes, ttl);
            }
        }

        self.subject_info.create_subject(&raw).map_err(|e| {
            Error::authentication_with_source(&self.id, "failed to create subject", e)
        })
    }

    fn with_config(
        self: Arc<Self>,
        config: Option<&MechanismConfig>,
    ) -> Result<Arc<dyn Authenticator>> {
        if config::is_empty(config) {
            return Ok(self);
        }
        Ok(Arc::new(self.configure(config)?))
    }
}
