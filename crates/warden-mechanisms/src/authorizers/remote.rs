use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use http::{Method, StatusCode};
use serde::Deserialize;
use warden_core::config::{self, duration};
use warden_core::endpoint::{Endpoint, EndpointConfig};
use warden_core::{
    Error, MechanismConfig, RequestContext, Result, Subject, Template, TemplateData, fingerprint,
};

use super::Authorizer;

const WHAT: &str = "remote authorizer";

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct Config {
    #[serde(default)]
    endpoint: Option<EndpointConfig>,
    #[serde(default)]
    payload: Option<Template>,
    #[serde(default)]
    forward_response_headers_to_upstream: Vec<String>,
    #[serde(default, deserialize_with = "duration::deserialize_option")]
    cache_ttl: Option<Duration>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct Overrides {
    #[serde(default)]
    payload: Option<Template>,
    #[serde(default)]
    forward_response_headers_to_upstream: Option<Vec<String>>,
    #[serde(default, deserialize_with = "duration::deserialize_option")]
    cache_ttl: Option<Duration>,
}

/// Asks a remote endpoint whether the subject may proceed.
///
/// The request body is the rendered `payload` template or, without one, the
/// original request body. A 2xx answer allows, 401/403 denies. Selected
/// response headers are forwarded to the upstream service.
#[derive(Debug)]
pub struct RemoteAuthorizer {
    id: String,
    endpoint: Arc<Endpoint>,
    payload: Option<Arc<Template>>,
    forward_headers: Arc<[String]>,
    cache_ttl: Duration,
}

impl RemoteAuthorizer {
    /// Create the authorizer. `endpoint` is required.
    pub fn new(id: &str, config: Option<&MechanismConfig>) -> Result<Self> {
        let conf: Config = config::decode(config, WHAT)?;

        let endpoint = conf
            .endpoint
            .ok_or_else(|| Error::configuration("'endpoint' is a required field"))?
            .build(Method::POST, &[])?;

        Ok(Self {
            id: id.to_string(),
            endpoint: Arc::new(endpoint),
            payload: conf.payload.map(Arc::new),
            forward_headers: conf.forward_response_headers_to_upstream.into(),
            cache_ttl: conf.cache_ttl.unwrap_or_default(),
        })
    }

    pub(crate) fn create(id: &str, config: Option<&MechanismConfig>) -> Result<Arc<dyn Authorizer>> {
        Ok(Arc::new(Self::new(id, config)?))
    }

    fn payload(&self, ctx: &RequestContext, subject: &Subject) -> Result<Vec<u8>> {
        match &self.payload {
            Some(template) => Ok(template
                .render(&TemplateData::new(ctx.request(), Some(subject)))?
                .into_bytes()),
            None => Ok(ctx.request().body().to_vec()),
        }
    }

    async fn authorize(&self, payload: Vec<u8>) -> Result<BTreeMap<String, String>> {
        let response = self.endpoint.send(Some(payload), &[]).await?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(Error::authorization(
                &self.id,
                "authorization denied by remote endpoint",
            ));
        }
        if !status.is_success() {
            return Err(Error::communication(format!(
                "unexpected response code: {}",
                status.as_u16()
            )));
        }

        Ok(self
            .forward_headers
            .iter()
            .filter_map(|name| {
                let value = response.headers().get(name.as_str())?.to_str().ok()?;
                Some((name.clone(), value.to_string()))
            })
            .collect())
    }
}

#[async_trait]
impl Authorizer for RemoteAuthorizer {
    fn id(&self) -> &str {
        &self.id
    }

    async fn execute(&self, ctx: &mut RequestContext, subject: &Subject) -> Result<()> {
        tracing::debug!(id = %self.id, "Authorizing using remote authorizer");

        let payload = self.payload(ctx, subject)?;
        // Rules may forward different headers from the same answer.
        let mut forwarded: Vec<&str> = self.forward_headers.iter().map(String::as_str).collect();
        forwarded.sort_unstable();
        let mut parts: Vec<&[u8]> = vec![
            self.endpoint.url().as_str().as_bytes(),
            subject.id.as_bytes(),
            payload.as_slice(),
        ];
        parts.extend(forwarded.iter().map(|name| name.as_bytes()));
        let key = fingerprint(parts);

        let cached = ctx
            .cache()
            .get(&key)
            .and_then(|raw| serde_json::from_slice::<BTreeMap<String, String>>(&raw).ok());

        let headers = match cached {
            Some(headers) => headers,
            None => {
                let headers = self.authorize(payload).await?;
                if let Ok(bytes) = serde_json::to_vec(&headers) {
                    ctx.cache().set(&key, bytes, self.cache_ttl);
                }
                headers
            }
        };

        for (name, value) in headers {
            ctx.add_header_for_upstream(name, value);
        }
        Ok(())
    }

    fn with_config(
        self: Arc<Self>,
        config: Option<&MechanismConfig>,
    ) -> Result<Arc<dyn Authorizer>> {
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
                .forward_response_headers_to_upstream
                .map(Into::into)
                .unwrap_or_else(|| Arc::clone(&self.forward_headers)),
            cache_ttl: overrides.cache_ttl.unwrap_or(self.cache_ttl),
        }))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use url::Url;
    use warden_core::{ErrorKind, MemoryCache, Request};
    use wiremock::matchers::{body_string, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn config(yaml: &str) -> MechanismConfig {
        yaml_serde::from_str(yaml).unwrap()
    }

    fn ctx(cache: Arc<MemoryCache>) -> RequestContext {
        RequestContext::new(
            Request::new(Method::POST, Url::parse("http://foo.local/items").unwrap())
                .with_body("original"),
            cache,
        )
    }

    #[test]
    fn test_endpoint_is_required() {
        let err = RemoteAuthorizer::new("remote", None).unwrap_err();
        assert!(err.to_string().contains("'endpoint' is a required field"));
    }

    #[tokio::test]
    async fn test_template_payload_and_header_forwarding() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/authz"))
            .and(body_string("alice:/items"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("X-Authz-Tier", "gold")
                    .insert_header("X-Ignored", "x"),
            )
            .expect(1)
            .mount(&server)
            .await;

        let auth = RemoteAuthorizer::new(
            "remote",
            Some(&config(&format!(
                "endpoint:\n  url: {}/authz\npayload: \"{{{{ subject.id }}}}:{{{{ request.path }}}}\"\nforward_response_headers_to_upstream: [X-Authz-Tier]\ncache_ttl: 1m",
                server.uri()
            ))),
        )
        .unwrap();

        let cache = Arc::new(MemoryCache::new());
        let mut first = ctx(cache.clone());
        auth.execute(&mut first, &Subject::new("alice")).await.unwrap();
        assert_eq!(first.upstream_headers().get("X-Authz-Tier").unwrap(), "gold");
        assert!(!first.upstream_headers().contains_key("X-Ignored"));

        // cached decision, no second call
        let mut second = ctx(cache);
        auth.execute(&mut second, &Subject::new("alice")).await.unwrap();
        assert_eq!(second.upstream_headers().get("X-Authz-Tier").unwrap(), "gold");
    }

    #[tokio::test]
    async fn test_original_body_and_denial() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(body_string("original"))
            .respond_with(ResponseTemplate::new(403))
            .expect(1)
            .mount(&server)
            .await;

        let auth = RemoteAuthorizer::new(
            "remote",
            Some(&config(&format!("endpoint:\n  url: {}", server.uri()))),
        )
        .unwrap();

        let err = auth
            .execute(&mut ctx(Arc::new(MemoryCache::new())), &Subject::new("bob"))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Authorization);
        assert_eq!(err.mechanism_id(), Some("remote"));
    }

    #[tokio::test]
    async fn test_unexpected_status_is_communication_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let auth = RemoteAuthorizer::new(
            "remote",
            Some(&config(&format!("endpoint:\n  url: {}", server.uri()))),
        )
        .unwrap();
        let err = auth
            .execute(&mut ctx(Arc::new(MemoryCache::new())), &Subject::new("bob"))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Communication);
    }

    #[tokio::test]
    async fn test_overrides_with_different_forwarded_headers_do_not_share_cache() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("X-A", "a")
                    .insert_header("X-B", "b"),
            )
            .expect(2)
            .mount(&server)
            .await;

        let proto = Arc::new(
            RemoteAuthorizer::new(
                "remote",
                Some(&config(&format!(
                    "endpoint:\n  url: {}\nforward_response_headers_to_upstream: [X-A]\ncache_ttl: 1m",
                    server.uri()
                ))),
            )
            .unwrap(),
        );
        let rule_b = proto
            .clone()
            .with_config(Some(&config("forward_response_headers_to_upstream: [X-B]")))
            .unwrap();

        let cache = Arc::new(MemoryCache::new());
        let alice = Subject::new("alice");

        let mut first = ctx(cache.clone());
        proto.execute(&mut first, &alice).await.unwrap();
        assert_eq!(first.upstream_headers().get("X-A").unwrap(), "a");
        assert!(!first.upstream_headers().contains_key("X-B"));

        let mut second = ctx(cache.clone());
        rule_b.execute(&mut second, &alice).await.unwrap();
        assert_eq!(second.upstream_headers().get("X-B").unwrap(), "b");
        assert!(!second.upstream_headers().contains_key("X-A"));

        // each rule now answers from its own cache entry
        let mut third = ctx(cache);
        rule_b.execute(&mut third, &alice).await.unwrap();
        assert_eq!(third.upstream_headers().get("X-B").unwrap(), "b");
    }

    #[test]
    fn test_override_shares_endpoint() {
        let proto = Arc::new(
            RemoteAuthorizer::new("remote", Some(&config("endpoint:\n  url: http://foo.local")))
                .unwrap(),
        );
        let endpoint = Arc::clone(&proto.endpoint);

        let configured = proto
            .clone()
            .with_config(Some(&config("forward_response_headers_to_upstream: [X-Foo]")))
            .unwrap();
        assert_eq!(configured.id(), "remote");
        assert_eq!(Arc::strong_count(&endpoint), 3);

        let proto = Arc::new(
            RemoteAuthorizer::new("remote", Some(&config("endpoint:\n  url: http://foo.local")))
                .unwrap(),
        );
        assert!(proto.with_config(Some(&config("endpoint: {}"))).is_err());
    }
}
