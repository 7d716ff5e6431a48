//! Outbound HTTP endpoints used by mechanisms and rule-set providers.
//!
//! An [`EndpointConfig`] is the declarative form found in configuration
//! documents; [`EndpointConfig::build`] validates it and produces an
//! [`Endpoint`] holding a ready HTTP client.

use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

use backon::{ExponentialBuilder, Retryable};
use http::Method;
use reqwest::{RequestBuilder, Response, Url};
use serde::Deserialize;

use crate::config::duration;
use crate::{Error, Result};

/// Default timeout for a single outbound request.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Declarative endpoint settings.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EndpointConfig {
    /// Target URL.
    pub url: String,
    /// HTTP method. Defaults depend on the consumer.
    #[serde(default)]
    pub method: Option<String>,
    /// Headers sent with every request.
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
    /// Retry policy. Absent means no retries.
    #[serde(default)]
    pub retry: Option<RetryConfig>,
    /// Authentication towards the endpoint.
    #[serde(default)]
    pub auth: Option<AuthStrategy>,
    /// Per-request timeout.
    #[serde(default, deserialize_with = "duration::deserialize_option")]
    pub timeout: Option<Duration>,
}

impl EndpointConfig {
    /// Endpoint config for `url` with all defaults.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            method: None,
            headers: BTreeMap::new(),
            retry: None,
            auth: None,
            timeout: None,
        }
    }

    /// Validate and build the endpoint.
    ///
    /// `default_method` applies when no method is configured; `default_headers`
    /// are added unless the configuration sets the same header.
    pub fn build(&self, default_method: Method, default_headers: &[(&str, &str)]) -> Result<Endpoint> {
        if self.url.trim().is_empty() {
            return Err(Error::configuration("'url' is a required field"));
        }

        let url = Url::parse(&self.url)
            .map_err(|e| Error::configuration(format!("invalid endpoint url '{}': {e}", self.url)))?;

        let method = match &self.method {
            Some(m) => Method::from_bytes(m.to_ascii_uppercase().as_bytes())
                .map_err(|_| Error::configuration(format!("invalid endpoint method '{m}'")))?,
            None => default_method,
        };

        let mut headers = self.headers.clone();
        for (name, value) in default_headers {
            let present = headers.keys().any(|k| k.eq_ignore_ascii_case(name));
            if !present {
                headers.insert((*name).to_string(), (*value).to_string());
            }
        }

        let timeout = self.timeout.unwrap_or(DEFAULT_TIMEOUT);
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::internal_with_source("failed creating HTTP client", e))?;

        Ok(Endpoint {
            url,
            method,
            headers,
            retry: self.retry.clone(),
            auth: self.auth.clone(),
            timeout,
            client,
        })
    }
}

/// Retry policy with exponential backoff.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RetryConfig {
    /// Maximum number of retries after the first attempt.
    #[serde(default = "default_max_retries")]
    pub max_retries: usize,
    /// Upper bound of the delay between two attempts.
    #[serde(
        default = "default_max_delay",
        deserialize_with = "duration::deserialize"
    )]
    pub max_delay: Duration,
}

fn default_max_retries() -> usize {
    3
}

fn default_max_delay() -> Duration {
    Duration::from_secs(1)
}

impl RetryConfig {
    fn backoff(&self) -> ExponentialBuilder {
        ExponentialBuilder::default()
            .with_min_delay(Duration::from_millis(50))
            .with_max_delay(self.max_delay)
            .with_max_times(self.max_retries)
            .with_jitter()
    }
}

/// How to authenticate towards an endpoint.
#[derive(Clone, PartialEq, Deserialize)]
#[serde(tag = "type", content = "config", rename_all = "snake_case")]
pub enum AuthStrategy {
    /// HTTP basic authentication.
    BasicAuth {
        /// User name
        user: String,
        /// Password
        password: String,
    },
    /// A static API key.
    ApiKey {
        /// Where the key is placed
        #[serde(rename = "in")]
        location: ApiKeyLocation,
        /// Header, cookie or query parameter name
        name: String,
        /// Key value
        value: String,
    },
}

impl fmt::Debug for AuthStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Secrets stay out of logs.
        match self {
            Self::BasicAuth { user, .. } => f
                .debug_struct("BasicAuth")
                .field("user", user)
                .finish_non_exhaustive(),
            Self::ApiKey { location, name, .. } => f
                .debug_struct("ApiKey")
                .field("location", location)
                .field("name", name)
                .finish_non_exhaustive(),
        }
    }
}

/// Placement of an API key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApiKeyLocation {
    /// Request header
    Header,
    /// Cookie
    Cookie,
    /// Query parameter
    Query,
}

/// A validated outbound endpoint.
#[derive(Debug, Clone)]
pub struct Endpoint {
    url: Url,
    method: Method,
    headers: BTreeMap<String, String>,
    retry: Option<RetryConfig>,
    auth: Option<AuthStrategy>,
    timeout: Duration,
    client: reqwest::Client,
}

impl PartialEq for Endpoint {
    fn eq(&self, other: &Self) -> bool {
        self.url == other.url
            && self.method == other.method
            && self.headers == other.headers
            && self.retry == other.retry
            && self.auth == other.auth
            && self.timeout == other.timeout
    }
}

impl Endpoint {
    /// Target URL.
    pub fn url(&self) -> &Url {
        &self.url
    }

    /// HTTP method.
    pub fn method(&self) -> &Method {
        &self.method
    }

    /// Configured headers, defaults included.
    pub fn headers(&self) -> &BTreeMap<String, String> {
        &self.headers
    }

    /// Retry policy, if any.
    pub fn retry(&self) -> Option<&RetryConfig> {
        self.retry.as_ref()
    }

    /// Per-request timeout.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Send a request, retrying transient failures when a policy is set.
    ///
    /// Transport failures become communication errors. With a retry policy
    /// 5xx responses are retried and surface as communication errors once
    /// retries are exhausted; any other status is returned to the caller.
    pub async fn send(&self, body: Option<Vec<u8>>, extra_headers: &[(&str, &str)]) -> Result<Response> {
        let body = &body;
        let attempt = || async move {
            let response = self
                .request(body.clone(), extra_headers)
                .send()
                .await
                .map_err(|e| {
                    Error::communication_with_source(format!("request to {} failed", self.url), e)
                })?;

            if self.retry.is_some() && response.status().is_server_error() {
                return Err(Error::communication(format!(
                    "{} responded with {}",
                    self.url,
                    response.status()
                )));
            }

            Ok(response)
        };

        match &self.retry {
            None => attempt().await,
            Some(retry) => {
                attempt
                    .retry(retry.backoff())
                    .when(Error::is_retryable)
                    .notify(|err: &Error, delay: Duration| {
                        tracing::debug!(url = %self.url, error = %err, ?delay, "Retrying request");
                    })
                    .await
            }
        }
    }

    fn request(&self, body: Option<Vec<u8>>, extra_headers: &[(&str, &str)]) -> RequestBuilder {
        let mut builder = self.client.request(self.method.clone(), self.url.clone());

        for (name, value) in &self.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        for (name, value) in extra_headers {
            builder = builder.header(*name, *value);
        }

        builder = match &self.auth {
            Some(AuthStrategy::BasicAuth { user, password }) => builder.basic_auth(user, Some(password)),
            Some(AuthStrategy::ApiKey {
                location,
                name,
                value,
            }) => match location {
                ApiKeyLocation::Header => builder.header(name.as_str(), value.as_str()),
                ApiKeyLocation::Cookie => {
                    builder.header(http::header::COOKIE, format!("{name}={value}"))
                }
                ApiKeyLocation::Query => builder.query(&[(name, value)]),
            },
            None => builder,
        };

        match body {
            Some(body) => builder.body(body),
            None => builder,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use wiremock::matchers::{header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn test_build_applies_defaults() {
        let endpoint = EndpointConfig::new("http://foo.local/introspect")
            .build(Method::POST, &[("Accept", "application/json")])
            .unwrap();
        assert_eq!(endpoint.method(), &Method::POST);
        assert_eq!(endpoint.headers().get("Accept").unwrap(), "application/json");
        assert_eq!(endpoint.timeout(), DEFAULT_TIMEOUT);
        assert!(endpoint.retry().is_none());
    }

    #[test]
    fn test_configured_header_wins_over_default() {
        let mut config = EndpointConfig::new("http://foo.local/");
        config.headers.insert("accept".into(), "text/plain".into());
        let endpoint = config.build(Method::GET, &[("Accept", "application/json")]).unwrap();
        assert_eq!(endpoint.headers().len(), 1);
        assert_eq!(endpoint.headers().get("accept").unwrap(), "text/plain");
    }

    #[test]
    fn test_build_rejects_missing_or_invalid_url() {
        let err = EndpointConfig::new("").build(Method::GET, &[]).unwrap_err();
        assert!(err.to_string().contains("'url' is a required field"));
        assert!(EndpointConfig::new("not a url").build(Method::GET, &[]).is_err());
    }

    #[test]
    fn test_decode_from_yaml() {
        let config: EndpointConfig = yaml_serde::from_str(
            r#"
url: http://foo.local/
method: put
timeout: 2s
retry:
  max_retries: 2
  max_delay: 100ms
auth:
  type: api_key
  config:
    in: header
    name: X-Api-Key
    value: secret
"#,
        )
        .unwrap();

        let endpoint = config.build(Method::GET, &[]).unwrap();
        assert_eq!(endpoint.method(), &Method::PUT);
        assert_eq!(endpoint.timeout(), Duration::from_secs(2));
        assert_eq!(endpoint.retry().unwrap().max_retries, 2);
        assert!(!format!("{:?}", endpoint).contains("secret"));
    }

    #[test]
    fn test_decode_rejects_unknown_field() {
        assert!(yaml_serde::from_str::<EndpointConfig>("url: http://foo\nfoo: bar").is_err());
    }

    #[tokio::test]
    async fn test_send_with_api_key_in_query() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/keys"))
            .and(query_param("key", "secret"))
            .and(header("x-extra", "1"))
            .respond_with(ResponseTemplate::new(200).set_body_string("ok"))
            .expect(1)
            .mount(&server)
            .await;

        let mut config = EndpointConfig::new(format!("{}/keys", server.uri()));
        config.auth = Some(AuthStrategy::ApiKey {
            location: ApiKeyLocation::Query,
            name: "key".into(),
            value: "secret".into(),
        });
        let endpoint = config.build(Method::GET, &[]).unwrap();

        let response = endpoint.send(None, &[("x-extra", "1")]).await.unwrap();
        assert_eq!(response.status(), 200);
    }

    #[tokio::test]
    async fn test_send_retries_server_errors() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .expect(3)
            .mount(&server)
            .await;

        let mut config = EndpointConfig::new(server.uri());
        config.retry = Some(RetryConfig {
            max_retries: 2,
            max_delay: Duration::from_millis(10),
        });
        let endpoint = config.build(Method::GET, &[]).unwrap();

        let err = endpoint.send(None, &[]).await.unwrap_err();
        assert!(err.is_retryable());
        assert!(err.to_string().contains("503"));
    }

    #[tokio::test]
    async fn test_send_without_retry_returns_status() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(500))
            .expect(1)
            .mount(&server)
            .await;

        let endpoint = EndpointConfig::new(server.uri()).build(Method::GET, &[]).unwrap();
        let response = endpoint.send(None, &[]).await.unwrap();
        assert_eq!(response.status(), 500);
    }

    #[tokio::test]
    async fn test_send_transport_failure_is_communication_error() {
        let mut config = EndpointConfig::new("http://127.0.0.1:9/unreachable");
        config.timeout = Some(Duration::from_millis(200));
        let endpoint = config.build(Method::GET, &[]).unwrap();
        let err = endpoint.send(None, &[]).await.unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::Communication);
    }
}
