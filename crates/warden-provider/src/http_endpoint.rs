//! Rule sets served by HTTP endpoints.
//!
//! ```yaml
//! http_endpoint:
//!   watch_interval: 1m
//!   enforce_tls: true
//!   endpoints:
//!     - url: https://rules.local/rule-set
//!       http_cache:
//!         enabled: true
//!       retry:
//!         max_retries: 3
//!         max_delay: 1s
//! ```
//!
//! Each endpoint is its own source `http_endpoint:<url>`. A 404 or 410
//! answer means the source no longer has rules. Any other failure leaves the
//! last applied rules in place.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use http::{Method, StatusCode};
use serde::Deserialize;
use warden_core::config::duration;
use warden_core::endpoint::{AuthStrategy, RetryConfig};
use warden_core::{Endpoint, EndpointConfig, Error, Result};
use warden_rules::{RuleSet, RuleSetProcessor};

use crate::RuleSetProvider;
use crate::change::ChangeTracker;
use crate::http_cache::{Directives, HttpCache, HttpCacheConfig};
use crate::tasks::{WatchTasks, Watcher};

/// Source scheme of rule sets from this provider.
pub const SOURCE_SCHEME: &str = "http_endpoint";

/// Provider settings.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HttpEndpointProviderConfig {
    /// Poll period. Absent or zero fetches once.
    #[serde(default, deserialize_with = "duration::deserialize_option")]
    pub watch_interval: Option<Duration>,
    /// Reject endpoints not using https.
    #[serde(default)]
    pub enforce_tls: bool,
    /// Endpoints to watch.
    #[serde(default)]
    pub endpoints: Vec<RuleSetEndpointConfig>,
}

/// One rule-set endpoint.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RuleSetEndpointConfig {
    /// Endpoint URL
    #[serde(default)]
    pub url: String,
    /// HTTP method, GET by default
    #[serde(default)]
    pub method: Option<String>,
    /// Additional request headers
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
    /// Retry policy
    #[serde(default)]
    pub retry: Option<RetryConfig>,
    /// Authentication towards the endpoint
    #[serde(default)]
    pub auth: Option<AuthStrategy>,
    /// Request timeout
    #[serde(default, deserialize_with = "duration::deserialize_option")]
    pub timeout: Option<Duration>,
    /// Response caching
    #[serde(default)]
    pub http_cache: HttpCacheConfig,
}

impl RuleSetEndpointConfig {
    /// Endpoint for `url` with all defaults.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            method: None,
            headers: BTreeMap::new(),
            retry: None,
            auth: None,
            timeout: None,
            http_cache: HttpCacheConfig::default(),
        }
    }

    fn endpoint(&self) -> Result<Endpoint> {
        EndpointConfig {
            url: self.url.clone(),
            method: self.method.clone(),
            headers: self.headers.clone(),
            retry: self.retry.clone(),
            auth: self.auth.clone(),
            timeout: self.timeout,
        }
        .build(
            Method::GET,
            &[("Accept", "application/yaml, application/json")],
        )
    }
}

/// Watches a set of HTTP endpoints.
#[derive(Debug)]
pub struct HttpEndpointProvider {
    interval: Option<Duration>,
    processor: Arc<dyn RuleSetProcessor>,
    pending: Mutex<Vec<EndpointWatcher>>,
    tasks: WatchTasks,
}

impl HttpEndpointProvider {
    /// Validate `config` and prepare one watcher per endpoint.
    pub fn new(
        config: &HttpEndpointProviderConfig,
        processor: Arc<dyn RuleSetProcessor>,
    ) -> Result<Self> {
        if config.endpoints.is_empty() {
            return Err(Error::configuration("'endpoints' is a required field"));
        }

        let watchers = config
            .endpoints
            .iter()
            .enumerate()
            .map(|(idx, endpoint)| {
                let context = || format!("'endpoints'[{idx}]");
                if endpoint.url.trim().is_empty() {
                    return Err(Error::configuration(format!(
                        "{}.'url' is a required field",
                        context()
                    )));
                }
                if config.enforce_tls && !endpoint.url.starts_with("https://") {
                    return Err(Error::configuration(format!(
                        "{}.'url' scheme must be https",
                        context()
                    )));
                }
                EndpointWatcher::new(endpoint).map_err(|e| e.with_context(context()))
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            interval: config.watch_interval,
            processor,
            pending: Mutex::new(watchers),
            tasks: WatchTasks::new(),
        })
    }
}

#[async_trait]
impl RuleSetProvider for HttpEndpointProvider {
    fn name(&self) -> &'static str {
        SOURCE_SCHEME
    }

    fn start(&self) -> Result<()> {
        let watchers = std::mem::take(
            &mut *self
                .pending
                .lock()
                .map_err(|_| Error::internal("http endpoint provider state poisoned"))?,
        );
        if watchers.is_empty() {
            return Err(Error::internal("http endpoint provider already started"));
        }

        tracing::info!(
            endpoints = watchers.len(),
            interval = ?self.interval,
            "Starting http endpoint rule set provider"
        );
        for watcher in watchers {
            self.tasks
                .spawn(watcher, self.interval, Arc::clone(&self.processor))?;
        }
        Ok(())
    }

    async fn stop(&self) {
        tracing::info!("Stopping http endpoint rule set provider");
        self.tasks.stop().await;
    }
}

#[derive(Debug)]
struct EndpointWatcher {
    source: String,
    endpoint: Endpoint,
    cache: HttpCache,
    tracker: ChangeTracker,
}

impl EndpointWatcher {
    fn new(config: &RuleSetEndpointConfig) -> Result<Self> {
        Ok(Self {
            source: format!("{SOURCE_SCHEME}:{}", config.url),
            endpoint: config.endpoint()?,
            cache: HttpCache::new(&config.http_cache),
            tracker: ChangeTracker::new(),
        })
    }

    async fn fetch(&mut self) -> Result<RuleSet> {
        if let Some(body) = self.cache.fresh(Utc::now()) {
            return RuleSet::decode(&self.source, body);
        }

        let validators = self.cache.validators();
        let conditional: Vec<(&str, &str)> = validators
            .iter()
            .map(|(name, value)| (*name, value.as_str()))
            .collect();

        let response = self.endpoint.send(None, &conditional).await?;
        let status = response.status();
        let directives = Directives::parse(response.headers(), Utc::now());

        match status {
            StatusCode::NOT_MODIFIED => {
                let body = self.cache.revalidated(directives).ok_or_else(|| {
                    Error::communication("received 304 without a cached rule set")
                })?;
                RuleSet::decode(&self.source, &body)
            }
            StatusCode::NOT_FOUND | StatusCode::GONE => {
                self.cache.clear();
                Ok(RuleSet::empty(self.source.as_str()))
            }
            status if status.is_success() => {
                let body = response.bytes().await.map_err(|e| {
                    Error::communication_with_source("failed to read rule set response", e)
                })?;
                let rule_set = RuleSet::decode(&self.source, &body)?;
                self.cache.store(&body, directives);
                Ok(rule_set)
            }
            status => Err(Error::communication(format!(
                "unexpected response code: {}",
                status.as_u16()
            ))),
        }
    }
}

#[async_trait]
impl Watcher for EndpointWatcher {
    fn name(&self) -> &str {
        &self.source
    }

    async fn tick(&mut self, processor: &dyn RuleSetProcessor) {
        match self.fetch().await {
            Ok(rule_set) => {
                self.tracker.apply(processor, rule_set).await;
            }
            Err(err) => {
                tracing::warn!(source = %self.source, error = %err, "Failed to fetch rule set");
            }
        }
    }
}
