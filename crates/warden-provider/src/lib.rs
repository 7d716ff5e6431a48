//! Warden Provider — keeps the rule repository in sync with rule-set sources.
//!
//! Providers fetch rule-set documents on a schedule, detect changes per
//! source and drive a [`RuleSetProcessor`] with created, updated and deleted
//! events.
//!
//! # Modules
//!
//! - [`change`]: per-source change detection
//! - [`http_endpoint`]: HTTP endpoint provider with an HTTP response cache
//! - [`filesystem`]: file and directory provider

pub mod change;
pub mod filesystem;
mod http_cache;
pub mod http_endpoint;
mod tasks;

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod testing;

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use warden_core::Result;
use warden_rules::RuleSetProcessor;

pub use change::{Change, ChangeTracker};
pub use filesystem::{FileSystemProvider, FileSystemProviderConfig};
pub use http_cache::HttpCacheConfig;
pub use http_endpoint::{HttpEndpointProvider, HttpEndpointProviderConfig, RuleSetEndpointConfig};

/// A source of rule sets.
#[async_trait]
pub trait RuleSetProvider: Send + Sync + fmt::Debug {
    /// Provider type name.
    fn name(&self) -> &'static str;

    /// Spawn the watch tasks. Must be called within a tokio runtime.
    fn start(&self) -> Result<()>;

    /// Cancel the watch tasks and wait for them to exit.
    async fn stop(&self);
}

/// Configured providers, keyed by type.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProvidersConfig {
    /// HTTP endpoint provider
    #[serde(default)]
    pub http_endpoint: Option<HttpEndpointProviderConfig>,
    /// File system provider
    #[serde(default)]
    pub file_system: Option<FileSystemProviderConfig>,
}

/// All configured providers, started and stopped together.
#[derive(Debug, Default)]
pub struct ProviderSet {
    providers: Vec<Box<dyn RuleSetProvider>>,
}

impl ProviderSet {
    /// Build every configured provider, reporting changes to `processor`.
    pub fn new(config: &ProvidersConfig, processor: Arc<dyn RuleSetProcessor>) -> Result<Self> {
        let mut providers: Vec<Box<dyn RuleSetProvider>> = Vec::new();

        if let Some(conf) = &config.http_endpoint {
            providers.push(Box::new(
                HttpEndpointProvider::new(conf, Arc::clone(&processor))
                    .map_err(|e| e.with_context("http_endpoint provider"))?,
            ));
        }
        if let Some(conf) = &config.file_system {
            providers.push(Box::new(
                FileSystemProvider::new(conf, Arc::clone(&processor))
                    .map_err(|e| e.with_context("file_system provider"))?,
            ));
        }

        Ok(Self { providers })
    }

    /// Add a provider built elsewhere.
    pub fn with_provider(mut self, provider: Box<dyn RuleSetProvider>) -> Self {
        self.providers.push(provider);
        self
    }

    /// Number of providers.
    pub fn len(&self) -> usize {
        self.providers.len()
    }

    /// Returns `true` if no provider is configured.
    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }

    /// Start every provider. On the first failure the providers already
    /// started are stopped again before the error is returned.
    pub async fn start(&self) -> Result<()> {
        for (idx, provider) in self.providers.iter().enumerate() {
            if let Err(err) = provider.start() {
                tracing::error!(
                    provider = provider.name(),
                    error = %err,
                    "Failed to start rule set provider"
                );
                futures::future::join_all(self.providers[..idx].iter().map(|p| p.stop())).await;
                return Err(err);
            }
            tracing::debug!(provider = provider.name(), "Rule set provider started");
        }
        Ok(())
    }

    /// Stop all providers concurrently.
    pub async fn stop(&self) {
        futures::future::join_all(self.providers.iter().map(|p| p.stop())).await;
        tracing::info!(providers = self.providers.len(), "Rule set providers stopped");
    }
}
