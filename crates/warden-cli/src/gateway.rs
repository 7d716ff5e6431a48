//! Explicit assembly of the decision pipeline.
//!
//! Components are built in dependency order: catalog, default rule,
//! repository, executor, providers. Nothing is started until
//! [`Gateway::start`].

use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use warden_core::{Cache, Error, MemoryCache, NoopCache, Result};
use warden_mechanisms::MechanismCatalog;
use warden_provider::ProviderSet;
use warden_rules::{Executor, Repository, RuleSetProcessor, compile_default_rule};

use crate::config::WardenConfig;

/// The assembled gateway.
#[derive(Debug)]
pub struct Gateway {
    executor: Executor,
    providers: ProviderSet,
    cache: Option<Arc<MemoryCache>>,
    purge_interval: Duration,
    cancel: CancellationToken,
    purger: Mutex<Option<JoinHandle<()>>>,
}

impl Gateway {
    /// Build every component. The first configuration error aborts.
    pub fn build(config: &WardenConfig) -> Result<Self> {
        let catalog = Arc::new(MechanismCatalog::new(&config.mechanisms)?);

        let default_rule = config
            .default_rule
            .as_ref()
            .map(|rule| compile_default_rule(&catalog, rule))
            .transpose()?;

        let repository = Arc::new(Repository::new(catalog, default_rule));

        let memory = config.cache.enabled.then(|| Arc::new(MemoryCache::new()));
        let cache: Arc<dyn Cache> = match &memory {
            Some(memory) => Arc::clone(memory) as Arc<dyn Cache>,
            None => Arc::new(NoopCache),
        };

        let executor = Executor::new(Arc::clone(&repository), cache);
        let providers = ProviderSet::new(
            &config.providers,
            repository as Arc<dyn RuleSetProcessor>,
        )?;

        tracing::info!(
            providers = providers.len(),
            default_rule = config.default_rule.is_some(),
            cache = config.cache.enabled,
            "Gateway assembled"
        );

        Ok(Self {
            executor,
            providers,
            cache: memory,
            purge_interval: config.cache.purge_interval,
            cancel: CancellationToken::new(),
            purger: Mutex::new(None),
        })
    }

    /// Executor answering decision requests.
    pub fn executor(&self) -> &Executor {
        &self.executor
    }

    /// Start the providers and the cache purger.
    pub async fn start(&self) -> Result<()> {
        self.providers.start().await?;

        let Some(cache) = self.cache.clone() else {
            return Ok(());
        };
        if self.purge_interval.is_zero() {
            return Ok(());
        }

        let mut purger = self
            .purger
            .lock()
            .map_err(|_| Error::internal("purger lock poisoned"))?;
        if purger.is_none() {
            let cancel = self.cancel.child_token();
            let period = self.purge_interval;
            *purger = Some(tokio::spawn(async move {
                let mut ticker = tokio::time::interval(period);
                ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
                loop {
                    tokio::select! {
                        _ = cancel.cancelled() => break,
                        _ = ticker.tick() => cache.purge_expired(),
                    }
                }
            }));
        }
        Ok(())
    }

    /// Stop the providers and the purger, waiting for their tasks to exit.
    pub async fn stop(&self) {
        self.providers.stop().await;
        self.cancel.cancel();

        let handle = self.purger.lock().ok().and_then(|mut p| p.take());
        if let Some(handle) = handle {
            let _ = handle.await;
        }
        tracing::info!("Gateway stopped");
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_build_reports_catalog_errors() {
        let config = WardenConfig::from_yaml(
            "mechanisms:\n  authenticators:\n    - id: x\n      type: kerberos",
        )
        .unwrap();
        let err = Gateway::build(&config).unwrap_err();
        assert!(err.to_string().contains("unsupported authenticator type 'kerberos'"));
    }

    #[test]
    fn test_build_reports_default_rule_errors() {
        let config =
            WardenConfig::from_yaml("default_rule:\n  execute:\n    - authenticator: missing")
                .unwrap();
        let err = Gateway::build(&config).unwrap_err();
        assert!(err.to_string().contains("default rule"));
    }

    #[test]
    fn test_build_reports_provider_errors() {
        let config =
            WardenConfig::from_yaml("providers:\n  http_endpoint:\n    endpoints: []").unwrap();
        let err = Gateway::build(&config).unwrap_err();
        assert!(err.to_string().contains("http_endpoint provider"));
    }

    #[tokio::test]
    async fn test_start_and_stop_without_providers() {
        let gateway = Gateway::build(&WardenConfig::default()).unwrap();
        gateway.start().await.unwrap();
        gateway.stop().await;
        assert!(gateway.executor().repository().is_empty());
    }
}
