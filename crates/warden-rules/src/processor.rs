//! Consumer side of rule-set change notifications.

use std::fmt;

use async_trait::async_trait;
use warden_core::Result;

use crate::config::RuleSet;

/// Receives rule-set lifecycle events from providers.
///
/// Providers call these sequentially per source. An `Err` is logged by the
/// provider and does not stop it.
#[async_trait]
pub trait RuleSetProcessor: Send + Sync + fmt::Debug {
    /// A source produced rules for the first time.
    async fn on_created(&self, rule_set: &RuleSet) -> Result<()>;

    /// A known source produced a different document.
    async fn on_updated(&self, rule_set: &RuleSet) -> Result<()>;

    /// A known source went away. Only `rule_set.source` is meaningful.
    async fn on_deleted(&self, rule_set: &RuleSet) -> Result<()>;
}
