//! The live rule repository.
//!
//! Readers load an immutable snapshot through [`ArcSwap`] and never block.
//! Writers compile outside any lock, then publish a new snapshot under a
//! short write lock, so concurrent writers cannot lose each other's changes.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use arc_swap::ArcSwap;
use async_trait::async_trait;
use http::Method;
use warden_core::{Error, Result};
use warden_mechanisms::{ErrorHandler, MechanismCatalog};

use crate::compiler::{DEFAULT_RULE_ID, compile_rule_set};
use crate::config::RuleSet;
use crate::processor::RuleSetProcessor;
use crate::rule::Rule;

#[derive(Debug, Default)]
struct Snapshot {
    /// Compiled rules per source, in the order sources first appeared
    sources: Vec<(String, Arc<[Arc<Rule>]>)>,
}

impl Snapshot {
    fn rules(&self) -> impl Iterator<Item = &Arc<Rule>> {
        self.sources.iter().flat_map(|(_, rules)| rules.iter())
    }

    fn with_source(&self, source: &str, rules: Arc<[Arc<Rule>]>) -> Self {
        let mut sources = self.sources.clone();
        match sources.iter_mut().find(|(s, _)| s == source) {
            Some(entry) => entry.1 = rules,
            None => sources.push((source.to_string(), rules)),
        }
        Self { sources }
    }

    fn without_source(&self, source: &str) -> Self {
        Self {
            sources: self
                .sources
                .iter()
                .filter(|(s, _)| s != source)
                .cloned()
                .collect(),
        }
    }
}

/// Compiled rules from every source, plus the optional default rule.
#[derive(Debug)]
pub struct Repository {
    catalog: Arc<MechanismCatalog>,
    snapshot: ArcSwap<Snapshot>,
    write_lock: Mutex<()>,
    default_rule: Option<Arc<Rule>>,
}

impl Repository {
    /// Empty repository resolving mechanisms from `catalog`.
    pub fn new(catalog: Arc<MechanismCatalog>, default_rule: Option<Rule>) -> Self {
        Self {
            catalog,
            snapshot: ArcSwap::from_pointee(Snapshot::default()),
            write_lock: Mutex::new(()),
            default_rule: default_rule.map(Arc::new),
        }
    }

    /// Catalog rules are compiled against.
    pub fn catalog(&self) -> &MechanismCatalog {
        &self.catalog
    }

    /// Handler used when a rule has no error handler for a failure.
    pub fn fallback_error_handler(&self) -> Arc<dyn ErrorHandler> {
        self.catalog.fallback_error_handler()
    }

    /// Find the rule responsible for `method` and `path`.
    ///
    /// Rules are tried in source order, then declared order. If some rule
    /// matches the path but none allows the method, the request is rejected
    /// rather than handed to the default rule.
    pub fn find_rule(&self, method: &Method, path: &str) -> Result<Arc<Rule>> {
        let snapshot = self.snapshot.load();
        let mut path_matched = false;

        for rule in snapshot.rules() {
            if !rule.matches_path(path) {
                continue;
            }
            if rule.matches_method(method) {
                return Ok(Arc::clone(rule));
            }
            path_matched = true;
        }

        if path_matched {
            return Err(Error::MethodNotAllowed {
                method: method.to_string(),
                path: path.to_string(),
            });
        }

        self.default_rule.clone().ok_or_else(|| Error::NoRule {
            method: method.to_string(),
            path: path.to_string(),
        })
    }

    /// Ids of all rules in lookup order.
    pub fn rule_ids(&self) -> Vec<String> {
        self.snapshot
            .load()
            .rules()
            .map(|r| r.id().to_string())
            .collect()
    }

    /// Number of rules from all sources.
    pub fn len(&self) -> usize {
        self.snapshot.load().rules().count()
    }

    /// Returns `true` if no source contributed rules.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Compile `rule_set` and publish it, replacing whatever `source` had.
    pub fn upsert(&self, rule_set: &RuleSet) -> Result<()> {
        let compiled: Arc<[Arc<Rule>]> = compile_rule_set(&self.catalog, rule_set)?
            .into_iter()
            .map(Arc::new)
            .collect();

        let _guard = self.lock()?;
        let current = self.snapshot.load();

        let mut other_ids: HashSet<&str> = current
            .sources
            .iter()
            .filter(|(s, _)| *s != rule_set.source)
            .flat_map(|(_, rules)| rules.iter().map(|r| r.id()))
            .collect();
        if self.default_rule.is_some() {
            other_ids.insert(DEFAULT_RULE_ID);
        }
        if let Some(clash) = compiled.iter().find(|r| other_ids.contains(r.id())) {
            return Err(Error::configuration(format!(
                "rule '{}' from {} is already defined by another rule set",
                clash.id(),
                rule_set.source
            )));
        }

        let count = compiled.len();
        self.snapshot
            .store(Arc::new(current.with_source(&rule_set.source, compiled)));

        tracing::info!(
            source = %rule_set.source,
            version = %rule_set.version,
            rules = count,
            "Rule set applied"
        );
        Ok(())
    }

    /// Drop every rule owned by `source`.
    pub fn remove(&self, source: &str) -> Result<()> {
        let _guard = self.lock()?;
        let current = self.snapshot.load();
        if current.sources.iter().all(|(s, _)| s != source) {
            tracing::debug!(source = %source, "No rules to remove");
            return Ok(());
        }

        self.snapshot.store(Arc::new(current.without_source(source)));
        tracing::info!(source = %source, "Rule set removed");
        Ok(())
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, ()>> {
        self.write_lock
            .lock()
            .map_err(|_| Error::internal("rule repository write lock poisoned"))
    }
}

#[async_trait]
impl RuleSetProcessor for Repository {
    async fn on_created(&self, rule_set: &RuleSet) -> Result<()> {
        self.upsert(rule_set)
    }

    async fn on_updated(&self, rule_set: &RuleSet) -> Result<()> {
        self.upsert(rule_set)
    }

    async fn on_deleted(&self, rule_set: &RuleSet) -> Result<()> {
        self.remove(&rule_set.source)
    }
}
