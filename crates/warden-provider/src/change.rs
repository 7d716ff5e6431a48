//! Change detection shared by all providers.
//!
//! A [`ChangeTracker`] remembers the last `(version, hash)` seen per source
//! and turns each freshly fetched [`RuleSet`] into at most one processor
//! callback.

use std::collections::HashMap;

use warden_rules::{RuleSet, RuleSetProcessor};

/// What a fetched rule set means for its source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Change {
    /// First rules from this source
    Created,
    /// Different document from a known source
    Updated,
    /// A known source no longer yields rules
    Deleted,
    /// Nothing to report
    Unchanged,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Revision {
    version: String,
    hash: String,
}

impl From<&RuleSet> for Revision {
    fn from(rule_set: &RuleSet) -> Self {
        Self {
            version: rule_set.version.clone(),
            hash: rule_set.hash.clone(),
        }
    }
}

/// Last known revision per source.
#[derive(Debug, Default)]
pub struct ChangeTracker {
    known: HashMap<String, Revision>,
}

impl ChangeTracker {
    /// Tracker without any known source.
    pub fn new() -> Self {
        Self::default()
    }

    /// Classify `rule_set` against the last known revision of its source.
    ///
    /// Versions are compared for equality only.
    pub fn classify(&self, rule_set: &RuleSet) -> Change {
        let known = self.known.get(&rule_set.source);
        match (known, rule_set.is_empty()) {
            (None, true) => Change::Unchanged,
            (Some(_), true) => Change::Deleted,
            (None, false) => Change::Created,
            (Some(rev), false) if *rev == Revision::from(rule_set) => Change::Unchanged,
            (Some(_), false) => Change::Updated,
        }
    }

    /// Returns `true` if `source` currently has rules.
    pub fn is_known(&self, source: &str) -> bool {
        self.known.contains_key(source)
    }

    /// Sources that currently have rules.
    pub fn sources(&self) -> impl Iterator<Item = &str> {
        self.known.keys().map(String::as_str)
    }

    /// Record `rule_set` and notify `processor` of the resulting change.
    ///
    /// The revision is recorded before the callback runs, so a failing
    /// callback is not repeated for the same content on the next tick.
    pub async fn apply(&mut self, processor: &dyn RuleSetProcessor, rule_set: RuleSet) -> Change {
        let change = self.classify(&rule_set);

        let result = match change {
            Change::Unchanged => {
                tracing::debug!(source = %rule_set.source, "No updates received");
                return change;
            }
            Change::Created => {
                self.known
                    .insert(rule_set.source.clone(), Revision::from(&rule_set));
                processor.on_created(&rule_set).await
            }
            Change::Updated => {
                self.known
                    .insert(rule_set.source.clone(), Revision::from(&rule_set));
                processor.on_updated(&rule_set).await
            }
            Change::Deleted => {
                self.known.remove(&rule_set.source);
                processor.on_deleted(&RuleSet::empty(rule_set.source.as_str())).await
            }
        };

        if let Err(err) = result {
            tracing::error!(
                source = %rule_set.source,
                change = ?change,
                error = %err,
                "Failed to apply rule set changes"
            );
        }
        change
    }
}
