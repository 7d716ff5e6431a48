//! Recording processor used by provider tests.

use std::sync::Mutex;

use async_trait::async_trait;
use warden_core::{Error, Result};
use warden_rules::{RuleSet, RuleSetProcessor};

/// One recorded callback.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Event {
    Created(RuleSet),
    Updated(RuleSet),
    Deleted(RuleSet),
}

/// Captures every callback in arrival order.
#[derive(Debug, Default)]
pub(crate) struct RecordingProcessor {
    events: Mutex<Vec<Event>>,
    fail: bool,
}

impl RecordingProcessor {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Records callbacks but reports each as failed.
    pub(crate) fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub(crate) fn events(&self) -> Vec<Event> {
        self.events.lock().unwrap().clone()
    }

    pub(crate) fn created(&self) -> Vec<RuleSet> {
        self.filter(|e| match e {
            Event::Created(rs) => Some(rs),
            _ => None,
        })
    }

    pub(crate) fn updated(&self) -> Vec<RuleSet> {
        self.filter(|e| match e {
            Event::Updated(rs) => Some(rs),
            _ => None,
        })
    }

    pub(crate) fn deleted(&self) -> Vec<RuleSet> {
        self.filter(|e| match e {
            Event::Deleted(rs) => Some(rs),
            _ => None,
        })
    }

    fn filter(&self, f: impl Fn(&Event) -> Option<&RuleSet>) -> Vec<RuleSet> {
        self.events
            .lock()
            .unwrap()
            .iter()
            .filter_map(f)
            .cloned()
            .collect()
    }

    fn record(&self, event: Event) -> Result<()> {
        self.events.lock().unwrap().push(event);
        if self.fail {
            return Err(Error::internal("recording processor failure"));
        }
        Ok(())
    }
}

#[async_trait]
impl RuleSetProcessor for RecordingProcessor {
    async fn on_created(&self, rule_set: &RuleSet) -> Result<()> {
        self.record(Event::Created(rule_set.clone()))
    }

    async fn on_updated(&self, rule_set: &RuleSet) -> Result<()> {
        self.record(Event::Updated(rule_set.clone()))
    }

    async fn on_deleted(&self, rule_set: &RuleSet) -> Result<()> {
        self.record(Event::Deleted(rule_set.clone()))
    }
}
