//! Turns rule configurations into executable rules.

use std::collections::HashSet;

use warden_core::{Error, Result};
use warden_mechanisms::{MechanismCatalog, MechanismKind};

use crate::config::{DefaultRuleConfig, MechanismRef, RuleConfig, RuleSet};
use crate::matcher::RouteMatcher;
use crate::rule::{Rule, SubjectHandler};

/// Id of the default rule.
pub const DEFAULT_RULE_ID: &str = "default";

/// Compile every rule of `rule_set`.
///
/// Rule ids must be unique within the set. All mechanism references are
/// resolved here, so unknown mechanisms fail before any request is served.
pub fn compile_rule_set(catalog: &MechanismCatalog, rule_set: &RuleSet) -> Result<Vec<Rule>> {
    let mut seen = HashSet::new();

    rule_set
        .rules
        .iter()
        .map(|config| {
            if !seen.insert(config.id.as_str()) {
                return Err(Error::configuration(format!(
                    "duplicate rule id '{}' in rule set from {}",
                    config.id, rule_set.source
                )));
            }
            compile_rule(catalog, &rule_set.source, config)
        })
        .collect()
}

/// Compile a single rule owned by `source`.
pub fn compile_rule(catalog: &MechanismCatalog, source: &str, config: &RuleConfig) -> Result<Rule> {
    if config.id.trim().is_empty() {
        return Err(Error::configuration(format!(
            "rule without an id in rule set from {source}"
        )));
    }

    let context = || format!("rule '{}'", config.id);
    let matcher = RouteMatcher::new(&config.matcher).map_err(|e| e.with_context(context()))?;

    build(
        catalog,
        config.id.clone(),
        source.to_string(),
        Some(matcher),
        &config.execute,
        &config.on_error,
    )
    .map_err(|e| e.with_context(context()))
}

/// Compile the default rule.
pub fn compile_default_rule(catalog: &MechanismCatalog, config: &DefaultRuleConfig) -> Result<Rule> {
    build(
        catalog,
        DEFAULT_RULE_ID.to_string(),
        String::new(),
        None,
        &config.execute,
        &config.on_error,
    )
    .map_err(|e| e.with_context("default rule"))
}

#[derive(PartialEq, PartialOrd)]
enum Stage {
    Authentication,
    SubjectHandling,
    Finalization,
}

fn build(
    catalog: &MechanismCatalog,
    id: String,
    source: String,
    matcher: Option<RouteMatcher>,
    execute: &[MechanismRef],
    on_error: &[MechanismRef],
) -> Result<Rule> {
    let mut rule = Rule {
        id,
        source,
        matcher,
        authenticators: Vec::new(),
        subject_handlers: Vec::new(),
        finalizers: Vec::new(),
        error_handlers: Vec::new(),
    };

    let mut stage = Stage::Authentication;
    for mref in execute {
        let config = mref.config.as_ref();
        let next = match mref.kind {
            MechanismKind::Authenticator => Stage::Authentication,
            MechanismKind::Authorizer | MechanismKind::Contextualizer => Stage::SubjectHandling,
            MechanismKind::Finalizer => Stage::Finalization,
            MechanismKind::ErrorHandler => {
                return Err(Error::configuration(format!(
                    "error handler '{}' is not allowed in 'execute'",
                    mref.id
                )));
            }
        };
        if next < stage {
            return Err(Error::configuration(format!(
                "{} '{}' is out of order: authenticators come first, finalizers last",
                mref.kind, mref.id
            )));
        }
        stage = next;

        match mref.kind {
            MechanismKind::Authenticator => rule
                .authenticators
                .push(catalog.authenticator(&mref.id, config)?),
            MechanismKind::Authorizer => rule
                .subject_handlers
                .push(SubjectHandler::Authorizer(catalog.authorizer(&mref.id, config)?)),
            MechanismKind::Contextualizer => rule.subject_handlers.push(
                SubjectHandler::Contextualizer(catalog.contextualizer(&mref.id, config)?),
            ),
            MechanismKind::Finalizer => rule.finalizers.push(catalog.finalizer(&mref.id, config)?),
            MechanismKind::ErrorHandler => {}
        }
    }

    if rule.authenticators.is_empty() {
        return Err(Error::configuration("no authenticator defined"));
    }

    for mref in on_error {
        if mref.kind != MechanismKind::ErrorHandler {
            return Err(Error::configuration(format!(
                "{} '{}' is not allowed in 'on_error'",
                mref.kind, mref.id
            )));
        }
        rule.error_handlers
            .push(catalog.error_handler(&mref.id, mref.config.as_ref())?);
    }

    Ok(rule)
}
