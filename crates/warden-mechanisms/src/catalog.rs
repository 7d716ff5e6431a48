//! Named mechanism prototypes.
//!
//! The catalog is built once from static configuration. Types are resolved
//! through a static registry of constructors; rules then look prototypes up
//! by id and derive their own instances.
//!
//! ```yaml
//! authenticators:
//!   - id: anon
//!     type: anonymous
//!   - id: at
//!     type: oauth2_introspection
//!     config:
//!       introspection_endpoint:
//!         url: https://idp.local/introspect
//!       assertions:
//!         issuers: [https://idp.local]
//! ```

use std::collections::HashMap;
use std::sync::Arc;

use serde::Deserialize;
use warden_core::{Error, MechanismConfig, Result};

use crate::error_handlers::DefaultErrorHandler;
use crate::{
    Authenticator, Authorizer, Contextualizer, ErrorHandler, Finalizer, MechanismKind,
    authenticators, authorizers, contextualizers, error_handlers, finalizers,
};

/// One prototype definition.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MechanismDefinition {
    /// Id rules refer to
    pub id: String,
    /// Registered type name, e.g. `oauth2_introspection`
    #[serde(rename = "type")]
    pub kind: String,
    /// Type specific configuration
    #[serde(default)]
    pub config: Option<MechanismConfig>,
}

/// Prototype definitions per mechanism kind.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CatalogConfig {
    /// Authenticator prototypes
    #[serde(default)]
    pub authenticators: Vec<MechanismDefinition>,
    /// Authorizer prototypes
    #[serde(default)]
    pub authorizers: Vec<MechanismDefinition>,
    /// Contextualizer prototypes
    #[serde(default)]
    pub contextualizers: Vec<MechanismDefinition>,
    /// Finalizer prototypes
    #[serde(default)]
    pub finalizers: Vec<MechanismDefinition>,
    /// Error handler prototypes
    #[serde(default)]
    pub error_handlers: Vec<MechanismDefinition>,
}

type Factory<T> = fn(&str, Option<&MechanismConfig>) -> Result<Arc<T>>;

/// Prototypes by id.
#[derive(Debug)]
pub struct MechanismCatalog {
    authenticators: HashMap<String, Arc<dyn Authenticator>>,
    authorizers: HashMap<String, Arc<dyn Authorizer>>,
    contextualizers: HashMap<String, Arc<dyn Contextualizer>>,
    finalizers: HashMap<String, Arc<dyn Finalizer>>,
    error_handlers: HashMap<String, Arc<dyn ErrorHandler>>,
    fallback: Arc<dyn ErrorHandler>,
}

impl MechanismCatalog {
    /// Build every prototype. The first invalid definition fails the build.
    pub fn new(config: &CatalogConfig) -> Result<Self> {
        let catalog = Self {
            authenticators: build(
                MechanismKind::Authenticator,
                &config.authenticators,
                authenticators::TYPES,
            )?,
            authorizers: build(
                MechanismKind::Authorizer,
                &config.authorizers,
                authorizers::TYPES,
            )?,
            contextualizers: build(
                MechanismKind::Contextualizer,
                &config.contextualizers,
                contextualizers::TYPES,
            )?,
            finalizers: build(
                MechanismKind::Finalizer,
                &config.finalizers,
                finalizers::TYPES,
            )?,
            error_handlers: build(
                MechanismKind::ErrorHandler,
                &config.error_handlers,
                error_handlers::TYPES,
            )?,
            fallback: Arc::new(DefaultErrorHandler::new("default", None)?),
        };

        tracing::info!(
            authenticators = catalog.authenticators.len(),
            authorizers = catalog.authorizers.len(),
            contextualizers = catalog.contextualizers.len(),
            finalizers = catalog.finalizers.len(),
            error_handlers = catalog.error_handlers.len(),
            "Mechanism catalog loaded"
        );

        Ok(catalog)
    }

    /// Authenticator `id`, specialised with `config`.
    pub fn authenticator(
        &self,
        id: &str,
        config: Option<&MechanismConfig>,
    ) -> Result<Arc<dyn Authenticator>> {
        lookup(&self.authenticators, MechanismKind::Authenticator, id)?.with_config(config)
    }

    /// Authorizer `id`, specialised with `config`.
    pub fn authorizer(
        &self,
        id: &str,
        config: Option<&MechanismConfig>,
    ) -> Result<Arc<dyn Authorizer>> {
        lookup(&self.authorizers, MechanismKind::Authorizer, id)?.with_config(config)
    }

    /// Contextualizer `id`, specialised with `config`.
    pub fn contextualizer(
        &self,
        id: &str,
        config: Option<&MechanismConfig>,
    ) -> Result<Arc<dyn Contextualizer>> {
        lookup(&self.contextualizers, MechanismKind::Contextualizer, id)?.with_config(config)
    }

    /// Finalizer `id`, specialised with `config`.
    pub fn finalizer(&self, id: &str, config: Option<&MechanismConfig>) -> Result<Arc<dyn Finalizer>> {
        lookup(&self.finalizers, MechanismKind::Finalizer, id)?.with_config(config)
    }

    /// Error handler `id`, specialised with `config`.
    pub fn error_handler(
        &self,
        id: &str,
        config: Option<&MechanismConfig>,
    ) -> Result<Arc<dyn ErrorHandler>> {
        lookup(&self.error_handlers, MechanismKind::ErrorHandler, id)?.with_config(config)
    }

    /// Handler used when no configured error handler accepts an error.
    pub fn fallback_error_handler(&self) -> Arc<dyn ErrorHandler> {
        Arc::clone(&self.fallback)
    }
}

fn build<T: ?Sized>(
    kind: MechanismKind,
    definitions: &[MechanismDefinition],
    types: &[(&str, Factory<T>)],
) -> Result<HashMap<String, Arc<T>>> {
    let mut prototypes = HashMap::with_capacity(definitions.len());

    for def in definitions {
        if def.id.is_empty() {
            return Err(Error::configuration(format!("{kind} without an id")));
        }

        let factory = types
            .iter()
            .find(|(name, _)| *name == def.kind)
            .map(|(_, factory)| factory)
            .ok_or_else(|| {
                Error::configuration(format!(
                    "unsupported {kind} type '{}' for id '{}'",
                    def.kind, def.id
                ))
            })?;

        let prototype = factory(&def.id, def.config.as_ref())
            .map_err(|e| e.with_context(format!("failed to create {kind} '{}'", def.id)))?;

        if prototypes.insert(def.id.clone(), prototype).is_some() {
            return Err(Error::configuration(format!("duplicate {kind} id '{}'", def.id)));
        }
    }

    Ok(prototypes)
}

fn lookup<T: ?Sized>(
    prototypes: &HashMap<String, Arc<T>>,
    kind: MechanismKind,
    id: &str,
) -> Result<Arc<T>> {
    prototypes
        .get(id)
        .cloned()
        .ok_or_else(|| Error::configuration(format!("no {kind} prototype for id '{id}' found")))
}
