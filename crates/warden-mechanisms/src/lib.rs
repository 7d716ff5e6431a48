//! Warden Mechanisms — the building blocks of a rule's pipeline.
//!
//! Every mechanism is built once as a named *prototype* from static
//! configuration. Rules derive specialised instances through `with_config`:
//! an empty override returns the prototype itself, anything else yields a
//! new value sharing every unchanged part with the prototype.
//!
//! # Modules
//!
//! - [`authenticators`]: establish the [`Subject`](warden_core::Subject)
//! - [`authorizers`]: allow or deny the subject
//! - [`contextualizers`]: enrich the subject from external sources
//! - [`finalizers`]: produce the upstream headers and cookies
//! - [`error_handlers`]: turn a failed pipeline into a response
//! - [`catalog`]: named prototypes and the static type registry
//! - [`extractors`]: credential extraction strategies
//! - [`session`]: session lifespan assertions
//! - [`oauth2`]: introspection responses and trust assertions

pub mod authenticators;
pub mod authorizers;
pub mod catalog;
pub mod contextualizers;
pub mod error;
pub mod error_handlers;
pub mod extractors;
pub mod finalizers;
pub mod oauth2;
pub mod session;

use std::fmt;

use serde::Deserialize;
use warden_core::{Error, MechanismConfig, Result, config};

pub use authenticators::Authenticator;
pub use authorizers::Authorizer;
pub use catalog::{CatalogConfig, MechanismCatalog, MechanismDefinition};
pub use contextualizers::Contextualizer;
pub use error::ValidationError;
pub use error_handlers::{ErrorHandler, ErrorResponse};
pub use finalizers::Finalizer;

/// The closed set of mechanism kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MechanismKind {
    /// See [`Authenticator`]
    Authenticator,
    /// See [`Authorizer`]
    Authorizer,
    /// See [`Contextualizer`]
    Contextualizer,
    /// See [`Finalizer`]
    Finalizer,
    /// See [`ErrorHandler`]
    ErrorHandler,
}

impl fmt::Display for MechanismKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Authenticator => "authenticator",
            Self::Authorizer => "authorizer",
            Self::Contextualizer => "contextualizer",
            Self::Finalizer => "finalizer",
            Self::ErrorHandler => "error handler",
        })
    }
}

/// Fail if a mechanism without overridable settings receives an override.
pub(crate) fn ensure_no_overrides(id: &str, config: Option<&MechanismConfig>) -> Result<()> {
    if config::is_empty(config) {
        Ok(())
    } else {
        Err(Error::configuration(format!(
            "mechanism '{id}' does not support configuration overrides"
        )))
    }
}
