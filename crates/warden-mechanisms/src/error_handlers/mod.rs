//! Error handlers turn a failed pipeline into a response.
//!
//! A rule's error handlers are consulted in order; the first one that
//! accepts the error produces the response. When none does, the
//! [`DefaultErrorHandler`] mapping applies.

mod default;
mod redirect;

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use http::StatusCode;
use warden_core::{Error, MechanismConfig, Request, Result};

pub use default::{DefaultErrorHandler, status_for};
pub use redirect::RedirectErrorHandler;

/// Response produced for a denied request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorResponse {
    /// Status code
    pub status: StatusCode,
    /// Response headers
    pub headers: BTreeMap<String, String>,
}

impl ErrorResponse {
    /// Response with `status` and no headers.
    pub fn new(status: StatusCode) -> Self {
        Self {
            status,
            headers: BTreeMap::new(),
        }
    }

    /// Add a header.
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }
}

/// Handles pipeline failures.
pub trait ErrorHandler: Send + Sync + fmt::Debug {
    /// Catalog id of this mechanism.
    fn id(&self) -> &str;

    /// Returns `true` if this handler is responsible for `err`.
    fn can_handle(&self, err: &Error) -> bool;

    /// Produce the response for `err`.
    fn execute(&self, request: &Request, err: &Error) -> Result<ErrorResponse>;

    /// Derive a rule-specific instance. An empty override returns `self`.
    fn with_config(
        self: Arc<Self>,
        config: Option<&MechanismConfig>,
    ) -> Result<Arc<dyn ErrorHandler>>;
}

/// Builds an error handler prototype from its id and configuration.
pub type ErrorHandlerFactory =
    fn(id: &str, config: Option<&MechanismConfig>) -> Result<Arc<dyn ErrorHandler>>;

/// Registered error handler types.
pub(crate) const TYPES: &[(&str, ErrorHandlerFactory)] = &[
    ("default", DefaultErrorHandler::create),
    ("redirect", RedirectErrorHandler::create),
];
