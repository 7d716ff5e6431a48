//! Error taxonomy shared by every Warden crate.
//!
//! Errors are classified by [`ErrorKind`] so the request boundary can pick a
//! response without inspecting concrete sources.

use std::fmt;

use serde::Deserialize;

/// Boxed source error carried by communication and internal failures.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Errors raised while loading configuration or deciding a request.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// Malformed or missing configuration (mechanism, rule or rule set).
    #[error("configuration error: {message}")]
    Configuration {
        /// What is wrong with the configuration
        message: String,
    },

    /// An external endpoint could not be reached or answered unexpectedly.
    #[error("communication error: {message}")]
    Communication {
        /// Human-readable error message
        message: String,
        /// Source error if available
        #[source]
        source: Option<BoxError>,
    },

    /// No authenticator established a subject.
    #[error("authentication error: {message}")]
    Authentication {
        /// Rule whose authenticator chain failed, once known
        rule_id: Option<String>,
        /// Authenticator that raised (or last raised) the failure
        mechanism_id: String,
        /// What went wrong
        message: String,
        /// Failure of the furthest-tried authenticator
        #[source]
        source: Option<Box<Error>>,
    },

    /// An authorizer denied the subject.
    #[error("authorization error: {message}")]
    Authorization {
        /// Authorizer that denied access
        mechanism_id: String,
        /// Why access was denied
        message: String,
    },

    /// The request lacks something a mechanism requires (e.g. a credential).
    #[error("argument error: {message}")]
    Precondition {
        /// What is missing or malformed
        message: String,
    },

    /// No rule matches the request and no default rule is configured.
    #[error("no rule found for {method} {path}")]
    NoRule {
        /// Request method
        method: String,
        /// Request path
        path: String,
    },

    /// A rule matched the path but not the method.
    #[error("method {method} not allowed for {path}")]
    MethodNotAllowed {
        /// Request method
        method: String,
        /// Request path
        path: String,
    },

    /// Unexpected failure.
    #[error("internal error: {message}")]
    Internal {
        /// Human-readable error message
        message: String,
        /// Source error if available
        #[source]
        source: Option<BoxError>,
    },
}

/// Result type alias for Warden operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Classification of an [`Error`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// See [`Error::Configuration`]
    Configuration,
    /// See [`Error::Communication`]
    Communication,
    /// See [`Error::Authentication`]
    Authentication,
    /// See [`Error::Authorization`]
    Authorization,
    /// See [`Error::Precondition`]
    Precondition,
    /// See [`Error::NoRule`]
    NoRule,
    /// See [`Error::MethodNotAllowed`]
    MethodNotAllowed,
    /// See [`Error::Internal`]
    Internal,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Configuration => "configuration",
            Self::Communication => "communication",
            Self::Authentication => "authentication",
            Self::Authorization => "authorization",
            Self::Precondition => "precondition",
            Self::NoRule => "no_rule",
            Self::MethodNotAllowed => "method_not_allowed",
            Self::Internal => "internal",
        };
        f.write_str(name)
    }
}

impl Error {
    /// Returns the classification of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Configuration { .. } => ErrorKind::Configuration,
            Error::Communication { .. } => ErrorKind::Communication,
            Error::Authentication { .. } => ErrorKind::Authentication,
            Error::Authorization { .. } => ErrorKind::Authorization,
            Error::Precondition { .. } => ErrorKind::Precondition,
            Error::NoRule { .. } => ErrorKind::NoRule,
            Error::MethodNotAllowed { .. } => ErrorKind::MethodNotAllowed,
            Error::Internal { .. } => ErrorKind::Internal,
        }
    }

    /// Returns whether this error is retryable.
    ///
    /// Only communication failures are transient.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::Communication { .. })
    }

    /// Identifier of the mechanism that raised this error, if any.
    pub fn mechanism_id(&self) -> Option<&str> {
        match self {
            Error::Authentication { mechanism_id, .. } | Error::Authorization { mechanism_id, .. } => {
                Some(mechanism_id)
            }
            _ => None,
        }
    }

    /// Prefix the message of a configuration error with `context`.
    ///
    /// Other errors are returned unchanged.
    pub fn with_context(self, context: impl fmt::Display) -> Self {
        match self {
            Error::Configuration { message } => Error::Configuration {
                message: format!("{context}: {message}"),
            },
            other => other,
        }
    }

    /// Creates a new configuration error.
    pub fn configuration<S: Into<String>>(message: S) -> Self {
        Error::Configuration {
            message: message.into(),
        }
    }

    /// Creates a new communication error.
    pub fn communication<S: Into<String>>(message: S) -> Self {
        Error::Communication {
            message: message.into(),
            source: None,
        }
    }

    /// Creates a new communication error with a source error.
    pub fn communication_with_source<S, E>(message: S, source: E) -> Self
    where
        S: Into<String>,
        E: std::error::Error + Send + Sync + 'static,
    {
        Error::Communication {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Creates a new authentication error raised by a mechanism.
    pub fn authentication<I, M>(mechanism_id: I, message: M) -> Self
    where
        I: Into<String>,
        M: Into<String>,
    {
        Error::Authentication {
            rule_id: None,
            mechanism_id: mechanism_id.into(),
            message: message.into(),
            source: None,
        }
    }

    /// Creates a new authentication error caused by `source`.
    pub fn authentication_with_source<I, M>(mechanism_id: I, message: M, source: Error) -> Self
    where
        I: Into<String>,
        M: Into<String>,
    {
        Error::Authentication {
            rule_id: None,
            mechanism_id: mechanism_id.into(),
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Creates a new authorization error.
    pub fn authorization<I, M>(mechanism_id: I, message: M) -> Self
    where
        I: Into<String>,
        M: Into<String>,
    {
        Error::Authorization {
            mechanism_id: mechanism_id.into(),
            message: message.into(),
        }
    }

    /// Creates a new precondition (argument) error.
    pub fn precondition<S: Into<String>>(message: S) -> Self {
        Error::Precondition {
            message: message.into(),
        }
    }

    /// Creates a new internal error.
    pub fn internal<S: Into<String>>(message: S) -> Self {
        Error::Internal {
            message: message.into(),
            source: None,
        }
    }

    /// Creates a new internal error with a source error.
    pub fn internal_with_source<S, E>(message: S, source: E) -> Self
    where
        S: Into<String>,
        E: std::error::Error + Send + Sync + 'static,
    {
        Error::Internal {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }
}
