//! Claim and session assertion failures.
//!
//! These are raised while validating credentials and are wrapped into a
//! [`warden_core::Error::Authentication`] by the mechanism that ran the check.

/// A credential did not satisfy an assertion.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[non_exhaustive]
pub enum ValidationError {
    /// The session or token is not active.
    #[error("not active")]
    NotActive,

    /// `nbf` lies in the future.
    #[error("not yet valid")]
    NotYetValid,

    /// `exp` has passed.
    #[error("expired")]
    Expired,

    /// `iat` lies in the future.
    #[error("issued in the future")]
    IssuedInFuture,

    /// Issuer is not trusted.
    #[error("issuer '{0}' is not trusted")]
    UntrustedIssuer(String),

    /// A required audience is missing.
    #[error("audience '{0}' is not present")]
    MissingAudience(String),

    /// A required scope is not granted.
    #[error("required scope '{0}' is missing")]
    MissingScope(String),

    /// Signature algorithm not allowed.
    #[error("algorithm '{0}' is not allowed")]
    DisallowedAlgorithm(String),
}

/// Result type alias for assertions.
pub type ValidationResult = std::result::Result<(), ValidationError>;
