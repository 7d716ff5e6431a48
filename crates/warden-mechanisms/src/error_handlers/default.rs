use std::sync::Arc;

use http::StatusCode;
use warden_core::{Error, ErrorKind, MechanismConfig, Request, Result};

use super::{ErrorHandler, ErrorResponse};
use crate::ensure_no_overrides;

/// Status code for an error kind.
pub fn status_for(kind: ErrorKind) -> StatusCode {
    match kind {
        ErrorKind::Authentication => StatusCode::UNAUTHORIZED,
        ErrorKind::Authorization => StatusCode::FORBIDDEN,
        ErrorKind::Communication => StatusCode::BAD_GATEWAY,
        ErrorKind::Precondition => StatusCode::BAD_REQUEST,
        ErrorKind::NoRule => StatusCode::NOT_FOUND,
        ErrorKind::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
        ErrorKind::Configuration | ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// Answers every error with the status of its kind.
#[derive(Debug)]
pub struct DefaultErrorHandler {
    id: String,
}

impl DefaultErrorHandler {
    /// Create the handler. It takes no configuration.
    pub fn new(id: &str, config: Option<&MechanismConfig>) -> Result<Self> {
        ensure_no_overrides(id, config)?;
        Ok(Self { id: id.to_string() })
    }

    pub(crate) fn create(
        id: &str,
        config: Option<&MechanismConfig>,
    ) -> Result<Arc<dyn ErrorHandler>> {
        Ok(Arc::new(Self::new(id, config)?))
    }
}

impl ErrorHandler for DefaultErrorHandler {
    fn id(&self) -> &str {
        &self.id
    }

    fn can_handle(&self, _err: &Error) -> bool {
        true
    }

    fn execute(&self, _request: &Request, err: &Error) -> Result<ErrorResponse> {
        Ok(ErrorResponse::new(status_for(err.kind())))
    }

    fn with_config(
        self: Arc<Self>,
        config: Option<&MechanismConfig>,
    ) -> Result<Arc<dyn ErrorHandler>> {
        ensure_no_overrides(&self.id, config)?;
        Ok(self)
    }
}
