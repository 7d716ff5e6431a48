use std::sync::Arc;

use http::StatusCode;
use http::header::LOCATION;
use serde::Deserialize;
use url::Url;
use warden_core::{Error, ErrorKind, MechanismConfig, Request, Result, config};

use super::{ErrorHandler, ErrorResponse};

const WHAT: &str = "redirect error handler";

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct Config {
    #[serde(default)]
    to: Option<String>,
    #[serde(default)]
    code: Option<u16>,
    #[serde(default, rename = "if")]
    on: Vec<ErrorKind>,
    #[serde(default)]
    return_to_query_parameter: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct Overrides {
    #[serde(default, rename = "if")]
    on: Option<Vec<ErrorKind>>,
    #[serde(default)]
    return_to_query_parameter: Option<String>,
}

/// Redirects the client, e.g. to a login page.
///
/// `if` restricts the error kinds handled; empty means all. With
/// `return_to_query_parameter` the original URL is appended to the target.
#[derive(Debug, PartialEq, Eq)]
pub struct RedirectErrorHandler {
    id: String,
    to: Arc<Url>,
    code: StatusCode,
    on: Arc<[ErrorKind]>,
    return_to: Option<String>,
}

impl RedirectErrorHandler {
    /// Create the handler. `to` is required; `code` defaults to 302.
    pub fn new(id: &str, config: Option<&MechanismConfig>) -> Result<Self> {
        let conf: Config = config::decode(config, WHAT)?;

        let to = conf
            .to
            .ok_or_else(|| Error::configuration("'to' is a required field"))?;
        let to = Url::parse(&to)
            .map_err(|e| Error::configuration(format!("invalid redirect target '{to}': {e}")))?;

        let code = StatusCode::from_u16(conf.code.unwrap_or(302))
            .ok()
            .filter(StatusCode::is_redirection)
            .ok_or_else(|| Error::configuration("'code' must be a redirect status code"))?;

        Ok(Self {
            id: id.to_string(),
            to: Arc::new(to),
            code,
            on: conf.on.into(),
            return_to: conf.return_to_query_parameter,
        })
    }

    pub(crate) fn create(
        id: &str,
        config: Option<&MechanismConfig>,
    ) -> Result<Arc<dyn ErrorHandler>> {
        Ok(Arc::new(Self::new(id, config)?))
    }

    fn location(&self, request: &Request) -> Url {
        let mut location = Url::clone(&self.to);
        if let Some(param) = &self.return_to {
            location
                .query_pairs_mut()
                .append_pair(param, request.url().as_str());
        }
        location
    }
}

impl ErrorHandler for RedirectErrorHandler {
    fn id(&self) -> &str {
        &self.id
    }

    fn can_handle(&self, err: &Error) -> bool {
        self.on.is_empty() || self.on.contains(&err.kind())
    }

    fn execute(&self, request: &Request, _err: &Error) -> Result<ErrorResponse> {
        tracing::debug!(id = %self.id, "Handling error using redirect error handler");
        Ok(ErrorResponse::new(self.code).with_header(LOCATION.as_str(), self.location(request)))
    }

    fn with_config(
        self: Arc<Self>,
        config: Option<&MechanismConfig>,
    ) -> Result<Arc<dyn ErrorHandler>> {
        if config::is_empty(config) {
            return Ok(self);
        }

        let overrides: Overrides = config::decode(config, WHAT)?;
        Ok(Arc::new(Self {
            id: self.id.clone(),
            to: Arc::clone(&self.to),
            code: self.code,
            on: overrides
                .on
                .map(Into::into)
                .unwrap_or_else(|| Arc::clone(&self.on)),
            return_to: overrides.return_to_query_parameter.or_else(|| self.return_to.clone()),
        }))
    }
}
