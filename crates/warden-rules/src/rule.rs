//! Compiled rules and their pipeline.

use std::fmt;
use std::sync::Arc;

use http::Method;
use warden_core::{Error, Request, RequestContext, Result, Subject};
use warden_mechanisms::{
    Authenticator, Authorizer, Contextualizer, ErrorHandler, ErrorResponse, Finalizer,
};

use crate::matcher::RouteMatcher;

/// A step run against the established subject.
#[derive(Debug, Clone)]
pub enum SubjectHandler {
    /// Authorization step
    Authorizer(Arc<dyn Authorizer>),
    /// Enrichment step
    Contextualizer(Arc<dyn Contextualizer>),
}

impl SubjectHandler {
    fn id(&self) -> &str {
        match self {
            Self::Authorizer(a) => a.id(),
            Self::Contextualizer(c) => c.id(),
        }
    }
}

/// An immutable, ready-to-execute rule.
pub struct Rule {
    pub(crate) id: String,
    pub(crate) source: String,
    pub(crate) matcher: Option<RouteMatcher>,
    pub(crate) authenticators: Vec<Arc<dyn Authenticator>>,
    pub(crate) subject_handlers: Vec<SubjectHandler>,
    pub(crate) finalizers: Vec<Arc<dyn Finalizer>>,
    pub(crate) error_handlers: Vec<Arc<dyn ErrorHandler>>,
}

impl fmt::Debug for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let ids = |items: Vec<&str>| items.join(",");
        f.debug_struct("Rule")
            .field("id", &self.id)
            .field("source", &self.source)
            .field(
                "authenticators",
                &ids(self.authenticators.iter().map(|a| a.id()).collect()),
            )
            .field(
                "subject_handlers",
                &ids(self.subject_handlers.iter().map(SubjectHandler::id).collect()),
            )
            .field(
                "finalizers",
                &ids(self.finalizers.iter().map(|f| f.id()).collect()),
            )
            .finish_non_exhaustive()
    }
}

impl Rule {
    /// Rule id.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Source of the owning rule set. Empty for the default rule.
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Returns `true` if this is the default rule.
    pub fn is_default(&self) -> bool {
        self.matcher.is_none()
    }

    /// Returns `true` if the rule's routes match `path`.
    pub fn matches_path(&self, path: &str) -> bool {
        self.matcher.as_ref().is_none_or(|m| m.matches_path(path))
    }

    /// Returns `true` if the rule allows `method`.
    pub fn matches_method(&self, method: &Method) -> bool {
        self.matcher.as_ref().is_none_or(|m| m.matches_method(method))
    }

    /// Run the mechanism chain: authenticate, authorize and contextualize in
    /// declared order, then finalize.
    pub async fn execute(&self, ctx: &mut RequestContext) -> Result<Subject> {
        tracing::debug!(rule = %self.id, source = %self.source, "Executing rule");

        let mut subject = self.authenticate(ctx).await?;

        for handler in &self.subject_handlers {
            match handler {
                SubjectHandler::Authorizer(a) => a.execute(ctx, &subject).await?,
                SubjectHandler::Contextualizer(c) => c.execute(ctx, &mut subject).await?,
            }
        }

        for finalizer in &self.finalizers {
            finalizer.execute(ctx, &subject).await?;
        }

        Ok(subject)
    }

    async fn authenticate(&self, ctx: &RequestContext) -> Result<Subject> {
        let mut last: Option<(&str, Error)> = None;

        for authenticator in &self.authenticators {
            match authenticator.execute(ctx).await {
                Ok(subject) => return Ok(subject),
                Err(err) => {
                    tracing::debug!(
                        rule = %self.id,
                        authenticator = authenticator.id(),
                        error = %err,
                        "Authenticator failed, trying next"
                    );
                    last = Some((authenticator.id(), err));
                }
            }
        }

        let (mechanism_id, source) = match last {
            Some((id, err)) => (id.to_string(), Some(Box::new(err))),
            None => (String::new(), None),
        };

        Err(Error::Authentication {
            rule_id: Some(self.id.clone()),
            mechanism_id,
            message: "no authenticator succeeded".to_string(),
            source,
        })
    }

    /// Produce the response for `err` using the first accepting error handler,
    /// or `fallback` if none accepts or the chosen one fails.
    pub fn handle_error(
        &self,
        request: &Request,
        err: &Error,
        fallback: &dyn ErrorHandler,
    ) -> ErrorResponse {
        if let Some(handler) = self.error_handlers.iter().find(|h| h.can_handle(err)) {
            match handler.execute(request, err) {
                Ok(response) => return response,
                Err(handler_err) => tracing::warn!(
                    rule = %self.id,
                    error_handler = handler.id(),
                    error = %handler_err,
                    "Error handler failed, using fallback"
                ),
            }
        }

        fallback_response(request, err, fallback)
    }
}

pub(crate) fn fallback_response(
    request: &Request,
    err: &Error,
    fallback: &dyn ErrorHandler,
) -> ErrorResponse {
    fallback.execute(request, err).unwrap_or_else(|_| {
        ErrorResponse::new(warden_mechanisms::error_handlers::status_for(err.kind()))
    })
}
