//! Per-request decisions.

use std::collections::BTreeMap;
use std::sync::Arc;

use warden_core::{Cache, Error, Request, RequestContext, Subject};
use warden_mechanisms::ErrorResponse;

use crate::repository::Repository;
use crate::rule::fallback_response;

/// Outcome of a decision.
#[derive(Debug)]
pub enum Decision {
    /// Forward the request upstream with the produced headers and cookies.
    Allowed {
        /// Established subject
        subject: Subject,
        /// Headers for the upstream request
        headers: BTreeMap<String, String>,
        /// Cookies for the upstream request
        cookies: BTreeMap<String, String>,
    },
    /// Reject the request with `response`.
    Denied {
        /// Failure that stopped the pipeline
        error: Error,
        /// Response chosen by the error handlers
        response: ErrorResponse,
    },
}

impl Decision {
    /// Returns `true` for [`Decision::Allowed`].
    pub fn is_allowed(&self) -> bool {
        matches!(self, Decision::Allowed { .. })
    }
}

/// Matches requests against the repository and runs the matching rule.
#[derive(Debug, Clone)]
pub struct Executor {
    repository: Arc<Repository>,
    cache: Arc<dyn Cache>,
}

impl Executor {
    /// Executor over `repository`, sharing `cache` between mechanisms.
    pub fn new(repository: Arc<Repository>, cache: Arc<dyn Cache>) -> Self {
        Self { repository, cache }
    }

    /// Repository rules are looked up in.
    pub fn repository(&self) -> &Arc<Repository> {
        &self.repository
    }

    /// Decide `request`.
    pub async fn decide(&self, request: Request) -> Decision {
        let fallback = self.repository.fallback_error_handler();

        let rule = match self.repository.find_rule(request.method(), request.path()) {
            Ok(rule) => rule,
            Err(error) => {
                tracing::info!(
                    method = %request.method(),
                    path = %request.path(),
                    error = %error,
                    "Request denied"
                );
                let response = fallback_response(&request, &error, fallback.as_ref());
                return Decision::Denied { error, response };
            }
        };

        let mut ctx = RequestContext::new(request, Arc::clone(&self.cache));
        match rule.execute(&mut ctx).await {
            Ok(subject) => {
                tracing::debug!(rule = %rule.id(), subject = %subject.id, "Request allowed");
                let (headers, cookies) = ctx.into_upstream();
                Decision::Allowed {
                    subject,
                    headers,
                    cookies,
                }
            }
            Err(error) => {
                tracing::info!(
                    rule = %rule.id(),
                    mechanism = error.mechanism_id().unwrap_or_default(),
                    error = %error,
                    "Request denied"
                );
                let response = rule.handle_error(ctx.request(), &error, fallback.as_ref());
                Decision::Denied { error, response }
            }
        }
    }
}
