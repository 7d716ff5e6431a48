//! Inbound request view and per-request pipeline context.

use std::collections::BTreeMap;
use std::sync::Arc;

use http::header::{CONTENT_TYPE, COOKIE};
use http::{HeaderMap, HeaderName, HeaderValue, Method};
use url::Url;

use crate::cache::Cache;

const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";

/// Read-only view of the request a decision is made for.
#[derive(Debug, Clone)]
pub struct Request {
    method: Method,
    url: Url,
    headers: HeaderMap,
    body: Vec<u8>,
}

impl Request {
    /// Create a request without headers or body.
    pub fn new(method: Method, url: Url) -> Self {
        Self {
            method,
            url,
            headers: HeaderMap::new(),
            body: Vec::new(),
        }
    }

    /// Add a header. Names or values that are not valid HTTP are skipped.
    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        match (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(value),
        ) {
            (Ok(name), Ok(value)) => {
                self.headers.append(name, value);
            }
            _ => tracing::debug!(header = name, "Skipping invalid header"),
        }
        self
    }

    /// Replace all headers.
    pub fn with_headers(mut self, headers: HeaderMap) -> Self {
        self.headers = headers;
        self
    }

    /// Set the request body.
    pub fn with_body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = body.into();
        self
    }

    /// HTTP method.
    pub fn method(&self) -> &Method {
        &self.method
    }

    /// Full request URL.
    pub fn url(&self) -> &Url {
        &self.url
    }

    /// URL path.
    pub fn path(&self) -> &str {
        self.url.path()
    }

    /// All headers.
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Raw body bytes.
    pub fn body(&self) -> &[u8] {
        &self.body
    }

    /// First value of the named header, if present and printable.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// Value of the named cookie across all `Cookie` headers.
    pub fn cookie(&self, name: &str) -> Option<String> {
        self.headers
            .get_all(COOKIE)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .flat_map(|v| v.split(';'))
            .filter_map(|pair| pair.trim().split_once('='))
            .find(|(k, _)| *k == name)
            .map(|(_, v)| v.trim_matches('"').to_string())
    }

    /// Value of the named query parameter.
    pub fn query_parameter(&self, name: &str) -> Option<String> {
        self.url
            .query_pairs()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.into_owned())
    }

    /// Value of the named url-encoded form parameter in the body.
    pub fn form_parameter(&self, name: &str) -> Option<String> {
        let is_form = self
            .header(CONTENT_TYPE.as_str())
            .is_some_and(|ct| ct.starts_with(FORM_CONTENT_TYPE));
        if !is_form {
            return None;
        }

        url::form_urlencoded::parse(&self.body)
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.into_owned())
    }
}

/// Per-request state threaded through a rule's mechanism chain.
///
/// Collects the headers and cookies that are to be sent to the upstream
/// service once the decision is positive.
#[derive(Debug)]
pub struct RequestContext {
    request: Request,
    cache: Arc<dyn Cache>,
    upstream_headers: BTreeMap<String, String>,
    upstream_cookies: BTreeMap<String, String>,
}

impl RequestContext {
    /// Create a context for `request` backed by `cache`.
    pub fn new(request: Request, cache: Arc<dyn Cache>) -> Self {
        Self {
            request,
            cache,
            upstream_headers: BTreeMap::new(),
            upstream_cookies: BTreeMap::new(),
        }
    }

    /// The inbound request.
    pub fn request(&self) -> &Request {
        &self.request
    }

    /// The result cache available to mechanisms.
    pub fn cache(&self) -> &dyn Cache {
        self.cache.as_ref()
    }

    /// Header to be set on the upstream request. Later values replace earlier ones.
    pub fn add_header_for_upstream(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.upstream_headers.insert(name.into(), value.into());
    }

    /// Cookie to be set on the upstream request.
    pub fn add_cookie_for_upstream(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.upstream_cookies.insert(name.into(), value.into());
    }

    /// Headers collected so far.
    pub fn upstream_headers(&self) -> &BTreeMap<String, String> {
        &self.upstream_headers
    }

    /// Cookies collected so far.
    pub fn upstream_cookies(&self) -> &BTreeMap<String, String> {
        &self.upstream_cookies
    }

    /// Consume the context, returning the collected headers and cookies.
    pub fn into_upstream(self) -> (BTreeMap<String, String>, BTreeMap<String, String>) {
        (self.upstream_headers, self.upstream_cookies)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::cache::NoopCache;

    fn request(url: &str) -> Request {
        Request::new(Method::GET, Url::parse(url).unwrap())
    }

    #[test]
    fn test_header_lookup_is_case_insensitive() {
        let req = request("http://foo.local/").with_header("X-Test", "bar");
        assert_eq!(req.header("x-test"), Some("bar"));
        assert_eq!(req.header("X-TEST"), Some("bar"));
        assert_eq!(req.header("x-other"), None);
    }

    #[test]
    fn test_invalid_header_is_skipped() {
        let req = request("http://foo.local/").with_header("bad header", "x");
        assert!(req.headers().is_empty());
    }

    #[test]
    fn test_cookie_lookup() {
        let req = request("http://foo.local/")
            .with_header("Cookie", "a=1; access_token=tok")
            .with_header("Cookie", "b=\"2\"");
        assert_eq!(req.cookie("access_token"), Some("tok".to_string()));
        assert_eq!(req.cookie("b"), Some("2".to_string()));
        assert_eq!(req.cookie("c"), None);
    }

    #[test]
    fn test_query_parameter_lookup() {
        let req = request("http://foo.local/api?access_token=abc%20def&x=1");
        assert_eq!(req.query_parameter("access_token"), Some("abc def".to_string()));
        assert_eq!(req.query_parameter("y"), None);
        assert_eq!(req.path(), "/api");
    }

    #[test]
    fn test_form_parameter_requires_form_content_type() {
        let req = request("http://foo.local/")
            .with_header("Content-Type", "application/x-www-form-urlencoded")
            .with_body("token=foo&other=bar");
        assert_eq!(req.form_parameter("token"), Some("foo".to_string()));

        let req = request("http://foo.local/")
            .with_header("Content-Type", "application/json")
            .with_body("token=foo");
        assert_eq!(req.form_parameter("token"), None);
    }

    #[test]
    fn test_context_collects_upstream_mutations() {
        let mut ctx = RequestContext::new(request("http://foo.local/"), Arc::new(NoopCache));
        ctx.add_header_for_upstream("X-User", "alice");
        ctx.add_header_for_upstream("X-User", "bob");
        ctx.add_cookie_for_upstream("session", "s1");

        assert_eq!(ctx.upstream_headers().get("X-User").unwrap(), "bob");
        let (headers, cookies) = ctx.into_upstream();
        assert_eq!(headers.len(), 1);
        assert_eq!(cookies.get("session").unwrap(), "s1");
    }
}
