//! Templates for outbound payloads, upstream headers and redirect targets.
//!
//! Templates use Jinja syntax and see two values: `subject` (may be null)
//! and `request` (`method`, `url`, `path`, `headers`, `query`, `body`).
//!
//! ```text
//! {"user": "{{ subject.id }}", "path": "{{ request.path }}"}
//! ```

use std::collections::BTreeMap;
use std::fmt;

use minijinja::Environment;
use serde::{Deserialize, Deserializer, Serialize};

use crate::{Error, Request, Result, Subject};

/// A syntax-checked template source.
#[derive(Clone, PartialEq, Eq)]
pub struct Template {
    source: String,
}

impl Template {
    /// Parse `source`, failing with a configuration error on bad syntax.
    pub fn new(source: impl Into<String>) -> Result<Self> {
        let source = source.into();
        Environment::new()
            .template_from_str(&source)
            .map_err(|e| Error::configuration(format!("invalid template: {e}")))?;
        Ok(Self { source })
    }

    /// The template source.
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Render with the given data.
    pub fn render(&self, data: &TemplateData<'_>) -> Result<String> {
        Environment::new()
            .render_str(&self.source, data)
            .map_err(|e| Error::internal_with_source("failed rendering template", e))
    }
}

impl fmt::Debug for Template {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Template").field(&self.source).finish()
    }
}

impl<'de> Deserialize<'de> for Template {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let source = String::deserialize(deserializer)?;
        Template::new(source).map_err(serde::de::Error::custom)
    }
}

/// Values visible to a template.
#[derive(Debug, Serialize)]
pub struct TemplateData<'a> {
    subject: Option<&'a Subject>,
    request: RequestData<'a>,
}

#[derive(Debug, Serialize)]
struct RequestData<'a> {
    method: &'a str,
    url: &'a str,
    path: &'a str,
    headers: BTreeMap<String, String>,
    query: BTreeMap<String, String>,
    body: String,
}

impl<'a> TemplateData<'a> {
    /// Collect template values from the request and the (optional) subject.
    pub fn new(request: &'a Request, subject: Option<&'a Subject>) -> Self {
        let headers = request
            .headers()
            .iter()
            .filter_map(|(k, v)| Some((k.as_str().to_string(), v.to_str().ok()?.to_string())))
            .collect();
        let query = request
            .url()
            .query_pairs()
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();

        Self {
            subject,
            request: RequestData {
                method: request.method().as_str(),
                url: request.url().as_str(),
                path: request.path(),
                headers,
                query,
                body: String::from_utf8_lossy(request.body()).into_owned(),
            },
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use http::Method;
    use serde_json::json;
    use url::Url;

    fn request() -> Request {
        Request::new(
            Method::POST,
            Url::parse("http://foo.local/api/items?page=2").unwrap(),
        )
        .with_header("X-Tenant", "acme")
        .with_body("payload")
    }

    #[test]
    fn test_invalid_template_is_config_error() {
        let err = Template::new("{{ subject.id ").unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::Configuration);
    }

    #[test]
    fn test_render_subject_and_request() {
        let subject = Subject::new("alice").with_attribute("role", json!("admin"));
        let req = request();
        let template = Template::new(
            "{{ subject.id }}:{{ subject.attributes.role }}:{{ request.method }}:{{ request.path }}:{{ request.query.page }}:{{ request.headers['x-tenant'] }}:{{ request.body }}",
        )
        .unwrap();

        let rendered = template
            .render(&TemplateData::new(&req, Some(&subject)))
            .unwrap();
        assert_eq!(rendered, "alice:admin:POST:/api/items:2:acme:payload");
    }

    #[test]
    fn test_render_without_subject() {
        let req = request();
        let template = Template::new("{% if subject %}yes{% else %}no{% endif %}").unwrap();
        assert_eq!(template.render(&TemplateData::new(&req, None)).unwrap(), "no");
    }

    #[test]
    fn test_deserialize_validates_syntax() {
        assert!(yaml_serde::from_str::<Template>("\"{{ ok }}\"").is_ok());
        assert!(yaml_serde::from_str::<Template>("\"{% if %}\"").is_err());
    }
}
