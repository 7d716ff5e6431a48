//! Per-endpoint HTTP response cache.
//!
//! Keeps the last rule-set document of one endpoint together with its
//! freshness and validators. A fresh document is served without a request;
//! a stale one is revalidated with `If-None-Match`/`If-Modified-Since`.

use chrono::{DateTime, Utc};
use http::HeaderMap;
use http::header::{CACHE_CONTROL, ETAG, EXPIRES, LAST_MODIFIED};
use serde::Deserialize;

/// Cache settings of one endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HttpCacheConfig {
    /// Whether responses are cached at all.
    #[serde(default = "enabled_by_default")]
    pub enabled: bool,
}

fn enabled_by_default() -> bool {
    true
}

impl Default for HttpCacheConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

/// Freshness directives of a response.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct Directives {
    pub(crate) no_store: bool,
    pub(crate) fresh_until: Option<DateTime<Utc>>,
    pub(crate) etag: Option<String>,
    pub(crate) last_modified: Option<String>,
}

impl Directives {
    /// Parse the caching headers of a response received at `now`.
    ///
    /// `max-age` takes precedence over `Expires`; `no-cache` forces
    /// revalidation on every use.
    pub(crate) fn parse(headers: &HeaderMap, now: DateTime<Utc>) -> Self {
        let mut no_store = false;
        let mut no_cache = false;
        let mut max_age = None;

        for value in headers.get_all(CACHE_CONTROL) {
            let Ok(value) = value.to_str() else { continue };
            for directive in value.split(',').map(str::trim) {
                let (name, arg) = match directive.split_once('=') {
                    Some((n, a)) => (n.trim(), Some(a.trim().trim_matches('"'))),
                    None => (directive, None),
                };
                match name.to_ascii_lowercase().as_str() {
                    "no-store" => no_store = true,
                    "no-cache" => no_cache = true,
                    "max-age" => max_age = arg.and_then(|a| a.parse::<i64>().ok()),
                    _ => {}
                }
            }
        }

        let fresh_until = if no_cache {
            None
        } else if let Some(secs) = max_age {
            chrono::Duration::try_seconds(secs).and_then(|age| now.checked_add_signed(age))
        } else {
            header(headers, EXPIRES.as_str())
                .and_then(|v| DateTime::parse_from_rfc2822(&v).ok())
                .map(|t| t.with_timezone(&Utc))
        };

        Self {
            no_store,
            fresh_until,
            etag: header(headers, ETAG.as_str()),
            last_modified: header(headers, LAST_MODIFIED.as_str()),
        }
    }
}

fn header(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}

#[derive(Debug, Clone)]
struct Entry {
    body: Vec<u8>,
    directives: Directives,
}

/// Cached document of one endpoint.
#[derive(Debug, Default)]
pub(crate) struct HttpCache {
    enabled: bool,
    entry: Option<Entry>,
}

impl HttpCache {
    pub(crate) fn new(config: &HttpCacheConfig) -> Self {
        Self {
            enabled: config.enabled,
            entry: None,
        }
    }

    /// The cached body if it is still fresh at `now`.
    pub(crate) fn fresh(&self, now: DateTime<Utc>) -> Option<&[u8]> {
        let entry = self.entry.as_ref()?;
        match entry.directives.fresh_until {
            Some(until) if now < until => Some(&entry.body),
            _ => None,
        }
    }

    /// Conditional request headers for revalidating the cached body.
    pub(crate) fn validators(&self) -> Vec<(&'static str, String)> {
        let Some(entry) = &self.entry else {
            return Vec::new();
        };
        let mut validators = Vec::new();
        if let Some(etag) = &entry.directives.etag {
            validators.push(("If-None-Match", etag.clone()));
        }
        if let Some(modified) = &entry.directives.last_modified {
            validators.push(("If-Modified-Since", modified.clone()));
        }
        validators
    }

    /// Remember `body` under `directives`, unless caching is off or forbidden.
    pub(crate) fn store(&mut self, body: &[u8], directives: Directives) {
        if !self.enabled || directives.no_store {
            self.entry = None;
            return;
        }
        self.entry = Some(Entry {
            body: body.to_vec(),
            directives,
        });
    }

    /// Handle a `304 Not Modified`: refresh freshness and return the cached
    /// body.
    pub(crate) fn revalidated(&mut self, directives: Directives) -> Option<Vec<u8>> {
        let entry = self.entry.as_mut()?;
        entry.directives.fresh_until = directives.fresh_until;
        if directives.etag.is_some() {
            entry.directives.etag = directives.etag;
        }
        if directives.last_modified.is_some() {
            entry.directives.last_modified = directives.last_modified;
        }
        Some(entry.body.clone())
    }

    /// Forget the cached document.
    pub(crate) fn clear(&mut self) {
        self.entry = None;
    }
}
