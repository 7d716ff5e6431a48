use std::sync::Arc;

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::Deserialize;
use warden_core::{Error, MechanismConfig, RequestContext, Result, Subject, config};

use super::Authenticator;

const BASIC_PREFIX: &str = "Basic ";

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct Config {
    #[serde(default)]
    user_id: Option<String>,
    #[serde(default)]
    password: Option<String>,
}

/// HTTP basic authentication against a single configured credential.
///
/// Only a digest of the password is kept.
#[derive(Debug)]
pub struct BasicAuthAuthenticator {
    id: String,
    user_id: String,
    password_digest: blake3::Hash,
}

impl BasicAuthAuthenticator {
    /// Create the authenticator. `user_id` and `password` are required.
    pub fn new(id: &str, config: Option<&MechanismConfig>) -> Result<Self> {
        let conf: Config = config::decode(config, "basic_auth authenticator")?;

        let user_id = conf
            .user_id
            .filter(|u| !u.is_empty())
            .ok_or_else(|| Error::configuration("'user_id' is a required field"))?;
        let password = conf
            .password
            .filter(|p| !p.is_empty())
            .ok_or_else(|| Error::configuration("'password' is a required field"))?;

        Ok(Self {
            id: id.to_string(),
            user_id,
            password_digest: blake3::hash(password.as_bytes()),
        })
    }

    pub(crate) fn create(
        id: &str,
        config: Option<&MechanismConfig>,
    ) -> Result<Arc<dyn Authenticator>> {
        Ok(Arc::new(Self::new(id, config)?))
    }

    fn credentials(&self, ctx: &RequestContext) -> Result<(String, String)> {
        let header = ctx
            .request()
            .header("authorization")
            .and_then(|h| h.strip_prefix(BASIC_PREFIX))
            .ok_or_else(|| Error::precondition("no basic credentials present"))?;

        let decoded = STANDARD
            .decode(header.trim())
            .ok()
            .and_then(|raw| String::from_utf8(raw).ok())
            .ok_or_else(|| Error::authentication(&self.id, "malformed basic credentials"))?;

        decoded
            .split_once(':')
            .map(|(u, p)| (u.to_string(), p.to_string()))
            .ok_or_else(|| Error::authentication(&self.id, "malformed basic credentials"))
    }
}

#[async_trait]
impl Authenticator for BasicAuthAuthenticator {
    fn id(&self) -> &str {
        &self.id
    }

    async fn execute(&self, ctx: &RequestContext) -> Result<Subject> {
        tracing::debug!(id = %self.id, "Authenticating using basic_auth authenticator");

        let (user_id, password) = self.credentials(ctx)?;

        // Both checks run so timing does not reveal which one failed.
        let user_ok = blake3::hash(user_id.as_bytes()) == blake3::hash(self.user_id.as_bytes());
        let password_ok = blake3::hash(password.as_bytes()) == self.password_digest;

        if user_ok && password_ok {
            Ok(Subject::new(user_id))
        } else {
            Err(Error::authentication(&self.id, "invalid user credentials"))
        }
    }

    fn with_config(
        self: Arc<Self>,
        config: Option<&MechanismConfig>,
    ) -> Result<Arc<dyn Authenticator>> {
        if config::is_empty(config) {
            return Ok(self);
        }

        let conf: Config = config::decode(config, "basic_auth authenticator")?;
        Ok(Arc::new(Self {
            id: self.id.clone(),
            user_id: conf.user_id.unwrap_or_else(|| self.user_id.clone()),
            password_digest: conf
                .password
                .map(|p| blake3::hash(p.as_bytes()))
                .unwrap_or(self.password_digest),
        }))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use http::Method;
    use url::Url;
    use warden_core::{ErrorKind, NoopCache, Request};

    fn config(yaml: &str) -> MechanismConfig {
        yaml_serde::from_str(yaml).unwrap()
    }

    fn ctx(authorization: Option<&str>) -> RequestContext {
        let mut req = Request::new(Method::GET, Url::parse("http://foo.local/").unwrap());
        if let Some(value) = authorization {
            req = req.with_header("Authorization", value);
        }
        RequestContext::new(req, Arc::new(NoopCache))
    }

    fn basic(user: &str, password: &str) -> String {
        format!("Basic {}", STANDARD.encode(format!("{user}:{password}")))
    }

    #[test]
    fn test_requires_user_and_password() {
        let err = BasicAuthAuthenticator::new("basic", Some(&config("user_id: foo"))).unwrap_err();
        assert!(err.to_string().contains("'password' is a required field"));
        assert!(BasicAuthAuthenticator::new("basic", None).is_err());
    }

    #[tokio::test]
    async fn test_valid_credentials() {
        let auth =
            BasicAuthAuthenticator::new("basic", Some(&config("user_id: foo\npassword: bar")))
                .unwrap();
        let sub = auth.execute(&ctx(Some(&basic("foo", "bar")))).await.unwrap();
        assert_eq!(sub.id, "foo");
    }

    #[tokio::test]
    async fn test_invalid_or_missing_credentials() {
        let auth =
            BasicAuthAuthenticator::new("basic", Some(&config("user_id: foo\npassword: bar")))
                .unwrap();

        let err = auth.execute(&ctx(Some(&basic("foo", "baz")))).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Authentication);

        let err = auth.execute(&ctx(None)).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Precondition);

        let err = auth.execute(&ctx(Some("Basic !!!"))).await.unwrap_err();
        assert!(err.to_string().contains("malformed"));
    }

    #[tokio::test]
    async fn test_override_password_only() {
        let proto: Arc<dyn Authenticator> = Arc::new(
            BasicAuthAuthenticator::new("basic", Some(&config("user_id: foo\npassword: bar")))
                .unwrap(),
        );
        let configured = proto.with_config(Some(&config("password: baz"))).unwrap();

        assert!(configured.execute(&ctx(Some(&basic("foo", "baz")))).await.is_ok());
        assert!(configured.execute(&ctx(Some(&basic("foo", "bar")))).await.is_err());
    }
}
