//! Command handlers.

use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use tokio::net::TcpListener;

use crate::api::{self, ApiState, HEALTH_PATH};
use crate::config::WardenConfig;
use crate::gateway::Gateway;
use crate::logging;

const HEALTH_TIMEOUT: Duration = Duration::from_secs(5);

/// Run the gateway until interrupted.
pub async fn serve(path: &Path) -> Result<()> {
    let config = WardenConfig::load(path)?;
    logging::init(&config.log)?;

    let gateway = Gateway::build(&config)?;
    gateway.start().await?;

    let address = config.serve.address();
    let listener = TcpListener::bind(&address)
        .await
        .with_context(|| format!("failed to bind {address}"))?;
    tracing::info!(%address, "Decision API listening");

    let state = ApiState::new(gateway.executor().clone(), config.serve.verbose_errors);
    let served = api::serve(listener, state, shutdown_signal()).await;

    gateway.stop().await;
    served.context("decision API failed")
}

/// Build every component and report the first configuration error.
pub fn validate(path: &Path) -> Result<()> {
    let config = WardenConfig::load(path)?;
    Gateway::build(&config)?;
    println!("{}: configuration is valid", path.display());
    Ok(())
}

/// Query the health endpoint below `endpoint`.
pub async fn health(endpoint: &str) -> Result<()> {
    let url = format!("{}{HEALTH_PATH}", endpoint.trim_end_matches('/'));
    let response = reqwest::Client::new()
        .get(&url)
        .timeout(HEALTH_TIMEOUT)
        .send()
        .await
        .with_context(|| format!("failed to reach {url}"))?;

    let status = response.status();
    if !status.is_success() {
        bail!("{url} answered {status}");
    }

    let body: serde_json::Value = response
        .json()
        .await
        .with_context(|| format!("{url} returned an invalid body"))?;
    if body["status"] != "ok" {
        bail!("{url} reported status {}", body["status"]);
    }

    println!("ok");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    tracing::info!("Shutdown signal received");
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::io::Write;

    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    #[tokio::test]
    async fn test_health_ok() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(HEALTH_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"status": "ok"})))
            .expect(1)
            .mount(&server)
            .await;

        health(&format!("{}/", server.uri())).await.unwrap();
    }

    #[tokio::test]
    async fn test_health_failure() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(HEALTH_PATH))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let err = health(&server.uri()).await.unwrap_err();
        assert!(err.to_string().contains("503"));
    }

    #[test]
    fn test_validate() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"mechanisms:\n  authenticators:\n    - id: anon\n      type: anonymous\ndefault_rule:\n  execute:\n    - authenticator: anon\n")
            .unwrap();
        validate(file.path()).unwrap();

        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"default_rule:\n  execute:\n    - authenticator: anon\n")
            .unwrap();
        let err = validate(file.path()).unwrap_err();
        assert!(err.to_string().contains("no authenticator prototype for id 'anon'"));
    }
}
