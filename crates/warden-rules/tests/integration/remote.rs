//! Integration tests for pipelines calling external endpoints.

use http::{Method, StatusCode};
use warden_core::ErrorKind;
use warden_rules::Decision;
use wiremock::matchers::{body_string_contains, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use crate::common::{TestHarness, request};

fn catalog(server: &MockServer) -> String {
    format!(
        r#"
authenticators:
  - id: anon
    type: anonymous
authorizers:
  - id: opa
    type: remote
    config:
      endpoint:
        url: {uri}/authz
      payload: "user={{{{ subject.id }}}}&path={{{{ request.path }}}}"
      forward_response_headers_to_upstream: [X-Tenant]
      cache_ttl: 1m
contextualizers:
  - id: profile
    type: generic
    config:
      endpoint:
        url: {uri}/profile
      payload: "{{{{ subject.id }}}}"
finalizers:
  - id: hdr
    type: header
    config:
      headers:
        X-Tier: "{{{{ subject.attributes.profile.tier }}}}"
"#,
        uri = server.uri()
    )
}

const RULES: &str = r#"
rules:
  - id: remote
    match:
      routes: [{path: /api/**}]
    execute:
      - authenticator: anon
      - contextualizer: profile
      - authorizer: opa
      - finalizer: hdr
"#;

#[tokio::test]
async fn test_remote_authorizer_and_contextualizer() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/profile"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"tier": "gold"})))
        .expect(2)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/authz"))
        .and(body_string_contains("user=anonymous&path=/api/orders"))
        .respond_with(ResponseTemplate::new(200).insert_header("X-Tenant", "acme"))
        .expect(1)
        .mount(&server)
        .await;

    let harness = TestHarness::with_catalog(&catalog(&server), None);
    harness.apply("test:remote", RULES).await;

    for _ in 0..2 {
        let decision = harness
            .executor
            .decide(request(Method::GET, "http://app.local/api/orders"))
            .await;
        match decision {
            Decision::Allowed { subject, headers, .. } => {
                assert_eq!(subject.attributes["profile"]["tier"], "gold");
                assert_eq!(headers.get("X-Tenant").map(String::as_str), Some("acme"));
                assert_eq!(headers.get("X-Tier").map(String::as_str), Some("gold"));
            }
            other => panic!("expected allowed, got {other:?}"),
        }
    }
    // the authorizer result is cached, the contextualizer has no cache_ttl
}

#[tokio::test]
async fn test_remote_authorizer_denial() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/profile"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"tier": "free"})))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/authz"))
        .respond_with(ResponseTemplate::new(403))
        .mount(&server)
        .await;

    let harness = TestHarness::with_catalog(&catalog(&server), None);
    harness.apply("test:remote", RULES).await;

    let Decision::Denied { error, response } = harness
        .executor
        .decide(request(Method::GET, "http://app.local/api/orders"))
        .await
    else {
        panic!("expected denied");
    };
    assert_eq!(error.kind(), ErrorKind::Authorization);
    assert_eq!(error.mechanism_id(), Some("opa"));
    assert_eq!(response.status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_unreachable_contextualizer_is_communication_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/profile"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let harness = TestHarness::with_catalog(&catalog(&server), None);
    harness.apply("test:remote", RULES).await;

    let Decision::Denied { error, response } = harness
        .executor
        .decide(request(Method::GET, "http://app.local/api/orders"))
        .await
    else {
        panic!("expected denied");
    };
    assert_eq!(error.kind(), ErrorKind::Communication);
    assert_eq!(response.status, StatusCode::BAD_GATEWAY);
}
