//! Integration tests for local rule pipelines.

use http::{Method, StatusCode};
use warden_core::ErrorKind;
use warden_rules::Decision;

use crate::common::{TestHarness, request};

const RULES: &str = r#"
version: "1"
name: test rules
rules:
  - id: public
    match:
      routes:
        - path: /public/**
      methods: [GET]
    execute:
      - authenticator: anon
      - finalizer: hdr
      - finalizer: session
  - id: private
    match:
      routes:
        - path: /private/**
    execute:
      - authenticator: deny_all
    on_error:
      - error_handler: login
  - id: admin
    match:
      routes:
        - path: /admin/**
    execute:
      - authenticator: anon
      - authorizer: deny
    on_error:
      - error_handler: login
  - id: basic
    match:
      routes:
        - path: /basic/**
    execute:
      - authenticator: deny_all
      - authenticator: basic
      - finalizer: hdr
"#;

#[tokio::test]
async fn test_anonymous_with_header_finalizer() {
    let harness = TestHarness::new();
    harness.apply("test:rules", RULES).await;

    let decision = harness
        .executor
        .decide(request(Method::GET, "http://app.local/public/index.html"))
        .await;

    match decision {
        Decision::Allowed {
            subject,
            headers,
            cookies,
        } => {
            assert_eq!(subject.id, "anonymous");
            assert_eq!(headers.get("X-User").map(String::as_str), Some("anonymous"));
            assert_eq!(
                cookies.get("session_user").map(String::as_str),
                Some("anonymous")
            );
        }
        other => panic!("expected allowed, got {other:?}"),
    }
}

#[tokio::test]
async fn test_failed_authentication_redirects() {
    let harness = TestHarness::new();
    harness.apply("test:rules", RULES).await;

    let decision = harness
        .executor
        .decide(request(Method::GET, "http://app.local/private/data"))
        .await;

    let Decision::Denied { error, response } = decision else {
        panic!("expected denied");
    };
    assert_eq!(error.kind(), ErrorKind::Authentication);
    assert_eq!(response.status, StatusCode::FOUND);
    let location = response.headers.get("location").unwrap();
    assert!(location.starts_with("http://auth.local/login?origin="));
    assert!(location.contains("private"));
}

#[tokio::test]
async fn test_error_handler_condition_falls_back_to_default() {
    let harness = TestHarness::new();
    harness.apply("test:rules", RULES).await;

    // the login handler only accepts authentication errors
    let decision = harness
        .executor
        .decide(request(Method::GET, "http://app.local/admin/users"))
        .await;

    let Decision::Denied { error, response } = decision else {
        panic!("expected denied");
    };
    assert_eq!(error.kind(), ErrorKind::Authorization);
    assert_eq!(error.mechanism_id(), Some("deny"));
    assert_eq!(response.status, StatusCode::FORBIDDEN);
    assert!(response.headers.is_empty());
}

#[tokio::test]
async fn test_authenticator_fallthrough() {
    let harness = TestHarness::new();
    harness.apply("test:rules", RULES).await;

    let allowed = harness
        .executor
        .decide(
            request(Method::GET, "http://app.local/basic/x")
                .with_header("authorization", "Basic YWxpY2U6c2VjcmV0"),
        )
        .await;
    match allowed {
        Decision::Allowed { subject, headers, .. } => {
            assert_eq!(subject.id, "alice");
            assert_eq!(headers.get("X-User").map(String::as_str), Some("alice"));
        }
        other => panic!("expected allowed, got {other:?}"),
    }

    let denied = harness
        .executor
        .decide(request(Method::GET, "http://app.local/basic/x"))
        .await;
    let Decision::Denied { error, response } = denied else {
        panic!("expected denied");
    };
    assert_eq!(error.kind(), ErrorKind::Authentication);
    assert_eq!(error.mechanism_id(), Some("basic"));
    assert_eq!(response.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_no_rule_and_method_not_allowed() {
    let harness = TestHarness::new();
    harness.apply("test:rules", RULES).await;

    let decision = harness
        .executor
        .decide(request(Method::GET, "http://app.local/unknown"))
        .await;
    let Decision::Denied { error, response } = decision else {
        panic!("expected denied");
    };
    assert_eq!(error.kind(), ErrorKind::NoRule);
    assert_eq!(response.status, StatusCode::NOT_FOUND);

    let decision = harness
        .executor
        .decide(request(Method::POST, "http://app.local/public/index.html"))
        .await;
    let Decision::Denied { error, response } = decision else {
        panic!("expected denied");
    };
    assert_eq!(error.kind(), ErrorKind::MethodNotAllowed);
    assert_eq!(response.status, StatusCode::METHOD_NOT_ALLOWED);
}

#[tokio::test]
async fn test_default_rule_applies_when_nothing_matches() {
    let harness = TestHarness::with_default_rule(
        "execute:\n  - authenticator: anon\n    config:\n      subject: guest\n  - finalizer: hdr",
    );
    harness.apply("test:rules", RULES).await;

    let decision = harness
        .executor
        .decide(request(Method::DELETE, "http://app.local/elsewhere"))
        .await;
    match decision {
        Decision::Allowed { subject, headers, .. } => {
            assert_eq!(subject.id, "guest");
            assert_eq!(headers.get("X-User").map(String::as_str), Some("guest"));
        }
        other => panic!("expected allowed, got {other:?}"),
    }
}

#[tokio::test]
async fn test_rule_override_applies_only_to_rule() {
    let harness = TestHarness::new();
    harness
        .apply(
            "test:overrides",
            r#"
rules:
  - id: a
    match:
      routes: [{path: /a}]
    execute:
      - authenticator: anon
        config:
          subject: bob
  - id: b
    match:
      routes: [{path: /b}]
    execute:
      - authenticator: anon
"#,
        )
        .await;

    let a = harness
        .executor
        .decide(request(Method::GET, "http://app.local/a"))
        .await;
    let b = harness
        .executor
        .decide(request(Method::GET, "http://app.local/b"))
        .await;

    let (Decision::Allowed { subject: a, .. }, Decision::Allowed { subject: b, .. }) = (a, b)
    else {
        panic!("expected both allowed");
    };
    assert_eq!(a.id, "bob");
    assert_eq!(b.id, "anonymous");
}

#[tokio::test]
async fn test_deleted_rule_set_stops_matching() {
    let harness = TestHarness::new();
    harness.apply("test:rules", RULES).await;
    assert!(
        harness
            .executor
            .decide(request(Method::GET, "http://app.local/public/a"))
            .await
            .is_allowed()
    );

    use warden_rules::{RuleSet, RuleSetProcessor};
    harness
        .repository
        .on_deleted(&RuleSet::empty("test:rules"))
        .await
        .unwrap();

    let decision = harness
        .executor
        .decide(request(Method::GET, "http://app.local/public/a"))
        .await;
    assert!(!decision.is_allowed());
}
