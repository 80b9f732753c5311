//! Contract tests for the authenticator and the HTTP transport against a
//! mock gateway.

use std::sync::Arc;

use serde_json::json;
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use ebms_core::EbmsError;
use ebms_gateway::{Authenticator, Credentials, GatewayTransport, HttpGateway, TokenStore};

fn credentials() -> Credentials {
    Credentials {
        username: "ws-user".to_string(),
        password: "ws-secret".to_string(),
    }
}

#[tokio::test]
async fn login_installs_token_in_store() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/ebms/login"))
        .and(body_json(json!({"username": "ws-user", "password": "ws-secret"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "result": {"token": "TOKEN-1"}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let tokens = TokenStore::new();
    let auth = Authenticator::new(
        HttpGateway::new(5).unwrap(),
        Some(format!("{}/ebms/login", server.uri())),
        Some(credentials()),
        tokens.clone(),
    );

    let token = auth.login().await.unwrap();
    assert_eq!(token, "TOKEN-1");
    assert_eq!(tokens.get().await.as_deref(), Some("TOKEN-1"));
}

#[tokio::test]
async fn login_rejection_is_an_authentication_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/ebms/login"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": false,
            "msg": "identifiants invalides"
        })))
        .mount(&server)
        .await;

    let auth = Authenticator::new(
        HttpGateway::new(5).unwrap(),
        Some(format!("{}/ebms/login", server.uri())),
        Some(credentials()),
        TokenStore::new(),
    );

    match auth.login().await {
        Err(EbmsError::Authentication(msg)) => assert_eq!(msg, "identifiants invalides"),
        other => panic!("expected authentication failure, got {other:?}"),
    }
}

#[tokio::test]
async fn login_without_token_field_fails() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/ebms/login"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "result": {}
        })))
        .mount(&server)
        .await;

    let auth = Authenticator::new(
        HttpGateway::new(5).unwrap(),
        Some(format!("{}/ebms/login", server.uri())),
        Some(credentials()),
        TokenStore::new(),
    );

    assert!(matches!(auth.login().await, Err(EbmsError::Authentication(_))));
}

#[tokio::test]
async fn missing_login_configuration_makes_no_network_call() {
    let auth = Authenticator::new(
        HttpGateway::new(5).unwrap(),
        None,
        Some(credentials()),
        TokenStore::new(),
    );
    assert!(matches!(auth.login().await, Err(EbmsError::Configuration(_))));

    let auth = Authenticator::new(
        HttpGateway::new(5).unwrap(),
        Some("http://127.0.0.1:9/ebms/login".to_string()),
        None,
        TokenStore::new(),
    );
    assert!(matches!(auth.login().await, Err(EbmsError::Configuration(_))));
}

#[tokio::test]
async fn refresh_coalesces_when_another_task_already_replaced_the_token() {
    let server = MockServer::start().await;
    // A second login would trip the expect(1) guard.
    Mock::given(method("POST"))
        .and(path("/ebms/login"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "result": {"token": "TOKEN-2"}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let tokens = TokenStore::new();
    tokens.set("STALE").await;
    let auth = Authenticator::new(
        HttpGateway::new(5).unwrap(),
        Some(format!("{}/ebms/login", server.uri())),
        Some(credentials()),
        tokens.clone(),
    );

    // First caller saw STALE refused and refreshes.
    let fresh = auth.refresh(Some("STALE")).await.unwrap();
    assert_eq!(fresh, "TOKEN-2");

    // Second caller also saw STALE refused, but the store has moved on:
    // it gets the fresh token without another login.
    let reused = auth.refresh(Some("STALE")).await.unwrap();
    assert_eq!(reused, "TOKEN-2");
}

#[tokio::test]
async fn transport_sends_bearer_and_json_content_type() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/ebms/addInvoice"))
        .and(header("Authorization", "Bearer TOKEN-9"))
        .and(header("Content-Type", "application/json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"success": true})))
        .expect(1)
        .mount(&server)
        .await;

    let gateway = HttpGateway::new(5).unwrap();
    let reply = gateway
        .post_json(
            &format!("{}/ebms/addInvoice", server.uri()),
            Some("TOKEN-9"),
            &json!({"invoice_number": "INV/001"}),
        )
        .await
        .unwrap();
    assert!(reply.is_http_success());
}

#[tokio::test]
async fn connection_failure_is_a_transport_error() {
    let gateway = HttpGateway::new(1).unwrap();
    let result = gateway
        .post_json("http://127.0.0.1:1/ebms/addInvoice", None, &json!({}))
        .await;
    assert!(matches!(result, Err(EbmsError::Transport(_))));
}
