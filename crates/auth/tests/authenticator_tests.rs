use std::collections::HashMap;

use axum::http::{header::AUTHORIZATION, HeaderMap, HeaderValue};
use beacon_auth::{AuthError, Authenticator};
use beacon_config::AuthConfig;

type TestResult<T = ()> = Result<T, Box<dyn std::error::Error>>;

fn default_auth_config() -> AuthConfig {
    AuthConfig {
        session_ttl_seconds: 3_600,
        static_tokens: HashMap::new(),
    }
}

fn static_token_config() -> AuthConfig {
    AuthConfig {
        session_ttl_seconds: 3_600,
        static_tokens: HashMap::from([("svc-token".to_string(), "svc-finance".to_string())]),
    }
}

fn bearer(token: &str) -> TestResult<HeaderMap> {
    let mut headers = HeaderMap::new();
    headers.insert(AUTHORIZATION, HeaderValue::from_str(&format!("Bearer {token}"))?);
    Ok(headers)
}

#[tokio::test]
async fn issue_session_returns_token_that_authenticates() -> TestResult {
    let authenticator = Authenticator::new(default_auth_config());

    let session = authenticator.issue_session("user-42").await;
    assert!(session.expires_at.is_some());

    let resolved = authenticator.authenticate_token(&session.token).await?;
    assert_eq!(resolved.user_id, "user-42");
    assert_eq!(resolved, session);
    Ok(())
}

#[tokio::test]
async fn authenticate_token_rejects_unknown_token() -> TestResult {
    let authenticator = Authenticator::new(default_auth_config());

    let error = authenticator
        .authenticate_token("does-not-exist")
        .await
        .expect_err("unknown token should fail");
    assert!(matches!(error, AuthError::SessionNotFound));
    Ok(())
}

#[tokio::test]
async fn authenticate_token_evicts_expired_sessions() -> TestResult {
    let authenticator = Authenticator::new(AuthConfig {
        session_ttl_seconds: 0,
        static_tokens: HashMap::new(),
    });

    let session = authenticator.issue_session("user-1").await;
    assert_eq!(authenticator.session_count().await, 1);

    let error = authenticator
        .authenticate_token(&session.token)
        .await
        .expect_err("zero ttl session should already be expired");
    assert!(matches!(error, AuthError::SessionExpired));
    assert_eq!(authenticator.session_count().await, 0);
    Ok(())
}

#[tokio::test]
async fn static_tokens_never_expire() -> TestResult {
    let authenticator = Authenticator::new(AuthConfig {
        session_ttl_seconds: 0,
        ..static_token_config()
    });

    let session = authenticator.authenticate_token("svc-token").await?;
    assert_eq!(session.user_id, "svc-finance");
    assert!(session.expires_at.is_none());
    assert_eq!(authenticator.purge_expired().await, 0);
    Ok(())
}

#[tokio::test]
async fn purge_expired_drops_only_expired_sessions() -> TestResult {
    let authenticator = Authenticator::new(AuthConfig {
        session_ttl_seconds: 0,
        ..static_token_config()
    });

    authenticator.issue_session("a").await;
    authenticator.issue_session("b").await;
    assert_eq!(authenticator.session_count().await, 3);

    assert_eq!(authenticator.purge_expired().await, 2);
    assert_eq!(authenticator.session_count().await, 1);
    Ok(())
}

#[tokio::test]
async fn revoke_is_idempotent() -> TestResult {
    let authenticator = Authenticator::new(default_auth_config());
    let session = authenticator.issue_session("user-7").await;

    assert!(authenticator.revoke(&session.token).await);
    assert!(!authenticator.revoke(&session.token).await);
    assert!(matches!(
        authenticator.authenticate_token(&session.token).await,
        Err(AuthError::SessionNotFound)
    ));
    Ok(())
}

#[tokio::test]
async fn authenticate_headers_resolves_user_from_bearer_header() -> TestResult {
    let authenticator = Authenticator::new(static_token_config());

    let user_id = authenticator.authenticate_headers(&bearer("svc-token")?).await?;
    assert_eq!(user_id, "svc-finance");
    Ok(())
}

#[tokio::test]
async fn authenticate_headers_reports_missing_token() -> TestResult {
    let authenticator = Authenticator::new(static_token_config());

    let error = authenticator
        .authenticate_headers(&HeaderMap::new())
        .await
        .expect_err("missing header should fail");
    assert!(matches!(error, AuthError::MissingToken));
    Ok(())
}
