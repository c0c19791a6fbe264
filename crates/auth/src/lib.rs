use std::collections::HashMap;
use std::sync::Arc;

use axum::http::{header, HeaderMap};
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use beacon_config::AuthConfig;
use chrono::{DateTime, Duration, Utc};
use rand::RngCore;
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::{debug, info};

/// Verifies bearer tokens presented at the WebSocket handshake.
///
/// Sessions live in memory only. Tokens listed in `auth.static_tokens` are
/// seeded at construction and never expire.
#[derive(Clone)]
pub struct Authenticator {
    sessions: Arc<RwLock<HashMap<String, AuthSession>>>,
    session_ttl: Duration,
}

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("missing bearer token")]
    MissingToken,
    #[error("session not found")]
    SessionNotFound,
    #[error("session expired")]
    SessionExpired,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthSession {
    pub token: String,
    pub user_id: String,
    /// `None` for static tokens.
    pub expires_at: Option<DateTime<Utc>>,
}

impl AuthSession {
    fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|expires_at| expires_at <= now)
    }
}

impl Authenticator {
    pub fn new(config: AuthConfig) -> Self {
        let session_ttl = i64::try_from(config.session_ttl_seconds)
            .ok()
            .and_then(Duration::try_seconds)
            .unwrap_or(Duration::MAX);

        let sessions = config
            .static_tokens
            .into_iter()
            .map(|(token, user_id)| {
                let session = AuthSession {
                    token: token.clone(),
                    user_id,
                    expires_at: None,
                };
                (token, session)
            })
            .collect::<HashMap<_, _>>();

        if !sessions.is_empty() {
            info!(count = sessions.len(), "seeded static tokens");
        }

        Self {
            sessions: Arc::new(RwLock::new(sessions)),
            session_ttl,
        }
    }

    pub async fn issue_session(&self, user_id: impl Into<String>) -> AuthSession {
        let token = generate_session_token();
        let expires_at = Utc::now()
            .checked_add_signed(self.session_ttl)
            .unwrap_or(DateTime::<Utc>::MAX_UTC);

        let session = AuthSession {
            token: token.clone(),
            user_id: user_id.into(),
            expires_at: Some(expires_at),
        };

        self.sessions.write().await.insert(token, session.clone());
        debug!(user_id = %session.user_id, "issued session");
        session
    }

    pub async fn authenticate_token(&self, token: &str) -> Result<AuthSession, AuthError> {
        let session = self
            .sessions
            .read()
            .await
            .get(token)
            .cloned()
            .ok_or(AuthError::SessionNotFound)?;

        if session.is_expired(Utc::now()) {
            self.sessions.write().await.remove(token);
            return Err(AuthError::SessionExpired);
        }

        Ok(session)
    }

    /// Resolve the user behind a handshake's `Authorization` header.
    pub async fn authenticate_headers(&self, headers: &HeaderMap) -> Result<String, AuthError> {
        let token = extract_bearer(headers).ok_or(AuthError::MissingToken)?;
        let session = self.authenticate_token(token).await?;
        Ok(session.user_id)
    }

    pub async fn revoke(&self, token: &str) -> bool {
        self.sessions.write().await.remove(token).is_some()
    }

    pub async fn purge_expired(&self) -> usize {
        let now = Utc::now();
        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        sessions.retain(|_, session| !session.is_expired(now));
        let purged = before - sessions.len();
        if purged > 0 {
            debug!(purged, "purged expired sessions");
        }
        purged
    }

    pub async fn session_count(&self) -> usize {
        self.sessions.read().await.len()
    }
}

/// Extract the token from an `Authorization: Bearer <token>` header.
pub fn extract_bearer(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

fn generate_session_token() -> String {
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}
