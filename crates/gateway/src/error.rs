//! Error types for the gateway layer

use std::borrow::Cow;

use axum::{
    extract::ws::CloseFrame,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use beacon_auth::AuthError;
use beacon_hub::{close_code, HubError};
use serde_json::json;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum GatewayError {
    #[error("Authentication failed: {0}")]
    Unauthorized(#[from] AuthError),

    #[error("Hub unavailable: {0}")]
    HubUnavailable(#[from] HubError),
}

impl GatewayError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            GatewayError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            GatewayError::HubUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        }
    }

    /// Close frame sent to a WebSocket that failed its handshake.
    ///
    /// The reason text is fixed so clients never see internals.
    pub fn close_frame(&self) -> CloseFrame<'static> {
        let (code, reason) = match self {
            GatewayError::Unauthorized(_) => (close_code::POLICY_VIOLATION, "Unauthorized"),
            GatewayError::HubUnavailable(_) => (close_code::INTERNAL_ERROR, "Connection error"),
        };
        CloseFrame {
            code,
            reason: Cow::Borrowed(reason),
        }
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let error_response = json!({
            "error": status.as_str(),
            "message": self.to_string(),
        });

        (status, Json(error_response)).into_response()
    }
}

pub type GatewayResult<T> = Result<T, GatewayError>;
