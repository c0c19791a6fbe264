//! Error types for the hub

use thiserror::Error;

#[derive(Debug, Error)]
pub enum HubError {
    #[error("hub is closed")]
    Closed,
}

/// Why an inbound frame could not be turned into a [`crate::ClientEvent`].
#[derive(Debug, Error)]
pub enum EnvelopeError {
    #[error("malformed envelope: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("envelope has no string `type`")]
    MissingType,

    #[error("invalid `{kind}` envelope: {source}")]
    Invalid {
        kind: String,
        #[source]
        source: serde_json::Error,
    },
}

pub type HubResult<T> = Result<T, HubError>;
