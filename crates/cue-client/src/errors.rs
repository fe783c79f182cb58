//! Transport errors. All of them end in a scheduled retry.

use tokio_tungstenite::tungstenite;

#[derive(Debug, thiserror::Error)]
pub enum ConnectionError {
    #[error("invalid bridge url: {0}")]
    InvalidUrl(String),

    #[error("connect failed: {0}")]
    Connect(#[source] tungstenite::Error),

    #[error("send failed: {0}")]
    Send(#[source] tungstenite::Error),
}

impl ConnectionError {
    pub fn error_kind(&self) -> &'static str {
        match self {
            Self::InvalidUrl(_) => "invalid_url",
            Self::Connect(_) => "connect",
            Self::Send(_) => "send",
        }
    }
}
