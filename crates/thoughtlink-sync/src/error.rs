//! Sync client errors

use crate::machine::MachineEvent;
use thoughtlink_core::ConnectionState;

pub type SyncResult<T> = Result<T, SyncError>;

#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    #[error("connect failed: {0}")]
    ConnectFailed(String),

    #[error("handshake rejected: {0}")]
    Rejected(String),

    #[error("handshake timed out")]
    HandshakeTimeout,

    #[error("send failed: {0}")]
    SendFailed(String),

    #[error("invalid response: {0}")]
    InvalidResponse(String),

    #[error("invalid transition: {event:?} while {from}")]
    InvalidTransition { from: ConnectionState, event: MachineEvent },

    #[error("insight stream closed")]
    StreamClosed,

    #[error("invalid service address: {0}")]
    InvalidAddress(String),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("network error: {0}")]
    NetworkError(#[from] reqwest::Error),

    #[error("websocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),
}

impl SyncError {
    /// A reject is the service's answer; everything else is a transport failure.
    pub fn is_rejection(&self) -> bool {
        matches!(self, SyncError::Rejected(_))
    }
}
