//! Wire protocol for the local collective service
//!
//! HTTP:
//!   POST /thoughts   { "thoughts": [ThoughtRecord, ...] }
//!                 →  { "accepted": ["<sourceMessageId>", ...] }
//!
//! Stream (WebSocket at /stream):
//!
//! Client → Service (first frame):
//!   { "type": "hello", "client": "thoughtlink/0.3.0", "instance": "…", "contributionLevel": 3 }
//!
//! Service → Client:
//!   { "type": "welcome" }
//!   { "type": "reject", "reason": "level_unsupported" }
//!   { "type": "insight", "insight": { "id": "…", "content": "…", "origin": "…" } }

use crate::types::{InsightRecord, ThoughtRecord};
use serde::{Deserialize, Serialize};

pub const DEFAULT_SERVICE_ADDR: &str = "localhost:8080";
pub const THOUGHTS_PATH: &str = "/thoughts";
pub const STREAM_PATH: &str = "/stream";

// ---------------------------------------------------------------------------
// HTTP bodies
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThoughtBatch {
    pub thoughts: Vec<ThoughtRecord>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AcceptedResponse {
    #[serde(default)]
    pub accepted: Vec<String>,
}

// ---------------------------------------------------------------------------
// Stream frames
// ---------------------------------------------------------------------------

/// Frames the client sends on the stream.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ClientFrame {
    #[serde(rename_all = "camelCase")]
    Hello {
        client: String,
        instance: String,
        contribution_level: u8,
    },
}

impl ClientFrame {
    pub fn hello(instance: impl Into<String>, contribution_level: u8) -> Self {
        Self::Hello {
            client: format!("thoughtlink/{}", env!("CARGO_PKG_VERSION")),
            instance: instance.into(),
            contribution_level,
        }
    }
}

/// Frames the service sends on the stream.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ServiceFrame {
    Welcome,
    Reject {
        #[serde(default)]
        reason: String,
    },
    Insight {
        insight: InsightRecord,
    },
}

impl ServiceFrame {
    /// Parse one text frame. Unknown types and malformed JSON are errors.
    pub fn parse(text: &str) -> crate::Result<Self> {
        Ok(serde_json::from_str(text)?)
    }
}
