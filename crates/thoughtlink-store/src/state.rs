//! Persisted state layout.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use thoughtlink_core::{ConnectionState, ConversationKey, Cursor, ShareConfig, ThoughtRecord};

pub const STATE_FILE: &str = "state.json";
pub const STATE_VERSION: u32 = 1;

/// A queued record plus the bookkeeping the queue needs.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct QueuedThought {
    /// Enqueue sequence number, strictly increasing.
    pub seq: u64,
    pub conversation: ConversationKey,
    pub record: ThoughtRecord,
    pub enqueued_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PersistedState {
    #[serde(default)]
    pub version: u32,
    #[serde(default)]
    pub cursors: BTreeMap<ConversationKey, Cursor>,
    /// Message identity hashes already turned into a thought, per conversation.
    #[serde(default)]
    pub shared: BTreeMap<ConversationKey, BTreeSet<String>>,
    #[serde(default)]
    pub queue: Vec<QueuedThought>,
    #[serde(default)]
    pub connection_state: ConnectionState,
    #[serde(default)]
    pub config: ShareConfig,
    #[serde(default)]
    pub next_seq: u64,
}

impl Default for PersistedState {
    fn default() -> Self {
        Self {
            version: STATE_VERSION,
            cursors: BTreeMap::new(),
            shared: BTreeMap::new(),
            queue: Vec::new(),
            connection_state: ConnectionState::Disconnected,
            config: ShareConfig::default(),
            next_seq: 0,
        }
    }
}
