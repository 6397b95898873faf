//! Core types for Thoughtlink

use crate::error::{Error, Result};
use crate::hash;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Chat platform a page belongs to.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum PlatformId {
    Chatgpt,
    Claude,
    Gemini,
    Perplexity,
    /// No adapter matched the page origin.
    Unsupported,
}

impl PlatformId {
    pub const SUPPORTED: [PlatformId; 4] = [
        PlatformId::Chatgpt,
        PlatformId::Claude,
        PlatformId::Gemini,
        PlatformId::Perplexity,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            PlatformId::Chatgpt => "chatgpt",
            PlatformId::Claude => "claude",
            PlatformId::Gemini => "gemini",
            PlatformId::Perplexity => "perplexity",
            PlatformId::Unsupported => "unsupported",
        }
    }
}

impl std::fmt::Display for PlatformId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PlatformId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "chatgpt" => Ok(PlatformId::Chatgpt),
            "claude" => Ok(PlatformId::Claude),
            "gemini" => Ok(PlatformId::Gemini),
            "perplexity" => Ok(PlatformId::Perplexity),
            "unsupported" => Ok(PlatformId::Unsupported),
            other => Err(Error::UnknownPlatform(other.to_string())),
        }
    }
}

/// Message author
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

/// One message extracted from a chat page.
///
/// Identity is `(platform, id)`. When the page offers no stable id the adapter
/// derives one from the content, so [`ConversationMessage::content_hash`] and the
/// id agree across re-renders.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct ConversationMessage {
    pub id: String,
    pub role: Role,
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
    pub platform: PlatformId,
}

impl ConversationMessage {
    pub fn new(id: impl Into<String>, role: Role, text: impl Into<String>, platform: PlatformId) -> Self {
        Self {
            id: id.into(),
            role,
            text: text.into(),
            timestamp: None,
            platform,
        }
    }

    pub fn user(id: impl Into<String>, text: impl Into<String>, platform: PlatformId) -> Self {
        Self::new(id, Role::User, text, platform)
    }

    pub fn assistant(id: impl Into<String>, text: impl Into<String>, platform: PlatformId) -> Self {
        Self::new(id, Role::Assistant, text, platform)
    }

    pub fn with_timestamp(mut self, ts: DateTime<Utc>) -> Self {
        self.timestamp = Some(ts);
        self
    }

    /// Hash over platform, role, and normalized text. Independent of `id`.
    pub fn content_hash(&self) -> String {
        hash::content_hash(&[
            self.platform.as_str(),
            self.role.as_str(),
            &hash::normalize_text(&self.text),
        ])
    }

    /// Key in the shared ledger: `(platform, id)` plus role and normalized text.
    /// Two messages with the same text but different ids get different keys.
    pub fn identity_hash(&self) -> String {
        hash::content_hash(&[
            self.platform.as_str(),
            &self.id,
            self.role.as_str(),
            &hash::normalize_text(&self.text),
        ])
    }
}

/// Stable key for one conversation: `<platform>:<conversation id>`.
#[derive(Clone, Debug, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConversationKey(String);

impl ConversationKey {
    pub fn new(platform: PlatformId, conversation_id: &str) -> Self {
        Self(format!("{}:{}", platform, conversation_id))
    }

    /// Derive the key from a page URL. Chat platforms put the conversation id in
    /// the last path segment (`/c/<id>`, `/chat/<id>`, `/app/<id>`, `/search/<id>`);
    /// a bare origin maps to `<platform>:new`.
    pub fn from_url(platform: PlatformId, page_url: &str) -> Result<Self> {
        let parsed = url::Url::parse(page_url).map_err(|e| Error::InvalidUrl(format!("{}: {}", page_url, e)))?;
        let id = parsed
            .path_segments()
            .and_then(|segments| segments.filter(|s| !s.is_empty()).last())
            .unwrap_or("new");
        Ok(Self::new(platform, id))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ConversationKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for ConversationKey {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// A filtered, shareable extract of one conversational message.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ThoughtRecord {
    pub source_message_id: String,
    pub content: String,
    pub contribution_level: u8,
    pub anonymized: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub platform: Option<PlatformId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extracted_at: Option<DateTime<Utc>>,
}

/// A unit of content received back from the collective service.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct InsightRecord {
    pub id: String,
    pub content: String,
    #[serde(default)]
    pub origin: String,
    #[serde(default = "Utc::now")]
    pub received_at: DateTime<Utc>,
}

/// Connection state of the sync client.
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connecting,
    Connected,
    Backoff,
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ConnectionState::Disconnected => "disconnected",
            ConnectionState::Connecting => "connecting",
            ConnectionState::Connected => "connected",
            ConnectionState::Backoff => "backoff",
        };
        f.write_str(s)
    }
}

/// Marker of the last message handed to the thought filter for one conversation.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Cursor {
    #[serde(default)]
    pub last_message_id: Option<String>,
    #[serde(default)]
    pub last_hash: Option<String>,
    /// Number of messages handed off so far.
    #[serde(default)]
    pub position: usize,
    pub updated_at: DateTime<Utc>,
}

impl Cursor {
    /// Cursor pointing just past `message`, which sits at index `position - 1`.
    pub fn after(message: &ConversationMessage, position: usize, now: DateTime<Utc>) -> Self {
        Self {
            last_message_id: Some(message.id.clone()),
            last_hash: Some(message.content_hash()),
            position,
            updated_at: now,
        }
    }

    /// Whether `self` should replace `current` under last-write-wins.
    /// A cursor never moves backwards.
    pub fn supersedes(&self, current: &Cursor) -> bool {
        self.updated_at >= current.updated_at && self.position >= current.position
    }
}
