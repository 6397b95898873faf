//! Static platform profiles and the default origin table.
//!
//! Supporting a new site means adding a `PlatformProfile` and a route here;
//! no code changes elsewhere.

use thoughtlink_core::PlatformId;

/// How a turn element's author is determined.
#[derive(Debug, Clone, Copy)]
pub enum RoleRule {
    /// Read an attribute on the turn element and compare against two values.
    Attribute {
        name: &'static str,
        user: &'static str,
        assistant: &'static str,
    },
    /// The turn element matches one of two selectors.
    Selectors {
        user: &'static str,
        assistant: &'static str,
    },
}

#[derive(Debug, Clone, Copy)]
pub struct PlatformProfile {
    pub platform: PlatformId,
    /// Matches every message container, in document order.
    pub turn: &'static str,
    pub role: RoleRule,
    /// Attribute on the turn element holding a stable message id.
    pub id_attr: Option<&'static str>,
    /// Descendant holding the message body. Whole turn text when absent.
    pub text: Option<&'static str>,
    /// Marks a turn (itself, a descendant, or an ancestor) as still streaming.
    pub streaming: Option<&'static str>,
    /// Descendant carrying an RFC 3339 `datetime` attribute.
    pub timestamp: Option<&'static str>,
}

pub const CHATGPT: PlatformProfile = PlatformProfile {
    platform: PlatformId::Chatgpt,
    turn: "div[data-message-author-role]",
    role: RoleRule::Attribute {
        name: "data-message-author-role",
        user: "user",
        assistant: "assistant",
    },
    id_attr: Some("data-message-id"),
    text: Some(".markdown, .whitespace-pre-wrap"),
    streaming: Some(".result-streaming"),
    timestamp: Some("time[datetime]"),
};

pub const CLAUDE: PlatformProfile = PlatformProfile {
    platform: PlatformId::Claude,
    turn: "[data-testid=\"user-message\"], .font-claude-message",
    role: RoleRule::Selectors {
        user: "[data-testid=\"user-message\"]",
        assistant: ".font-claude-message",
    },
    id_attr: None,
    text: None,
    streaming: Some("[data-is-streaming=\"true\"]"),
    timestamp: Some("time[datetime]"),
};

pub const GEMINI: PlatformProfile = PlatformProfile {
    platform: PlatformId::Gemini,
    turn: "user-query, model-response",
    role: RoleRule::Selectors {
        user: "user-query",
        assistant: "model-response",
    },
    id_attr: Some("data-turn-id"),
    text: Some(".query-text, message-content"),
    streaming: Some("[aria-busy=\"true\"]"),
    timestamp: None,
};

pub const PERPLEXITY: PlatformProfile = PlatformProfile {
    platform: PlatformId::Perplexity,
    turn: "[data-testid=\"user-query\"], [data-testid=\"answer\"]",
    role: RoleRule::Selectors {
        user: "[data-testid=\"user-query\"]",
        assistant: "[data-testid=\"answer\"]",
    },
    id_attr: Some("data-entry-id"),
    text: Some(".prose"),
    streaming: Some("[data-streaming=\"true\"]"),
    timestamp: None,
};

pub const PROFILES: [PlatformProfile; 4] = [CHATGPT, CLAUDE, GEMINI, PERPLEXITY];

/// Ordered `(hostname pattern, platform)` table. First match wins.
pub const DEFAULT_ROUTES: &[(&str, PlatformId)] = &[
    ("chatgpt.com", PlatformId::Chatgpt),
    ("*.chatgpt.com", PlatformId::Chatgpt),
    ("chat.openai.com", PlatformId::Chatgpt),
    ("claude.ai", PlatformId::Claude),
    ("*.claude.ai", PlatformId::Claude),
    ("gemini.google.com", PlatformId::Gemini),
    ("perplexity.ai", PlatformId::Perplexity),
    ("*.perplexity.ai", PlatformId::Perplexity),
];
