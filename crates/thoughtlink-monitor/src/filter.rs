//! Thought filter: decides whether a new message becomes a shareable record.
//!
//! `(ConversationMessage, ShareConfig) -> Option<ThoughtRecord>`, deterministic.
//! The only state is the compiled pattern set.

use regex::Regex;
use thoughtlink_core::hash::short_hash;
use thoughtlink_core::{ContributionLevel, ConversationMessage, Error, FilterSensitivity, Result, Role, ShareConfig, ThoughtRecord};
use tracing::debug;

const HIGH_PRIORITY_CHARS: usize = 280;
const LOW_PRIORITY_CHARS: usize = 40;

const PLEASANTRIES: &[&str] = &[
    "thanks", "thank you", "thx", "ty", "ok", "okay", "k", "hello", "hi", "hey", "bye", "goodbye", "cool",
    "great", "nice", "got it", "sure", "yes", "no", "you're welcome",
];

const REASONING_MARKERS: &str = r"(?i)\b(because|therefore|thus|hence|consequently|in summary|to summarize|in conclusion|step \d+)\b";
const NUMBERED_STEPS: &str = r"(?m)^\s*\d+[.)]\s+\S";

/// (name, pattern, minimum sensitivity that enables it)
const SENSITIVE_PATTERNS: &[(&str, &str, FilterSensitivity)] = &[
    ("api_key", r"\b(?:sk|pk|rk)-[A-Za-z0-9_-]{16,}", FilterSensitivity::Low),
    ("aws_key", r"\bAKIA[0-9A-Z]{16}\b", FilterSensitivity::Low),
    ("github_token", r"\bgh[pousr]_[A-Za-z0-9]{30,}\b", FilterSensitivity::Low),
    ("credential", r"(?i)\b(?:api[_-]?key|secret|token|password|passwd|pwd)\s*[:=]\s*\S+", FilterSensitivity::Low),
    ("private_key", r"-----BEGIN [A-Z ]*PRIVATE KEY-----", FilterSensitivity::Low),
    ("bearer", r"(?i)\bbearer\s+[A-Za-z0-9._~+/-]{16,}=*", FilterSensitivity::Low),
    ("email", r"(?i)\b[A-Z0-9._%+-]+@[A-Z0-9.-]+\.[A-Z]{2,}\b", FilterSensitivity::Medium),
    ("phone", r"(?:\+\d{1,3}[\s.-]?)?\(?\b\d{3}\)?[\s.-]?\d{3}[\s.-]\d{4}\b", FilterSensitivity::Medium),
    ("payment_card", r"\b(?:\d[ -]?){12,18}\d\b", FilterSensitivity::Medium),
    ("ipv4", r"\b(?:\d{1,3}\.){3}\d{1,3}\b", FilterSensitivity::High),
    ("url_query", r"(?i)\bhttps?://[^\s?#]+\?[^\s#]+", FilterSensitivity::High),
    ("self_identification", r"(?i)\b(?:my name is|i live at|my address is|i was born on)\b", FilterSensitivity::High),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Priority {
    Low,
    Normal,
    High,
}

/// Which (role, priority) pairs a contribution level admits.
pub fn is_eligible(level: ContributionLevel, role: Role, priority: Priority) -> bool {
    let assistant = role == Role::Assistant;
    match level.get() {
        1 => assistant && priority == Priority::High,
        2 => priority == Priority::High,
        3 => assistant && priority >= Priority::Normal,
        4 => priority >= Priority::Normal,
        _ => true,
    }
}

fn is_pleasantry(text: &str) -> bool {
    let bare = text
        .trim()
        .trim_end_matches(|c: char| c.is_ascii_punctuation() || c.is_whitespace())
        .to_lowercase();
    PLEASANTRIES.contains(&bare.as_str())
}

pub struct ThoughtFilter {
    reasoning: Regex,
    steps: Regex,
    sensitive: Vec<(&'static str, Regex, FilterSensitivity)>,
}

impl ThoughtFilter {
    pub fn new() -> Result<Self> {
        let compile = |pattern: &str| Regex::new(pattern).map_err(|e| Error::config(format!("filter pattern: {}", e)));
        let mut sensitive = Vec::with_capacity(SENSITIVE_PATTERNS.len());
        for (name, pattern, level) in SENSITIVE_PATTERNS {
            sensitive.push((*name, compile(pattern)?, *level));
        }
        Ok(Self {
            reasoning: compile(REASONING_MARKERS)?,
            steps: compile(NUMBERED_STEPS)?,
            sensitive,
        })
    }

    pub fn classify(&self, message: &ConversationMessage) -> Priority {
        let text = message.text.trim();
        if is_pleasantry(text) {
            return Priority::Low;
        }
        if text.chars().count() >= HIGH_PRIORITY_CHARS
            || text.contains("```")
            || self.reasoning.is_match(text)
            || self.steps.is_match(text)
        {
            return Priority::High;
        }
        if text.chars().count() < LOW_PRIORITY_CHARS {
            return Priority::Low;
        }
        Priority::Normal
    }

    /// Name of the first pattern enabled at `sensitivity` that matches `text`.
    pub fn sensitive_match(&self, text: &str, sensitivity: FilterSensitivity) -> Option<&'static str> {
        self.sensitive
            .iter()
            .filter(|(_, _, min)| *min <= sensitivity)
            .find(|(_, re, _)| re.is_match(text))
            .map(|(name, _, _)| *name)
    }

    pub fn filter(&self, message: &ConversationMessage, config: &ShareConfig) -> Option<ThoughtRecord> {
        if !config.auto_share {
            return None;
        }
        let priority = self.classify(message);
        if !is_eligible(config.contribution_level, message.role, priority) {
            return None;
        }
        if let Some(pattern) = self.sensitive_match(&message.text, config.filter_sensitivity) {
            debug!("Message {} withheld ({} pattern)", message.id, pattern);
            return None;
        }

        let level = config.contribution_level.get();
        let record = if config.anonymous_mode {
            let hash = message.content_hash();
            ThoughtRecord {
                source_message_id: format!("anon-{}", short_hash(&[message.platform.as_str(), &message.id, &hash])),
                content: message.text.clone(),
                contribution_level: level,
                anonymized: true,
                platform: None,
                extracted_at: None,
            }
        } else {
            ThoughtRecord {
                source_message_id: message.id.clone(),
                content: message.text.clone(),
                contribution_level: level,
                anonymized: false,
                platform: Some(message.platform),
                extracted_at: message.timestamp,
            }
        };
        Some(record)
    }
}
