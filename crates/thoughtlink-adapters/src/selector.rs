//! Profile-driven extraction over an HTML snapshot.

use crate::adapter::{PageSnapshot, PlatformAdapter};
use crate::profiles::{PlatformProfile, RoleRule};
use chrono::{DateTime, Utc};
use scraper::{ElementRef, Html, Selector};
use std::collections::{HashMap, HashSet};
use thoughtlink_core::hash::{normalize_text, short_hash};
use thoughtlink_core::{ConversationMessage, Error, PlatformId, Result, Role};
use tracing::debug;

enum CompiledRole {
    Attribute {
        name: &'static str,
        user: &'static str,
        assistant: &'static str,
    },
    Selectors { user: Selector, assistant: Selector },
}

/// A `PlatformProfile` with its selectors parsed.
pub struct SelectorAdapter {
    platform: PlatformId,
    turn: Selector,
    role: CompiledRole,
    id_attr: Option<&'static str>,
    text: Option<Selector>,
    streaming: Option<Selector>,
    timestamp: Option<Selector>,
}

fn parse_selector(platform: PlatformId, css: &str) -> Result<Selector> {
    Selector::parse(css).map_err(|e| Error::config(format!("{} selector {:?}: {:?}", platform, css, e)))
}

impl SelectorAdapter {
    pub fn compile(profile: &PlatformProfile) -> Result<Self> {
        let p = profile.platform;
        let role = match profile.role {
            RoleRule::Attribute { name, user, assistant } => CompiledRole::Attribute { name, user, assistant },
            RoleRule::Selectors { user, assistant } => CompiledRole::Selectors {
                user: parse_selector(p, user)?,
                assistant: parse_selector(p, assistant)?,
            },
        };
        Ok(Self {
            platform: p,
            turn: parse_selector(p, profile.turn)?,
            role,
            id_attr: profile.id_attr,
            text: profile.text.map(|s| parse_selector(p, s)).transpose()?,
            streaming: profile.streaming.map(|s| parse_selector(p, s)).transpose()?,
            timestamp: profile.timestamp.map(|s| parse_selector(p, s)).transpose()?,
        })
    }

    fn role_of(&self, el: &ElementRef) -> Option<Role> {
        match &self.role {
            CompiledRole::Attribute { name, user, assistant } => match el.value().attr(name) {
                Some(v) if v == *user => Some(Role::User),
                Some(v) if v == *assistant => Some(Role::Assistant),
                _ => None,
            },
            CompiledRole::Selectors { user, assistant } => {
                if user.matches(el) {
                    Some(Role::User)
                } else if assistant.matches(el) {
                    Some(Role::Assistant)
                } else {
                    None
                }
            }
        }
    }

    fn is_streaming(&self, el: &ElementRef) -> bool {
        let Some(sel) = &self.streaming else {
            return false;
        };
        if sel.matches(el) || el.select(sel).next().is_some() {
            return true;
        }
        el.ancestors()
            .filter_map(ElementRef::wrap)
            .any(|ancestor| sel.matches(&ancestor))
    }

    fn text_of(&self, el: &ElementRef) -> String {
        let raw: String = match &self.text {
            Some(sel) => match el.select(sel).next() {
                Some(body) => body.text().collect(),
                None => el.text().collect(),
            },
            None => el.text().collect(),
        };
        normalize_text(&raw)
    }

    fn timestamp_of(&self, el: &ElementRef) -> Option<DateTime<Utc>> {
        let sel = self.timestamp.as_ref()?;
        let time = el.select(sel).next()?;
        let raw = time.value().attr("datetime")?;
        DateTime::parse_from_rfc3339(raw).ok().map(|dt| dt.with_timezone(&Utc))
    }
}

impl PlatformAdapter for SelectorAdapter {
    fn platform_id(&self) -> PlatformId {
        self.platform
    }

    fn extract_conversation(&self, page: &PageSnapshot) -> Vec<ConversationMessage> {
        let document = Html::parse_document(&page.html);
        let mut taken = HashSet::new();
        let mut occurrences: HashMap<(Role, String), usize> = HashMap::new();
        let mut messages = Vec::new();
        let mut skipped_streaming = 0usize;

        for el in document.select(&self.turn) {
            // Nested matches belong to the outer turn.
            if el.ancestors().any(|a| taken.contains(&a.id())) {
                continue;
            }
            taken.insert(el.id());

            let Some(role) = self.role_of(&el) else {
                continue;
            };
            if self.is_streaming(&el) {
                skipped_streaming += 1;
                continue;
            }
            let text = self.text_of(&el);
            if text.is_empty() {
                continue;
            }

            let seen = occurrences.entry((role, text.clone())).or_insert(0);
            let ordinal = *seen;
            *seen += 1;

            let id = self
                .id_attr
                .and_then(|attr| el.value().attr(attr))
                .filter(|v| !v.trim().is_empty())
                .map(|v| v.trim().to_string())
                .unwrap_or_else(|| {
                    let ordinal = ordinal.to_string();
                    format!("h-{}", short_hash(&[role.as_str(), &text, &ordinal]))
                });

            let mut msg = ConversationMessage::new(id, role, text, self.platform);
            msg.timestamp = self.timestamp_of(&el);
            messages.push(msg);
        }

        if messages.is_empty() && skipped_streaming == 0 {
            debug!("{}: no conversation turns matched on {}", self.platform, page.url);
        } else if skipped_streaming > 0 {
            debug!("{}: {} turn(s) still streaming, deferred", self.platform, skipped_streaming);
        }

        messages
    }
}
