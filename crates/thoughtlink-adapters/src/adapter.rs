//! The adapter capability shared by every platform.

use thoughtlink_core::{ConversationMessage, PlatformId};

/// A captured page: its URL and the serialized DOM.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PageSnapshot {
    pub url: String,
    pub html: String,
}

impl PageSnapshot {
    pub fn new(url: impl Into<String>, html: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            html: html.into(),
        }
    }
}

/// Extracts ordered conversation messages from one page structure.
///
/// Extraction is best-effort: a page whose structure is not recognized yields an
/// empty sequence, never an error. Calling `extract_conversation` twice on the
/// same snapshot returns equal sequences.
pub trait PlatformAdapter: Send + Sync {
    fn platform_id(&self) -> PlatformId;

    /// Messages oldest-first.
    fn extract_conversation(&self, page: &PageSnapshot) -> Vec<ConversationMessage>;
}

/// Adapter for origins no profile claims. Always extracts nothing.
#[derive(Debug, Default, Clone, Copy)]
pub struct InertAdapter;

impl PlatformAdapter for InertAdapter {
    fn platform_id(&self) -> PlatformId {
        PlatformId::Unsupported
    }

    fn extract_conversation(&self, _page: &PageSnapshot) -> Vec<ConversationMessage> {
        Vec::new()
    }
}
