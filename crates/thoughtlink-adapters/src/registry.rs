//! Origin → adapter lookup.

use crate::adapter::{InertAdapter, PageSnapshot, PlatformAdapter};
use crate::profiles::{DEFAULT_ROUTES, PROFILES};
use crate::selector::SelectorAdapter;
use globset::{GlobBuilder, GlobMatcher};
use std::collections::HashMap;
use std::sync::Arc;
use thoughtlink_core::{ConversationMessage, Error, PlatformId, Result};
use tracing::debug;

struct Route {
    pattern: String,
    matcher: GlobMatcher,
    platform: PlatformId,
}

pub struct AdapterRegistry {
    routes: Vec<Route>,
    adapters: HashMap<PlatformId, Arc<dyn PlatformAdapter>>,
    inert: Arc<dyn PlatformAdapter>,
}

impl Default for AdapterRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl AdapterRegistry {
    /// Empty registry: every origin resolves to the inert adapter.
    pub fn new() -> Self {
        Self {
            routes: Vec::new(),
            adapters: HashMap::new(),
            inert: Arc::new(InertAdapter),
        }
    }

    /// Registry with every built-in profile and the default route table.
    pub fn with_defaults() -> Result<Self> {
        let mut registry = Self::new();
        for profile in PROFILES.iter() {
            registry.register(SelectorAdapter::compile(profile)?);
        }
        for (pattern, platform) in DEFAULT_ROUTES {
            registry.add_route(pattern, *platform)?;
        }
        Ok(registry)
    }

    /// Register an adapter. Replaces any existing adapter for the same platform.
    pub fn register(&mut self, adapter: impl PlatformAdapter + 'static) {
        self.adapters.insert(adapter.platform_id(), Arc::new(adapter));
    }

    /// Append a hostname pattern. Patterns are case-insensitive globs
    /// (`*.example.com`) checked in insertion order.
    pub fn add_route(&mut self, pattern: &str, platform: PlatformId) -> Result<()> {
        let glob = GlobBuilder::new(pattern)
            .case_insensitive(true)
            .build()
            .map_err(|e| Error::config(format!("bad host pattern {:?}: {}", pattern, e)))?;
        self.routes.push(Route {
            pattern: pattern.to_string(),
            matcher: glob.compile_matcher(),
            platform,
        });
        Ok(())
    }

    /// Platform for a page URL, `Unsupported` when nothing matches.
    pub fn platform_for(&self, page_url: &str) -> PlatformId {
        let host = match url::Url::parse(page_url) {
            Ok(u) => match u.host_str() {
                Some(h) => h.to_ascii_lowercase(),
                None => return PlatformId::Unsupported,
            },
            Err(_) => return PlatformId::Unsupported,
        };
        self.routes
            .iter()
            .find(|r| r.matcher.is_match(&host))
            .map(|r| r.platform)
            .unwrap_or(PlatformId::Unsupported)
    }

    /// Adapter for a page URL. Unmatched origins get the inert adapter.
    pub fn resolve(&self, page_url: &str) -> Arc<dyn PlatformAdapter> {
        let platform = self.platform_for(page_url);
        match self.adapters.get(&platform) {
            Some(adapter) => adapter.clone(),
            None => {
                debug!("No adapter for {} ({}), using inert adapter", page_url, platform);
                self.inert.clone()
            }
        }
    }

    /// Resolve and extract in one step.
    pub fn extract(&self, page: &PageSnapshot) -> Vec<ConversationMessage> {
        self.resolve(&page.url).extract_conversation(page)
    }

    /// The route table, in match order.
    pub fn routes(&self) -> Vec<(&str, PlatformId)> {
        self.routes.iter().map(|r| (r.pattern.as_str(), r.platform)).collect()
    }

    pub fn platforms(&self) -> Vec<PlatformId> {
        let mut list: Vec<PlatformId> = self.adapters.keys().copied().collect();
        list.sort();
        list
    }
}
