//! Conversation monitor: decides when to re-extract and what is new.

use crate::debounce::Quiescence;
use crate::filter::ThoughtFilter;
use crate::watcher::PageSubscription;
use chrono::Utc;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, Instant};
use thoughtlink_adapters::{AdapterRegistry, PageSnapshot};
use thoughtlink_core::{ConversationKey, ConversationMessage, Cursor, Error, PlatformId, Result, ThoughtRecord};
use thoughtlink_store::StateStore;
use thoughtlink_sync::{Enqueued, SyncHandle};
use tracing::{debug, info, warn};

/// Receives filtered records keyed by ledger key. Returns, per item, whether
/// it was queued. An error means nothing was handed off and the cursor must
/// stay put.
pub trait ThoughtSink: Send + Sync {
    fn hand_off(&self, conversation: &ConversationKey, items: Vec<(String, ThoughtRecord)>) -> Result<Vec<bool>>;
}

impl ThoughtSink for SyncHandle {
    fn hand_off(&self, conversation: &ConversationKey, items: Vec<(String, ThoughtRecord)>) -> Result<Vec<bool>> {
        if self.is_stopped() {
            return Err(Error::Internal("sync client stopped".into()));
        }
        let count = items.len();
        match self.enqueue(conversation, items) {
            Enqueued::Queued(seqs) => {
                let queued: Vec<bool> = seqs.iter().map(Option::is_some).collect();
                debug!(
                    "{} of {} record(s) queued for {}",
                    queued.iter().filter(|q| **q).count(),
                    count,
                    conversation
                );
                Ok(queued)
            }
            Enqueued::Paused => {
                debug!("Sharing paused, {} record(s) for {} dropped", count, conversation);
                Ok(vec![false; count])
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct MonitorConfig {
    pub quiescence: Duration,
    /// Force a pass during a burst that never goes quiet. Off by default:
    /// a forced pass is only safe on platforms whose streaming marker matches.
    pub max_wait: Option<Duration>,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            quiescence: Duration::from_millis(1500),
            max_wait: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MonitorStats {
    pub triggers: u64,
    pub extractions: u64,
    pub empty_extractions: u64,
    pub messages_handed_off: u64,
}

/// What one extraction pass did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeltaReport {
    pub conversation: Option<ConversationKey>,
    pub extracted: usize,
    /// Messages past the cursor.
    pub new_messages: usize,
    /// Skipped because they are already in the shared ledger.
    pub already_shared: usize,
    /// Rejected by the thought filter.
    pub filtered_out: usize,
    /// Passed the filter but not queued by the sink (sharing paused).
    pub dropped: usize,
    /// Ids of the messages the sink actually queued.
    pub handed_off: Vec<String>,
}

/// Index of the first message not yet seen by `cursor`.
///
/// The last message matching the cursor id wins, then the last matching the
/// cursor hash. If the cursor names a message that is no longer on the page
/// (an edited, branched conversation) the whole page is reconsidered and the
/// shared ledger filters what was already sent. Only a cursor with neither id
/// nor hash falls back to its stored position.
pub fn delta_start(messages: &[ConversationMessage], cursor: Option<&Cursor>) -> usize {
    let Some(cursor) = cursor else {
        return 0;
    };
    if let Some(id) = &cursor.last_message_id {
        if let Some(i) = messages.iter().rposition(|m| &m.id == id) {
            return i + 1;
        }
    }
    if let Some(hash) = &cursor.last_hash {
        if let Some(i) = messages.iter().rposition(|m| &m.content_hash() == hash) {
            return i + 1;
        }
    }
    if cursor.last_message_id.is_some() || cursor.last_hash.is_some() {
        return 0;
    }
    cursor.position.min(messages.len())
}

pub struct ConversationMonitor {
    registry: Arc<AdapterRegistry>,
    store: Arc<StateStore>,
    filter: ThoughtFilter,
    sink: Arc<dyn ThoughtSink>,
    debounce: Quiescence,
    pending: Option<PageSnapshot>,
    stats: MonitorStats,
}

impl ConversationMonitor {
    pub fn new(
        registry: Arc<AdapterRegistry>,
        store: Arc<StateStore>,
        sink: Arc<dyn ThoughtSink>,
        config: MonitorConfig,
    ) -> Result<Self> {
        Ok(Self {
            registry,
            store,
            filter: ThoughtFilter::new()?,
            sink,
            debounce: Quiescence::new(config.quiescence, config.max_wait),
            pending: None,
            stats: MonitorStats::default(),
        })
    }

    pub fn stats(&self) -> &MonitorStats {
        &self.stats
    }

    /// A page mutation: remember the latest snapshot and restart the quiet window.
    pub fn observe(&mut self, page: PageSnapshot, now: Instant) {
        self.pending = Some(page);
        self.debounce.note_mutation(now);
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        self.debounce.deadline()
    }

    /// Run an extraction if the page has settled. `None` while still waiting.
    pub fn poll(&mut self, now: Instant) -> Option<Result<DeltaReport>> {
        if !self.debounce.take_trigger(now) {
            return None;
        }
        self.stats.triggers += 1;
        let page = self.pending.take()?;
        Some(self.process(&page))
    }

    /// Extract `page`, diff against the cursor, filter, hand off, then advance
    /// the cursor. On a failed hand-off the cursor is left where it was.
    pub fn process(&mut self, page: &PageSnapshot) -> Result<DeltaReport> {
        let adapter = self.registry.resolve(&page.url);
        let platform = adapter.platform_id();
        if platform == PlatformId::Unsupported {
            debug!("No adapter for {}, nothing to extract", page.url);
            return Ok(DeltaReport::default());
        }
        let conversation = ConversationKey::from_url(platform, &page.url)?;

        let messages = adapter.extract_conversation(page);
        self.stats.extractions += 1;
        let mut report = DeltaReport {
            conversation: Some(conversation.clone()),
            extracted: messages.len(),
            ..DeltaReport::default()
        };
        let Some(last) = messages.last() else {
            self.stats.empty_extractions += 1;
            return Ok(report);
        };

        let cursor = self.store.cursor(&conversation);
        let start = delta_start(&messages, cursor.as_ref());
        let new = &messages[start..];
        report.new_messages = new.len();
        if new.is_empty() {
            return Ok(report);
        }

        let config = self.store.config();
        let mut batch_keys = HashSet::new();
        let mut ids = Vec::new();
        let mut items = Vec::new();
        for message in new {
            let key = message.identity_hash();
            if self.store.is_shared(&conversation, &key) || !batch_keys.insert(key.clone()) {
                report.already_shared += 1;
                continue;
            }
            match self.filter.filter(message, &config) {
                Some(record) => {
                    ids.push(message.id.clone());
                    items.push((key, record));
                }
                None => report.filtered_out += 1,
            }
        }

        if !items.is_empty() {
            let queued = self.sink.hand_off(&conversation, items)?;
            for (id, was_queued) in ids.into_iter().zip(queued.into_iter().chain(std::iter::repeat(false))) {
                if was_queued {
                    report.handed_off.push(id);
                } else {
                    report.dropped += 1;
                }
            }
            self.stats.messages_handed_off += report.handed_off.len() as u64;
        }

        let next = Cursor::after(last, messages.len(), Utc::now());
        self.store.advance_cursor(&conversation, next);
        info!(
            "{}: {} new, {} handed off, {} filtered, {} already shared, {} dropped",
            conversation,
            report.new_messages,
            report.handed_off.len(),
            report.filtered_out,
            report.already_shared,
            report.dropped
        );
        Ok(report)
    }

    fn poll_and_log(&mut self, now: Instant) {
        if let Some(Err(e)) = self.poll(now) {
            warn!("Extraction pass failed, cursor unchanged: {}", e);
        }
    }

    /// Drive the monitor from a subscription until it is cancelled or the
    /// source goes away. A snapshot still pending when the source closes is
    /// processed before returning.
    pub async fn run(mut self, mut subscription: PageSubscription) -> MonitorStats {
        info!("Conversation monitor started");
        loop {
            let wake = self
                .next_deadline()
                .unwrap_or_else(|| Instant::now() + Duration::from_secs(3600));
            tokio::select! {
                _ = subscription.cancel.cancelled() => break,
                event = subscription.events.recv() => match event {
                    Some(page) => self.observe(page, Instant::now()),
                    None => {
                        if let Some(deadline) = self.next_deadline() {
                            self.poll_and_log(deadline.max(Instant::now()));
                        }
                        break;
                    }
                },
                _ = tokio::time::sleep_until(tokio::time::Instant::from_std(wake)) => {
                    self.poll_and_log(Instant::now());
                }
            }
        }
        info!("Conversation monitor stopped: {:?}", self.stats);
        self.stats
    }
}
