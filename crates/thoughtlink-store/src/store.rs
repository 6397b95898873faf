//! File-backed state store with whole-document atomic commits.

use crate::state::{PersistedState, QueuedThought, STATE_FILE, STATE_VERSION};
use chrono::Utc;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use thoughtlink_core::{ConnectionState, ConversationKey, Cursor, Result, ShareConfig, ThoughtRecord};
use tracing::{debug, error, info, warn};

struct Inner {
    state: PersistedState,
    /// False once a commit has failed, or for stores opened in memory.
    durable: bool,
}

pub struct StateStore {
    path: Option<PathBuf>,
    inner: Mutex<Inner>,
}

impl StateStore {
    /// Open (or create) the store under `dir`.
    ///
    /// A file that cannot be parsed is moved aside and the store starts empty.
    /// If the directory cannot be created or read the store runs memory-only.
    pub fn open(dir: impl AsRef<Path>) -> Self {
        let dir = dir.as_ref();
        let path = dir.join(STATE_FILE);

        if let Err(e) = std::fs::create_dir_all(dir) {
            warn!("Cannot create state dir {}: {} (running memory-only)", dir.display(), e);
            return Self::with_state(Some(path), PersistedState::default(), false);
        }

        match std::fs::read_to_string(&path) {
            Ok(raw) => match serde_json::from_str::<PersistedState>(&raw) {
                Ok(mut state) => {
                    state.version = STATE_VERSION;
                    info!(
                        "Loaded state from {} ({} cursors, {} queued)",
                        path.display(),
                        state.cursors.len(),
                        state.queue.len()
                    );
                    Self::with_state(Some(path), state, true)
                }
                Err(e) => {
                    let aside = path.with_extension(format!("json.corrupt-{}", Utc::now().timestamp()));
                    warn!("State file {} is corrupt ({}), moving to {}", path.display(), e, aside.display());
                    if let Err(e) = std::fs::rename(&path, &aside) {
                        error!("Failed to move corrupt state aside: {}", e);
                    }
                    Self::with_state(Some(path), PersistedState::default(), true)
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("No state file at {}, starting fresh", path.display());
                Self::with_state(Some(path), PersistedState::default(), true)
            }
            Err(e) => {
                warn!("Cannot read {}: {} (running memory-only)", path.display(), e);
                Self::with_state(Some(path), PersistedState::default(), false)
            }
        }
    }

    /// A store that never touches disk.
    pub fn in_memory() -> Self {
        Self::with_state(None, PersistedState::default(), false)
    }

    fn with_state(path: Option<PathBuf>, state: PersistedState, durable: bool) -> Self {
        Self {
            path,
            inner: Mutex::new(Inner { state, durable }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Serialize the whole document to a temp file and rename it over the
    /// live file. Any failure drops the store to memory-only.
    fn commit(&self, inner: &mut Inner) {
        if !inner.durable {
            return;
        }
        let Some(path) = &self.path else {
            return;
        };
        if let Err(e) = write_atomic(path, &inner.state) {
            warn!("State commit to {} failed: {} (continuing memory-only)", path.display(), e);
            inner.durable = false;
        }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn is_durable(&self) -> bool {
        self.lock().durable
    }

    pub fn snapshot(&self) -> PersistedState {
        self.lock().state.clone()
    }

    // -- config -------------------------------------------------------------

    pub fn config(&self) -> ShareConfig {
        self.lock().state.config.clone()
    }

    pub fn set_config(&self, config: ShareConfig) {
        let mut inner = self.lock();
        inner.state.config = config;
        self.commit(&mut inner);
    }

    // -- cursors ------------------------------------------------------------

    pub fn cursor(&self, conversation: &ConversationKey) -> Option<Cursor> {
        self.lock().state.cursors.get(conversation).cloned()
    }

    /// Last-write-wins: `cursor` replaces the stored one unless the stored one
    /// is newer or further along. Returns whether it was applied.
    pub fn advance_cursor(&self, conversation: &ConversationKey, cursor: Cursor) -> bool {
        let mut inner = self.lock();
        if let Some(current) = inner.state.cursors.get(conversation) {
            if !cursor.supersedes(current) {
                debug!(
                    "Stale cursor for {} ignored (position {} < {})",
                    conversation, cursor.position, current.position
                );
                return false;
            }
        }
        inner.state.cursors.insert(conversation.clone(), cursor);
        self.commit(&mut inner);
        true
    }

    // -- ledger + queue -----------------------------------------------------

    /// Whether a message with this ledger key was already turned into a thought.
    pub fn is_shared(&self, conversation: &ConversationKey, key: &str) -> bool {
        self.lock()
            .state
            .shared
            .get(conversation)
            .is_some_and(|set| set.contains(key))
    }

    /// Append records to the outbound queue and mark their ledger keys, in a
    /// single commit. Returns one entry per item: the sequence number assigned,
    /// or `None` if the key was already in the ledger.
    pub fn enqueue(&self, conversation: &ConversationKey, items: Vec<(String, ThoughtRecord)>) -> Vec<Option<u64>> {
        let mut inner = self.lock();
        let now = Utc::now();
        let mut assigned = Vec::with_capacity(items.len());
        for (key, record) in items {
            let ledger = inner.state.shared.entry(conversation.clone()).or_default();
            if !ledger.insert(key) {
                assigned.push(None);
                continue;
            }
            let seq = inner.state.next_seq;
            inner.state.next_seq += 1;
            inner.state.queue.push(QueuedThought {
                seq,
                conversation: conversation.clone(),
                record,
                enqueued_at: now,
            });
            assigned.push(Some(seq));
        }
        if assigned.iter().any(Option::is_some) {
            self.commit(&mut inner);
        }
        assigned
    }

    pub fn queue(&self) -> Vec<QueuedThought> {
        self.lock().state.queue.clone()
    }

    pub fn queue_len(&self) -> usize {
        self.lock().state.queue.len()
    }

    /// The oldest `max` queued entries, in enqueue order.
    pub fn pending_batch(&self, max: usize) -> Vec<QueuedThought> {
        self.lock().state.queue.iter().take(max).cloned().collect()
    }

    /// Remove entries that were sent (`sent_seqs`) and acknowledged by source
    /// message id. Everything else stays queued in its original order.
    /// Returns the number removed.
    pub fn acknowledge(&self, sent_seqs: &[u64], accepted_ids: &[String]) -> usize {
        let sent: HashSet<u64> = sent_seqs.iter().copied().collect();
        let accepted: HashSet<&str> = accepted_ids.iter().map(String::as_str).collect();
        let mut inner = self.lock();
        let before = inner.state.queue.len();
        inner
            .state
            .queue
            .retain(|q| !(sent.contains(&q.seq) && accepted.contains(q.record.source_message_id.as_str())));
        let removed = before - inner.state.queue.len();
        if removed > 0 {
            self.commit(&mut inner);
        }
        removed
    }

    // -- connection state ---------------------------------------------------

    pub fn connection_state(&self) -> ConnectionState {
        self.lock().state.connection_state
    }

    pub fn set_connection_state(&self, state: ConnectionState) {
        let mut inner = self.lock();
        if inner.state.connection_state == state {
            return;
        }
        inner.state.connection_state = state;
        self.commit(&mut inner);
    }

    /// Forget cursors, the ledger, and the queue. Configuration is kept.
    pub fn clear(&self) {
        let mut inner = self.lock();
        let config = inner.state.config.clone();
        inner.state = PersistedState {
            config,
            ..PersistedState::default()
        };
        info!("State cleared");
        self.commit(&mut inner);
    }
}

fn write_atomic(path: &Path, state: &PersistedState) -> Result<()> {
    let json = serde_json::to_string_pretty(state)?;
    let tmp_path = path.with_extension("json.tmp");
    std::fs::write(&tmp_path, json)?;
    std::fs::rename(&tmp_path, path)?;
    Ok(())
}
