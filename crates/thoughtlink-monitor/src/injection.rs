//! Insight injection: at-least-once delivery from the sync client, deduplicated
//! by insight id before it reaches the page.
//!
//! The default sink drops one `insight-<id>-<hash>.txt` per insight into the
//! injections directory, where the page-side bridge picks it up.

use std::collections::{HashSet, VecDeque};
use std::fs;
use std::path::{Path, PathBuf};
use thoughtlink_core::hash::short_hash;
use thoughtlink_core::{InsightRecord, Result};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

pub const DEFAULT_DEDUP_WINDOW: usize = 1024;

/// Where insights end up. Rendering into the page is the sink's business.
pub trait InsightSink: Send {
    fn deliver(&mut self, insight: &InsightRecord) -> Result<()>;
}

/// Forwards each insight id at most once within a bounded window.
pub struct DedupInjector<S> {
    inner: S,
    seen: HashSet<String>,
    order: VecDeque<String>,
    capacity: usize,
}

impl<S: InsightSink> DedupInjector<S> {
    pub fn new(inner: S) -> Self {
        Self::with_capacity(inner, DEFAULT_DEDUP_WINDOW)
    }

    pub fn with_capacity(inner: S, capacity: usize) -> Self {
        Self {
            inner,
            seen: HashSet::new(),
            order: VecDeque::new(),
            capacity: capacity.max(1),
        }
    }

    /// Deliver unless already seen. Returns whether the sink was called.
    /// A failed delivery is not remembered, so a redelivery gets another try.
    pub fn offer(&mut self, insight: &InsightRecord) -> Result<bool> {
        if self.seen.contains(&insight.id) {
            debug!("Duplicate insight {} dropped", insight.id);
            return Ok(false);
        }
        self.inner.deliver(insight)?;

        self.seen.insert(insight.id.clone());
        self.order.push_back(insight.id.clone());
        while self.order.len() > self.capacity {
            if let Some(old) = self.order.pop_front() {
                self.seen.remove(&old);
            }
        }
        Ok(true)
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }

    pub fn into_inner(self) -> S {
        self.inner
    }
}

impl<S: InsightSink> InsightSink for DedupInjector<S> {
    fn deliver(&mut self, insight: &InsightRecord) -> Result<()> {
        self.offer(insight).map(|_| ())
    }
}

/// Writes each insight to `<dir>/insight-<id>-<hash>.txt`. The id is sanitized
/// for the filesystem; the hash of the raw id keeps distinct ids apart.
pub struct FileInjector {
    dir: PathBuf,
}

impl FileInjector {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_for(&self, insight: &InsightRecord) -> PathBuf {
        let safe: String = insight
            .id
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
            .collect();
        let tag = short_hash(&[&insight.id]);
        let name = if safe.is_empty() {
            format!("insight-{}.txt", tag)
        } else {
            format!("insight-{}-{}.txt", safe, tag)
        };
        self.dir.join(name)
    }
}

impl InsightSink for FileInjector {
    fn deliver(&mut self, insight: &InsightRecord) -> Result<()> {
        fs::create_dir_all(&self.dir)?;
        let path = self.path_for(insight);
        debug!("Writing insight file: {}", path.display());
        fs::write(&path, insight.content.trim())?;
        info!("Insight {} injected ({} chars)", insight.id, insight.content.len());
        Ok(())
    }
}

/// Drain the insight channel into `injector` until the channel closes or
/// `cancel` fires. Returns the number of insights delivered.
pub async fn run_injector<S: InsightSink>(
    mut rx: mpsc::Receiver<InsightRecord>,
    mut injector: DedupInjector<S>,
    cancel: CancellationToken,
) -> usize {
    let mut delivered = 0;
    loop {
        let insight = tokio::select! {
            _ = cancel.cancelled() => break,
            next = rx.recv() => match next {
                Some(insight) => insight,
                None => break,
            },
        };
        match injector.offer(&insight) {
            Ok(true) => delivered += 1,
            Ok(false) => {}
            Err(e) => warn!("Failed to inject insight {}: {}", insight.id, e),
        }
    }
    debug!("Injector stopped after {} insight(s)", delivered);
    delivered
}
