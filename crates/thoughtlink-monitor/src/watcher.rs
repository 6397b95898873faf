//! Page sources.
//!
//! Polls a snapshot file's size and mtime. Each observed rewrite is one
//! page-mutation notification carrying the full snapshot.

use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use thoughtlink_adapters::PageSnapshot;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// What a monitor consumes: page snapshots plus a handle to stop listening.
pub struct PageSubscription {
    pub events: mpsc::Receiver<PageSnapshot>,
    pub cancel: CancellationToken,
}

impl PageSubscription {
    /// A subscription fed by hand, for embedders and tests.
    pub fn channel(buffer: usize) -> (mpsc::Sender<PageSnapshot>, Self) {
        let (tx, rx) = mpsc::channel(buffer);
        let sub = Self {
            events: rx,
            cancel: CancellationToken::new(),
        };
        (tx, sub)
    }

    pub fn stop(&self) {
        self.cancel.cancel();
    }
}

pub struct PageWatcher {
    path: PathBuf,
    url: String,
    poll_interval: Duration,
    /// (size, mtime) of the last emitted snapshot
    last_seen: Option<(u64, Option<SystemTime>)>,
}

impl PageWatcher {
    pub fn new(path: impl Into<PathBuf>, url: impl Into<String>, poll_interval: Duration) -> Self {
        Self {
            path: path.into(),
            url: url.into(),
            poll_interval,
            last_seen: None,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Snapshot if the file changed since the last call. Missing or unreadable
    /// files yield nothing until they appear.
    pub fn check(&mut self) -> Option<PageSnapshot> {
        let meta = std::fs::metadata(&self.path).ok()?;
        let stamp = (meta.len(), meta.modified().ok());
        if self.last_seen == Some(stamp) {
            return None;
        }
        let html = match std::fs::read_to_string(&self.path) {
            Ok(html) => html,
            Err(e) => {
                debug!("Failed to read snapshot {}: {}", self.path.display(), e);
                return None;
            }
        };
        debug!("Snapshot {} changed ({} bytes)", self.path.display(), stamp.0);
        self.last_seen = Some(stamp);
        Some(PageSnapshot::new(self.url.clone(), html))
    }

    /// Start polling in a background task.
    pub fn spawn(self, buffer: usize) -> PageSubscription {
        let (tx, sub) = PageSubscription::channel(buffer);
        let cancel = sub.cancel.clone();
        tokio::spawn(self.run(tx, cancel));
        sub
    }

    pub async fn run(mut self, tx: mpsc::Sender<PageSnapshot>, cancel: CancellationToken) {
        info!("PageWatcher started on {}", self.path.display());
        loop {
            if let Some(snapshot) = self.check() {
                if tx.send(snapshot).await.is_err() {
                    info!("PageWatcher channel closed, shutting down");
                    return;
                }
            }
            tokio::select! {
                _ = cancel.cancelled() => {
                    debug!("PageWatcher cancelled");
                    return;
                }
                _ = tokio::time::sleep(self.poll_interval) => {}
            }
        }
    }
}
