//! SyncClient: drains the durable outbound queue to the collective service and
//! forwards inbound insights to the injector.
//!
//! The client owns the connection state machine and runs as one tokio task.
//! Everything else talks to it through a cloneable [`SyncHandle`].

use crate::backoff::{BackoffConfig, BackoffPolicy};
use crate::error::{SyncError, SyncResult};
use crate::machine::{ConnectionMachine, MachineEvent};
use crate::transport::{CollectiveTransport, InsightStream};
use futures::StreamExt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use thoughtlink_core::{ClientFrame, ConnectionState, ConversationKey, InsightRecord, ServiceFrame, ThoughtRecord};
use thoughtlink_store::StateStore;
use tokio::sync::{mpsc, watch, Notify};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Records per `POST /thoughts`.
    pub batch_size: usize,
    pub handshake_timeout: Duration,
    /// Retry interval for records the service has not accepted yet.
    pub flush_interval: Duration,
    /// Sent in the hello frame.
    pub instance: String,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            batch_size: 32,
            handshake_timeout: Duration::from_secs(10),
            flush_interval: Duration::from_secs(5),
            instance: uuid::Uuid::new_v4().to_string(),
        }
    }
}

/// Outcome of [`SyncHandle::enqueue`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Enqueued {
    /// One entry per record: the sequence number assigned, or `None` if the
    /// record was already in the shared ledger.
    Queued(Vec<Option<u64>>),
    /// Sharing is paused; nothing was stored.
    Paused,
}

struct Shared {
    paused: AtomicBool,
    notify: Notify,
    cancel: CancellationToken,
}

/// Cloneable front door to a running [`SyncClient`].
#[derive(Clone)]
pub struct SyncHandle {
    store: Arc<StateStore>,
    shared: Arc<Shared>,
    state_rx: watch::Receiver<ConnectionState>,
}

impl SyncHandle {
    /// Append records to the durable queue (and mark them in the shared
    /// ledger) in one commit, then poke the client. Accepted in every
    /// connection state; refused only while paused.
    pub fn enqueue(&self, conversation: &ConversationKey, items: Vec<(String, ThoughtRecord)>) -> Enqueued {
        if self.is_paused() {
            debug!("Sharing paused, dropping {} record(s) for {}", items.len(), conversation);
            return Enqueued::Paused;
        }
        let seqs = self.store.enqueue(conversation, items);
        if seqs.iter().any(Option::is_some) {
            self.shared.notify.notify_one();
        }
        Enqueued::Queued(seqs)
    }

    pub fn pause(&self) {
        if !self.shared.paused.swap(true, Ordering::SeqCst) {
            info!("Sharing paused");
            self.shared.notify.notify_one();
        }
    }

    pub fn resume(&self) {
        if self.shared.paused.swap(false, Ordering::SeqCst) {
            info!("Sharing resumed");
            self.shared.notify.notify_one();
        }
    }

    pub fn is_paused(&self) -> bool {
        self.shared.paused.load(Ordering::SeqCst)
    }

    /// Tear down the connection and timers. The queue stays in the store.
    pub fn stop(&self) {
        self.shared.cancel.cancel();
    }

    pub fn is_stopped(&self) -> bool {
        self.shared.cancel.is_cancelled()
    }

    /// Ask for a flush now instead of at the next interval.
    pub fn notify(&self) {
        self.shared.notify.notify_one();
    }

    pub fn state(&self) -> watch::Receiver<ConnectionState> {
        self.state_rx.clone()
    }

    pub fn current_state(&self) -> ConnectionState {
        *self.state_rx.borrow()
    }

    pub fn queue_len(&self) -> usize {
        self.store.queue_len()
    }
}

/// Why the connected phase ended.
enum ConnectedExit {
    Failed(SyncError),
    Paused,
    Stopped,
}

enum WaitExit {
    Elapsed,
    Paused,
    Stopped,
}

pub struct SyncClient {
    transport: Arc<dyn CollectiveTransport>,
    store: Arc<StateStore>,
    config: SyncConfig,
    machine: ConnectionMachine,
    backoff: BackoffPolicy,
    insights: mpsc::Sender<InsightRecord>,
    state_tx: watch::Sender<ConnectionState>,
    shared: Arc<Shared>,
}

impl SyncClient {
    pub fn new(
        transport: Arc<dyn CollectiveTransport>,
        store: Arc<StateStore>,
        config: SyncConfig,
        backoff: BackoffConfig,
        insights: mpsc::Sender<InsightRecord>,
    ) -> (Self, SyncHandle) {
        let (state_tx, state_rx) = watch::channel(ConnectionState::Disconnected);
        let shared = Arc::new(Shared {
            paused: AtomicBool::new(false),
            notify: Notify::new(),
            cancel: CancellationToken::new(),
        });
        store.set_connection_state(ConnectionState::Disconnected);

        let handle = SyncHandle {
            store: store.clone(),
            shared: shared.clone(),
            state_rx,
        };
        let client = Self {
            transport,
            store,
            config,
            machine: ConnectionMachine::new(),
            backoff: BackoffPolicy::new(backoff),
            insights,
            state_tx,
            shared,
        };
        (client, handle)
    }

    pub fn state(&self) -> ConnectionState {
        self.machine.state()
    }

    fn transition(&mut self, event: MachineEvent) {
        let from = self.machine.state();
        match self.machine.apply(event) {
            Ok(to) => {
                if from != to {
                    info!("Connection {} -> {} ({:?})", from, to, event);
                }
                self.store.set_connection_state(to);
                let _ = self.state_tx.send(to);
            }
            Err(e) => warn!("{}", e),
        }
    }

    fn is_paused(&self) -> bool {
        self.shared.paused.load(Ordering::SeqCst)
    }

    /// Run until stopped. Returns with the state `Disconnected` and the
    /// unacknowledged queue intact in the store.
    pub async fn run(mut self) {
        let cancel = self.shared.cancel.clone();
        info!("Sync client started ({} transport)", self.transport.name());

        while !cancel.is_cancelled() {
            if self.is_paused() {
                if self.machine.state() != ConnectionState::Disconnected {
                    self.transition(MachineEvent::Pause);
                }
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = self.shared.notify.notified() => continue,
                }
            }

            match self.machine.state() {
                ConnectionState::Disconnected => self.transition(MachineEvent::Connect),
                ConnectionState::Connecting => {
                    let attempt = tokio::select! {
                        _ = cancel.cancelled() => break,
                        attempt = self.connect() => attempt,
                    };
                    match attempt {
                        Ok(inbound) => {
                            self.transition(MachineEvent::HandshakeOk);
                            self.backoff.reset();
                            match self.serve_connected(inbound).await {
                                ConnectedExit::Failed(e) => {
                                    warn!("Connection lost: {}", e);
                                    self.transition(MachineEvent::Failure);
                                }
                                ConnectedExit::Paused => self.transition(MachineEvent::Pause),
                                ConnectedExit::Stopped => break,
                            }
                        }
                        Err(e) if e.is_rejection() => {
                            warn!("Service rejected handshake: {}", e);
                            self.transition(MachineEvent::Rejected);
                        }
                        Err(e) => {
                            debug!("Connect failed: {}", e);
                            self.transition(MachineEvent::Failure);
                        }
                    }
                }
                ConnectionState::Backoff => {
                    let delay = self.backoff.next_delay();
                    debug!("Reconnecting in {:?} (attempt {})", delay, self.backoff.attempts());
                    match self.wait_backoff(delay).await {
                        WaitExit::Elapsed => self.transition(MachineEvent::TimerFired),
                        WaitExit::Paused => {}
                        WaitExit::Stopped => break,
                    }
                }
                ConnectionState::Connected => {
                    // No live stream to serve; reconnect.
                    self.transition(MachineEvent::Failure);
                }
            }
        }

        self.transition(MachineEvent::Stop);
        info!("Sync client stopped, {} record(s) left queued", self.store.queue_len());
    }

    async fn connect(&self) -> SyncResult<InsightStream> {
        let level = self.store.config().contribution_level.get();
        let hello = ClientFrame::hello(self.config.instance.clone(), level);
        let attempt = async {
            self.transport.handshake(hello).await?;
            self.transport.open_insight_stream().await
        };
        tokio::time::timeout(self.config.handshake_timeout, attempt)
            .await
            .map_err(|_| SyncError::HandshakeTimeout)?
    }

    async fn wait_backoff(&self, delay: Duration) -> WaitExit {
        let sleep = tokio::time::sleep(delay);
        tokio::pin!(sleep);
        loop {
            tokio::select! {
                _ = self.shared.cancel.cancelled() => return WaitExit::Stopped,
                _ = &mut sleep => return WaitExit::Elapsed,
                _ = self.shared.notify.notified() => {
                    if self.is_paused() {
                        return WaitExit::Paused;
                    }
                }
            }
        }
    }

    async fn serve_connected(&self, mut inbound: InsightStream) -> ConnectedExit {
        let cancel = self.shared.cancel.clone();
        loop {
            if self.is_paused() {
                return ConnectedExit::Paused;
            }
            if let Err(e) = self.flush_pending().await {
                return ConnectedExit::Failed(e);
            }
            tokio::select! {
                _ = cancel.cancelled() => return ConnectedExit::Stopped,
                _ = self.shared.notify.notified() => {
                    if self.is_paused() {
                        return ConnectedExit::Paused;
                    }
                }
                _ = tokio::time::sleep(self.config.flush_interval) => {}
                frame = inbound.next() => match frame {
                    Some(Ok(text)) => self.handle_frame(&text).await,
                    Some(Err(e)) => return ConnectedExit::Failed(e),
                    None => return ConnectedExit::Failed(SyncError::StreamClosed),
                },
            }
        }
    }

    /// Send one batch from the head of the queue and drop whatever the service
    /// accepted. Returns the number of records acknowledged.
    pub async fn flush_once(&self) -> SyncResult<usize> {
        let batch = self.store.pending_batch(self.config.batch_size.max(1));
        if batch.is_empty() {
            return Ok(0);
        }
        let seqs: Vec<u64> = batch.iter().map(|q| q.seq).collect();
        let records: Vec<ThoughtRecord> = batch.into_iter().map(|q| q.record).collect();
        let sent = records.len();

        let accepted = self.transport.send_thoughts(records).await?;
        let removed = self.store.acknowledge(&seqs, &accepted);
        if removed < sent {
            debug!("{} of {} record(s) not accepted, kept queued", sent - removed, sent);
        }
        Ok(removed)
    }

    async fn flush_pending(&self) -> SyncResult<()> {
        loop {
            let removed = self.flush_once().await?;
            if removed == 0 || self.store.queue_len() == 0 {
                return Ok(());
            }
        }
    }

    async fn handle_frame(&self, text: &str) {
        match ServiceFrame::parse(text) {
            Ok(ServiceFrame::Insight { insight }) => {
                debug!("Insight {} received", insight.id);
                if self.insights.send(insight).await.is_err() {
                    warn!("Insight receiver closed, insight dropped");
                }
            }
            Ok(ServiceFrame::Welcome) => debug!("Duplicate welcome ignored"),
            Ok(ServiceFrame::Reject { reason }) => warn!("Service reject after welcome ignored: {}", reason),
            Err(e) => warn!("Discarding malformed inbound frame: {}", e),
        }
    }
}
