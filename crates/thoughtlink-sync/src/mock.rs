//! MockTransport: an in-memory collective service for tests and offline runs.
//!
//! Handshake outcomes are scripted (consumed in order, then `Welcome`), sends
//! are recorded, and inbound frames are pushed by the test.

use crate::error::{SyncError, SyncResult};
use crate::transport::{CollectiveTransport, InsightStream};
use std::collections::{HashSet, VecDeque};
use thoughtlink_core::{ClientFrame, InsightRecord, ServiceFrame, ThoughtRecord};
use tokio::sync::{mpsc, Mutex};

#[derive(Clone, Debug)]
pub enum MockHandshake {
    Welcome,
    Reject(String),
    /// Connection-level failure (service unreachable).
    Fail(String),
    /// The service accepts the connection but never answers the hello.
    Hang,
}

#[derive(Clone, Debug)]
pub enum AcceptPolicy {
    All,
    Only(HashSet<String>),
    None,
}

struct MockState {
    handshakes: VecDeque<MockHandshake>,
    hellos: Vec<ClientFrame>,
    accept: AcceptPolicy,
    failing_sends: usize,
    sent: Vec<Vec<ThoughtRecord>>,
    inbound_tx: mpsc::UnboundedSender<String>,
    inbound_rx: Option<mpsc::UnboundedReceiver<String>>,
}

pub struct MockTransport {
    state: Mutex<MockState>,
}

impl Default for MockTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl MockTransport {
    pub fn new() -> Self {
        let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();
        Self {
            state: Mutex::new(MockState {
                handshakes: VecDeque::new(),
                hellos: Vec::new(),
                accept: AcceptPolicy::All,
                failing_sends: 0,
                sent: Vec::new(),
                inbound_tx,
                inbound_rx: Some(inbound_rx),
            }),
        }
    }

    /// Queue handshake outcomes, consumed one per connect attempt.
    pub async fn script_handshakes(&self, outcomes: Vec<MockHandshake>) {
        self.state.lock().await.handshakes.extend(outcomes);
    }

    pub async fn set_accept(&self, policy: AcceptPolicy) {
        self.state.lock().await.accept = policy;
    }

    pub async fn accept_only(&self, ids: &[&str]) {
        self.set_accept(AcceptPolicy::Only(ids.iter().map(|s| s.to_string()).collect()))
            .await;
    }

    /// The next `n` sends fail with a network-style error.
    pub async fn fail_next_sends(&self, n: usize) {
        self.state.lock().await.failing_sends = n;
    }

    /// Push a raw text frame onto the current inbound stream.
    pub async fn push_frame(&self, text: impl Into<String>) {
        let _ = self.state.lock().await.inbound_tx.send(text.into());
    }

    pub async fn push_insight(&self, insight: InsightRecord) {
        let frame = ServiceFrame::Insight { insight };
        if let Ok(text) = serde_json::to_string(&frame) {
            self.push_frame(text).await;
        }
    }

    /// End the current inbound stream, as if the service went away.
    pub async fn drop_stream(&self) {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut state = self.state.lock().await;
        state.inbound_tx = tx;
        state.inbound_rx = Some(rx);
    }

    pub async fn hellos(&self) -> Vec<ClientFrame> {
        self.state.lock().await.hellos.clone()
    }

    pub async fn handshake_count(&self) -> usize {
        self.state.lock().await.hellos.len()
    }

    pub async fn sent_batches(&self) -> Vec<Vec<ThoughtRecord>> {
        self.state.lock().await.sent.clone()
    }

    /// Every record sent, flattened, in send order.
    pub async fn sent_ids(&self) -> Vec<String> {
        self.state
            .lock()
            .await
            .sent
            .iter()
            .flatten()
            .map(|r| r.source_message_id.clone())
            .collect()
    }
}

#[async_trait::async_trait]
impl CollectiveTransport for MockTransport {
    fn name(&self) -> &str {
        "mock"
    }

    async fn handshake(&self, hello: ClientFrame) -> SyncResult<()> {
        let outcome = {
            let mut state = self.state.lock().await;
            state.hellos.push(hello);
            state.handshakes.pop_front().unwrap_or(MockHandshake::Welcome)
        };
        match outcome {
            MockHandshake::Welcome => Ok(()),
            MockHandshake::Reject(reason) => Err(SyncError::Rejected(reason)),
            MockHandshake::Fail(msg) => Err(SyncError::ConnectFailed(msg)),
            MockHandshake::Hang => futures::future::pending().await,
        }
    }

    async fn open_insight_stream(&self) -> SyncResult<InsightStream> {
        let mut state = self.state.lock().await;
        let rx = match state.inbound_rx.take() {
            Some(rx) => rx,
            None => {
                let (tx, rx) = mpsc::unbounded_channel();
                state.inbound_tx = tx;
                rx
            }
        };
        let frames = futures::stream::unfold(rx, |mut rx| async move { rx.recv().await.map(|text| (Ok(text), rx)) });
        Ok(Box::pin(frames))
    }

    async fn send_thoughts(&self, thoughts: Vec<ThoughtRecord>) -> SyncResult<Vec<String>> {
        let mut state = self.state.lock().await;
        if state.failing_sends > 0 {
            state.failing_sends -= 1;
            return Err(SyncError::SendFailed("mock send failure".into()));
        }
        let accepted: Vec<String> = thoughts
            .iter()
            .map(|t| t.source_message_id.clone())
            .filter(|id| match &state.accept {
                AcceptPolicy::All => true,
                AcceptPolicy::Only(ids) => ids.contains(id),
                AcceptPolicy::None => false,
            })
            .collect();
        state.sent.push(thoughts);
        Ok(accepted)
    }
}
