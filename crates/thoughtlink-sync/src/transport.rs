//! Transport to the local collective service.

use crate::error::{SyncError, SyncResult};
use futures::{SinkExt, Stream, StreamExt};
use reqwest::Client;
use std::pin::Pin;
use thoughtlink_core::{AcceptedResponse, ClientFrame, ServiceFrame, ThoughtBatch, ThoughtRecord, STREAM_PATH, THOUGHTS_PATH};
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tokio_tungstenite::tungstenite::Message as WsMsg;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, warn};

/// Raw text frames from the inbound stream. Parsing is left to the client so a
/// malformed frame can be dropped without closing the connection.
pub type InsightStream = Pin<Box<dyn Stream<Item = SyncResult<String>> + Send>>;

#[async_trait::async_trait]
pub trait CollectiveTransport: Send + Sync {
    fn name(&self) -> &str;

    /// Open the stream connection and exchange hello/welcome.
    /// A `reject` answer is `SyncError::Rejected`.
    async fn handshake(&self, hello: ClientFrame) -> SyncResult<()>;

    /// Inbound frames of the connection opened by the last successful handshake.
    async fn open_insight_stream(&self) -> SyncResult<InsightStream>;

    /// Deliver a batch; returns the `sourceMessageId`s the service accepted.
    async fn send_thoughts(&self, thoughts: Vec<ThoughtRecord>) -> SyncResult<Vec<String>>;
}

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// `reqwest` for `POST /thoughts`, a WebSocket for the handshake and insights.
pub struct HttpTransport {
    client: Client,
    base_url: String,
    stream_url: String,
    pending: Mutex<Option<WsStream>>,
}

impl HttpTransport {
    /// `addr` is `host:port` or a full `http(s)://` base URL.
    pub fn new(addr: &str) -> SyncResult<Self> {
        let with_scheme = if addr.contains("://") {
            addr.to_string()
        } else {
            format!("http://{}", addr)
        };
        let mut base = url::Url::parse(&with_scheme).map_err(|e| SyncError::InvalidAddress(format!("{}: {}", addr, e)))?;
        let ws_scheme = match base.scheme() {
            "http" => "ws",
            "https" => "wss",
            other => return Err(SyncError::InvalidAddress(format!("unsupported scheme {}", other))),
        };
        base.set_path("");
        let base_url = base.as_str().trim_end_matches('/').to_string();

        let mut stream = base.clone();
        stream
            .set_scheme(ws_scheme)
            .map_err(|_| SyncError::InvalidAddress(addr.to_string()))?;
        stream.set_path(STREAM_PATH);

        Ok(Self {
            client: Client::new(),
            base_url,
            stream_url: stream.to_string(),
            pending: Mutex::new(None),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn stream_url(&self) -> &str {
        &self.stream_url
    }
}

/// Read frames until the service answers the hello.
async fn await_welcome(ws: &mut WsStream) -> SyncResult<()> {
    while let Some(msg) = ws.next().await {
        match msg? {
            WsMsg::Text(text) => match ServiceFrame::parse(&text) {
                Ok(ServiceFrame::Welcome) => return Ok(()),
                Ok(ServiceFrame::Reject { reason }) => return Err(SyncError::Rejected(reason)),
                Ok(ServiceFrame::Insight { .. }) => debug!("Insight before welcome, ignored"),
                Err(e) => warn!("Malformed handshake frame discarded: {}", e),
            },
            WsMsg::Close(_) => return Err(SyncError::StreamClosed),
            _ => {}
        }
    }
    Err(SyncError::StreamClosed)
}

#[async_trait::async_trait]
impl CollectiveTransport for HttpTransport {
    fn name(&self) -> &str {
        "http"
    }

    async fn handshake(&self, hello: ClientFrame) -> SyncResult<()> {
        let (mut ws, _) = connect_async(self.stream_url.as_str())
            .await
            .map_err(|e| SyncError::ConnectFailed(format!("{}: {}", self.stream_url, e)))?;

        ws.send(WsMsg::Text(serde_json::to_string(&hello)?)).await?;
        await_welcome(&mut ws).await?;

        *self.pending.lock().await = Some(ws);
        Ok(())
    }

    async fn open_insight_stream(&self) -> SyncResult<InsightStream> {
        let ws = self.pending.lock().await.take().ok_or(SyncError::StreamClosed)?;
        let frames = ws.filter_map(|msg| async move {
            match msg {
                Ok(WsMsg::Text(text)) => Some(Ok(text)),
                Ok(WsMsg::Close(_)) => Some(Err(SyncError::StreamClosed)),
                Ok(_) => None,
                Err(e) => Some(Err(SyncError::from(e))),
            }
        });
        Ok(Box::pin(frames))
    }

    async fn send_thoughts(&self, thoughts: Vec<ThoughtRecord>) -> SyncResult<Vec<String>> {
        let url = format!("{}{}", self.base_url, THOUGHTS_PATH);
        let count = thoughts.len();
        let response = self.client.post(&url).json(&ThoughtBatch { thoughts }).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(SyncError::SendFailed(format!("{} returned {}", url, status)));
        }
        let body: AcceptedResponse = response
            .json()
            .await
            .map_err(|e| SyncError::InvalidResponse(e.to_string()))?;
        debug!("Sent {} thoughts, {} accepted", count, body.accepted.len());
        Ok(body.accepted)
    }
}
