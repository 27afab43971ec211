//! WebSocket link implementation using `tokio-tungstenite`.
//!
//! Boards on the local network expose a plain `ws://` endpoint; the
//! controller is always the dialing side. Outbound messages go as text
//! frames (the protocol is UTF-8 JSON); inbound text and binary frames
//! are both accepted, ping/pong is left to tungstenite.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, Mutex};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

use crate::{BoardAddr, BoardDialer, BoardLink, LinkError, LinkId, INBOUND_QUEUE_CAPACITY};

/// Counter for generating unique link IDs.
static NEXT_LINK_ID: AtomicU64 = AtomicU64::new(1);

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Dials boards over WebSocket.
#[derive(Debug, Clone, Copy, Default)]
pub struct WsDialer;

impl BoardDialer for WsDialer {
    type Link = WsLink;

    async fn dial(&self, target: &BoardAddr) -> Result<WsLink, LinkError> {
        let url = format!("ws://{}", target.addr);
        let (stream, _response) = connect_async(url.as_str()).await.map_err(|e| {
            LinkError::Unreachable(std::io::Error::new(
                std::io::ErrorKind::ConnectionRefused,
                e,
            ))
        })?;

        let id = LinkId::new(NEXT_LINK_ID.fetch_add(1, Ordering::Relaxed));
        tracing::debug!(%id, board = %target, "WebSocket link established");

        let (sink, source) = stream.split();
        Ok(WsLink {
            id,
            sink: Arc::new(Mutex::new(sink)),
            source: Some(source),
            open: Arc::new(AtomicBool::new(true)),
        })
    }
}

/// A single WebSocket link to a board.
pub struct WsLink {
    id: LinkId,
    sink: Arc<Mutex<SplitSink<WsStream, Message>>>,
    /// Taken by `subscribe`, which moves it into the read pump.
    source: Option<SplitStream<WsStream>>,
    open: Arc<AtomicBool>,
}

impl BoardLink for WsLink {
    async fn negotiate_frame_size(&mut self, preferred: usize) -> Result<usize, LinkError> {
        // WebSocket frames already exceed anything this protocol sends,
        // so the preferred size is trivially granted. Links with a real
        // MTU (the memory simulator can model one) fall back or fail
        // here.
        tracing::debug!(id = %self.id, granted = preferred, "frame size negotiated");
        Ok(preferred)
    }

    async fn subscribe(&mut self) -> Result<mpsc::Receiver<Vec<u8>>, LinkError> {
        let mut source = self.source.take().ok_or_else(|| {
            LinkError::SubscribeFailed("already subscribed".into())
        })?;

        let (tx, rx) = mpsc::channel(INBOUND_QUEUE_CAPACITY);
        let id = self.id;

        // Read pump: the only reader of the stream. It blocks solely on
        // the bounded queue, so a slow consumer backs up the queue
        // rather than wedging tungstenite's protocol handling.
        tokio::spawn(async move {
            while let Some(msg) = source.next().await {
                let bytes = match msg {
                    Ok(Message::Text(text)) => text.as_bytes().to_vec(),
                    Ok(Message::Binary(data)) => data.into(),
                    Ok(Message::Close(_)) => break,
                    Ok(_) => continue, // ping/pong/frame
                    Err(e) => {
                        tracing::debug!(%id, error = %e, "read pump error");
                        break;
                    }
                };
                if tx.send(bytes).await.is_err() {
                    // Receiver dropped — the session layer is gone.
                    break;
                }
            }
            tracing::debug!(%id, "read pump ended");
            // tx drops here; the receiver sees the queue close.
        });

        Ok(rx)
    }

    async fn send(&self, data: &[u8]) -> Result<(), LinkError> {
        if !self.open.load(Ordering::Acquire) {
            return Err(LinkError::NotReady);
        }
        let text = std::str::from_utf8(data).map_err(|e| {
            LinkError::SendFailed(std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                e,
            ))
        })?;
        self.sink
            .lock()
            .await
            .send(Message::Text(text.to_string().into()))
            .await
            .map_err(|e| {
                LinkError::SendFailed(std::io::Error::new(
                    std::io::ErrorKind::BrokenPipe,
                    e,
                ))
            })
    }

    async fn close(&self) {
        // First close wins; later calls are no-ops.
        if self.open.swap(false, Ordering::AcqRel) {
            let _ = self.sink.lock().await.close().await;
            tracing::debug!(id = %self.id, "link closed");
        }
    }

    fn id(&self) -> LinkId {
        self.id
    }
}
