//! Endpoint negotiation and text-frame transports for RTM sessions.
//!
//! A session needs two collaborators: an [`EndpointResolver`] that turns the
//! bot's credentials into a connection URL, and a [`Connector`] that opens a
//! bidirectional text-frame [`Transport`] to that URL. The production pair is
//! the Web API client plus [`websocket::WebSocketConnector`]; the
//! [`memory`] module provides an in-process peer for tests and local runs.

use async_trait::async_trait;
use tracing::debug;

use crate::error::BotError;

/// Receiving half of a text-frame connection
#[async_trait]
pub trait FrameReader: Send {
    /// Wait for the next text frame. `Ok(None)` means the peer closed the
    /// connection.
    async fn recv(&mut self) -> Result<Option<String>, BotError>;
}

/// Sending half of a text-frame connection
#[async_trait]
pub trait FrameWriter: Send {
    /// Send one text frame
    async fn send(&mut self, text: String) -> Result<(), BotError>;

    /// Close the connection. Further sends fail.
    async fn close(&mut self) -> Result<(), BotError>;
}

/// An open connection split into its two halves
pub struct Transport {
    /// Inbound frames
    pub reader: Box<dyn FrameReader>,
    /// Outbound frames
    pub writer: Box<dyn FrameWriter>,
}

impl std::fmt::Debug for Transport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Transport").finish_non_exhaustive()
    }
}

/// Opens transports to negotiated endpoints
#[async_trait]
pub trait Connector: Send + Sync {
    /// Open a connection to `endpoint`
    async fn open(&self, endpoint: &str) -> Result<Transport, BotError>;
}

/// Negotiates the endpoint for a new session
#[async_trait]
pub trait EndpointResolver: Send + Sync {
    /// Ask the platform where to connect
    async fn resolve(&self) -> Result<String, BotError>;
}

#[async_trait]
impl EndpointResolver for rtm_api::WebApi {
    async fn resolve(&self) -> Result<String, BotError> {
        let connect = self
            .rtm_connect()
            .await
            .map_err(|e| BotError::Connectivity(format!("rtm.connect failed: {}", e)))?;
        if let Some(me) = &connect.self_ {
            debug!("Negotiated endpoint for bot {} ({})", me.name, me.id);
        }
        Ok(connect.url)
    }
}

/// Resolver that always returns the same endpoint
#[derive(Debug, Clone)]
pub struct StaticEndpoint(pub String);

#[async_trait]
impl EndpointResolver for StaticEndpoint {
    async fn resolve(&self) -> Result<String, BotError> {
        Ok(self.0.clone())
    }
}

/// WebSocket transport
pub mod websocket {
    use super::*;
    use futures::stream::{SplitSink, SplitStream};
    use futures::{SinkExt, StreamExt};
    use tokio::net::TcpStream;
    use tokio_tungstenite::tungstenite::Message;
    use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
    use tracing::{info, trace};

    type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

    /// Opens `ws://` and `wss://` endpoints
    #[derive(Debug, Default, Clone)]
    pub struct WebSocketConnector;

    impl WebSocketConnector {
        /// Create a connector
        pub fn new() -> Self {
            Self
        }
    }

    #[async_trait]
    impl Connector for WebSocketConnector {
        async fn open(&self, endpoint: &str) -> Result<Transport, BotError> {
            let (stream, response) = connect_async(endpoint)
                .await
                .map_err(|e| BotError::Connectivity(format!("websocket connect failed: {}", e)))?;
            info!("WebSocket connected (HTTP {})", response.status());

            let (sink, stream) = stream.split();
            Ok(Transport {
                reader: Box::new(WsReader { stream }),
                writer: Box::new(WsWriter { sink }),
            })
        }
    }

    struct WsReader {
        stream: SplitStream<WsStream>,
    }

    #[async_trait]
    impl FrameReader for WsReader {
        async fn recv(&mut self) -> Result<Option<String>, BotError> {
            while let Some(msg) = self.stream.next().await {
                match msg {
                    Ok(Message::Text(text)) => return Ok(Some(text.as_str().to_owned())),
                    Ok(Message::Close(frame)) => {
                        debug!("Peer sent close frame: {:?}", frame);
                        return Ok(None);
                    }
                    Ok(other) => trace!("Ignoring non-text frame ({} bytes)", other.len()),
                    Err(e) => {
                        return Err(BotError::Connectivity(format!(
                            "websocket receive failed: {}",
                            e
                        )))
                    }
                }
            }
            Ok(None)
        }
    }

    struct WsWriter {
        sink: SplitSink<WsStream, Message>,
    }

    #[async_trait]
    impl FrameWriter for WsWriter {
        async fn send(&mut self, text: String) -> Result<(), BotError> {
            self.sink
                .send(Message::Text(text.into()))
                .await
                .map_err(|e| BotError::Connectivity(format!("websocket send failed: {}", e)))
        }

        async fn close(&mut self) -> Result<(), BotError> {
            self.sink
                .close()
                .await
                .map_err(|e| BotError::Connectivity(format!("websocket close failed: {}", e)))
        }
    }
}

/// In-process transport.
///
/// Each [`MemoryConnector::add_peer`] call prepares one connection and
/// returns the [`MemoryPeer`] that plays the platform's side of it. Opens
/// consume prepared connections in order.
pub mod memory {
    use super::*;
    use serde_json::Value;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::{Arc, Mutex, PoisonError};
    use tokio::sync::mpsc;

    /// Connector handing out prepared in-memory connections
    #[derive(Debug, Default)]
    pub struct MemoryConnector {
        pending: Mutex<VecDeque<Transport>>,
    }

    impl MemoryConnector {
        /// Create a connector with no prepared connections
        pub fn new() -> Self {
            Self::default()
        }

        /// Prepare the next connection and return its platform side
        pub fn add_peer(&self) -> MemoryPeer {
            let (to_bot, inbound) = mpsc::unbounded_channel();
            let (outbound, from_bot) = mpsc::unbounded_channel();
            let closed = Arc::new(AtomicBool::new(false));

            let transport = Transport {
                reader: Box::new(MemoryReader { inbound }),
                writer: Box::new(MemoryWriter {
                    outbound: Some(outbound),
                    closed: closed.clone(),
                }),
            };
            self.pending
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .push_back(transport);

            MemoryPeer {
                to_bot: Mutex::new(Some(to_bot)),
                from_bot: tokio::sync::Mutex::new(from_bot),
                closed,
            }
        }

        /// Number of prepared connections not yet opened
        pub fn pending(&self) -> usize {
            self.pending
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .len()
        }
    }

    #[async_trait]
    impl Connector for MemoryConnector {
        async fn open(&self, endpoint: &str) -> Result<Transport, BotError> {
            let next = self
                .pending
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .pop_front();
            match next {
                Some(transport) => {
                    debug!("Opened in-memory connection to {}", endpoint);
                    Ok(transport)
                }
                None => Err(BotError::Connectivity(format!(
                    "no in-memory peer listening at {}",
                    endpoint
                ))),
            }
        }
    }

    struct MemoryReader {
        inbound: mpsc::UnboundedReceiver<String>,
    }

    #[async_trait]
    impl FrameReader for MemoryReader {
        async fn recv(&mut self) -> Result<Option<String>, BotError> {
            Ok(self.inbound.recv().await)
        }
    }

    struct MemoryWriter {
        outbound: Option<mpsc::UnboundedSender<String>>,
        closed: Arc<AtomicBool>,
    }

    #[async_trait]
    impl FrameWriter for MemoryWriter {
        async fn send(&mut self, text: String) -> Result<(), BotError> {
            let outbound = self
                .outbound
                .as_ref()
                .ok_or_else(|| BotError::Connectivity("connection closed".to_string()))?;
            outbound
                .send(text)
                .map_err(|_| BotError::Connectivity("peer went away".to_string()))
        }

        async fn close(&mut self) -> Result<(), BotError> {
            self.closed.store(true, Ordering::SeqCst);
            self.outbound.take();
            Ok(())
        }
    }

    impl Drop for MemoryWriter {
        fn drop(&mut self) {
            self.closed.store(true, Ordering::SeqCst);
        }
    }

    /// The platform's side of an in-memory connection
    #[derive(Debug)]
    pub struct MemoryPeer {
        to_bot: Mutex<Option<mpsc::UnboundedSender<String>>>,
        from_bot: tokio::sync::Mutex<mpsc::UnboundedReceiver<String>>,
        closed: Arc<AtomicBool>,
    }

    impl MemoryPeer {
        /// Push a raw text frame to the bot. Returns `false` once the
        /// connection is closed.
        pub fn send_text(&self, text: impl Into<String>) -> bool {
            if self.is_closed() {
                return false;
            }
            match &*self.to_bot.lock().unwrap_or_else(PoisonError::into_inner) {
                Some(tx) => tx.send(text.into()).is_ok(),
                None => false,
            }
        }

        /// Push a JSON value to the bot
        pub fn send_json(&self, value: &Value) -> bool {
            self.send_text(value.to_string())
        }

        /// Next frame sent by the bot, decoded as JSON. `None` once the bot
        /// closed the connection and every sent frame was read.
        pub async fn recv_frame(&self) -> Option<Value> {
            let text = self.from_bot.lock().await.recv().await?;
            serde_json::from_str(&text).ok()
        }

        /// Whether the bot side has closed the connection
        pub fn is_closed(&self) -> bool {
            self.closed.load(Ordering::SeqCst)
        }

        /// Hang up from the platform side
        pub fn disconnect(&self) {
            self.to_bot
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .take();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::memory::MemoryConnector;
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_static_endpoint() {
        let resolver = StaticEndpoint("wss://example.test/rtm".to_string());
        assert_eq!(resolver.resolve().await.unwrap(), "wss://example.test/rtm");
    }

    #[tokio::test]
    async fn test_memory_round_trip() {
        let connector = MemoryConnector::new();
        let peer = connector.add_peer();
        assert_eq!(connector.pending(), 1);

        let mut transport = connector.open("memory://bot").await.unwrap();
        assert_eq!(connector.pending(), 0);

        assert!(peer.send_json(&json!({"type": "hello"})));
        let received = transport.reader.recv().await.unwrap();
        assert_eq!(received.as_deref(), Some(r#"{"type":"hello"}"#));

        transport
            .writer
            .send(r#"{"type":"ping","id":1}"#.to_string())
            .await
            .unwrap();
        assert_eq!(
            peer.recv_frame().await,
            Some(json!({"type": "ping", "id": 1}))
        );
    }

    #[tokio::test]
    async fn test_memory_open_without_peer() {
        let connector = MemoryConnector::new();
        let err = connector.open("memory://nobody").await.unwrap_err();
        assert!(matches!(err, BotError::Connectivity(_)));
    }

    #[tokio::test]
    async fn test_memory_close_and_disconnect() {
        let connector = MemoryConnector::new();
        let peer = connector.add_peer();
        let mut transport = connector.open("memory://bot").await.unwrap();

        peer.disconnect();
        assert_eq!(transport.reader.recv().await.unwrap(), None);

        assert!(!peer.is_closed());
        transport.writer.close().await.unwrap();
        assert!(peer.is_closed());
        assert!(!peer.send_text("late"));
        assert!(transport.writer.send("late".to_string()).await.is_err());
        assert_eq!(peer.recv_frame().await, None);
    }
}
