//! Session state and the per-session I/O loops.
//!
//! A [`BotContext`] is the handle every operation takes: it owns the
//! connection state, the active [`Session`], the task supervisor, the handler
//! registry and the id allocator. The context outlives sessions; the
//! connection manager attaches a new session on connect and detaches it
//! (clearing everything session-scoped) on teardown.

use rtm_wire::{decode_inbound, InboundMessage, OutboundFrame, SealedFrame};
use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::{debug, info, trace};

use crate::error::BotError;
use crate::ids::MessageIdAllocator;
use crate::registry::{Handler, HandlerRegistry};
use crate::supervisor::TaskSupervisor;
use crate::transport::{FrameReader, FrameWriter, Transport};

/// Timing configuration for a session
#[derive(Clone, Debug)]
pub struct SessionConfig {
    /// Interval between PING frames
    pub ping_interval: Duration,
    /// Maximum time without a PONG before the session is failed
    pub liveness_timeout: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            ping_interval: Duration::from_secs(1),
            liveness_timeout: Duration::from_secs(5),
        }
    }
}

/// Connection lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// No session
    Disconnected,
    /// Negotiating the endpoint and opening the transport
    Connecting,
    /// Session active
    Connected,
}

/// One live connection
pub struct Session {
    endpoint: String,
    created_at: Instant,
    /// Ids are assigned and frames queued under this lock
    outbound: Mutex<mpsc::UnboundedSender<SealedFrame>>,
    outbound_rx: tokio::sync::Mutex<mpsc::UnboundedReceiver<SealedFrame>>,
    reader: tokio::sync::Mutex<Box<dyn FrameReader>>,
    writer: tokio::sync::Mutex<Box<dyn FrameWriter>>,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("endpoint", &self.endpoint)
            .field("created_at", &self.created_at)
            .finish_non_exhaustive()
    }
}

impl Session {
    /// Wrap an open transport
    pub fn new(endpoint: impl Into<String>, transport: Transport) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            endpoint: endpoint.into(),
            created_at: Instant::now(),
            outbound: Mutex::new(tx),
            outbound_rx: tokio::sync::Mutex::new(rx),
            reader: tokio::sync::Mutex::new(transport.reader),
            writer: tokio::sync::Mutex::new(transport.writer),
        }
    }

    /// The negotiated endpoint
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// When the connection was opened
    pub fn created_at(&self) -> Instant {
        self.created_at
    }

    /// Close the underlying transport
    pub async fn close(&self) -> Result<(), BotError> {
        self.writer.lock().await.close().await
    }
}

struct Shared {
    config: SessionConfig,
    state: RwLock<ConnectionState>,
    session: RwLock<Option<Arc<Session>>>,
    tasks: TaskSupervisor,
    handlers: HandlerRegistry,
    ids: MessageIdAllocator,
}

/// Runtime context passed to every bot operation
#[derive(Clone)]
pub struct BotContext {
    shared: Arc<Shared>,
}

impl std::fmt::Debug for BotContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BotContext")
            .field("state", &self.state())
            .field("tracked", &self.shared.tasks.tracked())
            .finish()
    }
}

impl BotContext {
    /// Create a disconnected context
    pub fn new(config: SessionConfig) -> Self {
        Self {
            shared: Arc::new(Shared {
                config,
                state: RwLock::new(ConnectionState::Disconnected),
                session: RwLock::new(None),
                tasks: TaskSupervisor::new(),
                handlers: HandlerRegistry::new(),
                ids: MessageIdAllocator::new(),
            }),
        }
    }

    /// Current lifecycle state
    pub fn state(&self) -> ConnectionState {
        *read(&self.shared.state)
    }

    /// Whether a session is active
    pub fn is_connected(&self) -> bool {
        self.state() == ConnectionState::Connected
    }

    /// The active session
    pub fn session(&self) -> Result<Arc<Session>, BotError> {
        read(&self.shared.session)
            .clone()
            .ok_or(BotError::NotConnected)
    }

    /// Timing configuration
    pub fn config(&self) -> &SessionConfig {
        &self.shared.config
    }

    /// The task supervisor
    pub fn tasks(&self) -> &TaskSupervisor {
        &self.shared.tasks
    }

    /// The handler registry
    pub fn handlers(&self) -> &HandlerRegistry {
        &self.shared.handlers
    }

    /// The frame id allocator
    pub fn ids(&self) -> &MessageIdAllocator {
        &self.shared.ids
    }

    /// Run `work` concurrently under the session's supervisor
    pub fn schedule<F>(&self, work: F) -> Result<(), BotError>
    where
        F: Future<Output = Result<(), BotError>> + Send + 'static,
    {
        let state = read(&self.shared.state);
        if *state != ConnectionState::Connected {
            return Err(BotError::NotConnected);
        }
        self.shared.tasks.schedule(work)
    }

    /// Register `handler` for messages of `message_type`.
    ///
    /// Returns `false` if the same handler was already registered for the
    /// type.
    pub fn register_handler(
        &self,
        message_type: &str,
        handler: Arc<dyn Handler>,
    ) -> Result<bool, BotError> {
        self.require_connected()?;
        Ok(self.shared.handlers.register(Some(message_type), handler))
    }

    /// Register `handler` for messages without a string `type`
    pub fn register_untyped_handler(&self, handler: Arc<dyn Handler>) -> Result<bool, BotError> {
        self.require_connected()?;
        Ok(self.shared.handlers.register(None, handler))
    }

    /// Schedule every handler interested in `message`
    pub fn dispatch(&self, message: InboundMessage) -> Result<usize, BotError> {
        self.shared.handlers.dispatch(self, message)
    }

    /// Assign the next id to `frame` and queue it for transmission.
    ///
    /// Frames reach the transport in id order. Returns the assigned id.
    pub fn send(&self, frame: OutboundFrame) -> Result<u64, BotError> {
        let session = self.session()?;
        let outbound = session
            .outbound
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        let id = self.shared.ids.next_id();
        let sealed = frame.seal(id);
        trace!("Queued {} frame {}", frame_kind(&sealed), id);
        outbound
            .send(sealed)
            .map_err(|_| BotError::Connectivity("outbound queue closed".to_string()))?;
        Ok(id)
    }

    fn require_connected(&self) -> Result<(), BotError> {
        if self.is_connected() {
            Ok(())
        } else {
            Err(BotError::NotConnected)
        }
    }

    /// Move from disconnected to connecting
    pub(crate) fn begin_connect(&self) -> Result<(), BotError> {
        let mut state = write(&self.shared.state);
        if *state != ConnectionState::Disconnected {
            return Err(BotError::AlreadyConnected);
        }
        *state = ConnectionState::Connecting;
        debug!("Connecting");
        Ok(())
    }

    /// Make `session` the active session
    pub(crate) fn attach(&self, session: Arc<Session>) {
        info!("Connected to {}", redact_endpoint(session.endpoint()));
        *write(&self.shared.session) = Some(session);
        self.shared.ids.reset();

        let mut state = write(&self.shared.state);
        self.shared.tasks.open();
        *state = ConnectionState::Connected;
    }

    /// Clear every session-scoped structure and return the old session
    pub(crate) fn detach(&self) -> Option<Arc<Session>> {
        let mut state = write(&self.shared.state);
        *state = ConnectionState::Disconnected;
        self.shared.tasks.close();
        drop(state);

        let session = write(&self.shared.session).take();
        self.shared.handlers.clear();
        self.shared.ids.reset();
        session
    }
}

/// Read inbound frames and dispatch them until the connection fails
pub async fn receive_loop(ctx: BotContext) -> Result<(), BotError> {
    let session = ctx.session()?;
    let mut reader = session.reader.lock().await;

    loop {
        let text = reader
            .recv()
            .await?
            .ok_or_else(|| BotError::Connectivity("connection closed by peer".to_string()))?;
        let message = decode_inbound(&text)?;
        let scheduled = ctx.dispatch(message)?;
        trace!("Inbound frame scheduled {} handlers", scheduled);
    }
}

/// Write queued frames to the transport in the order they were queued
pub async fn transmit_loop(ctx: BotContext) -> Result<(), BotError> {
    let session = ctx.session()?;
    let mut queue = session.outbound_rx.lock().await;

    while let Some(frame) = queue.recv().await {
        let text = frame.encode().map_err(|e| {
            BotError::Connectivity(format!("unencodable outbound frame {}: {}", frame.id(), e))
        })?;
        session.writer.lock().await.send(text).await?;
        debug!("Sent frame {}", frame.id());
    }
    Err(BotError::Connectivity("outbound queue closed".to_string()))
}

fn frame_kind(frame: &SealedFrame) -> &str {
    frame
        .fields()
        .get(rtm_wire::TYPE_FIELD)
        .and_then(serde_json::Value::as_str)
        .unwrap_or("untyped")
}

/// Strip the query string, which carries the connection ticket
fn redact_endpoint(endpoint: &str) -> &str {
    endpoint.split('?').next().unwrap_or(endpoint)
}

fn read<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(PoisonError::into_inner)
}

fn write<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(PoisonError::into_inner)
}
