//! Connection manager owning the session lifecycle.
//!
//! [`ConnectionManager::connect`] is a scoped acquisition: it negotiates the
//! endpoint, opens the transport, runs the caller's body with a connected
//! [`BotContext`] and tears everything down on every exit path.
//! [`ConnectionManager::run`] builds the standard bot session on top of it.

use async_trait::async_trait;
use std::future::Future;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use crate::error::BotError;
use crate::keepalive::KeepaliveWatchdog;
use crate::session::{receive_loop, transmit_loop, BotContext, Session, SessionConfig};
use crate::transport::{Connector, EndpointResolver};

/// Bot logic started once per session
#[async_trait]
pub trait BotDriver: Send + Sync {
    /// Set up the bot for a fresh session: register handlers, schedule
    /// background work. Runs as a supervised task.
    async fn run_bot(&self, ctx: BotContext) -> Result<(), BotError>;
}

struct FnDriver<F> {
    f: F,
}

#[async_trait]
impl<F, Fut> BotDriver for FnDriver<F>
where
    F: Fn(BotContext) -> Fut + Send + Sync,
    Fut: Future<Output = Result<(), BotError>> + Send,
{
    async fn run_bot(&self, ctx: BotContext) -> Result<(), BotError> {
        (self.f)(ctx).await
    }
}

/// Wrap an async closure as a [`BotDriver`]
pub fn driver_fn<F, Fut>(f: F) -> Arc<dyn BotDriver>
where
    F: Fn(BotContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), BotError>> + Send + 'static,
{
    Arc::new(FnDriver { f })
}

/// Owns one bot's connection and everything scoped to it
pub struct ConnectionManager {
    ctx: BotContext,
    resolver: Arc<dyn EndpointResolver>,
    connector: Arc<dyn Connector>,
}

impl std::fmt::Debug for ConnectionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionManager")
            .field("ctx", &self.ctx)
            .finish_non_exhaustive()
    }
}

impl ConnectionManager {
    /// Create a disconnected manager
    pub fn new(
        config: SessionConfig,
        resolver: Arc<dyn EndpointResolver>,
        connector: Arc<dyn Connector>,
    ) -> Self {
        Self {
            ctx: BotContext::new(config),
            resolver,
            connector,
        }
    }

    /// The context shared by every session of this manager
    pub fn context(&self) -> BotContext {
        self.ctx.clone()
    }

    /// Open a session, run `body` inside it and tear it down afterwards.
    ///
    /// Fails with [`BotError::AlreadyConnected`] without touching the active
    /// session if one exists. Otherwise the context is always back to
    /// disconnected when this returns, whatever the outcome.
    pub async fn connect<F, Fut, T>(&self, body: F) -> Result<T, BotError>
    where
        F: FnOnce(BotContext) -> Fut,
        Fut: Future<Output = Result<T, BotError>>,
    {
        self.ctx.begin_connect()?;
        let guard = DetachOnDrop {
            ctx: Some(&self.ctx),
        };

        let result = match self.open().await {
            Ok(session) => {
                self.ctx.attach(session);
                body(self.ctx.clone()).await
            }
            Err(e) => {
                error!("Failed to connect: {}", e);
                Err(e)
            }
        };

        guard.disarm();
        self.teardown().await;
        result
    }

    /// Run `driver` until the session fails.
    ///
    /// Schedules the keepalive watchdog, the receive and transmit loops and
    /// the driver itself, then supervises them. Returns the first error any
    /// of them raised.
    pub async fn run(&self, driver: Arc<dyn BotDriver>) -> Result<(), BotError> {
        self.connect(|ctx| async move {
            let session = ctx.session()?;
            let watchdog = KeepaliveWatchdog::new(ctx.config(), session.created_at());

            ctx.schedule(watchdog.run(ctx.clone()))?;
            ctx.schedule(receive_loop(ctx.clone()))?;
            ctx.schedule(transmit_loop(ctx.clone()))?;
            let bot_ctx = ctx.clone();
            ctx.schedule(async move { driver.run_bot(bot_ctx).await })?;

            info!("Bot running with {} supervised tasks", ctx.tasks().tracked());
            ctx.tasks().drive().await
        })
        .await
    }

    async fn open(&self) -> Result<Arc<Session>, BotError> {
        let endpoint = self.resolver.resolve().await?;
        debug!("Endpoint negotiated");
        let transport = self.connector.open(&endpoint).await?;
        Ok(Arc::new(Session::new(endpoint, transport)))
    }

    async fn teardown(&self) {
        if let Some(session) = self.ctx.detach() {
            if let Err(e) = session.close().await {
                warn!("Error closing connection: {}", e);
            }
        }
        info!("Disconnected");
    }
}

/// Clears the context if a `connect` future is dropped mid-flight
struct DetachOnDrop<'a> {
    ctx: Option<&'a BotContext>,
}

impl DetachOnDrop<'_> {
    fn disarm(mut self) {
        self.ctx = None;
    }
}

impl Drop for DetachOnDrop<'_> {
    fn drop(&mut self) {
        if let Some(ctx) = self.ctx.take() {
            warn!("Connection abandoned, clearing session state");
            ctx.detach();
        }
    }
}
