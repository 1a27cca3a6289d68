//! Handler registration and dispatch.
//!
//! Handlers are keyed by the inbound `type` discriminator. Messages whose
//! type is missing, null or not a string go to the untyped bucket, which
//! handlers can subscribe to like any other type.

use async_trait::async_trait;
use rtm_wire::InboundMessage;
use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, PoisonError, RwLock};
use tracing::{debug, trace};

use crate::error::BotError;
use crate::session::BotContext;

/// Something that reacts to one inbound message
#[async_trait]
pub trait Handler: Send + Sync {
    /// Handle one message. Runs as its own supervised task.
    async fn handle(&self, ctx: BotContext, message: InboundMessage) -> Result<(), BotError>;
}

/// Adapter turning an async closure into a [`Handler`]
pub struct FnHandler<F> {
    f: F,
}

#[async_trait]
impl<F, Fut> Handler for FnHandler<F>
where
    F: Fn(BotContext, InboundMessage) -> Fut + Send + Sync,
    Fut: Future<Output = Result<(), BotError>> + Send,
{
    async fn handle(&self, ctx: BotContext, message: InboundMessage) -> Result<(), BotError> {
        (self.f)(ctx, message).await
    }
}

/// Wrap an async closure as a shareable handler.
///
/// The returned `Arc` is the handler's identity: registering clones of the
/// same `Arc` twice for one type is a no-op.
pub fn handler_fn<F, Fut>(f: F) -> Arc<dyn Handler>
where
    F: Fn(BotContext, InboundMessage) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), BotError>> + Send + 'static,
{
    Arc::new(FnHandler { f })
}

type HandlerKey = Option<String>;

/// Maps type discriminators to the set of interested handlers
#[derive(Default)]
pub struct HandlerRegistry {
    handlers: RwLock<HashMap<HandlerKey, Vec<Arc<dyn Handler>>>>,
}

impl std::fmt::Debug for HandlerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let handlers = self.handlers.read().unwrap_or_else(PoisonError::into_inner);
        let counts: HashMap<&HandlerKey, usize> =
            handlers.iter().map(|(k, v)| (k, v.len())).collect();
        f.debug_struct("HandlerRegistry").field("handlers", &counts).finish()
    }
}

impl HandlerRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a handler for a type (`None` is the untyped bucket).
    ///
    /// Returns `false` if this exact handler was already registered for the
    /// type, in which case nothing changes.
    pub(crate) fn register(&self, message_type: Option<&str>, handler: Arc<dyn Handler>) -> bool {
        let mut handlers = self.handlers.write().unwrap_or_else(PoisonError::into_inner);
        let set = handlers.entry(message_type.map(str::to_string)).or_default();

        if set.iter().any(|existing| same_handler(existing, &handler)) {
            trace!("Handler already registered for {:?}", message_type);
            return false;
        }
        set.push(handler);
        debug!(
            "Registered handler for {:?} ({} total)",
            message_type,
            set.len()
        );
        true
    }

    /// Copy of the handlers currently registered for a type
    pub fn snapshot(&self, message_type: Option<&str>) -> Vec<Arc<dyn Handler>> {
        let handlers = self.handlers.read().unwrap_or_else(PoisonError::into_inner);
        handlers
            .get(&message_type.map(str::to_string))
            .cloned()
            .unwrap_or_default()
    }

    /// Number of handlers registered for a type
    pub fn count(&self, message_type: Option<&str>) -> usize {
        let handlers = self.handlers.read().unwrap_or_else(PoisonError::into_inner);
        handlers
            .get(&message_type.map(str::to_string))
            .map_or(0, Vec::len)
    }

    /// Whether no handler is registered at all
    pub fn is_empty(&self) -> bool {
        let handlers = self.handlers.read().unwrap_or_else(PoisonError::into_inner);
        handlers.values().all(Vec::is_empty)
    }

    /// Drop every registration
    pub(crate) fn clear(&self) {
        self.handlers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    /// Schedule one task per handler registered for the message's type.
    ///
    /// The handler set is snapshotted before scheduling: a handler added
    /// while this runs is not part of this round but sees later messages.
    /// Returns the number of tasks scheduled.
    pub fn dispatch(&self, ctx: &BotContext, message: InboundMessage) -> Result<usize, BotError> {
        let handlers = self.snapshot(message.message_type());
        if handlers.is_empty() {
            trace!("No handlers for {:?}", message.message_type());
            return Ok(0);
        }

        for handler in &handlers {
            let handler = handler.clone();
            let task_ctx = ctx.clone();
            let message = message.clone();
            ctx.schedule(async move { handler.handle(task_ctx, message).await })?;
        }
        trace!(
            "Dispatched {:?} to {} handlers",
            message.message_type(),
            handlers.len()
        );
        Ok(handlers.len())
    }
}

/// Handler identity is the allocation, not the vtable
fn same_handler(a: &Arc<dyn Handler>, b: &Arc<dyn Handler>) -> bool {
    std::ptr::eq(
        Arc::as_ptr(a) as *const (),
        Arc::as_ptr(b) as *const (),
    )
}
