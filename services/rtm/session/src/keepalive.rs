//! Keepalive protocol with PING/PONG liveness tracking.
//!
//! The watchdog sends a ping every `ping_interval` and fails the session once
//! no pong has been seen for longer than the liveness threshold. It never
//! finishes on its own.

use async_trait::async_trait;
use rtm_wire::{FrameKind, InboundMessage, OutboundFrame};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, trace, warn};

use crate::error::BotError;
use crate::registry::Handler;
use crate::session::{BotContext, SessionConfig};

/// Build a PING frame. The id is assigned on send.
pub fn build_ping() -> OutboundFrame {
    OutboundFrame::new(FrameKind::Ping)
}

/// Liveness bookkeeping shared between the loop and its pong handler
#[derive(Debug, Clone)]
pub struct WatchdogState {
    /// Last time a pong was observed (or the session started)
    pub last_liveness_reply: Instant,
    /// Delay between pings
    pub ping_interval: Duration,
    /// Longest tolerated silence
    pub timeout_threshold: Duration,
}

/// Pings the server and fails the session when pongs stop arriving
#[derive(Debug, Clone)]
pub struct KeepaliveWatchdog {
    state: Arc<Mutex<WatchdogState>>,
}

impl KeepaliveWatchdog {
    /// Create a watchdog whose silence clock starts at `started_at`
    pub fn new(config: &SessionConfig, started_at: Instant) -> Self {
        Self {
            state: Arc::new(Mutex::new(WatchdogState {
                last_liveness_reply: started_at,
                ping_interval: config.ping_interval,
                timeout_threshold: config.liveness_timeout,
            })),
        }
    }

    /// Time since the last pong
    pub fn elapsed(&self) -> Duration {
        self.lock().last_liveness_reply.elapsed()
    }

    /// Note that the server answered
    pub fn record_pong(&self) {
        self.lock().last_liveness_reply = Instant::now();
    }

    /// Fail if the silence has lasted longer than the threshold
    pub fn check(&self) -> Result<(), BotError> {
        let state = self.lock();
        let elapsed = state.last_liveness_reply.elapsed();
        if elapsed > state.timeout_threshold {
            warn!(
                "No pong for {:?} (threshold {:?})",
                elapsed, state.timeout_threshold
            );
            return Err(BotError::LivenessTimeout { elapsed });
        }
        Ok(())
    }

    /// Register the pong handler, then ping until liveness is lost
    pub async fn run(self, ctx: BotContext) -> Result<(), BotError> {
        ctx.register_handler(
            FrameKind::Pong.as_str(),
            Arc::new(PongHandler {
                watchdog: self.clone(),
            }),
        )?;
        let interval = self.lock().ping_interval;
        debug!("Keepalive started (every {:?})", interval);

        loop {
            self.check()?;
            let id = ctx.send(build_ping())?;
            trace!("Ping {} queued", id);
            tokio::time::sleep(interval).await;
        }
    }

    fn lock(&self) -> MutexGuard<'_, WatchdogState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

struct PongHandler {
    watchdog: KeepaliveWatchdog,
}

#[async_trait]
impl Handler for PongHandler {
    async fn handle(&self, _ctx: BotContext, message: InboundMessage) -> Result<(), BotError> {
        trace!("Pong for {:?}", message.get("reply_to"));
        self.watchdog.record_pong();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::tests::connected_context;
    use serde_json::json;

    fn config() -> SessionConfig {
        SessionConfig {
            ping_interval: Duration::from_secs(1),
            liveness_timeout: Duration::from_secs(5),
        }
    }

    #[test]
    fn test_build_ping() {
        let ping = build_ping().seal(7);
        assert_eq!(ping.fields().get("type"), Some(&json!("ping")));
        assert_eq!(ping.id(), 7);
    }

    #[tokio::test(start_paused = true)]
    async fn test_check_after_threshold() {
        let watchdog = KeepaliveWatchdog::new(&config(), Instant::now());
        tokio::time::advance(Duration::from_secs(5)).await;
        // Exactly at the threshold is still alive
        assert!(watchdog.check().is_ok());

        tokio::time::advance(Duration::from_millis(1)).await;
        match watchdog.check() {
            Err(BotError::LivenessTimeout { elapsed }) => {
                assert!(elapsed > Duration::from_secs(5))
            }
            other => panic!("expected liveness timeout, got {:?}", other),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_pong_resets_clock() {
        let watchdog = KeepaliveWatchdog::new(&config(), Instant::now());
        tokio::time::advance(Duration::from_secs(4)).await;
        watchdog.record_pong();
        tokio::time::advance(Duration::from_secs(4)).await;

        assert!(watchdog.check().is_ok());
        assert_eq!(watchdog.elapsed(), Duration::from_secs(4));
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_registers_pong_handler_and_pings() {
        let (ctx, _peer) = connected_context().await;
        let watchdog = KeepaliveWatchdog::new(&config(), Instant::now());

        let err = watchdog.run(ctx.clone()).await.unwrap_err();
        assert!(matches!(err, BotError::LivenessTimeout { .. }));
        assert_eq!(ctx.handlers().count(Some("pong")), 1);
        // One ping per second until the threshold passes
        let pings = ctx.ids().peek() - 1;
        assert!((5..=6).contains(&pings), "sent {} pings", pings);
    }
}
