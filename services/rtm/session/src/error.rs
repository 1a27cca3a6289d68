//! Runtime error types.
//!
//! Every variant is fatal for the session: the supervisor aborts the run on
//! the first error it observes and the connection manager tears down.

use rtm_api::ApiError;
use rtm_wire::WireError;
use std::time::Duration;
use thiserror::Error;

/// Errors surfaced by the bot runtime
#[derive(Error, Debug)]
pub enum BotError {
    /// Endpoint negotiation or transport open/send/receive failure
    #[error("connectivity error: {0}")]
    Connectivity(String),

    /// Operation requires an active session
    #[error("bot must be connected to call this method")]
    NotConnected,

    /// `connect` called while a session is already active
    #[error("bot is already connected")]
    AlreadyConnected,

    /// No pong observed within the liveness threshold
    #[error("no pong received within {elapsed:?}")]
    LivenessTimeout {
        /// Time since the last liveness reply
        elapsed: Duration,
    },

    /// Error raised by a handler or by bot logic
    #[error(transparent)]
    Handler(#[from] anyhow::Error),

    /// A supervised task panicked
    #[error("task panicked: {0}")]
    TaskPanicked(String),
}

impl From<WireError> for BotError {
    fn from(err: WireError) -> Self {
        BotError::Connectivity(format!("undecodable frame: {}", err))
    }
}

impl From<ApiError> for BotError {
    fn from(err: ApiError) -> Self {
        BotError::Handler(err.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_handler_error_is_transparent() {
        let err: BotError = anyhow::anyhow!("boom").into();
        assert_eq!(err.to_string(), "boom");
    }

    #[test]
    fn test_api_errors_are_handler_errors() {
        let err: BotError = ApiError::Platform("channel_not_found".into()).into();
        assert!(matches!(err, BotError::Handler(_)));
        assert_eq!(err.to_string(), "API returned error: channel_not_found");
    }

    #[test]
    fn test_wire_errors_are_connectivity_errors() {
        let err: BotError = WireError::NotAnObject.into();
        assert!(matches!(err, BotError::Connectivity(_)));
    }
}
