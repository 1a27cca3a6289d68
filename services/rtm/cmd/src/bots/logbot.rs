//! Prints every chat message as `[#channel] <user> text`.

use async_trait::async_trait;
use rtm_api::WebApi;
use rtm_session::{BotContext, BotDriver, BotError, Handler};
use rtm_wire::{FrameKind, InboundMessage};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;

use super::message_parts;
use crate::component_debug;

/// Logs messages from every channel the bot is in
pub struct LogBot {
    state: Arc<LogState>,
}

struct LogState {
    api: WebApi,
    /// User id to name
    users: Mutex<HashMap<String, String>>,
    /// Channel id to name
    channels: Mutex<HashMap<String, String>>,
}

impl LogBot {
    /// Create a bot resolving names through `api`
    pub fn new(api: WebApi) -> Self {
        Self {
            state: Arc::new(LogState {
                api,
                users: Mutex::new(HashMap::new()),
                channels: Mutex::new(HashMap::new()),
            }),
        }
    }
}

#[async_trait]
impl BotDriver for LogBot {
    async fn run_bot(&self, ctx: BotContext) -> Result<(), BotError> {
        ctx.register_handler(
            FrameKind::Message.as_str(),
            Arc::new(MessageLogger {
                state: self.state.clone(),
            }),
        )?;
        Ok(())
    }
}

struct MessageLogger {
    state: Arc<LogState>,
}

#[async_trait]
impl Handler for MessageLogger {
    async fn handle(&self, _ctx: BotContext, message: InboundMessage) -> Result<(), BotError> {
        if let Some(line) = self.state.describe(&message).await? {
            println!("{}", line);
        }
        Ok(())
    }
}

impl LogState {
    /// The log line for `message`, if it is a user's text message
    async fn describe(&self, message: &InboundMessage) -> Result<Option<String>, BotError> {
        let Some((channel, user, text)) = message_parts(message) else {
            component_debug!("log", "Skipping message without channel, user or text");
            return Ok(None);
        };

        let channel_name = self.channel_name(channel).await?;
        let user_name = self.user_name(user).await?;
        Ok(Some(format!("[#{}] <{}> {}", channel_name, user_name, text)))
    }

    async fn user_name(&self, id: &str) -> Result<String, BotError> {
        if let Some(name) = self.users.lock().await.get(id) {
            return Ok(name.clone());
        }
        let name = self.api.user_info(id).await?.user.name;
        self.users.lock().await.insert(id.to_string(), name.clone());
        Ok(name)
    }

    async fn channel_name(&self, id: &str) -> Result<String, BotError> {
        if let Some(name) = self.channels.lock().await.get(id) {
            return Ok(name.clone());
        }
        let name = self.api.channel_info(id).await?.channel.name;
        self.channels.lock().await.insert(id.to_string(), name.clone());
        Ok(name)
    }
}
