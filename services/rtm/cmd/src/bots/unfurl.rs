//! Unfurls links matching a host pattern with the resource's HTTP status.

use anyhow::Context;
use async_trait::async_trait;
use regex::Regex;
use rtm_api::{Unfurl, WebApi};
use rtm_session::{BotContext, BotDriver, BotError, Handler};
use rtm_wire::{FrameKind, InboundMessage};
use std::collections::HashMap;
use std::sync::Arc;

use crate::config::UnfurlConfig;
use crate::{component_debug, component_info};

/// Attaches a status-code unfurl to every matching link posted
pub struct UnfurlBot {
    state: Arc<UnfurlState>,
}

struct UnfurlState {
    /// Must carry a user token; bot tokens cannot unfurl
    api: WebApi,
    http: reqwest::Client,
    links: Regex,
    footer: String,
    footer_icon: String,
}

impl UnfurlBot {
    /// Create a bot unfurling links that match `config.pattern`
    pub fn new(api: WebApi, http: reqwest::Client, config: &UnfurlConfig) -> anyhow::Result<Self> {
        Ok(Self {
            state: Arc::new(UnfurlState {
                api,
                http,
                links: link_regex(&config.pattern)?,
                footer: config.footer.clone(),
                footer_icon: config.footer_icon.clone(),
            }),
        })
    }
}

/// Links in message markup look like `<url>` or `<url|label>`
fn link_regex(pattern: &str) -> anyhow::Result<Regex> {
    Regex::new(&format!(r"<({}.*?)(?:\||>)", pattern))
        .with_context(|| format!("invalid unfurl pattern {:?}", pattern))
}

#[async_trait]
impl BotDriver for UnfurlBot {
    async fn run_bot(&self, ctx: BotContext) -> Result<(), BotError> {
        ctx.register_handler(
            FrameKind::Message.as_str(),
            Arc::new(LinkWatcher {
                state: self.state.clone(),
            }),
        )?;
        Ok(())
    }
}

struct LinkWatcher {
    state: Arc<UnfurlState>,
}

#[async_trait]
impl Handler for LinkWatcher {
    async fn handle(&self, ctx: BotContext, message: InboundMessage) -> Result<(), BotError> {
        let text = message.str_field("text").unwrap_or_default();
        let links = self.state.extract_links(text);
        if links.is_empty() {
            return Ok(());
        }

        let (Some(channel), Some(ts)) = (message.str_field("channel"), message.str_field("ts"))
        else {
            component_debug!("unfurl", "Ignoring {} links without channel or ts", links.len());
            return Ok(());
        };

        for link in links {
            let state = self.state.clone();
            let channel = channel.to_string();
            let ts = ts.to_string();
            ctx.schedule(async move { state.unfurl_link(link, channel, ts).await })?;
        }
        Ok(())
    }
}

impl UnfurlState {
    fn extract_links(&self, text: &str) -> Vec<String> {
        self.links
            .captures_iter(text)
            .filter_map(|caps| caps.get(1))
            .map(|m| m.as_str().to_string())
            .collect()
    }

    fn unfurl_for(&self, status: u16) -> Unfurl {
        Unfurl {
            text: Some(format!("That resource had status code: {}", status)),
            footer: Some(self.footer.clone()),
            footer_icon: Some(self.footer_icon.clone()),
        }
    }

    async fn unfurl_link(&self, link: String, channel: String, ts: String) -> Result<(), BotError> {
        let response = self
            .http
            .get(&link)
            .send()
            .await
            .with_context(|| format!("fetching {}", link))?;
        let status = response.status().as_u16();

        let unfurls = HashMap::from([(link.clone(), self.unfurl_for(status))]);
        self.api.unfurl(&channel, &ts, &unfurls).await?;
        component_info!("unfurl", "Unfurled {} in {} (status {})", link, channel, status);
        Ok(())
    }
}
