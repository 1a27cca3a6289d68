//! Response and request payloads.

use serde::{Deserialize, Serialize};

use crate::pagination::Page;

/// `rtm.connect` response
#[derive(Debug, Clone, Deserialize)]
pub struct RtmConnect {
    /// WebSocket URL to open
    pub url: String,
    /// The connecting bot user
    #[serde(rename = "self", default)]
    pub self_: Option<BotSelf>,
}

/// Bot user as reported by `rtm.connect`
#[derive(Debug, Clone, Deserialize)]
pub struct BotSelf {
    /// User id
    pub id: String,
    /// User name
    pub name: String,
}

/// `users.info` response
#[derive(Debug, Clone, Deserialize)]
pub struct UserInfo {
    /// The user
    pub user: User,
}

/// A directory user
#[derive(Debug, Clone, Deserialize)]
pub struct User {
    /// User id
    pub id: String,
    /// Handle
    pub name: String,
    /// Display name, when set
    #[serde(default)]
    pub real_name: Option<String>,
}

/// `channels.info` response
#[derive(Debug, Clone, Deserialize)]
pub struct ChannelInfo {
    /// The channel
    pub channel: Channel,
}

/// A public channel
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Channel {
    /// Channel id
    pub id: String,
    /// Channel name without the leading '#'
    pub name: String,
    /// Whether the token's user is a member
    #[serde(default)]
    pub is_member: bool,
}

/// `auth.test` response
#[derive(Debug, Clone, Deserialize)]
pub struct Identity {
    /// Workspace URL
    #[serde(default)]
    pub url: Option<String>,
    /// Workspace name
    #[serde(default)]
    pub team: Option<String>,
    /// User name
    #[serde(default)]
    pub user: Option<String>,
    /// Workspace id
    #[serde(default)]
    pub team_id: Option<String>,
    /// User id
    #[serde(default)]
    pub user_id: Option<String>,
}

/// `chat.postMessage` response
#[derive(Debug, Clone, Deserialize)]
pub struct PostedMessage {
    /// Channel the message landed in
    pub channel: String,
    /// Timestamp id of the new message
    pub ts: String,
}

/// Continuation data attached to paginated responses
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ResponseMetadata {
    /// Cursor for the next page; empty on the last page
    #[serde(default)]
    pub next_cursor: String,
}

/// One page of `channels.list`
#[derive(Debug, Clone, Deserialize)]
pub struct ChannelPage {
    /// Channels on this page
    #[serde(default)]
    pub channels: Vec<Channel>,
    /// Continuation data
    #[serde(default)]
    pub response_metadata: Option<ResponseMetadata>,
}

impl Page for ChannelPage {
    type Item = Channel;

    fn into_parts(self) -> (Vec<Channel>, Option<String>) {
        let cursor = self.response_metadata.map(|m| m.next_cursor);
        (self.channels, cursor)
    }
}

/// Unfurl attachment for one link
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Unfurl {
    /// Body text
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    /// Footer text
    #[serde(skip_serializing_if = "Option::is_none")]
    pub footer: Option<String>,
    /// Footer icon URL
    #[serde(skip_serializing_if = "Option::is_none")]
    pub footer_icon: Option<String>,
}
