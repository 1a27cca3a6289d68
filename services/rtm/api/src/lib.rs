//! Web API client used by RTM bots.
//!
//! This crate covers the HTTP side of a bot: negotiating the RTM endpoint,
//! directory lookups (users, channels), posting messages, link unfurls and
//! the cursor-paginated channel listing.
//!
//! One [`WebApi`] is bound to one token. Bots that need both a bot-scoped and
//! a user-scoped client construct two.
//!
//! ## Example
//!
//! ```rust,no_run
//! use futures::TryStreamExt;
//! use rtm_api::WebApi;
//!
//! # async fn example() -> Result<(), rtm_api::ApiError> {
//! let api = WebApi::new("xoxb-bot-token");
//! let me = api.identity().await?;
//! println!("Running as {:?}", me.user);
//!
//! let names: Vec<String> = api.my_public_channels().try_collect().await?;
//! println!("Member of {} channels", names.len());
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod client;
pub mod pagination;
pub mod types;

use thiserror::Error;

// Re-export main types
pub use client::{api_url, WebApi, DEFAULT_API_URL};
pub use pagination::{paginate, Page};
pub use types::{
    BotSelf, Channel, ChannelInfo, ChannelPage, Identity, PostedMessage, ResponseMetadata,
    RtmConnect, Unfurl, User, UserInfo,
};

/// Web API errors
#[derive(Error, Debug)]
pub enum ApiError {
    /// Transport failure or non-success HTTP status
    ///
    /// The request URL is stripped since it carries the token.
    #[error("HTTP error: {0}")]
    Http(reqwest::Error),

    /// Base URL could not be combined with the request path
    #[error("invalid URL: {0}")]
    Url(#[from] url::ParseError),

    /// Request path does not start with '/'
    #[error("invalid API path: {0}")]
    Path(String),

    /// The platform answered with `ok: false`
    #[error("API returned error: {0}")]
    Platform(String),

    /// Response body did not have the expected shape
    #[error("unexpected response: {0}")]
    Decode(#[from] serde_json::Error),
}

impl From<reqwest::Error> for ApiError {
    fn from(err: reqwest::Error) -> Self {
        ApiError::Http(err.without_url())
    }
}
