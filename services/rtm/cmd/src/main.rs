//! Slack RTM bot runner binary.
//!
//! Connects one of the bundled bots to the real-time messaging API and runs
//! it until the session fails. The process exits non-zero on any runtime
//! error; restarting is left to the process supervisor.

use clap::{Parser, Subcommand};
use rtm_api::WebApi;
use rtm_session::websocket::WebSocketConnector;
use rtm_session::{BotDriver, ConnectionManager};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

mod bots;
mod config;
mod logging;

use bots::{LogBot, UnfurlBot};
use config::BotConfig;
use logging::BotLogFormatter;

/// Run a bot on the Slack real-time messaging API
#[derive(Parser, Debug)]
#[command(name = "slack-rtm", version, about = "Slack RTM bot runner")]
struct Args {
    /// Path to configuration file
    #[arg(long, default_value = "config.yaml")]
    config: PathBuf,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Ping interval, e.g. 1s
    #[arg(long)]
    ping_interval: Option<humantime::Duration>,

    /// Time without a pong before the session fails, e.g. 5s
    #[arg(long)]
    liveness_timeout: Option<humantime::Duration>,

    /// Which bot to run
    #[command(subcommand)]
    bot: BotKind,
}

#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
enum BotKind {
    /// Print every message as `[#channel] <user> text`
    Log,
    /// Unfurl links matching the configured pattern
    Unfurl,
}

#[tokio::main(flavor = "multi_thread")]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let env_filter = EnvFilter::new("info")
        .add_directive(format!("slack_rtm={}", args.log_level).parse()?)
        .add_directive(format!("rtm_session={}", args.log_level).parse()?)
        .add_directive(format!("rtm_api={}", args.log_level).parse()?)
        .add_directive(format!("rtm_wire={}", args.log_level).parse()?);

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_ansi(true)
        .event_format(BotLogFormatter::new("slack-rtm"))
        .init();

    info!("Starting slack-rtm v{}", env!("CARGO_PKG_VERSION"));

    let mut config = BotConfig::load_from_file(&args.config)?;
    config.apply_cli_overrides(
        args.ping_interval.map(Into::into),
        args.liveness_timeout.map(Into::into),
    );

    let http = reqwest::Client::new();
    let bot_api = WebApi::with_client(
        http.clone(),
        config.api_base_url.as_str(),
        config.require_bot_token()?,
    );
    let user_api = WebApi::with_client(
        http.clone(),
        config.api_base_url.as_str(),
        config.user_token_or_bot()?,
    );

    let driver = build_driver(args.bot, user_api, http, &config)?;
    let manager = ConnectionManager::new(
        config.session_config(),
        Arc::new(bot_api),
        Arc::new(WebSocketConnector::new()),
    );

    component_info!("runner", "Running {:?} bot", args.bot);
    if let Err(e) = manager.run(driver).await {
        component_error!("runner", "Bot stopped: {}", e);
        return Err(e.into());
    }
    Ok(())
}

fn build_driver(
    kind: BotKind,
    user_api: WebApi,
    http: reqwest::Client,
    config: &BotConfig,
) -> anyhow::Result<Arc<dyn BotDriver>> {
    Ok(match kind {
        BotKind::Log => Arc::new(LogBot::new(user_api)),
        BotKind::Unfurl => Arc::new(UnfurlBot::new(user_api, http, &config.unfurl)?),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;
    use std::time::Duration;

    #[test]
    fn test_cli_definition() {
        Args::command().debug_assert();
    }

    #[test]
    fn test_parse_overrides() {
        let args = Args::parse_from([
            "slack-rtm",
            "--ping-interval",
            "500ms",
            "--liveness-timeout",
            "3s",
            "unfurl",
        ]);
        assert_eq!(args.bot, BotKind::Unfurl);
        assert_eq!(
            args.ping_interval.map(Duration::from),
            Some(Duration::from_millis(500))
        );
        assert_eq!(
            args.liveness_timeout.map(Duration::from),
            Some(Duration::from_secs(3))
        );
        assert_eq!(args.config, PathBuf::from("config.yaml"));
    }

    #[test]
    fn test_build_driver_rejects_bad_pattern() {
        let mut config = BotConfig::default();
        config.unfurl.pattern = "[".to_string();
        let api = WebApi::new("xoxp-test");
        assert!(build_driver(BotKind::Unfurl, api.clone(), reqwest::Client::new(), &config).is_err());
        assert!(build_driver(BotKind::Log, api, reqwest::Client::new(), &config).is_ok());
    }
}
