//! Configuration handling for the bot runner.
//!
//! Settings come from a YAML file, then environment variables, then the
//! command line. A missing file is not an error; a missing bot token is.

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;
use tracing::{info, warn};

/// Default link pattern the unfurl bot reacts to
pub const DEFAULT_UNFURL_PATTERN: &str = r"https?://www.ocf.berkeley.edu/";

/// Bot runner configuration
#[derive(Debug, Clone)]
pub struct BotConfig {
    /// Token for the bot user (connection and bot-scoped API calls)
    pub bot_token: Option<String>,
    /// Token for a human user (elevated API calls such as unfurls)
    pub user_token: Option<String>,
    /// Web API base URL
    pub api_base_url: String,
    /// Delay between keepalive pings
    pub ping_interval: Duration,
    /// Longest tolerated silence from the server
    pub liveness_timeout: Duration,
    /// Unfurl bot settings
    pub unfurl: UnfurlConfig,
}

/// Unfurl bot settings
#[derive(Debug, Clone, PartialEq)]
pub struct UnfurlConfig {
    /// Host prefix regex a link must match to be unfurled
    pub pattern: String,
    /// Footer text of every unfurl
    pub footer: String,
    /// Footer icon URL of every unfurl
    pub footer_icon: String,
}

impl Default for UnfurlConfig {
    fn default() -> Self {
        Self {
            pattern: DEFAULT_UNFURL_PATTERN.to_string(),
            footer: "hello footer!".to_string(),
            footer_icon: "https://i.fluffy.cc/SScDmZnqsRnNGBwrPBF4MNKSdG8tqKsF.png".to_string(),
        }
    }
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            bot_token: None,
            user_token: None,
            api_base_url: rtm_api::DEFAULT_API_URL.to_string(),
            ping_interval: Duration::from_secs(1),
            liveness_timeout: Duration::from_secs(5),
            unfurl: UnfurlConfig::default(),
        }
    }
}

/// File layout (every key optional)
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct FileConfig {
    slack: Option<SlackSection>,
    keepalive: Option<KeepaliveSection>,
    unfurl: Option<UnfurlSection>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct SlackSection {
    bot_token: Option<String>,
    user_token: Option<String>,
    api_url: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct KeepaliveSection {
    ping_interval: Option<String>,
    liveness_timeout: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct UnfurlSection {
    pattern: Option<String>,
    footer: Option<String>,
    footer_icon: Option<String>,
}

impl BotConfig {
    /// Load configuration from file and process environment
    pub fn load_from_file<P: AsRef<Path>>(config_path: P) -> Result<Self> {
        Self::load_with_env(config_path, |key| std::env::var(key).ok())
    }

    /// Load configuration from file, reading overrides through `env`
    pub fn load_with_env<P, E>(config_path: P, env: E) -> Result<Self>
    where
        P: AsRef<Path>,
        E: Fn(&str) -> Option<String>,
    {
        let path = config_path.as_ref();
        let mut config = Self::default();

        match std::fs::read_to_string(path) {
            Ok(content) => {
                let file: FileConfig = serde_yaml::from_str(&content)
                    .with_context(|| format!("invalid config file {:?}", path))?;
                config.apply_file_config(file)?;
                info!("Loaded configuration from {:?}", path);
            }
            Err(_) => warn!("Config file {:?} not found, using defaults", path),
        }

        config.apply_environment_overrides(env);

        info!(
            "Final bot configuration: api={}, ping_interval={:?}, liveness_timeout={:?}, user_token={}",
            config.api_base_url,
            config.ping_interval,
            config.liveness_timeout,
            if config.user_token.is_some() { "set" } else { "unset" }
        );
        Ok(config)
    }

    fn apply_file_config(&mut self, file: FileConfig) -> Result<()> {
        if let Some(slack) = file.slack {
            if slack.bot_token.is_some() {
                self.bot_token = slack.bot_token;
            }
            if slack.user_token.is_some() {
                self.user_token = slack.user_token;
            }
            if let Some(url) = slack.api_url {
                self.api_base_url = url;
            }
        }

        if let Some(keepalive) = file.keepalive {
            if let Some(interval) = keepalive.ping_interval {
                self.ping_interval = parse_duration("keepalive.ping_interval", &interval)?;
            }
            if let Some(timeout) = keepalive.liveness_timeout {
                self.liveness_timeout = parse_duration("keepalive.liveness_timeout", &timeout)?;
            }
        }

        if let Some(unfurl) = file.unfurl {
            if let Some(pattern) = unfurl.pattern {
                self.unfurl.pattern = pattern;
            }
            if let Some(footer) = unfurl.footer {
                self.unfurl.footer = footer;
            }
            if let Some(icon) = unfurl.footer_icon {
                self.unfurl.footer_icon = icon;
            }
        }
        Ok(())
    }

    /// Apply environment variable overrides
    fn apply_environment_overrides<E>(&mut self, env: E)
    where
        E: Fn(&str) -> Option<String>,
    {
        if let Some(token) = env("SLACK_BOT_TOKEN") {
            self.bot_token = Some(token);
            info!("Bot token overridden by environment");
        }
        if let Some(token) = env("SLACK_USER_TOKEN") {
            self.user_token = Some(token);
            info!("User token overridden by environment");
        }
        // A legacy token acts as both
        if let Some(token) = env("SLACK_TOKEN") {
            if self.bot_token.is_none() {
                self.bot_token = Some(token.clone());
            }
            if self.user_token.is_none() {
                self.user_token = Some(token);
            }
        }
        if let Some(url) = env("SLACK_API_URL") {
            self.api_base_url = url;
            info!("API URL overridden by environment: {}", self.api_base_url);
        }
    }

    /// Apply command line overrides
    pub fn apply_cli_overrides(
        &mut self,
        ping_interval: Option<Duration>,
        liveness_timeout: Option<Duration>,
    ) {
        if let Some(interval) = ping_interval {
            self.ping_interval = interval;
        }
        if let Some(timeout) = liveness_timeout {
            self.liveness_timeout = timeout;
        }
    }

    /// The bot token, required to connect
    pub fn require_bot_token(&self) -> Result<&str> {
        match self.bot_token.as_deref() {
            Some(token) if !token.is_empty() => Ok(token),
            _ => bail!("no bot token configured (set SLACK_BOT_TOKEN or slack.bot_token)"),
        }
    }

    /// The user token, falling back to the bot token
    pub fn user_token_or_bot(&self) -> Result<&str> {
        match self.user_token.as_deref() {
            Some(token) if !token.is_empty() => Ok(token),
            _ => {
                warn!("No user token configured, using the bot token for user API calls");
                self.require_bot_token()
            }
        }
    }

    /// Session timing derived from this configuration
    pub fn session_config(&self) -> rtm_session::SessionConfig {
        rtm_session::SessionConfig {
            ping_interval: self.ping_interval,
            liveness_timeout: self.liveness_timeout,
        }
    }
}

fn parse_duration(key: &str, value: &str) -> Result<Duration> {
    humantime::parse_duration(value).with_context(|| format!("invalid {}: {:?}", key, value))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn no_env(_: &str) -> Option<String> {
        None
    }

    fn write_config(yaml: &str) -> NamedTempFile {
        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(yaml.as_bytes()).unwrap();
        temp_file
    }

    #[test]
    fn test_default_config() {
        let config = BotConfig::default();
        assert_eq!(config.api_base_url, "https://slack.com/api");
        assert_eq!(config.ping_interval, Duration::from_secs(1));
        assert_eq!(config.liveness_timeout, Duration::from_secs(5));
        assert_eq!(config.unfurl, UnfurlConfig::default());
        assert!(config.require_bot_token().is_err());
    }

    #[test]
    fn test_load_from_file() {
        let temp_file = write_config(
            r#"
slack:
  bot_token: xoxb-file
  api_url: http://localhost:9999/api
keepalive:
  ping_interval: 2s
  liveness_timeout: 10s
unfurl:
  pattern: "https?://docs.example.com/"
  footer: docs
"#,
        );

        let config = BotConfig::load_with_env(temp_file.path(), no_env).unwrap();
        assert_eq!(config.require_bot_token().unwrap(), "xoxb-file");
        assert_eq!(config.api_base_url, "http://localhost:9999/api");
        assert_eq!(config.ping_interval, Duration::from_secs(2));
        assert_eq!(config.liveness_timeout, Duration::from_secs(10));
        assert_eq!(config.unfurl.pattern, "https?://docs.example.com/");
        assert_eq!(config.unfurl.footer, "docs");
        assert_eq!(config.unfurl.footer_icon, UnfurlConfig::default().footer_icon);
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let config =
            BotConfig::load_with_env("/nonexistent/slack-rtm.yaml", no_env).unwrap();
        assert_eq!(config.ping_interval, Duration::from_secs(1));
        assert!(config.bot_token.is_none());
    }

    #[test]
    fn test_invalid_duration_is_an_error() {
        let temp_file = write_config("keepalive:\n  ping_interval: soon\n");
        let err = BotConfig::load_with_env(temp_file.path(), no_env).unwrap_err();
        assert!(err.to_string().contains("keepalive.ping_interval"));
    }

    #[test]
    fn test_environment_overrides() {
        let temp_file = write_config("slack:\n  bot_token: xoxb-file\n");
        let env: HashMap<&str, &str> = [
            ("SLACK_BOT_TOKEN", "xoxb-env"),
            ("SLACK_API_URL", "http://mock/api"),
        ]
        .into_iter()
        .collect();

        let config = BotConfig::load_with_env(temp_file.path(), |key| {
            env.get(key).map(|v| v.to_string())
        })
        .unwrap();
        assert_eq!(config.bot_token.as_deref(), Some("xoxb-env"));
        assert_eq!(config.api_base_url, "http://mock/api");
        assert!(config.user_token.is_none());
    }

    #[test]
    fn test_legacy_token_fills_both() {
        let config = BotConfig::load_with_env("/nonexistent/slack-rtm.yaml", |key| {
            (key == "SLACK_TOKEN").then(|| "xoxp-legacy".to_string())
        })
        .unwrap();
        assert_eq!(config.require_bot_token().unwrap(), "xoxp-legacy");
        assert_eq!(config.user_token_or_bot().unwrap(), "xoxp-legacy");
    }

    #[test]
    fn test_legacy_token_does_not_replace_explicit_tokens() {
        let env: HashMap<&str, &str> = [
            ("SLACK_BOT_TOKEN", "xoxb-bot"),
            ("SLACK_TOKEN", "xoxp-legacy"),
        ]
        .into_iter()
        .collect();
        let config = BotConfig::load_with_env("/nonexistent/slack-rtm.yaml", |key| {
            env.get(key).map(|v| v.to_string())
        })
        .unwrap();
        assert_eq!(config.bot_token.as_deref(), Some("xoxb-bot"));
        assert_eq!(config.user_token.as_deref(), Some("xoxp-legacy"));
    }

    #[test]
    fn test_cli_overrides_win() {
        let mut config = BotConfig::default();
        config.apply_cli_overrides(Some(Duration::from_millis(500)), None);
        assert_eq!(config.ping_interval, Duration::from_millis(500));
        assert_eq!(config.liveness_timeout, Duration::from_secs(5));

        let session = config.session_config();
        assert_eq!(session.ping_interval, Duration::from_millis(500));
    }
}
