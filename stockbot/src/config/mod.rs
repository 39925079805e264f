//! Bot configuration.
//!
//! Values come from a TOML file (explicit `--config`, `./stockbot.toml`, or
//! `<config dir>/stockbot/config.toml`) and are then overridden by `STOCKBOT_*`
//! environment variables, with `.env` loaded first by the binary.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::commands::CommandRegistry;
use crate::monitor::retry::RetryPolicy;
use crate::{Error, Result};

/// Environment variable prefix for overrides.
pub const ENV_PREFIX: &str = "STOCKBOT_";

/// File name looked up in the working directory.
pub const LOCAL_CONFIG_FILE: &str = "stockbot.toml";

const REDACTED: &str = "<redacted>";

/// Longest accepted poll interval or request timeout, in seconds (one week).
pub const MAX_PERIOD_SECS: u64 = 7 * 24 * 60 * 60;

/// Longest accepted single retry delay, in milliseconds (one hour).
pub const MAX_RETRY_DELAY_MS: u64 = 60 * 60 * 1000;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Discord bot token.
    pub bot_token: String,
    /// The bot's own user id; its messages are ignored.
    pub bot_id: String,
    /// Channel the bot talks in and listens to.
    pub channel: String,
    /// Fast poll interval in seconds.
    pub interval: u64,
    /// Slow poll interval in seconds, used while stocked or queued.
    pub recheck_interval: u64,
    /// Stock level status that means "not available".
    pub block_status: String,
    /// Product code looked up in the product list API.
    pub product: String,
    pub product_url: String,
    pub product_list_url: String,
    /// Mention prepended to go-time announcements (e.g. `@here`).
    pub notify: String,
    /// Synthesize stock/queue flips from the check counter.
    pub debug_mode: bool,
    /// Giphy API key; empty disables GIF decorations.
    pub giphy_key: String,
    /// Probability that an unrecognised message triggers an interjection.
    pub echo_chance: f64,
    /// Interjection moods and their weights. `echo` repeats the message as speech,
    /// anything else is used as a GIF search term.
    pub moods: BTreeMap<String, f64>,
    /// Extra themed announcement commands.
    pub commands: Vec<CustomCommand>,
    /// Console/file log filter directive; `RUST_LOG` wins when set.
    pub log_level: Option<String>,
    /// Mirror application log lines into the chat channel.
    pub forward_logs: bool,
    /// Minimum level of mirrored log lines.
    pub chat_log_level: String,
    /// Directory for daily rolling log files; unset logs to the console only.
    pub log_dir: Option<PathBuf>,
    /// Timeout for every outbound HTTP request, in seconds.
    pub request_timeout: u64,
    pub check_retry: RetryConfig,
    pub connect_retry: RetryConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            bot_token: String::new(),
            bot_id: String::new(),
            channel: String::new(),
            interval: 30,
            recheck_interval: 300,
            block_status: "outOfStock".to_string(),
            product: "3005816".to_string(),
            product_url: storefront::client::DEFAULT_PRODUCT_URL.to_string(),
            product_list_url: storefront::client::DEFAULT_PRODUCT_LIST_URL.to_string(),
            notify: "@here".to_string(),
            debug_mode: false,
            giphy_key: String::new(),
            echo_chance: 0.1,
            moods: BTreeMap::from([("echo".to_string(), 1.0)]),
            commands: Vec::new(),
            log_level: None,
            forward_logs: true,
            chat_log_level: "info".to_string(),
            log_dir: None,
            request_timeout: 30,
            check_retry: RetryConfig::default(),
            connect_retry: RetryConfig {
                max_elapsed_secs: 900,
                ..RetryConfig::default()
            },
        }
    }
}

/// A themed announcement registered from configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomCommand {
    /// Trigger, matched exactly (e.g. `!party`).
    pub name: String,
    #[serde(default)]
    pub help: String,
    /// Plain text reply.
    #[serde(default)]
    pub text: Option<String>,
    /// Reply read aloud by Discord text-to-speech.
    #[serde(default)]
    pub tts: Option<String>,
    /// GIF search term.
    #[serde(default)]
    pub gif: Option<String>,
}

/// Exponential backoff settings as written in the config file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    pub initial_delay_ms: u64,
    pub multiplier: f64,
    pub max_delay_ms: u64,
    /// Give up once this much time has passed since the first attempt; 0 never gives up.
    pub max_elapsed_secs: u64,
    /// Give up after this many attempts; unset means unlimited.
    pub max_attempts: Option<u32>,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            initial_delay_ms: 500,
            multiplier: 1.5,
            max_delay_ms: 60_000,
            max_elapsed_secs: 300,
            max_attempts: None,
        }
    }
}

impl RetryConfig {
    pub fn policy(&self) -> RetryPolicy {
        RetryPolicy {
            initial_delay: Duration::from_millis(self.initial_delay_ms),
            multiplier: self.multiplier,
            max_delay: Duration::from_millis(self.max_delay_ms),
            max_elapsed: (self.max_elapsed_secs > 0)
                .then(|| Duration::from_secs(self.max_elapsed_secs)),
            max_attempts: self.max_attempts,
        }
    }

    fn validate(&self, name: &str) -> Result<()> {
        if self.initial_delay_ms == 0 {
            return Err(Error::config(format!("{name}.initial_delay_ms must be positive")));
        }
        if !self.multiplier.is_finite() || self.multiplier < 1.0 {
            return Err(Error::config(format!("{name}.multiplier must be at least 1.0")));
        }
        if self.max_delay_ms < self.initial_delay_ms {
            return Err(Error::config(format!(
                "{name}.max_delay_ms must not be smaller than initial_delay_ms"
            )));
        }
        if self.max_delay_ms > MAX_RETRY_DELAY_MS {
            return Err(Error::config(format!(
                "{name}.max_delay_ms must not exceed {MAX_RETRY_DELAY_MS}"
            )));
        }
        if self.max_attempts == Some(0) {
            return Err(Error::config(format!("{name}.max_attempts must be positive")));
        }
        Ok(())
    }
}

impl AppConfig {
    /// Load, apply environment overrides and validate.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match Self::resolve_path(path)? {
            Some(path) => {
                debug!(path = %path.display(), "loading config file");
                Self::from_file(&path)?
            }
            None => Self::default(),
        };
        config.apply_env(std::env::vars())?;
        config.validate()?;
        Ok(config)
    }

    fn resolve_path(explicit: Option<&Path>) -> Result<Option<PathBuf>> {
        if let Some(path) = explicit {
            if !path.is_file() {
                return Err(Error::config(format!(
                    "config file not found: {}",
                    path.display()
                )));
            }
            return Ok(Some(path.to_path_buf()));
        }

        let local = PathBuf::from(LOCAL_CONFIG_FILE);
        if local.is_file() {
            return Ok(Some(local));
        }

        Ok(dirs::config_dir()
            .map(|dir| dir.join("stockbot").join("config.toml"))
            .filter(|path| path.is_file()))
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| Error::config(format!("invalid config: {e}")))
    }

    /// Override fields from `STOCKBOT_*` variables.
    pub fn apply_env<I>(&mut self, vars: I) -> Result<()>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        for (key, value) in vars {
            let Some(name) = key.strip_prefix(ENV_PREFIX) else {
                continue;
            };
            match name {
                "BOT_TOKEN" => self.bot_token = value,
                "BOT_ID" => self.bot_id = value,
                "CHANNEL" => self.channel = value,
                "INTERVAL" => self.interval = parse_env(&key, &value)?,
                "RECHECK_INTERVAL" => self.recheck_interval = parse_env(&key, &value)?,
                "BLOCK_STATUS" => self.block_status = value,
                "PRODUCT" => self.product = value,
                "PRODUCT_URL" => self.product_url = value,
                "PRODUCT_LIST_URL" => self.product_list_url = value,
                "NOTIFY" => self.notify = value,
                "DEBUG_MODE" => self.debug_mode = parse_env(&key, &value)?,
                "GIPHY_KEY" => self.giphy_key = value,
                "ECHO_CHANCE" => self.echo_chance = parse_env(&key, &value)?,
                "LOG_LEVEL" => self.log_level = Some(value),
                "FORWARD_LOGS" => self.forward_logs = parse_env(&key, &value)?,
                "CHAT_LOG_LEVEL" => self.chat_log_level = value,
                "LOG_DIR" => self.log_dir = Some(PathBuf::from(value)),
                "REQUEST_TIMEOUT" => self.request_timeout = parse_env(&key, &value)?,
                // Read by the CLI parser.
                "CONFIG" => {}
                _ => debug!(key = %key, "ignoring unknown environment override"),
            }
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.bot_token.trim().is_empty() {
            return Err(Error::config("bot_token is required"));
        }
        if self.channel.trim().is_empty() {
            return Err(Error::config("channel is required"));
        }
        if self.interval == 0 || self.recheck_interval == 0 {
            return Err(Error::config("interval and recheck_interval must be positive"));
        }
        if self.interval.max(self.recheck_interval).max(self.request_timeout) > MAX_PERIOD_SECS {
            return Err(Error::config(format!(
                "interval, recheck_interval and request_timeout must not exceed {MAX_PERIOD_SECS}s"
            )));
        }
        if self.product.trim().is_empty() {
            return Err(Error::config("product is required"));
        }
        if !(0.0..=1.0).contains(&self.echo_chance) {
            return Err(Error::config("echo_chance must be between 0 and 1"));
        }
        if self.moods.values().any(|w| !w.is_finite() || *w <= 0.0) {
            return Err(Error::config("mood weights must be positive"));
        }
        if self.commands.iter().any(|c| !c.name.starts_with('!')) {
            return Err(Error::config("custom command names must start with '!'"));
        }
        CommandRegistry::with_custom(&self.commands)?;
        if self
            .chat_log_level
            .parse::<tracing::Level>()
            .is_err()
        {
            return Err(Error::config(format!(
                "chat_log_level is not a log level: {}",
                self.chat_log_level
            )));
        }
        self.check_retry.validate("check_retry")?;
        self.connect_retry.validate("connect_retry")?;
        Ok(())
    }

    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval)
    }

    pub fn recheck_interval(&self) -> Duration {
        Duration::from_secs(self.recheck_interval)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout)
    }

    pub fn endpoints(&self) -> storefront::Endpoints {
        storefront::Endpoints {
            product_url: self.product_url.clone(),
            product_list_url: self.product_list_url.clone(),
        }
    }

    /// Pretty TOML with secrets blanked out.
    pub fn show(&self) -> Result<String> {
        let mut redacted = self.clone();
        if !redacted.bot_token.is_empty() {
            redacted.bot_token = REDACTED.to_string();
        }
        if !redacted.giphy_key.is_empty() {
            redacted.giphy_key = REDACTED.to_string();
        }
        toml::to_string_pretty(&redacted)
            .map_err(|e| Error::config(format!("failed to render config: {e}")))
    }
}

fn parse_env<T>(key: &str, value: &str) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    value
        .trim()
        .parse()
        .map_err(|e| Error::config(format!("{key}: {e}")))
}
