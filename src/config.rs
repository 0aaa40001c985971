//! Runtime configuration for the monitor
//!
//! Channel enablement and credentials are sourced from environment variables
//! at startup. Validation is strict: an enabled channel whose configuration
//! is missing refuses to start rather than running half-configured.

use std::env;
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    /// A channel is enabled but a required variable is absent or empty
    #[error("{channel} channel is enabled but {variable} is not set")]
    MissingVariable {
        channel: &'static str,
        variable: &'static str,
    },

    /// A variable is present but cannot be parsed
    #[error("invalid value for {variable}: {reason}")]
    InvalidValue {
        variable: &'static str,
        reason: String,
    },
}

pub type Result<T> = std::result::Result<T, ConfigError>;

/// Telegram channel settings
#[derive(Debug, Clone)]
pub struct TelegramSettings {
    /// Bot token, interpolated into the sendMessage path
    pub token: String,
    /// Recipient chat ids, one delivery call each
    pub chat_ids: Vec<String>,
}

impl TelegramSettings {
    /// Validate raw values as read from the environment
    pub fn from_parts(token: Option<String>, chat_ids: Option<String>) -> Result<Self> {
        let token = token
            .filter(|t| !t.is_empty())
            .ok_or(ConfigError::MissingVariable {
                channel: "telegram",
                variable: "TELEGRAM_BOT_TOKEN",
            })?;
        let chat_ids = split_list(chat_ids.as_deref().unwrap_or(""));
        if chat_ids.is_empty() {
            return Err(ConfigError::MissingVariable {
                channel: "telegram",
                variable: "TELEGRAM_CHAT_ID",
            });
        }
        Ok(Self { token, chat_ids })
    }
}

/// Mail channel settings (authenticated SMTP submission)
#[derive(Debug, Clone)]
pub struct MailSettings {
    pub relay_host: String,
    pub relay_port: u16,
    /// Sender address, also the PLAIN auth identity
    pub from: String,
    pub password: String,
    pub to: Vec<String>,
}

impl MailSettings {
    /// Validate raw values as read from the environment
    pub fn from_parts(
        relay_host: Option<String>,
        relay_port: Option<String>,
        from: Option<String>,
        password: Option<String>,
        to: Option<String>,
    ) -> Result<Self> {
        let relay_host = require("mail", "SMTP_HOST", relay_host)?;
        let relay_port = match relay_port.filter(|p| !p.is_empty()) {
            Some(raw) => raw.parse().map_err(|_| ConfigError::InvalidValue {
                variable: "SMTP_PORT",
                reason: format!("{raw:?} is not a port number"),
            })?,
            None => 587,
        };
        let from = require("mail", "SMTP_FROM", from)?;
        let password = require("mail", "SMTP_PASSWORD", password)?;
        let to = split_list(to.as_deref().unwrap_or(""));
        if to.is_empty() {
            return Err(ConfigError::MissingVariable {
                channel: "mail",
                variable: "SMTP_TO",
            });
        }
        Ok(Self {
            relay_host,
            relay_port,
            from,
            password,
            to,
        })
    }
}

/// Full monitor configuration
#[derive(Debug, Clone)]
pub struct MonitorConfig {
    /// Poll cadence of the watcher loop
    pub poll_interval: Duration,
    /// Explicit kubeconfig path; `None` means in-cluster first, then
    /// `$HOME/.kube/config`
    pub kubeconfig: Option<PathBuf>,
    /// Reproduce the reference halt-on-first-failure dispatch semantics
    pub fail_fast: bool,
    /// Echo channel identifier, printed with each delivery
    pub echo_identifier: Option<String>,
    /// Telegram settings, `Some` iff the channel is enabled
    pub telegram: Option<TelegramSettings>,
    /// Mail settings, `Some` iff the channel is enabled
    pub mail: Option<MailSettings>,
}

impl MonitorConfig {
    /// Read and validate configuration from the environment.
    ///
    /// Enable flags: `PODWATCH_ENABLE_ECHO` (default true),
    /// `PODWATCH_ENABLE_TELEGRAM`, `PODWATCH_ENABLE_MAIL` (default false).
    pub fn from_env() -> Result<Self> {
        let telegram = if env_flag("PODWATCH_ENABLE_TELEGRAM", false)? {
            Some(TelegramSettings::from_parts(
                env_var("TELEGRAM_BOT_TOKEN"),
                env_var("TELEGRAM_CHAT_ID"),
            )?)
        } else {
            None
        };

        let mail = if env_flag("PODWATCH_ENABLE_MAIL", false)? {
            Some(MailSettings::from_parts(
                env_var("SMTP_HOST"),
                env_var("SMTP_PORT"),
                env_var("SMTP_FROM"),
                env_var("SMTP_PASSWORD"),
                env_var("SMTP_TO"),
            )?)
        } else {
            None
        };

        let echo_identifier = if env_flag("PODWATCH_ENABLE_ECHO", true)? {
            Some(env_var("PODWATCH_ECHO_ID").unwrap_or_else(|| "terminal".to_string()))
        } else {
            None
        };

        let poll_interval = match env_var("PODWATCH_INTERVAL_SECS") {
            Some(raw) => Duration::from_secs(raw.parse().map_err(|_| {
                ConfigError::InvalidValue {
                    variable: "PODWATCH_INTERVAL_SECS",
                    reason: format!("{raw:?} is not a number of seconds"),
                }
            })?),
            None => Duration::from_secs(60),
        };

        Ok(Self {
            poll_interval,
            kubeconfig: env_var("KUBECONFIG").map(PathBuf::from),
            fail_fast: env_flag("PODWATCH_FAIL_FAST", false)?,
            echo_identifier,
            telegram,
            mail,
        })
    }
}

fn require(
    channel: &'static str,
    variable: &'static str,
    value: Option<String>,
) -> Result<String> {
    value
        .filter(|v| !v.is_empty())
        .ok_or(ConfigError::MissingVariable { channel, variable })
}

/// Split a comma-separated list, dropping empty entries
fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

fn env_var(name: &str) -> Option<String> {
    env::var(name).ok().filter(|v| !v.is_empty())
}

fn env_flag(name: &'static str, default: bool) -> Result<bool> {
    match env_var(name) {
        None => Ok(default),
        Some(raw) => match raw.to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Ok(true),
            "0" | "false" | "no" | "off" => Ok(false),
            _ => Err(ConfigError::InvalidValue {
                variable: name,
                reason: format!("{raw:?} is not a boolean"),
            }),
        },
    }
}
