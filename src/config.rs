//! Process configuration.
//!
//! Both binaries read `PUSHBRIDGE_*` variables, after loading a `.env` file
//! when one is present. Command-line flags are applied on top by the
//! binaries themselves.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use crate::bridge::ReconnectPolicy;
use crate::bus::RemoteEvent;
use crate::game::DEFAULT_TITLE;

pub const DEFAULT_BIND: &str = "0.0.0.0:8080";
pub const DEFAULT_SERVER_URL: &str = "http://localhost:8080";
pub const DEFAULT_WORDS_PATH: &str = "./allwords.txt";
/// Streams are meant to stay open for days; the client only gives up on a
/// request after a week.
pub const DEFAULT_CLIENT_TIMEOUT: Duration = Duration::from_secs(60 * 60 * 24 * 7);

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid {key}={value:?}: {reason}")]
    Invalid {
        key: String,
        value: String,
        reason: String,
    },
}

impl ConfigError {
    fn invalid(key: &str, value: &str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            key: key.to_string(),
            value: value.to_string(),
            reason: reason.into(),
        }
    }
}

/// Load `.env` into the process environment if present.
pub fn load_dotenv() {
    match dotenvy::dotenv() {
        Ok(path) => tracing::debug!("loaded environment from {}", path.display()),
        Err(e) if e.not_found() => {}
        Err(e) => tracing::warn!("ignoring unreadable .env file: {e}"),
    }
}

fn env_lookup(key: &str) -> Option<String> {
    std::env::var(key).ok()
}

fn non_empty(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<String> {
    lookup(key)
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Longest timeout accepted from configuration: one year.
pub const MAX_TIMEOUT_SECS: f64 = 60.0 * 60.0 * 24.0 * 365.0;

/// Parse a positive number of seconds, at most [`MAX_TIMEOUT_SECS`];
/// fractions are allowed.
pub fn parse_secs(key: &str, value: &str) -> Result<Duration, ConfigError> {
    let secs: f64 = value
        .trim()
        .parse()
        .map_err(|e| ConfigError::invalid(key, value, format!("{e}")))?;
    if !secs.is_finite() || secs <= 0.0 {
        return Err(ConfigError::invalid(key, value, "must be a positive number of seconds"));
    }
    if secs > MAX_TIMEOUT_SECS {
        return Err(ConfigError::invalid(
            key,
            value,
            format!("must be at most {MAX_TIMEOUT_SECS} seconds"),
        ));
    }
    Duration::try_from_secs_f64(secs).map_err(|e| ConfigError::invalid(key, value, format!("{e}")))
}

// ---------------------------------------------------------------------------
// Server
// ---------------------------------------------------------------------------

/// Per-event retransmission timeouts. `None` waits for a trigger indefinitely.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RetransmitTimeouts {
    pub start: Option<Duration>,
    pub next_answer: Option<Duration>,
    pub shutdown: Option<Duration>,
}

impl RetransmitTimeouts {
    pub fn uniform(timeout: Option<Duration>) -> Self {
        Self {
            start: timeout,
            next_answer: timeout,
            shutdown: timeout,
        }
    }

    pub fn for_event(&self, event: RemoteEvent) -> Option<Duration> {
        match event {
            RemoteEvent::Start => self.start,
            RemoteEvent::NextAnswer => self.next_answer,
            RemoteEvent::Shutdown => self.shutdown,
        }
    }

    fn set(&mut self, event: RemoteEvent, timeout: Option<Duration>) {
        match event {
            RemoteEvent::Start => self.start = timeout,
            RemoteEvent::NextAnswer => self.next_answer = timeout,
            RemoteEvent::Shutdown => self.shutdown = timeout,
        }
    }
}

fn retransmit_key(event: RemoteEvent) -> &'static str {
    match event {
        RemoteEvent::Start => "PUSHBRIDGE_RETRANSMIT_START_SECS",
        RemoteEvent::NextAnswer => "PUSHBRIDGE_RETRANSMIT_NEXT_ANSWER_SECS",
        RemoteEvent::Shutdown => "PUSHBRIDGE_RETRANSMIT_SHUTDOWN_SECS",
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub bind: SocketAddr,
    pub retransmit: RetransmitTimeouts,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: DEFAULT_BIND.parse().expect("valid default bind address"),
            retransmit: RetransmitTimeouts::default(),
        }
    }
}

impl ServerConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        load_dotenv();
        Self::from_lookup(env_lookup)
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Some(bind) = non_empty(&lookup, "PUSHBRIDGE_BIND") {
            config.bind = bind
                .parse()
                .map_err(|e| ConfigError::invalid("PUSHBRIDGE_BIND", &bind, format!("{e}")))?;
        }

        if let Some(value) = non_empty(&lookup, "PUSHBRIDGE_RETRANSMIT_SECS") {
            let timeout = parse_secs("PUSHBRIDGE_RETRANSMIT_SECS", &value)?;
            config.retransmit = RetransmitTimeouts::uniform(Some(timeout));
        }

        for event in RemoteEvent::all() {
            let key = retransmit_key(*event);
            if let Some(value) = non_empty(&lookup, key) {
                config.retransmit.set(*event, Some(parse_secs(key, &value)?));
            }
        }

        Ok(config)
    }
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    pub server_url: String,
    /// Game name rendered as the screen title.
    pub title: String,
    pub words_path: PathBuf,
    /// Fixed shuffle seed, for reproducible games.
    pub seed: Option<u64>,
    pub request_timeout: Duration,
    pub reconnect: ReconnectPolicy,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            server_url: DEFAULT_SERVER_URL.to_string(),
            title: DEFAULT_TITLE.to_string(),
            words_path: PathBuf::from(DEFAULT_WORDS_PATH),
            seed: None,
            request_timeout: DEFAULT_CLIENT_TIMEOUT,
            reconnect: ReconnectPolicy::never(),
        }
    }
}

impl ClientConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        load_dotenv();
        Self::from_lookup(env_lookup)
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Some(url) = non_empty(&lookup, "PUSHBRIDGE_SERVER_URL") {
            if !url.starts_with("http://") && !url.starts_with("https://") {
                return Err(ConfigError::invalid(
                    "PUSHBRIDGE_SERVER_URL",
                    &url,
                    "expected an http(s) URL",
                ));
            }
            config.server_url = url.trim_end_matches('/').to_string();
        }

        if let Some(title) = non_empty(&lookup, "PUSHBRIDGE_TITLE") {
            config.title = title;
        }

        if let Some(path) = non_empty(&lookup, "PUSHBRIDGE_WORDS") {
            config.words_path = PathBuf::from(path);
        }

        if let Some(seed) = non_empty(&lookup, "PUSHBRIDGE_SEED") {
            config.seed = Some(
                seed.parse()
                    .map_err(|e| ConfigError::invalid("PUSHBRIDGE_SEED", &seed, format!("{e}")))?,
            );
        }

        if let Some(value) = non_empty(&lookup, "PUSHBRIDGE_CLIENT_TIMEOUT_SECS") {
            config.request_timeout = parse_secs("PUSHBRIDGE_CLIENT_TIMEOUT_SECS", &value)?;
        }

        if let Some(value) = non_empty(&lookup, "PUSHBRIDGE_RECONNECT_ATTEMPTS") {
            let attempts = value.parse().map_err(|e| {
                ConfigError::invalid("PUSHBRIDGE_RECONNECT_ATTEMPTS", &value, format!("{e}"))
            })?;
            config.reconnect = ReconnectPolicy::with_attempts(attempts);
        }

        Ok(config)
    }
}
