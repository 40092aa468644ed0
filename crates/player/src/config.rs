//! Session configuration

use std::env;
use std::str::FromStr;
use std::time::Duration;

use url::Url;

use crate::error::SessionError;

const DEFAULT_GATEWAY_URL: &str = "ws://localhost:8005";
const DEFAULT_WS_PATH: &str = "/ws";
const DEFAULT_HEARTBEAT_MS: u64 = 25_000;
const DEFAULT_RECONNECT_MS: u64 = 2_000;
const DEFAULT_COMMAND_BUFFER: usize = 32;

/// Connection settings for one game session.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionConfig {
    /// Gateway base URL (`ws://` or `wss://`)
    pub gateway_url: String,
    /// Socket path appended to the gateway URL
    pub ws_path: String,
    /// Period between `C_Ping` frames while live
    pub heartbeat_interval: Duration,
    /// Fixed wait before each reconnect attempt
    pub reconnect_delay: Duration,
    /// Unanswered pings tolerated before the transport is treated as dead.
    /// `None` disables the check.
    pub max_missed_pongs: Option<u32>,
    /// Treat the first inbound message as the login confirmation
    pub confirm_on_first_message: bool,
    /// Capacity of the command channel into the session task
    pub command_buffer: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            gateway_url: DEFAULT_GATEWAY_URL.to_string(),
            ws_path: DEFAULT_WS_PATH.to_string(),
            heartbeat_interval: Duration::from_millis(DEFAULT_HEARTBEAT_MS),
            reconnect_delay: Duration::from_millis(DEFAULT_RECONNECT_MS),
            max_missed_pongs: None,
            confirm_on_first_message: false,
            command_buffer: DEFAULT_COMMAND_BUFFER,
        }
    }
}

impl SessionConfig {
    pub fn new(gateway_url: impl Into<String>) -> Self {
        Self {
            gateway_url: gateway_url.into(),
            ..Self::default()
        }
    }

    /// Load configuration from the process environment.
    ///
    /// A `.env` file in the working directory is read first, if present.
    /// Unset variables keep their defaults; unparseable ones are errors.
    pub fn from_env() -> Result<Self, SessionError> {
        if let Err(e) = dotenvy::dotenv() {
            if !e.not_found() {
                tracing::warn!(error = %e, "Failed to read .env file");
            }
        }
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build a configuration from an arbitrary variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, SessionError> {
        let mut config = Self::default();

        if let Some(url) = lookup("IDLEMMO_GATEWAY_URL") {
            config.gateway_url = url;
        }
        if let Some(path) = lookup("IDLEMMO_WS_PATH") {
            config.ws_path = path;
        }
        if let Some(ms) = parse_var::<u64>(&lookup, "IDLEMMO_HEARTBEAT_MS")? {
            config.heartbeat_interval = Duration::from_millis(ms);
        }
        if let Some(ms) = parse_var::<u64>(&lookup, "IDLEMMO_RECONNECT_MS")? {
            config.reconnect_delay = Duration::from_millis(ms);
        }
        if let Some(n) = parse_var::<u32>(&lookup, "IDLEMMO_MAX_MISSED_PONGS")? {
            config.max_missed_pongs = (n > 0).then_some(n);
        }
        if let Some(flag) = parse_var::<bool>(&lookup, "IDLEMMO_CONFIRM_ON_FIRST_MESSAGE")? {
            config.confirm_on_first_message = flag;
        }

        config.validate()?;
        Ok(config)
    }

    pub fn with_ws_path(mut self, path: impl Into<String>) -> Self {
        self.ws_path = path.into();
        self
    }

    pub fn with_heartbeat_interval(mut self, interval: Duration) -> Self {
        self.heartbeat_interval = interval;
        self
    }

    pub fn with_reconnect_delay(mut self, delay: Duration) -> Self {
        self.reconnect_delay = delay;
        self
    }

    pub fn with_max_missed_pongs(mut self, max: Option<u32>) -> Self {
        self.max_missed_pongs = max.filter(|n| *n > 0);
        self
    }

    pub fn with_confirm_on_first_message(mut self, enabled: bool) -> Self {
        self.confirm_on_first_message = enabled;
        self
    }

    pub fn with_command_buffer(mut self, capacity: usize) -> Self {
        self.command_buffer = capacity;
        self
    }

    /// Check that the session task can run with these settings.
    pub fn validate(&self) -> Result<(), SessionError> {
        self.base_url()?;
        if self.heartbeat_interval.is_zero() {
            return Err(SessionError::config("heartbeat interval must be non-zero"));
        }
        if self.command_buffer == 0 {
            return Err(SessionError::config("command buffer must be non-zero"));
        }
        Ok(())
    }

    /// The socket URL for `token`: `<gateway><ws_path>?token=<token>`.
    pub fn socket_url(&self, token: &str) -> Result<Url, SessionError> {
        let mut url = self.base_url()?;
        url.set_path(&self.ws_path);
        url.query_pairs_mut().clear().append_pair("token", token);
        Ok(url)
    }

    fn base_url(&self) -> Result<Url, SessionError> {
        let url = Url::parse(&self.gateway_url).map_err(|e| SessionError::InvalidGatewayUrl {
            url: self.gateway_url.clone(),
            reason: e.to_string(),
        })?;
        match url.scheme() {
            "ws" | "wss" => Ok(url),
            other => Err(SessionError::InvalidGatewayUrl {
                url: self.gateway_url.clone(),
                reason: format!("unsupported scheme '{other}', expected ws or wss"),
            }),
        }
    }
}

fn parse_var<T>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
) -> Result<Option<T>, SessionError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    let Some(raw) = lookup(key) else {
        return Ok(None);
    };
    raw.trim()
        .parse()
        .map(Some)
        .map_err(|e| SessionError::config(format!("{key}={raw:?}: {e}")))
}
