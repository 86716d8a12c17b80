use std::time::Duration;

use anyhow::{anyhow, Result};

use super::workers::PollSettings;

pub const POLL_INTERVAL_VAR: &str = "CHATROOM_POLL_INTERVAL_MS";
pub const EVENT_SPACING_VAR: &str = "CHATROOM_EVENT_SPACING_MS";
pub const MAX_BUFFER_SIZE_VAR: &str = "CHATROOM_MAX_BUFFER_SIZE";
pub const HISTORY_LIMIT_VAR: &str = "CHATROOM_HISTORY_LIMIT";

const DEFAULT_POLL_INTERVAL_MS: u64 = 500;
const DEFAULT_EVENT_SPACING_MS: u64 = 0;
const DEFAULT_MAX_BUFFER_SIZE: usize = 30;
const DEFAULT_HISTORY_LIMIT: usize = 15;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    pub poll_interval: Duration,
    pub event_spacing: Duration,
    /// Newest events kept from one poll batch. Zero keeps everything.
    pub max_buffer_size: usize,
    /// Page size for `load_more`.
    pub history_limit: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        SessionConfig {
            poll_interval: Duration::from_millis(DEFAULT_POLL_INTERVAL_MS),
            event_spacing: Duration::from_millis(DEFAULT_EVENT_SPACING_MS),
            max_buffer_size: DEFAULT_MAX_BUFFER_SIZE,
            history_limit: DEFAULT_HISTORY_LIMIT,
        }
    }
}

pub fn getenv(name: &str) -> Option<String> {
    match std::env::var(name) {
        Ok(var) if !var.trim().is_empty() => Some(var),
        _ => None,
    }
}

impl SessionConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(getenv)
    }

    /// Builds a config from any name -> value lookup. Missing values fall
    /// back to the defaults, values that do not parse are an error.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let poll_interval_ms = read(&lookup, POLL_INTERVAL_VAR, DEFAULT_POLL_INTERVAL_MS)?;
        if poll_interval_ms == 0 {
            return Err(anyhow!("{POLL_INTERVAL_VAR} must be greater than zero"));
        }
        Ok(SessionConfig {
            poll_interval: Duration::from_millis(poll_interval_ms),
            event_spacing: Duration::from_millis(read(
                &lookup,
                EVENT_SPACING_VAR,
                DEFAULT_EVENT_SPACING_MS,
            )?),
            max_buffer_size: read(&lookup, MAX_BUFFER_SIZE_VAR, DEFAULT_MAX_BUFFER_SIZE)?,
            history_limit: read(&lookup, HISTORY_LIMIT_VAR, DEFAULT_HISTORY_LIMIT)?,
        })
    }

    pub fn poll_settings(&self) -> PollSettings {
        PollSettings {
            interval: self.poll_interval,
            event_spacing: self.event_spacing,
            max_buffer_size: self.max_buffer_size,
        }
    }
}

fn read<T>(lookup: &impl Fn(&str) -> Option<String>, name: &str, default: T) -> Result<T>
where
    T: std::str::FromStr + std::fmt::Display,
    T::Err: std::fmt::Display,
{
    match lookup(name) {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|e| anyhow!("Could not parse {name}={raw:?}: {e}")),
        None => {
            log::warn!("Could not find {name} environment variable. Falling back to {default}.");
            Ok(default)
        }
    }
}
