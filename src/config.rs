//! Broker server and coordinator configuration.

use crate::error::{EmberlogError, Result};
use std::time::Duration;

/// Default member session timeout.
pub const DEFAULT_SESSION_TIMEOUT: Duration = Duration::from_secs(30);

/// Group coordinator settings.
#[derive(Clone, Debug)]
pub struct CoordinatorConfig {
    /// Session timeout for members that do not ask for one.
    pub session_timeout: Duration,
    /// Smallest per-member session timeout accepted on JoinGroup.
    pub min_session_timeout: Duration,
    /// Largest per-member session timeout accepted on JoinGroup.
    pub max_session_timeout: Duration,
    /// Period of the liveness sweep.
    pub sweep_interval: Duration,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            session_timeout: DEFAULT_SESSION_TIMEOUT,
            min_session_timeout: Duration::from_secs(3),
            max_session_timeout: Duration::from_secs(300),
            // a third of the minimum session timeout
            sweep_interval: Duration::from_secs(1),
        }
    }
}

impl CoordinatorConfig {
    pub fn validate(&self) -> Result<()> {
        if self.sweep_interval.is_zero() {
            return Err(EmberlogError::InvalidArgument(
                "sweep interval must be positive".into(),
            ));
        }
        if self.min_session_timeout > self.max_session_timeout {
            return Err(EmberlogError::InvalidArgument(format!(
                "min session timeout {:?} exceeds max {:?}",
                self.min_session_timeout, self.max_session_timeout
            )));
        }
        if self.session_timeout < self.min_session_timeout
            || self.session_timeout > self.max_session_timeout
        {
            return Err(EmberlogError::InvalidArgument(format!(
                "default session timeout {:?} outside [{:?}, {:?}]",
                self.session_timeout, self.min_session_timeout, self.max_session_timeout
            )));
        }
        Ok(())
    }
}

/// Settings for the broker binary.
#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub addr: String,
    pub coordinator: CoordinatorConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            addr: "0.0.0.0:9092".to_string(),
            coordinator: CoordinatorConfig::default(),
        }
    }
}

impl ServerConfig {
    /// Build from `EMBERLOG_*` environment variables, falling back to defaults.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup (the environment in production).
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();
        if let Some(addr) = lookup("EMBERLOG_ADDR") {
            config.addr = addr;
        }
        let c = &mut config.coordinator;
        if let Some(d) = millis(&lookup, "EMBERLOG_SESSION_TIMEOUT_MS")? {
            c.session_timeout = d;
        }
        if let Some(d) = millis(&lookup, "EMBERLOG_MIN_SESSION_TIMEOUT_MS")? {
            c.min_session_timeout = d;
        }
        if let Some(d) = millis(&lookup, "EMBERLOG_MAX_SESSION_TIMEOUT_MS")? {
            c.max_session_timeout = d;
        }
        if let Some(d) = millis(&lookup, "EMBERLOG_SWEEP_INTERVAL_MS")? {
            c.sweep_interval = d;
        }
        config.coordinator.validate()?;
        Ok(config)
    }
}

fn millis<F>(lookup: &F, key: &str) -> Result<Option<Duration>>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse::<u64>()
            .map(|ms| Some(Duration::from_millis(ms)))
            .map_err(|e| EmberlogError::InvalidArgument(format!("{}={:?}: {}", key, raw, e))),
    }
}
