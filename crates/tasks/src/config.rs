use std::time::Duration;

use crate::subscription::SubscriptionOptions;

/// Default interval between subscribe attempts while the connection opens.
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 100;

/// Client configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// HTTP base URL of the generation service, without a trailing slash.
    pub api_url: String,
    /// WebSocket URL of the task-update channel.
    pub ws_url: String,
    /// How often a pending subscribe request re-checks the connection state.
    pub poll_interval: Duration,
    /// Upper bound on waiting for a task's terminal frame. `None` waits
    /// until the task finishes or the connection drops.
    pub task_timeout: Option<Duration>,
    /// Timeout applied to each HTTP request. `None` leaves reqwest's default.
    pub request_timeout: Option<Duration>,
}

impl ClientConfig {
    /// Build a configuration with defaults for everything but the URLs.
    pub fn new(api_url: impl Into<String>, ws_url: impl Into<String>) -> Self {
        Self {
            api_url: api_url.into().trim_end_matches('/').to_string(),
            ws_url: ws_url.into(),
            poll_interval: Duration::from_millis(DEFAULT_POLL_INTERVAL_MS),
            task_timeout: None,
            request_timeout: None,
        }
    }

    /// Load configuration from environment variables.
    ///
    /// | Env Var                     | Default |
    /// |-----------------------------|---------|
    /// | `GAIA_BACK_END_URL`         | required |
    /// | `GAIA_WEBSOCKET_BASE_URL`   | required |
    /// | `GAIA_SUBSCRIBE_POLL_MS`    | `100`   |
    /// | `GAIA_TASK_TIMEOUT_SECS`    | unset   |
    /// | `GAIA_REQUEST_TIMEOUT_SECS` | unset   |
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let api_url = required(&lookup, "GAIA_BACK_END_URL")?;
        let ws_url = required(&lookup, "GAIA_WEBSOCKET_BASE_URL")?;

        let mut config = Self::new(api_url, ws_url);

        if let Some(ms) = optional_positive(&lookup, "GAIA_SUBSCRIBE_POLL_MS")? {
            config.poll_interval = Duration::from_millis(ms);
        }
        config.task_timeout =
            optional_positive(&lookup, "GAIA_TASK_TIMEOUT_SECS")?.map(Duration::from_secs);
        config.request_timeout =
            optional_positive(&lookup, "GAIA_REQUEST_TIMEOUT_SECS")?.map(Duration::from_secs);

        Ok(config)
    }

    /// Per-subscription settings derived from this configuration.
    pub fn subscription_options(&self) -> SubscriptionOptions {
        SubscriptionOptions {
            poll_interval: self.poll_interval,
            timeout: self.task_timeout,
        }
    }
}

fn required<F>(lookup: &F, var: &'static str) -> Result<String, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    lookup(var)
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .ok_or(ConfigError::Missing(var))
}

/// Parse an optional positive integer. Unset or blank means `None`; zero
/// is rejected.
fn optional_positive<F>(lookup: &F, var: &'static str) -> Result<Option<u64>, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(var).map(|v| v.trim().to_string()) {
        None => Ok(None),
        Some(v) if v.is_empty() => Ok(None),
        Some(v) => match v.parse::<u64>() {
            Ok(n) if n > 0 => Ok(Some(n)),
            _ => Err(ConfigError::Invalid { var, value: v }),
        },
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} environment variable is required")]
    Missing(&'static str),

    #[error("{var} must be a positive integer, got {value:?}")]
    Invalid { var: &'static str, value: String },
}
