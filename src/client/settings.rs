//! Data client settings. Defaults match the console: 30 s timeout, two retries.

use std::time::Duration;

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);
pub const DEFAULT_MAX_RETRIES: u32 = 2;

#[derive(Clone, Debug)]
pub struct ClientSettings {
    /// API root, e.g. `https://audit.example.com/api/v1`.
    pub base_url: String,
    pub timeout: Duration,
    /// Extra attempts after the first failure, for retryable errors only.
    pub max_retries: u32,
    /// Delay before retry n is `retry_backoff * n`.
    pub retry_backoff: Duration,
    /// Delay between a successful mutation and the background refetch of affected lists.
    pub reconcile_delay: Duration,
    /// Maximum number of cached list payloads.
    pub cache_capacity: usize,
}

impl Default for ClientSettings {
    fn default() -> Self {
        ClientSettings {
            base_url: "http://localhost:5000/api/v1".into(),
            timeout: DEFAULT_TIMEOUT,
            max_retries: DEFAULT_MAX_RETRIES,
            retry_backoff: Duration::from_millis(500),
            reconcile_delay: Duration::from_millis(250),
            cache_capacity: 256,
        }
    }
}

impl ClientSettings {
    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        ClientSettings {
            base_url: base_url.into(),
            ..Self::default()
        }
    }

    /// Read `AUDIT_API_URL`, `AUDIT_API_TIMEOUT_SECS`, `AUDIT_API_MAX_RETRIES`, `AUDIT_CACHE_CAPACITY`.
    /// Missing or unparsable values keep their defaults.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let timeout = env_parse::<u64>("AUDIT_API_TIMEOUT_SECS")
            .map(Duration::from_secs)
            .unwrap_or(defaults.timeout);
        ClientSettings {
            base_url: std::env::var("AUDIT_API_URL").unwrap_or(defaults.base_url),
            timeout,
            max_retries: env_parse("AUDIT_API_MAX_RETRIES").unwrap_or(defaults.max_retries),
            cache_capacity: env_parse::<usize>("AUDIT_CACHE_CAPACITY")
                .filter(|c| *c > 0)
                .unwrap_or(defaults.cache_capacity),
            ..defaults
        }
    }

    /// Load `.env` (if present) and then read the environment.
    pub fn load() -> Self {
        dotenvy::dotenv().ok();
        Self::from_env()
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.trim().parse().ok())
}
