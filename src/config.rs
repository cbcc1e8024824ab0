//! Fixed configuration for caching, rate limiting and the external sources.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::error::{MetricsError, Result};
use crate::sources::Strategy;
use crate::types::MetricKind;

pub const DEFAULT_UPTIMEROBOT_URL: &str = "https://api.uptimerobot.com/v2/getMonitors";
pub const DEFAULT_PAGESPEED_URL: &str =
    "https://www.googleapis.com/pagespeedonline/v5/runPagespeed";

/// Upper bound for cache TTLs and the refresh window.
pub const MAX_RETENTION: Duration = Duration::from_secs(365 * 24 * 60 * 60);

/// Upper bound for source request timeouts.
pub const MAX_SOURCE_TIMEOUT: Duration = Duration::from_secs(10 * 60);

/// Configuration for the metrics subsystem.
#[derive(Debug, Clone)]
pub struct MetricsConfig {
    /// SQLite database holding websites, cache rows and the refresh log
    pub database_path: PathBuf,
    /// Cache validity for uptime snapshots
    pub uptime_ttl: Duration,
    /// Cache validity for performance snapshots
    pub performance_ttl: Duration,
    /// Accepted explicit refreshes per website per window
    pub refresh_limit: u32,
    /// Sliding window length for the refresh limit
    pub refresh_window: Duration,
    /// Request budget for the uptime source
    pub uptime_timeout: Duration,
    /// Request budget for the performance source (markedly slower)
    pub performance_timeout: Duration,
    /// How long a store operation waits on a locked database
    pub storage_busy_timeout: Duration,
    pub uptimerobot_api_key: Option<String>,
    pub uptimerobot_url: String,
    pub pagespeed_url: String,
    pub performance_strategy: Strategy,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            database_path: PathBuf::from("./var/data/portal.db"),
            uptime_ttl: Duration::from_secs(5 * 60),
            performance_ttl: Duration::from_secs(60 * 60),
            refresh_limit: 5,
            refresh_window: Duration::from_secs(60 * 60),
            uptime_timeout: Duration::from_secs(30),
            performance_timeout: Duration::from_secs(60),
            storage_busy_timeout: Duration::from_millis(5000),
            uptimerobot_api_key: None,
            uptimerobot_url: DEFAULT_UPTIMEROBOT_URL.to_string(),
            pagespeed_url: DEFAULT_PAGESPEED_URL.to_string(),
            performance_strategy: Strategy::Mobile,
        }
    }
}

impl MetricsConfig {
    /// Build configuration from process environment variables.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build configuration from an arbitrary key lookup, starting from defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(path) = lookup("PORTAL_DATABASE_PATH") {
            config.database_path = PathBuf::from(path);
        }
        if let Some(secs) = parse_var::<u64, _>(&lookup, "METRICS_CACHE_DURATION_UPTIME")? {
            config.uptime_ttl = Duration::from_secs(secs);
        }
        if let Some(secs) = parse_var::<u64, _>(&lookup, "METRICS_CACHE_DURATION_PERFORMANCE")? {
            config.performance_ttl = Duration::from_secs(secs);
        }
        if let Some(limit) = parse_var::<u32, _>(&lookup, "REFRESH_RATE_LIMIT")? {
            config.refresh_limit = limit;
        }
        if let Some(secs) = parse_var::<u64, _>(&lookup, "REFRESH_WINDOW_SECS")? {
            config.refresh_window = Duration::from_secs(secs);
        }
        if let Some(secs) = parse_var::<u64, _>(&lookup, "UPTIME_TIMEOUT_SECS")? {
            config.uptime_timeout = Duration::from_secs(secs);
        }
        if let Some(secs) = parse_var::<u64, _>(&lookup, "PERFORMANCE_TIMEOUT_SECS")? {
            config.performance_timeout = Duration::from_secs(secs);
        }
        if let Some(ms) = parse_var::<u64, _>(&lookup, "STORAGE_BUSY_TIMEOUT_MS")? {
            config.storage_busy_timeout = Duration::from_millis(ms);
        }
        if let Some(key) = lookup("UPTIMEROBOT_API_KEY").filter(|k| !k.is_empty()) {
            config.uptimerobot_api_key = Some(key);
        }
        if let Some(url) = lookup("UPTIMEROBOT_API_URL") {
            config.uptimerobot_url = url;
        }
        if let Some(url) = lookup("PAGESPEED_API_URL") {
            config.pagespeed_url = url;
        }
        if let Some(strategy) = lookup("PAGESPEED_STRATEGY") {
            config.performance_strategy = strategy.parse().map_err(MetricsError::Config)?;
        }

        config.validate()?;
        Ok(config)
    }

    /// Reject values that would make caching or rate limiting meaningless, or
    /// push timestamp arithmetic out of range.
    pub fn validate(&self) -> Result<()> {
        if self.uptime_ttl.is_zero() || self.performance_ttl.is_zero() {
            return Err(MetricsError::Config("cache TTLs must be non-zero".into()));
        }
        if self.refresh_window.is_zero() {
            return Err(MetricsError::Config("refresh window must be non-zero".into()));
        }
        if self.uptime_timeout.is_zero() || self.performance_timeout.is_zero() {
            return Err(MetricsError::Config("source timeouts must be non-zero".into()));
        }
        if self.uptime_ttl > MAX_RETENTION || self.performance_ttl > MAX_RETENTION {
            return Err(MetricsError::Config(format!(
                "cache TTLs must not exceed {} seconds",
                MAX_RETENTION.as_secs()
            )));
        }
        if self.refresh_window > MAX_RETENTION {
            return Err(MetricsError::Config(format!(
                "refresh window must not exceed {} seconds",
                MAX_RETENTION.as_secs()
            )));
        }
        if self.uptime_timeout > MAX_SOURCE_TIMEOUT || self.performance_timeout > MAX_SOURCE_TIMEOUT
        {
            return Err(MetricsError::Config(format!(
                "source timeouts must not exceed {} seconds",
                MAX_SOURCE_TIMEOUT.as_secs()
            )));
        }
        Ok(())
    }

    /// Cache TTL for a metric kind.
    pub fn ttl_for(&self, kind: MetricKind) -> chrono::Duration {
        let ttl = match kind {
            MetricKind::Uptime => self.uptime_ttl,
            MetricKind::Performance => self.performance_ttl,
        };
        to_chrono(ttl)
    }

    pub fn window(&self) -> chrono::Duration {
        to_chrono(self.refresh_window)
    }
}

fn to_chrono(d: Duration) -> chrono::Duration {
    chrono::Duration::milliseconds(d.as_millis().min(i64::MAX as u128) as i64)
}

fn parse_var<T, F>(lookup: &F, key: &str) -> Result<Option<T>>
where
    T: FromStr,
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|_| MetricsError::Config(format!("{} is not a valid number: {:?}", key, raw))),
    }
}
