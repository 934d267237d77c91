//! Configuration module for environment variable parsing.
//!
//! Every setting has a default so the relay can start with nothing but the
//! secret parameter present.

use std::env;
use std::path::PathBuf;
use std::time::Duration;

use tracing::warn;

/// Default name of the secret parameter holding the Xero credential bundle.
pub const DEFAULT_SECRET_PARAM: &str = "XERO_PARAMS";

/// Which replay protection the dispatcher runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplayMode {
    /// Every authenticated batch is processed.
    None,
    /// Batches whose `entropy` was seen recently are acknowledged and skipped.
    Entropy,
}

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Port for the web server to listen on
    pub port: u16,

    /// Name of the secret parameter holding the webhook key and access token
    pub secret_param: String,

    /// Optional JSON file used instead of the environment secret store
    pub secret_file: Option<PathBuf>,

    /// How long a loaded credential bundle is reused
    pub credential_ttl_secs: u64,

    /// Minimum age of the cached bundle before a signature mismatch may
    /// trigger a reload
    pub credential_min_refresh_secs: u64,

    /// Per-attempt timeout for upstream resource fetches
    pub fetch_timeout_ms: u64,

    /// Total attempts per fetch, including the first
    pub fetch_max_attempts: u32,

    /// Backoff range in milliseconds between fetch attempts (base, cap)
    pub fetch_backoff_ms: (u64, u64),

    /// Maximum number of resource fetches in flight for one batch
    pub fetch_concurrency: usize,

    /// Deadline for the processing stage of a single webhook call
    pub dispatch_deadline_ms: u64,

    pub replay_mode: ReplayMode,

    /// Number of recent entropy values remembered by the replay guard
    pub replay_window: usize,

    /// RabbitMQ connection URL; relaying is log-only when unset
    pub cloudamqp_url: Option<String>,

    /// Diagnostic correlation id attached to request logs
    pub run_id: Option<String>,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        Config {
            port: parse_or("PORT", 8080),

            secret_param: env::var("SSM_PARAM_XERO")
                .ok()
                .filter(|v| !v.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_SECRET_PARAM.to_string()),

            secret_file: env::var("XERO_SECRET_FILE")
                .ok()
                .filter(|v| !v.trim().is_empty())
                .map(PathBuf::from),

            credential_ttl_secs: parse_or("CREDENTIAL_TTL_SECS", 300),

            credential_min_refresh_secs: parse_or("CREDENTIAL_MIN_REFRESH_SECS", 30),

            fetch_timeout_ms: parse_or("FETCH_TIMEOUT_MS", 5000),

            fetch_max_attempts: parse_or::<u32>("FETCH_MAX_ATTEMPTS", 3).max(1),

            fetch_backoff_ms: parse_range("FETCH_BACKOFF_RANGE_MS", (200, 2000)),

            fetch_concurrency: parse_or::<usize>("FETCH_CONCURRENCY", 4).max(1),

            dispatch_deadline_ms: parse_or("DISPATCH_DEADLINE_MS", 25_000),

            replay_mode: parse_replay_mode("REPLAY_GUARD"),

            replay_window: parse_or("REPLAY_WINDOW_SIZE", 1024),

            cloudamqp_url: env::var("CLOUDAMQP_URL")
                .ok()
                .filter(|v| !v.trim().is_empty()),

            run_id: env::var("RUN_ID").ok().filter(|v| !v.trim().is_empty()),
        }
    }

    pub fn credential_ttl(&self) -> Duration {
        Duration::from_secs(self.credential_ttl_secs)
    }

    pub fn credential_min_refresh(&self) -> Duration {
        Duration::from_secs(self.credential_min_refresh_secs)
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_millis(self.fetch_timeout_ms)
    }

    pub fn dispatch_deadline(&self) -> Duration {
        Duration::from_millis(self.dispatch_deadline_ms)
    }
}

/// Parse a numeric variable, warning and falling back when it is malformed.
fn parse_or<T: std::str::FromStr>(name: &str, default: T) -> T {
    match env::var(name) {
        Ok(raw) => match raw.trim().parse() {
            Ok(v) => v,
            Err(_) => {
                warn!(env_var = name, value = %raw, "Invalid value, using default");
                default
            }
        },
        Err(_) => default,
    }
}

/// Parse a comma-separated range like "200,2000" into a tuple.
fn parse_range(name: &str, default: (u64, u64)) -> (u64, u64) {
    let raw = match env::var(name) {
        Ok(v) => v,
        Err(_) => return default,
    };

    let parts: Vec<&str> = raw.split(',').collect();
    if parts.len() != 2 {
        warn!(env_var = name, value = %raw, "Invalid range format, using default");
        return default;
    }

    let min = parts[0].trim().parse::<u64>();
    let max = parts[1].trim().parse::<u64>();

    match (min, max) {
        (Ok(min), Ok(max)) if min <= max => (min, max),
        _ => {
            warn!(env_var = name, value = %raw, "Invalid range values, using default");
            default
        }
    }
}

fn parse_replay_mode(name: &str) -> ReplayMode {
    let raw = match env::var(name) {
        Ok(v) => v,
        Err(_) => return ReplayMode::None,
    };

    match raw.trim().to_ascii_lowercase().as_str() {
        "" | "none" | "off" => ReplayMode::None,
        "entropy" => ReplayMode::Entropy,
        _ => {
            warn!(env_var = name, value = %raw, "Unknown replay guard, disabling");
            ReplayMode::None
        }
    }
}
