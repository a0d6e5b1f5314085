//! Worker configuration.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use clipq_store::mask_secret;

use crate::error::{WorkerError, WorkerResult};

/// Worker configuration.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Sleep between polls when no job is ready
    pub poll_interval: Duration,
    /// Sleep after a loop-level error
    pub error_backoff: Duration,
    /// Grace delay before exiting on a fatal setup error
    pub fatal_exit_delay: Duration,
    /// Parent directory of per-job scratch directories
    pub work_dir: PathBuf,
    /// Per-stage timeout for external processes
    pub stage_timeout: Option<Duration>,
    /// Age after which a `processing` job is considered abandoned; the sweep
    /// is disabled when unset
    pub stale_job_timeout: Option<Duration>,
    /// How often the stale sweep runs
    pub stale_sweep_interval: Duration,
    /// Prometheus scrape listener
    pub metrics_addr: Option<SocketAddr>,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(2000),
            error_backoff: Duration::from_millis(3000),
            fatal_exit_delay: Duration::from_secs(5),
            work_dir: std::env::temp_dir(),
            stage_timeout: None,
            stale_job_timeout: None,
            stale_sweep_interval: Duration::from_secs(60),
            metrics_addr: None,
        }
    }
}

impl WorkerConfig {
    /// Create config from environment variables.
    pub fn from_env() -> WorkerResult<Self> {
        let defaults = Self::default();

        let metrics_addr = match env_non_empty("METRICS_ADDR") {
            Some(raw) => Some(raw.parse().map_err(|e| {
                WorkerError::config(format!("METRICS_ADDR '{}' is not a socket address: {}", raw, e))
            })?),
            None => None,
        };

        Ok(Self {
            poll_interval: env_parse("WORKER_POLL_INTERVAL_MS")
                .map(Duration::from_millis)
                .unwrap_or(defaults.poll_interval),
            error_backoff: env_parse("WORKER_ERROR_BACKOFF_MS")
                .map(Duration::from_millis)
                .unwrap_or(defaults.error_backoff),
            fatal_exit_delay: env_parse("WORKER_FATAL_EXIT_DELAY_SECS")
                .map(Duration::from_secs)
                .unwrap_or(defaults.fatal_exit_delay),
            work_dir: env_non_empty("WORKER_WORK_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.work_dir),
            stage_timeout: env_parse("PIPELINE_STAGE_TIMEOUT_SECS")
                .filter(|secs| *secs > 0)
                .map(Duration::from_secs),
            stale_job_timeout: env_parse("STALE_JOB_TIMEOUT_SECS")
                .filter(|secs| *secs > 0)
                .map(Duration::from_secs),
            stale_sweep_interval: env_parse("STALE_SWEEP_INTERVAL_SECS")
                .filter(|secs| *secs > 0)
                .map(Duration::from_secs)
                .unwrap_or(defaults.stale_sweep_interval),
            metrics_addr,
        })
    }
}

/// What the startup environment check reports. Secrets are masked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnvCheck {
    pub store_url_present: bool,
    pub service_key: String,
    pub bucket: String,
}

impl EnvCheck {
    pub fn from_env() -> Self {
        Self {
            store_url_present: env_non_empty("SUPABASE_URL").is_some(),
            service_key: mask_secret(&env_non_empty("SUPABASE_SERVICE_ROLE_KEY").unwrap_or_default()),
            bucket: env_non_empty("BUCKET").unwrap_or_else(|| clipq_storage::DEFAULT_BUCKET.to_string()),
        }
    }

    /// `ok` or `MISSING`; the endpoint itself is never logged.
    pub fn store_url_status(&self) -> &'static str {
        if self.store_url_present {
            "ok"
        } else {
            "MISSING"
        }
    }
}

fn env_non_empty(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn env_parse(name: &str) -> Option<u64> {
    std::env::var(name).ok().and_then(|s| s.trim().parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    const VARS: &[&str] = &[
        "WORKER_POLL_INTERVAL_MS",
        "WORKER_ERROR_BACKOFF_MS",
        "WORKER_FATAL_EXIT_DELAY_SECS",
        "WORKER_WORK_DIR",
        "PIPELINE_STAGE_TIMEOUT_SECS",
        "STALE_JOB_TIMEOUT_SECS",
        "STALE_SWEEP_INTERVAL_SECS",
        "METRICS_ADDR",
        "SUPABASE_URL",
        "SUPABASE_SERVICE_ROLE_KEY",
        "BUCKET",
    ];

    fn clear_env() {
        for var in VARS {
            std::env::remove_var(var);
        }
    }

    #[test]
    #[serial]
    fn test_defaults() {
        clear_env();
        let config = WorkerConfig::from_env().unwrap();
        assert_eq!(config.poll_interval, Duration::from_secs(2));
        assert_eq!(config.error_backoff, Duration::from_secs(3));
        assert_eq!(config.fatal_exit_delay, Duration::from_secs(5));
        assert_eq!(config.work_dir, std::env::temp_dir());
        assert!(config.stage_timeout.is_none());
        assert!(config.stale_job_timeout.is_none());
        assert_eq!(config.stale_sweep_interval, Duration::from_secs(60));
        assert!(config.metrics_addr.is_none());
    }

    #[test]
    #[serial]
    fn test_overrides_and_bad_values() {
        clear_env();
        std::env::set_var("WORKER_POLL_INTERVAL_MS", "250");
        std::env::set_var("WORKER_ERROR_BACKOFF_MS", "soon");
        std::env::set_var("STALE_JOB_TIMEOUT_SECS", "900");
        std::env::set_var("PIPELINE_STAGE_TIMEOUT_SECS", "0");
        std::env::set_var("METRICS_ADDR", "0.0.0.0:9100");

        let config = WorkerConfig::from_env().unwrap();
        assert_eq!(config.poll_interval, Duration::from_millis(250));
        assert_eq!(config.error_backoff, Duration::from_secs(3));
        assert_eq!(config.stale_job_timeout, Some(Duration::from_secs(900)));
        assert!(config.stage_timeout.is_none());
        assert_eq!(config.metrics_addr, Some("0.0.0.0:9100".parse().unwrap()));
        clear_env();
    }

    #[test]
    #[serial]
    fn test_invalid_metrics_addr_is_config_error() {
        clear_env();
        std::env::set_var("METRICS_ADDR", "not-an-address");
        assert!(matches!(WorkerConfig::from_env(), Err(WorkerError::Config(_))));
        clear_env();
    }

    #[test]
    #[serial]
    fn test_env_check_masks_credential() {
        clear_env();
        std::env::set_var("SUPABASE_URL", "https://abc.supabase.co");
        std::env::set_var("SUPABASE_SERVICE_ROLE_KEY", "eyJhbGciOiJIUzI1NiJ9.payload.sig9");

        let check = EnvCheck::from_env();
        assert_eq!(check.store_url_status(), "ok");
        assert!(!format!("{:?}", check).contains("abc.supabase.co"));
        assert!(check.service_key.ends_with("sig9"));
        assert!(!check.service_key.contains("payload"));
        assert_eq!(check.bucket, "videos");
        clear_env();
    }

    #[test]
    #[serial]
    fn test_env_check_reports_missing() {
        clear_env();
        let check = EnvCheck::from_env();
        assert_eq!(check.store_url_status(), "MISSING");
        assert_eq!(check.service_key, "MISSING");
    }
}
