use std::path::PathBuf;
use std::time::Duration;

use powerbench_core::measurement::{ToolConfig, DEFAULT_TOOL_TIMEOUT};

/// Default retention window for job records: 5 hours.
pub const DEFAULT_JOB_RETENTION_SECS: u64 = 5 * 60 * 60;

/// Default interval between janitor sweeps: 10 minutes.
pub const DEFAULT_JANITOR_INTERVAL_SECS: u64 = 10 * 60;

/// Server configuration loaded from environment variables.
///
/// All fields have sensible defaults suitable for local development.
/// In production, override via environment variables.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address (default: `0.0.0.0`).
    pub host: String,
    /// Bind port (default: `3000`).
    pub port: u16,
    /// Allowed CORS origins, parsed from comma-separated `CORS_ORIGINS`.
    /// Empty allows any origin.
    pub cors_origins: Vec<String>,
    /// Hostname suffixes a target URL must match, parsed from
    /// comma-separated `ALLOWED_DOMAINS`. Empty disables the check.
    pub allowed_domains: Vec<String>,
    /// HTTP request timeout in seconds (default: `30`).
    pub request_timeout_secs: u64,
    /// Measurement tool invocation.
    pub tool: ToolConfig,
    /// Age after which a job record is purged, in seconds (default: 5 h).
    pub job_retention_secs: u64,
    /// Interval between janitor sweeps, in seconds (default: 10 min).
    pub janitor_interval_secs: u64,
}

impl ServerConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                 | Default                |
    /// |-------------------------|------------------------|
    /// | `HOST`                  | `0.0.0.0`              |
    /// | `PORT`                  | `3000`                 |
    /// | `CORS_ORIGINS`          | (any origin)           |
    /// | `ALLOWED_DOMAINS`       | (any domain)           |
    /// | `REQUEST_TIMEOUT_SECS`  | `30`                   |
    /// | `MEASURE_COMMAND`       | `npx browsertime`      |
    /// | `MEASURE_CONFIG_PATH`   | `power.json`           |
    /// | `RESULTS_ROOT`          | `browsertime-results`  |
    /// | `MEASURE_TIMEOUT_SECS`  | `120`                  |
    /// | `JOB_RETENTION_SECS`    | `18000`                |
    /// | `JANITOR_INTERVAL_SECS` | `600`                  |
    pub fn from_env() -> Self {
        let host = std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".into());

        let port: u16 = std::env::var("PORT")
            .unwrap_or_else(|_| "3000".into())
            .parse()
            .expect("PORT must be a valid u16");

        let cors_origins = list_var("CORS_ORIGINS");
        let allowed_domains = list_var("ALLOWED_DOMAINS");

        let request_timeout_secs = secs_var("REQUEST_TIMEOUT_SECS", 30);

        let command_line =
            std::env::var("MEASURE_COMMAND").unwrap_or_else(|_| "npx browsertime".into());
        let command = ToolConfig::parse_command(&command_line)
            .expect("MEASURE_COMMAND must be a valid command line");
        assert!(!command.is_empty(), "MEASURE_COMMAND must not be empty");

        let config_path = absolute(
            std::env::var("MEASURE_CONFIG_PATH").unwrap_or_else(|_| "power.json".into()),
        );
        let results_root = absolute(
            std::env::var("RESULTS_ROOT").unwrap_or_else(|_| "browsertime-results".into()),
        );

        let tool_timeout = Duration::from_secs(secs_var(
            "MEASURE_TIMEOUT_SECS",
            DEFAULT_TOOL_TIMEOUT.as_secs(),
        ));

        let job_retention_secs = secs_var("JOB_RETENTION_SECS", DEFAULT_JOB_RETENTION_SECS);
        let janitor_interval_secs =
            secs_var("JANITOR_INTERVAL_SECS", DEFAULT_JANITOR_INTERVAL_SECS);
        assert!(janitor_interval_secs > 0, "JANITOR_INTERVAL_SECS must be positive");

        Self {
            host,
            port,
            cors_origins,
            allowed_domains,
            request_timeout_secs,
            tool: ToolConfig {
                command,
                config_path,
                results_root,
                timeout: tool_timeout,
            },
            job_retention_secs,
            janitor_interval_secs,
        }
    }

    pub fn job_retention(&self) -> Duration {
        Duration::from_secs(self.job_retention_secs)
    }

    pub fn janitor_interval(&self) -> Duration {
        Duration::from_secs(self.janitor_interval_secs)
    }
}

/// Comma-separated list variable; blanks are dropped, unset means empty.
fn list_var(name: &str) -> Vec<String> {
    std::env::var(name)
        .unwrap_or_default()
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

fn secs_var(name: &str, default: u64) -> u64 {
    match std::env::var(name) {
        Ok(v) => v
            .parse()
            .unwrap_or_else(|_| panic!("{name} must be a valid u64")),
        Err(_) => default,
    }
}

/// Resolve relative paths against the working directory at startup, so the
/// tool sees the same file regardless of its own cwd.
fn absolute(path: String) -> PathBuf {
    let path = PathBuf::from(path);
    if path.is_absolute() {
        return path;
    }
    match std::env::current_dir() {
        Ok(cwd) => cwd.join(path),
        Err(_) => path,
    }
}
