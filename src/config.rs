use anyhow::{Context, Result};
use confyg::{env, Confygery};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::error::ErrorKind;

/// Retry behavior for one call-site.
///
/// Process-wide defaults come from [`Config`]; individual call-sites may
/// override by passing their own `RetryConfig` to the retry engine.
/// Effective delays are always within `[0, max_delay_ms]`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Retries allowed after the first attempt. Zero means one attempt total.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// Delay before the first retry, in milliseconds.
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,
    /// Upper bound on any computed delay, in milliseconds.
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
    /// Exponential growth factor between attempts. Must be greater than 1.
    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: f64,
    /// Randomize each delay by up to ±25% to avoid synchronized retry storms.
    #[serde(default = "default_jitter")]
    pub jitter_enabled: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            base_delay_ms: default_base_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
            backoff_multiplier: default_backoff_multiplier(),
            jitter_enabled: default_jitter(),
        }
    }
}

impl RetryConfig {
    /// Base delay as a [`Duration`].
    #[must_use]
    pub fn base_delay(&self) -> Duration {
        Duration::from_millis(self.base_delay_ms)
    }

    /// Maximum delay as a [`Duration`].
    #[must_use]
    pub fn max_delay(&self) -> Duration {
        Duration::from_millis(self.max_delay_ms)
    }
}

fn default_max_retries() -> u32 {
    3
}
fn default_base_delay_ms() -> u64 {
    1_000
}
fn default_max_delay_ms() -> u64 {
    60_000
}
fn default_backoff_multiplier() -> f64 {
    2.0
}
fn default_jitter() -> bool {
    true
}

/// Thresholds at which the orchestrator sends alerts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationThresholds {
    /// Rolling per-source error-rate fraction (0.0–1.0) above which a
    /// high-error-rate alert is sent.
    #[serde(default = "default_error_rate")]
    pub error_rate: f64,
    /// Number of consecutive failures for one source that triggers an alert.
    #[serde(default = "default_consecutive_failures")]
    pub consecutive_failures: u32,
    /// Kinds that always trigger an immediate critical alert regardless
    /// of rates.
    #[serde(default = "default_critical_kinds")]
    pub critical_kinds: Vec<ErrorKind>,
}

impl Default for NotificationThresholds {
    fn default() -> Self {
        Self {
            error_rate: default_error_rate(),
            consecutive_failures: default_consecutive_failures(),
            critical_kinds: default_critical_kinds(),
        }
    }
}

impl NotificationThresholds {
    /// Whether the kind is configured as critical.
    #[must_use]
    pub fn is_critical(&self, kind: ErrorKind) -> bool {
        self.critical_kinds.contains(&kind)
    }
}

fn default_error_rate() -> f64 {
    0.5
}
fn default_consecutive_failures() -> u32 {
    5
}
fn default_critical_kinds() -> Vec<ErrorKind> {
    vec![
        ErrorKind::Authentication,
        ErrorKind::CaptchaOrBotDetection,
        ErrorKind::Storage,
    ]
}

/// Graceful-degradation switch for batch runs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DegradationConfig {
    /// When false, any elevated failure rate fails the whole batch.
    #[serde(default = "default_degradation_enabled")]
    pub enabled: bool,
}

impl Default for DegradationConfig {
    fn default() -> Self {
        Self {
            enabled: default_degradation_enabled(),
        }
    }
}

fn default_degradation_enabled() -> bool {
    true
}

/// Configuration for the resilience subsystem.
///
/// Configuration is loaded from multiple sources with the following priority:
/// 1. Per-call overrides (highest priority)
/// 2. Environment variables (GRANTSEEK_* prefix)
/// 3. Config file (~/.config/grantseek/resilience.toml)
/// 4. Built-in defaults (lowest priority)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Process-wide retry defaults.
    #[serde(default)]
    pub retry: RetryConfig,
    /// Alerting thresholds.
    #[serde(default)]
    pub thresholds: NotificationThresholds,
    /// Batch degradation policy.
    #[serde(default)]
    pub degradation: DegradationConfig,
}

impl Config {
    /// Load configuration from file and environment variables.
    ///
    /// Searches for a config file at: ~/.config/grantseek/resilience.toml
    /// Reads environment variables with the GRANTSEEK_ prefix.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file exists but cannot be parsed.
    pub fn load() -> Result<Self> {
        Self::load_from(&config_file_path())
    }

    /// Load configuration from a specific file path plus environment.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be parsed.
    pub fn load_from(config_path: &std::path::Path) -> Result<Self> {
        let mut builder = Confygery::new().context("Failed to create config builder")?;

        if config_path.exists() {
            let path_str = config_path
                .to_str()
                .ok_or_else(|| anyhow::anyhow!("Config path contains invalid UTF-8"))?;
            builder
                .add_file(path_str)
                .context("Failed to load config file")?;
        }

        let env_opts = env::Options::with_top_level("grantseek");
        builder
            .add_env(env_opts)
            .context("Failed to load environment variables")?;

        let config: Self = builder.build().context("Failed to build configuration")?;

        Ok(config)
    }
}

/// Get the config file path.
///
/// Returns:
/// - Linux: ~/.config/grantseek/resilience.toml
/// - macOS: ~/Library/Application Support/grantseek/resilience.toml
/// - Windows: %APPDATA%\grantseek\resilience.toml
pub fn config_file_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("grantseek")
        .join("resilience.toml")
}

/// Get the example config file content.
pub fn example_config() -> &'static str {
    r#"# Grantseek resilience configuration
#
# Configuration is loaded from multiple sources with the following priority:
# 1. Per-call overrides (highest priority)
# 2. Environment variables (GRANTSEEK_* prefix)
# 3. This config file
# 4. Built-in defaults (lowest priority)

[retry]
# Retries allowed after the first attempt (0 = one attempt, no retry)
max_retries = 3
# Delay before the first retry, in milliseconds
base_delay_ms = 1000
# Upper bound on any computed delay, in milliseconds
max_delay_ms = 60000
# Exponential growth factor between attempts
backoff_multiplier = 2.0
# Randomize delays by up to ±25% to avoid synchronized retry storms
jitter_enabled = true

[thresholds]
# Rolling per-source error-rate fraction that triggers an alert
error_rate = 0.5
# Consecutive failures for one source that trigger an alert
consecutive_failures = 5
# Kinds that always alert immediately
critical_kinds = ["authentication", "captcha-or-bot-detection", "storage"]

[degradation]
# Continue batches at reduced fidelity instead of failing them outright
enabled = true
"#
}

/// Create the default config file if it doesn't exist.
///
/// Returns true if a new file was created, false if it already existed.
///
/// # Errors
///
/// Returns an error if the directory or file cannot be written.
pub fn ensure_config_file() -> Result<bool> {
    let config_path = config_file_path();

    if config_path.exists() {
        return Ok(false);
    }

    if let Some(parent) = config_path.parent() {
        std::fs::create_dir_all(parent).context("Failed to create config directory")?;
    }

    std::fs::write(&config_path, example_config()).context("Failed to write config file")?;

    Ok(true)
}
