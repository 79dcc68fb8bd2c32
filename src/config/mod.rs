//! Configuration management.
//!
//! Configuration is layered: built-in defaults, then an optional TOML file,
//! then environment variables prefixed with `SEKOLAH_EXPORT` (nested keys are
//! separated by `__`, e.g. `SEKOLAH_EXPORT_RATE_LIMIT__ENABLED=false`).
//!
//! # Configuration File Format
//!
//! ```toml
//! [api]
//! base_url = "https://sekolah.data.kemendikdasmen.go.id"
//! listing_timeout_secs = 60
//! detail_timeout_secs = 30
//!
//! [rate_limit]
//! enabled = true
//! min_delay_ms = 500
//! max_delay_ms = 1500
//! # requests_per_second = 4
//!
//! [retry]
//! max_attempts = 3
//! backoff_base_ms = 2000
//! jitter_min_ms = 500
//! jitter_max_ms = 1500
//!
//! [workers]
//! metadata = 2
//! detail = 4
//! max_metadata = 2
//! max_detail = 4
//!
//! [collection]
//! default_page_size = 1000
//! recovery_attempts = 3
//! recovery_backoff_ms = 1000
//!
//! [filter]
//! region = "Kota Bandung"
//! category = "KB,MAK,PAUDQ,RA,SPKTK,SPKPG,SPS,TK,TKLB,TPA"
//!
//! [logging]
//! level = "info"
//! format = "text"
//! ```

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::models::{ListingFilter, EARLY_CHILDHOOD_CATEGORIES};
use crate::utils::RetryConfig;

/// Production API host
pub const API_BASE: &str = "https://sekolah.data.kemendikdasmen.go.id";

/// Safe maximum of concurrent listing page requests
pub const SAFE_METADATA_WORKERS_MAX: usize = 2;

/// Safe maximum of concurrent detail requests
pub const SAFE_DETAIL_WORKERS_MAX: usize = 4;

/// Page size used when the total cannot be discovered up front
pub const DEFAULT_PAGE_SIZE: u32 = 1000;

const CONFIG_FILE_NAME: &str = "sekolah-export.toml";
const ENV_PREFIX: &str = "SEKOLAH_EXPORT";

/// Application configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub api: ApiConfig,

    #[serde(default)]
    pub rate_limit: RateLimitConfig,

    #[serde(default)]
    pub retry: RetryConfig,

    #[serde(default)]
    pub workers: WorkerConfig,

    #[serde(default)]
    pub collection: CollectionConfig,

    #[serde(default)]
    pub filter: FilterConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Backend endpoints and request settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Scheme and host of the directory API
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// User agent sent with every request
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Timeout for listing requests (large payloads)
    #[serde(default = "default_listing_timeout")]
    pub listing_timeout_secs: u64,

    /// Timeout for detail requests
    #[serde(default = "default_detail_timeout")]
    pub detail_timeout_secs: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            user_agent: default_user_agent(),
            listing_timeout_secs: default_listing_timeout(),
            detail_timeout_secs: default_detail_timeout(),
        }
    }
}

impl ApiConfig {
    pub fn listing_timeout(&self) -> Duration {
        Duration::from_secs(self.listing_timeout_secs)
    }

    pub fn detail_timeout(&self) -> Duration {
        Duration::from_secs(self.detail_timeout_secs)
    }
}

fn default_base_url() -> String {
    API_BASE.to_string()
}

fn default_user_agent() -> String {
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36".to_string()
}

fn default_listing_timeout() -> u64 {
    60
}

fn default_detail_timeout() -> u64 {
    30
}

/// Rate limiting configuration
///
/// Every request sleeps a random duration inside `[min_delay_ms, max_delay_ms]`
/// before each attempt. The aggregate rate therefore grows with the worker
/// count; `requests_per_second` adds an optional global ceiling on top.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RateLimitConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default = "default_min_delay")]
    pub min_delay_ms: u64,

    #[serde(default = "default_max_delay")]
    pub max_delay_ms: u64,

    /// Global ceiling shared by all workers (unset = none)
    #[serde(default)]
    pub requests_per_second: Option<u32>,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            min_delay_ms: default_min_delay(),
            max_delay_ms: default_max_delay(),
            requests_per_second: None,
        }
    }
}

impl RateLimitConfig {
    /// No pre-request delay and no global ceiling
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            requests_per_second: None,
            ..Default::default()
        }
    }

    /// Pre-request delay window, normalized so that `min <= max`
    pub fn delay_window(&self) -> (Duration, Duration) {
        let min = self.min_delay_ms.min(self.max_delay_ms);
        let max = self.min_delay_ms.max(self.max_delay_ms);
        (Duration::from_millis(min), Duration::from_millis(max))
    }
}

fn default_true() -> bool {
    true
}

fn default_min_delay() -> u64 {
    500
}

fn default_max_delay() -> u64 {
    1500
}

/// Worker pool sizes per phase
///
/// Requested counts are clamped into `1..=max`, never rejected.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkerConfig {
    #[serde(default = "default_metadata_workers")]
    pub metadata: usize,

    #[serde(default = "default_detail_workers")]
    pub detail: usize,

    #[serde(default = "default_metadata_workers")]
    pub max_metadata: usize,

    #[serde(default = "default_detail_workers")]
    pub max_detail: usize,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            metadata: SAFE_METADATA_WORKERS_MAX,
            detail: SAFE_DETAIL_WORKERS_MAX,
            max_metadata: SAFE_METADATA_WORKERS_MAX,
            max_detail: SAFE_DETAIL_WORKERS_MAX,
        }
    }
}

fn default_metadata_workers() -> usize {
    SAFE_METADATA_WORKERS_MAX
}

fn default_detail_workers() -> usize {
    SAFE_DETAIL_WORKERS_MAX
}

/// Paging and recovery settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollectionConfig {
    #[serde(default = "default_page_size")]
    pub default_page_size: u32,

    /// Sequential attempts per failed page after the concurrent pass
    #[serde(default = "default_recovery_attempts")]
    pub recovery_attempts: u32,

    /// Linear backoff unit between recovery attempts
    #[serde(default = "default_recovery_backoff")]
    pub recovery_backoff_ms: u64,
}

impl Default for CollectionConfig {
    fn default() -> Self {
        Self {
            default_page_size: DEFAULT_PAGE_SIZE,
            recovery_attempts: default_recovery_attempts(),
            recovery_backoff_ms: default_recovery_backoff(),
        }
    }
}

fn default_page_size() -> u32 {
    DEFAULT_PAGE_SIZE
}

fn default_recovery_attempts() -> u32 {
    3
}

fn default_recovery_backoff() -> u64 {
    1000
}

/// Listing filter defaults
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterConfig {
    #[serde(default)]
    pub keyword: String,

    #[serde(default)]
    pub region: String,

    #[serde(default = "default_category")]
    pub category: String,

    #[serde(default)]
    pub status: String,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            keyword: String::new(),
            region: String::new(),
            category: default_category(),
            status: String::new(),
        }
    }
}

impl FilterConfig {
    pub fn to_filter(&self) -> ListingFilter {
        ListingFilter::unfiltered()
            .keyword(self.keyword.trim())
            .region(self.region.trim())
            .category(self.category.trim())
            .status(self.status.trim())
    }
}

fn default_category() -> String {
    EARLY_CHILDHOOD_CATEGORIES.to_string()
}

/// Log output format
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    #[serde(default)]
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::Text,
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Configuration file errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Config error: {0}")]
    Load(#[from] config::ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialize error: {0}")]
    Serialize(#[from] toml::ser::Error),
}

impl Config {
    /// Save configuration to a TOML file
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let content = toml::to_string_pretty(self)?;
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, content)?;
        Ok(())
    }
}

/// Load configuration from a file, with environment overrides
pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    build(Some(path))
}

/// Load configuration from the first file found in the default locations, or
/// from defaults and the environment alone
pub fn get_config() -> Result<Config, ConfigError> {
    match find_config_file() {
        Some(path) => {
            tracing::debug!("Using config file: {}", path.display());
            build(Some(&path))
        }
        None => build(None),
    }
}

fn build(path: Option<&Path>) -> Result<Config, ConfigError> {
    let mut builder = config::Config::builder();
    if let Some(path) = path {
        builder = builder.add_source(config::File::from(path));
    }
    let settings = builder
        .add_source(
            config::Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        )
        .build()?;

    Ok(settings.try_deserialize()?)
}

/// Look for a configuration file in the working directory, then in the
/// platform config directory
pub fn find_config_file() -> Option<PathBuf> {
    let local = PathBuf::from(CONFIG_FILE_NAME);
    if local.is_file() {
        return Some(local);
    }

    default_config_path().filter(|path| path.is_file())
}

/// `<config_dir>/sekolah-export/config.toml`
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("sekolah-export").join("config.toml"))
}
