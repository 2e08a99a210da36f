use figment::{
    providers::{Env, Format, Serialized, Yaml},
    Figment,
};
use serde::{Deserialize, Deserializer, Serialize};

use crate::export::GCS_BASE_URL;

/// Application configuration loaded from multiple sources.
///
/// Configuration is loaded in priority order (lowest to highest):
/// 1. Struct defaults
/// 2. config.yaml file (if exists)
/// 3. Environment variables with CAMARA_ prefix (always wins)
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub expenses: ExpensesConfig,
    #[serde(default)]
    pub export: ExportConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ApiConfig {
    /// Base URL of the open-data API.
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Items requested per page (`itens`). The API caps it at 100.
    #[serde(default = "default_page_size")]
    pub page_size: u32,

    /// Per-request timeout in seconds.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Attempts per request at the transport layer, the first one included.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Base of the exponential backoff, in milliseconds.
    #[serde(default = "default_backoff_factor_ms")]
    pub backoff_factor_ms: u64,

    /// Cap on a single backoff sleep, in seconds.
    #[serde(default = "default_backoff_max_secs")]
    pub backoff_max_secs: u64,

    /// Extra attempts a caller makes after the transport gives up on a timeout.
    #[serde(default = "default_timeout_retries")]
    pub timeout_retries: u32,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ExpensesConfig {
    /// Years sent as `ano` filters.
    /// Accepts an array, a single year, or a comma-separated string.
    /// Example: `[2023, 2024]` or `"2023,2024"`
    #[serde(default = "default_years", deserialize_with = "deserialize_years")]
    pub years: Vec<i32>,

    /// Sort direction (`ordem`): "asc" or "desc".
    #[serde(default = "default_order")]
    pub order: String,

    /// Sort field (`ordenarPor`).
    #[serde(default = "default_order_by")]
    pub order_by: String,
}

/// Where snapshots are persisted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SinkKind {
    /// `<local_dir>/<container>/<file>` on disk.
    #[default]
    Local,
    /// Google Cloud Storage bucket named by `container`.
    Gcs,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ExportConfig {
    /// Logical container (bucket) the snapshot is uploaded to.
    #[serde(default = "default_container")]
    pub container: String,

    /// File name prefix; the date and `.csv` are appended.
    #[serde(default = "default_file_prefix")]
    pub file_prefix: String,

    #[serde(default)]
    pub sink: SinkKind,

    /// Root directory of the local sink.
    #[serde(default = "default_local_dir")]
    pub local_dir: String,

    /// Optional directory receiving a copy of the CSV before upload.
    #[serde(default)]
    pub local_copy_dir: Option<String>,

    #[serde(default)]
    pub gcs: GcsConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct GcsConfig {
    /// Cloud Storage endpoint.
    #[serde(default = "default_gcs_base_url")]
    pub base_url: String,

    /// OAuth access token (required when `export.sink` is `gcs`).
    /// Set via `CAMARA_EXPORT__GCS__ACCESS_TOKEN`.
    #[serde(default)]
    pub access_token: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    /// Log filter directive (debug, info, warn, error, or a full `EnvFilter` spec).
    #[serde(default = "default_log_level")]
    pub level: String,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum YearsInput {
    One(i32),
    Many(Vec<i32>),
    Text(String),
}

/// Deserialize years from an array, a single number, or a comma-separated string.
fn deserialize_years<'de, D>(deserializer: D) -> Result<Vec<i32>, D::Error>
where
    D: Deserializer<'de>,
{
    match YearsInput::deserialize(deserializer)? {
        YearsInput::One(year) => Ok(vec![year]),
        YearsInput::Many(years) => Ok(years),
        YearsInput::Text(text) => text
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|s| {
                s.parse::<i32>()
                    .map_err(|_| serde::de::Error::custom(format!("invalid year '{s}'")))
            })
            .collect(),
    }
}

fn default_base_url() -> String {
    "https://dadosabertos.camara.leg.br/api/v2".to_string()
}

// These functions cannot be const because serde uses function pointers for defaults
#[allow(clippy::missing_const_for_fn)]
fn default_page_size() -> u32 {
    100
}

#[allow(clippy::missing_const_for_fn)]
fn default_request_timeout_secs() -> u64 {
    10
}

#[allow(clippy::missing_const_for_fn)]
fn default_max_attempts() -> u32 {
    5
}

#[allow(clippy::missing_const_for_fn)]
fn default_backoff_factor_ms() -> u64 {
    1_000
}

#[allow(clippy::missing_const_for_fn)]
fn default_backoff_max_secs() -> u64 {
    120
}

#[allow(clippy::missing_const_for_fn)]
fn default_timeout_retries() -> u32 {
    3
}

fn default_years() -> Vec<i32> {
    vec![2024]
}

fn default_order() -> String {
    "desc".to_string()
}

fn default_order_by() -> String {
    "dataDocumento".to_string()
}

fn default_container() -> String {
    "camara_deputados".to_string()
}

fn default_file_prefix() -> String {
    "despesas_deputados".to_string()
}

fn default_local_dir() -> String {
    "snapshots".to_string()
}

fn default_gcs_base_url() -> String {
    GCS_BASE_URL.to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            page_size: default_page_size(),
            request_timeout_secs: default_request_timeout_secs(),
            max_attempts: default_max_attempts(),
            backoff_factor_ms: default_backoff_factor_ms(),
            backoff_max_secs: default_backoff_max_secs(),
            timeout_retries: default_timeout_retries(),
        }
    }
}

impl Default for ExpensesConfig {
    fn default() -> Self {
        Self {
            years: default_years(),
            order: default_order(),
            order_by: default_order_by(),
        }
    }
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            container: default_container(),
            file_prefix: default_file_prefix(),
            sink: SinkKind::default(),
            local_dir: default_local_dir(),
            local_copy_dir: None,
            gcs: GcsConfig::default(),
        }
    }
}

impl Default for GcsConfig {
    fn default() -> Self {
        Self {
            base_url: default_gcs_base_url(),
            access_token: String::new(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

/// Configuration loading and validation errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Configuration error: {0}")]
    Figment(#[from] Box<figment::Error>),

    #[error("Validation error: {0}")]
    Validation(String),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

impl Config {
    /// Load configuration from all sources.
    ///
    /// Sources are merged in priority order:
    /// 1. Struct defaults (lowest)
    /// 2. config.yaml file (if exists)
    /// 3. Environment variables with CAMARA_ prefix (highest)
    ///
    /// # Errors
    /// Returns an error if configuration cannot be loaded or is invalid.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from("config.yaml")
    }

    /// Load configuration with a custom YAML file path.
    ///
    /// # Errors
    /// Returns an error if configuration cannot be loaded or is invalid.
    pub fn load_from(yaml_path: &str) -> Result<Self, ConfigError> {
        let config: Self = Figment::new()
            .merge(Serialized::defaults(Self::default()))
            .merge(Yaml::file(yaml_path))
            .merge(Env::prefixed("CAMARA_").split("__"))
            .extract()?;

        config.validate()?;
        Ok(config)
    }

    /// Validate configuration values.
    ///
    /// # Errors
    /// Returns an error if any configuration value is invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let base_url = &self.api.base_url;
        if !base_url.starts_with("http://") && !base_url.starts_with("https://") {
            return Err(ConfigError::Validation(format!(
                "api.base_url must start with http:// or https://, got: '{base_url}'"
            )));
        }

        // The API rejects pages larger than 100 items
        if !(1..=100).contains(&self.api.page_size) {
            return Err(ConfigError::Validation(format!(
                "api.page_size must be between 1 and 100, got: {}",
                self.api.page_size
            )));
        }

        if self.api.max_attempts == 0 {
            return Err(ConfigError::Validation(
                "api.max_attempts cannot be 0".into(),
            ));
        }

        if self.api.request_timeout_secs == 0 {
            return Err(ConfigError::Validation(
                "api.request_timeout_secs cannot be 0".into(),
            ));
        }

        if self.expenses.years.is_empty() {
            return Err(ConfigError::Validation(
                "expenses.years must list at least one year".into(),
            ));
        }

        let order = self.expenses.order.to_lowercase();
        if order != "asc" && order != "desc" {
            return Err(ConfigError::Validation(format!(
                "expenses.order must be 'asc' or 'desc', got: '{}'",
                self.expenses.order
            )));
        }

        if self.export.container.is_empty() {
            return Err(ConfigError::Validation(
                "export.container cannot be empty".into(),
            ));
        }

        if self.export.file_prefix.is_empty() {
            return Err(ConfigError::Validation(
                "export.file_prefix cannot be empty".into(),
            ));
        }

        if self.export.sink == SinkKind::Gcs && self.export.gcs.access_token.is_empty() {
            return Err(ConfigError::Validation(
                "export.gcs.access_token is required for the gcs sink. Set CAMARA_EXPORT__GCS__ACCESS_TOKEN environment variable or configure in config.yaml.".into(),
            ));
        }

        Ok(())
    }
}
