use serde::Deserialize;

use crate::core::load::sqlite::is_valid_identifier;
use crate::core::tmdb::MovieList;

impl Config {

    pub fn init() -> Result<Self, config::ConfigError> {
        // get config toml dir from env, with default
        let config_path =
            std::env::var("REELPIPE_CONFIG_PATH").unwrap_or_else(|_| String::from("./config.toml"));

        let config = Self::builder()?
            // Add in config toml (optional: defaults and env are enough to run)
            .add_source(config::File::with_name(&config_path).required(false))
            // Add in settings from the environment (with a prefix of REELPIPE)
            .add_source(config::Environment::with_prefix("REELPIPE").separator("__"))
            // Plain variable names used by the first version of the pipeline
            .set_override_option("tmdb.api_key", env_opt("TMDB_API_KEY"))?
            .set_override_option("tmdb.read_token", env_opt("TMDB_READ_TOKEN"))?
            .set_override_option("tmdb.pages", env_opt("NUM_PAGES"))?
            .set_override_option("output.parquet", env_opt("DF_FINAL"))?
            .set_override_option("database.path", env_opt("DB_PATH"))?
            .set_override_option("database.table", env_opt("TABLE_NAME"))?
            .build()?;

        let config: Self = config.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    fn builder() -> Result<config::ConfigBuilder<config::builder::DefaultState>, config::ConfigError> {
        config::Config::builder()
            .set_default("logs.level", "info")?
            .set_default("logs.enable_reqwest_logging", false)?
            .set_default("tmdb.base_url", "https://api.themoviedb.org/3")?
            .set_default("tmdb.language", "pt-BR")?
            .set_default("tmdb.list", "popular")?
            .set_default("tmdb.pages", 1)?
            .set_default("tmdb.timeout_secs", 30)?
            .set_default("output.parquet", "filmes_tmdb_transformados.parquet")?
            .set_default("database.path", "movies.db")?
            .set_default("database.table", "movies")
    }

    fn validate(&self) -> Result<(), config::ConfigError> {
        if self.tmdb.pages == 0 {
            return Err(config::ConfigError::Message(
                "tmdb.pages must be at least 1".to_string(),
            ));
        }
        if self.tmdb.api_key.is_none() && self.tmdb.read_token.is_none() {
            return Err(config::ConfigError::Message(
                "either tmdb.api_key (TMDB_API_KEY) or tmdb.read_token (TMDB_READ_TOKEN) must be set"
                    .to_string(),
            ));
        }
        if !is_valid_identifier(&self.database.table) {
            return Err(config::ConfigError::Message(format!(
                "database.table (TABLE_NAME) must be a plain SQL identifier, got '{}'",
                self.database.table
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
impl Config {
    /// Defaults plus an inline TOML document, without touching the process environment.
    pub(crate) fn from_toml(toml: &str) -> Result<Self, config::ConfigError> {
        let config: Self = Self::builder()?
            .add_source(config::File::from_str(toml, config::FileFormat::Toml))
            .build()?
            .try_deserialize()?;
        config.validate()?;
        Ok(config)
    }
}

fn env_opt(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

// ================================================================================================
// Models
// ================================================================================================

#[derive(Debug, Clone, Deserialize)]
#[allow(unused)]
pub struct Config {
    pub logs: LogsConfig,
    pub tmdb: TmdbConfig,
    pub output: OutputConfig,
    pub database: DatabaseConfig,
    #[serde(default)]
    pub quality: QualityConfig,
}

// ===============================================================================
// Logs
// ===============================================================================

#[derive(Debug, Clone, Deserialize)]
#[allow(unused)]
pub struct LogsConfig {
    pub level: String,
    pub enable_reqwest_logging: bool,
}

// ===============================================================================
// TMDB
// ===============================================================================

#[derive(Debug, Clone, Deserialize)]
pub struct TmdbConfig {
    pub base_url: String,
    /// v3 API key, sent as the `api_key` query parameter.
    #[serde(default)]
    pub api_key: Option<String>,
    /// v4 read access token, sent as a bearer token. Preferred over `api_key` when both are set.
    #[serde(default)]
    pub read_token: Option<String>,
    pub language: String,
    pub list: MovieList,
    /// Number of list pages to fetch. Each page holds about 20 movies.
    pub pages: u32,
    pub timeout_secs: u64,
    #[serde(default)]
    pub retry: RetryConfig,
    #[serde(default)]
    pub pacing: PacingConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RetryConfig {
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_initial_backoff_ms")]
    pub initial_backoff_ms: u64,
    #[serde(default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            initial_backoff_ms: default_initial_backoff_ms(),
            max_backoff_ms: default_max_backoff_ms(),
        }
    }
}

fn default_max_retries() -> u32 { 5 }
fn default_initial_backoff_ms() -> u64 { 1000 }
fn default_max_backoff_ms() -> u64 { 30_000 }

/// Pauses between requests to stay under the TMDB rate limit.
#[derive(Debug, Clone, Deserialize)]
pub struct PacingConfig {
    #[serde(default = "default_page_delay_ms")]
    pub page_delay_ms: u64,
    #[serde(default = "default_detail_delay_ms")]
    pub detail_delay_ms: u64,
}

impl Default for PacingConfig {
    fn default() -> Self {
        Self {
            page_delay_ms: default_page_delay_ms(),
            detail_delay_ms: default_detail_delay_ms(),
        }
    }
}

fn default_page_delay_ms() -> u64 { 250 }
fn default_detail_delay_ms() -> u64 { 500 }

// ===============================================================================
// Output
// ===============================================================================

#[derive(Debug, Clone, Deserialize)]
pub struct OutputConfig {
    /// Snapshot of the transformed dataset.
    pub parquet: String,
    /// Optional snapshot of the raw dataset, written before any cleaning.
    #[serde(default)]
    pub raw_parquet: Option<String>,
}

// ===============================================================================
// Database
// ===============================================================================

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub path: String,
    pub table: String,
}

// ===============================================================================
// Quality
// ===============================================================================

#[derive(Debug, Clone, Deserialize)]
pub struct QualityConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
}

impl Default for QualityConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

fn default_true() -> bool { true }
