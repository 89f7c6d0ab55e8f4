/// Configuration for the GEOWAT toolkit.
///
/// Settings live in a TOML file (`geowat.toml` by default). Every section is
/// optional and falls back to defaults. Database secrets stay out of the
/// file: `DATABASE_URL` and `GEOWAT_DB_PASSWORD` are read from the
/// environment, after loading `.env` if one exists.

use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::logging::LogLevel;
use crate::weighting::{DegeneratePolicy, WeightingOptions, DEFAULT_ISOLATION_SENTINEL};

pub const DEFAULT_CONFIG_PATH: &str = "geowat.toml";
pub const ENV_DATABASE_URL: &str = "DATABASE_URL";
pub const ENV_DB_PASSWORD: &str = "GEOWAT_DB_PASSWORD";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

// ---------------------------------------------------------------------------
// Sections
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub database: DatabaseConfig,
    pub raster: RasterConfig,
    pub weighting: WeightingConfig,
    pub output: OutputConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DatabaseConfig {
    /// Full connection string; takes precedence over the fields below.
    pub url: Option<String>,
    pub host: String,
    pub port: u16,
    pub dbname: String,
    pub user: String,
    pub password: Option<String>,
    /// Schema holding `_gwh_yearly_tb` and `_lookup_tb`.
    pub schema: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: None,
            host: "localhost".to_string(),
            port: 5432,
            dbname: "geowat".to_string(),
            user: "postgres".to_string(),
            password: None,
            schema: "gerbil".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RasterConfig {
    /// GLiM classified GeoTIFF; lithology sampling is skipped when unset.
    pub lithology_path: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct WeightingConfig {
    pub isolation_sentinel: f64,
    pub degenerate_policy: DegeneratePolicy,
    /// Property holding the well id in GeoJSON input.
    pub id_field: String,
    /// Property holding the observation count in GeoJSON input.
    pub count_field: String,
}

impl Default for WeightingConfig {
    fn default() -> Self {
        Self {
            isolation_sentinel: DEFAULT_ISOLATION_SENTINEL,
            degenerate_policy: DegeneratePolicy::default(),
            id_field: "id_gerbil".to_string(),
            count_field: "n_years".to_string(),
        }
    }
}

impl WeightingConfig {
    pub fn options(&self) -> WeightingOptions {
        WeightingOptions {
            isolation_sentinel: self.isolation_sentinel,
            degenerate_policy: self.degenerate_policy,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct OutputConfig {
    pub directory: PathBuf,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            directory: PathBuf::from("output"),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LoggingConfig {
    pub level: LogLevel,
    pub file: Option<String>,
    pub timestamps: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: LogLevel::Info,
            file: None,
            timestamps: false,
        }
    }
}

// ---------------------------------------------------------------------------
// Loading
// ---------------------------------------------------------------------------

impl Config {
    /// Parses and validates a TOML document without touching the environment.
    pub fn from_toml_str(content: &str, path: &Path) -> Result<Self, ConfigError> {
        let config: Config = toml::from_str(content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Loads `.env`, reads the file if it exists, and applies environment
    /// overrides. A missing file at the default path means all defaults; a
    /// missing file the caller named explicitly is an error.
    pub fn load(path: &Path, explicit: bool) -> Result<Self, ConfigError> {
        dotenv::dotenv().ok();

        let mut config = if path.exists() || explicit {
            let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
                path: path.to_path_buf(),
                source,
            })?;
            Self::from_toml_str(&content, path)?
        } else {
            Config::default()
        };

        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Overrides secrets with values from `lookup` (normally the process
    /// environment).
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup(ENV_DATABASE_URL).filter(|v| !v.is_empty()) {
            self.database.url = Some(url);
        }
        if let Some(password) = lookup(ENV_DB_PASSWORD).filter(|v| !v.is_empty()) {
            self.database.password = Some(password);
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let sentinel = self.weighting.isolation_sentinel;
        if !sentinel.is_finite() || sentinel <= 0.0 {
            return Err(ConfigError::Invalid(format!(
                "weighting.isolation_sentinel must be a finite positive number, got {}",
                sentinel
            )));
        }
        if self.weighting.id_field.is_empty() || self.weighting.count_field.is_empty() {
            return Err(ConfigError::Invalid(
                "weighting.id_field and weighting.count_field must not be empty".to_string(),
            ));
        }
        crate::db::validate_identifier(&self.database.schema)
            .map_err(|e| ConfigError::Invalid(e.to_string()))?;
        Ok(())
    }
}
