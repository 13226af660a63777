//! Configuration for the integrator.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Filesystem locations
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathsConfig {
    /// Root holding `race_ids/` schedules and `races/` output
    #[serde(default = "default_data_root")]
    pub data_root: PathBuf,
    /// Directory of per-race parser fragments
    #[serde(default = "default_json_dir")]
    pub json_dir: PathBuf,
    /// Accumulated horse profiles (`horses/{id}.json`)
    #[serde(default)]
    pub accumulated_dir: Option<PathBuf>,
    #[serde(default = "default_trainer_index_path")]
    pub trainer_index_path: PathBuf,
    #[serde(default = "default_trainer_csv_path")]
    pub trainer_csv_path: PathBuf,
    #[serde(default = "default_manual_mapping_path")]
    pub manual_mapping_path: PathBuf,
}

fn default_data_root() -> PathBuf {
    PathBuf::from("data")
}

fn default_json_dir() -> PathBuf {
    PathBuf::from("data/json")
}

fn default_trainer_index_path() -> PathBuf {
    PathBuf::from("data/trainer_id_index.json")
}

fn default_trainer_csv_path() -> PathBuf {
    PathBuf::from("data/trainers.csv")
}

fn default_manual_mapping_path() -> PathBuf {
    PathBuf::from("data/trainer_manual_mappings.json")
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            data_root: default_data_root(),
            json_dir: default_json_dir(),
            accumulated_dir: None,
            trainer_index_path: default_trainer_index_path(),
            trainer_csv_path: default_trainer_csv_path(),
            manual_mapping_path: default_manual_mapping_path(),
        }
    }
}

/// Batch integration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchConfig {
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
}

fn default_concurrency() -> usize {
    4
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            concurrency: default_concurrency(),
        }
    }
}

/// Trainer index building
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexConfig {
    /// How many of the newest integrated files to scan for observed trainers
    #[serde(default = "default_observed_file_limit")]
    pub observed_file_limit: usize,
}

fn default_observed_file_limit() -> usize {
    10
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            observed_file_limit: default_observed_file_limit(),
        }
    }
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8080
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

/// Application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub paths: PathsConfig,
    #[serde(default)]
    pub batch: BatchConfig,
    #[serde(default)]
    pub index: IndexConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

impl AppConfig {
    /// Load configuration from defaults, an optional `config.*` file and the environment
    pub fn load() -> anyhow::Result<Self> {
        let config = config::Config::builder()
            .add_source(config::Config::try_from(&AppConfig::default())?)
            .add_source(config::File::with_name("config").required(false))
            // KEIBA_PATHS__DATA_ROOT, KEIBA_BATCH__CONCURRENCY, ...
            .add_source(
                config::Environment::with_prefix("KEIBA")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        Ok(config.try_deserialize()?)
    }
}
