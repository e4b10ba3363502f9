//! Configuration System
//!
//! Provides hierarchical configuration loading from:
//! - config.toml (default configuration)
//! - config.local.toml (git-ignored local overrides)
//! - Environment variables (DSQUERY_* prefix)
//!
//! ## Example
//!
//! ```toml
//! # config.toml
//! [evaluation]
//! default_mode = "full_precision"
//! worker_threads = 4
//!
//! [cache]
//! capacity = 256
//! ```
//!
//! Environment variable overrides:
//! ```bash
//! DSQUERY_CACHE__CAPACITY=256
//! DSQUERY_EVALUATION__ENABLE_PREFILTERING=false
//! ```

use crate::indices::EvaluationMode;
use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Top-level configuration, loaded once at engine construction and
/// shared read-only (`Arc<Config>`) for the life of the process.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub indices: IndexPaths,
    #[serde(default)]
    pub evaluation: EvaluationConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Paths to the real index backends. Construction of those backends
/// from these paths is out of scope here — the reference in-memory
/// indices ignore this struct entirely — but it is carried so a real
/// deployment's config file has somewhere to put them.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IndexPaths {
    #[serde(default)]
    pub keyword_dir: Option<PathBuf>,
    #[serde(default)]
    pub percentile_rebinning_file: Option<PathBuf>,
    #[serde(default)]
    pub percentile_conversion_file: Option<PathBuf>,
    #[serde(default)]
    pub percentile_raw_histograms_file: Option<PathBuf>,
    #[serde(default)]
    pub name_index_file: Option<PathBuf>,
}

/// Evaluator selection and tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluationConfig {
    #[serde(default = "default_mode")]
    pub default_mode: EvaluationMode,

    /// Worker pool size for the threaded variants; 0 = number of
    /// hardware threads.
    #[serde(default)]
    pub worker_threads: usize,

    #[serde(default = "default_true")]
    pub enable_prefiltering: bool,

    #[serde(default = "default_true")]
    pub enable_cost_sorting: bool,

    /// Whether to dispatch predicate leaves to the worker pool at all.
    /// Not named in the distilled spec's field list, but needed to pick
    /// between the sequential and threaded evaluator pairs — without it
    /// there is no way to select `simple`/`prefiltering` over
    /// `threaded`/`threaded_prefiltering` from configuration alone.
    #[serde(default = "default_true")]
    pub enable_threading: bool,
}

fn default_mode() -> EvaluationMode {
    EvaluationMode::FullPrecision
}

fn default_true() -> bool {
    true
}

impl Default for EvaluationConfig {
    fn default() -> Self {
        EvaluationConfig {
            default_mode: default_mode(),
            worker_threads: 0,
            enable_prefiltering: true,
            enable_cost_sorting: true,
            enable_threading: true,
        }
    }
}

/// Result-cache sizing. `capacity = 0` disables caching outright.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    #[serde(default = "default_cache_capacity")]
    pub capacity: usize,
}

fn default_cache_capacity() -> usize {
    256
}

impl Default for CacheConfig {
    fn default() -> Self {
        CacheConfig { capacity: default_cache_capacity() }
    }
}

/// Logging configuration (ambient — see [`crate::engine`] for where
/// spans and events are actually emitted).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Emit newline-delimited JSON instead of human-readable text.
    #[serde(default)]
    pub json: bool,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        LoggingConfig { level: default_log_level(), json: false }
    }
}

impl Config {
    /// Load configuration from default locations.
    ///
    /// Merges in order:
    /// 1. compiled-in defaults
    /// 2. `config.toml` (optional)
    /// 3. `config.local.toml` (optional, intended to be git-ignored)
    /// 4. environment variables (`DSQUERY_` prefix, `__` nesting separator)
    pub fn load() -> Result<Self, figment::Error> {
        Figment::from(figment::providers::Serialized::defaults(Config::default()))
            .merge(Toml::file("config.toml"))
            .merge(Toml::file("config.local.toml"))
            .merge(Env::prefixed("DSQUERY_").split("__"))
            .extract()
    }

    /// Load configuration from a specific file path, still layered under
    /// environment variables.
    pub fn from_file(path: &str) -> Result<Self, figment::Error> {
        Figment::from(figment::providers::Serialized::defaults(Config::default()))
            .merge(Toml::file(path))
            .merge(Env::prefixed("DSQUERY_").split("__"))
            .extract()
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            indices: IndexPaths::default(),
            evaluation: EvaluationConfig::default(),
            cache: CacheConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}
