//! Engine configuration
//!
//! Built-in defaults, optionally replaced by a TOML file, then overridden by
//! environment variables named `BUTTERFLY__<SECTION>__<KEY>`:
//!
//! - `BUTTERFLY__SEARCH__ALGORITHM=astar`
//! - `BUTTERFLY__SEARCH__MAX_EXPANSIONS=500000`
//! - `BUTTERFLY__SEARCH__TIMEOUT_MS=250`
//! - `BUTTERFLY__STORE__TILE_DIR=/data/tiles`
//! - `BUTTERFLY__LOGGING__JSON=true`
//!
//! ```toml
//! [search]
//! algorithm = "bidirectional"
//! frontier = "bucket"
//! bucket_size = 1.0
//!
//! [[search.hierarchy_limits]]
//! max_up_transitions = 400
//! expand_within_distance_m = 1e8
//! ```

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

use crate::cost::TravelMode;
use crate::hierarchy::TileHierarchy;
use crate::search::{Algorithm, FrontierKind, HierarchyLimits, SearchLimits, SearchOptions};

pub const ENV_PREFIX: &str = "BUTTERFLY__";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read configuration file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse configuration: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub search: SearchConfig,
    pub store: StoreConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    pub algorithm: Algorithm,
    /// Travel mode for requests that do not name one
    pub mode: TravelMode,
    pub frontier: FrontierKind,
    /// Cost width of one frontier bucket
    pub bucket_size: f32,
    pub bucket_count: usize,
    pub max_reserved_labels: usize,
    pub max_expansions: Option<u64>,
    pub timeout_ms: Option<u64>,
    /// One entry per hierarchy level, coarsest first
    pub hierarchy_limits: Vec<HierarchyLimits>,
}

impl Default for SearchConfig {
    fn default() -> Self {
        let levels = TileHierarchy::standard().levels().len();
        Self {
            algorithm: Algorithm::Bidirectional,
            mode: TravelMode::Car,
            frontier: FrontierKind::Bucket,
            bucket_size: 1.0,
            bucket_count: 20_000,
            max_reserved_labels: 1_000_000,
            max_expansions: None,
            timeout_ms: None,
            hierarchy_limits: vec![HierarchyLimits::unlimited(); levels],
        }
    }
}

impl SearchConfig {
    pub fn limits(&self) -> SearchLimits {
        SearchLimits {
            max_expansions: self.max_expansions,
            timeout: self.timeout_ms.map(Duration::from_millis),
        }
    }

    pub fn options(&self) -> SearchOptions {
        SearchOptions {
            limits: self.limits(),
            hierarchy: self.hierarchy_limits.clone(),
            frontier: self.frontier,
            bucket_size: self.bucket_size,
            bucket_count: self.bucket_count,
            max_reserved_labels: self.max_reserved_labels,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub tile_dir: PathBuf,
    /// Tiles kept in memory
    pub cache_capacity: usize,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            tile_dir: PathBuf::from("tiles"),
            cache_capacity: 1024,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Filter used when `BUTTERFLY_LOG` is unset
    pub level: String,
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

fn parse_env<T: FromStr>(key: &str, value: &str) -> Result<T, ConfigError> {
    value
        .trim()
        .parse()
        .map_err(|_| ConfigError::Invalid(format!("{ENV_PREFIX}{key}: cannot parse '{value}'")))
}

fn parse_bool(key: &str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::Invalid(format!(
            "{ENV_PREFIX}{key}: expected a boolean, got '{value}'"
        ))),
    }
}

/// `none`/empty clears an optional limit
fn parse_optional<T: FromStr>(key: &str, value: &str) -> Result<Option<T>, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "" | "none" => Ok(None),
        _ => parse_env(key, value).map(Some),
    }
}

impl EngineConfig {
    /// Defaults, then the file at `path` if given, then the environment
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) => Self::from_toml(&std::fs::read_to_string(path)?)?,
            None => Self::default(),
        };
        config.apply_overrides(|key| std::env::var(format!("{ENV_PREFIX}{key}")).ok())?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_toml(contents: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(contents)?)
    }

    pub fn to_toml(&self) -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }

    /// Applies overrides; `lookup` maps `SECTION__KEY` to a raw value
    pub fn apply_overrides(
        &mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<(), ConfigError> {
        let get = |key: &str| lookup(key).map(|v| (key.to_string(), v));

        if let Some((k, v)) = get("SEARCH__ALGORITHM") {
            self.search.algorithm = v
                .parse()
                .map_err(|e: String| ConfigError::Invalid(format!("{ENV_PREFIX}{k}: {e}")))?;
        }
        if let Some((k, v)) = get("SEARCH__MODE") {
            self.search.mode = v
                .parse()
                .map_err(|e: String| ConfigError::Invalid(format!("{ENV_PREFIX}{k}: {e}")))?;
        }
        if let Some((k, v)) = get("SEARCH__FRONTIER") {
            self.search.frontier = match v.trim().to_ascii_lowercase().as_str() {
                "bucket" => FrontierKind::Bucket,
                "heap" => FrontierKind::Heap,
                _ => {
                    return Err(ConfigError::Invalid(format!(
                        "{ENV_PREFIX}{k}: expected bucket or heap, got '{v}'"
                    )))
                }
            };
        }
        if let Some((k, v)) = get("SEARCH__BUCKET_SIZE") {
            self.search.bucket_size = parse_env(&k, &v)?;
        }
        if let Some((k, v)) = get("SEARCH__BUCKET_COUNT") {
            self.search.bucket_count = parse_env(&k, &v)?;
        }
        if let Some((k, v)) = get("SEARCH__MAX_RESERVED_LABELS") {
            self.search.max_reserved_labels = parse_env(&k, &v)?;
        }
        if let Some((k, v)) = get("SEARCH__MAX_EXPANSIONS") {
            self.search.max_expansions = parse_optional(&k, &v)?;
        }
        if let Some((k, v)) = get("SEARCH__TIMEOUT_MS") {
            self.search.timeout_ms = parse_optional(&k, &v)?;
        }

        if let Some((_, v)) = get("STORE__TILE_DIR") {
            self.store.tile_dir = PathBuf::from(v);
        }
        if let Some((k, v)) = get("STORE__CACHE_CAPACITY") {
            self.store.cache_capacity = parse_env(&k, &v)?;
        }

        if let Some((_, v)) = get("LOGGING__LEVEL") {
            self.logging.level = v;
        }
        if let Some((k, v)) = get("LOGGING__JSON") {
            self.logging.json = parse_bool(&k, &v)?;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let s = &self.search;
        if !(s.bucket_size.is_finite() && s.bucket_size > 0.0) {
            return Err(ConfigError::Invalid(format!(
                "search.bucket_size must be positive, got {}",
                s.bucket_size
            )));
        }
        if s.bucket_count == 0 {
            return Err(ConfigError::Invalid("search.bucket_count must be at least 1".into()));
        }
        if s.hierarchy_limits.is_empty() {
            return Err(ConfigError::Invalid(
                "search.hierarchy_limits needs one entry per level".into(),
            ));
        }
        for (level, limits) in s.hierarchy_limits.iter().enumerate() {
            if limits.expand_within_distance_m.is_nan() || limits.expand_within_distance_m < 0.0 {
                return Err(ConfigError::Invalid(format!(
                    "search.hierarchy_limits[{level}].expand_within_distance_m must be non-negative"
                )));
            }
        }
        if self.store.cache_capacity == 0 {
            return Err(ConfigError::Invalid("store.cache_capacity must be at least 1".into()));
        }
        if tracing_subscriber::EnvFilter::try_new(&self.logging.level).is_err() {
            return Err(ConfigError::Invalid(format!(
                "logging.level '{}' is not a valid filter",
                self.logging.level
            )));
        }
        Ok(())
    }
}
