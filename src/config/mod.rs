//! Configuration management for Claritas
//!
//! TOML file with per-section structs, named profiles and `CLARITAS_*`
//! environment overrides. Every loaded configuration passes through
//! `ConfigValidator` before use.

use crate::error::{ClaritasError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

mod validator;

pub use validator::ConfigValidator;

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(rename = "_meta")]
    pub meta: MetaConfig,
    pub storage: StorageConfig,
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub ranking: RankingConfig,
    #[serde(default)]
    pub profiles: HashMap<String, ProfileOverrides>,
}

/// Metadata about the configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetaConfig {
    pub schema_version: String,
    #[serde(default = "current_timestamp")]
    pub created_at: String,
    #[serde(default = "current_timestamp")]
    pub last_modified: String,
}

fn current_timestamp() -> String {
    chrono::Utc::now().to_rfc3339()
}

/// Storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    pub data_dir: PathBuf,
    pub database_file: String,
}

impl StorageConfig {
    /// Location of the passage database with `~/` expanded
    pub fn database_path(&self) -> Result<PathBuf> {
        Ok(expand_path(&self.data_dir)?.join(&self.database_file))
    }
}

/// Embedding configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    pub model: String,
    /// Must match the model's output size; partitions are created with it
    pub dimension: usize,
    pub batch_size: usize,
}

/// Retrieval pipeline configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalConfig {
    /// Passages returned per query
    pub top_k: usize,
    /// Minimum raw similarity a candidate must reach
    pub score_threshold: f32,
    /// Candidates fetched per returned passage, so boosts can reorder
    pub search_multiplier: usize,
    /// Passages the keyword fallback inspects. Caps fallback cost on large
    /// partitions at the price of missing matches beyond the window.
    pub fallback_scan_limit: usize,
    /// Append router topics and keywords to the text that gets embedded
    pub augment_query_with_hints: bool,
    pub search_timeout: String,
    pub embed_timeout: String,
}

impl RetrievalConfig {
    pub fn search_timeout(&self) -> Result<Duration> {
        parse_duration(&self.search_timeout).ok_or_else(|| ClaritasError::InvalidConfigValue {
            path: "retrieval.search_timeout".to_string(),
            message: format!("Invalid duration: {}", self.search_timeout),
        })
    }

    pub fn embed_timeout(&self) -> Result<Duration> {
        parse_duration(&self.embed_timeout).ok_or_else(|| ClaritasError::InvalidConfigValue {
            path: "retrieval.embed_timeout".to_string(),
            message: format!("Invalid duration: {}", self.embed_timeout),
        })
    }
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: 6,
            score_threshold: 0.2,
            search_multiplier: 2,
            fallback_scan_limit: 300,
            augment_query_with_hints: true,
            search_timeout: "10s".to_string(),
            embed_timeout: "30s".to_string(),
        }
    }
}

/// Score composition for candidate ranking
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RankingConfig {
    /// Multiplier on the raw similarity score
    pub base_weight: f32,
    pub topic_boost: f32,
    pub keyword_boost: f32,
    pub authority_boost: f32,
    /// Attribution that earns the authority boost, compared exactly
    pub primary_speaker: String,
}

impl Default for RankingConfig {
    fn default() -> Self {
        Self {
            base_weight: 0.6,
            topic_boost: 0.25,
            keyword_boost: 0.15,
            authority_boost: 0.1,
            primary_speaker: "Meher Baba".to_string(),
        }
    }
}

/// Profile-specific configuration overrides
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProfileOverrides {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_k: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub score_threshold: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub search_multiplier: Option<usize>,
}

impl Config {
    /// Load configuration from a file
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(ClaritasError::ConfigNotFound {
                path: path.to_path_buf(),
            });
        }

        let content = std::fs::read_to_string(path).map_err(|e| ClaritasError::Io {
            source: e,
            context: format!("Failed to read config file: {:?}", path),
        })?;
        let mut config: Config = toml::from_str(&content)?;

        config.apply_env_overrides();

        ConfigValidator::validate(&config)?;

        Ok(config)
    }

    /// Save configuration to a file
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content).map_err(|e| ClaritasError::Io {
            source: e,
            context: format!("Failed to write config file: {:?}", path),
        })?;
        Ok(())
    }

    /// Load configuration with a specific profile applied
    pub fn load_with_profile(path: &Path, profile: &str) -> Result<Self> {
        let mut config = Self::load(path)?;
        config.apply_profile(profile)?;
        ConfigValidator::validate(&config)?;
        Ok(config)
    }

    /// Apply a profile's overrides to the configuration
    pub fn apply_profile(&mut self, profile: &str) -> Result<()> {
        let overrides = self
            .profiles
            .get(profile)
            .cloned()
            .ok_or_else(|| ClaritasError::Config(format!("Unknown profile: {}", profile)))?;

        if let Some(top_k) = overrides.top_k {
            self.retrieval.top_k = top_k;
        }
        if let Some(threshold) = overrides.score_threshold {
            self.retrieval.score_threshold = threshold;
        }
        if let Some(multiplier) = overrides.search_multiplier {
            self.retrieval.search_multiplier = multiplier;
        }
        Ok(())
    }

    /// Apply environment variable overrides
    /// Environment variables in format: CLARITAS_SECTION__KEY=value
    pub fn apply_env_overrides(&mut self) {
        for (key, value) in std::env::vars() {
            if let Some(config_key) = key.strip_prefix("CLARITAS_") {
                if let Err(e) = self.set_value_from_env(config_key, &value) {
                    tracing::warn!("Failed to apply env override {}: {}", key, e);
                }
            }
        }
    }

    fn set_value_from_env(&mut self, path: &str, value: &str) -> Result<()> {
        match path {
            "STORAGE__DATA_DIR" => self.storage.data_dir = PathBuf::from(value),
            "STORAGE__DATABASE_FILE" => self.storage.database_file = value.to_string(),
            "EMBEDDING__MODEL" => self.embedding.model = value.to_string(),
            "EMBEDDING__DIMENSION" => self.embedding.dimension = parse_env(path, value)?,
            "EMBEDDING__BATCH_SIZE" => self.embedding.batch_size = parse_env(path, value)?,
            "RETRIEVAL__TOP_K" => self.retrieval.top_k = parse_env(path, value)?,
            "RETRIEVAL__SCORE_THRESHOLD" => {
                self.retrieval.score_threshold = parse_env(path, value)?
            }
            "RETRIEVAL__SEARCH_MULTIPLIER" => {
                self.retrieval.search_multiplier = parse_env(path, value)?
            }
            "RETRIEVAL__FALLBACK_SCAN_LIMIT" => {
                self.retrieval.fallback_scan_limit = parse_env(path, value)?
            }
            "RETRIEVAL__AUGMENT_QUERY_WITH_HINTS" => {
                self.retrieval.augment_query_with_hints = parse_env(path, value)?
            }
            "RETRIEVAL__SEARCH_TIMEOUT" => self.retrieval.search_timeout = value.to_string(),
            "RETRIEVAL__EMBED_TIMEOUT" => self.retrieval.embed_timeout = value.to_string(),
            "RANKING__BASE_WEIGHT" => self.ranking.base_weight = parse_env(path, value)?,
            "RANKING__TOPIC_BOOST" => self.ranking.topic_boost = parse_env(path, value)?,
            "RANKING__KEYWORD_BOOST" => self.ranking.keyword_boost = parse_env(path, value)?,
            "RANKING__AUTHORITY_BOOST" => {
                self.ranking.authority_boost = parse_env(path, value)?
            }
            "RANKING__PRIMARY_SPEAKER" => self.ranking.primary_speaker = value.to_string(),
            _ => {
                tracing::debug!("Unknown env config key: {}", path);
            }
        }
        Ok(())
    }

    /// Get the default configuration file path
    pub fn default_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| ClaritasError::Config("Cannot determine config directory".to_string()))?;

        Ok(config_dir.join("claritas").join("config.toml"))
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            meta: MetaConfig {
                schema_version: "1.0.0".to_string(),
                created_at: current_timestamp(),
                last_modified: current_timestamp(),
            },
            storage: StorageConfig {
                data_dir: PathBuf::from("~/.claritas"),
                database_file: "passages.sqlite".to_string(),
            },
            embedding: EmbeddingConfig {
                model: "all-MiniLM-L6-v2".to_string(),
                dimension: 384,
                batch_size: 32,
            },
            retrieval: RetrievalConfig::default(),
            ranking: RankingConfig::default(),
            profiles: default_profiles(),
        }
    }
}

fn default_profiles() -> HashMap<String, ProfileOverrides> {
    let mut profiles = HashMap::new();
    profiles.insert(
        "broad".to_string(),
        ProfileOverrides {
            top_k: Some(10),
            score_threshold: Some(0.1),
            search_multiplier: Some(3),
        },
    );
    profiles.insert(
        "precise".to_string(),
        ProfileOverrides {
            top_k: Some(4),
            score_threshold: Some(0.35),
            search_multiplier: None,
        },
    );
    profiles
}

fn parse_env<T: std::str::FromStr>(path: &str, value: &str) -> Result<T> {
    value.parse().map_err(|_| ClaritasError::InvalidConfigValue {
        path: path.to_string(),
        message: format!("Cannot parse '{}'", value),
    })
}

/// Parse durations like "500ms", "10s", "2m", "1h" or bare seconds
pub fn parse_duration(s: &str) -> Option<Duration> {
    let s = s.trim();
    let (digits, unit) = match s.find(|c: char| !c.is_ascii_digit()) {
        Some(idx) => s.split_at(idx),
        None => (s, "s"),
    };
    let n: u64 = digits.parse().ok()?;

    match unit {
        "ms" => Some(Duration::from_millis(n)),
        "s" => Some(Duration::from_secs(n)),
        "m" => Some(Duration::from_secs(n.checked_mul(60)?)),
        "h" => Some(Duration::from_secs(n.checked_mul(3600)?)),
        _ => None,
    }
}

/// Expand a leading `~/` to the home directory
pub fn expand_path(path: &Path) -> Result<PathBuf> {
    let path_str = path
        .to_str()
        .ok_or_else(|| ClaritasError::Config("Invalid path encoding".to_string()))?;

    if let Some(stripped) = path_str.strip_prefix("~/") {
        let home = dirs::home_dir()
            .ok_or_else(|| ClaritasError::Config("Cannot determine home directory".to_string()))?;
        Ok(home.join(stripped))
    } else {
        Ok(path.to_path_buf())
    }
}
