//! Service configuration loaded from TOML. Every field has a default, so a
//! missing file or a partial file still yields a usable config.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct AppConfig {
    /// SQLite file; `:memory:` keeps everything in process.
    #[serde(default = "default_database_path")]
    pub database_path: PathBuf,
    /// JSON glossary seed imported when the glossary is empty.
    #[serde(default)]
    pub glossary_seed_path: Option<PathBuf>,
    /// JSON slang table replacing the built-in one.
    #[serde(default)]
    pub slang_path: Option<PathBuf>,
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub search: SearchConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub extraction: ExtractionConfig,
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct LlmConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_model")]
    pub model: String,
    /// Falls back to `LLM_API_KEY`, then `DEEPSEEK_API_KEY`.
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Extra batch timeout per additional target language.
    #[serde(default = "default_batch_timeout_per_lang_secs")]
    pub batch_timeout_per_lang_secs: u64,
    #[serde(default = "default_max_output_tokens")]
    pub max_output_tokens: u32,
    /// Minimum spacing between outbound requests.
    #[serde(default = "default_min_interval_ms")]
    pub min_interval_ms: u64,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct SearchConfig {
    #[serde(default = "default_search_limit")]
    pub limit: usize,
    /// Glossary results below this score are not used as prompt hints.
    #[serde(default = "default_min_candidate_score")]
    pub min_candidate_score: f64,
    #[serde(default = "default_few_shot_examples")]
    pub few_shot_examples: usize,
    /// Approved translations compared in the consistency check.
    #[serde(default = "default_consistency_pool")]
    pub consistency_pool: usize,
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct CacheConfig {
    #[serde(default = "default_cache_capacity")]
    pub capacity: usize,
    #[serde(default = "default_cache_ttl_secs")]
    pub ttl_secs: u64,
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct ExtractionConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
}

fn default_database_path() -> PathBuf {
    PathBuf::from("hallyu.db")
}

fn default_base_url() -> String {
    "https://api.deepseek.com".into()
}

fn default_model() -> String {
    "deepseek-chat".into()
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_batch_timeout_per_lang_secs() -> u64 {
    10
}

fn default_max_output_tokens() -> u32 {
    1024
}

fn default_min_interval_ms() -> u64 {
    100
}

fn default_temperature() -> f32 {
    0.1
}

fn default_search_limit() -> usize {
    10
}

fn default_min_candidate_score() -> f64 {
    20.0
}

fn default_few_shot_examples() -> usize {
    3
}

fn default_consistency_pool() -> usize {
    100
}

fn default_cache_capacity() -> usize {
    512
}

fn default_cache_ttl_secs() -> u64 {
    600
}

fn default_true() -> bool {
    true
}

fn default_queue_capacity() -> usize {
    256
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            glossary_seed_path: None,
            slang_path: None,
            llm: LlmConfig::default(),
            search: SearchConfig::default(),
            cache: CacheConfig::default(),
            extraction: ExtractionConfig::default(),
        }
    }
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            model: default_model(),
            api_key: None,
            timeout_secs: default_timeout_secs(),
            batch_timeout_per_lang_secs: default_batch_timeout_per_lang_secs(),
            max_output_tokens: default_max_output_tokens(),
            min_interval_ms: default_min_interval_ms(),
            temperature: default_temperature(),
        }
    }
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            limit: default_search_limit(),
            min_candidate_score: default_min_candidate_score(),
            few_shot_examples: default_few_shot_examples(),
            consistency_pool: default_consistency_pool(),
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            capacity: default_cache_capacity(),
            ttl_secs: default_cache_ttl_secs(),
        }
    }
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            enabled: default_true(),
            queue_capacity: default_queue_capacity(),
        }
    }
}

impl LlmConfig {
    /// Configured key, else the environment.
    pub fn resolve_api_key(&self) -> Option<String> {
        self.api_key
            .clone()
            .filter(|k| !k.trim().is_empty())
            .or_else(|| std::env::var("LLM_API_KEY").ok())
            .or_else(|| std::env::var("DEEPSEEK_API_KEY").ok())
            .filter(|k| !k.trim().is_empty())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Batch budget: the single-call timeout plus a slice per extra language.
    pub fn batch_timeout(&self, languages: usize) -> Duration {
        let extra = languages.saturating_sub(1) as u64 * self.batch_timeout_per_lang_secs;
        Duration::from_secs(self.timeout_secs + extra)
    }
}

impl CacheConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }
}

impl AppConfig {
    pub fn from_toml(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }

    /// Load `path`; a missing file yields defaults, a malformed one an error.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        match fs::read_to_string(path) {
            Ok(content) => Self::from_toml(&content),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(e) => Err(e.into()),
        }
    }
}
