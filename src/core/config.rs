use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::info;

use crate::core::llm::ProviderType;
use crate::platform::{NativePlatform, Platform};

pub const CONFIG_FILE_NAME: &str = "biosynth.toml";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub llm: LlmConfig,
    pub retry: RetryConfig,
    pub parser: ParserConfig,
    pub automation: AutomationConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Bearer token required on admin routes. Without one the API only serves loopback binds.
    #[serde(default)]
    pub admin_token: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default)]
    pub path: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    #[serde(default = "default_provider")]
    pub provider: ProviderType,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub base_url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_rate_limit_base_delay_ms")]
    pub rate_limit_base_delay_ms: u64,
    #[serde(default = "default_status_delay_ms")]
    pub status_delay_ms: u64,
    /// Phrases marking a successful response as a "still warming up" placeholder.
    #[serde(default = "default_placeholder_keywords")]
    pub placeholder_keywords: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParserConfig {
    /// Vocabulary that disqualifies a nearby `{`/`[` as the start of the payload.
    #[serde(default = "default_status_keywords")]
    pub status_keywords: Vec<String>,
    #[serde(default = "default_lookbehind_chars")]
    pub lookbehind_chars: usize,
    #[serde(default = "default_raw_prefix_chars")]
    pub raw_prefix_chars: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AutomationConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Six-field cron expression (seconds first) for the full cycle.
    #[serde(default = "default_schedule")]
    pub schedule: String,
    #[serde(default)]
    pub generate: GenerateTaskConfig,
    #[serde(default)]
    pub synthesize: SynthesizeTaskConfig,
    #[serde(default)]
    pub improve: ImproveTaskConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerateTaskConfig {
    pub min_items: usize,
    pub max_items: usize,
    pub existing_problem_ratio: f64,
    pub recent_problem_pool: usize,
    pub delay_ms: u64,
    pub domains: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SynthesizeTaskConfig {
    pub top_k: usize,
    pub min_iterations: usize,
    pub max_iterations: usize,
    pub min_parents: usize,
    pub max_parents: usize,
    pub delay_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ImproveTaskConfig {
    pub limit: usize,
    pub stale_after_days: u64,
    pub delay_ms: u64,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    17890
}

fn default_provider() -> ProviderType {
    ProviderType::Gemini
}

fn default_model() -> String {
    "gemini-2.5-flash".to_string()
}

fn default_max_retries() -> u32 {
    2
}

fn default_rate_limit_base_delay_ms() -> u64 {
    1000
}

fn default_status_delay_ms() -> u64 {
    2000
}

fn default_placeholder_keywords() -> Vec<String> {
    ["loading", "initializing", "initialization", "processing", "please wait"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

fn default_status_keywords() -> Vec<String> {
    ["initialization", "initializing", "loading", "processing", "error"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

fn default_lookbehind_chars() -> usize {
    50
}

fn default_raw_prefix_chars() -> usize {
    500
}

fn default_true() -> bool {
    true
}

fn default_schedule() -> String {
    "0 0 */6 * * *".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            admin_token: None,
        }
    }
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: default_model(),
            api_key: None,
            base_url: None,
        }
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            rate_limit_base_delay_ms: default_rate_limit_base_delay_ms(),
            status_delay_ms: default_status_delay_ms(),
            placeholder_keywords: default_placeholder_keywords(),
        }
    }
}

impl Default for ParserConfig {
    fn default() -> Self {
        Self {
            status_keywords: default_status_keywords(),
            lookbehind_chars: default_lookbehind_chars(),
            raw_prefix_chars: default_raw_prefix_chars(),
        }
    }
}

impl Default for AutomationConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            schedule: default_schedule(),
            generate: GenerateTaskConfig::default(),
            synthesize: SynthesizeTaskConfig::default(),
            improve: ImproveTaskConfig::default(),
        }
    }
}

impl Default for GenerateTaskConfig {
    fn default() -> Self {
        Self {
            min_items: 3,
            max_items: 5,
            existing_problem_ratio: 0.7,
            recent_problem_pool: 10,
            delay_ms: 2000,
            domains: [
                "Healthcare",
                "Logistics",
                "Energy Systems",
                "Cybersecurity",
                "Agriculture",
                "Finance",
                "Robotics",
                "Climate Modeling",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
        }
    }
}

impl Default for SynthesizeTaskConfig {
    fn default() -> Self {
        Self {
            top_k: 15,
            min_iterations: 2,
            max_iterations: 4,
            min_parents: 2,
            max_parents: 3,
            delay_ms: 3000,
        }
    }
}

impl Default for ImproveTaskConfig {
    fn default() -> Self {
        Self {
            limit: 5,
            stale_after_days: 7,
            delay_ms: 2000,
        }
    }
}

impl AppConfig {
    /// Load configuration from an explicit path, `BIOSYNTH_CONFIG`, or the data directory.
    /// A missing file yields defaults; environment overrides are applied afterwards.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let path = match explicit {
            Some(p) => p.to_path_buf(),
            None => std::env::var("BIOSYNTH_CONFIG")
                .map(PathBuf::from)
                .unwrap_or_else(|_| NativePlatform::data_dir().join(CONFIG_FILE_NAME)),
        };

        let mut config = if path.exists() {
            let raw = std::fs::read_to_string(&path)
                .with_context(|| format!("failed to read config file {}", path.display()))?;
            let parsed = Self::from_toml_str(&raw)
                .with_context(|| format!("invalid config file {}", path.display()))?;
            info!("Loaded configuration from {}", path.display());
            parsed
        } else if explicit.is_some() {
            bail!("config file {} does not exist", path.display());
        } else {
            info!("No config file at {}, using defaults", path.display());
            Self::default()
        };

        config.apply_env(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    pub fn from_toml_str(raw: &str) -> Result<Self> {
        Ok(toml::from_str(raw)?)
    }

    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(key) = non_empty("BIOSYNTH_LLM_API_KEY").or_else(|| non_empty("GEMINI_API_KEY")) {
            self.llm.api_key = Some(key);
        }
        if let Some(token) = non_empty("BIOSYNTH_ADMIN_TOKEN") {
            self.server.admin_token = Some(token);
        }
        if let Some(model) = non_empty("BIOSYNTH_LLM_MODEL") {
            self.llm.model = model;
        }
    }

    pub fn validate(&self) -> Result<()> {
        let g = &self.automation.generate;
        if g.min_items == 0 || g.min_items > g.max_items {
            bail!(
                "automation.generate: min_items ({}) must be >= 1 and <= max_items ({})",
                g.min_items,
                g.max_items
            );
        }
        if !(0.0..=1.0).contains(&g.existing_problem_ratio) {
            bail!("automation.generate.existing_problem_ratio must be within 0.0..=1.0");
        }
        if g.domains.is_empty() {
            bail!("automation.generate.domains must not be empty");
        }

        let s = &self.automation.synthesize;
        if s.min_iterations > s.max_iterations {
            bail!("automation.synthesize: min_iterations must be <= max_iterations");
        }
        if s.min_parents < 2 || s.min_parents > s.max_parents || s.max_parents > 3 {
            bail!("automation.synthesize: parents must satisfy 2 <= min_parents <= max_parents <= 3");
        }

        if self.parser.raw_prefix_chars == 0 {
            bail!("parser.raw_prefix_chars must be greater than zero");
        }
        if self.retry.max_retries > 10 {
            bail!("retry.max_retries above 10 is not supported");
        }
        if self.llm.model.trim().is_empty() {
            bail!("llm.model must not be empty");
        }
        Ok(())
    }

    pub fn database_path(&self) -> PathBuf {
        self.database
            .path
            .clone()
            .unwrap_or_else(|| NativePlatform::data_dir().join("biosynth.db"))
    }
}
