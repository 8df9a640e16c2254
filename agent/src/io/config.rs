//! Agent configuration stored in `.repo-agent.toml`.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};

/// Default config file name, looked up in the working directory.
pub const DEFAULT_CONFIG_FILE: &str = ".repo-agent.toml";

/// Agent configuration (TOML).
///
/// Missing fields default to the values the agent was tuned with.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct AgentConfig {
    /// Model producing structured step batches.
    pub model: String,

    /// Higher-capability model used for free-form code synthesis.
    pub code_model: String,

    /// Cheaper model used for per-file summaries.
    pub summary_model: String,

    /// Directory holding `{hash}.query` / `{hash}.response` pairs.
    pub cache_dir: PathBuf,

    /// Route backend calls through the response cache.
    pub cache_enabled: bool,

    /// Skip every confirmation prompt.
    pub yes_to_all: bool,

    /// Wall-clock limit for a single `RUN_SHELL` command.
    pub shell_timeout_secs: u64,

    /// Truncate captured shell stdout/stderr beyond this many bytes.
    pub shell_output_limit_bytes: usize,

    /// Timeout for `HTTP_REQUEST_GET` and `GOOGLE_SEARCH`.
    pub http_timeout_secs: u64,

    /// Column width for HTML-to-text rendering.
    pub http_text_width: usize,

    /// Search URL prefix; the percent-encoded query is appended.
    pub search_url: String,

    pub backend: BackendConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct BackendConfig {
    /// Base URL of an OpenAI-compatible API.
    pub base_url: String,

    /// Environment variable holding the API key.
    pub api_key_env: String,

    /// Request timeout for backend calls.
    pub timeout_secs: u64,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.openai.com/v1".to_string(),
            api_key_env: "OPENAI_API_KEY".to_string(),
            timeout_secs: 10 * 60,
        }
    }
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            model: "gpt-4o".to_string(),
            code_model: "o1-preview".to_string(),
            summary_model: "gpt-4o-mini".to_string(),
            cache_dir: PathBuf::from("cache"),
            cache_enabled: true,
            yes_to_all: false,
            shell_timeout_secs: 10 * 60,
            shell_output_limit_bytes: 100_000,
            http_timeout_secs: 30,
            http_text_width: 100,
            search_url: "https://www.google.com/search?q=".to_string(),
            backend: BackendConfig::default(),
        }
    }
}

impl AgentConfig {
    pub fn validate(&self) -> Result<()> {
        for (name, value) in [
            ("model", &self.model),
            ("code_model", &self.code_model),
            ("summary_model", &self.summary_model),
        ] {
            if value.trim().is_empty() {
                return Err(anyhow!("{name} must be non-empty"));
            }
        }
        if self.shell_timeout_secs == 0 {
            return Err(anyhow!("shell_timeout_secs must be > 0"));
        }
        if self.shell_output_limit_bytes == 0 {
            return Err(anyhow!("shell_output_limit_bytes must be > 0"));
        }
        if self.http_timeout_secs == 0 {
            return Err(anyhow!("http_timeout_secs must be > 0"));
        }
        if self.http_text_width == 0 {
            return Err(anyhow!("http_text_width must be > 0"));
        }
        if self.search_url.trim().is_empty() {
            return Err(anyhow!("search_url must be non-empty"));
        }
        if self.backend.base_url.trim().is_empty() {
            return Err(anyhow!("backend.base_url must be non-empty"));
        }
        if self.backend.timeout_secs == 0 {
            return Err(anyhow!("backend.timeout_secs must be > 0"));
        }
        Ok(())
    }

    pub fn shell_timeout(&self) -> Duration {
        Duration::from_secs(self.shell_timeout_secs)
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }
}

/// Load config from a TOML file.
///
/// If the file is missing, returns `AgentConfig::default()`.
pub fn load_config(path: &Path) -> Result<AgentConfig> {
    if !path.exists() {
        let cfg = AgentConfig::default();
        cfg.validate()?;
        return Ok(cfg);
    }
    let contents = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let cfg: AgentConfig =
        toml::from_str(&contents).with_context(|| format!("parse {}", path.display()))?;
    cfg.validate()?;
    Ok(cfg)
}
