use meetspace_common::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Environment variable consulted when the config file carries no API key.
pub const API_KEY_ENV: &str = "GROQ_API_KEY";

const DEFAULT_SYSTEM_PROMPT: &str = r#"You are MeetSpace AI, a knowledgeable and professional assistant.

Give complete, accurate and well-structured answers. When asked about any topic, cover it thoroughly:
- a clear definition or overview
- background and context where relevant
- how it works, step by step for technical topics
- real-world examples and use cases
- advantages, limitations and trade-offs
- comparisons with related ideas
- practical advice

Format responses in markdown: headings, **bold** for emphasis, lists for steps, tables for comparisons, fenced code blocks with language tags, and LaTeX for mathematics.

You remember this entire conversation. Refer back to names, projects, preferences and goals the user has mentioned, warmly and precisely. Never claim to have forgotten something said earlier in the conversation."#;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub gateway: GatewayConfig,

    #[serde(default)]
    pub llm: LlmConfig,

    #[serde(default)]
    pub relay: RelayConfig,

    #[serde(default = "default_database_path")]
    pub database_path: PathBuf,

    #[serde(default)]
    pub log_level: Option<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            gateway: GatewayConfig::default(),
            llm: LlmConfig::default(),
            relay: RelayConfig::default(),
            database_path: default_database_path(),
            log_level: Some("info".to_string()),
        }
    }
}

impl AppConfig {
    /// Resolve the completion API key: config file first, then `GROQ_API_KEY`.
    pub fn resolve_api_key(&self) -> Result<String> {
        self.resolve_api_key_with(|name| std::env::var(name).ok())
    }

    pub fn resolve_api_key_with(&self, env: impl Fn(&str) -> Option<String>) -> Result<String> {
        if let Some(key) = self.llm.api_key.as_deref()
            && !key.trim().is_empty()
        {
            return Ok(key.trim().to_string());
        }

        match env(API_KEY_ENV) {
            Some(key) if !key.trim().is_empty() => Ok(key.trim().to_string()),
            _ => Err(Error::Config(format!(
                "{API_KEY_ENV} missing: set it in the environment, a .env file, or llm.api_key in config.yml (free keys at https://console.groq.com/keys)"
            ))),
        }
    }

    pub fn validate(&self) -> Result<()> {
        url::Url::parse(&self.llm.base_url)
            .map_err(|e| Error::Config(format!("invalid llm.base_url {}: {e}", self.llm.base_url)))?;

        if !(0.0..=2.0).contains(&self.llm.temperature) {
            return Err(Error::Config(format!(
                "llm.temperature must be between 0 and 2, got {}",
                self.llm.temperature
            )));
        }

        if self.llm.timeout_secs == 0 {
            return Err(Error::Config("llm.timeout_secs must be positive".to_string()));
        }

        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    5004
}

fn default_database_path() -> PathBuf {
    PathBuf::from("chat_history.db")
}

/// Completion endpoint settings. Any OpenAI-compatible chat completions API works.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    #[serde(default = "default_model")]
    pub model: String,

    /// Base URL; `/chat/completions` is appended.
    #[serde(default = "default_base_url")]
    pub base_url: String,

    #[serde(default)]
    pub api_key: Option<String>,

    #[serde(default = "default_temperature")]
    pub temperature: f64,

    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            model: default_model(),
            base_url: default_base_url(),
            api_key: None,
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_model() -> String {
    "llama-3.1-8b-instant".to_string()
}

fn default_base_url() -> String {
    "https://api.groq.com/openai/v1".to_string()
}

fn default_temperature() -> f64 {
    0.65
}

fn default_max_tokens() -> u32 {
    8000
}

fn default_timeout_secs() -> u64 {
    100
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelayConfig {
    /// Instruction turn prepended to every outbound conversation.
    #[serde(default = "default_system_prompt")]
    pub system_prompt: String,

    /// Delay between forwarded fragments. Zero disables pacing.
    #[serde(default = "default_pacing_ms")]
    pub pacing_ms: u64,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            system_prompt: default_system_prompt(),
            pacing_ms: default_pacing_ms(),
        }
    }
}

fn default_system_prompt() -> String {
    DEFAULT_SYSTEM_PROMPT.to_string()
}

fn default_pacing_ms() -> u64 {
    8
}
