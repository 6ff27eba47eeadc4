//! Application configuration.
//!
//! Layers, lowest to highest priority: built-in defaults, a config file
//! (`--config`/`CONFIG_FILE`, else an optional `./config.{yaml,toml,json}`),
//! `AISDK_*` environment variables (e.g. `AISDK_SERVER__PORT=8000`), then CLI
//! flags and their plain env aliases (`PORT`, `LLM_MODEL`, ...).

use std::time::Duration;

use clap::Parser;
use config::{Config, Environment, File};
use serde::Deserialize;

use crate::chat::ChatOptions;
use crate::error::{Error, Result};
use crate::llm::provider::DEFAULT_AZURE_API_VERSION;
use crate::llm::{LlmSettings, Provider};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Config file path
    #[arg(short, long, env = "CONFIG_FILE")]
    pub config: Option<String>,

    /// Address to bind
    #[arg(long, env = "HOST")]
    pub host: Option<String>,

    /// Port to listen on
    #[arg(long, env = "PORT")]
    pub port: Option<u16>,

    /// Base URL of the OpenAI-compatible API
    #[arg(long, env = "LLM_BASE_URL")]
    pub llm_base_url: Option<String>,

    /// Model identifier
    #[arg(long, env = "LLM_MODEL")]
    pub llm_model: Option<String>,

    /// API key for the provider
    #[arg(long, env = "LLM_API_KEY", hide_env_values = true)]
    pub llm_api_key: Option<String>,

    /// Simulated tool latency in milliseconds
    #[arg(long, env = "TOOL_LATENCY_MS")]
    pub tool_latency_ms: Option<u64>,

    /// Emit logs as JSON
    #[arg(long, env = "LOG_JSON")]
    pub log_json: Option<bool>,

    /// Ask one question in the terminal instead of starting the server
    #[arg(long)]
    pub prompt: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub llm: LlmConfig,
    pub chat: ChatConfig,
    pub session: SessionConfig,
    pub log: LogConfig,
    /// One-shot terminal prompt (CLI only).
    #[serde(skip)]
    pub prompt: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub static_dir: String,
    pub request_timeout_secs: u64,
}

#[derive(Deserialize, Clone)]
pub struct LlmConfig {
    pub base_url: String,
    pub model: String,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub azure_deployment: Option<String>,
    #[serde(default)]
    pub azure_api_version: Option<String>,
}

impl std::fmt::Debug for LlmConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LlmConfig")
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("api_key", &self.api_key.as_ref().map(|_| "***"))
            .field("azure_deployment", &self.azure_deployment)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct ChatConfig {
    #[serde(default)]
    pub system_prompt: Option<String>,
    pub max_recursion_depth: usize,
    pub tool_latency_ms: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct SessionConfig {
    pub idle_timeout_secs: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct LogConfig {
    pub json: bool,
}

impl AppConfig {
    pub fn load() -> Result<Self> {
        Self::load_from_args(std::env::args())
    }

    pub fn load_from_args<I, T>(args: I) -> Result<Self>
    where
        I: IntoIterator<Item = T>,
        T: Into<std::ffi::OsString> + Clone,
    {
        let cli = Cli::try_parse_from(args).map_err(|e| Error::Config(e.to_string()))?;
        Self::from_cli(cli).map_err(|e| Error::Config(e.to_string()))
    }

    fn from_cli(cli: Cli) -> std::result::Result<Self, config::ConfigError> {
        let mut builder = Config::builder()
            .set_default("server.host", "127.0.0.1")?
            .set_default("server.port", 3000)?
            .set_default("server.static_dir", "static")?
            .set_default("server.request_timeout_secs", 30)?
            .set_default("llm.base_url", "https://api.openai.com")?
            .set_default("llm.model", "gpt-3.5-turbo-1106")?
            .set_default("chat.system_prompt", "You are a helpful assistant.")?
            .set_default("chat.max_recursion_depth", 5)?
            .set_default("chat.tool_latency_ms", 2000)?
            .set_default("session.idle_timeout_secs", 30 * 60)?
            .set_default("log.json", false)?;

        builder = match &cli.config {
            Some(path) => builder.add_source(File::with_name(path)),
            None => builder.add_source(File::with_name("config").required(false)),
        };

        builder = builder.add_source(
            Environment::with_prefix("AISDK")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        // CLI flags (and their env aliases) win over everything else.
        if let Some(host) = cli.host {
            builder = builder.set_override("server.host", host)?;
        }
        if let Some(port) = cli.port {
            builder = builder.set_override("server.port", port)?;
        }
        if let Some(url) = cli.llm_base_url {
            builder = builder.set_override("llm.base_url", url)?;
        }
        if let Some(model) = cli.llm_model {
            builder = builder.set_override("llm.model", model)?;
        }
        if let Some(key) = cli.llm_api_key.filter(|k| !k.trim().is_empty()) {
            builder = builder.set_override("llm.api_key", key)?;
        }
        if let Some(ms) = cli.tool_latency_ms {
            builder = builder.set_override("chat.tool_latency_ms", ms)?;
        }
        if let Some(json) = cli.log_json {
            builder = builder.set_override("log.json", json)?;
        }

        let mut cfg: Self = builder.build()?.try_deserialize()?;
        cfg.prompt = cli.prompt;
        Ok(cfg)
    }

    /// Options for [`crate::chat::ChatService`].
    #[must_use]
    pub fn chat_options(&self) -> ChatOptions {
        ChatOptions {
            max_recursion_depth: self.chat.max_recursion_depth,
            tool_latency: Duration::from_millis(self.chat.tool_latency_ms),
        }
    }
}

impl LlmConfig {
    /// Validate and resolve provider settings.
    pub fn settings(&self) -> Result<LlmSettings> {
        if self.base_url.trim().is_empty() {
            return Err(Error::Config("llm.base_url cannot be empty".to_string()));
        }
        if self.model.trim().is_empty() {
            return Err(Error::Config("llm.model cannot be empty".to_string()));
        }

        let mut provider = Provider::detect_from_url(&self.base_url);
        if let Provider::AzureOpenAI { .. } = &provider {
            // Azure routes by deployment; fall back to the model name.
            provider = Provider::AzureOpenAI {
                deployment_name: self
                    .azure_deployment
                    .clone()
                    .unwrap_or_else(|| self.model.clone()),
                api_version: self
                    .azure_api_version
                    .clone()
                    .unwrap_or_else(|| DEFAULT_AZURE_API_VERSION.to_string()),
            };
        }

        Ok(LlmSettings {
            base_url: self.base_url.clone(),
            api_key: self.api_key.clone().filter(|k| !k.trim().is_empty()),
            model: self.model.clone(),
            provider,
        })
    }
}
