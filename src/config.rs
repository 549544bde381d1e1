use anyhow::{Result, anyhow, bail};
use serde::Deserialize;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::agent::prompt::DEFAULT_SYSTEM_PROMPT;

pub const DEFAULT_OLLAMA_BASE_URL: &str = "http://localhost:11434";
pub const DEFAULT_OLLAMA_MODEL: &str = "llama3.2";
pub const DEFAULT_HISTORY_WINDOW: usize = 5;
pub const DEFAULT_CAPABILITY_TIMEOUT_MS: u64 = 5_000;
pub const DEFAULT_STREAM_IDLE_TIMEOUT_MS: u64 = 60_000;

const CONFIG_DIR_NAME: &str = "foodchat";
const CONFIG_FILE_NAME: &str = "config.toml";
const DEFAULT_DATABASE_FILE: &str = "foodchat.db";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub config_path: PathBuf,
    pub config_is_explicit: bool,
    pub ollama_base_url: String,
    pub ollama_model: String,
    pub ollama_api_key: Option<String>,
    pub database_path: PathBuf,
    pub tool_mode: ToolMode,
    pub capability: CapabilityMode,
    pub history_window: usize,
    pub capability_timeout_ms: u64,
    pub stream_idle_timeout_ms: u64,
    pub system_prompt: String,
}

/// How the session decides to look up a favorite food.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolMode {
    /// Classifier and extractor run before every model call.
    Classifier,
    /// The model is offered a tool and asks for lookups itself.
    Native,
}

impl FromStr for ToolMode {
    type Err = String;

    fn from_str(value: &str) -> std::result::Result<Self, Self::Err> {
        match value {
            "classifier" => Ok(Self::Classifier),
            "native" => Ok(Self::Native),
            _ => Err(format!("unknown tool mode '{value}' (expected classifier|native)")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CapabilityMode {
    Local,
    Remote,
}

impl FromStr for CapabilityMode {
    type Err = String;

    fn from_str(value: &str) -> std::result::Result<Self, Self::Err> {
        match value {
            "local" => Ok(Self::Local),
            "remote" => Ok(Self::Remote),
            _ => Err(format!("unknown capability '{value}' (expected local|remote)")),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawFileConfig {
    ollama_base_url: Option<String>,
    ollama_model: Option<String>,
    ollama_api_key: Option<String>,
    database_path: Option<PathBuf>,
    tool_mode: Option<String>,
    capability: Option<String>,
    history_window: Option<usize>,
    capability_timeout_ms: Option<u64>,
    stream_idle_timeout_ms: Option<u64>,
    system_prompt: Option<String>,
}

impl AppConfig {
    pub fn load() -> Result<Self> {
        Self::load_with_path(None)
    }

    /// An explicit path must exist; the discovered default path may be absent.
    pub fn load_with_path(explicit_path: Option<&Path>) -> Result<Self> {
        let (config_path, config_is_explicit) = match explicit_path {
            Some(path) => (path.to_path_buf(), true),
            None => (discover_config_path()?, false),
        };
        if config_is_explicit && !config_path.is_file() {
            bail!(
                "Failed to load config {}: file does not exist",
                config_path.display()
            );
        }
        let file_config = load_file_config(&config_path)?.unwrap_or_default();

        dotenvy::dotenv().ok();

        let tool_mode = match non_empty_owned(file_config.tool_mode.as_deref()) {
            Some(value) => ToolMode::from_str(&value)
                .map_err(|reason| config_error(&config_path, "tool_mode", &reason))?,
            None => ToolMode::Classifier,
        };
        let capability = match non_empty_owned(file_config.capability.as_deref()) {
            Some(value) => CapabilityMode::from_str(&value)
                .map_err(|reason| config_error(&config_path, "capability", &reason))?,
            None => CapabilityMode::Local,
        };

        let history_window = file_config
            .history_window
            .unwrap_or(DEFAULT_HISTORY_WINDOW);
        if history_window == 0 {
            return Err(config_error(
                &config_path,
                "history_window",
                "must be >= 1",
            ));
        }
        let capability_timeout_ms = file_config
            .capability_timeout_ms
            .unwrap_or(DEFAULT_CAPABILITY_TIMEOUT_MS);
        if capability_timeout_ms == 0 {
            return Err(config_error(
                &config_path,
                "capability_timeout_ms",
                "must be >= 1",
            ));
        }
        let stream_idle_timeout_ms = file_config
            .stream_idle_timeout_ms
            .unwrap_or(DEFAULT_STREAM_IDLE_TIMEOUT_MS);
        if stream_idle_timeout_ms == 0 {
            return Err(config_error(
                &config_path,
                "stream_idle_timeout_ms",
                "must be >= 1",
            ));
        }

        let database_path = match env_non_empty("FOODCHAT_DATABASE") {
            Some(path) => PathBuf::from(path),
            None => resolve_database_path(&config_path, file_config.database_path.as_deref()),
        };

        Ok(Self {
            ollama_base_url: env_non_empty("OLLAMA_BASE_URL")
                .or(non_empty_owned(file_config.ollama_base_url.as_deref()))
                .unwrap_or_else(|| DEFAULT_OLLAMA_BASE_URL.to_string()),
            ollama_model: env_non_empty("OLLAMA_MODEL")
                .or(non_empty_owned(file_config.ollama_model.as_deref()))
                .unwrap_or_else(|| DEFAULT_OLLAMA_MODEL.to_string()),
            ollama_api_key: env_non_empty("OLLAMA_API_KEY")
                .or(non_empty_owned(file_config.ollama_api_key.as_deref())),
            database_path,
            tool_mode,
            capability,
            history_window,
            capability_timeout_ms,
            stream_idle_timeout_ms,
            system_prompt: non_empty_owned(file_config.system_prompt.as_deref())
                .unwrap_or_else(|| DEFAULT_SYSTEM_PROMPT.to_string()),
            config_path,
            config_is_explicit,
        })
    }
}

fn discover_config_path() -> Result<PathBuf> {
    if let Ok(xdg) = env::var("XDG_CONFIG_HOME") {
        let trimmed = xdg.trim();
        if trimmed.is_empty() {
            bail!("Failed to resolve config path: XDG_CONFIG_HOME is set but empty");
        }

        return Ok(PathBuf::from(trimmed)
            .join(CONFIG_DIR_NAME)
            .join(CONFIG_FILE_NAME));
    }

    let home = dirs::home_dir()
        .ok_or_else(|| anyhow!("Failed to resolve config path: HOME directory is unavailable"))?;

    Ok(home
        .join(".config")
        .join(CONFIG_DIR_NAME)
        .join(CONFIG_FILE_NAME))
}

fn load_file_config(config_path: &Path) -> Result<Option<RawFileConfig>> {
    if !config_path.is_file() {
        return Ok(None);
    }

    let config_text = fs::read_to_string(config_path).map_err(|err| {
        anyhow!(
            "Failed to load config {}: unable to read file: {err}",
            config_path.display()
        )
    })?;

    toml::from_str(&config_text)
        .map(Some)
        .map_err(|err| anyhow!("Failed to load config {}: {err}", config_path.display()))
}

// Relative paths in the file are taken relative to the file's directory.
fn resolve_database_path(config_path: &Path, configured: Option<&Path>) -> PathBuf {
    let config_dir = config_path.parent().unwrap_or_else(|| Path::new("."));
    match configured {
        Some(path) if path.is_absolute() => path.to_path_buf(),
        Some(path) => config_dir.join(path),
        None => config_dir.join(DEFAULT_DATABASE_FILE),
    }
}

fn env_non_empty(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .and_then(|value| non_empty_owned(Some(&value)))
}

fn non_empty_owned(value: Option<&str>) -> Option<String> {
    let trimmed = value?.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

fn config_error(config_path: &Path, key_path: &str, reason: &str) -> anyhow::Error {
    anyhow!(
        "Failed to load config {}: {key_path}: {reason}",
        config_path.display()
    )
}
