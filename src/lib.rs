pub mod agent;
pub mod capability;
pub mod cli;
pub mod config;
pub mod http;
pub mod llm;
pub mod resource;
pub mod trace;

use agent::{ChatSession, LlmEntityExtractor, LlmSubjectClassifier, SessionConfig};
use anyhow::{Context, Result, anyhow};
use capability::{CapabilityBackend, FoodStore, RemoteCapability};
use cli::{AppState, CliArgs, Command, run_repl};
use config::{AppConfig, CapabilityMode};
use http::client::HttpClient;
use http::debug::HttpDebugConfig;
use llm::ollama::OllamaProvider;
use std::env;
use std::time::{SystemTime, UNIX_EPOCH};
use trace::SessionTrace;

pub async fn run(args: CliArgs) -> Result<()> {
    let config = AppConfig::load_with_path(args.config.as_deref())?;

    match args.command {
        Some(Command::Serve { database }) => {
            let path = database.unwrap_or_else(|| config.database_path.clone());
            let store = FoodStore::open(&path)
                .map_err(|err| anyhow!("Failed to start resource server: {err}"))?;
            resource::serve_stdio(store).await
        }
        None => run_chat(config, args.verbose).await,
    }
}

async fn run_chat(config: AppConfig, verbose: bool) -> Result<()> {
    let capability = open_capability(&config).await?;
    let session_id = generate_session_id();
    let trace = SessionTrace::create(&session_id)?;
    let http = HttpClient::new(reqwest::Client::new(), HttpDebugConfig::from_verbose(verbose))
        .with_trace(trace.clone())
        .with_bearer_token(config.ollama_api_key.clone());
    let provider = OllamaProvider::new(
        http,
        config.ollama_model.clone(),
        config.ollama_base_url.clone(),
    );

    let session = ChatSession::new(
        provider.clone(),
        capability,
        LlmSubjectClassifier::new(provider.clone()),
        LlmEntityExtractor::new(provider),
        config.system_prompt.clone(),
        session_config(&config),
    );
    let startup_message = format!(
        "Model {} at {}. Favorite foods from {}. Type /clean to reset, /debug for diagnostics, Ctrl-D to quit.",
        config.ollama_model,
        config.ollama_base_url,
        config.database_path.display()
    );

    let mut app_state = AppState {
        session_id,
        session,
        trace,
        startup_message: Some(startup_message),
    };

    run_repl(&mut app_state).await
}

async fn open_capability(config: &AppConfig) -> Result<CapabilityBackend> {
    match config.capability {
        CapabilityMode::Local => {
            let store = FoodStore::open(&config.database_path)
                .map_err(|err| anyhow!("Failed to open favorite food database: {err}"))?;
            Ok(CapabilityBackend::Local(store))
        }
        CapabilityMode::Remote => {
            let program = env::current_exe().context("Failed to locate the foodchat executable")?;
            let remote = RemoteCapability::spawn(&program, &serve_args(config))
                .await
                .context("Failed to start favorite food resource server")?;
            Ok(CapabilityBackend::Remote(remote))
        }
    }
}

fn serve_args(config: &AppConfig) -> Vec<String> {
    let mut args = Vec::new();
    if config.config_is_explicit {
        args.push("--config".to_string());
        args.push(config.config_path.display().to_string());
    }
    args.push("serve".to_string());
    args.push("--database".to_string());
    args.push(config.database_path.display().to_string());
    args
}

fn session_config(config: &AppConfig) -> SessionConfig {
    SessionConfig {
        tool_mode: config.tool_mode,
        history_window: config.history_window,
        capability_timeout_ms: config.capability_timeout_ms,
        stream_idle_timeout_ms: config.stream_idle_timeout_ms,
    }
}

fn generate_session_id() -> String {
    let millis = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |duration| duration.as_millis());
    format!("{millis:x}-{:x}", std::process::id())
}
