//! AI SDK streaming chat server
//!
//! Entry point. Starts the HTTP server, or answers a single `--prompt` in the
//! terminal.

use mimalloc::MiMalloc;

/// Global allocator for improved performance (M-MIMALLOC-APPS).
#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

use std::io::Write;
use std::sync::Arc;

use aisdk_stream::chat::ChatService;
use aisdk_stream::config::AppConfig;
use aisdk_stream::llm::{ChatCompletionsDriver, LlmDriver, Message};
use aisdk_stream::protocol::StreamFormat;
use aisdk_stream::server::start_server;
use dotenvy::dotenv;
use futures::StreamExt;
use tracing::info;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// System prompt for terminal conversations.
const CLI_SYSTEM_PROMPT: &str = "You are a helpful assistant.";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env (if present)
    let _ = dotenv();

    let config = match AppConfig::load() {
        Ok(c) => Arc::new(c),
        Err(e) => {
            eprintln!("Configuration error: {e}");
            std::process::exit(1);
        }
    };

    init_tracing(config.log.json);

    let settings = match config.llm.settings() {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Configuration error: {e}");
            std::process::exit(1);
        }
    };

    info!(
        name: "llm.config.loaded",
        base_url = %settings.base_url,
        model = %settings.model,
        "LLM configuration loaded"
    );

    let driver: Arc<dyn LlmDriver> = Arc::new(ChatCompletionsDriver::new(settings));

    if let Some(prompt) = config.prompt.clone() {
        return run_prompt(&config, driver, prompt).await;
    }

    start_server(config, driver).await
}

/// Initialize tracing (M-LOG-STRUCTURED).
fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let (text_layer, json_layer) = if json {
        (None, Some(fmt::layer().json().with_target(true)))
    } else {
        (Some(fmt::layer().with_target(true)), None)
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(text_layer)
        .with(json_layer)
        .init();
}

/// Ask one question and print the human-readable reply as it streams.
async fn run_prompt(config: &AppConfig, driver: Arc<dyn LlmDriver>, prompt: String) -> anyhow::Result<()> {
    let service = ChatService::new(driver, config.chat_options());
    let messages = vec![Message::system(CLI_SYSTEM_PROMPT), Message::user(prompt)];

    let mut frames = service.stream_reply(messages, StreamFormat::HumanReadable).await?;
    let mut stdout = std::io::stdout();
    while let Some(frame) = frames.next().await {
        write!(stdout, "{}", frame?)?;
        stdout.flush()?;
    }
    writeln!(stdout)?;
    Ok(())
}
