//! AI SDK streaming chat
//!
//! A server-rendered chat page backed by an OpenAI-compatible completion
//! stream, re-emitted in the AI SDK data-stream protocol with tool calls
//! executed server-side.
//!
//! # Architecture
//!
//! - **Server**: Axum HTTP server, HTML pages enhanced with HTMX
//! - **LLM**: Chat Completions driver with provider detection
//! - **Stream**: Recursive chunk pipeline that assembles tool calls
//! - **UI**: Plain HTML rendering of a chat session
//!
//! # Modules
//!
//! - [`llm`]: LLM driver trait, chunk types and implementations
//! - [`protocol`]: AI SDK data-stream framing
//! - [`stream`]: Chunk pipeline and tool-call assembly
//! - [`tools`]: Demo tools and their executor
//! - [`chat`]: Reply orchestration
//! - [`session`]: Chat session state
//! - [`ui`]: Page rendering

// Allow pedantic clippy warnings that don't add value for this codebase
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::missing_fields_in_debug)]
#![allow(clippy::implicit_hasher)]
#![allow(clippy::assigning_clones)]
#![allow(clippy::match_same_arms)]
#![allow(clippy::cargo_common_metadata)]
#![allow(clippy::multiple_crate_versions)]
#![allow(clippy::default_trait_access)]
#![allow(clippy::unused_async)]

pub mod chat;
pub mod config;
pub mod error;
pub mod llm;
pub mod protocol;
pub mod server;
pub mod session;
pub mod stream;
pub mod tools;
pub mod ui;

use std::sync::Arc;

use crate::chat::ChatService;
use crate::config::AppConfig;
use crate::session::SessionStore;

pub use error::{Error, Result};

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    /// Reply producer for chat interactions.
    pub chat: Arc<ChatService>,
    /// Session store for the chat pages.
    pub sessions: SessionStore,
    /// Global Configuration
    pub config: Arc<AppConfig>,
}

impl AppState {
    /// Build state from configuration and a chat service.
    #[must_use]
    pub fn new(config: Arc<AppConfig>, chat: ChatService) -> Self {
        let sessions = SessionStore::new(config.chat.system_prompt.clone());
        Self {
            chat: Arc::new(chat),
            sessions,
            config,
        }
    }
}
