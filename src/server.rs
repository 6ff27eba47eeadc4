use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    Form, Json, Router,
    body::Body,
    extract::{DefaultBodyLimit, Path, Request, State},
    http::{HeaderMap, HeaderName, StatusCode, header},
    middleware::Next,
    response::{Html, IntoResponse, Redirect, Response},
    routing::{get, post},
};
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::AppState;
use crate::chat::ChatService;
use crate::config::AppConfig;
use crate::llm::{LlmDriver, Message};
use crate::protocol::{DataStreamPart, ResponseChannel, StreamFormat};
use crate::session::{ChatMessage, ChatSnapshot};
use crate::ui::{chat_page, chat_panel};

/// Header announcing the data-stream protocol to AI SDK clients.
pub const STREAM_DATA_HEADER: HeaderName = HeaderName::from_static("x-experimental-stream-data");

const BODY_LIMIT_BYTES: usize = 1024 * 1024;
const SESSION_SWEEP_INTERVAL: Duration = Duration::from_secs(60);

/// Build the application router.
pub fn router(state: AppState) -> Router {
    let timeout_duration = Duration::from_secs(state.config.server.request_timeout_secs);
    let static_dir = ServeDir::new(&state.config.server.static_dir);

    Router::new()
        // HTML pages
        .route("/", get(index_handler))
        .route("/chat/{id}", get(chat_page_handler))
        .route("/chat/{id}/input", post(input_handler))
        .route("/chat/{id}/submit", post(submit_handler))
        // API routes
        .route("/api/chat", post(api_chat))
        .route("/api/sessions", get(api_list_sessions))
        .route("/api/sessions/{id}", get(api_get_session))
        .route("/api/sessions/{id}/messages", get(api_get_messages))
        // Static assets
        .nest_service("/static", static_dir)
        .layer(DefaultBodyLimit::max(BODY_LIMIT_BYTES))
        .layer(axum::middleware::from_fn(
            move |req: Request, next: Next| async move {
                match tokio::time::timeout(timeout_duration, next.run(req)).await {
                    Ok(res) => res,
                    Err(_) => (StatusCode::REQUEST_TIMEOUT, "Request timed out").into_response(),
                }
            },
        ))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Start the Axum server with the provided configuration.
pub async fn start_server(config: Arc<AppConfig>, driver: Arc<dyn LlmDriver>) -> anyhow::Result<()> {
    let chat = ChatService::new(driver, config.chat_options());
    let state = AppState::new(Arc::clone(&config), chat);

    spawn_session_sweeper(&state, Duration::from_secs(config.session.idle_timeout_secs));

    let app = router(state);

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    info!(
        name: "server.started",
        address = %addr,
        "Server started"
    );

    axum::serve(listener, app.into_make_service()).await?;
    Ok(())
}

/// Periodically drop sessions idle for longer than `idle`.
fn spawn_session_sweeper(state: &AppState, idle: Duration) {
    let sessions = state.sessions.clone();
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(SESSION_SWEEP_INTERVAL);
        loop {
            ticker.tick().await;
            let removed = sessions.cleanup_expired_with_timeout(idle);
            if removed > 0 {
                info!(removed, remaining = sessions.len(), "Expired sessions removed");
            }
        }
    });
}

fn is_htmx(headers: &HeaderMap) -> bool {
    headers
        .get("hx-request")
        .is_some_and(|value| value.as_bytes() == b"true")
}

// ─────────────────────────────────────────────────────────────────────────────
// HTML Page Handlers
// ─────────────────────────────────────────────────────────────────────────────

/// GET / - Start a new chat.
async fn index_handler(State(state): State<AppState>) -> Redirect {
    let session = state.sessions.create();
    info!(session_id = %session.id(), "Session created");
    Redirect::to(&format!("/chat/{}", session.id()))
}

/// GET /chat/:id - Render the chat page.
async fn chat_page_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Html<String>, StatusCode> {
    let session = state.sessions.get(&id).ok_or(StatusCode::NOT_FOUND)?;
    Ok(Html(chat_page(session.id(), &session.snapshot())))
}

/// Form body carrying the composer text.
#[derive(Debug, Deserialize)]
struct InputForm {
    #[serde(default)]
    input: Option<String>,
}

/// POST /chat/:id/input - Composer text changed.
async fn input_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Form(form): Form<InputForm>,
) -> StatusCode {
    let Some(session) = state.sessions.get(&id) else {
        return StatusCode::NOT_FOUND;
    };
    session.handle_input_change(form.input.as_deref().unwrap_or_default());
    StatusCode::NO_CONTENT
}

/// POST /chat/:id/submit - Submit the composer and wait for the reply.
///
/// The reply runs on its own task, so a request timeout or a dropped
/// connection stops the wait but not the reply.
async fn submit_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
    headers: HeaderMap,
    Form(form): Form<InputForm>,
) -> Response {
    let Some(session) = state.sessions.get(&id) else {
        return StatusCode::NOT_FOUND.into_response();
    };

    if let Some(input) = &form.input {
        session.handle_input_change(input);
    }

    if let Some(conversation) = session.handle_submit() {
        info!(
            session_id = %session.id(),
            message_count = conversation.len(),
            "Chat submitted"
        );
        let chat = Arc::clone(&state.chat);
        let reply_session = session.clone();
        let reply = tokio::spawn(async move {
            chat.reply_into(&reply_session, conversation).await;
        });

        if let Err(e) = reply.await {
            tracing::error!(session_id = %session.id(), error = %e, "Reply task failed");
            session.apply_part(DataStreamPart::Error(e.to_string()));
        }
    }

    if is_htmx(&headers) {
        Html(chat_panel(session.id(), &session.snapshot())).into_response()
    } else {
        Redirect::to(&format!("/chat/{}", session.id())).into_response()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// API Handlers
// ─────────────────────────────────────────────────────────────────────────────

/// Request body for chat API.
#[derive(Debug, Deserialize)]
struct ChatRequest {
    /// Conversation so far, oldest first.
    messages: Vec<Message>,
}

/// POST /api/chat - Stream a reply in the AI SDK data-stream format.
async fn api_chat(
    State(state): State<AppState>,
    Json(req): Json<ChatRequest>,
) -> Result<Response, (StatusCode, String)> {
    if req.messages.is_empty() {
        return Err((
            StatusCode::UNPROCESSABLE_ENTITY,
            "messages must contain at least one message".to_string(),
        ));
    }

    tracing::info!(message_count = req.messages.len(), "Received chat request");

    let mut frames = state
        .chat
        .stream_reply(req.messages, StreamFormat::AiSdk)
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "Failed to start chat reply");
            (StatusCode::BAD_GATEWAY, e.to_string())
        })?;

    let body = async_stream::stream! {
        while let Some(frame) = frames.next().await {
            match frame {
                Ok(frame) => yield Ok::<_, Infallible>(frame),
                Err(e) => {
                    tracing::error!(error = %e, "Chat stream failed");
                    yield Ok(StreamFormat::AiSdk.frame(ResponseChannel::Error, &Value::String(e.to_string())));
                    break;
                }
            }
        }
    };

    Ok((
        [
            (header::CONTENT_TYPE, "text/plain; charset=utf-8"),
            (STREAM_DATA_HEADER, "true"),
        ],
        Body::from_stream(body),
    )
        .into_response())
}

/// Session summary for API responses.
#[derive(Debug, Serialize)]
struct SessionInfo {
    id: String,
    message_count: usize,
    age_secs: u64,
    #[serde(flatten)]
    chat: ChatSnapshot,
}

/// GET /api/sessions - List session IDs.
async fn api_list_sessions(State(state): State<AppState>) -> Json<Vec<String>> {
    Json(state.sessions.list_ids())
}

/// GET /api/sessions/:id - Get session state.
async fn api_get_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<SessionInfo>, StatusCode> {
    match state.sessions.get(&id) {
        Some(session) => Ok(Json(SessionInfo {
            id: session.id().to_string(),
            message_count: session.message_count(),
            age_secs: session.age().as_secs(),
            chat: session.snapshot(),
        })),
        None => Err(StatusCode::NOT_FOUND),
    }
}

/// GET /api/sessions/:id/messages - Get session messages.
async fn api_get_messages(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Vec<ChatMessage>>, StatusCode> {
    state
        .sessions
        .get(&id)
        .map(|session| Json(session.messages()))
        .ok_or(StatusCode::NOT_FOUND)
}
