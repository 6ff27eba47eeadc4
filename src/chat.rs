//! Chat service: one assistant reply per call.
//!
//! [`ChatService`] starts a completion for a conversation, wires a fresh
//! [`ToolExecutor`] into a [`ChunkPipeline`] and hands back the frame stream.
//! The HTTP endpoint forwards those frames to the client as they come;
//! [`ChatService::reply_into`] decodes them back into a [`Session`] for the
//! server-rendered page.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures::StreamExt;
use uuid::Uuid;

use crate::error::Result;
use crate::llm::{LlmDriver, LlmRequest, Message};
use crate::protocol::{DataStreamPart, StreamFormat, parse_frame};
use crate::session::Session;
use crate::stream::{ChunkPipeline, FrameStream};
use crate::tools::{ToolExecutor, tool_schemas};

/// Per-reply settings.
#[derive(Debug, Clone, Copy)]
pub struct ChatOptions {
    /// Nesting limit for tool follow-up completions.
    pub max_recursion_depth: usize,
    /// Simulated duration of each tool call.
    pub tool_latency: Duration,
}

impl Default for ChatOptions {
    fn default() -> Self {
        Self {
            max_recursion_depth: crate::stream::DEFAULT_MAX_RECURSION_DEPTH,
            tool_latency: Duration::from_secs(2),
        }
    }
}

/// Produces assistant replies with tool support.
#[derive(Clone)]
pub struct ChatService {
    driver: Arc<dyn LlmDriver>,
    options: ChatOptions,
}

impl std::fmt::Debug for ChatService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatService")
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

impl ChatService {
    /// Create a service on top of `driver`.
    pub fn new(driver: Arc<dyn LlmDriver>, options: ChatOptions) -> Self {
        Self { driver, options }
    }

    /// Start a reply to `messages` and return its frames in `format`.
    ///
    /// # Errors
    ///
    /// Fails if the first completion cannot be started. Later failures
    /// arrive as `Err` items on the stream.
    pub async fn stream_reply(&self, messages: Vec<Message>, format: StreamFormat) -> Result<FrameStream> {
        let request_id = Uuid::new_v4().to_string();
        let tools = tool_schemas();

        tracing::info!(
            request_id = %request_id,
            message_count = messages.len(),
            tool_count = tools.len(),
            "Starting chat reply"
        );

        let conversation = Arc::new(Mutex::new(messages.clone()));
        let executor = ToolExecutor::new(
            Arc::clone(&self.driver),
            conversation,
            self.options.tool_latency,
        );

        let first = self.driver.stream(LlmRequest { messages, tools }).await?;

        let pipeline = ChunkPipeline::new()
            .with_format(format)
            .with_handler(Arc::new(executor))
            .with_max_recursion_depth(self.options.max_recursion_depth);

        Ok(pipeline.run(first))
    }

    /// Stream a reply to `messages` straight into `session`.
    ///
    /// Failures are recorded as the session error rather than returned.
    pub async fn reply_into(&self, session: &Session, messages: Vec<Message>) {
        let mut frames = match self.stream_reply(messages, StreamFormat::AiSdk).await {
            Ok(frames) => frames,
            Err(e) => {
                tracing::error!(session_id = %session.id(), error = %e, "Failed to start reply");
                session.apply_part(DataStreamPart::Error(e.to_string()));
                return;
            }
        };

        let mut frame_count = 0usize;
        while let Some(frame) = frames.next().await {
            let part = frame.and_then(|f| parse_frame(&f));
            match part {
                Ok(part) => {
                    frame_count += 1;
                    session.apply_part(part);
                }
                Err(e) => {
                    tracing::error!(session_id = %session.id(), error = %e, "Reply stream failed");
                    session.apply_part(DataStreamPart::Error(e.to_string()));
                    break;
                }
            }
        }

        tracing::info!(
            session_id = %session.id(),
            frame_count,
            message_count = session.message_count(),
            "Reply applied to session"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::{ChatCompletionChunk, FinishReason, ScriptedDriver};
    use crate::session::{ChatRole, SessionStore};
    use serde_json::json;

    fn options() -> ChatOptions {
        ChatOptions {
            tool_latency: Duration::ZERO,
            ..ChatOptions::default()
        }
    }

    #[tokio::test]
    async fn test_reply_into_session_with_tool_round() {
        let driver = Arc::new(ScriptedDriver::new([
            vec![
                ChatCompletionChunk::tool_call_start(0, "call_1", "calculate_sum"),
                ChatCompletionChunk::tool_call_arguments(0, "{\"a\":40,\"b\":2}"),
                ChatCompletionChunk::finish(FinishReason::ToolCalls),
            ],
            vec![
                ChatCompletionChunk::text("40+2 is "),
                ChatCompletionChunk::text("42."),
                ChatCompletionChunk::finish(FinishReason::Stop),
            ],
        ]));
        let service = ChatService::new(driver.clone(), options());

        let session = SessionStore::default().create();
        session.handle_input_change("What is 40+2?");
        let conversation = session.handle_submit().unwrap();
        service.reply_into(&session, conversation).await;

        let snapshot = session.snapshot();
        assert_eq!(snapshot.messages.len(), 2);
        assert_eq!(snapshot.messages[1].role, ChatRole::Assistant);
        assert_eq!(snapshot.messages[1].content, "40+2 is 42.");
        assert_eq!(snapshot.data[1], json!({"status": "done", "result": 42}));
        assert!(snapshot.error.is_none());
        assert_eq!(driver.call_count(), 2);
    }

    #[tokio::test]
    async fn test_reply_into_records_start_failure() {
        let service = ChatService::new(Arc::new(ScriptedDriver::default()), options());
        let session = SessionStore::default().create();

        service.reply_into(&session, vec![Message::user("hi")]).await;

        assert!(session.snapshot().error.unwrap().contains("no scripted response"));
    }

    #[tokio::test]
    async fn test_stream_reply_human_readable() {
        let driver = Arc::new(ScriptedDriver::new([vec![ChatCompletionChunk::text("Hello")]]));
        let service = ChatService::new(driver, options());

        let frames: Vec<String> = service
            .stream_reply(vec![Message::user("hi")], StreamFormat::HumanReadable)
            .await
            .unwrap()
            .map(Result::unwrap)
            .collect()
            .await;

        assert_eq!(frames, vec!["Hello"]);
    }
}
