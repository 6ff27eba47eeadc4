//! Chunk-to-frame pipeline with tool-call callbacks.
//!
//! [`ChunkPipeline`] reads a stream of [`ChatCompletionChunk`]s and produces
//! protocol frames:
//! 1. Text deltas become text frames
//! 2. Tool-call fragments are merged per index
//! 3. New tool calls are announced to the [`ToolCallHandler`]
//! 4. On `finish_reason == tool_calls` the handler executes the calls
//! 5. Handler output is either data (framed on the data channel) or a new
//!    chunk stream, which is processed recursively one level deeper
//!
//! # Example
//!
//! ```rust
//! use aisdk_stream::llm::ChatCompletionChunk;
//! use aisdk_stream::stream::ChunkPipeline;
//! use futures::StreamExt;
//!
//! # tokio::runtime::Runtime::new().unwrap().block_on(async {
//! let chunks = futures::stream::iter(vec![Ok(ChatCompletionChunk::text("Hi"))]);
//! let frames: Vec<String> = ChunkPipeline::new()
//!     .run(Box::pin(chunks))
//!     .map(Result::unwrap)
//!     .collect()
//!     .await;
//! assert_eq!(frames, vec!["0:\"Hi\"\n"]);
//! # });
//! ```

pub mod assemble;

pub use assemble::{create_tool_calls_message, create_tool_result_message, merge_tool_call_delta};

use std::pin::Pin;
use std::sync::Arc;

use futures::{Stream, StreamExt};
use serde_json::Value;

use crate::error::{Error, Result};
use crate::llm::{ChatCompletionChunk, Choice, ChoiceDeltaToolCall, ChunkStream, FinishReason};
use crate::protocol::{ResponseChannel, StreamFormat};

/// Default limit for nested callback streams.
pub const DEFAULT_MAX_RECURSION_DEPTH: usize = 5;

/// Stream of rendered frames.
pub type FrameStream = Pin<Box<dyn Stream<Item = Result<String>> + Send>>;

/// Stream returned by tool-call callbacks.
pub type CallbackStream = Pin<Box<dyn Stream<Item = Result<CallbackItem>> + Send>>;

/// Selects the choice to follow from a chunk.
pub type ChoicePicker = Arc<dyn Fn(&[Choice]) -> Option<Choice> + Send + Sync>;

/// Output of a tool-call callback.
pub enum CallbackItem {
    /// Structured data forwarded on the data channel.
    Data(Value),
    /// A follow-up completion whose chunks are processed recursively.
    Stream(ChunkStream),
}

impl std::fmt::Debug for CallbackItem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Data(v) => f.debug_tuple("Data").field(v).finish(),
            Self::Stream(_) => f.write_str("Stream(..)"),
        }
    }
}

/// First fragment of a tool call, as seen by [`ToolCallHandler::on_tool_call_received`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolCallReceived {
    /// Index of the call within the assistant turn.
    pub index: usize,
    /// Tool call id.
    pub id: String,
    /// Name of the function being called.
    pub function_name: String,
}

/// Callbacks invoked while a completion streams.
pub trait ToolCallHandler: Send + Sync {
    /// A new tool call started streaming. The default emits nothing.
    fn on_tool_call_received(&self, _call: ToolCallReceived) -> Option<CallbackStream> {
        None
    }

    /// The model finished with tool calls; run them.
    fn execute_tool_calls(&self, tool_calls: Vec<ChoiceDeltaToolCall>) -> CallbackStream;
}

/// Converts chunk streams into frame streams.
#[derive(Clone)]
pub struct ChunkPipeline {
    pick: ChoicePicker,
    format: StreamFormat,
    handler: Option<Arc<dyn ToolCallHandler>>,
    max_recursion_depth: usize,
}

impl std::fmt::Debug for ChunkPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChunkPipeline")
            .field("format", &self.format)
            .field("has_handler", &self.handler.is_some())
            .field("max_recursion_depth", &self.max_recursion_depth)
            .finish_non_exhaustive()
    }
}

impl Default for ChunkPipeline {
    fn default() -> Self {
        Self::new()
    }
}

impl ChunkPipeline {
    /// Pipeline following the first choice, in AI SDK format, without tools.
    #[must_use]
    pub fn new() -> Self {
        Self {
            pick: Arc::new(|choices: &[Choice]| choices.first().cloned()),
            format: StreamFormat::AiSdk,
            handler: None,
            max_recursion_depth: DEFAULT_MAX_RECURSION_DEPTH,
        }
    }

    /// Use a custom choice picker.
    #[must_use]
    pub fn with_picker(mut self, pick: ChoicePicker) -> Self {
        self.pick = pick;
        self
    }

    /// Set the output format.
    #[must_use]
    pub fn with_format(mut self, format: StreamFormat) -> Self {
        self.format = format;
        self
    }

    /// Set the tool-call handler.
    #[must_use]
    pub fn with_handler(mut self, handler: Arc<dyn ToolCallHandler>) -> Self {
        self.handler = Some(handler);
        self
    }

    /// Set the nesting limit for callback streams.
    #[must_use]
    pub fn with_max_recursion_depth(mut self, depth: usize) -> Self {
        self.max_recursion_depth = depth;
        self
    }

    /// Run the pipeline over `chunks`.
    pub fn run(&self, chunks: ChunkStream) -> FrameStream {
        self.run_at_depth(chunks, 0)
    }

    fn run_at_depth(&self, chunks: ChunkStream, depth: usize) -> FrameStream {
        let this = self.clone();

        Box::pin(async_stream::try_stream! {
            if depth >= this.max_recursion_depth {
                tracing::error!(depth, max = this.max_recursion_depth, "Callback recursion limit hit");
                Err::<(), _>(Error::RecursionLimit { max: this.max_recursion_depth })?;
            }

            let mut tool_calls: Vec<Option<ChoiceDeltaToolCall>> = Vec::new();
            let mut finish_reason: Option<FinishReason> = None;
            let mut chunks = chunks;

            while let Some(chunk) = chunks.next().await {
                let chunk: ChatCompletionChunk = chunk?;
                let Some(choice) = (this.pick)(chunk.choices.as_slice()) else {
                    tracing::trace!(depth, "Chunk without a usable choice");
                    continue;
                };

                if choice.finish_reason.is_some() {
                    finish_reason = choice.finish_reason;
                }

                let Some(delta) = choice.delta else {
                    break;
                };

                if let Some(text) = delta.content.filter(|c| !c.is_empty()) {
                    yield this.format.frame(ResponseChannel::Text, &Value::String(text));
                } else if let Some(deltas) = delta.tool_calls {
                    for dtc in deltas {
                        let idx = dtc.index;
                        if tool_calls.len() <= idx {
                            tool_calls.resize(idx + 1, None);
                        }

                        if let Some(existing) = tool_calls[idx].as_mut() {
                            merge_tool_call_delta(existing, &dtc)?;
                            continue;
                        }

                        let announced = match &this.handler {
                            Some(handler) => {
                                let received = ToolCallReceived {
                                    index: idx,
                                    id: dtc.id.clone().ok_or(Error::MalformedToolCall("initial tool call without id"))?,
                                    function_name: dtc
                                        .function_name()
                                        .ok_or(Error::MalformedToolCall("initial tool call without function name"))?
                                        .to_string(),
                                };
                                tracing::debug!(
                                    depth,
                                    index = idx,
                                    tool_id = %received.id,
                                    tool_name = %received.function_name,
                                    "Tool call received"
                                );
                                handler.on_tool_call_received(received)
                            }
                            None => None,
                        };
                        tool_calls[idx] = Some(dtc);

                        if let Some(callback) = announced {
                            let mut frames = this.drain_callback(callback, depth);
                            while let Some(frame) = frames.next().await {
                                yield frame?;
                            }
                        }
                    }
                }
            }

            if finish_reason == Some(FinishReason::ToolCalls) {
                let handler = this.handler.clone().ok_or(Error::MissingToolExecutor)?;
                let calls: Vec<ChoiceDeltaToolCall> = tool_calls.into_iter().flatten().collect();
                tracing::info!(depth, tool_call_count = calls.len(), "Executing tool calls");

                let mut frames = this.drain_callback(handler.execute_tool_calls(calls), depth);
                while let Some(frame) = frames.next().await {
                    yield frame?;
                }
            }
        })
    }

    /// Forward callback output: data is framed, nested streams recurse.
    fn drain_callback(&self, callback: CallbackStream, depth: usize) -> FrameStream {
        let this = self.clone();

        Box::pin(async_stream::try_stream! {
            let mut callback = callback;
            while let Some(item) = callback.next().await {
                match item? {
                    CallbackItem::Data(value) => {
                        let payload = match value {
                            Value::Array(_) => value,
                            other => Value::Array(vec![other]),
                        };
                        yield this.format.frame(ResponseChannel::Data, &payload);
                    }
                    CallbackItem::Stream(chunks) => {
                        let mut frames = this.run_at_depth(chunks, depth + 1);
                        while let Some(frame) = frames.next().await {
                            yield frame?;
                        }
                    }
                }
            }
        })
    }
}
