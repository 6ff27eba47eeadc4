//! Demo tools and their executor.
//!
//! Three function tools are offered to the model: `search_web`,
//! `search_library` and `calculate_sum`. Execution is simulated: each tool
//! reports a `pending` status, waits for the configured latency, then
//! reports `done` with a canned or computed result.
//!
//! Status updates go out on the data channel so the page can show progress
//! while the tool runs; results are appended to the shared conversation,
//! which is then sent back to the model for the final answer.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde_json::{Value, json};

use crate::error::{Error, Result};
use crate::llm::{ChoiceDeltaToolCall, LlmDriver, LlmRequest, Message};
use crate::stream::{
    CallbackItem, CallbackStream, ToolCallHandler, create_tool_calls_message,
    create_tool_result_message,
};

/// `OpenAI` function schemas for the demo tools.
#[must_use]
pub fn tool_schemas() -> Vec<Value> {
    let query = json!({
        "type": "object",
        "properties": {
            "query": {"type": "string", "description": "The query to search for"}
        },
        "required": ["query"]
    });

    vec![
        json!({
            "type": "function",
            "function": {
                "name": "search_web",
                "parameters": query,
                "description": "Search the web for the given query"
            }
        }),
        json!({
            "type": "function",
            "function": {
                "name": "search_library",
                "parameters": query,
                "description": "Search the library for the given query"
            }
        }),
        json!({
            "type": "function",
            "function": {
                "name": "calculate_sum",
                "parameters": {
                    "type": "object",
                    "properties": {
                        "a": {"type": "number", "description": "The first number to add"},
                        "b": {"type": "number", "description": "The second number to add"}
                    },
                    "required": ["a", "b"]
                },
                "description": "Calculate the sum of two numbers"
            }
        }),
    ]
}

/// Runs the demo tools against a shared conversation.
#[derive(Clone)]
pub struct ToolExecutor {
    driver: Arc<dyn LlmDriver>,
    conversation: Arc<Mutex<Vec<Message>>>,
    latency: Duration,
}

impl std::fmt::Debug for ToolExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolExecutor")
            .field("latency", &self.latency)
            .field("conversation_len", &self.conversation().len())
            .finish_non_exhaustive()
    }
}

impl ToolExecutor {
    /// Create an executor; `conversation` is extended as tools run.
    pub fn new(
        driver: Arc<dyn LlmDriver>,
        conversation: Arc<Mutex<Vec<Message>>>,
        latency: Duration,
    ) -> Self {
        Self {
            driver,
            conversation,
            latency,
        }
    }

    /// Snapshot of the conversation so far.
    #[must_use]
    pub fn conversation(&self) -> Vec<Message> {
        self.conversation.lock().unwrap().clone()
    }

    fn push(&self, message: Message) {
        self.conversation.lock().unwrap().push(message);
    }

    /// Ask the model again with the updated conversation and tools.
    pub async fn follow_up(&self) -> Result<CallbackItem> {
        let req = LlmRequest {
            messages: self.conversation(),
            tools: tool_schemas(),
        };
        Ok(CallbackItem::Stream(self.driver.stream(req).await?))
    }
}

/// Canned answer for the search tools.
fn search_answer(name: &str) -> Option<(&'static str, &'static str)> {
    match name {
        "search_web" => Some(("Searching the web...", "The meaning of life is 42")),
        "search_library" => Some(("Searching the library...", "The meaning of life is 43")),
        _ => None,
    }
}

/// Sum two JSON numbers, staying integral when both are integers.
fn sum_arguments(arguments: &str) -> Result<Value> {
    let args: Value = serde_json::from_str(arguments)?;
    let (a, b) = (&args["a"], &args["b"]);

    if let (Some(a), Some(b)) = (a.as_i64(), b.as_i64())
        && let Some(sum) = a.checked_add(b)
    {
        return Ok(json!(sum));
    }
    match (a.as_f64(), b.as_f64()) {
        (Some(a), Some(b)) => Ok(json!(a + b)),
        _ => Err(Error::MalformedToolCall("calculate_sum needs numeric a and b")),
    }
}

impl ToolCallHandler for ToolExecutor {
    fn execute_tool_calls(&self, tool_calls: Vec<ChoiceDeltaToolCall>) -> CallbackStream {
        let this = self.clone();

        Box::pin(async_stream::try_stream! {
            this.push(create_tool_calls_message(&tool_calls)?);

            for tc in &tool_calls {
                let name = tc.function_name().unwrap_or_default();
                tracing::info!(tool_id = ?tc.id, tool_name = %name, "Executing tool call");

                if let Some((pending, answer)) = search_answer(name) {
                    yield CallbackItem::Data(json!({"status": "pending", "message": pending}));
                    tokio::time::sleep(this.latency).await;

                    yield CallbackItem::Data(json!({"status": "done", "result": answer}));
                    this.push(create_tool_result_message(tc, &json!(answer))?);
                } else if name == "calculate_sum" {
                    let arguments = tc.arguments().unwrap_or_default();
                    if arguments.is_empty() {
                        let status = json!({"status": "error", "message": "No arguments provided"});
                        tracing::warn!(tool_id = ?tc.id, "calculate_sum called without arguments");
                        yield CallbackItem::Data(status.clone());
                        this.push(create_tool_result_message(tc, &status)?);
                        continue;
                    }

                    yield CallbackItem::Data(json!({"status": "pending", "message": "Calculating the sum..."}));
                    tokio::time::sleep(this.latency).await;

                    let sum = sum_arguments(arguments)?;
                    let status = json!({"status": "done", "result": sum});
                    yield CallbackItem::Data(status.clone());
                    this.push(create_tool_result_message(tc, &status)?);
                } else {
                    tracing::error!(tool_name = %name, "Model called an unknown tool");
                    Err::<(), _>(Error::UnknownTool(name.to_string()))?;
                }
            }

            yield this.follow_up().await?;
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::{ChatCompletionChunk, MessageRole, ScriptedDriver};
    use futures::StreamExt;

    fn call(index: usize, id: &str, name: &str, args: &str) -> ChoiceDeltaToolCall {
        let mut chunk = ChatCompletionChunk::tool_call_start(index, id, name);
        let mut delta = chunk.choices.remove(0).delta.unwrap();
        let mut tc = delta.tool_calls.take().unwrap().remove(0);
        if let Some(f) = tc.function.as_mut() {
            f.arguments = Some(args.to_string());
        }
        tc
    }

    fn executor(driver: Arc<ScriptedDriver>) -> ToolExecutor {
        ToolExecutor::new(
            driver,
            Arc::new(Mutex::new(vec![Message::user("What is 40+2?")])),
            Duration::ZERO,
        )
    }

    fn data(items: &[Result<CallbackItem>]) -> Vec<Value> {
        items
            .iter()
            .filter_map(|item| match item {
                Ok(CallbackItem::Data(v)) => Some(v.clone()),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_schemas_cover_all_tools() {
        let names: Vec<String> = tool_schemas()
            .iter()
            .map(|t| t["function"]["name"].as_str().unwrap().to_string())
            .collect();
        assert_eq!(names, vec!["search_web", "search_library", "calculate_sum"]);
    }

    #[test]
    fn test_sum_arguments() {
        assert_eq!(sum_arguments("{\"a\": 40, \"b\": 2}").unwrap(), json!(42));
        assert_eq!(sum_arguments("{\"a\": 1.5, \"b\": 2}").unwrap(), json!(3.5));
        assert!(sum_arguments("{\"a\": \"x\", \"b\": 2}").is_err());
    }

    #[tokio::test]
    async fn test_calculate_sum_flow() {
        let driver = Arc::new(ScriptedDriver::new([vec![ChatCompletionChunk::text("42")]]));
        let exec = executor(driver.clone());

        let items: Vec<_> = exec
            .execute_tool_calls(vec![call(0, "call_1", "calculate_sum", "{\"a\":40,\"b\":2}")])
            .collect()
            .await;

        assert_eq!(
            data(&items),
            vec![
                json!({"status": "pending", "message": "Calculating the sum..."}),
                json!({"status": "done", "result": 42}),
            ]
        );
        assert!(matches!(items.last(), Some(Ok(CallbackItem::Stream(_)))));

        let conversation = exec.conversation();
        assert_eq!(conversation.len(), 3);
        assert_eq!(conversation[1].role, MessageRole::Assistant);
        assert_eq!(conversation[2].role, MessageRole::Tool);
        let result: Value = serde_json::from_str(&conversation[2].content).unwrap();
        assert_eq!(result, json!({"status": "done", "result": 42}));

        let requests = driver.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].messages, conversation);
    }

    #[tokio::test]
    async fn test_calculate_sum_without_arguments() {
        let driver = Arc::new(ScriptedDriver::new([vec![]]));
        let exec = executor(driver);

        let items: Vec<_> = exec
            .execute_tool_calls(vec![call(0, "call_1", "calculate_sum", "")])
            .collect()
            .await;

        assert_eq!(
            data(&items),
            vec![json!({"status": "error", "message": "No arguments provided"})]
        );
        assert_eq!(exec.conversation()[2].tool_call_id.as_deref(), Some("call_1"));
    }

    #[tokio::test]
    async fn test_search_tools_report_progress() {
        let driver = Arc::new(ScriptedDriver::new([vec![]]));
        let exec = executor(driver);

        let items: Vec<_> = exec
            .execute_tool_calls(vec![
                call(0, "call_1", "search_web", "{\"query\":\"meaning of life\"}"),
                call(1, "call_2", "search_library", "{\"query\":\"meaning of life\"}"),
            ])
            .collect()
            .await;

        let statuses = data(&items);
        assert_eq!(statuses.len(), 4);
        assert_eq!(statuses[1]["result"], "The meaning of life is 42");
        assert_eq!(statuses[3]["result"], "The meaning of life is 43");
        assert_eq!(exec.conversation()[2].content, "\"The meaning of life is 42\"");
    }

    #[tokio::test]
    async fn test_unknown_tool_fails() {
        let driver = Arc::new(ScriptedDriver::new([vec![]]));
        let exec = executor(driver.clone());

        let items: Vec<_> = exec
            .execute_tool_calls(vec![call(0, "call_1", "launch_rocket", "{}")])
            .collect()
            .await;

        assert!(matches!(items.last(), Some(Err(Error::UnknownTool(name))) if name == "launch_rocket"));
        assert_eq!(driver.call_count(), 0);
    }
}
