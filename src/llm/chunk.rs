//! Wire types for streamed chat completions.
//!
//! Only the fields the bridge reads are modelled; everything else in the
//! provider payload is ignored during deserialization.

use serde::{Deserialize, Serialize};

/// One `data:` event of a streamed chat completion.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChatCompletionChunk {
    /// Chunk identifier.
    #[serde(default)]
    pub id: String,
    /// Candidate choices; usually exactly one.
    #[serde(default)]
    pub choices: Vec<Choice>,
}

/// A streamed choice.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Choice {
    /// Index of the choice.
    #[serde(default)]
    pub index: usize,
    /// Incremental content.
    #[serde(default)]
    pub delta: Option<ChoiceDelta>,
    /// Set on the last chunk of the choice.
    #[serde(default)]
    pub finish_reason: Option<FinishReason>,
}

/// Why a choice stopped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FinishReason {
    Stop,
    Length,
    ToolCalls,
    ContentFilter,
    FunctionCall,
    #[serde(untagged)]
    Other(String),
}

/// Incremental message content.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChoiceDelta {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ChoiceDeltaToolCall>>,
}

/// Fragment of a tool call. The first fragment for an index carries the id
/// and function name, later ones only argument text.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChoiceDeltaToolCall {
    pub index: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub function: Option<ChoiceDeltaToolCallFunction>,
}

impl ChoiceDeltaToolCall {
    /// Function name, if present.
    #[must_use]
    pub fn function_name(&self) -> Option<&str> {
        self.function.as_ref()?.name.as_deref()
    }

    /// Accumulated argument text, if present.
    #[must_use]
    pub fn arguments(&self) -> Option<&str> {
        self.function.as_ref()?.arguments.as_deref()
    }
}

/// Function part of a tool-call fragment.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChoiceDeltaToolCallFunction {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub arguments: Option<String>,
}

impl ChatCompletionChunk {
    /// Chunk with a single text delta.
    #[must_use]
    pub fn text(content: impl Into<String>) -> Self {
        Self::with_delta(ChoiceDelta {
            content: Some(content.into()),
            ..ChoiceDelta::default()
        })
    }

    /// Chunk announcing a new tool call at `index`.
    #[must_use]
    pub fn tool_call_start(index: usize, id: impl Into<String>, name: impl Into<String>) -> Self {
        Self::with_delta(ChoiceDelta {
            tool_calls: Some(vec![ChoiceDeltaToolCall {
                index,
                id: Some(id.into()),
                function: Some(ChoiceDeltaToolCallFunction {
                    name: Some(name.into()),
                    arguments: Some(String::new()),
                }),
            }]),
            ..ChoiceDelta::default()
        })
    }

    /// Chunk carrying an argument fragment for the tool call at `index`.
    #[must_use]
    pub fn tool_call_arguments(index: usize, fragment: impl Into<String>) -> Self {
        Self::with_delta(ChoiceDelta {
            tool_calls: Some(vec![ChoiceDeltaToolCall {
                index,
                id: None,
                function: Some(ChoiceDeltaToolCallFunction {
                    name: None,
                    arguments: Some(fragment.into()),
                }),
            }]),
            ..ChoiceDelta::default()
        })
    }

    /// Final chunk of a choice with an empty delta.
    #[must_use]
    pub fn finish(reason: FinishReason) -> Self {
        Self {
            id: String::new(),
            choices: vec![Choice {
                index: 0,
                delta: Some(ChoiceDelta::default()),
                finish_reason: Some(reason),
            }],
        }
    }

    fn with_delta(delta: ChoiceDelta) -> Self {
        Self {
            id: String::new(),
            choices: vec![Choice {
                index: 0,
                delta: Some(delta),
                finish_reason: None,
            }],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deserialize_tool_call_chunk() {
        let raw = r#"{
            "id": "chatcmpl-1",
            "object": "chat.completion.chunk",
            "choices": [{
                "index": 0,
                "delta": {"tool_calls": [{"index": 1, "id": "call_a", "type": "function",
                          "function": {"name": "search_web", "arguments": ""}}]},
                "finish_reason": null
            }]
        }"#;
        let chunk: ChatCompletionChunk = serde_json::from_str(raw).unwrap();
        let call = &chunk.choices[0].delta.as_ref().unwrap().tool_calls.as_ref().unwrap()[0];
        assert_eq!(call.index, 1);
        assert_eq!(call.function_name(), Some("search_web"));
        assert!(chunk.choices[0].finish_reason.is_none());
    }

    #[test]
    fn test_finish_reason_variants() {
        let known: FinishReason = serde_json::from_str("\"tool_calls\"").unwrap();
        assert_eq!(known, FinishReason::ToolCalls);

        let other: FinishReason = serde_json::from_str("\"eos\"").unwrap();
        assert_eq!(other, FinishReason::Other("eos".to_string()));
    }
}
