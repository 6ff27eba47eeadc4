//! Tool-call assembly and follow-up message construction.

use serde_json::Value;

use crate::error::{Error, Result};
use crate::llm::{ChoiceDeltaToolCall, Message, MessageRole, ToolCall, ToolCallFunction};

/// Append the argument fragment of `delta` to `base`.
///
/// Fragments without argument text are no-ops.
pub fn merge_tool_call_delta(base: &mut ChoiceDeltaToolCall, delta: &ChoiceDeltaToolCall) -> Result<()> {
    let Some(fragment) = delta.arguments().filter(|a| !a.is_empty()) else {
        return Ok(());
    };
    let function = base
        .function
        .as_mut()
        .ok_or(Error::MalformedToolCall("fragment for a call without function"))?;
    function
        .arguments
        .get_or_insert_with(String::new)
        .push_str(fragment);
    Ok(())
}

/// Assistant message announcing the tool calls the model made.
///
/// Calls without id or function name are dropped; at least one must remain.
pub fn create_tool_calls_message(tool_calls: &[ChoiceDeltaToolCall]) -> Result<Message> {
    let calls: Vec<ToolCall> = tool_calls
        .iter()
        .filter_map(|tc| {
            let id = tc.id.clone()?;
            let name = tc.function_name()?.to_string();
            Some(ToolCall {
                id,
                call_type: "function".to_string(),
                function: ToolCallFunction {
                    name,
                    arguments: tc.arguments().unwrap_or_default().to_string(),
                },
            })
        })
        .collect();

    if calls.is_empty() {
        return Err(Error::MalformedToolCall(
            "no tool call carried both an id and a function name",
        ));
    }

    Ok(Message {
        role: MessageRole::Assistant,
        content: String::new(),
        tool_call_id: None,
        tool_calls: Some(calls),
    })
}

/// Tool message carrying the JSON-encoded `result` of `tool_call`.
pub fn create_tool_result_message(tool_call: &ChoiceDeltaToolCall, result: &Value) -> Result<Message> {
    let id = tool_call
        .id
        .clone()
        .ok_or(Error::MalformedToolCall("tool result for a call without id"))?;
    if result.is_null() {
        return Err(Error::MalformedToolCall("tool result is null"));
    }

    Ok(Message {
        role: MessageRole::Tool,
        content: serde_json::to_string(result)?,
        tool_call_id: Some(id),
        tool_calls: None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::ChoiceDeltaToolCallFunction;
    use serde_json::json;

    fn call(id: Option<&str>, name: Option<&str>, args: &str) -> ChoiceDeltaToolCall {
        ChoiceDeltaToolCall {
            index: 0,
            id: id.map(ToString::to_string),
            function: Some(ChoiceDeltaToolCallFunction {
                name: name.map(ToString::to_string),
                arguments: Some(args.to_string()),
            }),
        }
    }

    #[test]
    fn test_merge_appends_fragments() {
        let mut base = call(Some("call_1"), Some("calculate_sum"), "{\"a\":");
        merge_tool_call_delta(&mut base, &call(None, None, " 40, \"b\": 2}")).unwrap();
        merge_tool_call_delta(&mut base, &call(None, None, "")).unwrap();
        assert_eq!(base.arguments(), Some("{\"a\": 40, \"b\": 2}"));
    }

    #[test]
    fn test_merge_into_call_without_function_fails() {
        let mut base = ChoiceDeltaToolCall::default();
        let err = merge_tool_call_delta(&mut base, &call(None, None, "{}")).unwrap_err();
        assert!(matches!(err, Error::MalformedToolCall(_)));
    }

    #[test]
    fn test_tool_calls_message_filters_incomplete_calls() {
        let msg = create_tool_calls_message(&[
            call(Some("call_1"), Some("search_web"), "{\"query\":\"life\"}"),
            call(None, Some("search_library"), "{}"),
        ])
        .unwrap();

        assert_eq!(msg.role, MessageRole::Assistant);
        assert_eq!(msg.content, "");
        let calls = msg.tool_calls.unwrap();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].call_type, "function");
        assert_eq!(calls[0].function.arguments, "{\"query\":\"life\"}");
    }

    #[test]
    fn test_tool_calls_message_requires_one_call() {
        assert!(create_tool_calls_message(&[call(None, None, "")]).is_err());
    }

    #[test]
    fn test_tool_result_message_encodes_json() {
        let tc = call(Some("call_9"), Some("search_web"), "");
        let msg = create_tool_result_message(&tc, &json!("The meaning of life is 42")).unwrap();
        assert_eq!(msg.role, MessageRole::Tool);
        assert_eq!(msg.tool_call_id.as_deref(), Some("call_9"));
        assert_eq!(msg.content, "\"The meaning of life is 42\"");

        assert!(create_tool_result_message(&tc, &Value::Null).is_err());
    }
}
