//! AI SDK data-stream protocol.
//!
//! The chat endpoint answers with a line-oriented stream. Every frame is
//! `"{code}:{json}\n"` where the code selects the channel:
//!
//! | code | channel | payload                 |
//! |------|---------|-------------------------|
//! | `0`  | text    | JSON string (token)     |
//! | `2`  | data    | JSON array of values    |
//! | `3`  | error   | JSON string (message)   |
//!
//! A human-readable variant prints text verbatim and data as one JSON
//! document per line, which is what the terminal mode uses.
//!
//! # Example
//!
//! ```rust
//! use aisdk_stream::protocol::{DataStreamPart, ResponseChannel, StreamFormat, parse_frame};
//!
//! let frame = StreamFormat::AiSdk.frame(ResponseChannel::Text, &"Hello".into());
//! assert_eq!(frame, "0:\"Hello\"\n");
//! assert_eq!(parse_frame(&frame).unwrap(), DataStreamPart::Text("Hello".to_string()));
//! ```

use serde_json::Value;

use crate::error::{Error, Result};

/// Output channel of a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ResponseChannel {
    /// Assistant text tokens.
    Text = 0,
    /// Structured side data (tool status and results).
    Data = 2,
    /// Terminal error message.
    Error = 3,
}

impl ResponseChannel {
    /// Wire code of the channel.
    #[must_use]
    pub fn code(self) -> u8 {
        self as u8
    }
}

/// How frames are rendered.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum StreamFormat {
    /// `{code}:{json}\n`, understood by the AI SDK `useChat` hook.
    #[default]
    AiSdk,
    /// Plain text for terminals.
    HumanReadable,
}

impl StreamFormat {
    /// Render one frame.
    #[must_use]
    pub fn frame(self, channel: ResponseChannel, content: &Value) -> String {
        match self {
            Self::AiSdk => format!("{}:{}\n", channel.code(), content),
            Self::HumanReadable => match (channel, content) {
                (ResponseChannel::Text, Value::String(text)) => text.clone(),
                _ => format!("{content}\n"),
            },
        }
    }
}

/// A decoded frame of the AI SDK format.
#[derive(Debug, Clone, PartialEq)]
pub enum DataStreamPart {
    /// Text token to append to the assistant message.
    Text(String),
    /// Data items to append to the auxiliary payload.
    Data(Vec<Value>),
    /// Error reported by the server.
    Error(String),
}

/// Parse a single AI SDK frame. A trailing newline is ignored.
pub fn parse_frame(line: &str) -> Result<DataStreamPart> {
    let line = line.trim_end_matches(['\r', '\n']);
    let (code, payload) = line
        .split_once(':')
        .ok_or_else(|| Error::Protocol(format!("missing channel prefix in {line:?}")))?;

    let value: Value = serde_json::from_str(payload)?;
    match (code, value) {
        ("0", Value::String(text)) => Ok(DataStreamPart::Text(text)),
        ("2", Value::Array(items)) => Ok(DataStreamPart::Data(items)),
        ("3", Value::String(message)) => Ok(DataStreamPart::Error(message)),
        (code, value) => Err(Error::Protocol(format!(
            "unexpected payload {value} for channel {code}"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_ai_sdk_frames() {
        let text = StreamFormat::AiSdk.frame(ResponseChannel::Text, &json!("a \"b\"\n"));
        assert_eq!(text, "0:\"a \\\"b\\\"\\n\"\n");

        let data = StreamFormat::AiSdk.frame(ResponseChannel::Data, &json!([{"status": "done"}]));
        assert_eq!(data, "2:[{\"status\":\"done\"}]\n");
    }

    #[test]
    fn test_human_readable_frames() {
        let text = StreamFormat::HumanReadable.frame(ResponseChannel::Text, &json!("Hi"));
        assert_eq!(text, "Hi");

        let data = StreamFormat::HumanReadable.frame(ResponseChannel::Data, &json!([1]));
        assert_eq!(data, "[1]\n");
    }

    #[test]
    fn test_parse_data_frame() {
        let part = parse_frame("2:[{\"status\":\"pending\"},3]\n").unwrap();
        assert_eq!(part, DataStreamPart::Data(vec![json!({"status": "pending"}), json!(3)]));
    }

    #[test]
    fn test_parse_rejects_unknown_channel() {
        assert!(matches!(parse_frame("9:\"x\""), Err(Error::Protocol(_))));
        assert!(matches!(parse_frame("no prefix"), Err(Error::Protocol(_))));
        assert!(matches!(parse_frame("0:{"), Err(Error::Json(_))));
    }

    #[test]
    fn test_parse_error_frame() {
        let part = parse_frame("3:\"boom\"").unwrap();
        assert_eq!(part, DataStreamPart::Error("boom".to_string()));
    }
}
