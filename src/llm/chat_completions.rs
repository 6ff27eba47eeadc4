//! OpenAI Chat Completions API driver.
//!
//! This module implements the [`LlmDriver`] trait for the OpenAI Chat Completions
//! API (`/v1/chat/completions`), decoding the server-sent event body into
//! [`ChatCompletionChunk`]s.

use futures::StreamExt;

use crate::error::{Error, Result};

use super::{ChatCompletionChunk, ChunkStream, LlmDriver, LlmRequest, LlmSettings};

/// Driver for the OpenAI Chat Completions API.
#[derive(Clone)]
pub struct ChatCompletionsDriver {
    http: reqwest::Client,
    settings: LlmSettings,
}

impl std::fmt::Debug for ChatCompletionsDriver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatCompletionsDriver")
            .field("settings", &self.settings)
            .finish()
    }
}

impl ChatCompletionsDriver {
    /// Create a new Chat Completions driver with the given settings.
    #[must_use]
    pub fn new(settings: LlmSettings) -> Self {
        Self {
            http: reqwest::Client::new(),
            settings,
        }
    }

    /// Request body for a streamed completion.
    fn request_body(&self, req: &LlmRequest) -> serde_json::Value {
        let mut body = serde_json::json!({
            "model": self.settings.model,
            "stream": true,
            "messages": req.messages,
        });
        if !req.tools.is_empty() {
            body["tools"] = serde_json::Value::Array(req.tools.clone());
            body["tool_choice"] = serde_json::Value::String("auto".to_string());
        }
        body
    }
}

#[async_trait::async_trait]
impl LlmDriver for ChatCompletionsDriver {
    async fn stream(&self, req: LlmRequest) -> Result<ChunkStream> {
        let url = self.settings.provider.build_chat_url(&self.settings.base_url);
        let body = self.request_body(&req);

        tracing::debug!(
            url = %url,
            message_count = req.messages.len(),
            tool_count = req.tools.len(),
            "Sending chat completion request"
        );

        let mut rb = self.http.post(&url).json(&body);
        if let Some(k) = &self.settings.api_key {
            rb = self.settings.provider.authorize(rb, k);
        }

        let resp = rb.send().await?;
        let status = resp.status();
        if !status.is_success() {
            let message = resp.text().await.unwrap_or_default();
            tracing::error!(status = %status, body = %message, "Provider rejected request");
            return Err(Error::Upstream {
                status: status.as_u16(),
                message,
            });
        }

        let byte_stream = resp.bytes_stream();

        let out = async_stream::try_stream! {
            let mut buf = Vec::<u8>::new();
            let mut done = false;

            futures::pin_mut!(byte_stream);
            'read: while let Some(bytes) = byte_stream.next().await {
                // CRLF and LF framing are both valid SSE.
                buf.extend(bytes?.iter().filter(|b| **b != b'\r'));

                while let Some(pos) = find_double_newline(&buf) {
                    let frame = buf.drain(..pos + 2).collect::<Vec<_>>();
                    let (chunks, finished) = decode_frame(&frame)?;
                    for chunk in chunks {
                        yield chunk;
                    }
                    if finished {
                        done = true;
                        break 'read;
                    }
                }
            }

            // A last frame may end at EOF without the blank line.
            if !done && !buf.is_empty() {
                let (chunks, _) = decode_frame(&buf)?;
                for chunk in chunks {
                    yield chunk;
                }
            }
        };

        Ok(Box::pin(out))
    }
}

/// Find the position of a double newline in the buffer.
fn find_double_newline(buf: &[u8]) -> Option<usize> {
    buf.windows(2).position(|w| w == b"\n\n")
}

/// Chunks carried by one SSE frame, and whether it held `[DONE]`.
fn decode_frame(frame: &[u8]) -> Result<(Vec<ChatCompletionChunk>, bool)> {
    let text = String::from_utf8_lossy(frame);
    let mut chunks = Vec::new();
    for data in sse_data_lines(&text) {
        if data == "[DONE]" {
            return Ok((chunks, true));
        }
        chunks.push(serde_json::from_str(data)?);
    }
    Ok((chunks, false))
}

/// Payloads of the `data:` lines in one SSE frame.
fn sse_data_lines(frame: &str) -> impl Iterator<Item = &str> {
    frame
        .lines()
        .map(str::trim)
        .filter_map(|line| line.strip_prefix("data:"))
        .map(str::trim)
        .filter(|data| !data.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::{Message, Provider};
    use axum::{Router, http::StatusCode, routing::post};

    fn driver() -> ChatCompletionsDriver {
        ChatCompletionsDriver::new(LlmSettings {
            base_url: "https://api.openai.com".to_string(),
            api_key: None,
            model: "gpt-3.5-turbo-1106".to_string(),
            provider: Provider::OpenAI,
        })
    }

    #[test]
    fn test_request_body_without_tools() {
        let body = driver().request_body(&LlmRequest {
            messages: vec![Message::user("hi")],
            tools: Vec::new(),
        });
        assert_eq!(body["stream"], true);
        assert!(body.get("tools").is_none());
        assert!(body.get("tool_choice").is_none());
    }

    #[test]
    fn test_request_body_with_tools() {
        let body = driver().request_body(&LlmRequest {
            messages: vec![Message::user("hi")],
            tools: vec![serde_json::json!({"type": "function"})],
        });
        assert_eq!(body["tool_choice"], "auto");
        assert_eq!(body["tools"].as_array().map(Vec::len), Some(1));
    }

    const HELLO: &str = r#"{"id":"c1","choices":[{"index":0,"delta":{"content":"Hello"},"finish_reason":null}]}"#;

    /// Serve `body` with `status` from a local chat completions endpoint.
    async fn serve(status: StatusCode, body: String) -> String {
        let app = Router::new().route(
            "/v1/chat/completions",
            post(move || async move { (status, body) }),
        );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{addr}")
    }

    fn local_driver(base_url: String) -> ChatCompletionsDriver {
        ChatCompletionsDriver::new(LlmSettings {
            base_url,
            api_key: Some("sk-test".to_string()),
            model: "gpt-3.5-turbo-1106".to_string(),
            provider: Provider::Generic,
        })
    }

    async fn contents(status: StatusCode, body: String) -> Vec<String> {
        let driver = local_driver(serve(status, body).await);
        driver
            .stream(LlmRequest {
                messages: vec![Message::user("hi")],
                tools: Vec::new(),
            })
            .await
            .unwrap()
            .map(|chunk| {
                let chunk = chunk.unwrap();
                chunk.choices[0]
                    .delta
                    .as_ref()
                    .and_then(|d| d.content.clone())
                    .unwrap_or_default()
            })
            .collect()
            .await
    }

    #[tokio::test]
    async fn test_stream_lf_frames_until_done() {
        let body = format!("data: {HELLO}\n\ndata: [DONE]\n\ndata: {HELLO}\n\n");
        assert_eq!(contents(StatusCode::OK, body).await, vec!["Hello"]);
    }

    #[tokio::test]
    async fn test_stream_crlf_frames() {
        let body = format!("data: {HELLO}\r\n\r\ndata: {HELLO}\r\n\r\ndata: [DONE]\r\n\r\n");
        assert_eq!(contents(StatusCode::OK, body).await, vec!["Hello", "Hello"]);
    }

    #[tokio::test]
    async fn test_stream_flushes_unterminated_last_frame() {
        let body = format!("data: {HELLO}\n");
        assert_eq!(contents(StatusCode::OK, body).await, vec!["Hello"]);
    }

    #[tokio::test]
    async fn test_stream_rejects_non_success_status() {
        let driver = local_driver(serve(StatusCode::UNAUTHORIZED, "bad key".to_string()).await);
        let result = driver
            .stream(LlmRequest {
                messages: vec![Message::user("hi")],
                tools: Vec::new(),
            })
            .await;

        match result {
            Err(Error::Upstream { status, message }) => {
                assert_eq!(status, 401);
                assert_eq!(message, "bad key");
            }
            Err(other) => panic!("unexpected error: {other}"),
            Ok(_) => panic!("expected an upstream error"),
        }
    }

    #[test]
    fn test_decode_frame_stops_at_done() {
        let frame = format!("data: {HELLO}\ndata: [DONE]\n\n");
        let (chunks, finished) = decode_frame(frame.as_bytes()).unwrap();
        assert_eq!(chunks.len(), 1);
        assert!(finished);
    }

    #[test]
    fn test_sse_data_lines() {
        let frame = ": keep-alive\ndata: {\"a\":1}\n\n";
        let lines: Vec<&str> = sse_data_lines(frame).collect();
        assert_eq!(lines, vec!["{\"a\":1}"]);
    }
}
