//! Driver that replays canned chunk sequences.
//!
//! Each call to [`LlmDriver::stream`] pops the next script. Requests are
//! recorded so callers can assert on the conversation the bridge sent.

use std::collections::VecDeque;
use std::sync::Mutex;

use crate::error::{Error, Result};

use super::{ChatCompletionChunk, ChunkStream, LlmDriver, LlmRequest};

/// Offline [`LlmDriver`] backed by a queue of scripts.
#[derive(Debug, Default)]
pub struct ScriptedDriver {
    scripts: Mutex<VecDeque<Vec<ChatCompletionChunk>>>,
    requests: Mutex<Vec<LlmRequest>>,
}

impl ScriptedDriver {
    /// Create a driver that answers calls with `scripts`, in order.
    #[must_use]
    pub fn new(scripts: impl IntoIterator<Item = Vec<ChatCompletionChunk>>) -> Self {
        Self {
            scripts: Mutex::new(scripts.into_iter().collect()),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Number of completions requested so far.
    #[must_use]
    pub fn call_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    /// Requests received so far.
    #[must_use]
    pub fn requests(&self) -> Vec<LlmRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl LlmDriver for ScriptedDriver {
    async fn stream(&self, req: LlmRequest) -> Result<ChunkStream> {
        self.requests.lock().unwrap().push(req);
        let script = self
            .scripts
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| Error::Upstream {
                status: 503,
                message: "no scripted response left".to_string(),
            })?;

        Ok(Box::pin(futures::stream::iter(script.into_iter().map(Ok))))
    }
}
