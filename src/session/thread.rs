//! Chat session state and session storage.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::llm::Message;
use crate::protocol::DataStreamPart;

/// Default session timeout (30 minutes).
pub const DEFAULT_SESSION_TIMEOUT: Duration = Duration::from_secs(30 * 60);

/// Author of a displayed message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    User,
    Assistant,
}

/// A message as shown on the page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Unique message identifier.
    pub id: String,
    /// Who wrote it.
    pub role: ChatRole,
    /// Text content.
    pub content: String,
}

impl ChatMessage {
    fn new(role: ChatRole, content: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            role,
            content: content.into(),
        }
    }

    /// Convert to a provider message.
    #[must_use]
    pub fn to_llm(&self) -> Message {
        match self.role {
            ChatRole::User => Message::user(self.content.clone()),
            ChatRole::Assistant => Message::assistant(self.content.clone()),
        }
    }
}

/// Everything the page needs for one render.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ChatSnapshot {
    /// Messages in conversation order.
    pub messages: Vec<ChatMessage>,
    /// Current composer text.
    pub input: String,
    /// Auxiliary data received on the data channel.
    pub data: Vec<Value>,
    /// Last stream error, if any.
    pub error: Option<String>,
}

/// A single chat session.
///
/// Owns the conversation, the composer input and the auxiliary data, and
/// exposes the input-change and submit handlers the page forwards to.
/// Cloning yields another handle to the same session.
#[derive(Debug, Clone)]
pub struct Session {
    inner: Arc<SessionInner>,
}

#[derive(Debug)]
struct SessionInner {
    id: String,
    state: RwLock<ChatSnapshot>,
    system_prompt: Option<String>,
    created_at: DateTime<Utc>,
    last_activity: RwLock<DateTime<Utc>>,
}

impl Session {
    /// Create a new session with the given ID.
    fn new(id: String, system_prompt: Option<String>) -> Self {
        let now = Utc::now();
        Self {
            inner: Arc::new(SessionInner {
                id,
                state: RwLock::new(ChatSnapshot::default()),
                system_prompt,
                created_at: now,
                last_activity: RwLock::new(now),
            }),
        }
    }

    /// Get the session ID.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.inner.id
    }

    /// Current state, cloned.
    #[must_use]
    pub fn snapshot(&self) -> ChatSnapshot {
        self.inner.state.read().unwrap().clone()
    }

    /// Messages in conversation order.
    #[must_use]
    pub fn messages(&self) -> Vec<ChatMessage> {
        self.inner.state.read().unwrap().messages.clone()
    }

    /// Current composer text.
    #[must_use]
    pub fn input(&self) -> String {
        self.inner.state.read().unwrap().input.clone()
    }

    /// Auxiliary data received so far.
    #[must_use]
    pub fn data(&self) -> Vec<Value> {
        self.inner.state.read().unwrap().data.clone()
    }

    /// Get the number of messages in the conversation.
    #[must_use]
    pub fn message_count(&self) -> usize {
        self.inner.state.read().unwrap().messages.len()
    }

    /// Replace the composer text with `value`.
    pub fn handle_input_change(&self, value: &str) {
        value.clone_into(&mut self.inner.state.write().unwrap().input);
        self.touch();
    }

    /// Submit the composer text.
    ///
    /// Appends it as a user message, clears the input and returns the
    /// conversation to send to the assistant. Blank input is ignored.
    pub fn handle_submit(&self) -> Option<Vec<Message>> {
        let mut state = self.inner.state.write().unwrap();
        if state.input.trim().is_empty() {
            return None;
        }

        let content = std::mem::take(&mut state.input);
        state.messages.push(ChatMessage::new(ChatRole::User, content));
        state.error = None;

        let mut conversation = Vec::with_capacity(state.messages.len() + 1);
        if let Some(prompt) = &self.inner.system_prompt {
            conversation.push(Message::system(prompt.clone()));
        }
        conversation.extend(state.messages.iter().map(ChatMessage::to_llm));
        drop(state);

        self.touch();
        Some(conversation)
    }

    /// Apply one decoded stream part.
    pub fn apply_part(&self, part: DataStreamPart) {
        let mut state = self.inner.state.write().unwrap();
        match part {
            DataStreamPart::Text(text) => match state.messages.last_mut() {
                Some(last) if last.role == ChatRole::Assistant => last.content.push_str(&text),
                _ => state.messages.push(ChatMessage::new(ChatRole::Assistant, text)),
            },
            DataStreamPart::Data(items) => state.data.extend(items),
            DataStreamPart::Error(message) => state.error = Some(message),
        }
        drop(state);
        self.touch();
    }

    /// Update the last activity timestamp.
    fn touch(&self) {
        let mut guard = self.inner.last_activity.write().unwrap();
        *guard = Utc::now();
    }

    /// Check if the session has been idle longer than `timeout`.
    #[must_use]
    pub fn is_expired_with_timeout(&self, timeout: Duration) -> bool {
        let last = *self.inner.last_activity.read().unwrap();
        // Negative durations mean clock skew; treat as fresh.
        (Utc::now() - last)
            .to_std()
            .is_ok_and(|idle| idle > timeout)
    }

    /// Get the session age.
    #[must_use]
    pub fn age(&self) -> Duration {
        (Utc::now() - self.inner.created_at)
            .to_std()
            .unwrap_or(Duration::ZERO)
    }
}

/// Thread-safe store for sessions.
///
/// Provides methods for creating, retrieving, and cleaning up sessions.
#[derive(Debug, Clone)]
pub struct SessionStore {
    inner: Arc<SessionStoreInner>,
}

#[derive(Debug)]
struct SessionStoreInner {
    sessions: RwLock<HashMap<String, Session>>,
    system_prompt: Option<String>,
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new(None)
    }
}

impl SessionStore {
    /// Create a new session store; new sessions start with `system_prompt`.
    #[must_use]
    pub fn new(system_prompt: Option<String>) -> Self {
        Self {
            inner: Arc::new(SessionStoreInner {
                sessions: RwLock::new(HashMap::new()),
                system_prompt,
            }),
        }
    }

    /// Create a new session and return it.
    #[must_use]
    pub fn create(&self) -> Session {
        let id = Uuid::new_v4().to_string();
        self.create_with_id(id)
    }

    /// Create a new session with a specific ID.
    #[must_use]
    pub fn create_with_id(&self, id: impl Into<String>) -> Session {
        let id = id.into();
        let session = Session::new(id.clone(), self.inner.system_prompt.clone());
        let mut guard = self.inner.sessions.write().unwrap();
        guard.insert(id, session.clone());
        session
    }

    /// Get a session by ID.
    #[must_use]
    pub fn get(&self, id: &str) -> Option<Session> {
        let guard = self.inner.sessions.read().unwrap();
        guard.get(id).cloned()
    }

    /// Get a session by ID, creating it if it doesn't exist.
    #[must_use]
    pub fn get_or_create(&self, id: &str) -> Session {
        if let Some(session) = self.get(id) {
            return session;
        }
        self.create_with_id(id)
    }

    /// Remove a session by ID.
    pub fn remove(&self, id: &str) -> Option<Session> {
        let mut guard = self.inner.sessions.write().unwrap();
        guard.remove(id)
    }

    /// Get the number of active sessions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.sessions.read().unwrap().len()
    }

    /// Check if there are no sessions.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Remove sessions that have been inactive longer than the timeout.
    ///
    /// Returns the number of sessions removed.
    pub fn cleanup_expired_with_timeout(&self, timeout: Duration) -> usize {
        let mut guard = self.inner.sessions.write().unwrap();
        let before = guard.len();
        guard.retain(|_, session| !session.is_expired_with_timeout(timeout));
        before - guard.len()
    }

    /// List all session IDs.
    #[must_use]
    pub fn list_ids(&self) -> Vec<String> {
        self.inner
            .sessions
            .read()
            .unwrap()
            .keys()
            .cloned()
            .collect()
    }
}
