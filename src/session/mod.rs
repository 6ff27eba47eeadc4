//! Chat session management.
//!
//! A [`Session`] is the state behind one chat page: the ordered message
//! list, the composer input and the auxiliary data received from tools. The
//! page only reads it and forwards input changes and submissions to it.
//!
//! # Architecture
//!
//! - [`Session`]: Represents a single chat session
//! - [`SessionStore`]: Thread-safe store for all active sessions
//!
//! # Example
//!
//! ```rust
//! use aisdk_stream::session::SessionStore;
//!
//! let store = SessionStore::default();
//! let session = store.create();
//! session.handle_input_change("Hello!");
//!
//! let conversation = session.handle_submit().unwrap();
//! assert_eq!(conversation.len(), 1);
//! assert_eq!(session.input(), "");
//! ```

mod thread;

pub use thread::{
    ChatMessage, ChatRole, ChatSnapshot, DEFAULT_SESSION_TIMEOUT, Session, SessionStore,
};
