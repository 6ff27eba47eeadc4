//! Server-rendered HTML for the chat page.
//!
//! Pages are plain HTML strings enhanced with HTMX. Without JavaScript the
//! form still works through a regular POST and redirect.
//!
//! # Structure
//!
//! - [`page`]: document shell, chat panel and message rows

pub mod page;

pub use page::{chat_page, chat_panel, escape_html, html_shell};
