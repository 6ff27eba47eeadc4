//! Chat page rendering.

use serde_json::Value;

use crate::session::{ChatMessage, ChatRole, ChatSnapshot};

/// Prompt suggestion shown above the composer.
pub const EXAMPLE_PROMPT: &str = "Can you calculate 40+2 using the calculator and tell me how it relates to the meaning of life by searching the web and the library?";

/// Escape text for use in HTML content and attribute values.
#[must_use]
pub fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
}

/// Generate the HTML shell for the application.
#[must_use]
pub fn html_shell(title: &str, content: &str) -> String {
    let title = escape_html(title);
    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="utf-8">
    <meta name="viewport" content="width=device-width, initial-scale=1">
    <title>{title}</title>

    <!-- HTMX (local) -->
    <script src="/static/vendor/htmx-2.0.8.min.js"></script>
    <link rel="stylesheet" href="/static/app.css">
</head>
<body class="bg-black text-white">
{content}
</body>
</html>"#
    )
}

/// Full chat page for a session.
#[must_use]
pub fn chat_page(session_id: &str, chat: &ChatSnapshot) -> String {
    html_shell("Chat", &chat_panel(session_id, chat))
}

/// The swappable chat region: message rows, composer and data panel.
///
/// Rows follow the session order exactly. Stream errors are not shown here.
#[must_use]
pub fn chat_panel(session_id: &str, chat: &ChatSnapshot) -> String {
    let session_id = escape_html(session_id);
    let rows: String = chat.messages.iter().map(message_row).collect();
    let input = escape_html(&chat.input);
    let data = data_block(&chat.data);

    format!(
        r##"<div id="chat" class="flex justify-center p-4">
    <div class="flex flex-col w-full max-w-md">
{rows}
        <form class="fixed bottom-0 max-w-md bg-black" method="post" action="/chat/{session_id}/submit" hx-post="/chat/{session_id}/submit" hx-target="#chat" hx-swap="outerHTML" hx-sync="this:queue all">
            <p class="text-white">Example: {EXAMPLE_PROMPT}</p>
            <input class="text-black w-full p-2 mb-8 border border-gray-300 rounded shadow-xl" name="input" value="{input}" placeholder="Say something..." autocomplete="off" hx-post="/chat/{session_id}/input" hx-trigger="input" hx-swap="none" hx-sync="closest form:queue all">
        </form>
    </div>
    <div class="text-white p-4 w-[500px]">
        <pre>{data}</pre>
    </div>
</div>"##
    )
}

/// One row per message, prefixed by its role.
fn message_row(message: &ChatMessage) -> String {
    let (label, role) = match message.role {
        ChatRole::User => ("User: ", "user"),
        ChatRole::Assistant => ("AI: ", "assistant"),
    };
    format!(
        "        <div class=\"whitespace-pre-wrap p-2\" data-message-id=\"{}\" data-role=\"{role}\">{label}{}</div>\n",
        escape_html(&message.id),
        escape_html(&message.content),
    )
}

/// Pretty JSON of the auxiliary data; nothing before the first item.
fn data_block(data: &[Value]) -> String {
    if data.is_empty() {
        return String::new();
    }
    serde_json::to_string_pretty(data)
        .map(|json| escape_html(&json))
        .unwrap_or_default()
}
