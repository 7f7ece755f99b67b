#![forbid(unsafe_code)]
#![deny(missing_docs, unused_must_use)]

//! Browser chat page served by the `server` crate.
//!
//! The page keeps the conversation itself and posts it as role-tagged
//! messages with every new message.

/// Page heading and document title.
pub const TITLE: &str = "Customer Support Assistant (HF Model)";
/// Line shown under the heading.
pub const DESCRIPTION: &str = "A helpful customer support assistant fine-tuned on support conversations.";
/// Path the page posts messages to.
pub const CHAT_ENDPOINT: &str = "/api/chat";

const TEMPLATE: &str = include_str!("../static/index.html");

/// Render the chat page with the default title, description and endpoint.
pub fn render_page() -> String {
    render_page_with(TITLE, DESCRIPTION, CHAT_ENDPOINT)
}

/// Render the chat page. `title` and `description` are HTML-escaped.
pub fn render_page_with(title: &str, description: &str, endpoint: &str) -> String {
    TEMPLATE
        .replace("{{TITLE}}", &escape_html(title))
        .replace("{{DESCRIPTION}}", &escape_html(description))
        .replace("{{ENDPOINT}}", endpoint)
}

fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for ch in s.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(ch),
        }
    }
    out
}
