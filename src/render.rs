//! Every path from message text to screen goes through here, so the choice
//! between inserting text as markup and escaping it is made in one place.

use crate::markup;
use crate::types::{Author, Entry, Message};
use serde::Deserialize;

pub const USER_AVATAR_URL: &str = "https://i.ibb.co/d5b84Xw/Untitled-design.png";
pub const BOT_LOGO_URL: &str = "logo.jpg";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MarkupPolicy {
    /// Text is inserted verbatim and interpreted as markup.
    #[default]
    Raw,
    /// HTML-significant characters are escaped and shown literally.
    Escaped,
}

pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

/// Message body as it goes into the HTML transcript.
pub fn message_body(text: &str, policy: MarkupPolicy) -> String {
    match policy {
        MarkupPolicy::Raw => text.to_string(),
        MarkupPolicy::Escaped => escape_html(text),
    }
}

pub fn message_html(msg: &Message, policy: MarkupPolicy) -> String {
    let body = message_body(&msg.text, policy);
    match msg.author {
        Author::User => format!(
            "<div class=\"d-flex justify-content-end mb-4\"><div class=\"msg_cotainer_send\">{body}<span class=\"msg_time_send\">{}</span></div><div class=\"img_cont_msg\"><img src=\"{USER_AVATAR_URL}\" class=\"rounded-circle user_img_msg\"></div></div>",
            msg.timestamp
        ),
        Author::Bot => format!(
            "<div class=\"d-flex justify-content-start mb-4\"><div class=\"img_cont_msg\"><img src=\"{BOT_LOGO_URL}\" class=\"rounded-circle user_img_msg\"></div><div class=\"msg_cotainer\">{body}<span class=\"msg_time\">{}</span></div></div>",
            msg.timestamp
        ),
    }
}

pub fn pending_html() -> String {
    format!(
        "<div class=\"d-flex justify-content-start mb-4 typing\"><div class=\"img_cont_msg\"><img src=\"{BOT_LOGO_URL}\" class=\"rounded-circle user_img_msg\"></div><div class=\"msg_cotainer\"><div class=\"typing-indicator\"><span></span><span></span><span></span></div></div></div>"
    )
}

pub fn entry_html(entry: &Entry, policy: MarkupPolicy) -> String {
    match entry {
        Entry::Message(msg) => message_html(msg, policy),
        Entry::Pending { .. } => pending_html(),
    }
}

pub fn transcript_html(entries: &[Entry], policy: MarkupPolicy) -> String {
    entries
        .iter()
        .map(|entry| entry_html(entry, policy))
        .collect::<Vec<_>>()
        .join("\n")
}

/// One message as terminal text. `ansi` selects styled output.
pub fn message_line(msg: &Message, policy: MarkupPolicy, ansi: bool) -> String {
    let who = match msg.author {
        Author::User => "you",
        Author::Bot => "bot",
    };
    let body = match (policy, ansi) {
        (MarkupPolicy::Escaped, _) => msg.text.clone(),
        (MarkupPolicy::Raw, true) => markup::to_ansi(&msg.text),
        (MarkupPolicy::Raw, false) => markup::to_plain(&msg.text),
    };
    format!("[{}] {who}: {body}", msg.timestamp)
}

pub fn entry_line(entry: &Entry, policy: MarkupPolicy, ansi: bool) -> String {
    match entry {
        Entry::Message(msg) => message_line(msg, policy, ansi),
        Entry::Pending { .. } => "bot: ● ● ●".to_string(),
    }
}
