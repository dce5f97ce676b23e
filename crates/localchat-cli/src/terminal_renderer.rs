use std::time::SystemTime;

use chrono::{DateTime, Local};
use localchat_core::services::{DisplayContent, MessageRenderer, display_content};
use localchat_core::{Message, Role};

/// Plain-text renderer: hard line breaks become ordinary newlines, math
/// delimiters are left as typed.
pub struct TerminalRenderer;

impl MessageRenderer for TerminalRenderer {
    type Output = String;

    fn render(&self, text: &str) -> String {
        text.replace("  \n", "\n")
    }
}

pub fn format_timestamp(timestamp: SystemTime) -> String {
    DateTime::<Local>::from(timestamp).format("%H:%M").to_string()
}

/// One message as printed in the transcript
pub fn format_message(message: &Message) -> String {
    let time = format_timestamp(message.timestamp());
    let speaker = match message.role() {
        Role::User => "you",
        Role::Assistant => "assistant",
    };

    match display_content(message, &TerminalRenderer) {
        DisplayContent::Rendered(text) => format!("[{time}] {speaker}:\n{text}\n"),
        DisplayContent::Error(text) => format!("[{time}] {speaker}: !! {text}\n"),
    }
}
