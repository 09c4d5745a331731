//! Assistant reply rendering
//!
//! Splits the follow-up suggestion block off a reply and turns the remaining
//! markdown into an HTML fragment for the chat bubble.

mod follow_ups;
mod markdown;

use serde::Serialize;

pub use follow_ups::{
    extract_follow_ups, extract_follow_ups_with, FollowUpReply, DEFAULT_FOLLOW_UP_HEADER,
};
pub use markdown::{classify_line, format_markdown, parse_inline, Block, Inline};

/// A reply ready for display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RenderedReply {
    pub html: String,
    pub follow_ups: Vec<String>,
}

/// Extract follow-ups from `text` and format the rest.
pub fn render_reply(text: &str, header: &str) -> RenderedReply {
    let FollowUpReply { main, follow_ups } = extract_follow_ups_with(text, header);
    RenderedReply {
        html: format_markdown(&main),
        follow_ups,
    }
}
