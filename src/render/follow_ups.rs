//! Follow-up suggestion extraction
//!
//! Assistant replies may end with a block like:
//!
//! ```text
//! ---
//! **Want to learn more?**
//! - [Tell me more] [What else?]
//! ```
//!
//! The block is split off the reply and each bracketed span becomes one
//! suggested question.

use std::sync::OnceLock;

use regex::Regex;
use serde::Serialize;

/// Header line that introduces the suggestion block.
pub const DEFAULT_FOLLOW_UP_HEADER: &str = "**Want to learn more?**";

/// A reply split into its displayable body and its suggested follow-ups.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FollowUpReply {
    pub main: String,
    pub follow_ups: Vec<String>,
}

/// Split the trailing suggestion block off `text` using the default header.
pub fn extract_follow_ups(text: &str) -> FollowUpReply {
    extract_follow_ups_with(text, DEFAULT_FOLLOW_UP_HEADER)
}

/// Split the trailing suggestion block off `text`.
///
/// The marker is a `---` line followed (blank lines allowed in between) by
/// `header`. When several markers exist the last one is used. Bracketed
/// entries are returned as written: empty and duplicate entries included.
pub fn extract_follow_ups_with(text: &str, header: &str) -> FollowUpReply {
    match find_marker(text, header) {
        Some((rule_start, section_start)) => FollowUpReply {
            main: text[..rule_start].trim().to_string(),
            follow_ups: bracketed_spans(&text[section_start..]),
        },
        None => FollowUpReply {
            main: text.to_string(),
            follow_ups: Vec::new(),
        },
    }
}

fn re_bracketed() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"\[([^\]]*)\]")
            .expect("re_bracketed: pattern is valid and should always compile")
    })
}

/// A `---` line, optional blank lines, then a line holding only `header`.
///
/// The header is configurable, so this pattern is built per call.
fn marker_regex(header: &str) -> Option<Regex> {
    let pattern = format!(
        r"(?m)^[ \t]*---[ \t]*\r?\n(?:[ \t]*\r?\n)*[ \t]*{}[ \t]*\r?$",
        regex::escape(header)
    );
    Regex::new(&pattern).ok()
}

/// Byte offsets of the `---` line start and of the text after the header.
fn find_marker(text: &str, header: &str) -> Option<(usize, usize)> {
    let header = header.trim();
    if header.is_empty() {
        return None;
    }

    marker_regex(header)?
        .find_iter(text)
        .last()
        .map(|marker| (marker.start(), marker.end()))
}

/// Inner text of every `[...]` span, in source order.
fn bracketed_spans(section: &str) -> Vec<String> {
    re_bracketed()
        .captures_iter(section)
        .filter_map(|caps| caps.get(1))
        .map(|inner| inner.as_str().to_string())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extracts_in_source_order() {
        let text = "Hi there! \n\n---\n**Want to learn more?**\n- [Tell me more] [What else?]";
        let reply = extract_follow_ups(text);

        assert_eq!(reply.main, "Hi there!");
        assert_eq!(reply.follow_ups, vec!["Tell me more", "What else?"]);
    }

    #[test]
    fn test_no_marker_returns_everything() {
        let text = "Just an answer.\n\n---\n\nWith a rule but no header. [not a question]";
        let reply = extract_follow_ups(text);

        assert_eq!(reply.main, text);
        assert!(reply.follow_ups.is_empty());
    }

    #[test]
    fn test_keeps_duplicates_and_empty_entries() {
        let text = "Body\n---\n**Want to learn more?**\n- [Again]\n- []\n- [Again]";
        let reply = extract_follow_ups(text);

        assert_eq!(reply.follow_ups, vec!["Again", "", "Again"]);
    }

    #[test]
    fn test_blank_lines_between_rule_and_header() {
        let text = "Body text\r\n\r\n---\r\n\r\n**Want to learn more?**\r\n- [One]\r\n- [Two]\r\n";
        let reply = extract_follow_ups(text);

        assert_eq!(reply.main, "Body text");
        assert_eq!(reply.follow_ups, vec!["One", "Two"]);
    }

    #[test]
    fn test_last_marker_wins() {
        let text = "Intro\n---\n**Want to learn more?**\n[a]\nmore\n---\n**Want to learn more?**\n[b]";
        let reply = extract_follow_ups(text);

        assert_eq!(reply.main, "Intro\n---\n**Want to learn more?**\n[a]\nmore");
        assert_eq!(reply.follow_ups, vec!["b"]);
    }

    #[test]
    fn test_unclosed_bracket_is_ignored() {
        let text = "Body\n---\n**Want to learn more?**\n- [Closed] [never closed";
        let reply = extract_follow_ups(text);

        assert_eq!(reply.follow_ups, vec!["Closed"]);
    }

    #[test]
    fn test_header_must_stand_alone_after_rule() {
        let inputs = [
            "Body\n---\n**Want to learn more?** soon\n[a]",
            "Body\n---\nAside\n**Want to learn more?**\n[a]",
            "Body\n--- **Want to learn more?**\n[a]",
        ];
        for text in inputs {
            let reply = extract_follow_ups(text);
            assert_eq!(reply.main, text, "unexpected marker in {text:?}");
            assert!(reply.follow_ups.is_empty());
        }
    }

    #[test]
    fn test_custom_header() {
        let text = "Body\n---\n### Next steps\n[Deploy]";
        let reply = extract_follow_ups_with(text, "### Next steps");

        assert_eq!(reply.main, "Body");
        assert_eq!(reply.follow_ups, vec!["Deploy"]);
    }
}
