//! Restricted markdown to HTML
//!
//! Assistant replies use a small markdown subset: `## ` headings, bullet
//! lists, paragraphs, and inline bold, italic, code and links. Each line is
//! classified into a [`Block`], then its text goes through the inline
//! tokenizer. The output only contains tags built here; every piece of
//! source text is escaped on the way out.

use regex::Regex;
use std::sync::OnceLock;

/// Block-level classification of a single source line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Block<'a> {
    Heading(&'a str),
    MinorHeading(&'a str),
    Bullet(&'a str),
    Blank,
    Paragraph(&'a str),
}

const BULLET_MARKERS: [&str; 3] = ["- ", "• ", "* "];

/// Classify one line. Leading indentation is ignored.
pub fn classify_line(line: &str) -> Block<'_> {
    let line = line.trim_start();

    if let Some(rest) = line.strip_prefix("### ") {
        return Block::MinorHeading(rest.trim());
    }
    if let Some(rest) = line.strip_prefix("## ") {
        return Block::Heading(rest.trim());
    }
    for marker in BULLET_MARKERS {
        if let Some(rest) = line.strip_prefix(marker) {
            return Block::Bullet(rest.trim());
        }
    }
    if line.trim().is_empty() {
        return Block::Blank;
    }

    Block::Paragraph(line.trim_end())
}

/// Inline span produced by the tokenizer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inline {
    Text(String),
    Strong(Vec<Inline>),
    Em(Vec<Inline>),
    Code(String),
    Link { children: Vec<Inline>, href: String },
}

/// Render `text` as an HTML fragment.
pub fn format_markdown(text: &str) -> String {
    let mut html = String::with_capacity(text.len() + text.len() / 2);
    let mut in_list = false;
    let mut previous_blank = false;

    for line in text.lines() {
        let block = classify_line(line);

        if block == Block::Blank {
            if previous_blank {
                continue;
            }
            previous_blank = true;
        } else {
            previous_blank = false;
        }

        match block {
            Block::Heading(content) => {
                close_list(&mut html, &mut in_list);
                push_element(&mut html, "h3", content);
            }
            Block::MinorHeading(content) => {
                close_list(&mut html, &mut in_list);
                push_element(&mut html, "h4", content);
            }
            Block::Bullet(content) => {
                if !in_list {
                    html.push_str("<ul>");
                    in_list = true;
                }
                push_element(&mut html, "li", content);
            }
            Block::Blank => close_list(&mut html, &mut in_list),
            Block::Paragraph(content) => {
                close_list(&mut html, &mut in_list);
                push_element(&mut html, "p", content);
            }
        }
    }

    close_list(&mut html, &mut in_list);
    html
}

fn close_list(html: &mut String, in_list: &mut bool) {
    if *in_list {
        html.push_str("</ul>");
        *in_list = false;
    }
}

fn push_element(html: &mut String, tag: &str, content: &str) {
    html.push('<');
    html.push_str(tag);
    html.push('>');
    render_inline(html, &parse_inline(content));
    html.push_str("</");
    html.push_str(tag);
    html.push('>');
}

// ---------------------------------------------------------------------------
// Compiled inline regexes
// ---------------------------------------------------------------------------

fn re_bold() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"\*\*(.+?)\*\*")
            .expect("re_bold: pattern is valid and should always compile")
    })
}

/// `regex` has no lookbehind, so a match touching another `*` is rejected
/// by [`touches_star`] instead.
fn re_italic() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"\*([^*]+)\*")
            .expect("re_italic: pattern is valid and should always compile")
    })
}

fn re_inline_code() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"`([^`]+)`")
            .expect("re_inline_code: pattern is valid and should always compile")
    })
}

fn re_link() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"\[([^\]]+)\]\(([^)]+)\)")
            .expect("re_link: pattern is valid and should always compile")
    })
}

// ---------------------------------------------------------------------------
// Inline tokenizer
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy)]
enum Pass {
    Bold,
    Italic,
    Code,
    Link,
}

impl Pass {
    fn regex(self) -> &'static Regex {
        match self {
            Pass::Bold => re_bold(),
            Pass::Italic => re_italic(),
            Pass::Code => re_inline_code(),
            Pass::Link => re_link(),
        }
    }
}

const PASSES: [Pass; 4] = [Pass::Bold, Pass::Italic, Pass::Code, Pass::Link];

/// Supplementary private-use plane, used for span placeholders.
const SLOT_BASE: u32 = 0xF0000;
const SLOT_END: u32 = 0xFFFFD;

/// Tokenize inline markup.
///
/// Passes run in a fixed order: bold, italic, code, link. Each pass matches
/// over the whole run, with every span found earlier standing in as a single
/// placeholder character, so a link label or an italic span can wrap spans
/// produced before it. Bold and italic contents go through the passes that
/// follow them. Code text and link targets are taken from the source as
/// written.
pub fn parse_inline(text: &str) -> Vec<Inline> {
    let Some((mut spans, flat)) = Spans::flatten(text) else {
        return vec![Inline::Text(text.to_string())];
    };
    let flat = spans.resolve(flat, &PASSES);
    spans.decode(&flat)
}

struct Slot {
    node: Inline,
    source: String,
}

/// Spans resolved so far, addressed by placeholder character.
struct Spans {
    slots: Vec<Slot>,
}

impl Spans {
    /// Private-use characters already in `text` get slots of their own, so
    /// every placeholder in a flattened run is unambiguous.
    fn flatten(text: &str) -> Option<(Self, String)> {
        let mut spans = Spans { slots: Vec::new() };
        let mut flat = String::with_capacity(text.len());

        for c in text.chars() {
            if (SLOT_BASE..=SLOT_END).contains(&u32::from(c)) {
                let literal = c.to_string();
                flat.push(spans.alloc(Inline::Text(literal.clone()), literal)?);
            } else {
                flat.push(c);
            }
        }

        Some((spans, flat))
    }

    fn alloc(&mut self, node: Inline, source: String) -> Option<char> {
        let index = u32::try_from(self.slots.len()).ok()?;
        let placeholder = SLOT_BASE
            .checked_add(index)
            .filter(|&code| code <= SLOT_END)
            .and_then(char::from_u32)?;
        self.slots.push(Slot { node, source });
        Some(placeholder)
    }

    fn slot(&self, c: char) -> Option<&Slot> {
        let index = u32::from(c).checked_sub(SLOT_BASE)?;
        self.slots.get(usize::try_from(index).ok()?)
    }

    fn resolve(&mut self, flat: String, passes: &[Pass]) -> String {
        let mut flat = flat;
        for (i, &pass) in passes.iter().enumerate() {
            flat = self.apply(flat, pass, &passes[i + 1..]);
        }
        flat
    }

    /// Replace every match of `pass` in `flat` with a placeholder.
    fn apply(&mut self, flat: String, pass: Pass, rest: &[Pass]) -> String {
        let re = pass.regex();
        let mut out = String::with_capacity(flat.len());
        let mut copied = 0;
        let mut pos = 0;

        while let Some(caps) = re.captures_at(&flat, pos) {
            let Some(whole) = caps.get(0) else {
                break;
            };

            let node = match (pass, caps.get(1), caps.get(2)) {
                (Pass::Bold, Some(inner), _) => {
                    Some(Inline::Strong(self.nested(inner.as_str(), rest)))
                }
                (Pass::Italic, Some(inner), _)
                    if !touches_star(&flat, whole.start(), whole.end()) =>
                {
                    Some(Inline::Em(self.nested(inner.as_str(), rest)))
                }
                (Pass::Code, Some(inner), _) => {
                    Some(Inline::Code(self.restore(inner.as_str())))
                }
                (Pass::Link, Some(label), Some(target)) => {
                    let href = self.restore(target.as_str());
                    is_safe_href(&href).then(|| Inline::Link {
                        children: self.nested(label.as_str(), rest),
                        href: href.trim().to_string(),
                    })
                }
                _ => None,
            };

            // Every pattern opens with a one-byte ASCII marker.
            let Some(node) = node else {
                pos = whole.start() + 1;
                continue;
            };

            let source = self.restore(whole.as_str());
            let Some(placeholder) = self.alloc(node, source) else {
                break;
            };
            out.push_str(&flat[copied..whole.start()]);
            out.push(placeholder);
            copied = whole.end();
            pos = whole.end();
        }

        out.push_str(&flat[copied..]);
        out
    }

    fn nested(&mut self, inner: &str, rest: &[Pass]) -> Vec<Inline> {
        let flat = self.resolve(inner.to_string(), rest);
        self.decode(&flat)
    }

    /// Source text of `flat`, with placeholders expanded.
    fn restore(&self, flat: &str) -> String {
        let mut out = String::with_capacity(flat.len());
        for c in flat.chars() {
            match self.slot(c) {
                Some(slot) => out.push_str(&slot.source),
                None => out.push(c),
            }
        }
        out
    }

    /// Nodes of `flat`, merging literal runs into one text node.
    fn decode(&self, flat: &str) -> Vec<Inline> {
        let mut nodes = Vec::new();
        let mut text = String::new();

        for c in flat.chars() {
            match self.slot(c) {
                Some(Slot {
                    node: Inline::Text(literal),
                    ..
                }) => text.push_str(literal),
                Some(slot) => {
                    if !text.is_empty() {
                        nodes.push(Inline::Text(std::mem::take(&mut text)));
                    }
                    nodes.push(slot.node.clone());
                }
                None => text.push(c),
            }
        }

        if !text.is_empty() {
            nodes.push(Inline::Text(text));
        }
        nodes
    }
}

/// `*x*` only counts when neither asterisk touches another one.
fn touches_star(flat: &str, start: usize, end: usize) -> bool {
    flat[..start].ends_with('*') || flat[end..].starts_with('*')
}

/// Relative targets and a short list of schemes are allowed as link targets.
fn is_safe_href(href: &str) -> bool {
    let href = href.trim();
    let lower = href.to_ascii_lowercase();

    if ["http://", "https://", "mailto:"]
        .iter()
        .any(|scheme| lower.starts_with(scheme))
    {
        return true;
    }

    // No scheme: the first ':' (if any) comes after a path, query or fragment delimiter.
    match lower.find(':') {
        None => true,
        Some(colon) => lower[..colon].contains(['/', '?', '#']),
    }
}

fn render_inline(html: &mut String, nodes: &[Inline]) {
    for node in nodes {
        match node {
            Inline::Text(text) => push_escaped(html, text),
            Inline::Strong(children) => {
                html.push_str("<strong>");
                render_inline(html, children);
                html.push_str("</strong>");
            }
            Inline::Em(children) => {
                html.push_str("<em>");
                render_inline(html, children);
                html.push_str("</em>");
            }
            Inline::Code(code) => {
                html.push_str("<code>");
                push_escaped(html, code);
                html.push_str("</code>");
            }
            Inline::Link { children, href } => {
                html.push_str("<a href=\"");
                push_escaped(html, href);
                html.push_str("\" target=\"_blank\" rel=\"noopener noreferrer\">");
                render_inline(html, children);
                html.push_str("</a>");
            }
        }
    }
}

fn push_escaped(html: &mut String, text: &str) {
    for c in text.chars() {
        match c {
            '&' => html.push_str("&amp;"),
            '<' => html.push_str("&lt;"),
            '>' => html.push_str("&gt;"),
            '"' => html.push_str("&quot;"),
            '\'' => html.push_str("&#39;"),
            _ => html.push(c),
        }
    }
}
