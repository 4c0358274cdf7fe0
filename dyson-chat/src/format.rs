//! Reply formatting.
//!
//! Converts the chat service's plain-text replies into an HTML fragment.
//! Only two block kinds are recognised: list items and paragraphs. There is
//! no nesting and no inline emphasis. All source text is escaped before it
//! is wrapped in tags.

use std::sync::LazyLock;

use regex::Regex;

/// Digits, a period, then a space: `1. `, `42. `.
static ORDERED_ITEM: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d+\. ").expect("ordered item pattern is valid"));

/// The kind of list currently open.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ListKind {
    Unordered,
    Ordered,
}

impl ListKind {
    const fn open_tag(self) -> &'static str {
        match self {
            Self::Unordered => "<ul>",
            Self::Ordered => "<ol>",
        }
    }

    const fn close_tag(self) -> &'static str {
        match self {
            Self::Unordered => "</ul>",
            Self::Ordered => "</ol>",
        }
    }
}

/// Classification of a single non-blank line.
#[derive(Debug, PartialEq, Eq)]
enum Line<'a> {
    Item { kind: ListKind, text: &'a str },
    Paragraph(&'a str),
}

fn classify(line: &str) -> Line<'_> {
    if let Some(rest) = line.strip_prefix("- ") {
        return Line::Item {
            kind: ListKind::Unordered,
            text: rest,
        };
    }
    if let Some(rest) = line.strip_prefix('*') {
        return Line::Item {
            kind: ListKind::Unordered,
            text: rest.trim_start(),
        };
    }
    if let Some(m) = ORDERED_ITEM.find(line) {
        return Line::Item {
            kind: ListKind::Ordered,
            text: &line[m.end()..],
        };
    }
    Line::Paragraph(line)
}

/// Format a reply as an HTML fragment, one tag per output line.
///
/// Lines are trimmed and blank lines are dropped. A list item opens a list
/// only when none is open, so a run of mixed `-` and `1.` items stays in the
/// list that the run started with. A paragraph closes any open list.
pub fn format_response(text: &str) -> String {
    let mut out: Vec<String> = Vec::new();
    let mut open: Option<ListKind> = None;

    for line in text.split('\n').map(str::trim).filter(|l| !l.is_empty()) {
        match classify(line) {
            Line::Item { kind, text } => {
                if open.is_none() {
                    out.push(kind.open_tag().to_string());
                    open = Some(kind);
                }
                out.push(format!("<li>{}</li>", escape_html(text)));
            }
            Line::Paragraph(text) => {
                if let Some(kind) = open.take() {
                    out.push(kind.close_tag().to_string());
                }
                out.push(format!("<p>{}</p>", escape_html(text)));
            }
        }
    }

    if let Some(kind) = open {
        out.push(kind.close_tag().to_string());
    }

    out.join("\n")
}

/// Escape the characters that are significant in HTML text and attributes.
pub fn escape_html(text: &str) -> String {
    html_escape::encode_quoted_attribute(text).into_owned()
}

/// Visible text of an HTML fragment: tags dropped, entities decoded.
///
/// Whitespace between tags is kept as-is, so `<p>a</p>\n<p>b</p>` reads as
/// `"a\nb"`.
pub fn text_content(html: &str) -> String {
    let mut stripped = String::with_capacity(html.len());
    let mut in_tag = false;
    for c in html.chars() {
        match c {
            '<' => in_tag = true,
            '>' if in_tag => in_tag = false,
            _ if !in_tag => stripped.push(c),
            _ => {}
        }
    }
    html_escape::decode_html_entities(&stripped).into_owned()
}
