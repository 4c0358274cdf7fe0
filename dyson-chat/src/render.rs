//! View rendering.
//!
//! The tracker owns the list of bubbles; a `Renderer` is told about every
//! change to it and decides how (or whether) to show it.

use std::io::Write;

use crate::format::text_content;
use crate::models::{Bubble, BubbleKind};

/// A change to the chat view.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ViewUpdate<'a> {
    /// All bubbles were removed.
    Cleared,
    /// A bubble was appended at `index`.
    Appended { index: usize, bubble: &'a Bubble },
    /// The bubble at `index` was replaced in place.
    Replaced { index: usize, bubble: &'a Bubble },
    /// The bubble at `index` was removed.
    Removed { index: usize },
}

/// Displays the chat view.
pub trait Renderer: Send + Sync {
    fn render(&self, update: ViewUpdate<'_>);
}

/// Renderer for when there is nothing to draw on.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopRenderer;

impl Renderer for NoopRenderer {
    fn render(&self, _update: ViewUpdate<'_>) {}
}

/// Renders bubbles as plain text on stdout.
///
/// The terminal cannot take output back, so removals are ignored and a
/// replaced thinking indicator is printed again with its new text.
#[derive(Debug, Default, Clone, Copy)]
pub struct TerminalRenderer;

impl TerminalRenderer {
    fn print(text: &str) {
        let mut stdout = std::io::stdout().lock();
        let _ = writeln!(stdout, "{text}");
        let _ = stdout.flush();
    }
}

impl Renderer for TerminalRenderer {
    fn render(&self, update: ViewUpdate<'_>) {
        match update {
            ViewUpdate::Cleared => Self::print("\n--- new thread ---\n"),
            ViewUpdate::Appended { bubble, .. } | ViewUpdate::Replaced { bubble, .. } => {
                Self::print(&terminal_text(bubble));
            }
            ViewUpdate::Removed { .. } => {}
        }
    }
}

/// Terminal rendition of a bubble: list items become bullets.
pub fn terminal_text(bubble: &Bubble) -> String {
    match bubble.kind {
        BubbleKind::User => format!("> {}", bubble.text()),
        BubbleKind::Thinking => format!("... {}", bubble.text()),
        BubbleKind::Assistant => {
            let bulleted = bubble.html.replace("<li>", "<li>  * ");
            text_content(&bulleted)
                .lines()
                .filter(|l| !l.trim().is_empty())
                .collect::<Vec<_>>()
                .join("\n")
        }
    }
}
