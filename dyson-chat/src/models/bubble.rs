//! Bubble model: one rendered element of the chat view.

use serde::{Deserialize, Serialize};

use crate::format::{escape_html, text_content};

/// What kind of element a bubble is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BubbleKind {
    /// The user's own message.
    User,
    /// A formatted reply, or the welcome message.
    Assistant,
    /// The transient "thinking" indicator (also carries the connection error).
    Thinking,
}

/// A rendered message bubble. `html` is always safe to insert as markup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bubble {
    pub kind: BubbleKind,
    pub html: String,
}

impl Bubble {
    /// Bubble for plain user text; the text is escaped.
    pub fn user(text: &str) -> Self {
        Self {
            kind: BubbleKind::User,
            html: escape_html(text),
        }
    }

    /// Bubble for already formatted assistant HTML.
    pub fn assistant(html: impl Into<String>) -> Self {
        Self {
            kind: BubbleKind::Assistant,
            html: html.into(),
        }
    }

    /// Thinking indicator with plain status text; the text is escaped.
    pub fn thinking(text: &str) -> Self {
        Self {
            kind: BubbleKind::Thinking,
            html: escape_html(text),
        }
    }

    pub const fn is_user(&self) -> bool {
        matches!(self.kind, BubbleKind::User)
    }

    /// Visible text of the bubble, without markup.
    pub fn text(&self) -> String {
        text_content(&self.html)
    }

    /// Transcript line: `User: ...` for user bubbles, `AI: ...` for the rest.
    pub fn transcript_line(&self) -> String {
        let label = if self.is_user() { "User" } else { "AI" };
        format!("{label}: {}", self.text())
    }
}
