//! Message model representing one turn in a chat thread.

use serde::{Deserialize, Serialize};

/// Role of a message sender.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    /// Message typed by the user.
    User,
    /// Reply from the chat service.
    Assistant,
}

impl std::fmt::Display for MessageRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::User => write!(f, "user"),
            Self::Assistant => write!(f, "assistant"),
        }
    }
}

/// A message in a chat thread. Immutable once recorded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// Raw message text (the reply text for assistant messages, not its HTML).
    pub text: String,
    /// Who sent it.
    pub role: MessageRole,
}

impl Message {
    /// Create a message typed by the user.
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            role: MessageRole::User,
        }
    }

    /// Create a reply from the chat service.
    pub fn assistant(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            role: MessageRole::Assistant,
        }
    }

    pub const fn is_user(&self) -> bool {
        matches!(self.role, MessageRole::User)
    }
}
