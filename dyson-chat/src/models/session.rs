//! Session model representing one chat thread.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::Message;

/// A session is one conversation thread, identified by its position in the
/// tracker's session list.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    /// Messages in the order they were recorded.
    pub messages: Vec<Message>,
    /// When the thread was started.
    pub started_at: DateTime<Utc>,
}

impl Session {
    /// Create an empty session.
    pub fn new() -> Self {
        Self {
            messages: Vec::new(),
            started_at: Utc::now(),
        }
    }

    /// Append a message to the end of the thread.
    pub fn push(&mut self, message: Message) {
        self.messages.push(message);
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}
