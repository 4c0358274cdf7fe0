//! Line-based input composition for the interactive chat.
//!
//! Terminal stand-ins for the widget's keyboard contract:
//! - Enter sends the composed message.
//! - A line ending in `\` continues onto the next line (Shift+Enter).
//! - Ctrl+K (arrives as the `0x0B` control character) or `/new` starts a new
//!   thread and discards anything composed so far.
//! - `/quit` or `/exit` leaves.

/// Ctrl+K as delivered by a terminal in line mode.
const CTRL_K: char = '\u{b}';

/// What the user asked for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputAction {
    /// Send the composed text (may be blank; the tracker ignores blanks).
    Send(String),
    /// Start a new thread.
    NewThread,
    /// Leave the chat.
    Quit,
}

/// Accumulates continued lines into one message.
#[derive(Debug, Default)]
pub struct Composer {
    pending: Vec<String>,
}

impl Composer {
    /// Feed one line (without its terminator). Returns an action once the
    /// line completes one.
    pub fn feed(&mut self, line: &str) -> Option<InputAction> {
        let line = line.trim_end_matches(['\r', '\n']);

        if line.contains(CTRL_K) || line.trim() == "/new" {
            self.pending.clear();
            return Some(InputAction::NewThread);
        }
        if matches!(line.trim(), "/quit" | "/exit") {
            self.pending.clear();
            return Some(InputAction::Quit);
        }

        if let Some(head) = line.strip_suffix('\\') {
            self.pending.push(head.to_string());
            return None;
        }

        self.pending.push(line.to_string());
        Some(InputAction::Send(self.take()))
    }

    /// Whether a continued message is waiting for more lines.
    pub fn is_composing(&self) -> bool {
        !self.pending.is_empty()
    }

    /// Text composed so far, consumed. Used when input ends mid-message.
    pub fn take(&mut self) -> String {
        std::mem::take(&mut self.pending).join("\n")
    }
}
