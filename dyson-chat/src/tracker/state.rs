//! Mutable tracker state: the session list and the rendered view.

use crate::models::{Bubble, Session};
use crate::render::{Renderer, ViewUpdate};

#[derive(Debug, Default)]
pub(super) struct TrackerState {
    pub sessions: Vec<Session>,
    /// Index of the active session; `None` before the first thread.
    pub active: Option<usize>,
    /// First user message of the active thread, used as its title.
    pub title: Option<String>,
    /// Whether the active thread has been handed to the persister.
    pub saved: bool,
    /// Bubbles currently on screen.
    pub view: Vec<Bubble>,
    /// Bumped whenever the view is reset for a new thread.
    pub generation: u64,
}

impl TrackerState {
    pub fn push_bubble(&mut self, renderer: &dyn Renderer, bubble: Bubble) -> usize {
        let index = self.view.len();
        self.view.push(bubble);
        renderer.render(ViewUpdate::Appended {
            index,
            bubble: &self.view[index],
        });
        index
    }

    pub fn replace_bubble(&mut self, renderer: &dyn Renderer, index: usize, bubble: Bubble) {
        if let Some(slot) = self.view.get_mut(index) {
            *slot = bubble;
            renderer.render(ViewUpdate::Replaced {
                index,
                bubble: &self.view[index],
            });
        }
    }

    pub fn remove_bubble(&mut self, renderer: &dyn Renderer, index: usize) {
        if index < self.view.len() {
            self.view.remove(index);
            renderer.render(ViewUpdate::Removed { index });
        }
    }

    pub fn clear_view(&mut self, renderer: &dyn Renderer) {
        self.view.clear();
        self.generation += 1;
        renderer.render(ViewUpdate::Cleared);
    }

    /// The view flattened to one `User:`/`AI:` line per bubble.
    pub fn transcript(&self) -> String {
        self.view
            .iter()
            .map(Bubble::transcript_line)
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Transcript and title to save, if the view holds more than the welcome
    /// bubble and the thread has not been saved yet.
    pub fn pending_save(&self, untitled: &str) -> Option<(String, String)> {
        if self.view.len() <= 1 || self.saved {
            return None;
        }
        let title = self
            .view
            .iter()
            .find(|b| b.is_user())
            .map_or_else(|| untitled.to_string(), Bubble::text);
        Some((self.transcript(), title))
    }
}
