//! Data models for chat threads and their rendered view.

mod bubble;
mod message;
mod session;

pub use bubble::{Bubble, BubbleKind};
pub use message::{Message, MessageRole};
pub use session::Session;
