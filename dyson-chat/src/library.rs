//! Saved-chat library.
//!
//! Each saved transcript is one JSON file named after its UUIDv7 id, so a
//! directory listing sorts in save order.

use std::path::{Path, PathBuf};

use anyhow::Context;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::LibraryError;
use crate::tracker::Persister;

/// Directory under the home directory holding all dyson state.
pub const STATE_DIR: &str = ".dyson";
const LIBRARY_DIR: &str = "library";

/// A saved chat transcript.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SavedChat {
    pub id: String,
    pub title: String,
    pub content: String,
    pub saved_at: DateTime<Utc>,
}

/// File-backed store of saved chats.
#[derive(Debug, Clone)]
pub struct ChatLibrary {
    dir: PathBuf,
}

impl ChatLibrary {
    /// Open a library rooted at `dir`. The directory is created on first save.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Default library location: `~/.dyson/library`.
    pub fn default_dir() -> anyhow::Result<PathBuf> {
        let home = dirs::home_dir().context("Could not find home directory")?;
        Ok(home.join(STATE_DIR).join(LIBRARY_DIR))
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, id: &str) -> PathBuf {
        self.dir.join(format!("{id}.json"))
    }

    /// Store a transcript under a fresh id.
    pub async fn store(&self, content: &str, title: &str) -> Result<SavedChat, LibraryError> {
        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| LibraryError::io(&self.dir, e))?;

        let chat = SavedChat {
            id: Uuid::now_v7().to_string(),
            title: title.to_string(),
            content: content.to_string(),
            saved_at: Utc::now(),
        };

        let path = self.path_for(&chat.id);
        let json = serde_json::to_vec_pretty(&chat).map_err(|source| LibraryError::Decode {
            path: path.display().to_string(),
            source,
        })?;
        tokio::fs::write(&path, json)
            .await
            .map_err(|e| LibraryError::io(&path, e))?;

        debug!(id = %chat.id, title = %chat.title, "saved chat");
        Ok(chat)
    }

    /// Load one saved chat by id.
    pub async fn load(&self, id: &str) -> Result<SavedChat, LibraryError> {
        if id.is_empty() || id.contains(['/', '\\', '.']) {
            return Err(LibraryError::NotFound(id.to_string()));
        }

        let path = self.path_for(id);
        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(LibraryError::NotFound(id.to_string()));
            }
            Err(e) => return Err(LibraryError::io(&path, e)),
        };

        serde_json::from_slice(&bytes).map_err(|source| LibraryError::Decode {
            path: path.display().to_string(),
            source,
        })
    }

    /// All saved chats, newest first. Unreadable entries are skipped.
    pub async fn list(&self) -> Result<Vec<SavedChat>, LibraryError> {
        let mut entries = match tokio::fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(LibraryError::io(&self.dir, e)),
        };

        let mut chats = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| LibraryError::io(&self.dir, e))?
        {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let Some(id) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            match self.load(id).await {
                Ok(chat) => chats.push(chat),
                Err(e) => warn!(error = %e, "skipping unreadable saved chat"),
            }
        }

        chats.sort_by(|a, b| b.saved_at.cmp(&a.saved_at).then_with(|| b.id.cmp(&a.id)));
        Ok(chats)
    }
}

#[async_trait]
impl Persister for ChatLibrary {
    async fn save(&self, content: &str, title: &str) -> anyhow::Result<()> {
        self.store(content, title).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn store_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let library = ChatLibrary::new(dir.path().join("library"));

        let saved = library.store("User: hi\nAI: hello", "hi").await.unwrap();
        let loaded = library.load(&saved.id).await.unwrap();
        assert_eq!(loaded, saved);
    }

    #[tokio::test]
    async fn list_is_newest_first() {
        let dir = tempfile::tempdir().unwrap();
        let library = ChatLibrary::new(dir.path());

        let first = library.store("a", "first").await.unwrap();
        let second = library.store("b", "second").await.unwrap();

        let titles: Vec<_> = library
            .list()
            .await
            .unwrap()
            .into_iter()
            .map(|c| c.title)
            .collect();
        assert_eq!(titles, vec![second.title, first.title]);
    }

    #[tokio::test]
    async fn list_of_missing_dir_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let library = ChatLibrary::new(dir.path().join("nope"));
        assert!(library.list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn list_skips_foreign_and_broken_files() {
        let dir = tempfile::tempdir().unwrap();
        let library = ChatLibrary::new(dir.path());
        library.store("a", "kept").await.unwrap();
        std::fs::write(dir.path().join("notes.txt"), "ignore me").unwrap();
        std::fs::write(dir.path().join("broken.json"), "{").unwrap();

        let chats = library.list().await.unwrap();
        assert_eq!(chats.len(), 1);
        assert_eq!(chats[0].title, "kept");
    }

    #[tokio::test]
    async fn load_rejects_path_like_ids() {
        let dir = tempfile::tempdir().unwrap();
        let library = ChatLibrary::new(dir.path());
        assert!(matches!(
            library.load("../etc/passwd").await,
            Err(LibraryError::NotFound(_))
        ));
        assert!(matches!(
            library.load("missing").await,
            Err(LibraryError::NotFound(_))
        ));
    }
}
