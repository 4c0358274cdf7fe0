//! Configuration.
//!
//! Settings come from an optional TOML file (default `~/.dyson/config.toml`);
//! command-line flags override individual keys.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::client::DEFAULT_ENDPOINT;
use crate::library::{ChatLibrary, STATE_DIR};

const CONFIG_FILE: &str = "config.toml";

/// Resolved settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Chat service endpoint.
    pub endpoint: String,
    /// Directory of saved chats; `None` means `~/.dyson/library`.
    pub library_dir: Option<PathBuf>,
    /// Name the assistant introduces itself with.
    pub assistant_name: String,
    /// Request timeout in seconds; unset means wait indefinitely.
    pub timeout_secs: Option<u64>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            library_dir: None,
            assistant_name: "DysonASI".to_string(),
            timeout_secs: None,
        }
    }
}

impl Config {
    /// Default config file path.
    pub fn default_path() -> Option<PathBuf> {
        dirs::home_dir().map(|h| h.join(STATE_DIR).join(CONFIG_FILE))
    }

    /// Load settings. An explicit `path` must exist; the default file is
    /// optional.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::read(path),
            None => match Self::default_path() {
                Some(path) if path.is_file() => Self::read(&path),
                _ => Ok(Self::default()),
            },
        }
    }

    fn read(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        Self::parse(&text).with_context(|| format!("Invalid config {}", path.display()))
    }

    pub fn parse(text: &str) -> Result<Self> {
        Ok(toml::from_str(text)?)
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs.map(Duration::from_secs)
    }

    /// The saved-chat library these settings point at.
    pub fn library(&self) -> Result<ChatLibrary> {
        let dir = match &self.library_dir {
            Some(dir) => dir.clone(),
            None => ChatLibrary::default_dir()?,
        };
        Ok(ChatLibrary::new(dir))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_gives_defaults() {
        assert_eq!(Config::parse("").unwrap(), Config::default());
    }

    #[test]
    fn keys_override_defaults() {
        let config = Config::parse(
            r#"
            endpoint = "http://chat.internal:8080/chat"
            assistant_name = "Ada"
            timeout_secs = 30
            library_dir = "/tmp/chats"
            "#,
        )
        .unwrap();
        assert_eq!(config.endpoint, "http://chat.internal:8080/chat");
        assert_eq!(config.assistant_name, "Ada");
        assert_eq!(config.timeout(), Some(Duration::from_secs(30)));
        assert_eq!(config.library().unwrap().dir(), Path::new("/tmp/chats"));
    }

    #[test]
    fn unknown_keys_are_rejected() {
        assert!(Config::parse("endpont = \"typo\"").is_err());
    }

    #[test]
    fn explicit_missing_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(Config::load(Some(&dir.path().join("missing.toml"))).is_err());
    }

    #[test]
    fn explicit_file_is_read() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "assistant_name = \"Zed\"\n").unwrap();
        let config = Config::load(Some(&path)).unwrap();
        assert_eq!(config.assistant_name, "Zed");
        assert_eq!(config.endpoint, DEFAULT_ENDPOINT);
    }
}
