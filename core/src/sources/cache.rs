//! Cyclic cached-message source.
//!
//! Round-robins through an immutable, ordered message list. The position lives
//! in a `CursorStore` that names the *next* index to read and is written through
//! to disk after every advance (temp file + rename), so a crash can lose at most
//! the in-flight advance and never leaves a torn cursor file.

use super::{ContentSource, Unavailable};
use crate::content::{ContentItem, ContentOrigin};
use crate::fsutil::write_atomic;
use crate::{PhisError, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// One cached advisory and where it originally came from
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CachedMessage {
    pub message: String,
    pub source: String,
}

#[derive(Serialize, Deserialize)]
struct CursorFile {
    next: usize,
}

/// Process-wide cursor with an explicit load / persist lifecycle
pub struct CursorStore {
    path: Option<PathBuf>,
    next: Mutex<usize>,
}

impl CursorStore {
    /// Cursor that is never written to disk
    pub fn in_memory(start: usize) -> Self {
        Self {
            path: None,
            next: Mutex::new(start),
        }
    }

    /// Load the persisted position, starting at 0 when the file is missing or unreadable
    pub async fn load(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let next = match tokio::fs::read(&path).await {
            Ok(bytes) => match serde_json::from_slice::<CursorFile>(&bytes) {
                Ok(f) => f.next,
                Err(e) => {
                    warn!(target: "cache", path = ?path, error = %e, "Cursor file unreadable; starting at 0");
                    0
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                info!(target: "cache", path = ?path, "No cursor file; starting at 0");
                0
            }
            Err(e) => {
                warn!(target: "cache", path = ?path, error = %e, "Failed to read cursor; starting at 0");
                0
            }
        };
        Self {
            path: Some(path),
            next: Mutex::new(next),
        }
    }

    pub async fn position(&self) -> usize {
        *self.next.lock().await
    }

    /// Return the index to read now and store the following one (mod `len`).
    /// `len` must be non-zero. A call dropped before it returns consumes nothing.
    pub async fn advance(&self, len: usize) -> usize {
        let mut next = self.next.lock().await;
        let current = *next % len;
        let following = (current + 1) % len;
        if let Err(e) = self.persist_value(following).await {
            warn!(target: "cache", error = %e, "Failed to persist cursor");
        }
        *next = following;
        current
    }

    pub async fn persist(&self) -> Result<()> {
        let next = *self.next.lock().await;
        self.persist_value(next).await
    }

    async fn persist_value(&self, next: usize) -> Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        let bytes = serde_json::to_vec(&CursorFile { next })?;
        write_atomic(path, &bytes)
            .await
            .map_err(|e| PhisError::StorageError(format!("cursor {}: {}", path.display(), e)))
    }
}

pub struct CachedMessageSource {
    label: String,
    messages: Vec<CachedMessage>,
    cursor: CursorStore,
}

impl CachedMessageSource {
    /// Blank messages are dropped so every read yields content.
    pub fn new(messages: Vec<CachedMessage>, cursor: CursorStore) -> Self {
        let messages: Vec<CachedMessage> = messages
            .into_iter()
            .filter(|m| !m.message.trim().is_empty())
            .collect();
        Self {
            label: "CACHE".to_string(),
            messages,
            cursor,
        }
    }

    /// Load a JSON array of `{"message": ..., "source": ...}` records
    pub async fn from_json_file(path: impl AsRef<Path>, cursor: CursorStore) -> Result<Self> {
        let path = path.as_ref();
        let bytes = tokio::fs::read(path).await.map_err(|e| {
            PhisError::ConfigError(format!("cannot read messages {}: {}", path.display(), e))
        })?;
        let messages: Vec<CachedMessage> = serde_json::from_slice(&bytes)?;
        info!(target: "cache", path = ?path, count = messages.len(), "Loaded cached messages");
        Ok(Self::new(messages, cursor))
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn cursor(&self) -> &CursorStore {
        &self.cursor
    }
}

#[async_trait]
impl ContentSource for CachedMessageSource {
    fn label(&self) -> &str {
        &self.label
    }

    async fn fetch(&self) -> std::result::Result<ContentItem, Unavailable> {
        if self.messages.is_empty() {
            return Err(Unavailable::new(&self.label, "no cached messages"));
        }
        let idx = self.cursor.advance(self.messages.len()).await;
        let cached = &self.messages[idx];
        debug!(target: "cache", index = idx, source = %cached.source, "Serving cached message");
        ContentItem::new(
            cached.message.as_str(),
            format!("CACHE-{}", cached.source),
            ContentOrigin::Cache,
        )
        .ok_or_else(|| Unavailable::new(&self.label, "empty cached message"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn messages() -> Vec<CachedMessage> {
        vec![
            CachedMessage {
                message: "Sleep under a treated net every night.".into(),
                source: "WHO".into(),
            },
            CachedMessage {
                message: "Seek testing within 24 hours of a fever.".into(),
                source: "CDC".into(),
            },
            CachedMessage {
                message: "Clear standing water near your home.".into(),
                source: "NMEP".into(),
            },
        ]
    }

    #[tokio::test]
    async fn test_cycle_returns_each_message_once_in_order() {
        let source = CachedMessageSource::new(messages(), CursorStore::in_memory(0));
        let mut seen = Vec::new();
        for _ in 0..source.len() {
            seen.push(source.fetch().await.unwrap());
        }
        let texts: Vec<&str> = seen.iter().map(|c| c.text()).collect();
        let expected: Vec<String> = messages().into_iter().map(|m| m.message).collect();
        assert_eq!(texts, expected);

        // Wraps around
        let again = source.fetch().await.unwrap();
        assert_eq!(again.text(), expected[0]);
    }

    #[tokio::test]
    async fn test_label_carries_original_source() {
        let source = CachedMessageSource::new(messages(), CursorStore::in_memory(1));
        let item = source.fetch().await.unwrap();
        assert_eq!(item.source_label(), "CACHE-CDC");
        assert_eq!(item.origin(), ContentOrigin::Cache);
    }

    #[tokio::test]
    async fn test_empty_list_is_unavailable() {
        let blank = vec![CachedMessage {
            message: "   ".into(),
            source: "X".into(),
        }];
        let source = CachedMessageSource::new(blank, CursorStore::in_memory(0));
        assert!(source.is_empty());
        assert!(source.fetch().await.is_err());
    }

    #[tokio::test]
    async fn test_cursor_survives_restart() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cursor.json");

        let source = CachedMessageSource::new(messages(), CursorStore::load(&path).await);
        source.fetch().await.unwrap();
        source.fetch().await.unwrap();
        drop(source);

        let reloaded = CachedMessageSource::new(messages(), CursorStore::load(&path).await);
        assert_eq!(reloaded.cursor().position().await, 2);
        let item = reloaded.fetch().await.unwrap();
        assert_eq!(item.source_label(), "CACHE-NMEP");
    }

    #[tokio::test]
    async fn test_corrupt_cursor_starts_over() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cursor.json");
        tokio::fs::write(&path, b"not json").await.unwrap();

        let cursor = CursorStore::load(&path).await;
        assert_eq!(cursor.position().await, 0);
    }

    #[tokio::test]
    async fn test_cursor_beyond_shrunk_list_wraps() {
        let source = CachedMessageSource::new(messages(), CursorStore::in_memory(7));
        let item = source.fetch().await.unwrap();
        assert_eq!(item.source_label(), "CACHE-CDC");
    }

    #[tokio::test]
    async fn test_load_messages_from_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("messages.json");
        tokio::fs::write(&path, serde_json::to_vec(&messages()).unwrap())
            .await
            .unwrap();

        let source = CachedMessageSource::from_json_file(&path, CursorStore::in_memory(0))
            .await
            .unwrap();
        assert_eq!(source.len(), 3);
    }

    #[tokio::test]
    async fn test_dropped_advance_does_not_skip() {
        let dir = tempfile::tempdir().unwrap();
        let cursor = CursorStore::load(dir.path().join("cursor.json")).await;

        let dropped = tokio::time::timeout(std::time::Duration::ZERO, cursor.advance(3)).await;
        let index = cursor.advance(3).await;
        if dropped.is_err() {
            assert_eq!(index, 0);
        }
        assert_eq!(cursor.position().await, index + 1);
    }
}
