//! File-backed subscriber list.
//!
//! Stored as a JSON object `{ "<id>": { "unsubscribed": bool, "last_seen": rfc3339 } }`.
//! Every mutation rewrites the file atomically.

use crate::capabilities::SubscriptionStore;
use crate::fsutil::write_atomic;
use crate::{PhisError, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tokio::sync::RwLock;
use tracing::{debug, info};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubscriberRecord {
    #[serde(default)]
    pub unsubscribed: bool,
    pub last_seen: DateTime<Utc>,
}

pub struct JsonSubscriberStore {
    path: PathBuf,
    records: RwLock<BTreeMap<String, SubscriberRecord>>,
}

impl JsonSubscriberStore {
    /// Open the store, starting empty when the file does not exist yet
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let records = match tokio::fs::read(&path).await {
            Ok(bytes) if bytes.iter().all(u8::is_ascii_whitespace) => BTreeMap::new(),
            Ok(bytes) => serde_json::from_slice(&bytes).map_err(|e| {
                PhisError::StorageError(format!("subscribers {}: {}", path.display(), e))
            })?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(e) => return Err(e.into()),
        };
        info!(target: "subscribers", path = ?path, count = records.len(), "Subscriber store opened");
        Ok(Self {
            path,
            records: RwLock::new(records),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn get(&self, id: &str) -> Option<SubscriberRecord> {
        self.records.read().await.get(id).cloned()
    }

    /// Persist the changed list first; memory only moves once the file has
    async fn update(&self, id: &str, unsubscribed: bool) -> Result<()> {
        let mut records = self.records.write().await;
        let mut next = records.clone();
        next.insert(
            id.to_string(),
            SubscriberRecord {
                unsubscribed,
                last_seen: Utc::now(),
            },
        );
        let bytes = serde_json::to_vec_pretty(&next)?;
        write_atomic(&self.path, &bytes).await?;
        *records = next;
        debug!(target: "subscribers", id = %id, unsubscribed, "Subscriber updated");
        Ok(())
    }
}

#[async_trait]
impl SubscriptionStore for JsonSubscriberStore {
    async fn mark_unsubscribed(&self, id: &str) -> Result<()> {
        self.update(id, true).await
    }

    async fn record_activity(&self, id: &str) -> Result<()> {
        self.update(id, false).await
    }

    async fn active_subscribers(&self) -> Result<Vec<String>> {
        Ok(self
            .records
            .read()
            .await
            .iter()
            .filter(|(_, r)| !r.unsubscribed)
            .map(|(id, _)| id.clone())
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_activity_and_unsubscribe() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonSubscriberStore::open(dir.path().join("subscribers.json"))
            .await
            .unwrap();

        store.record_activity("whatsapp:+2348000000002").await.unwrap();
        store.record_activity("whatsapp:+2348000000001").await.unwrap();
        store.record_activity("whatsapp:+2348000000003").await.unwrap();
        store.mark_unsubscribed("whatsapp:+2348000000003").await.unwrap();

        let active = store.active_subscribers().await.unwrap();
        assert_eq!(
            active,
            vec!["whatsapp:+2348000000001", "whatsapp:+2348000000002"]
        );
        assert!(store.get("whatsapp:+2348000000003").await.unwrap().unsubscribed);
    }

    #[tokio::test]
    async fn test_resubscribe_after_stop() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonSubscriberStore::open(dir.path().join("s.json")).await.unwrap();

        store.mark_unsubscribed("whatsapp:+1").await.unwrap();
        assert!(store.active_subscribers().await.unwrap().is_empty());
        store.record_activity("whatsapp:+1").await.unwrap();
        assert_eq!(store.active_subscribers().await.unwrap(), vec!["whatsapp:+1"]);
    }

    #[tokio::test]
    async fn test_persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("subscribers.json");
        {
            let store = JsonSubscriberStore::open(&path).await.unwrap();
            store.record_activity("whatsapp:+2348000000001").await.unwrap();
            store.mark_unsubscribed("whatsapp:+2348000000002").await.unwrap();
        }
        let reopened = JsonSubscriberStore::open(&path).await.unwrap();
        assert_eq!(
            reopened.active_subscribers().await.unwrap(),
            vec!["whatsapp:+2348000000001"]
        );
    }

    #[tokio::test]
    async fn test_corrupt_file_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("subscribers.json");
        tokio::fs::write(&path, b"{ not json").await.unwrap();
        assert!(JsonSubscriberStore::open(&path).await.is_err());
    }

    #[tokio::test]
    async fn test_failed_write_leaves_list_unchanged() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("subs.json");
        let store = JsonSubscriberStore::open(&path).await.unwrap();
        store.record_activity("whatsapp:+2348000000001").await.unwrap();

        // a directory where the temp file goes makes every write fail
        std::fs::create_dir(dir.path().join("subs.json.tmp")).unwrap();

        assert!(store.mark_unsubscribed("whatsapp:+2348000000001").await.is_err());
        assert!(store.record_activity("whatsapp:+2348000000002").await.is_err());

        assert!(!store.get("whatsapp:+2348000000001").await.unwrap().unsubscribed);
        assert!(store.get("whatsapp:+2348000000002").await.is_none());
        assert_eq!(
            store.active_subscribers().await.unwrap(),
            vec!["whatsapp:+2348000000001"]
        );

        let reopened = JsonSubscriberStore::open(&path).await.unwrap();
        assert_eq!(
            reopened.active_subscribers().await.unwrap(),
            vec!["whatsapp:+2348000000001"]
        );
    }
}
