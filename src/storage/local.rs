//! Directory-backed local storage
//!
//! Each key is one pretty-printed JSON document at `<root>/<key>.json`.
//! Reads return the whole document, writes replace it through a temp file and
//! a rename so readers never see a half-written file.
//!
//! Other clients write these documents too, so records are parsed one at a
//! time: a record that does not fit is skipped on read and written back
//! untouched, in its original position, on save.

use crate::proposal::{Notification, NotificationSink, Proposal, ProposalStore, UserDirectory};
use crate::storage::StorageError;
use async_trait::async_trait;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::Value;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::sync::Mutex;
use tracing::{debug, warn};

pub const PROPOSALS_KEY: &str = "ccapi_proposals";
pub const NOTIFICATIONS_KEY: &str = "ccapi_notifications";
pub const USERS_KEY: &str = "ccapi_users";

pub struct LocalStorage {
    root: PathBuf,
    /// Serializes read-modify-write cycles within this process
    write_lock: Mutex<()>,
}

impl LocalStorage {
    /// Open (and create if needed) a storage directory
    pub async fn open(root: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let root = root.into();
        fs::create_dir_all(&root).await.map_err(|source| StorageError::Io {
            key: root.display().to_string(),
            source,
        })?;
        debug!("Local storage opened at {}", root.display());

        Ok(Self {
            root,
            write_lock: Mutex::new(()),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.root.join(format!("{}.json", key))
    }

    /// Read a document, `None` when the key was never written
    pub async fn get_item<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, StorageError> {
        let content = match fs::read_to_string(self.path_for(key)).await {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(source) => {
                return Err(StorageError::Io {
                    key: key.to_string(),
                    source,
                })
            }
        };

        if content.trim().is_empty() {
            return Ok(None);
        }

        serde_json::from_str(&content)
            .map(Some)
            .map_err(|source| StorageError::Corrupt {
                key: key.to_string(),
                source,
            })
    }

    /// Replace a document atomically
    pub async fn set_item<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> Result<(), StorageError> {
        let content = serde_json::to_string_pretty(value).map_err(|source| StorageError::Encode {
            key: key.to_string(),
            source,
        })?;

        let path = self.path_for(key);
        let tmp = self.root.join(format!(".{}.json.tmp", key));
        let io_err = |source| StorageError::Io {
            key: key.to_string(),
            source,
        };

        fs::write(&tmp, content).await.map_err(io_err)?;
        fs::rename(&tmp, &path).await.map_err(io_err)?;
        Ok(())
    }

    async fn get_list<T: DeserializeOwned>(&self, key: &str) -> Result<Vec<T>, StorageError> {
        Ok(self.get_item(key).await?.unwrap_or_default())
    }
}

/// Records of `key` that parse as `T`, in stored order
fn parse_records<T: DeserializeOwned>(key: &str, records: &[Value]) -> Vec<T> {
    records
        .iter()
        .enumerate()
        .filter_map(|(index, record)| match T::deserialize(record) {
            Ok(parsed) => Some(parsed),
            Err(e) => {
                warn!("Skipping unreadable record {} in '{}': {}", index, key, e);
                None
            }
        })
        .collect()
}

fn encode<T: Serialize>(key: &str, value: &T) -> Result<Value, StorageError> {
    serde_json::to_value(value).map_err(|source| StorageError::Encode {
        key: key.to_string(),
        source,
    })
}

#[async_trait]
impl ProposalStore for LocalStorage {
    async fn load_all(&self) -> Result<Vec<Proposal>, StorageError> {
        let records: Vec<Value> = self.get_list(PROPOSALS_KEY).await?;
        Ok(parse_records(PROPOSALS_KEY, &records))
    }

    async fn save_all(&self, proposals: &[Proposal]) -> Result<(), StorageError> {
        let _guard = self.write_lock.lock().await;
        let stored: Vec<Value> = self.get_list(PROPOSALS_KEY).await?;

        // Readable slots take the new proposals in order, unreadable ones stay.
        let mut incoming = proposals.iter();
        let mut merged = Vec::with_capacity(stored.len().max(proposals.len()));
        for record in stored {
            if Proposal::deserialize(&record).is_err() {
                merged.push(record);
            } else if let Some(proposal) = incoming.next() {
                merged.push(encode(PROPOSALS_KEY, proposal)?);
            }
        }
        for proposal in incoming {
            merged.push(encode(PROPOSALS_KEY, proposal)?);
        }

        self.set_item(PROPOSALS_KEY, &merged).await
    }
}

#[async_trait]
impl NotificationSink for LocalStorage {
    async fn append(&self, notification: Notification) -> Result<(), StorageError> {
        let _guard = self.write_lock.lock().await;
        let mut notifications: Vec<Value> = self.get_list(NOTIFICATIONS_KEY).await?;
        notifications.push(encode(NOTIFICATIONS_KEY, &notification)?);
        self.set_item(NOTIFICATIONS_KEY, &notifications).await
    }

    async fn list_for_user(&self, user_id: &str) -> Result<Vec<Notification>, StorageError> {
        let notifications: Vec<Value> = self.get_list(NOTIFICATIONS_KEY).await?;
        let mine: Vec<Value> = notifications
            .into_iter()
            .filter(|n| n.get("userId").and_then(Value::as_str) == Some(user_id))
            .collect();
        Ok(parse_records(NOTIFICATIONS_KEY, &mine))
    }
}

#[async_trait]
impl UserDirectory for LocalStorage {
    async fn count_users(&self) -> Result<usize, StorageError> {
        let users: Vec<Value> = self.get_list(USERS_KEY).await?;
        Ok(users.len())
    }
}
