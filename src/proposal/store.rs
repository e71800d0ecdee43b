//! Proposal storage
//!
//! Persistence seams for the review workflow, plus an in-memory backend.

use crate::proposal::{Notification, Proposal};
use crate::storage::StorageError;
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Whole-collection persistence for proposal records
#[async_trait]
pub trait ProposalStore: Send + Sync {
    /// Snapshot of every stored proposal, in stored order
    async fn load_all(&self) -> Result<Vec<Proposal>, StorageError>;

    /// Replace the stored collection
    async fn save_all(&self, proposals: &[Proposal]) -> Result<(), StorageError>;
}

/// Delivery of per-user notifications
#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn append(&self, notification: Notification) -> Result<(), StorageError>;

    /// Notifications addressed to one user, oldest first
    async fn list_for_user(&self, user_id: &str) -> Result<Vec<Notification>, StorageError>;
}

/// Registered end users, only counted by the dashboard
#[async_trait]
pub trait UserDirectory: Send + Sync {
    async fn count_users(&self) -> Result<usize, StorageError>;
}

/// Thread-safe in-memory store
pub struct MemoryStore {
    proposals: Arc<RwLock<Vec<Proposal>>>,
    notifications: Arc<RwLock<Vec<Notification>>>,
    user_count: usize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::with_proposals(Vec::new())
    }

    pub fn with_proposals(proposals: Vec<Proposal>) -> Self {
        Self {
            proposals: Arc::new(RwLock::new(proposals)),
            notifications: Arc::new(RwLock::new(Vec::new())),
            user_count: 0,
        }
    }

    #[allow(dead_code)]
    pub fn with_user_count(mut self, user_count: usize) -> Self {
        self.user_count = user_count;
        self
    }

    /// Every notification appended so far
    #[allow(dead_code)]
    pub async fn notifications(&self) -> Vec<Notification> {
        self.notifications.read().await.clone()
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ProposalStore for MemoryStore {
    async fn load_all(&self) -> Result<Vec<Proposal>, StorageError> {
        Ok(self.proposals.read().await.clone())
    }

    async fn save_all(&self, proposals: &[Proposal]) -> Result<(), StorageError> {
        let mut stored = self.proposals.write().await;
        *stored = proposals.to_vec();
        Ok(())
    }
}

#[async_trait]
impl NotificationSink for MemoryStore {
    async fn append(&self, notification: Notification) -> Result<(), StorageError> {
        self.notifications.write().await.push(notification);
        Ok(())
    }

    async fn list_for_user(&self, user_id: &str) -> Result<Vec<Notification>, StorageError> {
        let notifications = self.notifications.read().await;
        Ok(notifications
            .iter()
            .filter(|n| n.user_id == user_id)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl UserDirectory for MemoryStore {
    async fn count_users(&self) -> Result<usize, StorageError> {
        Ok(self.user_count)
    }
}
