//! Application state management
//!
//! Contains shared state accessible across all handlers.

use crate::config::{Settings, StorageBackend};
use crate::dashboard::Dashboard;
use crate::proposal::{MemoryStore, NotificationSink, ProposalStore, ProposalWorkflow, UserDirectory};
use crate::storage::{LocalStorage, StorageError};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// Application state shared across all handlers
pub struct AppState {
    /// Status transitions and their side effects
    pub workflow: ProposalWorkflow,

    /// Read-only listings
    pub dashboard: Dashboard,

    /// Emitted notifications, for the read-only feed
    pub notifications: Arc<dyn NotificationSink>,

    /// Longest a refresh long-poll waits
    pub refresh_poll: Duration,
}

impl AppState {
    /// Create application state on the configured storage backend
    pub async fn new(settings: &Settings) -> Result<Self, StorageError> {
        match settings.storage.backend {
            StorageBackend::File => {
                let storage = LocalStorage::open(&settings.storage.data_dir).await?;
                info!("Using local storage at {}", storage.root().display());
                Ok(Self::with_backend(Arc::new(storage), settings))
            }
            StorageBackend::Memory => {
                info!("Using in-memory storage, data is lost on restart");
                Ok(Self::with_backend(Arc::new(MemoryStore::new()), settings))
            }
        }
    }

    /// Wire every component onto one backend
    pub fn with_backend<S>(backend: Arc<S>, settings: &Settings) -> Self
    where
        S: ProposalStore + NotificationSink + UserDirectory + 'static,
    {
        let messages = settings.workflow.locale.messages();
        let workflow = ProposalWorkflow::new(backend.clone(), backend.clone())
            .with_messages(messages.clone())
            .with_policy(settings.workflow.policy);
        let dashboard = Dashboard::new(backend.clone(), backend.clone(), messages);

        Self {
            workflow,
            dashboard,
            notifications: backend,
            refresh_poll: settings.workflow.refresh_poll,
        }
    }
}

/// Type alias for shared state
pub type SharedState = Arc<AppState>;
