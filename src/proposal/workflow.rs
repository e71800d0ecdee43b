//! Proposal review workflow
//!
//! Applies an admin's status decision to a stored proposal, then notifies the
//! submitter and publishes a refresh signal. Every call reads the whole
//! collection, changes one record and writes the whole collection back.

use crate::error::{conflict_error, not_found_error, validation_error, AppError};
use crate::proposal::{
    English, Notification, NotificationSink, Proposal, ProposalStatus, ProposalStore,
    StatusMessages,
};
use chrono::{DateTime, Duration, Utc};
use std::str::FromStr;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};

const REFRESH_CHANNEL_CAPACITY: usize = 16;

/// Which status changes an admin may make
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TransitionPolicy {
    /// Any status may move to any other status
    #[default]
    Permissive,
    /// Approved and rejected proposals can no longer change
    TerminalLocked,
}

impl FromStr for TransitionPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "permissive" => Ok(TransitionPolicy::Permissive),
            "terminal_locked" | "terminal-locked" => Ok(TransitionPolicy::TerminalLocked),
            other => Err(format!("Unknown transition policy '{}'", other)),
        }
    }
}

/// Published after every successful transition so views re-read the store
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RefreshSignal;

/// An admin decision on one proposal
#[derive(Debug, Clone)]
pub struct TransitionRequest {
    pub proposal_id: String,
    pub target: ProposalStatus,
    /// Required (non-blank) unless the target is approved
    pub observation: String,
    /// When set, the stored `updatedAt` (or `createdAt` before the first
    /// review) must still match
    pub expected_updated_at: Option<DateTime<Utc>>,
}

impl TransitionRequest {
    pub fn new(proposal_id: impl Into<String>, target: ProposalStatus) -> Self {
        Self {
            proposal_id: proposal_id.into(),
            target,
            observation: String::new(),
            expected_updated_at: None,
        }
    }

    pub fn with_observation(mut self, observation: impl Into<String>) -> Self {
        self.observation = observation.into();
        self
    }

    pub fn expecting(mut self, updated_at: Option<DateTime<Utc>>) -> Self {
        self.expected_updated_at = updated_at;
        self
    }
}

/// What a successful transition wrote
#[derive(Debug, Clone)]
pub struct TransitionOutcome {
    pub proposal: Proposal,
    pub notification: Notification,
}

pub struct ProposalWorkflow {
    proposals: Arc<dyn ProposalStore>,
    notifications: Arc<dyn NotificationSink>,
    messages: Arc<dyn StatusMessages>,
    policy: TransitionPolicy,
    refresh: broadcast::Sender<RefreshSignal>,
}

impl ProposalWorkflow {
    pub fn new(proposals: Arc<dyn ProposalStore>, notifications: Arc<dyn NotificationSink>) -> Self {
        let (refresh, _) = broadcast::channel(REFRESH_CHANNEL_CAPACITY);
        Self {
            proposals,
            notifications,
            messages: Arc::new(English),
            policy: TransitionPolicy::default(),
            refresh,
        }
    }

    pub fn with_messages(mut self, messages: Arc<dyn StatusMessages>) -> Self {
        self.messages = messages;
        self
    }

    pub fn with_policy(mut self, policy: TransitionPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn messages(&self) -> Arc<dyn StatusMessages> {
        Arc::clone(&self.messages)
    }

    /// Receive a signal after each successful transition
    pub fn subscribe(&self) -> broadcast::Receiver<RefreshSignal> {
        self.refresh.subscribe()
    }

    /// Move a proposal to `request.target`.
    ///
    /// # Errors
    /// * `Validation` - blank observation for pending/rejected, or the policy
    ///   forbids leaving the current status
    /// * `NotFound` - no proposal with that id
    /// * `Conflict` - `expected_updated_at` no longer matches
    /// * `Persistence` - the store or sink failed; nothing is retried
    pub async fn request_transition(
        &self,
        request: TransitionRequest,
    ) -> Result<TransitionOutcome, AppError> {
        let target = request.target;
        let observation = if target.requires_observation() {
            let trimmed = request.observation.trim();
            if trimmed.is_empty() {
                return Err(validation_error(format!(
                    "Observation required to mark a proposal as {}",
                    target
                )));
            }
            trimmed.to_string()
        } else {
            String::new()
        };

        let mut proposals = self.proposals.load_all().await?;
        let proposal = proposals
            .iter_mut()
            .find(|p| p.id == request.proposal_id)
            .ok_or_else(|| not_found_error(format!("Proposal {} not found", request.proposal_id)))?;

        if let Some(expected) = request.expected_updated_at {
            if proposal.last_modified() != expected {
                warn!(
                    "Stale transition for proposal {}: expected {}, stored {}",
                    proposal.id,
                    expected,
                    proposal.last_modified()
                );
                return Err(conflict_error(format!(
                    "Proposal {} was modified since it was loaded",
                    proposal.id
                )));
            }
        }

        if self.policy == TransitionPolicy::TerminalLocked
            && proposal.status.is_terminal()
            && proposal.status != target
        {
            return Err(validation_error(format!(
                "Proposal {} is already {} and can no longer change",
                proposal.id, proposal.status
            )));
        }

        let previous = proposal.status;
        let message = self.messages.status_message(target, &observation);
        proposal.status = target;
        proposal.status_message = message.clone();
        proposal.observation = observation;
        proposal.updated_at = Some(next_timestamp(proposal));
        let updated = proposal.clone();

        self.proposals.save_all(&proposals).await?;
        debug!("Saved {} proposals after updating {}", proposals.len(), updated.id);

        let notification = Notification::new(updated.user_id.clone(), message, target);
        if let Err(e) = self.notifications.append(notification.clone()).await {
            error!(
                "Proposal {} saved as {} but notifying user {} failed: {}",
                updated.id, target, updated.user_id, e
            );
            return Err(e.into());
        }

        info!("Proposal {} moved from {} to {}", updated.id, previous, target);
        // No receivers is fine, nobody is watching.
        let _ = self.refresh.send(RefreshSignal);

        Ok(TransitionOutcome {
            proposal: updated,
            notification,
        })
    }
}

/// `now`, but never earlier than one millisecond past the last change
fn next_timestamp(proposal: &Proposal) -> DateTime<Utc> {
    let floor = proposal.last_modified() + Duration::milliseconds(1);
    Utc::now().max(floor)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::proposal::{BrazilianPortuguese, MemoryStore, Specialist};
    use crate::storage::StorageError;
    use async_trait::async_trait;
    use pretty_assertions::assert_eq;

    fn seeded() -> Arc<MemoryStore> {
        Arc::new(MemoryStore::with_proposals(vec![
            Proposal::new("P1", "user-1", Specialist::Fabricio).with_client("Ana Lima"),
            Proposal::new("P2", "user-2", Specialist::Wandreyna).with_client("Bruno Reis"),
        ]))
    }

    fn workflow(store: &Arc<MemoryStore>) -> ProposalWorkflow {
        ProposalWorkflow::new(store.clone(), store.clone())
    }

    fn find(proposals: &[Proposal], id: &str) -> Proposal {
        proposals.iter().find(|p| p.id == id).cloned().unwrap()
    }

    #[tokio::test]
    async fn test_reject_with_observation() {
        let store = seeded();
        let outcome = workflow(&store)
            .request_transition(
                TransitionRequest::new("P1", ProposalStatus::Rejected)
                    .with_observation("income insufficient"),
            )
            .await
            .unwrap();

        let stored = find(&store.load_all().await.unwrap(), "P1");
        assert_eq!(stored, outcome.proposal);
        assert_eq!(stored.status, ProposalStatus::Rejected);
        assert_eq!(stored.observation, "income insufficient");
        assert!(stored.status_message.contains("income insufficient"));

        let notifications = store.notifications().await;
        assert_eq!(notifications.len(), 1);
        assert_eq!(notifications[0].status, ProposalStatus::Rejected);
        assert_eq!(notifications[0].user_id, "user-1");
        assert_eq!(notifications[0].message, stored.status_message);
        assert!(!notifications[0].read);
    }

    #[tokio::test]
    async fn test_approve_clears_observation() {
        let store = seeded();
        let original = find(&store.load_all().await.unwrap(), "P2");

        workflow(&store)
            .request_transition(
                TransitionRequest::new("P2", ProposalStatus::Approved).with_observation("ignored"),
            )
            .await
            .unwrap();

        let stored = find(&store.load_all().await.unwrap(), "P2");
        assert_eq!(stored.status, ProposalStatus::Approved);
        assert_eq!(stored.observation, "");
        assert!(stored.updated_at.unwrap() > original.created_at);
        assert_eq!(stored.created_at, original.created_at);
        assert_eq!(stored.client_name, original.client_name);

        let notifications = store.notifications().await;
        assert_eq!(notifications.len(), 1);
        assert_eq!(notifications[0].user_id, "user-2");
        assert_eq!(notifications[0].status, ProposalStatus::Approved);
    }

    #[tokio::test]
    async fn test_blank_observation_is_rejected_without_mutation() {
        for target in [ProposalStatus::Pending, ProposalStatus::Rejected] {
            let store = seeded();
            let before = store.load_all().await.unwrap();

            let result = workflow(&store)
                .request_transition(TransitionRequest::new("P1", target).with_observation("   "))
                .await;

            assert!(matches!(result, Err(AppError::Validation(_))));
            assert_eq!(store.load_all().await.unwrap(), before);
            assert!(store.notifications().await.is_empty());
        }
    }

    #[tokio::test]
    async fn test_unknown_proposal_changes_nothing() {
        let store = seeded();
        let before = store.load_all().await.unwrap();

        let result = workflow(&store)
            .request_transition(TransitionRequest::new("does-not-exist", ProposalStatus::Approved))
            .await;

        assert!(matches!(result, Err(AppError::NotFound(_))));
        assert_eq!(store.load_all().await.unwrap(), before);
        assert!(store.notifications().await.is_empty());
    }

    #[tokio::test]
    async fn test_any_status_can_be_reentered_by_default() {
        let store = seeded();
        let workflow = workflow(&store);

        workflow
            .request_transition(TransitionRequest::new("P1", ProposalStatus::Approved))
            .await
            .unwrap();
        workflow
            .request_transition(
                TransitionRequest::new("P1", ProposalStatus::Pending).with_observation("missing payslip"),
            )
            .await
            .unwrap();
        let outcome = workflow
            .request_transition(
                TransitionRequest::new("P1", ProposalStatus::Rejected).with_observation("no payslip"),
            )
            .await
            .unwrap();

        assert_eq!(outcome.proposal.status, ProposalStatus::Rejected);
        assert_eq!(store.notifications().await.len(), 3);
    }

    #[tokio::test]
    async fn test_updated_at_strictly_increases() {
        let store = seeded();
        let workflow = workflow(&store);

        let first = workflow
            .request_transition(TransitionRequest::new("P1", ProposalStatus::Approved))
            .await
            .unwrap();
        let second = workflow
            .request_transition(TransitionRequest::new("P1", ProposalStatus::Approved))
            .await
            .unwrap();

        assert!(second.proposal.updated_at > first.proposal.updated_at);
    }

    #[tokio::test]
    async fn test_terminal_locked_policy() {
        let store = seeded();
        let workflow = workflow(&store).with_policy(TransitionPolicy::TerminalLocked);

        workflow
            .request_transition(TransitionRequest::new("P1", ProposalStatus::Approved))
            .await
            .unwrap();
        let before = store.load_all().await.unwrap();

        let result = workflow
            .request_transition(
                TransitionRequest::new("P1", ProposalStatus::Pending).with_observation("reopen"),
            )
            .await;

        assert!(matches!(result, Err(AppError::Validation(_))));
        assert_eq!(store.load_all().await.unwrap(), before);
        assert_eq!(store.notifications().await.len(), 1);
    }

    #[tokio::test]
    async fn test_stale_expected_timestamp_conflicts() {
        let store = seeded();
        let workflow = workflow(&store);

        let first = workflow
            .request_transition(TransitionRequest::new("P1", ProposalStatus::Approved))
            .await
            .unwrap();

        // Creation time no longer matches once the first review has landed.
        let stale = workflow
            .request_transition(
                TransitionRequest::new("P1", ProposalStatus::Rejected)
                    .with_observation("late")
                    .expecting(Some(first.proposal.created_at)),
            )
            .await;
        assert!(matches!(stale, Err(AppError::Conflict(_))));

        let fresh = workflow
            .request_transition(
                TransitionRequest::new("P1", ProposalStatus::Rejected)
                    .with_observation("on time")
                    .expecting(first.proposal.updated_at),
            )
            .await
            .unwrap();
        assert_eq!(fresh.proposal.status, ProposalStatus::Rejected);
    }

    #[tokio::test]
    async fn test_first_review_can_be_guarded() {
        let store = seeded();
        let workflow = workflow(&store);
        let loaded = find(&store.load_all().await.unwrap(), "P1");
        assert_eq!(loaded.updated_at, None);

        let outcome = workflow
            .request_transition(
                TransitionRequest::new("P1", ProposalStatus::Approved)
                    .expecting(Some(loaded.last_modified())),
            )
            .await
            .unwrap();
        assert_eq!(outcome.proposal.status, ProposalStatus::Approved);

        // A second admin still holding the unreviewed copy loses.
        let late = workflow
            .request_transition(
                TransitionRequest::new("P1", ProposalStatus::Rejected)
                    .with_observation("duplicate")
                    .expecting(Some(loaded.last_modified())),
            )
            .await;
        assert!(matches!(late, Err(AppError::Conflict(_))));
        assert_eq!(store.notifications().await.len(), 1);
    }

    #[tokio::test]
    async fn test_refresh_signal_published() {
        let store = seeded();
        let workflow = workflow(&store);
        let mut refresh = workflow.subscribe();

        workflow
            .request_transition(TransitionRequest::new("P2", ProposalStatus::Approved))
            .await
            .unwrap();

        assert_eq!(refresh.try_recv().unwrap(), RefreshSignal);
        assert!(refresh.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_no_refresh_on_failure() {
        let store = seeded();
        let workflow = workflow(&store);
        let mut refresh = workflow.subscribe();

        let _ = workflow
            .request_transition(TransitionRequest::new("nope", ProposalStatus::Approved))
            .await;

        assert!(refresh.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_localized_messages() {
        let store = seeded();
        let outcome = workflow(&store)
            .with_messages(Arc::new(BrazilianPortuguese))
            .request_transition(
                TransitionRequest::new("P1", ProposalStatus::Pending).with_observation("falta CNH"),
            )
            .await
            .unwrap();

        assert_eq!(
            outcome.proposal.status_message,
            "Sua proposta está pendente. Motivo: falta CNH"
        );
    }

    struct BrokenSink;

    #[async_trait]
    impl NotificationSink for BrokenSink {
        async fn append(&self, _notification: Notification) -> Result<(), StorageError> {
            Err(StorageError::Io {
                key: "ccapi_notifications".to_string(),
                source: std::io::Error::other("sink offline"),
            })
        }

        async fn list_for_user(&self, _user_id: &str) -> Result<Vec<Notification>, StorageError> {
            Ok(Vec::new())
        }
    }

    #[tokio::test]
    async fn test_sink_failure_is_propagated() {
        let store = seeded();
        let workflow = ProposalWorkflow::new(store.clone(), Arc::new(BrokenSink));
        let mut refresh = workflow.subscribe();

        let result = workflow
            .request_transition(TransitionRequest::new("P1", ProposalStatus::Approved))
            .await;

        assert!(matches!(result, Err(AppError::Persistence(_))));
        // Best effort: the proposal write already happened.
        let stored = find(&store.load_all().await.unwrap(), "P1");
        assert_eq!(stored.status, ProposalStatus::Approved);
        assert!(refresh.try_recv().is_err());
    }

    struct ReadOnlyStore(MemoryStore);

    #[async_trait]
    impl ProposalStore for ReadOnlyStore {
        async fn load_all(&self) -> Result<Vec<Proposal>, StorageError> {
            self.0.load_all().await
        }

        async fn save_all(&self, _proposals: &[Proposal]) -> Result<(), StorageError> {
            Err(StorageError::Io {
                key: "ccapi_proposals".to_string(),
                source: std::io::Error::from(std::io::ErrorKind::PermissionDenied),
            })
        }
    }

    #[tokio::test]
    async fn test_store_failure_skips_notification() {
        let proposals = Arc::new(ReadOnlyStore(MemoryStore::with_proposals(vec![Proposal::new(
            "P1",
            "user-1",
            Specialist::Eder,
        )])));
        let sink = Arc::new(MemoryStore::new());
        let workflow = ProposalWorkflow::new(proposals, sink.clone());

        let result = workflow
            .request_transition(TransitionRequest::new("P1", ProposalStatus::Approved))
            .await;

        assert!(matches!(result, Err(AppError::Persistence(_))));
        assert!(sink.notifications().await.is_empty());
    }

    #[test]
    fn test_policy_parsing() {
        assert_eq!("permissive".parse::<TransitionPolicy>(), Ok(TransitionPolicy::Permissive));
        assert_eq!("terminal_locked".parse::<TransitionPolicy>(), Ok(TransitionPolicy::TerminalLocked));
        assert!("strict".parse::<TransitionPolicy>().is_err());
    }
}
