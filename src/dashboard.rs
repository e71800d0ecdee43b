//! Dashboard queries
//!
//! Read-only views over the proposal store: overview counters, the most recent
//! proposals and per-specialist listings.

use crate::error::{not_found_error, AppError};
use crate::proposal::{Proposal, ProposalStatus, ProposalStore, Specialist, StatusMessages, UserDirectory};
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;

/// How many proposals the overview lists
pub const RECENT_LIMIT: usize = 10;

/// Length of the short code shown in listings
const SHORT_CODE_LEN: usize = 6;

/// One row of a proposal listing
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProposalSummary {
    pub id: String,
    pub code: String,
    pub client_name: String,
    pub vehicle: String,
    pub specialist: Specialist,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finance_value: Option<Value>,
    pub status: ProposalStatus,
    pub status_label: &'static str,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Overview {
    pub total_proposals: usize,
    pub total_users: usize,
    pub pending_proposals: usize,
    pub approved_proposals: usize,
    /// Newest first
    pub recent: Vec<ProposalSummary>,
}

pub struct Dashboard {
    proposals: Arc<dyn ProposalStore>,
    users: Arc<dyn UserDirectory>,
    messages: Arc<dyn StatusMessages>,
}

impl Dashboard {
    pub fn new(
        proposals: Arc<dyn ProposalStore>,
        users: Arc<dyn UserDirectory>,
        messages: Arc<dyn StatusMessages>,
    ) -> Self {
        Self {
            proposals,
            users,
            messages,
        }
    }

    pub async fn overview(&self) -> Result<Overview, AppError> {
        let mut proposals = self.proposals.load_all().await?;
        let total_users = self.users.count_users().await?;

        let count = |status: ProposalStatus| proposals.iter().filter(|p| p.status == status).count();
        let pending_proposals = count(ProposalStatus::Pending);
        let approved_proposals = count(ProposalStatus::Approved);
        let total_proposals = proposals.len();

        proposals.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        let recent = proposals
            .iter()
            .take(RECENT_LIMIT)
            .map(|p| self.summarize(p))
            .collect();

        Ok(Overview {
            total_proposals,
            total_users,
            pending_proposals,
            approved_proposals,
            recent,
        })
    }

    /// Proposals in stored order, optionally only one specialist's
    pub async fn list(&self, specialist: Option<Specialist>) -> Result<Vec<ProposalSummary>, AppError> {
        let proposals = self.proposals.load_all().await?;
        Ok(proposals
            .iter()
            .filter(|p| specialist.as_ref().map_or(true, |s| &p.specialist == s))
            .map(|p| self.summarize(p))
            .collect())
    }

    pub async fn find(&self, id: &str) -> Result<Proposal, AppError> {
        let proposals = self.proposals.load_all().await?;
        proposals
            .into_iter()
            .find(|p| p.id == id)
            .ok_or_else(|| not_found_error(format!("Proposal {} not found", id)))
    }

    pub fn summarize(&self, proposal: &Proposal) -> ProposalSummary {
        ProposalSummary {
            id: proposal.id.clone(),
            code: short_code(&proposal.id),
            client_name: proposal.client_name.clone(),
            vehicle: format!("{} {}", proposal.vehicle_brand, proposal.vehicle_model)
                .trim()
                .to_string(),
            specialist: proposal.specialist.clone(),
            finance_value: proposal.finance_value().cloned(),
            status: proposal.status,
            status_label: self.messages.status_label(proposal.status),
            created_at: proposal.created_at,
        }
    }
}

/// Last six characters of an id
pub fn short_code(id: &str) -> String {
    let chars: Vec<char> = id.chars().collect();
    let start = chars.len().saturating_sub(SHORT_CODE_LEN);
    chars[start..].iter().collect()
}
