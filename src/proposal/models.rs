//! Proposal data models
//!
//! Defines the financing proposal record and the notification emitted to its
//! submitter when the status changes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Proposal status in the review workflow
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProposalStatus {
    /// Awaiting review or missing information
    Pending,
    /// Accepted, a specialist will contact the client
    Approved,
    /// Refused by the reviewer
    Rejected,
}

impl ProposalStatus {
    pub const ALL: [ProposalStatus; 3] = [
        ProposalStatus::Pending,
        ProposalStatus::Approved,
        ProposalStatus::Rejected,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ProposalStatus::Pending => "pending",
            ProposalStatus::Approved => "approved",
            ProposalStatus::Rejected => "rejected",
        }
    }

    /// Approved and rejected close the review, though an admin may reopen them.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, ProposalStatus::Pending)
    }

    /// Whether moving into this status needs an admin observation
    pub fn requires_observation(&self) -> bool {
        !matches!(self, ProposalStatus::Approved)
    }
}

impl Default for ProposalStatus {
    fn default() -> Self {
        ProposalStatus::Pending
    }
}

impl fmt::Display for ProposalStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProposalStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ProposalStatus::ALL
            .into_iter()
            .find(|status| status.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("Unknown proposal status '{}'", s))
    }
}

/// Staff member assigned to review a proposal.
///
/// Names outside the roster are kept verbatim so a write puts back exactly
/// what was read.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Specialist {
    Fabricio,
    Neto,
    Wandreyna,
    Suzana,
    Eder,
    Other(String),
}

impl Specialist {
    pub fn as_str(&self) -> &str {
        match self {
            Specialist::Fabricio => "fabricio",
            Specialist::Neto => "neto",
            Specialist::Wandreyna => "wandreyna",
            Specialist::Suzana => "suzana",
            Specialist::Eder => "eder",
            Specialist::Other(name) => name,
        }
    }
}

impl From<String> for Specialist {
    fn from(name: String) -> Self {
        match name.as_str() {
            "fabricio" => Specialist::Fabricio,
            "neto" => Specialist::Neto,
            "wandreyna" => Specialist::Wandreyna,
            "suzana" => Specialist::Suzana,
            "eder" => Specialist::Eder,
            _ => Specialist::Other(name),
        }
    }
}

impl From<Specialist> for String {
    fn from(specialist: Specialist) -> Self {
        match specialist {
            Specialist::Other(name) => name,
            known => known.as_str().to_string(),
        }
    }
}

impl fmt::Display for Specialist {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A financing proposal under review.
///
/// Only the fields the workflow and the dashboard read are typed. Every other
/// key of the stored record (client, vehicle and financing data) lands in
/// `details` and is written back untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Proposal {
    pub id: String,
    /// User who submitted the proposal
    pub user_id: String,
    pub specialist: Specialist,
    #[serde(default)]
    pub status: ProposalStatus,
    /// Text shown to the submitter for the current status
    #[serde(default)]
    pub status_message: String,
    /// Admin justification, empty when approved
    #[serde(default)]
    pub observation: String,
    #[serde(default)]
    pub client_name: String,
    #[serde(default)]
    pub vehicle_brand: String,
    #[serde(default)]
    pub vehicle_model: String,
    pub created_at: DateTime<Utc>,
    /// Last status transition; absent until the first review
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(flatten)]
    pub details: Map<String, Value>,
}

impl Proposal {
    pub fn new(id: impl Into<String>, user_id: impl Into<String>, specialist: Specialist) -> Self {
        Self {
            id: id.into(),
            user_id: user_id.into(),
            specialist,
            status: ProposalStatus::Pending,
            status_message: String::new(),
            observation: String::new(),
            client_name: String::new(),
            vehicle_brand: String::new(),
            vehicle_model: String::new(),
            created_at: Utc::now(),
            updated_at: None,
            details: Map::new(),
        }
    }

    #[allow(dead_code)]
    pub fn with_client(mut self, client_name: impl Into<String>) -> Self {
        self.client_name = client_name.into();
        self
    }

    #[allow(dead_code)]
    pub fn with_vehicle(mut self, brand: impl Into<String>, model: impl Into<String>) -> Self {
        self.vehicle_brand = brand.into();
        self.vehicle_model = model.into();
        self
    }

    #[allow(dead_code)]
    pub fn with_detail(mut self, key: impl Into<String>, value: Value) -> Self {
        self.details.insert(key.into(), value);
        self
    }

    #[allow(dead_code)]
    pub fn with_created_at(mut self, created_at: DateTime<Utc>) -> Self {
        self.created_at = created_at;
        self
    }

    /// Timestamp of the last change, falling back to creation
    pub fn last_modified(&self) -> DateTime<Utc> {
        self.updated_at.unwrap_or(self.created_at)
    }

    /// Financed amount as submitted by the client form
    pub fn finance_value(&self) -> Option<&Value> {
        self.details.get("financeValue")
    }
}

/// Message queued for the user who submitted a proposal
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub id: String,
    pub user_id: String,
    pub message: String,
    /// Status the proposal moved to, for client-side filtering
    pub status: ProposalStatus,
    #[serde(default)]
    pub read: bool,
    pub created_at: DateTime<Utc>,
}

impl Notification {
    pub fn new(user_id: impl Into<String>, message: impl Into<String>, status: ProposalStatus) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            user_id: user_id.into(),
            message: message.into(),
            status,
            read: false,
            created_at: Utc::now(),
        }
    }
}
