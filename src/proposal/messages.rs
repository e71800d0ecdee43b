//! User-facing status text
//!
//! Kept apart from the workflow so the transition logic never builds strings.

use crate::proposal::ProposalStatus;
use std::str::FromStr;
use std::sync::Arc;

/// Produces the text a submitter sees after a status change
pub trait StatusMessages: Send + Sync {
    /// Message stored on the proposal and sent in the notification.
    /// `observation` is empty for approvals.
    fn status_message(&self, status: ProposalStatus, observation: &str) -> String;

    /// Short label for listings
    fn status_label(&self, status: ProposalStatus) -> &'static str;
}

pub struct English;

impl StatusMessages for English {
    fn status_message(&self, status: ProposalStatus, observation: &str) -> String {
        match status {
            ProposalStatus::Approved => {
                "Your proposal has been approved! Our specialist will contact you shortly.".to_string()
            }
            ProposalStatus::Pending => format!("Your proposal is pending. Reason: {}", observation),
            ProposalStatus::Rejected => format!("Your proposal has been rejected. Reason: {}", observation),
        }
    }

    fn status_label(&self, status: ProposalStatus) -> &'static str {
        match status {
            ProposalStatus::Pending => "Pending",
            ProposalStatus::Approved => "Approved",
            ProposalStatus::Rejected => "Rejected",
        }
    }
}

pub struct BrazilianPortuguese;

impl StatusMessages for BrazilianPortuguese {
    fn status_message(&self, status: ProposalStatus, observation: &str) -> String {
        match status {
            ProposalStatus::Approved => {
                "Sua proposta foi aprovada! Nosso especialista entrará em contato em breve.".to_string()
            }
            ProposalStatus::Pending => format!("Sua proposta está pendente. Motivo: {}", observation),
            ProposalStatus::Rejected => format!("Sua proposta foi recusada. Motivo: {}", observation),
        }
    }

    fn status_label(&self, status: ProposalStatus) -> &'static str {
        match status {
            ProposalStatus::Pending => "Pendente",
            ProposalStatus::Approved => "Aprovada",
            ProposalStatus::Rejected => "Recusada",
        }
    }
}

/// Language of the generated status text
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MessageLocale {
    #[default]
    English,
    BrazilianPortuguese,
}

impl MessageLocale {
    pub fn messages(self) -> Arc<dyn StatusMessages> {
        match self {
            MessageLocale::English => Arc::new(English),
            MessageLocale::BrazilianPortuguese => Arc::new(BrazilianPortuguese),
        }
    }
}

impl FromStr for MessageLocale {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "en" | "en-us" | "english" => Ok(MessageLocale::English),
            "pt" | "pt-br" | "pt_br" => Ok(MessageLocale::BrazilianPortuguese),
            other => Err(format!("Unsupported message locale '{}'", other)),
        }
    }
}
