//! Proposal module - The heart of the review desk
//!
//! Handles financing proposals, their status workflow and the notifications
//! sent to submitters.

mod messages;
mod models;
mod store;
mod workflow;

pub use messages::{BrazilianPortuguese, English, MessageLocale, StatusMessages};
pub use models::*;
pub use store::{MemoryStore, NotificationSink, ProposalStore, UserDirectory};
pub use workflow::{
    ProposalWorkflow, RefreshSignal, TransitionOutcome, TransitionPolicy, TransitionRequest,
};
