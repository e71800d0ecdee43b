//! Proposal route handlers
//!
//! Dashboard listings and the admin status decision.

use crate::dashboard::{Overview, ProposalSummary};
use crate::error::{validation_error, ApiResult};
use crate::models::{ProposalListQuery, RefreshResponse, StatusUpdateRequest, SuccessResponse, TransitionResponse};
use crate::proposal::{Proposal, TransitionRequest};
use crate::state::SharedState;
use axum::{
    extract::{Path, Query, State},
    Json,
};
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, info};
use validator::Validate;

/// Counters and the most recent proposals
pub async fn overview(
    State(state): State<SharedState>,
) -> ApiResult<Json<SuccessResponse<Overview>>> {
    let overview = state.dashboard.overview().await?;
    Ok(Json(SuccessResponse::with_data("Overview loaded", overview)))
}

/// All proposals, or one specialist's
pub async fn list_proposals(
    State(state): State<SharedState>,
    Query(query): Query<ProposalListQuery>,
) -> ApiResult<Json<SuccessResponse<Vec<ProposalSummary>>>> {
    debug!("Listing proposals (specialist: {:?})", query.specialist);
    let proposals = state.dashboard.list(query.specialist).await?;
    Ok(Json(SuccessResponse::with_data(
        format!("Found {} proposals", proposals.len()),
        proposals,
    )))
}

pub async fn get_proposal(
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> ApiResult<Json<SuccessResponse<Proposal>>> {
    let proposal = state.dashboard.find(&id).await?;
    Ok(Json(SuccessResponse::with_data("Proposal loaded", proposal)))
}

/// Approve, hold or reject a proposal
pub async fn update_status(
    State(state): State<SharedState>,
    Path(id): Path<String>,
    Json(payload): Json<StatusUpdateRequest>,
) -> ApiResult<Json<SuccessResponse<TransitionResponse>>> {
    payload.validate().map_err(|e| validation_error(e.to_string()))?;

    let request = TransitionRequest::new(id, payload.status)
        .with_observation(payload.observation)
        .expecting(payload.expected_updated_at);
    let outcome = state.workflow.request_transition(request).await?;

    let label = state.workflow.messages().status_label(outcome.proposal.status);
    info!("Admin marked proposal {} as {}", outcome.proposal.id, outcome.proposal.status);

    Ok(Json(SuccessResponse::with_data(
        format!("Proposal marked as {}", label),
        TransitionResponse {
            proposal: outcome.proposal,
            notification: outcome.notification,
        },
    )))
}

/// Long-poll until the next transition or the configured timeout
pub async fn wait_for_refresh(
    State(state): State<SharedState>,
) -> ApiResult<Json<SuccessResponse<RefreshResponse>>> {
    let mut refresh = state.workflow.subscribe();

    let refreshed = match tokio::time::timeout(state.refresh_poll, refresh.recv()).await {
        Ok(Ok(_)) | Ok(Err(RecvError::Lagged(_))) => true,
        Ok(Err(RecvError::Closed)) | Err(_) => false,
    };

    Ok(Json(SuccessResponse::with_data(
        if refreshed { "Data changed" } else { "No changes" },
        RefreshResponse { refreshed },
    )))
}
