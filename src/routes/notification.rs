//! Notification route handlers

use crate::error::ApiResult;
use crate::models::{NotificationQuery, SuccessResponse};
use crate::proposal::Notification;
use crate::state::SharedState;
use axum::{
    extract::{Query, State},
    Json,
};

/// Notifications emitted for one user, oldest first
pub async fn list_notifications(
    State(state): State<SharedState>,
    Query(query): Query<NotificationQuery>,
) -> ApiResult<Json<SuccessResponse<Vec<Notification>>>> {
    let notifications = state.notifications.list_for_user(&query.user_id).await?;
    Ok(Json(SuccessResponse::with_data(
        format!("Found {} notifications", notifications.len()),
        notifications,
    )))
}
