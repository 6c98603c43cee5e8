use axum::extract::State;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::load_user;
use crate::auth::Session;
use crate::notify::{PushDelivery, PushPayload};
use crate::state::AppState;
use crate::utils::error::AppError;
use crate::utils::response::success;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PushRequest {
    pub user_id: Uuid,
    pub title: String,
    pub message: String,
}

#[derive(Debug, Serialize)]
struct PushResult {
    delivery: PushDelivery,
}

/// Relays a notification to another user's stored browser subscription.
pub async fn push(
    State(state): State<AppState>,
    session: Session,
    Json(request): Json<PushRequest>,
) -> Result<Response, AppError> {
    if request.title.trim().is_empty() {
        return Err(AppError::ValidationError("Notification title is required".to_string()));
    }

    let recipient = load_user(&state, request.user_id).await?;
    let subscription = recipient.push_subscription.ok_or_else(|| {
        AppError::NotFound(format!(
            "User with id '{}' has no push subscription",
            request.user_id
        ))
    })?;

    let payload = PushPayload {
        title: request.title,
        body: request.message,
    };
    let delivery = state.notifier.send(&subscription, &payload).await?;
    tracing::info!(from = %session.user_id, to = %request.user_id, ?delivery, "Push relayed");

    Ok(success(PushResult { delivery }, "Notification processed").into_response())
}
