use axum::extract::State;
use axum::response::{IntoResponse, Response};
use axum::Json;

use crate::auth::Session;
use crate::models::CreateSupportRequest;
use crate::state::AppState;
use crate::utils::error::AppError;
use crate::utils::response::created;

pub async fn create_support_request(
    State(state): State<AppState>,
    session: Session,
    Json(request): Json<CreateSupportRequest>,
) -> Result<Response, AppError> {
    let support = state
        .store
        .create_support_request(&session, &request)
        .await?;
    tracing::info!(support_id = %support.id, user_id = %session.user_id, "Support request filed");
    Ok(created(support, "Support request received").into_response())
}
