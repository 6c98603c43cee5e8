use axum::extract::{Path, State};
use axum::response::{IntoResponse, Response};
use axum::Json;
use uuid::Uuid;

use super::load_user;
use crate::auth::Session;
use crate::models::{PublicProfile, UpdateProfileRequest};
use crate::notify::parse_subscription;
use crate::state::AppState;
use crate::utils::error::AppError;
use crate::utils::response::{empty_success, success};

pub async fn me(State(state): State<AppState>, session: Session) -> Result<Response, AppError> {
    let user = load_user(&state, session.user_id).await?;
    Ok(success(user, "Profile retrieved").into_response())
}

pub async fn update_me(
    State(state): State<AppState>,
    session: Session,
    Json(request): Json<UpdateProfileRequest>,
) -> Result<Response, AppError> {
    let user = state.store.update_phone(&session, request.phone).await?;
    Ok(success(user, "Profile updated").into_response())
}

/// Stores the browser's `PushSubscription` JSON as given, after checking it
/// parses.
pub async fn save_push_subscription(
    State(state): State<AppState>,
    session: Session,
    Json(subscription): Json<serde_json::Value>,
) -> Result<Response, AppError> {
    parse_subscription(&subscription)?;
    state
        .store
        .save_push_subscription(&session, subscription)
        .await?;
    Ok(empty_success("Push subscription saved").into_response())
}

pub async fn profile(
    State(state): State<AppState>,
    _session: Session,
    Path(user_id): Path<Uuid>,
) -> Result<Response, AppError> {
    let user = load_user(&state, user_id).await?;
    Ok(success(PublicProfile::from(user), "Profile retrieved").into_response())
}
