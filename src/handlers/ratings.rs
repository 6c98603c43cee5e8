use axum::extract::{Path, State};
use axum::response::{IntoResponse, Response};
use axum::Json;
use uuid::Uuid;

use crate::auth::Session;
use crate::models::CreateRatingRequest;
use crate::state::AppState;
use crate::utils::error::AppError;
use crate::utils::response::{created, success};

pub async fn submit_rating(
    State(state): State<AppState>,
    session: Session,
    Json(request): Json<CreateRatingRequest>,
) -> Result<Response, AppError> {
    let rating = state.store.submit_rating(&session, &request).await?;
    tracing::info!(seller_id = %rating.seller_id, score = rating.score, "Seller rated");
    Ok(created(rating, "Rating submitted").into_response())
}

pub async fn seller_ratings(
    State(state): State<AppState>,
    _session: Session,
    Path(seller_id): Path<Uuid>,
) -> Result<Response, AppError> {
    let ratings = state.store.ratings_for_seller(seller_id).await?;
    Ok(success(ratings, "Ratings retrieved").into_response())
}
