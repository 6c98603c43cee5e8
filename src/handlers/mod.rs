use axum::response::{IntoResponse, Response};
use serde::Serialize;
use uuid::Uuid;

use crate::models::{Offer, Ticket, User};
use crate::state::AppState;
use crate::utils::error::AppError;
use crate::utils::response::success;

pub mod chat;
pub mod events;
pub mod notifications;
pub mod offers;
pub mod ratings;
pub mod support;
pub mod tickets;
pub mod users;

#[derive(Serialize)]
struct HealthPayload {
    status: &'static str,
    service: &'static str,
}

pub async fn health_check() -> Response {
    let payload = HealthPayload {
        status: "ok",
        service: "resale-api",
    };

    success(payload, "Health check successful").into_response()
}

pub(crate) async fn load_user(state: &AppState, user_id: Uuid) -> Result<User, AppError> {
    state
        .store
        .get_user(user_id)
        .await?
        .ok_or_else(|| AppError::not_found("User", user_id))
}

pub(crate) async fn load_ticket(state: &AppState, ticket_id: Uuid) -> Result<Ticket, AppError> {
    state
        .store
        .get_ticket(ticket_id)
        .await?
        .ok_or_else(|| AppError::not_found("Ticket", ticket_id))
}

pub(crate) async fn load_offer(state: &AppState, offer_id: Uuid) -> Result<Offer, AppError> {
    state
        .store
        .get_offer(offer_id)
        .await?
        .ok_or_else(|| AppError::not_found("Offer", offer_id))
}
