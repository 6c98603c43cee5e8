use std::collections::HashMap;

use axum::extract::{Path, State};
use axum::response::{IntoResponse, Response};
use axum::Json;
use uuid::Uuid;

use super::load_ticket;
use crate::auth::Session;
use crate::lifecycle::available_actions;
use crate::models::{OfferView, SubmitOfferRequest, Ticket};
use crate::state::AppState;
use crate::utils::error::AppError;
use crate::utils::response::{created, empty_success, success};

/// Offers the caller sent or received, each with what the caller can still
/// do with it.
pub async fn my_offers(State(state): State<AppState>, session: Session) -> Result<Response, AppError> {
    let offers = state.store.offers_for_user(session.user_id).await?;

    let mut tickets: HashMap<Uuid, Ticket> = HashMap::new();
    let mut views = Vec::with_capacity(offers.len());
    for offer in offers {
        if !tickets.contains_key(&offer.ticket_id) {
            let ticket = load_ticket(&state, offer.ticket_id).await?;
            tickets.insert(ticket.id, ticket);
        }
        let actions = tickets
            .get(&offer.ticket_id)
            .map(|ticket| available_actions(&offer, ticket, session.user_id))
            .unwrap_or_default();
        views.push(OfferView { offer, actions });
    }

    Ok(success(views, "Offers retrieved").into_response())
}

pub async fn accept_offer(
    State(state): State<AppState>,
    session: Session,
    Path(offer_id): Path<Uuid>,
) -> Result<Response, AppError> {
    let ticket = state.store.accept_offer(&session, offer_id).await?;
    Ok(success(ticket, "Offer accepted, ticket sold").into_response())
}

pub async fn decline_offer(
    State(state): State<AppState>,
    session: Session,
    Path(offer_id): Path<Uuid>,
) -> Result<Response, AppError> {
    let offer = state.store.decline_offer(&session, offer_id).await?;
    Ok(success(offer, "Offer declined").into_response())
}

pub async fn reoffer(
    State(state): State<AppState>,
    session: Session,
    Path(offer_id): Path<Uuid>,
    Json(request): Json<SubmitOfferRequest>,
) -> Result<Response, AppError> {
    let offer = state
        .store
        .reoffer(&session, offer_id, request.amount)
        .await?;
    // The thread now lives under the new offer id.
    state.chat.close(offer_id).await;
    Ok(created(offer, "Offer resubmitted").into_response())
}

pub async fn cancel_offer(
    State(state): State<AppState>,
    session: Session,
    Path(offer_id): Path<Uuid>,
) -> Result<Response, AppError> {
    state.store.cancel_offer(&session, offer_id).await?;
    Ok(empty_success("Offer cancelled").into_response())
}
