use axum::extract::{Path, Query, State};
use axum::response::{IntoResponse, Response};
use axum::Json;
use uuid::Uuid;

use super::load_ticket;
use crate::auth::Session;
use crate::lifecycle::available_actions;
use crate::models::{
    CreateTicketRequest, Offer, OfferView, SubmitOfferRequest, Ticket, TicketDetail, TicketFilter,
    UpdateTicketRequest,
};
use crate::state::AppState;
use crate::utils::error::AppError;
use crate::utils::response::{created, success};

/// The seller sees every offer on a ticket, anyone else only their own.
pub(crate) fn visible_offers(ticket: &Ticket, offers: Vec<Offer>, viewer: Uuid) -> Vec<OfferView> {
    offers
        .into_iter()
        .filter(|offer| ticket.seller_id == viewer || offer.sender_id == viewer)
        .map(|offer| {
            let actions = available_actions(&offer, ticket, viewer);
            OfferView { offer, actions }
        })
        .collect()
}

pub async fn list_tickets(
    State(state): State<AppState>,
    _session: Session,
    Query(filter): Query<TicketFilter>,
) -> Result<Response, AppError> {
    if let (Some(min), Some(max)) = (filter.min_price, filter.max_price) {
        if min > max {
            return Err(AppError::ValidationError(
                "min_price cannot be greater than max_price".to_string(),
            ));
        }
    }
    let tickets = state.store.search_tickets(&filter).await?;
    Ok(success(tickets, "Tickets retrieved").into_response())
}

pub async fn create_ticket(
    State(state): State<AppState>,
    session: Session,
    Json(request): Json<CreateTicketRequest>,
) -> Result<Response, AppError> {
    let ticket = state.store.create_ticket(&session, &request).await?;
    Ok(created(ticket, "Ticket listed").into_response())
}

pub async fn get_ticket(
    State(state): State<AppState>,
    session: Session,
    Path(ticket_id): Path<Uuid>,
) -> Result<Response, AppError> {
    let ticket = load_ticket(&state, ticket_id).await?;
    let offers = state.store.offers_for_ticket(ticket_id).await?;
    let offers = visible_offers(&ticket, offers, session.user_id);
    Ok(success(TicketDetail { ticket, offers }, "Ticket retrieved").into_response())
}

pub async fn update_ticket(
    State(state): State<AppState>,
    session: Session,
    Path(ticket_id): Path<Uuid>,
    Json(request): Json<UpdateTicketRequest>,
) -> Result<Response, AppError> {
    let ticket = state
        .store
        .reprice_ticket(&session, ticket_id, request.price)
        .await?;
    Ok(success(ticket, "Ticket updated").into_response())
}

pub async fn remove_ticket(
    State(state): State<AppState>,
    session: Session,
    Path(ticket_id): Path<Uuid>,
) -> Result<Response, AppError> {
    let ticket = state.store.remove_ticket(&session, ticket_id).await?;
    Ok(success(ticket, "Ticket removed").into_response())
}

pub async fn submit_offer(
    State(state): State<AppState>,
    session: Session,
    Path(ticket_id): Path<Uuid>,
    Json(request): Json<SubmitOfferRequest>,
) -> Result<Response, AppError> {
    let offer = state
        .store
        .submit_offer(&session, ticket_id, request.amount)
        .await?;
    Ok(created(offer, "Offer submitted").into_response())
}
