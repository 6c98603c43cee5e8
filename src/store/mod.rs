//! Record store.
//!
//! [`MarketStore`] is the seam between the HTTP layer and persistence. Every
//! lifecycle command is one call: the implementation loads the records the
//! command touches, asks [`crate::lifecycle::plan`] for the effects and
//! applies them atomically. Two implementations exist: [`PgStore`] for
//! production and [`InMemoryStore`] for tests and local experiments.

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::auth::{Identity, Session};
use crate::models::{
    CreateRatingRequest, CreateSupportRequest, CreateTicketRequest, Event, Message, Offer, Rating,
    SupportRequest, Ticket, TicketFilter, User,
};
use crate::utils::error::AppError;

pub use memory::InMemoryStore;
pub use postgres::PgStore;

pub(crate) const DUPLICATE_OFFER: &str = "You already have an offer on this ticket";
pub(crate) const DUPLICATE_RATING: &str = "You have already rated this seller";

#[async_trait]
pub trait MarketStore: Send + Sync {
    /// Creates the user on first sign-in; refreshes email, name and
    /// verification on later ones.
    async fn upsert_user(&self, identity: &Identity) -> Result<User, AppError>;
    async fn get_user(&self, user_id: Uuid) -> Result<Option<User>, AppError>;
    async fn update_phone(&self, session: &Session, phone: Option<String>) -> Result<User, AppError>;
    async fn save_push_subscription(
        &self,
        session: &Session,
        subscription: serde_json::Value,
    ) -> Result<(), AppError>;

    /// Active events only.
    async fn list_events(&self) -> Result<Vec<Event>, AppError>;
    async fn get_event(&self, event_id: Uuid) -> Result<Option<Event>, AppError>;

    async fn create_ticket(
        &self,
        session: &Session,
        request: &CreateTicketRequest,
    ) -> Result<Ticket, AppError>;
    async fn get_ticket(&self, ticket_id: Uuid) -> Result<Option<Ticket>, AppError>;
    /// Tickets of active events matching `filter`.
    async fn search_tickets(&self, filter: &TicketFilter) -> Result<Vec<Ticket>, AppError>;
    async fn reprice_ticket(
        &self,
        session: &Session,
        ticket_id: Uuid,
        price: Decimal,
    ) -> Result<Ticket, AppError>;
    async fn remove_ticket(&self, session: &Session, ticket_id: Uuid) -> Result<Ticket, AppError>;

    async fn get_offer(&self, offer_id: Uuid) -> Result<Option<Offer>, AppError>;
    async fn offers_for_ticket(&self, ticket_id: Uuid) -> Result<Vec<Offer>, AppError>;
    /// Offers the user sent or received, newest first.
    async fn offers_for_user(&self, user_id: Uuid) -> Result<Vec<Offer>, AppError>;

    async fn submit_offer(
        &self,
        session: &Session,
        ticket_id: Uuid,
        amount: Decimal,
    ) -> Result<Offer, AppError>;
    /// Sells the ticket. Returns the sold ticket, or `AppError::AlreadySold`
    /// when another accept won.
    async fn accept_offer(&self, session: &Session, offer_id: Uuid) -> Result<Ticket, AppError>;
    async fn decline_offer(&self, session: &Session, offer_id: Uuid) -> Result<Offer, AppError>;
    /// Replaces a declined offer. Returns the new pending offer.
    async fn reoffer(
        &self,
        session: &Session,
        offer_id: Uuid,
        amount: Decimal,
    ) -> Result<Offer, AppError>;
    async fn cancel_offer(&self, session: &Session, offer_id: Uuid) -> Result<(), AppError>;

    async fn submit_rating(
        &self,
        session: &Session,
        request: &CreateRatingRequest,
    ) -> Result<Rating, AppError>;
    async fn ratings_for_seller(&self, seller_id: Uuid) -> Result<Vec<Rating>, AppError>;

    /// Appends to the offer's thread. `content` is stored as given.
    async fn append_message(
        &self,
        session: &Session,
        offer_id: Uuid,
        content: String,
    ) -> Result<Message, AppError>;
    /// Thread in creation order.
    async fn messages_for_offer(&self, offer_id: Uuid) -> Result<Vec<Message>, AppError>;

    async fn create_support_request(
        &self,
        session: &Session,
        request: &CreateSupportRequest,
    ) -> Result<SupportRequest, AppError>;
}

pub(crate) fn validate_ticket_type(ticket_type: &str) -> Result<String, AppError> {
    let trimmed = ticket_type.trim();
    if trimmed.is_empty() {
        return Err(AppError::ValidationError("Ticket type is required".to_string()));
    }
    Ok(trimmed.to_string())
}

pub(crate) fn validate_support(request: &CreateSupportRequest) -> Result<(), AppError> {
    if request.subject.trim().is_empty() || request.message.trim().is_empty() {
        return Err(AppError::ValidationError(
            "Subject and message are required".to_string(),
        ));
    }
    Ok(())
}

pub(crate) fn normalize_phone(phone: Option<String>) -> Option<String> {
    phone
        .map(|p| p.trim().to_string())
        .filter(|p| !p.is_empty())
}
