//! In-memory [`MarketStore`].
//!
//! All commands run under one lock against a draft copy of the state. The
//! draft replaces the live state only when every effect applied, which gives
//! the same all-or-nothing behavior as a database transaction. The unique
//! indexes of the SQL schema are mirrored as checks in [`MarketState::apply`].

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use tokio::sync::Mutex;
use uuid::Uuid;

use super::{
    normalize_phone, validate_support, validate_ticket_type, MarketStore, DUPLICATE_OFFER,
    DUPLICATE_RATING,
};
use crate::auth::{Identity, Session};
use crate::lifecycle::plan::{self, TicketOffers};
use crate::lifecycle::validate::{validate_amount, validate_message};
use crate::lifecycle::Effect;
use crate::models::{
    CreateRatingRequest, CreateSupportRequest, CreateTicketRequest, Event, Message, Offer,
    OfferStatus, Rating, SupportRequest, Ticket, TicketFilter, TicketSort, TicketStatus, User,
};
use crate::utils::error::AppError;

#[derive(Debug, Clone, Default)]
struct MarketState {
    users: HashMap<Uuid, User>,
    events: HashMap<Uuid, Event>,
    tickets: HashMap<Uuid, Ticket>,
    offers: HashMap<Uuid, Offer>,
    messages: Vec<Message>,
    ratings: Vec<Rating>,
    support: Vec<SupportRequest>,
}

impl MarketState {
    fn user(&self, user_id: Uuid) -> Result<&User, AppError> {
        self.users
            .get(&user_id)
            .ok_or_else(|| AppError::not_found("User", user_id))
    }

    fn ticket(&self, ticket_id: Uuid) -> Result<&Ticket, AppError> {
        self.tickets
            .get(&ticket_id)
            .ok_or_else(|| AppError::not_found("Ticket", ticket_id))
    }

    fn ticket_mut(&mut self, ticket_id: Uuid) -> Result<&mut Ticket, AppError> {
        self.tickets
            .get_mut(&ticket_id)
            .ok_or_else(|| AppError::not_found("Ticket", ticket_id))
    }

    fn offer(&self, offer_id: Uuid) -> Result<&Offer, AppError> {
        self.offers
            .get(&offer_id)
            .ok_or_else(|| AppError::not_found("Offer", offer_id))
    }

    fn offers_on(&self, ticket_id: Uuid) -> Vec<Offer> {
        let mut offers: Vec<Offer> = self
            .offers
            .values()
            .filter(|offer| offer.ticket_id == ticket_id)
            .cloned()
            .collect();
        offers.sort_by_key(|offer| (offer.created_at, offer.id));
        offers
    }

    /// Other tickets of the same event on which `buyer_id` has a pending offer.
    fn siblings(&self, ticket: &Ticket, buyer_id: Uuid) -> Vec<TicketOffers> {
        self.tickets
            .values()
            .filter(|other| other.event_id == ticket.event_id && other.id != ticket.id)
            .filter(|other| {
                self.offers.values().any(|offer| {
                    offer.ticket_id == other.id
                        && offer.sender_id == buyer_id
                        && offer.status == OfferStatus::Pending
                })
            })
            .map(|other| TicketOffers {
                ticket: other.clone(),
                offers: self.offers_on(other.id),
            })
            .collect()
    }

    fn apply(&mut self, effects: &[Effect], now: DateTime<Utc>) -> Result<(), AppError> {
        for effect in effects {
            self.apply_one(effect, now)?;
        }
        Ok(())
    }

    fn apply_one(&mut self, effect: &Effect, now: DateTime<Utc>) -> Result<(), AppError> {
        match effect {
            Effect::InsertOffer(offer) => {
                let duplicate = self.offers.values().any(|existing| {
                    existing.ticket_id == offer.ticket_id
                        && existing.sender_id == offer.sender_id
                        && matches!(existing.status, OfferStatus::Pending | OfferStatus::Declined)
                });
                if duplicate {
                    return Err(AppError::Conflict(DUPLICATE_OFFER.to_string()));
                }
                self.offers.insert(offer.id, offer.clone());
            }
            Effect::SetOfferStatus { offer_id, status } => {
                let offer = self
                    .offers
                    .get_mut(offer_id)
                    .ok_or_else(|| AppError::not_found("Offer", offer_id))?;
                offer.status = *status;
                offer.updated_at = now;
            }
            Effect::DeleteOffer { offer_id } => {
                self.offers
                    .remove(offer_id)
                    .ok_or_else(|| AppError::not_found("Offer", offer_id))?;
            }
            Effect::AttachOffer { ticket_id, offer_id } => {
                let ticket = self.ticket_mut(*ticket_id)?;
                if !ticket.offer_ids.contains(offer_id) {
                    ticket.offer_ids.push(*offer_id);
                }
                ticket.updated_at = now;
            }
            Effect::DetachOffer { ticket_id, offer_id } => {
                let ticket = self.ticket_mut(*ticket_id)?;
                ticket.offer_ids.retain(|id| id != offer_id);
                ticket.updated_at = now;
            }
            Effect::SetTicketStatus {
                ticket_id,
                expected,
                next,
            } => {
                let ticket = self.ticket_mut(*ticket_id)?;
                if ticket.status != *expected {
                    return Err(AppError::Conflict(
                        "The listing changed while you were acting on it, please retry".to_string(),
                    ));
                }
                ticket.status = *next;
                ticket.updated_at = now;
            }
            Effect::CompleteSale {
                ticket_id,
                buyer_id,
                offer_id,
            } => {
                let ticket = self.ticket_mut(*ticket_id)?;
                if ticket.status != TicketStatus::Pending {
                    return Err(AppError::AlreadySold);
                }
                ticket.status = TicketStatus::Sold;
                ticket.buyer_id = Some(*buyer_id);
                ticket.offer_ids = vec![*offer_id];
                ticket.updated_at = now;
            }
            Effect::SetTicketPrice { ticket_id, price } => {
                let ticket = self.ticket_mut(*ticket_id)?;
                ticket.price = *price;
                ticket.updated_at = now;
            }
            Effect::DetachTicket {
                event_id,
                ticket_id,
            } => {
                if let Some(event) = self.events.get_mut(event_id) {
                    event.ticket_ids.retain(|id| id != ticket_id);
                    event.updated_at = now;
                }
            }
            Effect::IncrementTicketsSold { user_id } => {
                let user = self
                    .users
                    .get_mut(user_id)
                    .ok_or_else(|| AppError::not_found("User", user_id))?;
                user.tickets_sold += 1;
                user.updated_at = now;
            }
            Effect::TransferThread {
                from_offer_id,
                to_offer_id,
            } => {
                for message in self
                    .messages
                    .iter_mut()
                    .filter(|m| m.offer_id == *from_offer_id)
                {
                    message.offer_id = *to_offer_id;
                }
            }
        }
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct InMemoryStore {
    state: Mutex<MarketState>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Events are curated outside the API; this stands in for that.
    pub async fn seed_event(
        &self,
        name: &str,
        venue: &str,
        starts_at: DateTime<Utc>,
        active: bool,
    ) -> Event {
        let now = Utc::now();
        let event = Event {
            id: Uuid::new_v4(),
            name: name.to_string(),
            venue: venue.to_string(),
            starts_at,
            active,
            ticket_ids: Vec::new(),
            created_at: now,
            updated_at: now,
        };
        self.state
            .lock()
            .await
            .events
            .insert(event.id, event.clone());
        event
    }

    /// Runs `command` against a draft and publishes the draft only on success.
    async fn commit<T, F>(&self, command: F) -> Result<T, AppError>
    where
        F: FnOnce(&mut MarketState) -> Result<T, AppError>,
    {
        let mut state = self.state.lock().await;
        let mut draft = state.clone();
        let output = command(&mut draft)?;
        *state = draft;
        Ok(output)
    }

    async fn read<T, F>(&self, query: F) -> T
    where
        F: FnOnce(&MarketState) -> T,
    {
        let state = self.state.lock().await;
        query(&state)
    }
}

#[async_trait]
impl MarketStore for InMemoryStore {
    async fn upsert_user(&self, identity: &Identity) -> Result<User, AppError> {
        self.commit(|state| {
            let now = Utc::now();
            let existing = state
                .users
                .values_mut()
                .find(|user| user.external_id == identity.external_id);
            let user = match existing {
                Some(user) => {
                    user.email = identity.email.clone();
                    if identity.name.is_some() {
                        user.name = identity.name.clone();
                    }
                    user.verified = identity.verified;
                    user.updated_at = now;
                    user.clone()
                }
                None => {
                    let user = User {
                        id: Uuid::new_v4(),
                        external_id: identity.external_id.clone(),
                        email: identity.email.clone(),
                        name: identity.name.clone(),
                        verified: identity.verified,
                        phone: None,
                        seller_rating: None,
                        tickets_sold: 0,
                        push_subscription: None,
                        created_at: now,
                        updated_at: now,
                    };
                    state.users.insert(user.id, user.clone());
                    user
                }
            };
            Ok(user)
        })
        .await
    }

    async fn get_user(&self, user_id: Uuid) -> Result<Option<User>, AppError> {
        Ok(self.read(|state| state.users.get(&user_id).cloned()).await)
    }

    async fn update_phone(&self, session: &Session, phone: Option<String>) -> Result<User, AppError> {
        self.commit(|state| {
            let user = state
                .users
                .get_mut(&session.user_id)
                .ok_or_else(|| AppError::not_found("User", session.user_id))?;
            user.phone = normalize_phone(phone);
            user.updated_at = Utc::now();
            Ok(user.clone())
        })
        .await
    }

    async fn save_push_subscription(
        &self,
        session: &Session,
        subscription: serde_json::Value,
    ) -> Result<(), AppError> {
        self.commit(|state| {
            let user = state
                .users
                .get_mut(&session.user_id)
                .ok_or_else(|| AppError::not_found("User", session.user_id))?;
            user.push_subscription = Some(subscription);
            user.updated_at = Utc::now();
            Ok(())
        })
        .await
    }

    async fn list_events(&self) -> Result<Vec<Event>, AppError> {
        let mut events: Vec<Event> = self
            .read(|state| state.events.values().filter(|e| e.active).cloned().collect())
            .await;
        events.sort_by_key(|event| event.starts_at);
        Ok(events)
    }

    async fn get_event(&self, event_id: Uuid) -> Result<Option<Event>, AppError> {
        Ok(self
            .read(|state| state.events.get(&event_id).filter(|e| e.active).cloned())
            .await)
    }

    async fn create_ticket(
        &self,
        session: &Session,
        request: &CreateTicketRequest,
    ) -> Result<Ticket, AppError> {
        let price = validate_amount(request.price)?;
        let ticket_type = validate_ticket_type(&request.ticket_type)?;

        self.commit(|state| {
            state.user(session.user_id)?;
            let now = Utc::now();
            let event = state
                .events
                .get_mut(&request.event_id)
                .filter(|event| event.active)
                .ok_or_else(|| AppError::not_found("Event", request.event_id))?;

            let ticket = Ticket {
                id: Uuid::new_v4(),
                event_id: event.id,
                seller_id: session.user_id,
                buyer_id: None,
                price,
                ticket_type,
                status: TicketStatus::Available,
                offer_ids: Vec::new(),
                created_at: now,
                updated_at: now,
            };
            event.ticket_ids.push(ticket.id);
            event.updated_at = now;
            state.tickets.insert(ticket.id, ticket.clone());
            Ok(ticket)
        })
        .await
    }

    async fn get_ticket(&self, ticket_id: Uuid) -> Result<Option<Ticket>, AppError> {
        Ok(self.read(|state| state.tickets.get(&ticket_id).cloned()).await)
    }

    async fn search_tickets(&self, filter: &TicketFilter) -> Result<Vec<Ticket>, AppError> {
        let mut tickets: Vec<Ticket> = self
            .read(|state| {
                state
                    .tickets
                    .values()
                    .filter(|ticket| {
                        state
                            .events
                            .get(&ticket.event_id)
                            .map_or(false, |event| event.active)
                    })
                    .filter(|ticket| filter.matches(ticket))
                    .cloned()
                    .collect()
            })
            .await;

        match filter.sort {
            TicketSort::Newest => tickets.sort_by(|a, b| b.created_at.cmp(&a.created_at)),
            TicketSort::PriceAsc => tickets.sort_by(|a, b| a.price.cmp(&b.price)),
            TicketSort::PriceDesc => tickets.sort_by(|a, b| b.price.cmp(&a.price)),
        }
        Ok(tickets)
    }

    async fn reprice_ticket(
        &self,
        session: &Session,
        ticket_id: Uuid,
        price: Decimal,
    ) -> Result<Ticket, AppError> {
        self.commit(|state| {
            let ticket = state.ticket(ticket_id)?.clone();
            let effects = plan::reprice_ticket(session.user_id, &ticket, price)?;
            state.apply(&effects, Utc::now())?;
            Ok(state.ticket(ticket_id)?.clone())
        })
        .await
    }

    async fn remove_ticket(&self, session: &Session, ticket_id: Uuid) -> Result<Ticket, AppError> {
        self.commit(|state| {
            let ticket = state.ticket(ticket_id)?.clone();
            let offers = state.offers_on(ticket_id);
            let effects = plan::remove_ticket(session.user_id, &ticket, &offers)?;
            state.apply(&effects, Utc::now())?;
            Ok(state.ticket(ticket_id)?.clone())
        })
        .await
    }

    async fn get_offer(&self, offer_id: Uuid) -> Result<Option<Offer>, AppError> {
        Ok(self.read(|state| state.offers.get(&offer_id).cloned()).await)
    }

    async fn offers_for_ticket(&self, ticket_id: Uuid) -> Result<Vec<Offer>, AppError> {
        Ok(self.read(|state| state.offers_on(ticket_id)).await)
    }

    async fn offers_for_user(&self, user_id: Uuid) -> Result<Vec<Offer>, AppError> {
        let mut offers: Vec<Offer> = self
            .read(|state| {
                state
                    .offers
                    .values()
                    .filter(|o| o.sender_id == user_id || o.receiver_id == user_id)
                    .cloned()
                    .collect()
            })
            .await;
        offers.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(offers)
    }

    async fn submit_offer(
        &self,
        session: &Session,
        ticket_id: Uuid,
        amount: Decimal,
    ) -> Result<Offer, AppError> {
        let amount = validate_amount(amount)?;
        self.commit(|state| {
            let buyer = state.user(session.user_id)?.clone();
            let ticket = state.ticket(ticket_id)?.clone();
            let offers = state.offers_on(ticket_id);
            let now = Utc::now();
            let (offer, effects) = plan::submit_offer(&buyer, &ticket, &offers, amount, now)?;
            state.apply(&effects, now)?;
            Ok(offer)
        })
        .await
    }

    async fn accept_offer(&self, session: &Session, offer_id: Uuid) -> Result<Ticket, AppError> {
        self.commit(|state| {
            let offer = state.offer(offer_id)?.clone();
            let ticket = state.ticket(offer.ticket_id)?.clone();
            let offers = state.offers_on(ticket.id);
            let siblings = state.siblings(&ticket, offer.sender_id);
            let effects = plan::accept_offer(session.user_id, &ticket, &offer, &offers, &siblings)?;
            state.apply(&effects, Utc::now())?;
            Ok(state.ticket(ticket.id)?.clone())
        })
        .await
    }

    async fn decline_offer(&self, session: &Session, offer_id: Uuid) -> Result<Offer, AppError> {
        self.commit(|state| {
            let offer = state.offer(offer_id)?.clone();
            let ticket = state.ticket(offer.ticket_id)?.clone();
            let effects = plan::decline_offer(session.user_id, &ticket, &offer)?;
            state.apply(&effects, Utc::now())?;
            Ok(state.offer(offer_id)?.clone())
        })
        .await
    }

    async fn reoffer(
        &self,
        session: &Session,
        offer_id: Uuid,
        amount: Decimal,
    ) -> Result<Offer, AppError> {
        let amount = validate_amount(amount)?;
        self.commit(|state| {
            let buyer = state.user(session.user_id)?.clone();
            let previous = state.offer(offer_id)?.clone();
            let ticket = state.ticket(previous.ticket_id)?.clone();
            let now = Utc::now();
            let (offer, effects) = plan::reoffer(&buyer, &ticket, &previous, amount, now)?;
            state.apply(&effects, now)?;
            Ok(offer)
        })
        .await
    }

    async fn cancel_offer(&self, session: &Session, offer_id: Uuid) -> Result<(), AppError> {
        self.commit(|state| {
            let offer = state.offer(offer_id)?.clone();
            let ticket = state.ticket(offer.ticket_id)?.clone();
            let offers = state.offers_on(ticket.id);
            let effects = plan::cancel_offer(session.user_id, &ticket, &offer, &offers)?;
            state.apply(&effects, Utc::now())
        })
        .await
    }

    async fn submit_rating(
        &self,
        session: &Session,
        request: &CreateRatingRequest,
    ) -> Result<Rating, AppError> {
        self.commit(|state| {
            let purchases = state
                .offers
                .values()
                .filter(|o| {
                    o.sender_id == session.user_id
                        && o.receiver_id == request.seller_id
                        && o.status == OfferStatus::Accepted
                })
                .count();
            let score = plan::check_rating(session.user_id, request.seller_id, purchases, request.score)?;

            let duplicate = state
                .ratings
                .iter()
                .any(|r| r.rater_id == session.user_id && r.seller_id == request.seller_id);
            if duplicate {
                return Err(AppError::Conflict(DUPLICATE_RATING.to_string()));
            }

            let rating = Rating {
                id: Uuid::new_v4(),
                rater_id: session.user_id,
                seller_id: request.seller_id,
                score,
                comment: request.comment.clone(),
                created_at: Utc::now(),
            };
            state.ratings.push(rating.clone());

            let scores: Vec<i32> = state
                .ratings
                .iter()
                .filter(|r| r.seller_id == request.seller_id)
                .map(|r| r.score)
                .collect();
            let average = Decimal::from(scores.iter().sum::<i32>()) / Decimal::from(scores.len() as i64);
            let seller = state
                .users
                .get_mut(&request.seller_id)
                .ok_or_else(|| AppError::not_found("User", request.seller_id))?;
            seller.seller_rating = Some(average.round_dp(2));
            Ok(rating)
        })
        .await
    }

    async fn ratings_for_seller(&self, seller_id: Uuid) -> Result<Vec<Rating>, AppError> {
        Ok(self
            .read(|state| {
                state
                    .ratings
                    .iter()
                    .filter(|r| r.seller_id == seller_id)
                    .cloned()
                    .collect()
            })
            .await)
    }

    async fn append_message(
        &self,
        session: &Session,
        offer_id: Uuid,
        content: String,
    ) -> Result<Message, AppError> {
        let content = validate_message(&content)?.to_string();
        self.commit(|state| {
            let offer = state.offer(offer_id)?;
            let receiver_id = plan::message_receiver(offer, session.user_id)?;
            let message = Message {
                id: Uuid::new_v4(),
                offer_id,
                sender_id: session.user_id,
                receiver_id,
                content,
                created_at: Utc::now(),
            };
            state.messages.push(message.clone());
            Ok(message)
        })
        .await
    }

    async fn messages_for_offer(&self, offer_id: Uuid) -> Result<Vec<Message>, AppError> {
        Ok(self
            .read(|state| {
                state
                    .messages
                    .iter()
                    .filter(|m| m.offer_id == offer_id)
                    .cloned()
                    .collect()
            })
            .await)
    }

    async fn create_support_request(
        &self,
        session: &Session,
        request: &CreateSupportRequest,
    ) -> Result<SupportRequest, AppError> {
        validate_support(request)?;
        self.commit(|state| {
            let support = SupportRequest {
                id: Uuid::new_v4(),
                user_id: session.user_id,
                subject: request.subject.trim().to_string(),
                message: request.message.trim().to_string(),
                created_at: Utc::now(),
            };
            state.support.push(support.clone());
            Ok(support)
        })
        .await
    }
}
