//! Ticket and offer lifecycle.
//!
//! Everything in here is pure: planners look at a snapshot of the records a
//! command touches, check the transition tables in [`transition`] and return
//! the list of [`Effect`]s that carry the command out. Stores apply a plan
//! inside one transaction, so a plan either lands completely or not at all.

pub mod actions;
pub mod plan;
pub mod transition;
pub mod validate;

use rust_decimal::Decimal;
use thiserror::Error;
use uuid::Uuid;

use crate::models::{Offer, OfferStatus, TicketStatus};

pub use actions::available_actions;
pub use transition::{next_offer_fate, next_ticket_status, OfferEvent, OfferFate, TicketEvent};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LifecycleError {
    #[error("This ticket has already been sold")]
    AlreadySold,

    #[error("This ticket has been removed by its seller")]
    TicketRemoved,

    #[error("Cannot {event} a ticket that is {from}")]
    InvalidTicketTransition { from: TicketStatus, event: TicketEvent },

    #[error("Cannot {event} an offer that is {from}")]
    InvalidOfferTransition { from: OfferStatus, event: OfferEvent },

    #[error("Only the seller of this ticket can do that")]
    NotSeller,

    #[error("Only the buyer who made this offer can do that")]
    NotBuyer,

    #[error("Only the buyer and seller of this offer can use its chat")]
    NotParticipant,

    #[error("You cannot make an offer on your own ticket")]
    OwnTicket,

    #[error("You already have an offer on this ticket")]
    DuplicateOffer,

    #[error("Amount must be greater than zero")]
    NonPositiveAmount,

    #[error("Amount cannot exceed 99,999,999.99")]
    AmountTooLarge,

    #[error("Amount can have at most two decimal places")]
    TooManyDecimals,

    #[error("Your account must be verified before making offers")]
    Unverified,

    #[error("Add a phone number to your profile before making offers")]
    MissingPhone,

    #[error("You can only rate a seller after buying a ticket from them")]
    NoCompletedPurchase,

    #[error("You cannot rate yourself")]
    SelfRating,

    #[error("Rating score must be between 1 and 5")]
    ScoreOutOfRange,

    #[error("Message cannot be empty")]
    EmptyMessage,

    #[error("Message is too long")]
    MessageTooLong,

    #[error("This conversation is closed")]
    ThreadClosed,
}

/// One record change. Stores apply effects in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    InsertOffer(Offer),
    SetOfferStatus {
        offer_id: Uuid,
        status: OfferStatus,
    },
    DeleteOffer {
        offer_id: Uuid,
    },
    AttachOffer {
        ticket_id: Uuid,
        offer_id: Uuid,
    },
    DetachOffer {
        ticket_id: Uuid,
        offer_id: Uuid,
    },
    /// Conditional write: only applies while the ticket is still `expected`.
    SetTicketStatus {
        ticket_id: Uuid,
        expected: TicketStatus,
        next: TicketStatus,
    },
    /// Pending -> Sold as a compare-and-swap. Sets the buyer and collapses
    /// the offer collection to the accepted offer.
    CompleteSale {
        ticket_id: Uuid,
        buyer_id: Uuid,
        offer_id: Uuid,
    },
    SetTicketPrice {
        ticket_id: Uuid,
        price: Decimal,
    },
    DetachTicket {
        event_id: Uuid,
        ticket_id: Uuid,
    },
    IncrementTicketsSold {
        user_id: Uuid,
    },
    /// Re-keys a chat thread onto the offer that replaced it.
    TransferThread {
        from_offer_id: Uuid,
        to_offer_id: Uuid,
    },
}

#[cfg(test)]
pub(crate) mod fixtures {
    use std::str::FromStr;

    use chrono::Utc;
    use rust_decimal::Decimal;
    use uuid::Uuid;

    use crate::models::{Offer, OfferStatus, Ticket, TicketStatus, User};

    /// A verified user with a phone number.
    pub fn user() -> User {
        let id = Uuid::new_v4();
        User {
            id,
            external_id: id.to_string(),
            email: format!("{}@uky.edu", id.simple()),
            name: None,
            verified: true,
            phone: Some("859-555-0100".to_string()),
            seller_rating: None,
            tickets_sold: 0,
            push_subscription: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    pub fn ticket(seller: &User, status: TicketStatus) -> Ticket {
        Ticket {
            id: Uuid::new_v4(),
            event_id: Uuid::new_v4(),
            seller_id: seller.id,
            buyer_id: None,
            price: Decimal::new(5000, 2),
            ticket_type: "Student".to_string(),
            status,
            offer_ids: Vec::new(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    pub fn offer(ticket: &Ticket, buyer: &User, amount: &str, status: OfferStatus) -> Offer {
        Offer {
            id: Uuid::new_v4(),
            ticket_id: ticket.id,
            sender_id: buyer.id,
            receiver_id: ticket.seller_id,
            amount: Decimal::from_str(amount).unwrap(),
            status,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }
}
