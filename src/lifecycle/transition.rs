//! Transition tables for tickets and offers.

use std::fmt;

use serde::Serialize;

use super::LifecycleError;
use crate::models::{OfferStatus, TicketStatus};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TicketEvent {
    OfferPlaced,
    OfferAccepted,
    /// The last pending offer on the ticket went away.
    OffersWithdrawn,
    Repriced,
    Removed,
}

impl fmt::Display for TicketEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            TicketEvent::OfferPlaced => "place an offer on",
            TicketEvent::OfferAccepted => "accept an offer on",
            TicketEvent::OffersWithdrawn => "withdraw offers from",
            TicketEvent::Repriced => "reprice",
            TicketEvent::Removed => "remove",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OfferEvent {
    Accept,
    Decline,
    Reoffer,
    Withdraw,
    /// The buyer won another ticket of the same event.
    BuyerWonSibling,
    /// Another offer on the same ticket was accepted.
    Superseded,
    TicketRemoved,
}

impl fmt::Display for OfferEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            OfferEvent::Accept => "accept",
            OfferEvent::Decline => "decline",
            OfferEvent::Reoffer => "re-offer on",
            OfferEvent::Withdraw => "withdraw",
            OfferEvent::BuyerWonSibling => "clear",
            OfferEvent::Superseded => "supersede",
            OfferEvent::TicketRemoved => "cancel",
        })
    }
}

/// What happens to an offer record after an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OfferFate {
    Becomes(OfferStatus),
    Deleted,
}

pub fn next_ticket_status(
    from: TicketStatus,
    event: TicketEvent,
) -> Result<TicketStatus, LifecycleError> {
    match (from, event) {
        (TicketStatus::Sold, _) => Err(LifecycleError::AlreadySold),
        (TicketStatus::Removed, _) => Err(LifecycleError::TicketRemoved),
        (TicketStatus::Available | TicketStatus::Pending, TicketEvent::OfferPlaced) => {
            Ok(TicketStatus::Pending)
        }
        (TicketStatus::Pending, TicketEvent::OfferAccepted) => Ok(TicketStatus::Sold),
        (TicketStatus::Pending, TicketEvent::OffersWithdrawn) => Ok(TicketStatus::Available),
        (status, TicketEvent::Repriced) => Ok(status),
        (TicketStatus::Available | TicketStatus::Pending, TicketEvent::Removed) => {
            Ok(TicketStatus::Removed)
        }
        (from, event) => Err(LifecycleError::InvalidTicketTransition { from, event }),
    }
}

pub fn next_offer_fate(from: OfferStatus, event: OfferEvent) -> Result<OfferFate, LifecycleError> {
    match (from, event) {
        (OfferStatus::Pending, OfferEvent::Accept) => Ok(OfferFate::Becomes(OfferStatus::Accepted)),
        (OfferStatus::Pending, OfferEvent::Decline) => Ok(OfferFate::Becomes(OfferStatus::Declined)),
        (OfferStatus::Declined, OfferEvent::Reoffer) => Ok(OfferFate::Deleted),
        (OfferStatus::Pending, OfferEvent::Withdraw | OfferEvent::BuyerWonSibling) => {
            Ok(OfferFate::Deleted)
        }
        (
            OfferStatus::Pending | OfferStatus::Declined,
            OfferEvent::Superseded | OfferEvent::TicketRemoved,
        ) => Ok(OfferFate::Becomes(OfferStatus::Cancelled)),
        (from, event) => Err(LifecycleError::InvalidOfferTransition { from, event }),
    }
}
