//! Command planners.
//!
//! Each planner checks who is acting and which transitions apply, then
//! returns the effects in the order a store must apply them.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use uuid::Uuid;

use super::transition::{next_offer_fate, next_ticket_status, OfferEvent, OfferFate, TicketEvent};
use super::validate::{ensure_can_offer, validate_amount, validate_score};
use super::{Effect, LifecycleError};
use crate::models::{Offer, OfferStatus, Ticket, TicketStatus, User};

/// A ticket together with the offers currently stored for it.
#[derive(Debug, Clone)]
pub struct TicketOffers {
    pub ticket: Ticket,
    pub offers: Vec<Offer>,
}

fn ensure_seller(actor: Uuid, ticket: &Ticket) -> Result<(), LifecycleError> {
    if ticket.seller_id == actor {
        Ok(())
    } else {
        Err(LifecycleError::NotSeller)
    }
}

fn ensure_sender(actor: Uuid, offer: &Offer) -> Result<(), LifecycleError> {
    if offer.sender_id == actor {
        Ok(())
    } else {
        Err(LifecycleError::NotBuyer)
    }
}

fn offer_status_after(offer: &Offer, event: OfferEvent) -> Result<Option<OfferStatus>, LifecycleError> {
    match next_offer_fate(offer.status, event)? {
        OfferFate::Becomes(status) => Ok(Some(status)),
        OfferFate::Deleted => Ok(None),
    }
}

fn new_offer(ticket: &Ticket, sender_id: Uuid, amount: Decimal, now: DateTime<Utc>) -> Offer {
    Offer {
        id: Uuid::new_v4(),
        ticket_id: ticket.id,
        sender_id,
        receiver_id: ticket.seller_id,
        amount,
        status: OfferStatus::Pending,
        created_at: now,
        updated_at: now,
    }
}

fn place_offer_effects(ticket: &Ticket, offer: &Offer) -> Result<Vec<Effect>, LifecycleError> {
    let next = next_ticket_status(ticket.status, TicketEvent::OfferPlaced)?;
    let mut effects = vec![
        Effect::InsertOffer(offer.clone()),
        Effect::AttachOffer {
            ticket_id: ticket.id,
            offer_id: offer.id,
        },
    ];
    if next != ticket.status {
        effects.push(Effect::SetTicketStatus {
            ticket_id: ticket.id,
            expected: ticket.status,
            next,
        });
    }
    Ok(effects)
}

/// Puts a Pending ticket back to Available when none of `remaining` is
/// still Pending.
fn withdrawal_effects(ticket: &Ticket, remaining: &[&Offer]) -> Result<Vec<Effect>, LifecycleError> {
    let still_pending = remaining
        .iter()
        .any(|offer| offer.status == OfferStatus::Pending);
    if ticket.status != TicketStatus::Pending || still_pending {
        return Ok(Vec::new());
    }
    let next = next_ticket_status(ticket.status, TicketEvent::OffersWithdrawn)?;
    Ok(vec![Effect::SetTicketStatus {
        ticket_id: ticket.id,
        expected: ticket.status,
        next,
    }])
}

pub fn submit_offer(
    buyer: &User,
    ticket: &Ticket,
    ticket_offers: &[Offer],
    amount: Decimal,
    now: DateTime<Utc>,
) -> Result<(Offer, Vec<Effect>), LifecycleError> {
    let amount = validate_amount(amount)?;
    ensure_can_offer(buyer)?;
    if ticket.seller_id == buyer.id {
        return Err(LifecycleError::OwnTicket);
    }
    next_ticket_status(ticket.status, TicketEvent::OfferPlaced)?;

    let has_live_offer = ticket_offers
        .iter()
        .any(|offer| offer.sender_id == buyer.id && offer.status.is_live());
    if has_live_offer {
        return Err(LifecycleError::DuplicateOffer);
    }

    let offer = new_offer(ticket, buyer.id, amount, now);
    let effects = place_offer_effects(ticket, &offer)?;
    Ok((offer, effects))
}

/// Accepting an offer sells the ticket.
///
/// `siblings` are the other tickets of the same event; the buyer's pending
/// offers on them are deleted. Every other live offer on the sold ticket is
/// cancelled and the offer collection collapses to the accepted one.
pub fn accept_offer(
    actor: Uuid,
    ticket: &Ticket,
    offer: &Offer,
    ticket_offers: &[Offer],
    siblings: &[TicketOffers],
) -> Result<Vec<Effect>, LifecycleError> {
    ensure_seller(actor, ticket)?;
    next_ticket_status(ticket.status, TicketEvent::OfferAccepted)?;
    let accepted = offer_status_after(offer, OfferEvent::Accept)?.unwrap_or(OfferStatus::Accepted);
    let buyer_id = offer.sender_id;

    let mut effects = vec![Effect::SetOfferStatus {
        offer_id: offer.id,
        status: accepted,
    }];

    for sibling in siblings.iter().filter(|s| s.ticket.id != ticket.id) {
        let (cleared, remaining): (Vec<&Offer>, Vec<&Offer>) = sibling
            .offers
            .iter()
            .partition(|o| o.sender_id == buyer_id && o.status == OfferStatus::Pending);
        if cleared.is_empty() {
            continue;
        }
        for stale in &cleared {
            offer_status_after(stale, OfferEvent::BuyerWonSibling)?;
            effects.push(Effect::DeleteOffer { offer_id: stale.id });
            effects.push(Effect::DetachOffer {
                ticket_id: sibling.ticket.id,
                offer_id: stale.id,
            });
        }
        effects.extend(withdrawal_effects(&sibling.ticket, &remaining)?);
    }

    effects.push(Effect::CompleteSale {
        ticket_id: ticket.id,
        buyer_id,
        offer_id: offer.id,
    });

    for other in ticket_offers
        .iter()
        .filter(|o| o.id != offer.id && o.status.is_live())
    {
        if let Some(status) = offer_status_after(other, OfferEvent::Superseded)? {
            effects.push(Effect::SetOfferStatus {
                offer_id: other.id,
                status,
            });
        }
    }

    effects.push(Effect::DetachTicket {
        event_id: ticket.event_id,
        ticket_id: ticket.id,
    });
    effects.push(Effect::IncrementTicketsSold {
        user_id: ticket.seller_id,
    });
    Ok(effects)
}

pub fn decline_offer(actor: Uuid, ticket: &Ticket, offer: &Offer) -> Result<Vec<Effect>, LifecycleError> {
    ensure_seller(actor, ticket)?;
    let status = offer_status_after(offer, OfferEvent::Decline)?.unwrap_or(OfferStatus::Declined);
    Ok(vec![Effect::SetOfferStatus {
        offer_id: offer.id,
        status,
    }])
}

/// Replaces a declined offer with a fresh pending one.
///
/// The old record is deleted before the new one is inserted so that the
/// one-live-offer-per-buyer constraint holds at every step of the
/// transaction.
pub fn reoffer(
    buyer: &User,
    ticket: &Ticket,
    previous: &Offer,
    amount: Decimal,
    now: DateTime<Utc>,
) -> Result<(Offer, Vec<Effect>), LifecycleError> {
    ensure_sender(buyer.id, previous)?;
    let amount = validate_amount(amount)?;
    ensure_can_offer(buyer)?;
    next_ticket_status(ticket.status, TicketEvent::OfferPlaced)?;
    offer_status_after(previous, OfferEvent::Reoffer)?;

    let offer = new_offer(ticket, buyer.id, amount, now);
    let mut effects = vec![
        Effect::DeleteOffer {
            offer_id: previous.id,
        },
        Effect::DetachOffer {
            ticket_id: ticket.id,
            offer_id: previous.id,
        },
    ];
    effects.extend(place_offer_effects(ticket, &offer)?);
    effects.push(Effect::TransferThread {
        from_offer_id: previous.id,
        to_offer_id: offer.id,
    });
    Ok((offer, effects))
}

pub fn cancel_offer(
    actor: Uuid,
    ticket: &Ticket,
    offer: &Offer,
    ticket_offers: &[Offer],
) -> Result<Vec<Effect>, LifecycleError> {
    ensure_sender(actor, offer)?;
    offer_status_after(offer, OfferEvent::Withdraw)?;

    let mut effects = vec![
        Effect::DeleteOffer { offer_id: offer.id },
        Effect::DetachOffer {
            ticket_id: ticket.id,
            offer_id: offer.id,
        },
    ];
    let remaining: Vec<&Offer> = ticket_offers.iter().filter(|o| o.id != offer.id).collect();
    effects.extend(withdrawal_effects(ticket, &remaining)?);
    Ok(effects)
}

/// Removing a ticket cancels every live offer on it so none is left
/// pointing at a ticket that can no longer be bought.
pub fn remove_ticket(
    actor: Uuid,
    ticket: &Ticket,
    ticket_offers: &[Offer],
) -> Result<Vec<Effect>, LifecycleError> {
    ensure_seller(actor, ticket)?;
    let next = next_ticket_status(ticket.status, TicketEvent::Removed)?;

    let mut effects = vec![Effect::SetTicketStatus {
        ticket_id: ticket.id,
        expected: ticket.status,
        next,
    }];
    for offer in ticket_offers.iter().filter(|o| o.status.is_live()) {
        if let Some(status) = offer_status_after(offer, OfferEvent::TicketRemoved)? {
            effects.push(Effect::SetOfferStatus {
                offer_id: offer.id,
                status,
            });
        }
        effects.push(Effect::DetachOffer {
            ticket_id: ticket.id,
            offer_id: offer.id,
        });
    }
    effects.push(Effect::DetachTicket {
        event_id: ticket.event_id,
        ticket_id: ticket.id,
    });
    Ok(effects)
}

/// Number of offers a plan moves to `Cancelled`.
pub fn cancelled_count(effects: &[Effect]) -> usize {
    effects
        .iter()
        .filter(|effect| {
            matches!(
                effect,
                Effect::SetOfferStatus {
                    status: OfferStatus::Cancelled,
                    ..
                }
            )
        })
        .count()
}

pub fn reprice_ticket(actor: Uuid, ticket: &Ticket, price: Decimal) -> Result<Vec<Effect>, LifecycleError> {
    ensure_seller(actor, ticket)?;
    let price = validate_amount(price)?;
    next_ticket_status(ticket.status, TicketEvent::Repriced)?;
    Ok(vec![Effect::SetTicketPrice {
        ticket_id: ticket.id,
        price,
    }])
}

/// Checks a rating before it is written. `purchases` counts accepted offers
/// from the rater to the seller.
pub fn check_rating(rater_id: Uuid, seller_id: Uuid, purchases: usize, score: i32) -> Result<i32, LifecycleError> {
    if rater_id == seller_id {
        return Err(LifecycleError::SelfRating);
    }
    let score = validate_score(score)?;
    if purchases == 0 {
        return Err(LifecycleError::NoCompletedPurchase);
    }
    Ok(score)
}

/// Returns the counterparty a chat message from `author` is addressed to.
pub fn message_receiver(offer: &Offer, author: Uuid) -> Result<Uuid, LifecycleError> {
    let receiver = if author == offer.sender_id {
        offer.receiver_id
    } else if author == offer.receiver_id {
        offer.sender_id
    } else {
        return Err(LifecycleError::NotParticipant);
    };
    if !offer.status.is_live() {
        return Err(LifecycleError::ThreadClosed);
    }
    Ok(receiver)
}

pub fn ensure_participant(offer: &Offer, user_id: Uuid) -> Result<(), LifecycleError> {
    if user_id == offer.sender_id || user_id == offer.receiver_id {
        Ok(())
    } else {
        Err(LifecycleError::NotParticipant)
    }
}
