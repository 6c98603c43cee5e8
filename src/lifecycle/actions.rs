use uuid::Uuid;

use crate::models::{Offer, OfferAction, OfferStatus, Ticket};

/// What `viewer` may do with `offer` right now.
///
/// Cancelled offers, including the ones left behind by a removed ticket,
/// never offer any action.
pub fn available_actions(offer: &Offer, ticket: &Ticket, viewer: Uuid) -> Vec<OfferAction> {
    let open_ticket = ticket.status.is_listed();
    let is_seller = viewer == offer.receiver_id;
    let is_buyer = viewer == offer.sender_id;

    let mut actions = Vec::new();
    match offer.status {
        OfferStatus::Cancelled => return actions,
        OfferStatus::Pending if is_seller && open_ticket => {
            actions.extend([OfferAction::Accept, OfferAction::Decline]);
        }
        OfferStatus::Pending if is_buyer => actions.push(OfferAction::Cancel),
        OfferStatus::Declined if is_buyer && open_ticket => actions.push(OfferAction::Reoffer),
        OfferStatus::Accepted if is_buyer => actions.push(OfferAction::Rate),
        _ => {}
    }
    if is_seller || is_buyer {
        actions.push(OfferAction::Chat);
    }
    actions
}
