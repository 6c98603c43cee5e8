use std::fmt;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use super::offer::OfferView;

/// Ticket lifecycle states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "ticket_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum TicketStatus {
    Available,
    Pending,
    Sold,
    Removed,
}

impl TicketStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TicketStatus::Available => "available",
            TicketStatus::Pending => "pending",
            TicketStatus::Sold => "sold",
            TicketStatus::Removed => "removed",
        }
    }

    /// Whether the ticket is still listed inventory of its event.
    pub fn is_listed(&self) -> bool {
        matches!(self, TicketStatus::Available | TicketStatus::Pending)
    }
}

impl fmt::Display for TicketStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A resellable ticket for one event, listed by one seller.
///
/// `offer_ids` is the ticket's offer collection. Once the ticket is Sold it
/// holds exactly the accepted offer and `buyer_id` is set; before that
/// `buyer_id` is always `None`.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Ticket {
    pub id: Uuid,
    pub event_id: Uuid,
    pub seller_id: Uuid,
    pub buyer_id: Option<Uuid>,
    pub price: Decimal,
    pub ticket_type: String,
    pub status: TicketStatus,
    pub offer_ids: Vec<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Ticket as seen by one viewer, with the offers that viewer may see.
#[derive(Debug, Clone, Serialize)]
pub struct TicketDetail {
    #[serde(flatten)]
    pub ticket: Ticket,
    pub offers: Vec<OfferView>,
}

#[derive(Debug, Deserialize)]
pub struct CreateTicketRequest {
    pub event_id: Uuid,
    pub price: Decimal,
    pub ticket_type: String,
}

#[derive(Debug, Deserialize)]
pub struct UpdateTicketRequest {
    pub price: Decimal,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TicketSort {
    #[default]
    Newest,
    PriceAsc,
    PriceDesc,
}

/// Browse filters. Without a `status`, only listed tickets are returned.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TicketFilter {
    pub event_id: Option<Uuid>,
    pub seller_id: Option<Uuid>,
    pub ticket_type: Option<String>,
    pub status: Option<TicketStatus>,
    pub min_price: Option<Decimal>,
    pub max_price: Option<Decimal>,
    #[serde(default)]
    pub sort: TicketSort,
}

impl TicketFilter {
    pub fn statuses(&self) -> Vec<TicketStatus> {
        match self.status {
            Some(status) => vec![status],
            None => vec![TicketStatus::Available, TicketStatus::Pending],
        }
    }

    pub fn matches(&self, ticket: &Ticket) -> bool {
        self.statuses().contains(&ticket.status)
            && self.event_id.map_or(true, |id| ticket.event_id == id)
            && self.seller_id.map_or(true, |id| ticket.seller_id == id)
            && self
                .ticket_type
                .as_deref()
                .map_or(true, |kind| ticket.ticket_type.eq_ignore_ascii_case(kind))
            && self.min_price.map_or(true, |min| ticket.price >= min)
            && self.max_price.map_or(true, |max| ticket.price <= max)
    }
}
