pub mod event;
pub mod message;
pub mod offer;
pub mod rating;
pub mod support;
pub mod ticket;
pub mod user;

pub use event::Event;
pub use message::{Message, SendMessageRequest};
pub use offer::{Offer, OfferAction, OfferStatus, OfferView, SubmitOfferRequest};
pub use rating::{CreateRatingRequest, Rating};
pub use support::{CreateSupportRequest, SupportRequest};
pub use ticket::{
    CreateTicketRequest, Ticket, TicketDetail, TicketFilter, TicketSort, TicketStatus,
    UpdateTicketRequest,
};
pub use user::{PublicProfile, UpdateProfileRequest, User};
