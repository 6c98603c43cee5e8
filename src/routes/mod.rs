use axum::routing::{delete, get, post, put};
use axum::Router;
use tower_http::trace::TraceLayer;

use crate::config::{create_cors_layer, create_security_headers_layer, Config};
use crate::handlers::{
    chat, events, health_check, notifications, offers, ratings, support, tickets, users,
};
use crate::state::AppState;

pub fn create_routes(state: AppState, config: &Config) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .nest("/api", api_routes())
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(create_security_headers_layer(config.production))
        .layer(create_cors_layer(config.cors_allowed_origins.as_deref()))
}

fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/me", get(users::me).patch(users::update_me))
        .route("/me/push-subscription", put(users::save_push_subscription))
        .route("/users/:id", get(users::profile))
        .route("/users/:id/ratings", get(ratings::seller_ratings))
        .route("/events", get(events::list_events))
        .route("/events/:id", get(events::get_event))
        .route("/tickets", get(tickets::list_tickets).post(tickets::create_ticket))
        .route(
            "/tickets/:id",
            get(tickets::get_ticket)
                .patch(tickets::update_ticket)
                .delete(tickets::remove_ticket),
        )
        .route("/tickets/:id/offers", post(tickets::submit_offer))
        .route("/offers", get(offers::my_offers))
        .route("/offers/:id", delete(offers::cancel_offer))
        .route("/offers/:id/accept", post(offers::accept_offer))
        .route("/offers/:id/decline", post(offers::decline_offer))
        .route("/offers/:id/reoffer", post(offers::reoffer))
        .route(
            "/offers/:id/messages",
            get(chat::history).post(chat::send_message),
        )
        .route("/offers/:id/messages/ws", get(chat::stream))
        .route("/ratings", post(ratings::submit_rating))
        .route("/notifications/push", post(notifications::push))
        .route("/support", post(support::create_support_request))
}
