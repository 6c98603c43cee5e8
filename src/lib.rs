pub mod auth;
pub mod chat;
pub mod config;
pub mod handlers;
pub mod lifecycle;
pub mod models;
pub mod notify;
pub mod routes;
pub mod state;
pub mod store;
pub mod utils;
