use std::sync::Arc;

use crate::auth::TokenVerifier;
use crate::chat::ChatHub;
use crate::notify::PushNotifier;
use crate::store::MarketStore;

/// Shared handles every handler can reach.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn MarketStore>,
    pub chat: ChatHub,
    pub notifier: Arc<dyn PushNotifier>,
    pub verifier: Arc<TokenVerifier>,
}

impl AppState {
    pub fn new(
        store: Arc<dyn MarketStore>,
        notifier: Arc<dyn PushNotifier>,
        verifier: TokenVerifier,
    ) -> Self {
        Self {
            store,
            chat: ChatHub::new(),
            notifier,
            verifier: Arc::new(verifier),
        }
    }
}
