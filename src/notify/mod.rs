//! Web push relay.
//!
//! The route handler looks up the browser subscription a user stored and
//! hands it to a [`PushNotifier`] together with the payload. Nothing here
//! decides *when* to notify; the front end calls the endpoint after the
//! action that warrants it.

use std::path::Path;

use async_trait::async_trait;
use serde::Serialize;
use web_push::{
    ContentEncoding, IsahcWebPushClient, SubscriptionInfo, VapidSignatureBuilder, WebPushClient,
    WebPushError, WebPushMessageBuilder,
};

use crate::utils::error::AppError;

/// What the service worker renders as an OS notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PushPayload {
    pub title: String,
    pub body: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PushDelivery {
    Sent,
    Skipped,
}

#[async_trait]
pub trait PushNotifier: Send + Sync {
    async fn send(
        &self,
        subscription: &serde_json::Value,
        payload: &PushPayload,
    ) -> Result<PushDelivery, AppError>;
}

/// Used when no VAPID key is configured.
pub struct DisabledNotifier;

#[async_trait]
impl PushNotifier for DisabledNotifier {
    async fn send(
        &self,
        _subscription: &serde_json::Value,
        payload: &PushPayload,
    ) -> Result<PushDelivery, AppError> {
        tracing::info!(title = %payload.title, "Push disabled, notification skipped");
        Ok(PushDelivery::Skipped)
    }
}

pub struct WebPushNotifier {
    private_key_pem: Vec<u8>,
    subject: String,
    client: IsahcWebPushClient,
}

impl WebPushNotifier {
    pub fn new(private_key_pem: Vec<u8>, subject: impl Into<String>) -> Result<Self, AppError> {
        let client = IsahcWebPushClient::new().map_err(push_error)?;
        Ok(Self {
            private_key_pem,
            subject: subject.into(),
            client,
        })
    }

    pub async fn from_pem_file(path: &Path, subject: impl Into<String>) -> Result<Self, AppError> {
        let pem = tokio::fs::read(path).await.map_err(|e| {
            AppError::InternalServerError(format!(
                "Cannot read VAPID key {}: {}",
                path.display(),
                e
            ))
        })?;
        Self::new(pem, subject)
    }
}

#[async_trait]
impl PushNotifier for WebPushNotifier {
    async fn send(
        &self,
        subscription: &serde_json::Value,
        payload: &PushPayload,
    ) -> Result<PushDelivery, AppError> {
        let info = parse_subscription(subscription)?;
        let content = serde_json::to_vec(payload)
            .map_err(|e| AppError::InternalServerError(format!("Cannot encode push payload: {}", e)))?;

        let message = {
            let mut signature =
                VapidSignatureBuilder::from_pem(self.private_key_pem.as_slice(), &info)
                    .map_err(push_error)?;
            signature.add_claim("sub", self.subject.as_str());
            let signature = signature.build().map_err(push_error)?;

            let mut builder = WebPushMessageBuilder::new(&info);
            builder.set_payload(ContentEncoding::Aes128Gcm, &content);
            builder.set_vapid_signature(signature);
            builder.build().map_err(push_error)?
        };

        self.client.send(message).await.map_err(push_error)?;
        tracing::info!(endpoint = %info.endpoint, "Push notification delivered");
        Ok(PushDelivery::Sent)
    }
}

/// Browser `PushSubscription.toJSON()` output: `{ endpoint, keys: { p256dh, auth } }`.
pub fn parse_subscription(subscription: &serde_json::Value) -> Result<SubscriptionInfo, AppError> {
    serde_json::from_value(subscription.clone())
        .map_err(|e| AppError::ValidationError(format!("Push subscription is malformed: {}", e)))
}

fn push_error(err: WebPushError) -> AppError {
    AppError::ExternalServiceError(format!("Web push failed: {}", err))
}
