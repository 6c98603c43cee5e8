use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: Uuid,
    /// Subject claim issued by the identity provider.
    pub external_id: String,
    pub email: String,
    pub name: Option<String>,
    pub verified: bool,
    pub phone: Option<String>,
    pub seller_rating: Option<Decimal>,
    pub tickets_sold: i32,
    #[serde(skip_serializing)]
    pub push_subscription: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    pub fn has_phone(&self) -> bool {
        self.phone
            .as_deref()
            .map(|phone| !phone.trim().is_empty())
            .unwrap_or(false)
    }
}

/// What other students see about a seller.
#[derive(Debug, Clone, Serialize)]
pub struct PublicProfile {
    pub id: Uuid,
    pub name: Option<String>,
    pub verified: bool,
    pub seller_rating: Option<Decimal>,
    pub tickets_sold: i32,
}

impl From<User> for PublicProfile {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            name: user.name,
            verified: user.verified,
            seller_rating: user.seller_rating,
            tickets_sold: user.tickets_sold,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct UpdateProfileRequest {
    pub phone: Option<String>,
}
