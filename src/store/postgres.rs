//! PostgreSQL [`MarketStore`].
//!
//! Lifecycle commands run in one transaction each. The ticket row is locked
//! with `FOR UPDATE` before the plan is computed, so two commands on the same
//! ticket see each other's result instead of a stale snapshot. The sale
//! itself is still written as a compare-and-swap on `status = 'pending'`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{PgPool, Postgres, QueryBuilder, Transaction};
use uuid::Uuid;

use super::{
    normalize_phone, validate_support, validate_ticket_type, MarketStore, DUPLICATE_OFFER,
    DUPLICATE_RATING,
};
use crate::auth::{Identity, Session};
use crate::lifecycle::plan::{self, TicketOffers};
use crate::lifecycle::validate::{validate_amount, validate_message};
use crate::lifecycle::Effect;
use crate::models::{
    CreateRatingRequest, CreateSupportRequest, CreateTicketRequest, Event, Message, Offer,
    OfferStatus, Rating, SupportRequest, Ticket, TicketFilter, TicketSort, User,
};
use crate::utils::error::AppError;

type Tx = Transaction<'static, Postgres>;

const RETRY_MESSAGE: &str = "The listing changed while you were acting on it, please retry";

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    async fn begin(&self) -> Result<Tx, AppError> {
        Ok(self.pool.begin().await?)
    }
}

async fn fetch_user(tx: &mut Tx, user_id: Uuid) -> Result<User, AppError> {
    sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = $1")
        .bind(user_id)
        .fetch_optional(&mut **tx)
        .await?
        .ok_or_else(|| AppError::not_found("User", user_id))
}

async fn fetch_offer(tx: &mut Tx, offer_id: Uuid) -> Result<Offer, AppError> {
    sqlx::query_as::<_, Offer>("SELECT * FROM offers WHERE id = $1")
        .bind(offer_id)
        .fetch_optional(&mut **tx)
        .await?
        .ok_or_else(|| AppError::not_found("Offer", offer_id))
}

async fn lock_ticket(tx: &mut Tx, ticket_id: Uuid) -> Result<Ticket, AppError> {
    sqlx::query_as::<_, Ticket>("SELECT * FROM tickets WHERE id = $1 FOR UPDATE")
        .bind(ticket_id)
        .fetch_optional(&mut **tx)
        .await?
        .ok_or_else(|| AppError::not_found("Ticket", ticket_id))
}

async fn ticket_offers(tx: &mut Tx, ticket_id: Uuid) -> Result<Vec<Offer>, AppError> {
    Ok(sqlx::query_as::<_, Offer>(
        "SELECT * FROM offers WHERE ticket_id = $1 ORDER BY created_at, id",
    )
    .bind(ticket_id)
    .fetch_all(&mut **tx)
    .await?)
}

/// Locks the ticket an offer belongs to, then reads the offer again under
/// that lock.
async fn lock_offer(tx: &mut Tx, offer_id: Uuid) -> Result<(Ticket, Offer), AppError> {
    let ticket_id = fetch_offer(tx, offer_id).await?.ticket_id;
    let ticket = lock_ticket(tx, ticket_id).await?;
    let offer = fetch_offer(tx, offer_id).await?;
    Ok((ticket, offer))
}

/// Same-event tickets on which `buyer_id` has a pending offer, locked in id
/// order.
async fn lock_siblings(tx: &mut Tx, ticket: &Ticket, buyer_id: Uuid) -> Result<Vec<TicketOffers>, AppError> {
    let tickets = sqlx::query_as::<_, Ticket>(
        r#"
        SELECT t.* FROM tickets t
        WHERE t.event_id = $1
          AND t.id <> $2
          AND EXISTS (
              SELECT 1 FROM offers o
              WHERE o.ticket_id = t.id AND o.sender_id = $3 AND o.status = 'pending'
          )
        ORDER BY t.id
        FOR UPDATE
        "#,
    )
    .bind(ticket.event_id)
    .bind(ticket.id)
    .bind(buyer_id)
    .fetch_all(&mut **tx)
    .await?;

    let mut siblings = Vec::with_capacity(tickets.len());
    for sibling in tickets {
        let offers = ticket_offers(tx, sibling.id).await?;
        siblings.push(TicketOffers {
            ticket: sibling,
            offers,
        });
    }
    Ok(siblings)
}

/// Sibling locks can deadlock against an accept on a neighbouring ticket;
/// the loser gets a retryable conflict instead of a 500.
fn retryable(err: AppError) -> AppError {
    match err {
        AppError::DatabaseError(err) => AppError::from_write(err, RETRY_MESSAGE),
        other => other,
    }
}

async fn apply_all(tx: &mut Tx, effects: &[Effect], now: DateTime<Utc>) -> Result<(), AppError> {
    for effect in effects {
        apply_effect(tx, effect, now).await?;
    }
    Ok(())
}

async fn apply_effect(tx: &mut Tx, effect: &Effect, now: DateTime<Utc>) -> Result<(), AppError> {
    match effect {
        Effect::InsertOffer(offer) => {
            sqlx::query(
                r#"
                INSERT INTO offers (id, ticket_id, sender_id, receiver_id, amount, status, created_at, updated_at)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
                "#,
            )
            .bind(offer.id)
            .bind(offer.ticket_id)
            .bind(offer.sender_id)
            .bind(offer.receiver_id)
            .bind(offer.amount)
            .bind(offer.status)
            .bind(offer.created_at)
            .bind(offer.updated_at)
            .execute(&mut **tx)
            .await
            .map_err(|e| AppError::from_write(e, DUPLICATE_OFFER))?;
        }
        Effect::SetOfferStatus { offer_id, status } => {
            let result = sqlx::query("UPDATE offers SET status = $2, updated_at = $3 WHERE id = $1")
                .bind(offer_id)
                .bind(status)
                .bind(now)
                .execute(&mut **tx)
                .await
                .map_err(|e| AppError::from_write(e, RETRY_MESSAGE))?;
            if result.rows_affected() == 0 {
                return Err(AppError::not_found("Offer", offer_id));
            }
        }
        Effect::DeleteOffer { offer_id } => {
            sqlx::query("DELETE FROM offers WHERE id = $1")
                .bind(offer_id)
                .execute(&mut **tx)
                .await?;
        }
        Effect::AttachOffer {
            ticket_id,
            offer_id,
        } => {
            sqlx::query(
                r#"
                UPDATE tickets
                SET offer_ids = array_append(offer_ids, $2), updated_at = $3
                WHERE id = $1 AND NOT ($2 = ANY(offer_ids))
                "#,
            )
            .bind(ticket_id)
            .bind(offer_id)
            .bind(now)
            .execute(&mut **tx)
            .await?;
        }
        Effect::DetachOffer {
            ticket_id,
            offer_id,
        } => {
            sqlx::query(
                "UPDATE tickets SET offer_ids = array_remove(offer_ids, $2), updated_at = $3 WHERE id = $1",
            )
            .bind(ticket_id)
            .bind(offer_id)
            .bind(now)
            .execute(&mut **tx)
            .await?;
        }
        Effect::SetTicketStatus {
            ticket_id,
            expected,
            next,
        } => {
            let result = sqlx::query(
                "UPDATE tickets SET status = $3, updated_at = $4 WHERE id = $1 AND status = $2",
            )
            .bind(ticket_id)
            .bind(expected)
            .bind(next)
            .bind(now)
            .execute(&mut **tx)
            .await?;
            if result.rows_affected() == 0 {
                return Err(AppError::Conflict(RETRY_MESSAGE.to_string()));
            }
        }
        Effect::CompleteSale {
            ticket_id,
            buyer_id,
            offer_id,
        } => {
            let result = sqlx::query(
                r#"
                UPDATE tickets
                SET status = 'sold', buyer_id = $2, offer_ids = $3, updated_at = $4
                WHERE id = $1 AND status = 'pending'
                "#,
            )
            .bind(ticket_id)
            .bind(buyer_id)
            .bind(vec![*offer_id])
            .bind(now)
            .execute(&mut **tx)
            .await?;
            if result.rows_affected() == 0 {
                return Err(AppError::AlreadySold);
            }
        }
        Effect::SetTicketPrice { ticket_id, price } => {
            sqlx::query("UPDATE tickets SET price = $2, updated_at = $3 WHERE id = $1")
                .bind(ticket_id)
                .bind(price)
                .bind(now)
                .execute(&mut **tx)
                .await?;
        }
        Effect::DetachTicket {
            event_id,
            ticket_id,
        } => {
            sqlx::query(
                "UPDATE events SET ticket_ids = array_remove(ticket_ids, $2), updated_at = $3 WHERE id = $1",
            )
            .bind(event_id)
            .bind(ticket_id)
            .bind(now)
            .execute(&mut **tx)
            .await?;
        }
        Effect::IncrementTicketsSold { user_id } => {
            sqlx::query("UPDATE users SET tickets_sold = tickets_sold + 1, updated_at = $2 WHERE id = $1")
                .bind(user_id)
                .bind(now)
                .execute(&mut **tx)
                .await?;
        }
        Effect::TransferThread {
            from_offer_id,
            to_offer_id,
        } => {
            sqlx::query("UPDATE messages SET offer_id = $2 WHERE offer_id = $1")
                .bind(from_offer_id)
                .bind(to_offer_id)
                .execute(&mut **tx)
                .await?;
        }
    }
    Ok(())
}

/// Appends the browse filters to a query that already selects `t.*` from
/// `tickets t` joined to active events.
fn push_filters(query: &mut QueryBuilder<'_, Postgres>, filter: &TicketFilter) {
    let statuses: Vec<String> = filter
        .statuses()
        .iter()
        .map(|status| status.as_str().to_string())
        .collect();
    query.push(" AND t.status::text = ANY(");
    query.push_bind(statuses);
    query.push(")");

    if let Some(event_id) = filter.event_id {
        query.push(" AND t.event_id = ").push_bind(event_id);
    }
    if let Some(seller_id) = filter.seller_id {
        query.push(" AND t.seller_id = ").push_bind(seller_id);
    }
    if let Some(ticket_type) = &filter.ticket_type {
        query
            .push(" AND LOWER(t.ticket_type) = LOWER(")
            .push_bind(ticket_type.clone())
            .push(")");
    }
    if let Some(min_price) = filter.min_price {
        query.push(" AND t.price >= ").push_bind(min_price);
    }
    if let Some(max_price) = filter.max_price {
        query.push(" AND t.price <= ").push_bind(max_price);
    }

    query.push(match filter.sort {
        TicketSort::Newest => " ORDER BY t.created_at DESC",
        TicketSort::PriceAsc => " ORDER BY t.price ASC, t.created_at DESC",
        TicketSort::PriceDesc => " ORDER BY t.price DESC, t.created_at DESC",
    });
}

#[async_trait]
impl MarketStore for PgStore {
    async fn upsert_user(&self, identity: &Identity) -> Result<User, AppError> {
        let user = sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (id, external_id, email, name, verified)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (external_id) DO UPDATE
            SET email = EXCLUDED.email,
                name = COALESCE(EXCLUDED.name, users.name),
                verified = EXCLUDED.verified,
                updated_at = NOW()
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&identity.external_id)
        .bind(&identity.email)
        .bind(&identity.name)
        .bind(identity.verified)
        .fetch_one(&self.pool)
        .await?;
        Ok(user)
    }

    async fn get_user(&self, user_id: Uuid) -> Result<Option<User>, AppError> {
        Ok(sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = $1")
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn update_phone(&self, session: &Session, phone: Option<String>) -> Result<User, AppError> {
        sqlx::query_as::<_, User>(
            "UPDATE users SET phone = $2, updated_at = NOW() WHERE id = $1 RETURNING *",
        )
        .bind(session.user_id)
        .bind(normalize_phone(phone))
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| AppError::not_found("User", session.user_id))
    }

    async fn save_push_subscription(
        &self,
        session: &Session,
        subscription: serde_json::Value,
    ) -> Result<(), AppError> {
        let result = sqlx::query(
            "UPDATE users SET push_subscription = $2, updated_at = NOW() WHERE id = $1",
        )
        .bind(session.user_id)
        .bind(subscription)
        .execute(&self.pool)
        .await?;
        if result.rows_affected() == 0 {
            return Err(AppError::not_found("User", session.user_id));
        }
        Ok(())
    }

    async fn list_events(&self) -> Result<Vec<Event>, AppError> {
        Ok(
            sqlx::query_as::<_, Event>("SELECT * FROM events WHERE active ORDER BY starts_at")
                .fetch_all(&self.pool)
                .await?,
        )
    }

    async fn get_event(&self, event_id: Uuid) -> Result<Option<Event>, AppError> {
        Ok(
            sqlx::query_as::<_, Event>("SELECT * FROM events WHERE id = $1 AND active")
                .bind(event_id)
                .fetch_optional(&self.pool)
                .await?,
        )
    }

    async fn create_ticket(
        &self,
        session: &Session,
        request: &CreateTicketRequest,
    ) -> Result<Ticket, AppError> {
        let price = validate_amount(request.price)?;
        let ticket_type = validate_ticket_type(&request.ticket_type)?;

        let mut tx = self.begin().await?;
        let event_id: Uuid = sqlx::query_scalar("SELECT id FROM events WHERE id = $1 AND active FOR UPDATE")
            .bind(request.event_id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| AppError::not_found("Event", request.event_id))?;

        let ticket = sqlx::query_as::<_, Ticket>(
            r#"
            INSERT INTO tickets (id, event_id, seller_id, price, ticket_type, status)
            VALUES ($1, $2, $3, $4, $5, 'available')
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(event_id)
        .bind(session.user_id)
        .bind(price)
        .bind(ticket_type)
        .fetch_one(&mut *tx)
        .await?;

        sqlx::query(
            "UPDATE events SET ticket_ids = array_append(ticket_ids, $2), updated_at = NOW() WHERE id = $1",
        )
        .bind(event_id)
        .bind(ticket.id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        tracing::info!(ticket_id = %ticket.id, %event_id, "Ticket listed");
        Ok(ticket)
    }

    async fn get_ticket(&self, ticket_id: Uuid) -> Result<Option<Ticket>, AppError> {
        Ok(sqlx::query_as::<_, Ticket>("SELECT * FROM tickets WHERE id = $1")
            .bind(ticket_id)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn search_tickets(&self, filter: &TicketFilter) -> Result<Vec<Ticket>, AppError> {
        let mut query = QueryBuilder::<Postgres>::new(
            "SELECT t.* FROM tickets t JOIN events e ON e.id = t.event_id WHERE e.active",
        );
        push_filters(&mut query, filter);
        Ok(query.build_query_as::<Ticket>().fetch_all(&self.pool).await?)
    }

    async fn reprice_ticket(
        &self,
        session: &Session,
        ticket_id: Uuid,
        price: Decimal,
    ) -> Result<Ticket, AppError> {
        let mut tx = self.begin().await?;
        let ticket = lock_ticket(&mut tx, ticket_id).await?;
        let effects = plan::reprice_ticket(session.user_id, &ticket, price)?;
        apply_all(&mut tx, &effects, Utc::now()).await?;
        let ticket = lock_ticket(&mut tx, ticket_id).await?;
        tx.commit().await?;
        Ok(ticket)
    }

    async fn remove_ticket(&self, session: &Session, ticket_id: Uuid) -> Result<Ticket, AppError> {
        let mut tx = self.begin().await?;
        let ticket = lock_ticket(&mut tx, ticket_id).await?;
        let offers = ticket_offers(&mut tx, ticket_id).await?;
        let effects = plan::remove_ticket(session.user_id, &ticket, &offers)?;
        apply_all(&mut tx, &effects, Utc::now()).await?;
        let ticket = lock_ticket(&mut tx, ticket_id).await?;
        tx.commit().await?;
        tracing::info!(
            %ticket_id,
            cancelled = plan::cancelled_count(&effects),
            "Ticket removed"
        );
        Ok(ticket)
    }

    async fn get_offer(&self, offer_id: Uuid) -> Result<Option<Offer>, AppError> {
        Ok(sqlx::query_as::<_, Offer>("SELECT * FROM offers WHERE id = $1")
            .bind(offer_id)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn offers_for_ticket(&self, ticket_id: Uuid) -> Result<Vec<Offer>, AppError> {
        Ok(sqlx::query_as::<_, Offer>(
            "SELECT * FROM offers WHERE ticket_id = $1 ORDER BY created_at, id",
        )
        .bind(ticket_id)
        .fetch_all(&self.pool)
        .await?)
    }

    async fn offers_for_user(&self, user_id: Uuid) -> Result<Vec<Offer>, AppError> {
        Ok(sqlx::query_as::<_, Offer>(
            r#"
            SELECT * FROM offers
            WHERE sender_id = $1 OR receiver_id = $1
            ORDER BY created_at DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?)
    }

    async fn submit_offer(
        &self,
        session: &Session,
        ticket_id: Uuid,
        amount: Decimal,
    ) -> Result<Offer, AppError> {
        let amount = validate_amount(amount)?;
        let mut tx = self.begin().await?;
        let buyer = fetch_user(&mut tx, session.user_id).await?;
        let ticket = lock_ticket(&mut tx, ticket_id).await?;
        let offers = ticket_offers(&mut tx, ticket_id).await?;

        let now = Utc::now();
        let (offer, effects) = plan::submit_offer(&buyer, &ticket, &offers, amount, now)?;
        apply_all(&mut tx, &effects, now).await?;
        tx.commit().await?;

        tracing::info!(offer_id = %offer.id, %ticket_id, "Offer submitted");
        Ok(offer)
    }

    async fn accept_offer(&self, session: &Session, offer_id: Uuid) -> Result<Ticket, AppError> {
        let mut tx = self.begin().await?;
        let (ticket, offer) = lock_offer(&mut tx, offer_id).await?;
        let offers = ticket_offers(&mut tx, ticket.id).await?;
        let siblings = lock_siblings(&mut tx, &ticket, offer.sender_id)
            .await
            .map_err(retryable)?;

        let effects = plan::accept_offer(session.user_id, &ticket, &offer, &offers, &siblings)?;
        apply_all(&mut tx, &effects, Utc::now())
            .await
            .map_err(retryable)?;
        let sold = lock_ticket(&mut tx, ticket.id).await?;
        tx.commit().await?;

        tracing::info!(%offer_id, ticket_id = %sold.id, buyer_id = %offer.sender_id, "Ticket sold");
        Ok(sold)
    }

    async fn decline_offer(&self, session: &Session, offer_id: Uuid) -> Result<Offer, AppError> {
        let mut tx = self.begin().await?;
        let (ticket, offer) = lock_offer(&mut tx, offer_id).await?;
        let effects = plan::decline_offer(session.user_id, &ticket, &offer)?;
        apply_all(&mut tx, &effects, Utc::now()).await?;
        let offer = fetch_offer(&mut tx, offer_id).await?;
        tx.commit().await?;
        Ok(offer)
    }

    async fn reoffer(
        &self,
        session: &Session,
        offer_id: Uuid,
        amount: Decimal,
    ) -> Result<Offer, AppError> {
        let amount = validate_amount(amount)?;
        let mut tx = self.begin().await?;
        let buyer = fetch_user(&mut tx, session.user_id).await?;
        let (ticket, previous) = lock_offer(&mut tx, offer_id).await?;

        let now = Utc::now();
        let (offer, effects) = plan::reoffer(&buyer, &ticket, &previous, amount, now)?;
        apply_all(&mut tx, &effects, now).await?;
        tx.commit().await?;

        tracing::info!(previous_offer_id = %offer_id, offer_id = %offer.id, "Offer replaced");
        Ok(offer)
    }

    async fn cancel_offer(&self, session: &Session, offer_id: Uuid) -> Result<(), AppError> {
        let mut tx = self.begin().await?;
        let (ticket, offer) = lock_offer(&mut tx, offer_id).await?;
        let offers = ticket_offers(&mut tx, ticket.id).await?;
        let effects = plan::cancel_offer(session.user_id, &ticket, &offer, &offers)?;
        apply_all(&mut tx, &effects, Utc::now()).await?;
        tx.commit().await?;
        Ok(())
    }

    async fn submit_rating(
        &self,
        session: &Session,
        request: &CreateRatingRequest,
    ) -> Result<Rating, AppError> {
        let mut tx = self.begin().await?;

        // Serializes the average recomputation per seller.
        sqlx::query_scalar::<_, Uuid>("SELECT id FROM users WHERE id = $1 FOR UPDATE")
            .bind(request.seller_id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| AppError::not_found("User", request.seller_id))?;

        let purchases: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM offers WHERE sender_id = $1 AND receiver_id = $2 AND status = $3",
        )
        .bind(session.user_id)
        .bind(request.seller_id)
        .bind(OfferStatus::Accepted)
        .fetch_one(&mut *tx)
        .await?;

        let score = plan::check_rating(
            session.user_id,
            request.seller_id,
            usize::try_from(purchases).unwrap_or_default(),
            request.score,
        )?;

        let rating = sqlx::query_as::<_, Rating>(
            r#"
            INSERT INTO ratings (id, rater_id, seller_id, score, comment)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(session.user_id)
        .bind(request.seller_id)
        .bind(score)
        .bind(&request.comment)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| AppError::from_write(e, DUPLICATE_RATING))?;

        sqlx::query(
            r#"
            UPDATE users
            SET seller_rating = (SELECT ROUND(AVG(score)::numeric, 2) FROM ratings WHERE seller_id = $1),
                updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(request.seller_id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(rating)
    }

    async fn ratings_for_seller(&self, seller_id: Uuid) -> Result<Vec<Rating>, AppError> {
        Ok(sqlx::query_as::<_, Rating>(
            "SELECT * FROM ratings WHERE seller_id = $1 ORDER BY created_at DESC",
        )
        .bind(seller_id)
        .fetch_all(&self.pool)
        .await?)
    }

    async fn append_message(
        &self,
        session: &Session,
        offer_id: Uuid,
        content: String,
    ) -> Result<Message, AppError> {
        let content = validate_message(&content)?.to_string();
        let mut tx = self.begin().await?;

        // FOR SHARE keeps a concurrent re-offer from deleting the offer
        // between this read and the insert.
        let offer = sqlx::query_as::<_, Offer>("SELECT * FROM offers WHERE id = $1 FOR SHARE")
            .bind(offer_id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| AppError::not_found("Offer", offer_id))?;
        let receiver_id = plan::message_receiver(&offer, session.user_id)?;

        let message = sqlx::query_as::<_, Message>(
            r#"
            INSERT INTO messages (id, offer_id, sender_id, receiver_id, content)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(offer_id)
        .bind(session.user_id)
        .bind(receiver_id)
        .bind(content)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(message)
    }

    async fn messages_for_offer(&self, offer_id: Uuid) -> Result<Vec<Message>, AppError> {
        Ok(sqlx::query_as::<_, Message>(
            "SELECT * FROM messages WHERE offer_id = $1 ORDER BY created_at, id",
        )
        .bind(offer_id)
        .fetch_all(&self.pool)
        .await?)
    }

    async fn create_support_request(
        &self,
        session: &Session,
        request: &CreateSupportRequest,
    ) -> Result<SupportRequest, AppError> {
        validate_support(request)?;
        Ok(sqlx::query_as::<_, SupportRequest>(
            r#"
            INSERT INTO support_requests (id, user_id, subject, message)
            VALUES ($1, $2, $3, $4)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(session.user_id)
        .bind(request.subject.trim())
        .bind(request.message.trim())
        .fetch_one(&self.pool)
        .await?)
    }
}
