use rust_decimal::Decimal;

use super::LifecycleError;
use crate::models::User;

/// Largest amount a `NUMERIC(10,2)` column holds.
pub const MAX_AMOUNT: Decimal = Decimal::from_parts(1_410_065_407, 2, 0, false, 2);

/// Money amounts: strictly positive, at most [`MAX_AMOUNT`], with at most two
/// decimal places.
pub fn validate_amount(amount: Decimal) -> Result<Decimal, LifecycleError> {
    if amount <= Decimal::ZERO {
        return Err(LifecycleError::NonPositiveAmount);
    }
    if amount > MAX_AMOUNT {
        return Err(LifecycleError::AmountTooLarge);
    }
    let normalized = amount.normalize();
    if normalized.scale() > 2 {
        return Err(LifecycleError::TooManyDecimals);
    }
    Ok(normalized)
}

pub fn ensure_can_offer(buyer: &User) -> Result<(), LifecycleError> {
    if !buyer.verified {
        return Err(LifecycleError::Unverified);
    }
    if !buyer.has_phone() {
        return Err(LifecycleError::MissingPhone);
    }
    Ok(())
}

pub fn validate_score(score: i32) -> Result<i32, LifecycleError> {
    if (1..=5).contains(&score) {
        Ok(score)
    } else {
        Err(LifecycleError::ScoreOutOfRange)
    }
}

pub const MAX_MESSAGE_CHARS: usize = 2000;

pub fn validate_message(content: &str) -> Result<&str, LifecycleError> {
    let trimmed = content.trim();
    if trimmed.is_empty() {
        return Err(LifecycleError::EmptyMessage);
    }
    if trimmed.chars().count() > MAX_MESSAGE_CHARS {
        return Err(LifecycleError::MessageTooLong);
    }
    Ok(trimmed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use std::str::FromStr;
    use uuid::Uuid;

    fn buyer(verified: bool, phone: Option<&str>) -> User {
        User {
            id: Uuid::new_v4(),
            external_id: "sub".to_string(),
            email: "student@uky.edu".to_string(),
            name: None,
            verified,
            phone: phone.map(str::to_string),
            seller_rating: None,
            tickets_sold: 0,
            push_subscription: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_rejects_zero_and_negative_amounts() {
        assert_eq!(
            validate_amount(Decimal::ZERO),
            Err(LifecycleError::NonPositiveAmount)
        );
        assert_eq!(
            validate_amount(Decimal::from_str("-5.00").unwrap()),
            Err(LifecycleError::NonPositiveAmount)
        );
    }

    #[test]
    fn test_rejects_more_than_two_decimals() {
        assert_eq!(
            validate_amount(Decimal::from_str("10.005").unwrap()),
            Err(LifecycleError::TooManyDecimals)
        );
        // trailing zeros are not significant
        assert!(validate_amount(Decimal::from_str("10.500").unwrap()).is_ok());
        assert!(validate_amount(Decimal::from_str("0.01").unwrap()).is_ok());
    }

    #[test]
    fn test_rejects_amounts_beyond_column_precision() {
        assert_eq!(MAX_AMOUNT, Decimal::from_str("99999999.99").unwrap());
        assert_eq!(validate_amount(MAX_AMOUNT), Ok(MAX_AMOUNT));
        assert_eq!(
            validate_amount(Decimal::from_str("100000000").unwrap()),
            Err(LifecycleError::AmountTooLarge)
        );
        assert_eq!(
            validate_amount(Decimal::from_str("1000000000000").unwrap()),
            Err(LifecycleError::AmountTooLarge)
        );
    }

    #[test]
    fn test_buyer_needs_verification_and_phone() {
        assert_eq!(
            ensure_can_offer(&buyer(false, Some("859-555-0100"))),
            Err(LifecycleError::Unverified)
        );
        assert_eq!(
            ensure_can_offer(&buyer(true, None)),
            Err(LifecycleError::MissingPhone)
        );
        assert_eq!(
            ensure_can_offer(&buyer(true, Some("   "))),
            Err(LifecycleError::MissingPhone)
        );
        assert!(ensure_can_offer(&buyer(true, Some("859-555-0100"))).is_ok());
    }

    #[test]
    fn test_message_content() {
        assert_eq!(validate_message("  hi  "), Ok("hi"));
        assert_eq!(validate_message(" \n "), Err(LifecycleError::EmptyMessage));
        let long = "x".repeat(MAX_MESSAGE_CHARS + 1);
        assert_eq!(validate_message(&long), Err(LifecycleError::MessageTooLong));
    }

    #[test]
    fn test_score_range() {
        assert!(validate_score(0).is_err());
        assert!(validate_score(6).is_err());
        assert_eq!(validate_score(5), Ok(5));
    }
}
