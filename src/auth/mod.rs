//! Session context.
//!
//! Sign-in happens at the university identity provider, which hands the
//! browser a signed token. Every request carries that token; the extractor
//! verifies it, enforces the campus email domain and resolves the local user.
//! Handlers receive the result as an explicit [`Session`] value.

use axum::async_trait;
use axum::extract::FromRequestParts;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::state::AppState;
use crate::utils::error::AppError;

const BEARER_PREFIX: &str = "Bearer ";
/// Browsers cannot set headers on websocket upgrades.
const TOKEN_QUERY_PARAM: &str = "access_token";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdentityClaims {
    pub sub: String,
    pub email: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub email_verified: bool,
    pub exp: usize,
}

/// Who the identity provider says the caller is.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub external_id: String,
    pub email: String,
    pub name: Option<String>,
    pub verified: bool,
}

/// The authenticated caller of one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub user_id: Uuid,
    pub email: String,
}

pub struct TokenVerifier {
    key: DecodingKey,
    validation: Validation,
    allowed_domain: String,
}

impl TokenVerifier {
    pub fn new(secret: &str, allowed_domain: impl Into<String>) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = true;
        Self {
            key: DecodingKey::from_secret(secret.as_bytes()),
            validation,
            allowed_domain: allowed_domain.into(),
        }
    }

    pub fn verify(&self, token: &str) -> Result<Identity, AppError> {
        let data = decode::<IdentityClaims>(token, &self.key, &self.validation).map_err(|e| {
            tracing::debug!(error = %e, "Rejected identity token");
            AppError::AuthError("Invalid or expired session token".to_string())
        })?;
        let claims = data.claims;

        if !email_in_domain(&claims.email, &self.allowed_domain) {
            tracing::warn!(email = %claims.email, "Sign-in from outside the campus domain");
            return Err(AppError::Forbidden(format!(
                "Only @{} accounts can use this marketplace",
                self.allowed_domain
            )));
        }

        Ok(Identity {
            external_id: claims.sub,
            email: claims.email.to_lowercase(),
            name: claims.name,
            verified: claims.email_verified,
        })
    }
}

/// Exact, case-insensitive match on the part after the last `@`.
pub fn email_in_domain(email: &str, domain: &str) -> bool {
    match email.rsplit_once('@') {
        Some((local, host)) => !local.is_empty() && host.eq_ignore_ascii_case(domain),
        None => false,
    }
}

fn bearer_token(parts: &Parts) -> Option<String> {
    if let Some(header) = parts.headers.get(AUTHORIZATION) {
        return header
            .to_str()
            .ok()
            .and_then(|value| value.strip_prefix(BEARER_PREFIX))
            .map(|token| token.trim().to_string());
    }

    parts.uri.query().and_then(|query| {
        query.split('&').find_map(|pair| {
            let (key, value) = pair.split_once('=')?;
            (key == TOKEN_QUERY_PARAM && !value.is_empty()).then(|| value.to_string())
        })
    })
}

#[async_trait]
impl FromRequestParts<AppState> for Session {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let token = bearer_token(parts)
            .ok_or_else(|| AppError::AuthError("Missing session token".to_string()))?;
        let identity = state.verifier.verify(&token)?;
        let user = state.store.upsert_user(&identity).await?;

        Ok(Session {
            user_id: user.id,
            email: user.email,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;
    use jsonwebtoken::{encode, EncodingKey, Header};

    const SECRET: &str = "test-secret";

    fn token(email: &str, exp_offset: i64) -> String {
        let claims = IdentityClaims {
            sub: "google-oauth2|123".to_string(),
            email: email.to_string(),
            name: Some("Wildcat".to_string()),
            email_verified: true,
            exp: (chrono::Utc::now().timestamp() + exp_offset) as usize,
        };
        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(SECRET.as_bytes()),
        )
        .unwrap()
    }

    #[test]
    fn test_domain_match_is_exact() {
        assert!(email_in_domain("cat@uky.edu", "uky.edu"));
        assert!(email_in_domain("Cat@UKY.EDU", "uky.edu"));
        assert!(!email_in_domain("cat@notuky.edu", "uky.edu"));
        assert!(!email_in_domain("cat@uky.edu.evil.com", "uky.edu"));
        assert!(!email_in_domain("@uky.edu", "uky.edu"));
        assert!(!email_in_domain("uky.edu", "uky.edu"));
    }

    #[test]
    fn test_verify_accepts_campus_token() {
        let verifier = TokenVerifier::new(SECRET, "uky.edu");
        let identity = verifier.verify(&token("Cat@uky.edu", 3600)).unwrap();
        assert_eq!(identity.email, "cat@uky.edu");
        assert_eq!(identity.external_id, "google-oauth2|123");
        assert!(identity.verified);
    }

    #[test]
    fn test_verify_rejects_other_domains_without_side_effects() {
        let verifier = TokenVerifier::new(SECRET, "uky.edu");
        let err = verifier.verify(&token("cat@gmail.com", 3600)).unwrap_err();
        assert_eq!(err.code(), "FORBIDDEN");
    }

    #[test]
    fn test_verify_rejects_expired_and_forged_tokens() {
        let verifier = TokenVerifier::new(SECRET, "uky.edu");
        assert_eq!(
            verifier.verify(&token("cat@uky.edu", -3600)).unwrap_err().code(),
            "AUTH_ERROR"
        );

        let other = TokenVerifier::new("another-secret", "uky.edu");
        assert_eq!(
            other.verify(&token("cat@uky.edu", 3600)).unwrap_err().code(),
            "AUTH_ERROR"
        );
    }

    #[test]
    fn test_token_from_header_or_query() {
        let (parts, _) = Request::builder()
            .uri("/api/me")
            .header(AUTHORIZATION, "Bearer abc.def.ghi")
            .body(())
            .unwrap()
            .into_parts();
        assert_eq!(bearer_token(&parts).as_deref(), Some("abc.def.ghi"));

        let (parts, _) = Request::builder()
            .uri("/api/offers/1/messages/ws?access_token=abc.def.ghi")
            .body(())
            .unwrap()
            .into_parts();
        assert_eq!(bearer_token(&parts).as_deref(), Some("abc.def.ghi"));

        let (parts, _) = Request::builder().uri("/api/me").body(()).unwrap().into_parts();
        assert!(bearer_token(&parts).is_none());
    }
}
