use std::sync::Arc;

use axum::body::{to_bytes, Body};
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use chrono::{Duration, Utc};
use jsonwebtoken::{encode, EncodingKey, Header};
use serde_json::{json, Value};
use tokio::sync::broadcast::error::RecvError;
use tower::ServiceExt;

use resale_server::auth::{IdentityClaims, TokenVerifier};
use resale_server::chat::ChatHub;
use resale_server::config::Config;
use resale_server::notify::DisabledNotifier;
use resale_server::routes::create_routes;
use resale_server::state::AppState;
use resale_server::store::InMemoryStore;

const SECRET: &str = "integration-secret";

struct TestApp {
    router: Router,
    store: Arc<InMemoryStore>,
    chat: ChatHub,
}

impl TestApp {
    fn new() -> Self {
        let store = Arc::new(InMemoryStore::new());
        let config = Config::from_lookup(|key| match key {
            "AUTH_JWT_SECRET" => Some(SECRET.to_string()),
            _ => None,
        })
        .unwrap();
        let state = AppState::new(
            store.clone(),
            Arc::new(DisabledNotifier),
            TokenVerifier::new(SECRET, config.allowed_email_domain.clone()),
        );
        let chat = state.chat.clone();
        Self {
            router: create_routes(state, &config),
            store,
            chat,
        }
    }

    async fn call(&self, method: Method, uri: &str, token: Option<&str>, body: Option<Value>) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, json)
    }
}

fn token(subject: &str, email: &str) -> String {
    let claims = IdentityClaims {
        sub: subject.to_string(),
        email: email.to_string(),
        name: Some(subject.to_string()),
        email_verified: true,
        exp: (Utc::now() + Duration::hours(1)).timestamp() as usize,
    };
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(SECRET.as_bytes()),
    )
    .unwrap()
}

fn id(value: &Value) -> String {
    value["data"]["id"].as_str().unwrap().to_string()
}

#[tokio::test]
async fn health_is_public() {
    let app = TestApp::new();
    let (status, body) = app.call(Method::GET, "/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["status"], "ok");
}

#[tokio::test]
async fn api_requires_campus_session() {
    let app = TestApp::new();

    let (status, body) = app.call(Method::GET, "/api/events", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["success"], false);
    assert_eq!(body["error"]["code"], "AUTH_ERROR");

    let outsider = token("outsider", "someone@gmail.com");
    let (status, body) = app.call(Method::GET, "/api/me", Some(&outsider), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"]["code"], "FORBIDDEN");

    let student = token("student", "student@uky.edu");
    let (status, body) = app.call(Method::GET, "/api/me", Some(&student), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["email"], "student@uky.edu");
    assert!(body["data"].get("push_subscription").is_none());
}

#[tokio::test]
async fn offer_flow_over_http() {
    let app = TestApp::new();
    let event = app
        .store
        .seed_event("UK vs Tennessee", "Kroger Field", Utc::now() + Duration::days(3), true)
        .await;
    let seller = token("seller", "seller@uky.edu");
    let buyer = token("buyer", "buyer@uky.edu");

    let (status, listed) = app
        .call(
            Method::POST,
            "/api/tickets",
            Some(&seller),
            Some(json!({ "event_id": event.id, "price": "40.00", "ticket_type": "Student" })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    let ticket_id = id(&listed);
    let offers_uri = format!("/api/tickets/{}/offers", ticket_id);

    let (status, body) = app
        .call(Method::POST, &offers_uri, Some(&buyer), Some(json!({ "amount": "35" })))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST, "{}", body);

    let (status, _) = app
        .call(Method::PATCH, "/api/me", Some(&buyer), Some(json!({ "phone": "859-555-0199" })))
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = app
        .call(Method::POST, &offers_uri, Some(&buyer), Some(json!({ "amount": "0" })))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "VALIDATION_ERROR");

    let (status, offer) = app
        .call(Method::POST, &offers_uri, Some(&buyer), Some(json!({ "amount": "35" })))
        .await;
    assert_eq!(status, StatusCode::CREATED);
    let offer_id = id(&offer);

    let (_, detail) = app
        .call(Method::GET, &format!("/api/tickets/{}", ticket_id), Some(&seller), None)
        .await;
    assert_eq!(detail["data"]["status"], "pending");
    assert_eq!(
        detail["data"]["offers"][0]["actions"],
        json!(["accept", "decline", "chat"])
    );

    let accept_uri = format!("/api/offers/{}/accept", offer_id);
    let (status, _) = app.call(Method::POST, &accept_uri, Some(&buyer), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, sold) = app.call(Method::POST, &accept_uri, Some(&seller), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(sold["data"]["status"], "sold");

    let (status, body) = app.call(Method::POST, &accept_uri, Some(&seller), None).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"]["code"], "ALREADY_SOLD");

    let (_, mine) = app.call(Method::GET, "/api/offers", Some(&buyer), None).await;
    assert_eq!(mine["data"][0]["status"], "accepted");
    assert_eq!(mine["data"][0]["actions"], json!(["rate", "chat"]));
}

#[tokio::test]
async fn reoffer_moves_chat_and_ends_old_streams() {
    let app = TestApp::new();
    let event = app
        .store
        .seed_event("UK vs Kentucky State", "Kroger Field", Utc::now() + Duration::days(5), true)
        .await;
    let seller = token("seller", "seller@uky.edu");
    let buyer = token("buyer", "buyer@uky.edu");
    app.call(Method::PATCH, "/api/me", Some(&buyer), Some(json!({ "phone": "859-555-0177" })))
        .await;

    let (_, listed) = app
        .call(
            Method::POST,
            "/api/tickets",
            Some(&seller),
            Some(json!({ "event_id": event.id, "price": "30", "ticket_type": "Student" })),
        )
        .await;
    let (_, offer) = app
        .call(
            Method::POST,
            &format!("/api/tickets/{}/offers", id(&listed)),
            Some(&buyer),
            Some(json!({ "amount": "20" })),
        )
        .await;
    let first_id = id(&offer);
    app.call(
        Method::POST,
        &format!("/api/offers/{}/messages", first_id),
        Some(&buyer),
        Some(json!({ "content": "Would you take 20?" })),
    )
    .await;
    let (status, _) = app
        .call(Method::POST, &format!("/api/offers/{}/decline", first_id), Some(&seller), None)
        .await;
    assert_eq!(status, StatusCode::OK);

    let mut watcher = app.chat.subscribe(first_id.parse().unwrap()).await;

    let (status, replacement) = app
        .call(
            Method::POST,
            &format!("/api/offers/{}/reoffer", first_id),
            Some(&buyer),
            Some(json!({ "amount": "25" })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert!(matches!(watcher.recv().await, Err(RecvError::Closed)));

    let (status, history) = app
        .call(
            Method::GET,
            &format!("/api/offers/{}/messages", id(&replacement)),
            Some(&seller),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(history["data"].as_array().unwrap().len(), 1);

    let (status, _) = app
        .call(
            Method::GET,
            &format!("/api/offers/{}/messages", first_id),
            Some(&seller),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn chat_and_push_relay() {
    let app = TestApp::new();
    let event = app
        .store
        .seed_event("UK vs Florida", "Rupp Arena", Utc::now() + Duration::days(10), true)
        .await;
    let seller = token("seller", "seller@uky.edu");
    let buyer = token("buyer", "buyer@uky.edu");
    let stranger = token("stranger", "stranger@uky.edu");

    let (_, seller_profile) = app.call(Method::GET, "/api/me", Some(&seller), None).await;
    let seller_id = id(&seller_profile);
    app.call(Method::PATCH, "/api/me", Some(&buyer), Some(json!({ "phone": "859-555-0142" })))
        .await;

    let (_, listed) = app
        .call(
            Method::POST,
            "/api/tickets",
            Some(&seller),
            Some(json!({ "event_id": event.id, "price": "25", "ticket_type": "General" })),
        )
        .await;
    let (_, offer) = app
        .call(
            Method::POST,
            &format!("/api/tickets/{}/offers", id(&listed)),
            Some(&buyer),
            Some(json!({ "amount": "20" })),
        )
        .await;
    let messages_uri = format!("/api/offers/{}/messages", id(&offer));

    let (status, sent) = app
        .call(Method::POST, &messages_uri, Some(&buyer), Some(json!({ "content": "Meet at the gate?" })))
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(sent["data"]["receiver_id"], seller_id.as_str());

    let (status, _) = app.call(Method::GET, &messages_uri, Some(&stranger), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, history) = app.call(Method::GET, &messages_uri, Some(&seller), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(history["data"].as_array().unwrap().len(), 1);

    let push = json!({ "userId": seller_id, "title": "New message", "message": "Meet at the gate?" });
    let (status, _) = app
        .call(Method::POST, "/api/notifications/push", Some(&buyer), Some(push.clone()))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let subscription = json!({
        "endpoint": "https://push.example.com/send/abc",
        "keys": {
            "p256dh": "BNcRdreALRFXTkOOUHK1EtK2wtaz5Ry4YfYCA_0QTpQtUbVlUls0VJXg7A8u-Ts1XbjhazAkj7I99e8QcYP7DkM",
            "auth": "tBHItJI5svbpez7KI4CCXg"
        }
    });
    let (status, _) = app
        .call(Method::PUT, "/api/me/push-subscription", Some(&seller), Some(subscription))
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = app
        .call(Method::POST, "/api/notifications/push", Some(&buyer), Some(push))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["delivery"], "skipped");
}
