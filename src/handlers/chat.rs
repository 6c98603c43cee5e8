use axum::extract::ws::{Message as WsFrame, WebSocket, WebSocketUpgrade};
use axum::extract::{Path, State};
use axum::response::{IntoResponse, Response};
use axum::Json;
use futures::stream::SplitSink;
use futures::{SinkExt, StreamExt};
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::load_offer;
use crate::auth::Session;
use crate::chat::filter::mask_profanity;
use crate::chat::DeliveryFilter;
use crate::lifecycle::plan::ensure_participant;
use crate::models::{Message, SendMessageRequest};
use crate::state::AppState;
use crate::utils::error::AppError;
use crate::utils::response::{created, success};

pub async fn history(
    State(state): State<AppState>,
    session: Session,
    Path(offer_id): Path<Uuid>,
) -> Result<Response, AppError> {
    let offer = load_offer(&state, offer_id).await?;
    ensure_participant(&offer, session.user_id)?;
    let messages = state.store.messages_for_offer(offer_id).await?;
    Ok(success(messages, "Messages retrieved").into_response())
}

pub async fn send_message(
    State(state): State<AppState>,
    session: Session,
    Path(offer_id): Path<Uuid>,
    Json(request): Json<SendMessageRequest>,
) -> Result<Response, AppError> {
    let content = mask_profanity(&request.content);
    let message = state
        .store
        .append_message(&session, offer_id, content)
        .await?;
    state.chat.publish(message.clone()).await;
    Ok(created(message, "Message sent").into_response())
}

/// Streams an offer thread. Authenticates with `?access_token=` since
/// browsers cannot set headers on a websocket handshake.
pub async fn stream(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    session: Session,
    Path(offer_id): Path<Uuid>,
) -> Result<Response, AppError> {
    let offer = load_offer(&state, offer_id).await?;
    ensure_participant(&offer, session.user_id)?;
    Ok(ws.on_upgrade(move |socket| handle_socket(socket, state, offer_id, session.user_id)))
}

async fn handle_socket(socket: WebSocket, state: AppState, offer_id: Uuid, user_id: Uuid) {
    info!(%offer_id, %user_id, "Chat stream opened");

    // Subscribe before loading history so nothing written in between is lost.
    let mut live = state.chat.subscribe(offer_id).await;
    let history = match state.store.messages_for_offer(offer_id).await {
        Ok(history) => history,
        Err(err) => {
            warn!(%offer_id, error = %err, "Could not load chat history");
            drop(live);
            state.chat.release(offer_id).await;
            return;
        }
    };

    let (mut sender, mut receiver) = socket.split();

    let mut send_task = tokio::spawn(async move {
        let mut delivered = DeliveryFilter::default();
        for message in history {
            if delivered.admit(message.id) && send(&mut sender, &message).await.is_err() {
                return;
            }
        }
        loop {
            match live.recv().await {
                Ok(message) => {
                    if delivered.admit(message.id) && send(&mut sender, &message).await.is_err() {
                        break;
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    warn!(%offer_id, skipped, "Chat subscriber lagged");
                }
                Err(RecvError::Closed) => {
                    let _ = sender.send(WsFrame::Close(None)).await;
                    break;
                }
            }
        }
        debug!(%offer_id, "Chat send task finished");
    });

    // The stream is read-only; incoming frames only matter for detecting close.
    let mut recv_task = tokio::spawn(async move {
        while let Some(Ok(frame)) = receiver.next().await {
            if let WsFrame::Close(_) = frame {
                break;
            }
        }
    });

    tokio::select! {
        _ = (&mut send_task) => recv_task.abort(),
        _ = (&mut recv_task) => {
            send_task.abort();
            // Wait for the subscription to drop before releasing the thread.
            let _ = send_task.await;
        }
    }
    state.chat.release(offer_id).await;

    info!(%offer_id, %user_id, "Chat stream closed");
}

async fn send(sender: &mut SplitSink<WebSocket, WsFrame>, message: &Message) -> Result<(), axum::Error> {
    let json = serde_json::to_string(message).map_err(axum::Error::new)?;
    sender.send(WsFrame::Text(json)).await
}
