pub mod handlers;

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::IntoResponse,
};
use futures::{sink::SinkExt, stream::StreamExt};
use std::sync::Arc;
use tokio::time::Instant;

use crate::protocol::{ClientMessage, ServerMessage};
use crate::state::{room_path, AppState, Session, SessionEvent};
use crate::store::Subscription;
use crate::view::RoomView;

/// WebSocket upgrade handler
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    tracing::info!("WebSocket connection request");
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn send<S>(sender: &mut S, msg: &ServerMessage) -> bool
where
    S: SinkExt<Message> + Unpin,
{
    match serde_json::to_string(msg) {
        Ok(json) => sender.send(Message::Text(json.into())).await.is_ok(),
        Err(e) => {
            tracing::error!("Failed to serialize message: {}", e);
            true
        }
    }
}

/// Keep the room subscription pointed at the room the session is in
async fn sync_subscription(session: &Session, subscription: &mut Option<Subscription>) {
    let wanted = session.membership().map(|m| room_path(&m.room_id));
    let current = subscription.as_ref().map(|s| s.path().to_string());
    if wanted == current {
        return;
    }

    *subscription = None;
    if wanted.is_some() {
        match session.subscribe().await {
            Ok(sub) => {
                tracing::debug!("Subscribed to {}", sub.path());
                *subscription = Some(sub);
            }
            Err(e) => tracing::warn!("Failed to subscribe: {}", e),
        }
    }
}

/// One participant session per connection
async fn handle_socket(socket: WebSocket, state: Arc<AppState>) {
    let (mut sender, mut receiver) = socket.split();
    let mut session = state.open_session();
    let mut subscription: Option<Subscription> = None;
    // Pending return to the home screen after the room was closed
    let mut closing_at: Option<Instant> = None;

    tracing::info!("WebSocket connected");

    if !send(&mut sender, &ServerMessage::welcome()).await
        || !send(&mut sender, &ServerMessage::view(RoomView::home())).await
    {
        tracing::error!("Failed to send welcome message");
        return;
    }

    loop {
        let deadline = closing_at;

        tokio::select! {
            // Room snapshots
            snapshot = async {
                match &mut subscription {
                    Some(sub) => Some(sub.recv().await),
                    None => std::future::pending::<Option<_>>().await,
                }
            } => {
                let event = match snapshot {
                    Some(Ok(value)) => session.on_snapshot(value).await,
                    Some(Err(e)) => {
                        tracing::warn!("Room subscription ended: {}", e);
                        subscription = None;
                        continue;
                    }
                    None => continue,
                };

                let msg = match event {
                    Ok(SessionEvent::Updated(view)) => ServerMessage::View { view },
                    Ok(SessionEvent::RoomClosed) => {
                        closing_at = Some(Instant::now() + state.config.room_closed_delay);
                        ServerMessage::room_closed()
                    }
                    Err(e) => e.into(),
                };
                sync_subscription(&session, &mut subscription).await;
                if !send(&mut sender, &msg).await {
                    break;
                }
            }

            // Back to home a moment after the room closed
            _ = async {
                match deadline {
                    Some(at) => tokio::time::sleep_until(at).await,
                    None => std::future::pending::<()>().await,
                }
            } => {
                closing_at = None;
                if session.membership().is_none()
                    && !send(&mut sender, &ServerMessage::view(RoomView::home())).await
                {
                    break;
                }
            }

            // Client messages
            ws_msg = receiver.next() => {
                match ws_msg {
                    Some(Ok(Message::Text(text))) => {
                        tracing::debug!("Received message: {}", text);

                        match serde_json::from_str::<ClientMessage>(&text) {
                            Ok(client_msg) => {
                                let response = handlers::handle_message(client_msg, &mut session).await;
                                sync_subscription(&session, &mut subscription).await;
                                if let Some(response) = response {
                                    if !send(&mut sender, &response).await {
                                        tracing::error!("Failed to send response");
                                        break;
                                    }
                                }
                            }
                            Err(e) => {
                                tracing::error!("Failed to parse client message: {}", e);
                                let error = ServerMessage::Error {
                                    code: "PARSE_ERROR".to_string(),
                                    msg: format!("Invalid message format: {}", e),
                                };
                                let _ = send(&mut sender, &error).await;
                            }
                        }
                    }
                    Some(Ok(Message::Close(_))) => {
                        tracing::info!("WebSocket closed");
                        break;
                    }
                    Some(Ok(Message::Ping(data))) => {
                        if sender.send(Message::Pong(data)).await.is_err() {
                            break;
                        }
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        tracing::error!("WebSocket error: {}", e);
                        break;
                    }
                    None => break,
                }
            }
        }
    }

    // Closing the tab does not leave the room; the participant stays listed
    tracing::info!(
        "WebSocket connection closed for {:?}",
        session.membership().map(|m| &m.participant_id)
    );
}
