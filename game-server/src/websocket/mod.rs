use std::sync::Arc;

use futures_util::{SinkExt, StreamExt};
use game_types::ClientMessage;
use tracing::{error, info, warn};
use warp::ws::{Message, WebSocket};

use crate::registry::{ConnectionId, ConnectionRegistry};
use crate::room_manager::RoomManager;

pub mod handlers;
pub mod rate_limiter;

use handlers::MessageHandler;
use rate_limiter::RateLimiter;

/// One task per socket: an inbound loop feeding the message handler and an
/// outbound pump draining the connection's channel. Either side ending tears
/// the whole connection down.
pub async fn handle_connection(
    websocket: WebSocket,
    registry: Arc<ConnectionRegistry>,
    manager: Arc<RoomManager>,
) {
    let connection_id = ConnectionId::new();
    info!(connection = %connection_id, "websocket connected");

    let (mut ws_sender, mut ws_receiver) = websocket.split();
    let message_receiver = registry.create_connection(connection_id).await;
    let message_handler = MessageHandler::new(connection_id, registry.clone(), manager.clone());

    let incoming = {
        let message_handler = message_handler.clone();
        let mut rate_limiter = RateLimiter::new();

        async move {
            while let Some(result) = ws_receiver.next().await {
                match result {
                    Ok(msg) => {
                        if let Err(e) =
                            handle_frame(msg, &mut rate_limiter, &message_handler, connection_id)
                                .await
                        {
                            error!(connection = %connection_id, error = %e, "closing connection");
                            break;
                        }
                    }
                    Err(e) => {
                        warn!(connection = %connection_id, error = %e, "websocket error");
                        break;
                    }
                }
            }
        }
    };

    let outgoing = async move {
        let mut receiver = message_receiver;

        while let Some(message) = receiver.recv().await {
            let json = match serde_json::to_string(&message) {
                Ok(json) => json,
                Err(e) => {
                    error!(error = %e, "failed to serialize message");
                    continue;
                }
            };

            if ws_sender.send(Message::text(json)).await.is_err() {
                break;
            }
        }
    };

    tokio::select! {
        _ = incoming => {},
        _ = outgoing => {},
    }

    info!(connection = %connection_id, "websocket disconnected");
    message_handler.handle_disconnect().await;
}

async fn handle_frame(
    msg: Message,
    rate_limiter: &mut RateLimiter,
    message_handler: &MessageHandler,
    connection_id: ConnectionId,
) -> Result<(), String> {
    if !rate_limiter.check_rate_limit() {
        warn!(connection = %connection_id, "rate limit exceeded");
        return Err("Rate limit exceeded".to_string());
    }

    if !msg.is_text() {
        return Ok(());
    }

    // A malformed frame is a protocol error, not a transport fault: answer
    // with an error message and keep the connection open.
    let Ok(text) = msg.to_str() else {
        message_handler
            .send_error("Invalid text message".to_string())
            .await;
        return Ok(());
    };
    match serde_json::from_str::<ClientMessage>(text) {
        Ok(client_message) => message_handler.handle_message(client_message).await,
        Err(e) => {
            warn!(connection = %connection_id, error = %e, "malformed client message");
            message_handler
                .send_error(format!("Invalid JSON message: {}", e))
                .await;
        }
    }
    Ok(())
}
