use std::sync::Arc;

use game_types::{ClientMessage, ServerMessage};
use tracing::info;

use crate::registry::{ConnectionId, ConnectionRegistry};
use crate::room_manager::RoomManager;

/// Routes one connection's inbound messages to the room manager and turns
/// rejections into [`ServerMessage::Error`] replies on that connection.
#[derive(Clone)]
pub struct MessageHandler {
    connection_id: ConnectionId,
    registry: Arc<ConnectionRegistry>,
    manager: Arc<RoomManager>,
}

impl MessageHandler {
    pub fn new(
        connection_id: ConnectionId,
        registry: Arc<ConnectionRegistry>,
        manager: Arc<RoomManager>,
    ) -> Self {
        Self {
            connection_id,
            registry,
            manager,
        }
    }

    pub async fn handle_message(&self, message: ClientMessage) {
        let result = match message {
            ClientMessage::CreateRoom {
                player_name,
                player_email,
                game_mode,
                word_mode,
                is_public,
            } => {
                self.manager
                    .create_room(
                        self.connection_id,
                        player_name,
                        player_email,
                        game_mode,
                        word_mode,
                        is_public,
                    )
                    .await
            }
            ClientMessage::JoinRoom {
                room_code,
                player_name,
                player_email,
            } => {
                self.manager
                    .join_room(self.connection_id, room_code, player_name, player_email)
                    .await
            }
            ClientMessage::Rejoin {
                room_code,
                player_id,
            } => {
                self.manager
                    .rejoin(self.connection_id, room_code, player_id)
                    .await
            }
            ClientMessage::SetReady { ready } => {
                self.manager.set_ready(self.connection_id, ready).await
            }
            ClientMessage::SetGameMode { mode } => {
                self.manager.set_game_mode(self.connection_id, mode).await
            }
            ClientMessage::SetWordMode { mode } => {
                self.manager.set_word_mode(self.connection_id, mode).await
            }
            ClientMessage::SetRoomVisibility { is_public } => {
                self.manager
                    .set_visibility(self.connection_id, is_public)
                    .await
            }
            ClientMessage::PickWord { word } => {
                self.manager.pick_word(self.connection_id, word).await
            }
            ClientMessage::StartGame => {
                Arc::clone(&self.manager).start_game(self.connection_id).await
            }
            ClientMessage::Guess { word, forced } => {
                self.manager
                    .submit_guess(self.connection_id, word, forced)
                    .await
            }
            ClientMessage::LeaveRoom => self.manager.leave_room(self.connection_id).await,
            ClientMessage::CloseRoom => self.manager.close_room(self.connection_id).await,
            ClientMessage::SubscribeLobby { email } => {
                self.manager.subscribe_lobby(self.connection_id, email).await;
                Ok(())
            }
            ClientMessage::UnsubscribeLobby => {
                self.manager.unsubscribe_lobby(self.connection_id).await;
                Ok(())
            }
            ClientMessage::Heartbeat => {
                self.manager.heartbeat(self.connection_id).await;
                Ok(())
            }
        };

        if let Err(message) = result {
            self.send_error(message).await;
        }
    }

    /// Answers a rejection on this connection without touching any state.
    pub async fn send_error(&self, message: String) {
        let _ = self
            .registry
            .send_to_connection(self.connection_id, ServerMessage::Error { message })
            .await;
    }

    /// Transport teardown: the registry entry goes first so a firing grace
    /// timer already sees the player unbound, then the room learns about the
    /// disconnect.
    pub async fn handle_disconnect(&self) {
        self.manager.unsubscribe_lobby(self.connection_id).await;

        if let Some((player_id, room_code)) =
            self.registry.remove_connection(self.connection_id).await
        {
            info!(
                connection = %self.connection_id,
                player = %player_id,
                room = %room_code,
                "transport closed with bound player"
            );
            Arc::clone(&self.manager)
                .handle_transport_closed(player_id, room_code)
                .await;
        }
    }
}
