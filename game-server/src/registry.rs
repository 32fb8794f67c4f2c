use std::collections::HashMap;
use std::fmt;
use std::time::Instant;

use game_types::{PlayerId, ServerMessage};
use tokio::sync::{RwLock, mpsc};
use tracing::debug;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(Uuid);

impl ConnectionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone)]
pub struct Connection {
    pub id: ConnectionId,
    pub player_id: Option<PlayerId>,
    pub room_code: Option<String>,
    pub connected_at: Instant,
    sender: mpsc::UnboundedSender<ServerMessage>,
}

impl Connection {
    fn new(id: ConnectionId) -> (Self, mpsc::UnboundedReceiver<ServerMessage>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        let connection = Self {
            id,
            player_id: None,
            room_code: None,
            connected_at: Instant::now(),
            sender,
        };
        (connection, receiver)
    }

    pub fn send(&self, message: ServerMessage) -> Result<(), String> {
        self.sender
            .send(message)
            .map_err(|_| "Connection closed".to_string())
    }
}

/// Bidirectional bookkeeping: transport connection ↔ player identity ↔ room
/// code. Holds no game semantics.
///
/// Invariant: a player has an entry in `player_to_connection` exactly while
/// one live transport is bound to them. Teardown removes the connection's
/// entries immediately, before any room decides what grace period applies.
pub struct ConnectionRegistry {
    connections: RwLock<HashMap<ConnectionId, Connection>>,
    player_to_connection: RwLock<HashMap<PlayerId, ConnectionId>>,
    player_to_room: RwLock<HashMap<PlayerId, String>>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self {
            connections: RwLock::new(HashMap::new()),
            player_to_connection: RwLock::new(HashMap::new()),
            player_to_room: RwLock::new(HashMap::new()),
        }
    }

    pub async fn create_connection(
        &self,
        id: ConnectionId,
    ) -> mpsc::UnboundedReceiver<ServerMessage> {
        let (connection, receiver) = Connection::new(id);
        let mut connections = self.connections.write().await;
        connections.insert(id, connection);
        receiver
    }

    /// Drops the connection and, if it was bound, its player's entries.
    /// Returns the binding that was torn down so the caller can start
    /// disconnect handling.
    pub async fn remove_connection(&self, id: ConnectionId) -> Option<(PlayerId, String)> {
        let removed = {
            let mut connections = self.connections.write().await;
            connections.remove(&id)
        }?;

        let (player_id, room_code) = (removed.player_id?, removed.room_code?);

        {
            let mut player_to_connection = self.player_to_connection.write().await;
            // Only clear the mapping if it still points at this connection; a
            // takeover may already have rebound the player elsewhere.
            if player_to_connection.get(&player_id) == Some(&id) {
                player_to_connection.remove(&player_id);
                self.player_to_room.write().await.remove(&player_id);
                return Some((player_id, room_code));
            }
        }
        None
    }

    /// Binds a connection to a player identity within a room.
    pub async fn bind(
        &self,
        id: ConnectionId,
        player_id: PlayerId,
        room_code: String,
    ) -> Result<(), String> {
        {
            let mut connections = self.connections.write().await;
            let connection = connections.get_mut(&id).ok_or("Connection not found")?;
            connection.player_id = Some(player_id);
            connection.room_code = Some(room_code.clone());
        }
        self.player_to_connection
            .write()
            .await
            .insert(player_id, id);
        self.player_to_room.write().await.insert(player_id, room_code);
        Ok(())
    }

    /// Clears a connection's binding while keeping the transport open
    /// (voluntary leave).
    pub async fn unbind(&self, id: ConnectionId) {
        let player_id = {
            let mut connections = self.connections.write().await;
            match connections.get_mut(&id) {
                Some(connection) => {
                    connection.room_code = None;
                    connection.player_id.take()
                }
                None => None,
            }
        };
        if let Some(player_id) = player_id {
            self.player_to_connection.write().await.remove(&player_id);
            self.player_to_room.write().await.remove(&player_id);
        }
    }

    /// Clears a player's binding wherever it lives, keeping the transport
    /// open. Used when the player's room is deleted out from under them.
    pub async fn unbind_player(&self, player_id: PlayerId) {
        let connection_id = {
            let mut player_to_connection = self.player_to_connection.write().await;
            player_to_connection.remove(&player_id)
        };
        self.player_to_room.write().await.remove(&player_id);
        if let Some(id) = connection_id {
            let mut connections = self.connections.write().await;
            if let Some(connection) = connections.get_mut(&id) {
                connection.player_id = None;
                connection.room_code = None;
            }
        }
    }

    /// Duplicate-session takeover: force-closes any transport currently
    /// bound to the player and binds the new one. Never leaves two
    /// transports on one identity.
    pub async fn force_rebind(
        &self,
        new_id: ConnectionId,
        player_id: PlayerId,
        room_code: String,
    ) -> Result<Option<ConnectionId>, String> {
        let old_id = {
            let player_to_connection = self.player_to_connection.read().await;
            player_to_connection.get(&player_id).copied()
        };

        if let Some(old_id) = old_id.filter(|old| *old != new_id) {
            let mut connections = self.connections.write().await;
            if let Some(old) = connections.remove(&old_id) {
                // Dropping the sender ends the outbound pump and closes the
                // old socket; the notice tells that client why.
                let _ = old.send(ServerMessage::ReplacedByNewConnection);
                debug!(player = %player_id, old = %old_id, new = %new_id, "session takeover");
            }
        }

        self.bind(new_id, player_id, room_code).await?;
        Ok(old_id)
    }

    pub async fn get(&self, id: ConnectionId) -> Option<Connection> {
        let connections = self.connections.read().await;
        connections.get(&id).cloned()
    }

    pub async fn is_player_connected(&self, player_id: PlayerId) -> bool {
        let player_to_connection = self.player_to_connection.read().await;
        player_to_connection.contains_key(&player_id)
    }

    pub async fn send_to_connection(
        &self,
        id: ConnectionId,
        message: ServerMessage,
    ) -> Result<(), String> {
        let connections = self.connections.read().await;
        match connections.get(&id) {
            Some(connection) => connection.send(message),
            None => Err("Connection not found".to_string()),
        }
    }

    pub async fn send_to_player(
        &self,
        player_id: PlayerId,
        message: ServerMessage,
    ) -> Result<(), String> {
        let connection_id = {
            let player_to_connection = self.player_to_connection.read().await;
            player_to_connection.get(&player_id).copied()
        };
        match connection_id {
            Some(id) => self.send_to_connection(id, message).await,
            None => Err("Player not connected".to_string()),
        }
    }

    /// Fan-out to every live connection in a room.
    pub async fn broadcast_to_room(&self, room_code: &str, message: ServerMessage) {
        let connections = self.connections.read().await;
        for connection in connections.values() {
            if connection.room_code.as_deref() == Some(room_code) {
                let _ = connection.send(message.clone());
            }
        }
    }

    pub async fn broadcast_to_room_except(
        &self,
        room_code: &str,
        except: PlayerId,
        message: ServerMessage,
    ) {
        let connections = self.connections.read().await;
        for connection in connections.values() {
            if connection.room_code.as_deref() == Some(room_code)
                && connection.player_id != Some(except)
            {
                let _ = connection.send(message.clone());
            }
        }
    }

    pub async fn connection_count(&self) -> usize {
        self.connections.read().await.len()
    }

    pub async fn bound_player_count(&self) -> usize {
        self.player_to_connection.read().await.len()
    }
}

impl Default for ConnectionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_connection_creation_and_removal() {
        let registry = ConnectionRegistry::new();
        let conn_id = ConnectionId::new();

        let _receiver = registry.create_connection(conn_id).await;
        assert_eq!(registry.connection_count().await, 1);

        registry.remove_connection(conn_id).await;
        assert_eq!(registry.connection_count().await, 0);
    }

    #[tokio::test]
    async fn test_player_registered_iff_bound_connection_live() {
        let registry = ConnectionRegistry::new();
        let conn_id = ConnectionId::new();
        let player_id = PlayerId::new_v4();

        let _receiver = registry.create_connection(conn_id).await;
        assert!(!registry.is_player_connected(player_id).await);

        registry
            .bind(conn_id, player_id, "ABC123".to_string())
            .await
            .unwrap();
        assert!(registry.is_player_connected(player_id).await);
        assert_eq!(registry.bound_player_count().await, 1);

        let torn_down = registry.remove_connection(conn_id).await;
        assert_eq!(torn_down, Some((player_id, "ABC123".to_string())));
        assert!(!registry.is_player_connected(player_id).await);
        assert_eq!(registry.bound_player_count().await, 0);
    }

    #[tokio::test]
    async fn test_unbind_keeps_transport_open() {
        let registry = ConnectionRegistry::new();
        let conn_id = ConnectionId::new();
        let player_id = PlayerId::new_v4();

        let _receiver = registry.create_connection(conn_id).await;
        registry
            .bind(conn_id, player_id, "ABC123".to_string())
            .await
            .unwrap();

        registry.unbind(conn_id).await;
        assert!(!registry.is_player_connected(player_id).await);
        assert_eq!(registry.connection_count().await, 1);
    }

    #[tokio::test]
    async fn test_takeover_closes_old_transport() {
        let registry = ConnectionRegistry::new();
        let old_conn = ConnectionId::new();
        let new_conn = ConnectionId::new();
        let player_id = PlayerId::new_v4();

        let mut old_receiver = registry.create_connection(old_conn).await;
        let _new_receiver = registry.create_connection(new_conn).await;
        registry
            .bind(old_conn, player_id, "ABC123".to_string())
            .await
            .unwrap();

        let replaced = registry
            .force_rebind(new_conn, player_id, "ABC123".to_string())
            .await
            .unwrap();
        assert_eq!(replaced, Some(old_conn));

        // Old transport got the notice and is gone from the registry.
        let notice = old_receiver.try_recv().unwrap();
        assert!(matches!(notice, ServerMessage::ReplacedByNewConnection));
        assert_eq!(registry.connection_count().await, 1);

        // Tearing down the dead transport later must not unbind the new one.
        registry.remove_connection(old_conn).await;
        assert!(registry.is_player_connected(player_id).await);
    }

    #[tokio::test]
    async fn test_room_broadcast_reaches_only_members() {
        let registry = ConnectionRegistry::new();
        let conn_a = ConnectionId::new();
        let conn_b = ConnectionId::new();
        let conn_other = ConnectionId::new();

        let mut recv_a = registry.create_connection(conn_a).await;
        let mut recv_b = registry.create_connection(conn_b).await;
        let mut recv_other = registry.create_connection(conn_other).await;

        registry
            .bind(conn_a, PlayerId::new_v4(), "ROOM01".to_string())
            .await
            .unwrap();
        registry
            .bind(conn_b, PlayerId::new_v4(), "ROOM01".to_string())
            .await
            .unwrap();
        registry
            .bind(conn_other, PlayerId::new_v4(), "ROOM02".to_string())
            .await
            .unwrap();

        registry
            .broadcast_to_room("ROOM01", ServerMessage::RoomClosed)
            .await;

        assert!(recv_a.try_recv().is_ok());
        assert!(recv_b.try_recv().is_ok());
        assert!(recv_other.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_send_to_closed_connection_errors() {
        let registry = ConnectionRegistry::new();
        let conn_id = ConnectionId::new();

        let receiver = registry.create_connection(conn_id).await;
        drop(receiver);

        let result = registry
            .send_to_connection(
                conn_id,
                ServerMessage::Error {
                    message: "test".to_string(),
                },
            )
            .await;
        assert_eq!(result.unwrap_err(), "Connection closed");
    }
}
