use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::{LetterStatus, PlayerId};

/// Transport liveness for a room member. The socket handle itself lives in
/// the server's connection registry; a player is `Connected` exactly when a
/// registry entry exists for them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub enum ConnectionState {
    Connected,
    Disconnected { since_epoch_ms: i64 },
}

impl ConnectionState {
    pub fn is_connected(&self) -> bool {
        matches!(self, ConnectionState::Connected)
    }
}

/// Full per-player record held by a room. `guesses` contains raw letters and
/// must only ever be serialized back to this same player; everyone else gets
/// `public_view()`.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Player {
    pub id: PlayerId,
    pub display_name: String,
    pub email: Option<String>,
    pub is_creator: bool,
    pub is_ready: bool,
    pub connection: ConnectionState,
    pub guesses: Vec<String>,
    pub results: Vec<Vec<LetterStatus>>,
    pub finished: bool,
    pub won: bool,
    /// Seconds from round start to finishing, set once.
    pub finish_time_secs: Option<u64>,
    pub score: i32,
}

impl Player {
    pub fn new(id: PlayerId, display_name: String, email: Option<String>) -> Self {
        Self {
            id,
            display_name,
            email,
            is_creator: false,
            is_ready: false,
            connection: ConnectionState::Connected,
            guesses: Vec::new(),
            results: Vec::new(),
            finished: false,
            won: false,
            finish_time_secs: None,
            score: 0,
        }
    }

    /// View safe to broadcast to other players: colors only, no raw letters.
    pub fn public_view(&self) -> PlayerView {
        PlayerView {
            id: self.id,
            display_name: self.display_name.clone(),
            is_creator: self.is_creator,
            is_ready: self.is_ready,
            is_connected: self.connection.is_connected(),
            guess_colors: self.results.clone(),
            finished: self.finished,
            won: self.won,
            finish_time_secs: self.finish_time_secs,
            score: self.score,
        }
    }

    /// Clears everything tied to a single round, keeping identity and
    /// connection state.
    pub fn reset_round_state(&mut self) {
        self.is_ready = false;
        self.guesses.clear();
        self.results.clear();
        self.finished = false;
        self.won = false;
        self.finish_time_secs = None;
        self.score = 0;
    }
}

/// What other room members are allowed to see about a player.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct PlayerView {
    pub id: PlayerId,
    pub display_name: String,
    pub is_creator: bool,
    pub is_ready: bool,
    pub is_connected: bool,
    pub guess_colors: Vec<Vec<LetterStatus>>,
    pub finished: bool,
    pub won: bool,
    pub finish_time_secs: Option<u64>,
    pub score: i32,
}
