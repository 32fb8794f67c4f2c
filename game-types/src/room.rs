use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::{PlayerId, PlayerView};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub enum GamePhase {
    Waiting,
    Countdown,
    Playing,
    Results,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub enum GameMode {
    Casual,
    Competitive,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub enum WordMode {
    /// Everyone in a daily room plays the same deterministic word for the day.
    Daily,
    Random,
    /// The room creator picks the word before the round starts.
    Sabotage,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub enum LetterStatus {
    Correct, // right letter, right position
    Present, // right letter, wrong position
    Absent,  // letter not in word
}

/// Lobby listing entry for a public, joinable room.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct PublicRoomInfo {
    pub code: String,
    pub player_count: usize,
    pub max_players: usize,
    pub game_mode: GameMode,
    pub word_mode: WordMode,
    /// Set for daily rooms so clients can show which day's challenge it is.
    pub day_index: Option<u32>,
}

/// One player's line in the final standings.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct PlayerResult {
    pub player_id: PlayerId,
    pub display_name: String,
    pub won: bool,
    pub guess_count: usize,
    pub finish_time_secs: Option<u64>,
    pub score: i32,
}

/// Resync payload for a rejoin that lands in the waiting phase.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct WaitingSnapshot {
    pub code: String,
    pub players: Vec<PlayerView>,
    pub game_mode: GameMode,
    pub word_mode: WordMode,
    pub is_public: bool,
}

/// Resync payload for a rejoin mid-game. Carries the rejoining player's own
/// raw guesses plus everyone else's colors, never the target word.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct GameSnapshot {
    pub code: String,
    pub players: Vec<PlayerView>,
    pub own_guesses: Vec<String>,
    pub own_results: Vec<Vec<LetterStatus>>,
    pub game_time_secs: u64,
    pub word_length: usize,
    pub max_guesses: usize,
    pub game_mode: GameMode,
}

/// Resync payload for a rejoin after the round has ended.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct ResultsSnapshot {
    pub code: String,
    pub word: String,
    pub results: Vec<PlayerResult>,
}
