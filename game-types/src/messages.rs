use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::{
    GameMode, GameSnapshot, LetterStatus, PlayerId, PlayerView, PublicRoomInfo, RejoinFailure,
    ResultsSnapshot, WaitingSnapshot, WordMode,
};

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub enum ClientMessage {
    CreateRoom {
        player_name: String,
        player_email: Option<String>,
        game_mode: GameMode,
        word_mode: WordMode,
        is_public: bool,
    },
    JoinRoom {
        room_code: String,
        player_name: String,
        player_email: Option<String>,
    },
    Rejoin {
        room_code: String,
        player_id: PlayerId,
    },
    SetReady {
        ready: bool,
    },
    SetGameMode {
        mode: GameMode,
    },
    SetWordMode {
        mode: WordMode,
    },
    SetRoomVisibility {
        is_public: bool,
    },
    /// Creator supplies the target word in sabotage mode.
    PickWord {
        word: String,
    },
    StartGame,
    Guess {
        word: String,
        forced: bool,
    },
    LeaveRoom,
    CloseRoom,
    /// Email is optional; when present the lobby omits daily rooms the
    /// subscriber has already completed.
    SubscribeLobby {
        email: Option<String>,
    },
    UnsubscribeLobby,
    Heartbeat,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub enum ServerMessage {
    RoomCreated {
        room_code: String,
        player_id: PlayerId,
        snapshot: WaitingSnapshot,
    },
    RoomJoined {
        room_code: String,
        player_id: PlayerId,
        snapshot: WaitingSnapshot,
    },
    PlayerJoined {
        player: PlayerView,
    },
    PlayerLeft {
        player_id: PlayerId,
    },
    RoomClosed,
    BecameCreator,
    GameModeChanged {
        mode: GameMode,
    },
    WordModeChanged {
        mode: WordMode,
    },
    RoomVisibilityChanged {
        is_public: bool,
    },
    PlayerReadyChanged {
        player_id: PlayerId,
        ready: bool,
    },
    Countdown {
        count: u32,
    },
    /// Carries the roster, never the target word.
    GameStarted {
        players: Vec<PlayerView>,
        word_length: usize,
        max_guesses: usize,
    },
    TimerSync {
        game_time_secs: u64,
        player_times: Vec<PlayerTime>,
    },
    /// Sent only to the submitting player, with their own letters.
    GuessResult {
        word: String,
        result: Vec<LetterStatus>,
        is_win: bool,
        is_loss: bool,
    },
    /// Sent to everyone else: colors only.
    OpponentGuess {
        player_id: PlayerId,
        colors: Vec<LetterStatus>,
        is_finished: bool,
        won: bool,
    },
    /// The only message that ever reveals the target word.
    GameEnded {
        snapshot: ResultsSnapshot,
    },
    PlayerDisconnected {
        player_id: PlayerId,
        grace_period_seconds: u64,
    },
    PlayerReconnected {
        player_id: PlayerId,
    },
    RejoinWaiting {
        player_id: PlayerId,
        snapshot: WaitingSnapshot,
    },
    RejoinGame {
        player_id: PlayerId,
        snapshot: GameSnapshot,
    },
    RejoinResults {
        player_id: PlayerId,
        snapshot: ResultsSnapshot,
    },
    RejoinFailed {
        reason: RejoinFailure,
    },
    /// Broadcast when a results-phase room resets for a rematch.
    ReturnedToWaiting {
        snapshot: WaitingSnapshot,
    },
    /// Sent on the old transport when a newer connection takes over the same
    /// player identity.
    ReplacedByNewConnection,
    PublicRoomsList {
        rooms: Vec<PublicRoomInfo>,
    },
    Error {
        message: String,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct PlayerTime {
    pub player_id: PlayerId,
    pub elapsed_secs: u64,
    pub finished: bool,
}
