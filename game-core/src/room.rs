use std::collections::HashMap;
use std::time::{Duration, SystemTime};

use game_types::{
    ConnectionState, GameMode, GamePhase, GameSnapshot, Player, PlayerId, PlayerView,
    PublicRoomInfo, ResultsSnapshot, WaitingSnapshot, WordMode,
};
use thiserror::Error;
use tracing::debug;

use crate::evaluation::{competitive_score, evaluate_guess, rank_results};
use crate::words::WordList;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum RoomError {
    #[error("room is full")]
    RoomFull,
    #[error("game already in progress")]
    GameInProgress,
    #[error("player {0} is not in this room")]
    PlayerNotFound(PlayerId),
    #[error("only the room creator can do that")]
    NotCreator,
    #[error("not all players are ready")]
    PlayersNotReady,
    #[error("not allowed in the current phase")]
    WrongPhase,
    #[error("room settings are locked once the game starts")]
    SettingsLocked,
    #[error("sabotage rooms need a picked word before starting")]
    WordNotPicked,
    #[error("word picking only applies to sabotage rooms")]
    NotSabotageMode,
    #[error("not accepting guesses right now")]
    NotPlaying,
    #[error("word '{0}' is not a valid guess")]
    InvalidWord(String),
    #[error("player already finished this round")]
    AlreadyFinished,
    #[error("no guesses remaining")]
    OutOfGuesses,
}

/// Per-room limits, fixed at creation by server config.
#[derive(Debug, Clone, Copy)]
pub struct RoomConfig {
    pub max_players: usize,
    pub max_guesses: usize,
    pub word_length: usize,
    pub competitive_time_limit: Option<Duration>,
}

impl Default for RoomConfig {
    fn default() -> Self {
        Self {
            max_players: 8,
            max_guesses: 6,
            word_length: 5,
            competitive_time_limit: Some(Duration::from_secs(300)),
        }
    }
}

/// What a single accepted guess did to the submitting player's state.
#[derive(Debug, Clone)]
pub struct GuessOutcome {
    pub result: Vec<game_types::LetterStatus>,
    pub is_win: bool,
    pub is_loss: bool,
    pub finished: bool,
    /// True when every room member has now finished.
    pub round_over: bool,
}

#[derive(Debug)]
pub struct RemovalOutcome {
    pub removed: Player,
    pub new_creator: Option<PlayerId>,
    pub now_empty: bool,
}

/// One game instance: ordered players, target word, and the phase state
/// machine (`Waiting → Countdown → Playing → Results → Waiting`).
///
/// Every operation validates its preconditions fully before mutating, so a
/// rejected call leaves the room exactly as it was. Broadcasting is the
/// server layer's job; room methods only return what changed.
pub struct Room {
    pub code: String,
    pub players: Vec<Player>,
    pub creator_id: Option<PlayerId>,
    pub game_mode: GameMode,
    pub word_mode: WordMode,
    pub is_public: bool,
    pub phase: GamePhase,
    pub day_index: Option<u32>,
    config: RoomConfig,
    target_word: Option<String>,
    picked_word: Option<String>,
    started_at: Option<SystemTime>,
    // Last rejected word per player, with a rejection count, backing the
    // forced-override escape hatch.
    rejected_guesses: HashMap<PlayerId, (String, u32)>,
    last_results: Option<ResultsSnapshot>,
}

impl Room {
    pub fn new(
        code: String,
        game_mode: GameMode,
        word_mode: WordMode,
        is_public: bool,
        config: RoomConfig,
    ) -> Self {
        Self {
            code,
            players: Vec::new(),
            creator_id: None,
            game_mode,
            word_mode,
            is_public,
            phase: GamePhase::Waiting,
            day_index: None,
            config,
            target_word: None,
            picked_word: None,
            started_at: None,
            rejected_guesses: HashMap::new(),
            last_results: None,
        }
    }

    pub fn config(&self) -> &RoomConfig {
        &self.config
    }

    pub fn is_full(&self) -> bool {
        self.players.len() >= self.config.max_players
    }

    pub fn is_empty(&self) -> bool {
        self.players.is_empty()
    }

    pub fn connected_count(&self) -> usize {
        self.players
            .iter()
            .filter(|p| p.connection.is_connected())
            .count()
    }

    pub fn player(&self, id: PlayerId) -> Result<&Player, RoomError> {
        self.players
            .iter()
            .find(|p| p.id == id)
            .ok_or(RoomError::PlayerNotFound(id))
    }

    fn player_mut(&mut self, id: PlayerId) -> Result<&mut Player, RoomError> {
        self.players
            .iter_mut()
            .find(|p| p.id == id)
            .ok_or(RoomError::PlayerNotFound(id))
    }

    fn require_creator(&self, actor: PlayerId) -> Result<(), RoomError> {
        if self.creator_id == Some(actor) {
            Ok(())
        } else {
            Err(RoomError::NotCreator)
        }
    }

    /// Mints a stable identity for a new member. The first player to join
    /// becomes the creator.
    pub fn add_player(
        &mut self,
        display_name: String,
        email: Option<String>,
    ) -> Result<&Player, RoomError> {
        if self.phase != GamePhase::Waiting {
            return Err(RoomError::GameInProgress);
        }
        if self.is_full() {
            return Err(RoomError::RoomFull);
        }

        let mut player = Player::new(PlayerId::new_v4(), display_name, email);
        if self.players.is_empty() {
            player.is_creator = true;
            self.creator_id = Some(player.id);
        }
        self.players.push(player);
        Ok(self.players.last().expect("just pushed"))
    }

    /// Permanent removal: voluntary leave or grace-period eviction. Applies
    /// creator transfer when the creator goes.
    pub fn remove_player(&mut self, id: PlayerId) -> Result<RemovalOutcome, RoomError> {
        let index = self
            .players
            .iter()
            .position(|p| p.id == id)
            .ok_or(RoomError::PlayerNotFound(id))?;

        let removed = self.players.remove(index);
        self.rejected_guesses.remove(&id);

        let new_creator = if removed.is_creator && !self.players.is_empty() {
            self.transfer_creator()
        } else if self.players.is_empty() {
            self.creator_id = None;
            None
        } else {
            None
        };

        Ok(RemovalOutcome {
            removed,
            new_creator,
            now_empty: self.players.is_empty(),
        })
    }

    /// Deterministic creator succession: lowest-index connected player,
    /// falling back to the lowest-index player if nobody is connected.
    fn transfer_creator(&mut self) -> Option<PlayerId> {
        let heir = self
            .players
            .iter()
            .position(|p| p.connection.is_connected())
            .unwrap_or(0);
        let id = self.players[heir].id;
        for p in self.players.iter_mut() {
            p.is_creator = p.id == id;
        }
        self.creator_id = Some(id);
        debug!(room = %self.code, new_creator = %id, "creator transferred");
        Some(id)
    }

    /// Flags a player as disconnected. Returns `false` for a duplicate
    /// teardown event so callers never start a second grace timer.
    pub fn mark_disconnected(
        &mut self,
        id: PlayerId,
        since_epoch_ms: i64,
    ) -> Result<bool, RoomError> {
        let player = self.player_mut(id)?;
        if !player.connection.is_connected() {
            return Ok(false);
        }
        player.connection = ConnectionState::Disconnected { since_epoch_ms };
        Ok(true)
    }

    pub fn mark_reconnected(&mut self, id: PlayerId) -> Result<(), RoomError> {
        let player = self.player_mut(id)?;
        player.connection = ConnectionState::Connected;
        Ok(())
    }

    /// Readiness toggle. In the results phase, readying up doubles as the
    /// play-again signal: the room resets to waiting first. Returns `true`
    /// when that reset happened.
    pub fn set_ready(&mut self, id: PlayerId, ready: bool) -> Result<bool, RoomError> {
        match self.phase {
            GamePhase::Waiting => {
                self.player_mut(id)?.is_ready = ready;
                Ok(false)
            }
            GamePhase::Results => {
                self.player(id)?;
                if !ready {
                    return Ok(false);
                }
                self.reset_for_rematch();
                self.player_mut(id)?.is_ready = true;
                Ok(true)
            }
            GamePhase::Countdown | GamePhase::Playing => Err(RoomError::WrongPhase),
        }
    }

    pub fn set_game_mode(&mut self, actor: PlayerId, mode: GameMode) -> Result<(), RoomError> {
        self.require_creator(actor)?;
        if self.phase != GamePhase::Waiting {
            return Err(RoomError::SettingsLocked);
        }
        self.game_mode = mode;
        Ok(())
    }

    pub fn set_word_mode(&mut self, actor: PlayerId, mode: WordMode) -> Result<(), RoomError> {
        self.require_creator(actor)?;
        if self.phase != GamePhase::Waiting {
            return Err(RoomError::SettingsLocked);
        }
        self.word_mode = mode;
        if mode != WordMode::Sabotage {
            self.picked_word = None;
        }
        Ok(())
    }

    pub fn set_visibility(&mut self, actor: PlayerId, is_public: bool) -> Result<(), RoomError> {
        self.require_creator(actor)?;
        if self.phase != GamePhase::Waiting {
            return Err(RoomError::SettingsLocked);
        }
        self.is_public = is_public;
        Ok(())
    }

    /// Creator picks the target word for a sabotage room. Dictionary
    /// membership is the caller's check; length is enforced here.
    pub fn pick_word(&mut self, actor: PlayerId, word: &str) -> Result<(), RoomError> {
        self.require_creator(actor)?;
        if self.phase != GamePhase::Waiting {
            return Err(RoomError::SettingsLocked);
        }
        if self.word_mode != WordMode::Sabotage {
            return Err(RoomError::NotSabotageMode);
        }
        let word = word.trim().to_lowercase();
        if word.len() != self.config.word_length {
            return Err(RoomError::InvalidWord(word));
        }
        self.picked_word = Some(word);
        Ok(())
    }

    pub fn picked_word(&self) -> Option<&str> {
        self.picked_word.as_deref()
    }

    /// All start preconditions, checked without mutating. Solo starts are
    /// allowed as a practice bypass; otherwise every member must be ready.
    pub fn can_start(&self, actor: PlayerId) -> Result<(), RoomError> {
        self.require_creator(actor)?;
        if self.phase != GamePhase::Waiting {
            return Err(RoomError::WrongPhase);
        }
        if !self.players.iter().all(|p| p.is_ready) {
            return Err(RoomError::PlayersNotReady);
        }
        if self.word_mode == WordMode::Sabotage && self.picked_word.is_none() {
            return Err(RoomError::WordNotPicked);
        }
        Ok(())
    }

    pub fn begin_countdown(&mut self) -> Result<(), RoomError> {
        if self.phase != GamePhase::Waiting {
            return Err(RoomError::WrongPhase);
        }
        self.phase = GamePhase::Countdown;
        Ok(())
    }

    /// Flips into the playing phase with the supplied target word and
    /// returns the roster to broadcast. The word itself never leaves here
    /// until `finish_round`.
    pub fn begin_playing(
        &mut self,
        target_word: String,
        day_index: Option<u32>,
    ) -> Result<Vec<PlayerView>, RoomError> {
        if self.phase != GamePhase::Countdown {
            return Err(RoomError::WrongPhase);
        }
        for p in self.players.iter_mut() {
            p.reset_round_state();
        }
        self.rejected_guesses.clear();
        self.target_word = Some(target_word.to_lowercase());
        self.day_index = day_index;
        self.started_at = Some(SystemTime::now());
        self.phase = GamePhase::Playing;
        Ok(self.roster())
    }

    /// Wall-clock time since the round started. Keeps running while players
    /// are disconnected.
    pub fn elapsed(&self) -> Duration {
        self.started_at
            .and_then(|t| t.elapsed().ok())
            .unwrap_or_default()
    }

    pub fn time_limit(&self) -> Option<Duration> {
        match self.game_mode {
            GameMode::Competitive => self.config.competitive_time_limit,
            GameMode::Casual => None,
        }
    }

    pub fn time_expired(&self) -> bool {
        self.phase == GamePhase::Playing
            && self.time_limit().is_some_and(|limit| self.elapsed() > limit)
    }

    /// Process one guess. Invalid guesses are rejected before any player
    /// state changes; the `forced` flag only bypasses dictionary validation
    /// once the same word has been rejected twice.
    pub fn submit_guess(
        &mut self,
        player_id: PlayerId,
        word: &str,
        forced: bool,
        in_dictionary: bool,
    ) -> Result<GuessOutcome, RoomError> {
        if self.phase != GamePhase::Playing {
            return Err(RoomError::NotPlaying);
        }
        let word = word.trim().to_lowercase();
        let max_guesses = self.config.max_guesses;
        let word_length = self.config.word_length;
        let game_mode = self.game_mode;
        let elapsed_secs = self.elapsed().as_secs();
        let target = self
            .target_word
            .clone()
            .ok_or(RoomError::NotPlaying)?;

        {
            let player = self.player(player_id)?;
            if player.finished {
                return Err(RoomError::AlreadyFinished);
            }
            if player.guesses.len() >= max_guesses {
                return Err(RoomError::OutOfGuesses);
            }
        }

        if word.len() != word_length {
            return Err(RoomError::InvalidWord(word));
        }

        if !in_dictionary {
            let entry = self
                .rejected_guesses
                .entry(player_id)
                .or_insert_with(|| (word.clone(), 0));
            if entry.0 != word {
                *entry = (word.clone(), 0);
            }
            if !(forced && entry.1 >= 2) {
                entry.1 += 1;
                return Err(RoomError::InvalidWord(word));
            }
        }
        self.rejected_guesses.remove(&player_id);

        let result = evaluate_guess(&word, &target);
        let is_win = word == target;

        let player = self.player_mut(player_id)?;
        player.guesses.push(word);
        player.results.push(result.clone());

        let finished = is_win || player.guesses.len() >= max_guesses;
        if finished {
            player.finished = true;
            player.won = is_win;
            player.finish_time_secs = Some(elapsed_secs);
            if game_mode == GameMode::Competitive {
                player.score =
                    competitive_score(max_guesses, player.guesses.len(), elapsed_secs, is_win);
            }
        }

        Ok(GuessOutcome {
            result,
            is_win,
            is_loss: finished && !is_win,
            finished,
            round_over: self.all_players_finished(),
        })
    }

    pub fn all_players_finished(&self) -> bool {
        !self.players.is_empty() && self.players.iter().all(|p| p.finished)
    }

    /// Ends the round and reveals the word. Players who never finished count
    /// as not-won in the standings.
    pub fn finish_round(&mut self) -> Result<ResultsSnapshot, RoomError> {
        if self.phase != GamePhase::Playing {
            return Err(RoomError::NotPlaying);
        }
        let word = self.target_word.clone().ok_or(RoomError::NotPlaying)?;
        self.phase = GamePhase::Results;

        let snapshot = ResultsSnapshot {
            code: self.code.clone(),
            word,
            results: rank_results(&self.players),
        };
        self.last_results = Some(snapshot.clone());
        Ok(snapshot)
    }

    pub fn last_results(&self) -> Option<&ResultsSnapshot> {
        self.last_results.as_ref()
    }

    /// Back to the waiting phase for another round in the same room.
    pub fn reset_for_rematch(&mut self) {
        for p in self.players.iter_mut() {
            p.reset_round_state();
        }
        self.target_word = None;
        self.picked_word = None;
        self.started_at = None;
        self.day_index = None;
        self.rejected_guesses.clear();
        self.last_results = None;
        self.phase = GamePhase::Waiting;
    }

    pub fn roster(&self) -> Vec<PlayerView> {
        self.players.iter().map(|p| p.public_view()).collect()
    }

    pub fn waiting_snapshot(&self) -> WaitingSnapshot {
        WaitingSnapshot {
            code: self.code.clone(),
            players: self.roster(),
            game_mode: self.game_mode,
            word_mode: self.word_mode,
            is_public: self.is_public,
        }
    }

    /// Mid-game resync for one player: their own letters, everyone else's
    /// colors, and the server-authoritative clock.
    pub fn game_snapshot(&self, for_player: PlayerId) -> Result<GameSnapshot, RoomError> {
        let player = self.player(for_player)?;
        Ok(GameSnapshot {
            code: self.code.clone(),
            players: self.roster(),
            own_guesses: player.guesses.clone(),
            own_results: player.results.clone(),
            game_time_secs: self.elapsed().as_secs(),
            word_length: self.config.word_length,
            max_guesses: self.config.max_guesses,
            game_mode: self.game_mode,
        })
    }

    pub fn public_info(&self) -> PublicRoomInfo {
        PublicRoomInfo {
            code: self.code.clone(),
            player_count: self.players.len(),
            max_players: self.config.max_players,
            game_mode: self.game_mode,
            word_mode: self.word_mode,
            day_index: (self.word_mode == WordMode::Daily).then(WordList::today_index),
        }
    }

    /// Joinable from the lobby: public, still waiting, and not full.
    pub fn is_lobby_visible(&self) -> bool {
        self.is_public && self.phase == GamePhase::Waiting && !self.is_full()
    }
}
