use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use game_core::{Room, RoomError, WordList};
use game_types::{
    GameMode, GamePhase, PlayerId, PlayerResult, PlayerTime, PublicRoomInfo, RejoinFailure,
    ResultsSnapshot, ServerMessage, WordMode,
};
use rand::Rng;
use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::config::Config;
use crate::reconnect::{EvictionTimers, grace_period};
use crate::registry::{ConnectionId, ConnectionRegistry};
use crate::stats::StatsSink;

// No ambiguous characters: codes get read aloud and typed.
const CODE_CHARS: &[u8] = b"ABCDEFGHJKMNPQRSTUVWXYZ23456789";
const CODE_LENGTH: usize = 6;

fn generate_room_code() -> String {
    let mut rng = rand::thread_rng();
    (0..CODE_LENGTH)
        .map(|_| CODE_CHARS[rng.gen_range(0..CODE_CHARS.len())] as char)
        .collect()
}

struct RoomEntry {
    room: Room,
    countdown_task: Option<JoinHandle<()>>,
    ticker_task: Option<JoinHandle<()>>,
    last_activity: Instant,
}

impl RoomEntry {
    fn new(room: Room) -> Self {
        Self {
            room,
            countdown_task: None,
            ticker_task: None,
            last_activity: Instant::now(),
        }
    }

    fn touch(&mut self) {
        self.last_activity = Instant::now();
    }
}

/// Everything a finished round needs broadcast and persisted, extracted
/// under the room lock so the sends can happen outside it.
struct EndedRound {
    snapshot: ResultsSnapshot,
    stats_rows: Vec<(PlayerResult, Option<String>)>,
    day_index: Option<u32>,
    ticker: Option<JoinHandle<()>>,
}

/// Owns every live room and drives their lifecycles: creation, membership,
/// the countdown and round timers, disconnect grace periods, and the public
/// lobby feed. Game rules live in [`Room`]; this layer decides who hears
/// about each change.
pub struct RoomManager {
    rooms: RwLock<HashMap<String, RoomEntry>>,
    registry: Arc<ConnectionRegistry>,
    words: Arc<WordList>,
    stats: Arc<dyn StatsSink>,
    evictions: EvictionTimers,
    lobby_subscribers: Mutex<HashMap<ConnectionId, Option<String>>>,
    config: Config,
}

impl RoomManager {
    pub fn new(
        registry: Arc<ConnectionRegistry>,
        words: Arc<WordList>,
        stats: Arc<dyn StatsSink>,
        config: Config,
    ) -> Self {
        Self {
            rooms: RwLock::new(HashMap::new()),
            registry,
            words,
            stats,
            evictions: EvictionTimers::new(),
            lobby_subscribers: Mutex::new(HashMap::new()),
            config,
        }
    }

    /// The (player, room) binding behind a connection, or an error the
    /// handler can relay.
    async fn bound_room(&self, conn_id: ConnectionId) -> Result<(PlayerId, String), String> {
        let connection = self
            .registry
            .get(conn_id)
            .await
            .ok_or("Connection not found")?;
        match (connection.player_id, connection.room_code) {
            (Some(player_id), Some(room_code)) => Ok((player_id, room_code)),
            _ => Err("Not in a room".to_string()),
        }
    }

    /// One room per player: a create or join while already bound leaves the
    /// previous room first.
    async fn leave_if_bound(&self, conn_id: ConnectionId) -> Result<(), String> {
        let connection = self
            .registry
            .get(conn_id)
            .await
            .ok_or("Connection not found")?;
        if connection.player_id.is_some() {
            self.leave_room(conn_id).await?;
        }
        Ok(())
    }

    pub async fn create_room(
        &self,
        conn_id: ConnectionId,
        player_name: String,
        player_email: Option<String>,
        game_mode: GameMode,
        word_mode: WordMode,
        is_public: bool,
    ) -> Result<(), String> {
        self.leave_if_bound(conn_id).await?;

        let (room_code, player_id, snapshot) = {
            let mut rooms = self.rooms.write().await;
            let code = loop {
                let candidate = generate_room_code();
                if !rooms.contains_key(&candidate) {
                    break candidate;
                }
            };
            let mut room = Room::new(
                code.clone(),
                game_mode,
                word_mode,
                is_public,
                self.config.room_config(),
            );
            let player_id = room
                .add_player(player_name, player_email)
                .map_err(|e| e.to_string())?
                .id;
            let snapshot = room.waiting_snapshot();
            rooms.insert(code.clone(), RoomEntry::new(room));
            (code, player_id, snapshot)
        };

        self.registry
            .bind(conn_id, player_id, room_code.clone())
            .await?;
        info!(room = %room_code, player = %player_id, "room created");
        self.registry
            .send_to_connection(
                conn_id,
                ServerMessage::RoomCreated {
                    room_code,
                    player_id,
                    snapshot,
                },
            )
            .await?;
        self.publish_lobby().await;
        Ok(())
    }

    pub async fn join_room(
        &self,
        conn_id: ConnectionId,
        room_code: String,
        player_name: String,
        player_email: Option<String>,
    ) -> Result<(), String> {
        self.leave_if_bound(conn_id).await?;
        let room_code = room_code.trim().to_uppercase();

        let (player_id, view, snapshot) = {
            let mut rooms = self.rooms.write().await;
            let entry = rooms.get_mut(&room_code).ok_or("Room not found")?;
            entry.touch();
            let player = entry
                .room
                .add_player(player_name, player_email)
                .map_err(|e| e.to_string())?;
            let (player_id, view) = (player.id, player.public_view());
            (player_id, view, entry.room.waiting_snapshot())
        };

        self.registry
            .bind(conn_id, player_id, room_code.clone())
            .await?;
        info!(room = %room_code, player = %player_id, "player joined");
        self.registry
            .send_to_connection(
                conn_id,
                ServerMessage::RoomJoined {
                    room_code: room_code.clone(),
                    player_id,
                    snapshot,
                },
            )
            .await?;
        self.registry
            .broadcast_to_room_except(
                &room_code,
                player_id,
                ServerMessage::PlayerJoined { player: view },
            )
            .await;
        self.publish_lobby().await;
        Ok(())
    }

    /// Reattach a transport to an existing player identity. Failures answer
    /// on the requesting transport rather than the error channel so clients
    /// can fall back to a fresh join.
    pub async fn rejoin(
        &self,
        conn_id: ConnectionId,
        room_code: String,
        player_id: PlayerId,
    ) -> Result<(), String> {
        let room_code = room_code.trim().to_uppercase();

        let resync = {
            let mut rooms = self.rooms.write().await;
            match rooms.get_mut(&room_code) {
                None => Err(RejoinFailure::RoomNotFound),
                Some(entry) if entry.room.player(player_id).is_err() => {
                    Err(RejoinFailure::PlayerNotFound)
                }
                Some(entry) => {
                    entry.room.mark_reconnected(player_id).map_err(|e| e.to_string())?;
                    entry.touch();
                    let message = match entry.room.phase {
                        GamePhase::Waiting | GamePhase::Countdown => ServerMessage::RejoinWaiting {
                            player_id,
                            snapshot: entry.room.waiting_snapshot(),
                        },
                        GamePhase::Playing => ServerMessage::RejoinGame {
                            player_id,
                            snapshot: entry
                                .room
                                .game_snapshot(player_id)
                                .map_err(|e| e.to_string())?,
                        },
                        GamePhase::Results => ServerMessage::RejoinResults {
                            player_id,
                            snapshot: entry
                                .room
                                .last_results()
                                .cloned()
                                .ok_or("Results unavailable")?,
                        },
                    };
                    Ok(message)
                }
            }
        };

        let message = match resync {
            Ok(message) => message,
            Err(reason) => {
                let _ = self
                    .registry
                    .send_to_connection(conn_id, ServerMessage::RejoinFailed { reason })
                    .await;
                return Ok(());
            }
        };

        // Bind before cancelling so a firing eviction timer sees the player
        // reconnected either way.
        self.registry
            .force_rebind(conn_id, player_id, room_code.clone())
            .await?;
        self.evictions.cancel(&room_code, player_id).await;

        info!(room = %room_code, player = %player_id, "player rejoined");
        self.registry.send_to_connection(conn_id, message).await?;
        self.registry
            .broadcast_to_room_except(
                &room_code,
                player_id,
                ServerMessage::PlayerReconnected { player_id },
            )
            .await;
        Ok(())
    }

    pub async fn set_ready(&self, conn_id: ConnectionId, ready: bool) -> Result<(), String> {
        let (player_id, room_code) = self.bound_room(conn_id).await?;

        let (reset, snapshot) = {
            let mut rooms = self.rooms.write().await;
            let entry = rooms.get_mut(&room_code).ok_or("Room not found")?;
            entry.touch();
            let reset = entry
                .room
                .set_ready(player_id, ready)
                .map_err(|e| e.to_string())?;
            let snapshot = reset.then(|| entry.room.waiting_snapshot());
            (reset, snapshot)
        };

        if let Some(snapshot) = snapshot {
            self.registry
                .broadcast_to_room(&room_code, ServerMessage::ReturnedToWaiting { snapshot })
                .await;
        }
        self.registry
            .broadcast_to_room(
                &room_code,
                ServerMessage::PlayerReadyChanged { player_id, ready },
            )
            .await;
        if reset {
            // Back in the waiting phase, so the room may be joinable again.
            self.publish_lobby().await;
        }
        Ok(())
    }

    pub async fn set_game_mode(&self, conn_id: ConnectionId, mode: GameMode) -> Result<(), String> {
        let (player_id, room_code) = self.bound_room(conn_id).await?;
        {
            let mut rooms = self.rooms.write().await;
            let entry = rooms.get_mut(&room_code).ok_or("Room not found")?;
            entry.touch();
            entry
                .room
                .set_game_mode(player_id, mode)
                .map_err(|e| e.to_string())?;
        }
        self.registry
            .broadcast_to_room(&room_code, ServerMessage::GameModeChanged { mode })
            .await;
        self.publish_lobby().await;
        Ok(())
    }

    pub async fn set_word_mode(&self, conn_id: ConnectionId, mode: WordMode) -> Result<(), String> {
        let (player_id, room_code) = self.bound_room(conn_id).await?;
        {
            let mut rooms = self.rooms.write().await;
            let entry = rooms.get_mut(&room_code).ok_or("Room not found")?;
            entry.touch();
            entry
                .room
                .set_word_mode(player_id, mode)
                .map_err(|e| e.to_string())?;
        }
        self.registry
            .broadcast_to_room(&room_code, ServerMessage::WordModeChanged { mode })
            .await;
        self.publish_lobby().await;
        Ok(())
    }

    pub async fn set_visibility(
        &self,
        conn_id: ConnectionId,
        is_public: bool,
    ) -> Result<(), String> {
        let (player_id, room_code) = self.bound_room(conn_id).await?;
        {
            let mut rooms = self.rooms.write().await;
            let entry = rooms.get_mut(&room_code).ok_or("Room not found")?;
            entry.touch();
            entry
                .room
                .set_visibility(player_id, is_public)
                .map_err(|e| e.to_string())?;
        }
        self.registry
            .broadcast_to_room(
                &room_code,
                ServerMessage::RoomVisibilityChanged { is_public },
            )
            .await;
        self.publish_lobby().await;
        Ok(())
    }

    pub async fn pick_word(&self, conn_id: ConnectionId, word: String) -> Result<(), String> {
        let (player_id, room_code) = self.bound_room(conn_id).await?;
        if !self.words.contains(&word) {
            return Err(RoomError::InvalidWord(word.trim().to_lowercase()).to_string());
        }
        let mut rooms = self.rooms.write().await;
        let entry = rooms.get_mut(&room_code).ok_or("Room not found")?;
        entry.touch();
        entry
            .room
            .pick_word(player_id, &word)
            .map_err(|e| e.to_string())
    }

    /// Kicks off the pre-game countdown. The countdown task re-resolves the
    /// room when it fires, so a room deleted mid-countdown just means a
    /// silent no-op at the end.
    pub async fn start_game(self: Arc<Self>, conn_id: ConnectionId) -> Result<(), String> {
        let (player_id, room_code) = self.bound_room(conn_id).await?;
        {
            let mut rooms = self.rooms.write().await;
            let entry = rooms.get_mut(&room_code).ok_or("Room not found")?;
            entry.room.can_start(player_id).map_err(|e| e.to_string())?;
            entry.room.begin_countdown().map_err(|e| e.to_string())?;
            entry.touch();

            let manager = Arc::clone(&self);
            let code = room_code.clone();
            let seconds = self.config.countdown_seconds;
            entry.countdown_task = Some(tokio::spawn(async move {
                for count in (1..=seconds).rev() {
                    manager
                        .registry
                        .broadcast_to_room(&code, ServerMessage::Countdown { count })
                        .await;
                    tokio::time::sleep(Duration::from_secs(1)).await;
                }
                manager.start_playing(&code).await;
            }));
        }
        info!(room = %room_code, "countdown started");
        self.publish_lobby().await;
        Ok(())
    }

    /// Countdown finished: pick the target word and flip into play.
    async fn start_playing(self: Arc<Self>, room_code: &str) {
        let started = {
            let mut rooms = self.rooms.write().await;
            let Some(entry) = rooms.get_mut(room_code) else {
                return;
            };
            if entry.room.phase != GamePhase::Countdown {
                return;
            }

            let selection = match entry.room.word_mode {
                WordMode::Daily => {
                    let day = WordList::today_index();
                    self.words.daily_word(day).map(|word| (word, Some(day)))
                }
                WordMode::Random => self.words.random_word().map(|word| (word, None)),
                WordMode::Sabotage => entry
                    .room
                    .picked_word()
                    .map(|word| (word.to_string(), None))
                    .ok_or_else(|| anyhow::anyhow!("sabotage word missing")),
            };

            match selection.and_then(|(target, day_index)| {
                entry
                    .room
                    .begin_playing(target, day_index)
                    .map_err(anyhow::Error::from)
            }) {
                Ok(players) => {
                    let config = entry.room.config();
                    let message = ServerMessage::GameStarted {
                        players,
                        word_length: config.word_length,
                        max_guesses: config.max_guesses,
                    };
                    let manager = Arc::clone(&self);
                    let code = room_code.to_string();
                    entry.ticker_task =
                        Some(tokio::spawn(async move { manager.run_ticker(code).await }));
                    Ok(message)
                }
                Err(e) => {
                    warn!(room = %room_code, error = %e, "could not start round");
                    entry.room.reset_for_rematch();
                    Err((e.to_string(), entry.room.waiting_snapshot()))
                }
            }
        };

        match started {
            Ok(message) => {
                info!(room = %room_code, "round started");
                self.registry.broadcast_to_room(room_code, message).await;
            }
            Err((message, snapshot)) => {
                self.registry
                    .broadcast_to_room(room_code, ServerMessage::Error { message })
                    .await;
                self.registry
                    .broadcast_to_room(room_code, ServerMessage::ReturnedToWaiting { snapshot })
                    .await;
                self.publish_lobby().await;
            }
        }
    }

    /// Per-room clock loop. Broadcasts the authoritative elapsed time every
    /// tick and ends the round when a competitive time limit runs out. Exits
    /// on its own once the room leaves the playing phase.
    async fn run_ticker(&self, room_code: String) {
        let tick = Duration::from_millis(self.config.timer_tick_millis);
        loop {
            tokio::time::sleep(tick).await;

            enum Step {
                Sync(ServerMessage),
                Ended(EndedRound),
            }

            let step = {
                let mut rooms = self.rooms.write().await;
                let Some(entry) = rooms.get_mut(&room_code) else {
                    return;
                };
                if entry.room.phase != GamePhase::Playing {
                    return;
                }
                if entry.room.time_expired() {
                    match Self::end_round(entry) {
                        Ok(ended) => Step::Ended(ended),
                        Err(_) => return,
                    }
                } else {
                    let elapsed = entry.room.elapsed().as_secs();
                    let player_times = entry
                        .room
                        .players
                        .iter()
                        .map(|p| PlayerTime {
                            player_id: p.id,
                            elapsed_secs: p.finish_time_secs.unwrap_or(elapsed),
                            finished: p.finished,
                        })
                        .collect();
                    Step::Sync(ServerMessage::TimerSync {
                        game_time_secs: elapsed,
                        player_times,
                    })
                }
            };

            match step {
                Step::Sync(message) => {
                    self.registry.broadcast_to_room(&room_code, message).await;
                }
                Step::Ended(mut ended) => {
                    info!(room = %room_code, "time limit reached; round over");
                    // This task IS the ticker; dropping the handle detaches
                    // it instead of cancelling the announcement below.
                    drop(ended.ticker.take());
                    self.announce_round_end(&room_code, ended).await;
                    return;
                }
            }
        }
    }

    pub async fn submit_guess(
        &self,
        conn_id: ConnectionId,
        word: String,
        forced: bool,
    ) -> Result<(), String> {
        let (player_id, room_code) = self.bound_room(conn_id).await?;
        let in_dictionary = self.words.contains(&word);

        let (outcome, ended) = {
            let mut rooms = self.rooms.write().await;
            let entry = rooms.get_mut(&room_code).ok_or("Room not found")?;
            entry.touch();
            let outcome = entry
                .room
                .submit_guess(player_id, &word, forced, in_dictionary)
                .map_err(|e| e.to_string())?;
            let ended = if outcome.round_over {
                Some(Self::end_round(entry).map_err(|e| e.to_string())?)
            } else {
                None
            };
            (outcome, ended)
        };

        // Raw letters go only to the submitter; everyone else sees colors.
        let _ = self
            .registry
            .send_to_player(
                player_id,
                ServerMessage::GuessResult {
                    word: word.trim().to_lowercase(),
                    result: outcome.result.clone(),
                    is_win: outcome.is_win,
                    is_loss: outcome.is_loss,
                },
            )
            .await;
        self.registry
            .broadcast_to_room_except(
                &room_code,
                player_id,
                ServerMessage::OpponentGuess {
                    player_id,
                    colors: outcome.result,
                    is_finished: outcome.finished,
                    won: outcome.is_win,
                },
            )
            .await;

        if let Some(mut ended) = ended {
            if let Some(ticker) = ended.ticker.take() {
                ticker.abort();
            }
            self.announce_round_end(&room_code, ended).await;
        }
        Ok(())
    }

    /// Closes out the round under the room lock: standings computed, ticker
    /// handle detached from the entry. Sends happen afterwards.
    fn end_round(entry: &mut RoomEntry) -> Result<EndedRound, RoomError> {
        let day_index = entry.room.day_index;
        let snapshot = entry.room.finish_round()?;
        let stats_rows = snapshot
            .results
            .iter()
            .map(|r| {
                let email = entry
                    .room
                    .player(r.player_id)
                    .ok()
                    .and_then(|p| p.email.clone());
                (r.clone(), email)
            })
            .collect();
        Ok(EndedRound {
            snapshot,
            stats_rows,
            day_index,
            ticker: entry.ticker_task.take(),
        })
    }

    async fn announce_round_end(&self, room_code: &str, ended: EndedRound) {
        self.registry
            .broadcast_to_room(
                room_code,
                ServerMessage::GameEnded {
                    snapshot: ended.snapshot,
                },
            )
            .await;
        self.stats
            .record_game(room_code, ended.day_index, &ended.stats_rows)
            .await;
    }

    pub async fn leave_room(&self, conn_id: ConnectionId) -> Result<(), String> {
        let (player_id, room_code) = self.bound_room(conn_id).await?;
        self.registry.unbind(conn_id).await;
        self.evictions.cancel(&room_code, player_id).await;

        let removal = {
            let mut rooms = self.rooms.write().await;
            let entry = rooms.get_mut(&room_code).ok_or("Room not found")?;
            entry.touch();
            entry
                .room
                .remove_player(player_id)
                .map_err(|e| e.to_string())?
        };

        info!(room = %room_code, player = %player_id, "player left");
        self.finish_departure(&room_code, player_id, removal.new_creator, removal.now_empty)
            .await;
        Ok(())
    }

    pub async fn close_room(&self, conn_id: ConnectionId) -> Result<(), String> {
        let (player_id, room_code) = self.bound_room(conn_id).await?;
        {
            let rooms = self.rooms.read().await;
            let entry = rooms.get(&room_code).ok_or("Room not found")?;
            if entry.room.creator_id != Some(player_id) {
                return Err(RoomError::NotCreator.to_string());
            }
        }
        self.delete_room(&room_code, true).await;
        self.publish_lobby().await;
        Ok(())
    }

    /// Transport gone with a player still bound: mark them disconnected,
    /// tell the room, and arm the grace-period eviction timer. A duplicate
    /// teardown for an already-disconnected player arms nothing.
    pub async fn handle_transport_closed(self: Arc<Self>, player_id: PlayerId, room_code: String) {
        let grace = {
            let mut rooms = self.rooms.write().await;
            let Some(entry) = rooms.get_mut(&room_code) else {
                return;
            };
            let now_ms = chrono::Utc::now().timestamp_millis();
            match entry.room.mark_disconnected(player_id, now_ms) {
                Ok(true) => grace_period(&self.config, entry.room.phase),
                Ok(false) | Err(_) => return,
            }
        };

        info!(
            room = %room_code,
            player = %player_id,
            grace_secs = grace.as_secs(),
            "player disconnected"
        );
        self.registry
            .broadcast_to_room(
                &room_code,
                ServerMessage::PlayerDisconnected {
                    player_id,
                    grace_period_seconds: grace.as_secs(),
                },
            )
            .await;

        let manager = Arc::clone(&self);
        let code = room_code.clone();
        let handle = tokio::spawn(async move {
            tokio::time::sleep(grace).await;
            manager.evict_if_still_disconnected(&code, player_id).await;
        });
        self.evictions.register(room_code, player_id, handle).await;
    }

    /// Grace timer fired. The key is re-resolved against live state, so a
    /// player who reconnected, already left, or whose room is gone makes
    /// this a no-op.
    async fn evict_if_still_disconnected(&self, room_code: &str, player_id: PlayerId) {
        self.evictions.clear(room_code, player_id).await;

        let removal = {
            let mut rooms = self.rooms.write().await;
            let Some(entry) = rooms.get_mut(room_code) else {
                return;
            };
            let Ok(player) = entry.room.player(player_id) else {
                return;
            };
            if player.connection.is_connected() {
                return;
            }
            match entry.room.remove_player(player_id) {
                Ok(removal) => removal,
                Err(_) => return,
            }
        };

        info!(room = %room_code, player = %player_id, "grace period expired; player evicted");
        self.finish_departure(room_code, player_id, removal.new_creator, removal.now_empty)
            .await;
    }

    /// Shared tail of every permanent departure: announce it, hand off the
    /// creator role, delete the room if it emptied, and end a round that can
    /// no longer continue.
    async fn finish_departure(
        &self,
        room_code: &str,
        player_id: PlayerId,
        new_creator: Option<PlayerId>,
        now_empty: bool,
    ) {
        self.registry.unbind_player(player_id).await;

        if now_empty {
            self.delete_room(room_code, false).await;
        } else {
            self.registry
                .broadcast_to_room(room_code, ServerMessage::PlayerLeft { player_id })
                .await;
            if let Some(new_creator) = new_creator {
                let _ = self
                    .registry
                    .send_to_player(new_creator, ServerMessage::BecameCreator)
                    .await;
            }
            self.check_forced_round_end(room_code).await;
        }
        self.publish_lobby().await;
    }

    /// A departure mid-round can leave the game unfinishable: everyone left
    /// standing has finished, or at most one player remains connected.
    async fn check_forced_round_end(&self, room_code: &str) {
        let ended = {
            let mut rooms = self.rooms.write().await;
            let Some(entry) = rooms.get_mut(room_code) else {
                return;
            };
            if entry.room.phase != GamePhase::Playing {
                return;
            }
            if !entry.room.all_players_finished() && entry.room.connected_count() > 1 {
                return;
            }
            match Self::end_round(entry) {
                Ok(ended) => ended,
                Err(_) => return,
            }
        };

        info!(room = %room_code, "round cannot continue; ending early");
        let mut ended = ended;
        if let Some(ticker) = ended.ticker.take() {
            ticker.abort();
        }
        self.announce_round_end(room_code, ended).await;
    }

    /// Removes a room and everything attached to it. `announce` controls the
    /// [`ServerMessage::RoomClosed`] broadcast; an emptied room has nobody
    /// left to tell.
    async fn delete_room(&self, room_code: &str, announce: bool) {
        let entry = { self.rooms.write().await.remove(room_code) };
        let Some(mut entry) = entry else {
            return;
        };
        if let Some(handle) = entry.countdown_task.take() {
            handle.abort();
        }
        if let Some(handle) = entry.ticker_task.take() {
            handle.abort();
        }
        self.evictions.cancel_room(room_code).await;

        if announce {
            self.registry
                .broadcast_to_room(room_code, ServerMessage::RoomClosed)
                .await;
        }
        for player in &entry.room.players {
            self.registry.unbind_player(player.id).await;
        }
        info!(room = %room_code, "room deleted");
    }

    pub async fn subscribe_lobby(&self, conn_id: ConnectionId, email: Option<String>) {
        self.lobby_subscribers
            .lock()
            .await
            .insert(conn_id, email.clone());
        let rooms = self.lobby_rooms_for(email.as_deref()).await;
        let _ = self
            .registry
            .send_to_connection(conn_id, ServerMessage::PublicRoomsList { rooms })
            .await;
    }

    pub async fn unsubscribe_lobby(&self, conn_id: ConnectionId) {
        self.lobby_subscribers.lock().await.remove(&conn_id);
    }

    async fn lobby_rooms_for(&self, email: Option<&str>) -> Vec<PublicRoomInfo> {
        let infos: Vec<PublicRoomInfo> = {
            let rooms = self.rooms.read().await;
            rooms
                .values()
                .filter(|entry| entry.room.is_lobby_visible())
                .map(|entry| entry.room.public_info())
                .collect()
        };

        let mut visible = Vec::with_capacity(infos.len());
        for info in infos {
            if let (Some(email), Some(day)) = (email, info.day_index) {
                if self.stats.has_completed_daily(email, day).await {
                    continue;
                }
            }
            visible.push(info);
        }
        visible
    }

    /// Pushes a fresh (per-subscriber filtered) room list to every lobby
    /// subscriber. Dead subscribers are pruned as sends fail.
    async fn publish_lobby(&self) {
        let subscribers: Vec<(ConnectionId, Option<String>)> = {
            let subscribers = self.lobby_subscribers.lock().await;
            subscribers
                .iter()
                .map(|(id, email)| (*id, email.clone()))
                .collect()
        };

        for (conn_id, email) in subscribers {
            let rooms = self.lobby_rooms_for(email.as_deref()).await;
            if self
                .registry
                .send_to_connection(conn_id, ServerMessage::PublicRoomsList { rooms })
                .await
                .is_err()
            {
                self.lobby_subscribers.lock().await.remove(&conn_id);
            }
        }
    }

    /// Keeps a fully-disconnected room's seat reservations from outliving
    /// everyone's interest in them.
    pub async fn run_cleanup_task(self: Arc<Self>) {
        let mut interval =
            tokio::time::interval(Duration::from_secs(self.config.cleanup_interval_secs));
        loop {
            interval.tick().await;
            self.sweep_idle_rooms().await;
        }
    }

    /// A room is idle once no member has a live transport in the registry.
    /// The room's own connection flags are not consulted: a create or join
    /// cancelled mid-flight can leave a member marked connected whose
    /// registry binding never landed.
    pub async fn sweep_idle_rooms(&self) {
        let idle_after = Duration::from_secs(self.config.room_idle_timeout_minutes * 60);
        let candidates: Vec<(String, Vec<PlayerId>)> = {
            let rooms = self.rooms.read().await;
            rooms
                .iter()
                .filter(|(_, entry)| entry.last_activity.elapsed() > idle_after)
                .map(|(code, entry)| {
                    let members = entry.room.players.iter().map(|p| p.id).collect();
                    (code.clone(), members)
                })
                .collect()
        };

        let mut stale = Vec::new();
        for (code, members) in candidates {
            let mut live = false;
            for player_id in members {
                if self.registry.is_player_connected(player_id).await {
                    live = true;
                    break;
                }
            }
            if !live {
                stale.push(code);
            }
        }

        if stale.is_empty() {
            return;
        }
        for code in stale {
            info!(room = %code, "removing idle room");
            self.delete_room(&code, true).await;
        }
        self.publish_lobby().await;
    }

    /// Liveness signal only; counts as room activity for the idle sweep.
    pub async fn heartbeat(&self, conn_id: ConnectionId) {
        if let Ok((_, room_code)) = self.bound_room(conn_id).await {
            let mut rooms = self.rooms.write().await;
            if let Some(entry) = rooms.get_mut(&room_code) {
                entry.touch();
            }
        }
    }

    pub async fn room_count(&self) -> usize {
        self.rooms.read().await.len()
    }

    pub async fn room_phase(&self, room_code: &str) -> Option<GamePhase> {
        let rooms = self.rooms.read().await;
        rooms.get(room_code).map(|entry| entry.room.phase)
    }

    pub async fn room_player_count(&self, room_code: &str) -> Option<usize> {
        let rooms = self.rooms.read().await;
        rooms.get(room_code).map(|entry| entry.room.players.len())
    }

    pub async fn pending_evictions(&self) -> usize {
        self.evictions.pending_count().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn room_codes_use_the_unambiguous_alphabet() {
        for _ in 0..50 {
            let code = generate_room_code();
            assert_eq!(code.len(), CODE_LENGTH);
            assert!(code.bytes().all(|b| CODE_CHARS.contains(&b)));
        }
    }
}
