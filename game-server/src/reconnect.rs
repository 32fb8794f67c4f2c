use std::collections::HashMap;
use std::time::Duration;

use game_types::{GamePhase, PlayerId};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

use crate::config::Config;

/// How long a disconnected player's seat is held, by room phase. Low urgency
/// while waiting or reviewing results, tighter mid-game, tightest during the
/// countdown where everyone else is already committed.
pub fn grace_period(config: &Config, phase: GamePhase) -> Duration {
    match phase {
        GamePhase::Waiting | GamePhase::Results => Duration::from_secs(config.grace_waiting_secs),
        GamePhase::Playing => Duration::from_secs(config.grace_playing_secs),
        GamePhase::Countdown => Duration::from_secs(config.grace_countdown_secs),
    }
}

/// Pending eviction timers, keyed by (room code, player id) so a firing
/// timer re-resolves its target by key instead of holding a reference to it.
/// A stale key simply misses the lookup.
pub struct EvictionTimers {
    timers: Mutex<HashMap<(String, PlayerId), JoinHandle<()>>>,
}

impl EvictionTimers {
    pub fn new() -> Self {
        Self {
            timers: Mutex::new(HashMap::new()),
        }
    }

    /// Registers a spawned timer task. A leftover timer for the same key is
    /// superseded, never left dangling.
    pub async fn register(&self, room_code: String, player_id: PlayerId, handle: JoinHandle<()>) {
        let mut timers = self.timers.lock().await;
        if let Some(old) = timers.insert((room_code, player_id), handle) {
            old.abort();
        }
    }

    /// Cancels at most one pending timer. Returns whether one was pending.
    pub async fn cancel(&self, room_code: &str, player_id: PlayerId) -> bool {
        let mut timers = self.timers.lock().await;
        match timers.remove(&(room_code.to_string(), player_id)) {
            Some(handle) => {
                handle.abort();
                true
            }
            None => false,
        }
    }

    /// Removes a timer's own entry as it fires, without aborting it.
    pub async fn clear(&self, room_code: &str, player_id: PlayerId) {
        let mut timers = self.timers.lock().await;
        timers.remove(&(room_code.to_string(), player_id));
    }

    /// Drops every pending timer for a room being deleted.
    pub async fn cancel_room(&self, room_code: &str) {
        let mut timers = self.timers.lock().await;
        timers.retain(|(code, _), handle| {
            if code == room_code {
                handle.abort();
                false
            } else {
                true
            }
        });
    }

    pub async fn pending_count(&self) -> usize {
        self.timers.lock().await.len()
    }
}

impl Default for EvictionTimers {
    fn default() -> Self {
        Self::new()
    }
}
