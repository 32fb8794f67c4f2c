use std::env;
use std::time::Duration;

use game_core::RoomConfig;

#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub word_list_path: String,
    pub word_length: usize,
    pub max_guesses: usize,
    pub max_players_per_room: usize,
    pub countdown_seconds: u32,
    pub grace_waiting_secs: u64,
    pub grace_playing_secs: u64,
    pub grace_countdown_secs: u64,
    pub competitive_time_limit_secs: u64,
    pub room_idle_timeout_minutes: u64,
    pub timer_tick_millis: u64,
    pub cleanup_interval_secs: u64,
}

impl Config {
    pub fn new() -> Self {
        Self {
            host: env::var("HOST").unwrap_or_else(|_| "127.0.0.1".to_string()),
            port: env::var("PORT")
                .unwrap_or_else(|_| "8080".to_string())
                .parse()
                .expect("Invalid PORT"),
            word_list_path: env::var("WORD_LIST_PATH")
                .unwrap_or_else(|_| "./words.txt".to_string()),
            word_length: env::var("WORD_LENGTH")
                .unwrap_or_else(|_| "5".to_string())
                .parse()
                .expect("Invalid WORD_LENGTH"),
            max_guesses: env::var("MAX_GUESSES")
                .unwrap_or_else(|_| "6".to_string())
                .parse()
                .expect("Invalid MAX_GUESSES"),
            max_players_per_room: env::var("MAX_PLAYERS_PER_ROOM")
                .unwrap_or_else(|_| "8".to_string())
                .parse()
                .expect("Invalid MAX_PLAYERS_PER_ROOM"),
            countdown_seconds: env::var("COUNTDOWN_SECONDS")
                .unwrap_or_else(|_| "3".to_string())
                .parse()
                .expect("Invalid COUNTDOWN_SECONDS"),
            grace_waiting_secs: env::var("GRACE_WAITING_SECONDS")
                .unwrap_or_else(|_| "120".to_string())
                .parse()
                .expect("Invalid GRACE_WAITING_SECONDS"),
            grace_playing_secs: env::var("GRACE_PLAYING_SECONDS")
                .unwrap_or_else(|_| "60".to_string())
                .parse()
                .expect("Invalid GRACE_PLAYING_SECONDS"),
            grace_countdown_secs: env::var("GRACE_COUNTDOWN_SECONDS")
                .unwrap_or_else(|_| "10".to_string())
                .parse()
                .expect("Invalid GRACE_COUNTDOWN_SECONDS"),
            competitive_time_limit_secs: env::var("COMPETITIVE_TIME_LIMIT_SECONDS")
                .unwrap_or_else(|_| "300".to_string())
                .parse()
                .expect("Invalid COMPETITIVE_TIME_LIMIT_SECONDS"),
            room_idle_timeout_minutes: env::var("ROOM_IDLE_TIMEOUT_MINUTES")
                .unwrap_or_else(|_| "30".to_string())
                .parse()
                .expect("Invalid ROOM_IDLE_TIMEOUT_MINUTES"),
            timer_tick_millis: env::var("TIMER_TICK_MILLIS")
                .unwrap_or_else(|_| "1000".to_string())
                .parse()
                .expect("Invalid TIMER_TICK_MILLIS"),
            cleanup_interval_secs: env::var("CLEANUP_INTERVAL_SECONDS")
                .unwrap_or_else(|_| "30".to_string())
                .parse()
                .expect("Invalid CLEANUP_INTERVAL_SECONDS"),
        }
    }

    /// Limits handed to every room at creation.
    pub fn room_config(&self) -> RoomConfig {
        RoomConfig {
            max_players: self.max_players_per_room,
            max_guesses: self.max_guesses,
            word_length: self.word_length,
            competitive_time_limit: Some(Duration::from_secs(self.competitive_time_limit_secs)),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::new()
    }
}
