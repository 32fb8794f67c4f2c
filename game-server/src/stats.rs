use async_trait::async_trait;
use game_types::PlayerResult;
use tracing::info;

/// External persistence collaborator for finished games. Write-only except
/// for the daily-completion lookup the lobby filter needs. Guests (no email)
/// have nothing to persist.
#[async_trait]
pub trait StatsSink: Send + Sync {
    async fn record_game(
        &self,
        room_code: &str,
        day_index: Option<u32>,
        results: &[(PlayerResult, Option<String>)],
    );

    async fn has_completed_daily(&self, email: &str, day_index: u32) -> bool;
}

/// Default sink: logs and forgets. Stats storage lives outside this service.
pub struct NullStatsSink;

#[async_trait]
impl StatsSink for NullStatsSink {
    async fn record_game(
        &self,
        room_code: &str,
        day_index: Option<u32>,
        results: &[(PlayerResult, Option<String>)],
    ) {
        let identified = results.iter().filter(|(_, email)| email.is_some()).count();
        info!(
            room = room_code,
            ?day_index,
            players = results.len(),
            identified,
            "game finished; no stats sink configured"
        );
    }

    async fn has_completed_daily(&self, _email: &str, _day_index: u32) -> bool {
        false
    }
}
