use serde::{Deserialize, Serialize};
use ts_rs::TS;

/// Terminal reasons a rejoin attempt can fail. The client must stop retrying
/// and return to a neutral state on any of these.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub enum RejoinFailure {
    RoomNotFound,
    PlayerNotFound,
}
