pub mod evaluation;
pub mod room;
pub mod words;

pub use evaluation::{competitive_score, evaluate_guess, rank_results};
pub use room::{GuessOutcome, RemovalOutcome, Room, RoomConfig, RoomError};
pub use words::WordList;
