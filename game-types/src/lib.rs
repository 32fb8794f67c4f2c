pub mod errors;
pub mod messages;
pub mod player;
pub mod room;

pub use errors::*;
pub use messages::*;
pub use player::*;
pub use room::*;

pub type PlayerId = uuid::Uuid;
