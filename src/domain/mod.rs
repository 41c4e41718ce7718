// Domain layer: core room simulation types and rules.

pub mod errors;
pub mod room;
pub mod state;
pub mod systems;
pub mod tuning;
pub mod validation;

pub use errors::{RoomError, ValidationError};
pub use room::{Audience, Room, RoomBroadcast, RoomEvent};
pub use state::{
    Bomb, Bounds, Coin, Direction, Enemy, Mood, Player, PlayerSummary, Position, RoomSnapshot,
};
pub use tuning::RoomTuning;
