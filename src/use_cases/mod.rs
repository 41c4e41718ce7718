// Use cases layer: room actors, the room registry and reconnection bookkeeping.

pub mod game;
pub mod reconnection;
pub mod registry;
pub mod types;

pub use reconnection::{DisconnectedPlayer, ReconnectionManager};
pub use registry::{RegistryStats, RoomHandle, RoomRegistry, RoomSettings, SeatReservation};
pub use types::{JoinedRoom, RestoredPlayer, RoomCommand, RoomFrame, RoomOutput};
