// Network adapter modules split by the game socket and the read-only health route.

pub mod client;
pub mod health;

pub use client::{spawn_room_serializer, ws_handler};
pub use health::health_handler;
