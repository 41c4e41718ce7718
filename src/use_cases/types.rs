// Use-case level inputs/outputs for the room loop.

use crate::domain::{Audience, Direction, Player, RoomBroadcast, RoomError, RoomSnapshot};
use axum::extract::ws::Utf8Bytes;
use tokio::sync::oneshot;

#[derive(Debug)]
pub enum RoomCommand {
    Join {
        player_id: String,
        name: String,
        reply: oneshot::Sender<Result<JoinedRoom, RoomError>>,
    },
    Move {
        player_id: String,
        direction: Direction,
    },
    Leave {
        player_id: String,
        reply: oneshot::Sender<Result<Player, RoomError>>,
    },
    Restore {
        player: Player,
        reply: oneshot::Sender<Result<RestoredPlayer, RoomError>>,
    },
}

/// Room status right after a successful join.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JoinedRoom {
    pub game_started: bool,
}

/// A player put back into its room, as placed, with the room state right after.
#[derive(Debug, Clone)]
pub struct RestoredPlayer {
    pub player: Player,
    pub snapshot: RoomSnapshot,
    pub game_started: bool,
}

/// Everything a room task publishes.
#[derive(Debug, Clone)]
pub enum RoomOutput {
    Broadcast(RoomBroadcast),
    // A fire-and-forget command (a move) could not be applied.
    CommandFailed { player_id: String, message: String },
}

/// A serialized room message and who should receive it.
#[derive(Debug, Clone)]
pub struct RoomFrame {
    pub audience: Audience,
    pub bytes: Utf8Bytes,
}
