use super::types::{JoinedRoom, RestoredPlayer, RoomCommand, RoomOutput};
use crate::domain::{Room, RoomBroadcast, RoomError};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Notify, broadcast, mpsc};
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

/// Owns one room. Commands and ticks are handled one at a time, in arrival order.
pub async fn room_task(
    mut room: Room,
    mut command_rx: mpsc::Receiver<RoomCommand>,
    room_tx: broadcast::Sender<RoomOutput>,
    tick_interval: Duration,
    shutdown: Arc<Notify>,
) {
    let room_id = room.id();
    info!(room_id, "room task started");

    // Drive the world step at the configured rate; a slow step skips ticks instead of bursting.
    let mut interval = tokio::time::interval(tick_interval);
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = shutdown.notified() => {
                // Exit cleanly when the room is removed from the registry.
                break;
            }
            _ = interval.tick() => {
                publish(&room_tx, room.tick());
            }
            command = command_rx.recv() => {
                let Some(command) = command else {
                    break;
                };
                handle_command(&mut room, command, &room_tx);
            }
        }
    }

    info!(room_id, players = room.player_count(), "room task stopped");
}

fn publish(room_tx: &broadcast::Sender<RoomOutput>, broadcasts: Vec<RoomBroadcast>) {
    for broadcast in broadcasts {
        // No receivers just means nobody is listening yet.
        let _ = room_tx.send(RoomOutput::Broadcast(broadcast));
    }
}

fn handle_command(
    room: &mut Room,
    command: RoomCommand,
    room_tx: &broadcast::Sender<RoomOutput>,
) {
    let room_id = room.id();
    match command {
        RoomCommand::Join {
            player_id,
            name,
            reply,
        } => {
            let result = room.join(&player_id, &name);
            let outcome = match result {
                Ok(broadcasts) => {
                    info!(room_id, player_id = %player_id, players = room.player_count(), "player joined");
                    publish(room_tx, broadcasts);
                    Ok(JoinedRoom {
                        game_started: room.game_started(),
                    })
                }
                Err(err) => {
                    debug!(room_id, player_id = %player_id, error = %err, "join rejected");
                    Err(err)
                }
            };
            let _ = reply.send(outcome);
        }
        RoomCommand::Move {
            player_id,
            direction,
        } => match room.apply_move(&player_id, direction) {
            Ok(broadcasts) => publish(room_tx, broadcasts),
            Err(err) => {
                warn!(room_id, player_id = %player_id, error = %err, "move failed");
                let _ = room_tx.send(RoomOutput::CommandFailed {
                    player_id,
                    message: err.to_string(),
                });
            }
        },
        RoomCommand::Leave { player_id, reply } => {
            let outcome = match room.leave(&player_id) {
                Ok((player, broadcasts)) => {
                    info!(room_id, player_id = %player_id, players = room.player_count(), "player left");
                    publish(room_tx, broadcasts);
                    Ok(player)
                }
                Err(err) => Err(err),
            };
            let _ = reply.send(outcome);
        }
        RoomCommand::Restore { player, reply } => {
            let player_id = player.id.clone();
            let outcome = match room.restore(player) {
                Ok(broadcasts) => {
                    info!(room_id, player_id = %player_id, "player restored");
                    publish(room_tx, broadcasts);
                    room.player(&player_id)
                        .cloned()
                        .map(|player| RestoredPlayer {
                            player,
                            snapshot: room.snapshot(),
                            game_started: room.game_started(),
                        })
                        .ok_or(RoomError::UnknownPlayer)
                }
                Err(err) => {
                    debug!(room_id, player_id = %player_id, error = %err, "restore rejected");
                    Err(err)
                }
            };
            let _ = reply.send(outcome);
        }
    }
}
