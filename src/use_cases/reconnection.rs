// Time-bounded store of disconnected players, keyed by player id.

use crate::domain::Player;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::task::AbortHandle;
use tokio::time::Instant;
use tracing::{debug, info};

/// The last known state of a player that dropped out of a room.
#[derive(Debug, Clone)]
pub struct DisconnectedPlayer {
    pub player_id: String,
    pub player: Player,
    pub room_id: u64,
    pub disconnected_at: Instant,
}

impl DisconnectedPlayer {
    pub fn is_expired(&self, window: Duration, now: Instant) -> bool {
        now.saturating_duration_since(self.disconnected_at) > window
    }
}

#[derive(Debug)]
struct PendingRecord {
    record: DisconnectedPlayer,
    generation: u64,
    expiry: AbortHandle,
}

#[derive(Debug, Default)]
struct Records {
    by_player: HashMap<String, PendingRecord>,
    // Ids a live connection has resumed. At most one connection holds each.
    claimed: HashSet<String>,
    next_generation: u64,
}

/// Holds disconnected players for a fixed window. Each record expires on its own timer;
/// reads also check the timestamp so a late timer never hands out stale state.
#[derive(Debug, Clone)]
pub struct ReconnectionManager {
    window: Duration,
    records: Arc<Mutex<Records>>,
}

impl ReconnectionManager {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            records: Arc::new(Mutex::new(Records::default())),
        }
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// Saves a player's state and schedules its removal after the window.
    /// Replaces any record already held for the same player.
    pub fn store(&self, player: Player, room_id: u64) {
        let player_id = player.id.clone();
        let mut records = self.lock();
        let generation = records.next_generation;
        records.next_generation += 1;

        let expiry = {
            let records = Arc::clone(&self.records);
            let player_id = player_id.clone();
            let window = self.window;
            tokio::spawn(async move {
                tokio::time::sleep(window).await;
                let mut records = records.lock().unwrap_or_else(PoisonError::into_inner);
                // A newer record for the same player has its own timer.
                if records
                    .by_player
                    .get(&player_id)
                    .is_some_and(|pending| pending.generation == generation)
                {
                    records.by_player.remove(&player_id);
                    info!(player_id = %player_id, "reconnection window expired");
                }
            })
            .abort_handle()
        };

        let record = DisconnectedPlayer {
            player_id: player_id.clone(),
            player,
            room_id,
            disconnected_at: Instant::now(),
        };
        if let Some(previous) = records.by_player.insert(
            player_id.clone(),
            PendingRecord {
                record,
                generation,
                expiry,
            },
        ) {
            previous.expiry.abort();
        }
        debug!(player_id = %player_id, room_id, "reconnection record stored");
    }

    /// Takes the record for a player if it is still inside the window.
    /// The record is consumed either way.
    pub fn retrieve(&self, player_id: &str) -> Option<DisconnectedPlayer> {
        let pending = self.lock().by_player.remove(player_id)?;
        pending.expiry.abort();

        if pending.record.is_expired(self.window, Instant::now()) {
            info!(player_id = %player_id, "stale reconnection record discarded");
            return None;
        }
        Some(pending.record)
    }

    /// True if a fresh record exists. Does not consume it.
    pub fn contains(&self, player_id: &str) -> bool {
        let now = Instant::now();
        self.lock()
            .by_player
            .get(player_id)
            .is_some_and(|pending| !pending.record.is_expired(self.window, now))
    }

    /// Reserves a pending identity for one connection. Fails if no fresh record exists or
    /// another connection already holds the id.
    pub fn claim(&self, player_id: &str) -> bool {
        let now = Instant::now();
        let mut records = self.lock();
        let fresh = records
            .by_player
            .get(player_id)
            .is_some_and(|pending| !pending.record.is_expired(self.window, now));
        fresh && records.claimed.insert(player_id.to_string())
    }

    pub fn release_claim(&self, player_id: &str) {
        self.lock().claimed.remove(player_id);
    }

    /// Drops a record early and cancels its timer.
    pub fn clear(&self, player_id: &str) -> bool {
        match self.lock().by_player.remove(player_id) {
            Some(pending) => {
                pending.expiry.abort();
                true
            }
            None => false,
        }
    }

    pub fn pending(&self) -> usize {
        self.lock().by_player.len()
    }

    fn lock(&self) -> MutexGuard<'_, Records> {
        // Records stay consistent across a panic: every mutation is a single map call.
        self.records.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
