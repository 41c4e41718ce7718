// Session registry: owns the set of live rooms and hands out seats in them.

use crate::domain::{Room, RoomTuning};
use crate::use_cases::game::room_task;
use crate::use_cases::types::{RoomCommand, RoomFrame, RoomOutput};
use axum::extract::ws::Utf8Bytes;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, Notify, broadcast, mpsc, watch};
use tracing::info;

/// Shared configuration for spawning rooms.
#[derive(Debug, Clone)]
pub struct RoomSettings {
    /// Capacity for inbound player commands per room.
    pub command_channel_capacity: usize,
    /// Capacity for broadcast room events and frames.
    pub broadcast_capacity: usize,
    /// Fixed tick interval for the world step.
    pub tick_interval: Duration,
    /// Gameplay tuning applied to every new room.
    pub tuning: RoomTuning,
}

/// Per-room channels. Cheap to clone; every connection in the room holds one.
/// Raw room events are not reachable from here: the room task owns the only sender, so
/// the serializer stops once the room does.
#[derive(Clone, Debug)]
pub struct RoomHandle {
    /// Identifier assigned by the registry (monotonic).
    pub room_id: u64,
    /// Sender for commands into the room task.
    pub command_tx: mpsc::Sender<RoomCommand>,
    /// Broadcast sender for serialized room frames.
    pub frames_tx: broadcast::Sender<RoomFrame>,
    /// Watch sender holding the latest serialized snapshot.
    pub latest_tx: watch::Sender<Utf8Bytes>,
    /// Stops the room task.
    shutdown: Arc<Notify>,
}

/// A seat taken in a room.
pub struct SeatReservation {
    pub room: RoomHandle,
    /// Set when the room was created for this reservation. The receiver was subscribed
    /// before the room could process anything, so the serializer misses no event.
    pub new_room_rx: Option<broadcast::Receiver<RoomOutput>>,
}

/// Read-only counters for health reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegistryStats {
    pub active_rooms: usize,
    pub waiting_rooms: usize,
    pub seated_players: usize,
}

#[derive(Debug)]
struct RoomEntry {
    handle: RoomHandle,
    // Seats are counted here so placement decisions never wait on a room task.
    seats: usize,
    // Set only once the room task reports it started; a full set of reservations is not enough.
    started: bool,
}

#[derive(Debug, Default)]
struct RegistryState {
    rooms: BTreeMap<u64, RoomEntry>,
    next_room_id: u64,
}

/// Thread-safe registry for active rooms.
#[derive(Debug)]
pub struct RoomRegistry {
    /// Settings applied to newly created rooms.
    settings: RoomSettings,
    /// Rooms by id plus the id counter, behind one lock.
    state: Mutex<RegistryState>,
}

impl RoomRegistry {
    /// Creates an empty registry with the provided settings.
    pub fn new(settings: RoomSettings) -> Self {
        Self {
            settings,
            state: Mutex::new(RegistryState {
                rooms: BTreeMap::new(),
                next_room_id: 1,
            }),
        }
    }

    pub fn max_players(&self) -> usize {
        self.settings.tuning.max_players
    }

    /// Takes a seat in the oldest room that has not started and has space, or in a new room.
    pub async fn find_or_create_room(&self) -> SeatReservation {
        let mut state = self.state.lock().await;
        let max_players = self.max_players();

        if let Some(entry) = state
            .rooms
            .values_mut()
            .find(|entry| !entry.started && entry.seats < max_players)
        {
            entry.seats += 1;
            return SeatReservation {
                room: entry.handle.clone(),
                new_room_rx: None,
            };
        }

        let room_id = state.next_room_id;
        state.next_room_id += 1;
        let (handle, room_rx) = self.spawn_room(room_id);
        let entry = RoomEntry {
            handle: handle.clone(),
            seats: 1,
            started: false,
        };
        state.rooms.insert(room_id, entry);
        info!(room_id, "room created");

        SeatReservation {
            room: handle,
            new_room_rx: Some(room_rx),
        }
    }

    /// Takes a seat in a specific room, if it still exists and has space.
    pub async fn reserve_seat(&self, room_id: u64) -> Option<RoomHandle> {
        let mut state = self.state.lock().await;
        let max_players = self.max_players();
        let entry = state.rooms.get_mut(&room_id)?;
        if entry.seats >= max_players {
            return None;
        }
        entry.seats += 1;
        Some(entry.handle.clone())
    }

    /// Records that a room has started. Started rooms take no new joiners.
    pub async fn mark_started(&self, room_id: u64) {
        let mut state = self.state.lock().await;
        if let Some(entry) = state.rooms.get_mut(&room_id) {
            entry.started = true;
        }
    }

    /// Gives a seat back. Tears the room down when it was the last one.
    /// Returns true if the room was removed.
    pub async fn release_seat(&self, room_id: u64) -> bool {
        let mut state = self.state.lock().await;
        let Some(entry) = state.rooms.get_mut(&room_id) else {
            return false;
        };

        entry.seats = entry.seats.saturating_sub(1);
        if entry.seats > 0 {
            return false;
        }

        if let Some(entry) = state.rooms.remove(&room_id) {
            entry.handle.shutdown.notify_one();
            info!(room_id, "room removed");
        }
        true
    }

    /// Returns a room handle for the provided id, if it exists.
    pub async fn get_room(&self, room_id: u64) -> Option<RoomHandle> {
        let state = self.state.lock().await;
        state.rooms.get(&room_id).map(|entry| entry.handle.clone())
    }

    pub async fn stats(&self) -> RegistryStats {
        let state = self.state.lock().await;
        RegistryStats {
            active_rooms: state.rooms.len(),
            waiting_rooms: state.rooms.values().filter(|e| !e.started).count(),
            seated_players: state.rooms.values().map(|e| e.seats).sum(),
        }
    }

    /// Stops every room task and empties the registry. Used on shutdown.
    pub async fn drain(&self) -> usize {
        let mut state = self.state.lock().await;
        let rooms = std::mem::take(&mut state.rooms);
        for entry in rooms.values() {
            entry.handle.shutdown.notify_one();
        }
        info!(rooms = rooms.len(), "registry drained");
        rooms.len()
    }

    fn spawn_room(&self, room_id: u64) -> (RoomHandle, broadcast::Receiver<RoomOutput>) {
        // Channel wiring for the room task.
        let (command_tx, command_rx) =
            mpsc::channel::<RoomCommand>(self.settings.command_channel_capacity);
        let (room_tx, room_rx) =
            broadcast::channel::<RoomOutput>(self.settings.broadcast_capacity);
        let (frames_tx, _frames_rx) =
            broadcast::channel::<RoomFrame>(self.settings.broadcast_capacity);
        let (latest_tx, _latest_rx) = watch::channel::<Utf8Bytes>(Utf8Bytes::from(""));
        let shutdown = Arc::new(Notify::new());

        // Spawn the authoritative loop for this room.
        let room = Room::new(room_id, self.settings.tuning.clone());
        tokio::spawn(room_task(
            room,
            command_rx,
            room_tx,
            self.settings.tick_interval,
            shutdown.clone(),
        ));

        let handle = RoomHandle {
            room_id,
            command_tx,
            frames_tx,
            latest_tx,
            shutdown,
        };
        (handle, room_rx)
    }
}
