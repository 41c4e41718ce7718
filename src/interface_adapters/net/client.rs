use crate::domain::validation::validate_player_name;
use crate::domain::{Audience, Direction, RoomBroadcast, RoomError};
use crate::interface_adapters::protocol::{ClientMessage, ServerMessage, StateRecoveryDto};
use crate::interface_adapters::state::AppState;
use crate::interface_adapters::utils::rng::{new_player_id, next_conn_id};
use crate::use_cases::{RestoredPlayer, RoomCommand, RoomFrame, RoomHandle, RoomOutput};

use axum::{
    extract::{
        Query, State,
        ws::{CloseFrame, Message, Utf8Bytes, WebSocket, WebSocketUpgrade, close_code},
    },
    response::IntoResponse,
};
use futures_util::SinkExt;
use std::{
    fmt,
    sync::Arc,
    time::{Duration, Instant},
};
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{broadcast, oneshot, watch};
use tracing::{Instrument, debug, error, info, info_span, warn};

#[derive(Debug)]
enum NetError {
    // Categorizes connection failures that end the session.
    #[allow(dead_code)]
    Ws(axum::Error),
    #[allow(dead_code)]
    Serialization(serde_json::Error),
}

impl From<axum::Error> for NetError {
    fn from(e: axum::Error) -> Self {
        NetError::Ws(e)
    }
}

/// Why a request to a room task produced no result.
#[derive(Debug)]
enum CommandError {
    Rejected(RoomError),
    RoomUnavailable,
}

impl fmt::Display for CommandError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CommandError::Rejected(e) => e.fmt(f),
            CommandError::RoomUnavailable => write!(f, "room unavailable"),
        }
    }
}

#[derive(Debug, serde::Deserialize)]
pub struct SessionQuery {
    // Identity to resume; honored only while a reconnection record exists for it.
    #[serde(default)]
    player_id: Option<String>,
}

pub async fn room_serializer(
    mut room_rx: broadcast::Receiver<RoomOutput>,
    frames_tx: broadcast::Sender<RoomFrame>,
    latest_tx: watch::Sender<Utf8Bytes>,
) {
    // Serialize each room event once and broadcast the shared bytes with their audience.
    loop {
        match room_rx.recv().await {
            Ok(output) => {
                let (audience, msg) = match output {
                    RoomOutput::Broadcast(RoomBroadcast { audience, event }) => {
                        (audience, ServerMessage::from(event))
                    }
                    RoomOutput::CommandFailed { player_id, message } => {
                        (Audience::Only(player_id), ServerMessage::Error { message })
                    }
                };
                let is_state_update = matches!(msg, ServerMessage::GameStateUpdate(_));
                let txt = match serde_json::to_string(&msg) {
                    Ok(txt) => txt,
                    Err(e) => {
                        error!(error = ?e, "failed to serialize room event");
                        continue;
                    }
                };

                let bytes = Utf8Bytes::from(txt);
                if is_state_update {
                    // Store the latest snapshot for lag recovery, even with no subscribers yet.
                    latest_tx.send_replace(bytes.clone());
                }
                let _ = frames_tx.send(RoomFrame { audience, bytes });
            }
            Err(broadcast::error::RecvError::Lagged(n)) => {
                warn!(missed = n, "room serializer lagged; skipping to latest event");
            }
            Err(broadcast::error::RecvError::Closed) => {
                debug!("room events closed; serializer exiting");
                break;
            }
        }
    }
}

pub fn spawn_room_serializer(room: &RoomHandle, room_rx: broadcast::Receiver<RoomOutput>) {
    tokio::spawn(room_serializer(
        room_rx,
        room.frames_tx.clone(),
        room.latest_tx.clone(),
    ));
}

pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
    Query(query): Query<SessionQuery>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| {
        let conn_id = next_conn_id();
        // A resumed id must belong to a disconnected player that no other live connection
        // has claimed; anything else gets a fresh identity.
        let (player_id, resumed) = match query.player_id {
            Some(id) if state.reconnections.claim(&id) => (id, true),
            _ => (new_player_id(), false),
        };
        let span = info_span!("conn", conn_id, player_id = %player_id, resumed);
        handle_socket(socket, state, player_id, resumed).instrument(span)
    })
}

async fn handle_socket(
    mut socket: WebSocket,
    state: Arc<AppState>,
    player_id: String,
    resumed: bool,
) {
    info!("client connected");
    let mut session = Session::new(player_id);

    if let Err(e) = run_session(&mut socket, &mut session, &state).await {
        warn!(error = ?e, "session exited with error");
    }

    session.leave_room(&state).await;
    if resumed {
        // After leave_room, so the next resume sees the latest record.
        state.reconnections.release_claim(&session.player_id);
    }
    session.log_stats();
    info!("client disconnected");
}

const LOG_THROTTLE: Duration = Duration::from_secs(2);
const MAX_INVALID_JSON: u32 = 10;

enum LoopControl {
    Continue,
    Disconnect,
}

enum Inbound {
    Socket(Option<Result<Message, axum::Error>>),
    Frame(Result<RoomFrame, broadcast::error::RecvError>),
    RoomClosed,
}

/// Receivers for the room a connection is seated in.
struct Seat {
    room: RoomHandle,
    frames_rx: broadcast::Receiver<RoomFrame>,
    latest_rx: watch::Receiver<Utf8Bytes>,
}

impl Seat {
    // Subscribe before the join or restore command is sent so its replies are not missed.
    fn subscribe(room: RoomHandle) -> Self {
        let frames_rx = room.frames_tx.subscribe();
        let latest_rx = room.latest_tx.subscribe();
        Self {
            room,
            frames_rx,
            latest_rx,
        }
    }
}

struct Session {
    player_id: String,
    seat: Option<Seat>,

    msgs_in: u64,
    msgs_out: u64,
    bytes_in: u64,
    bytes_out: u64,
    invalid_json: u32,
    // Count lag recovery snapshots sent to this client.
    lag_recovery_count: u64,

    last_command_full_log: Instant,
    last_frame_lag_log: Instant,
    last_invalid_input_log: Instant,

    close_frame: Option<CloseFrame>,
}

fn should_log(last: &mut Instant) -> bool {
    if last.elapsed() >= LOG_THROTTLE {
        *last = Instant::now();
        true
    } else {
        false
    }
}

async fn request<T>(
    room: &RoomHandle,
    command: RoomCommand,
    reply_rx: oneshot::Receiver<Result<T, RoomError>>,
) -> Result<T, CommandError> {
    room.command_tx
        .send(command)
        .await
        .map_err(|_| CommandError::RoomUnavailable)?;
    reply_rx
        .await
        .map_err(|_| CommandError::RoomUnavailable)?
        .map_err(CommandError::Rejected)
}

async fn run_session(
    socket: &mut WebSocket,
    session: &mut Session,
    state: &AppState,
) -> Result<(), NetError> {
    // Tell the client "This is who you are" before anything else.
    let identity = ServerMessage::Identity {
        player_id: session.player_id.clone(),
    };
    session.send(socket, &identity).await?;

    loop {
        let inbound = match session.seat.as_mut() {
            None => Inbound::Socket(socket.recv().await),
            Some(seat) => tokio::select! {
                incoming = socket.recv() => Inbound::Socket(incoming),
                frame = seat.frames_rx.recv() => Inbound::Frame(frame),
                _ = seat.room.command_tx.closed() => Inbound::RoomClosed,
            },
        };

        let control = match inbound {
            Inbound::Socket(incoming) => session.handle_incoming(socket, incoming, state).await?,
            Inbound::Frame(frame) => session.forward_frame(socket, frame).await?,
            Inbound::RoomClosed => {
                info!("room closed; disconnecting");
                session.close_frame = Some(CloseFrame {
                    code: close_code::AWAY,
                    reason: "room closed".into(),
                });
                LoopControl::Disconnect
            }
        };

        if let LoopControl::Disconnect = control {
            if let Some(frame) = session.close_frame.take() {
                let _ = socket.send(Message::Close(Some(frame))).await;
            }
            if let Err(err) = socket.close().await {
                debug!(error = ?err, "socket close error");
            }
            return Ok(());
        }
    }
}

impl Session {
    fn new(player_id: String) -> Self {
        let now = Instant::now()
            .checked_sub(LOG_THROTTLE)
            .unwrap_or_else(Instant::now);
        Self {
            player_id,
            seat: None,
            msgs_in: 0,
            msgs_out: 0,
            bytes_in: 0,
            bytes_out: 0,
            invalid_json: 0,
            lag_recovery_count: 0,
            last_command_full_log: now,
            last_frame_lag_log: now,
            last_invalid_input_log: now,
            close_frame: None,
        }
    }

    async fn send(&mut self, socket: &mut WebSocket, msg: &ServerMessage) -> Result<(), NetError> {
        let txt = serde_json::to_string(msg).map_err(NetError::Serialization)?;
        self.send_bytes(socket, Utf8Bytes::from(txt)).await
    }

    async fn send_bytes(&mut self, socket: &mut WebSocket, bytes: Utf8Bytes) -> Result<(), NetError> {
        let len = bytes.len();
        socket.send(Message::Text(bytes)).await?;
        self.msgs_out += 1;
        self.bytes_out += len as u64;
        Ok(())
    }

    async fn handle_incoming(
        &mut self,
        socket: &mut WebSocket,
        incoming: Option<Result<Message, axum::Error>>,
        state: &AppState,
    ) -> Result<LoopControl, NetError> {
        match incoming {
            Some(Ok(msg)) => match msg {
                Message::Text(text) => {
                    self.msgs_in += 1;
                    self.bytes_in += text.len() as u64;

                    match serde_json::from_str::<ClientMessage>(&text) {
                        Ok(ClientMessage::JoinGame(payload)) => {
                            self.join_game(socket, state, payload.player_name).await
                        }
                        Ok(ClientMessage::Move(payload)) => {
                            self.submit_move(socket, &payload.direction).await
                        }
                        Ok(ClientMessage::RequestStateRecovery) => {
                            self.recover_state(socket, state).await
                        }
                        Err(parse_err) => {
                            self.invalid_json += 1;
                            if should_log(&mut self.last_invalid_input_log) {
                                warn!(
                                    bytes = text.len(),
                                    error = %parse_err,
                                    "failed to parse client message"
                                );
                            }

                            if self.invalid_json > MAX_INVALID_JSON {
                                self.close_frame = Some(CloseFrame {
                                    code: close_code::POLICY,
                                    reason: "too many invalid messages".into(),
                                });
                                return Ok(LoopControl::Disconnect);
                            }

                            Ok(LoopControl::Continue)
                        }
                    }
                }
                Message::Binary(_) => {
                    self.close_frame = Some(CloseFrame {
                        code: close_code::UNSUPPORTED,
                        reason: "binary messages not supported".into(),
                    });
                    Ok(LoopControl::Disconnect)
                }
                Message::Ping(_) | Message::Pong(_) => Ok(LoopControl::Continue),
                Message::Close(_) => Ok(LoopControl::Disconnect),
            },
            Some(Err(e)) => {
                warn!(error = %e, "websocket recv error");
                Ok(LoopControl::Disconnect)
            }
            None => {
                info!("websocket closed");
                Ok(LoopControl::Disconnect)
            }
        }
    }

    async fn join_game(
        &mut self,
        socket: &mut WebSocket,
        state: &AppState,
        name: String,
    ) -> Result<LoopControl, NetError> {
        if self.seat.is_some() {
            let msg = ServerMessage::JoinError {
                message: RoomError::AlreadyInRoom.to_string(),
            };
            self.send(socket, &msg).await?;
            return Ok(LoopControl::Continue);
        }

        // Reject bad names before a seat is taken for them.
        if let Err(err) = validate_player_name(&name) {
            debug!(error = %err, "join rejected");
            let msg = ServerMessage::JoinError {
                message: err.to_string(),
            };
            self.send(socket, &msg).await?;
            return Ok(LoopControl::Continue);
        }

        let reservation = state.registry.find_or_create_room().await;
        if let Some(room_rx) = reservation.new_room_rx {
            spawn_room_serializer(&reservation.room, room_rx);
        }
        let seat = Seat::subscribe(reservation.room);
        let room_id = seat.room.room_id;

        let (reply, reply_rx) = oneshot::channel();
        let command = RoomCommand::Join {
            player_id: self.player_id.clone(),
            name,
            reply,
        };
        match request(&seat.room, command, reply_rx).await {
            Ok(joined) => {
                info!(room_id, game_started = joined.game_started, "joined room");
                if joined.game_started {
                    state.registry.mark_started(room_id).await;
                }
                // A fresh join supersedes any earlier session for this identity.
                state.reconnections.clear(&self.player_id);
                self.seat = Some(seat);
                Ok(LoopControl::Continue)
            }
            Err(err) => {
                state.registry.release_seat(room_id).await;
                warn!(room_id, error = %err, "join failed");
                let message = err.to_string();
                let msg = match err {
                    CommandError::Rejected(RoomError::Validation(_)) => {
                        ServerMessage::JoinError { message }
                    }
                    _ => ServerMessage::Error { message },
                };
                self.send(socket, &msg).await?;
                Ok(LoopControl::Continue)
            }
        }
    }

    async fn submit_move(
        &mut self,
        socket: &mut WebSocket,
        direction: &str,
    ) -> Result<LoopControl, NetError> {
        let Some(seat) = self.seat.as_ref() else {
            if should_log(&mut self.last_invalid_input_log) {
                debug!("move before joining a room ignored");
            }
            return Ok(LoopControl::Continue);
        };
        // Unknown directions are dropped without a reply.
        let Some(direction) = Direction::parse(direction) else {
            return Ok(LoopControl::Continue);
        };

        let command = RoomCommand::Move {
            player_id: self.player_id.clone(),
            direction,
        };
        match seat.room.command_tx.try_send(command) {
            Ok(()) => Ok(LoopControl::Continue),
            Err(TrySendError::Full(_cmd)) => {
                if should_log(&mut self.last_command_full_log) {
                    warn!("room command channel full; dropping move");
                }
                Ok(LoopControl::Continue)
            }
            Err(TrySendError::Closed(_cmd)) => {
                let msg = ServerMessage::Error {
                    message: CommandError::RoomUnavailable.to_string(),
                };
                self.send(socket, &msg).await?;
                self.close_frame = Some(CloseFrame {
                    code: close_code::AWAY,
                    reason: "room closed".into(),
                });
                Ok(LoopControl::Disconnect)
            }
        }
    }

    async fn recover_state(
        &mut self,
        socket: &mut WebSocket,
        state: &AppState,
    ) -> Result<LoopControl, NetError> {
        let recovered = if self.seat.is_some() {
            None
        } else {
            self.restore_into_room(state).await
        };

        let dto = match &recovered {
            Some(restored) => StateRecoveryDto::restored(&restored.player, &restored.snapshot),
            None => StateRecoveryDto::not_found(),
        };
        self.send(socket, &ServerMessage::StateRecovery(dto)).await?;
        Ok(LoopControl::Continue)
    }

    async fn restore_into_room(&mut self, state: &AppState) -> Option<RestoredPlayer> {
        let Some(record) = state.reconnections.retrieve(&self.player_id) else {
            info!("no reconnection record to recover");
            return None;
        };

        let room_id = record.room_id;
        let Some(room) = state.registry.reserve_seat(room_id).await else {
            info!(room_id, "original room unavailable for recovery");
            return None;
        };
        let seat = Seat::subscribe(room);

        let (reply, reply_rx) = oneshot::channel();
        let command = RoomCommand::Restore {
            player: record.player,
            reply,
        };
        match request(&seat.room, command, reply_rx).await {
            Ok(restored) => {
                info!(room_id, score = restored.player.score, "player state recovered");
                if restored.game_started {
                    state.registry.mark_started(room_id).await;
                }
                self.seat = Some(seat);
                Some(restored)
            }
            Err(err) => {
                warn!(room_id, error = %err, "state recovery failed");
                state.registry.release_seat(room_id).await;
                None
            }
        }
    }

    async fn forward_frame(
        &mut self,
        socket: &mut WebSocket,
        frame: Result<RoomFrame, broadcast::error::RecvError>,
    ) -> Result<LoopControl, NetError> {
        match frame {
            Ok(frame) => {
                if frame.audience.includes(&self.player_id) {
                    self.send_bytes(socket, frame.bytes).await?;
                }
                Ok(LoopControl::Continue)
            }
            Err(broadcast::error::RecvError::Lagged(n)) => {
                if should_log(&mut self.last_frame_lag_log) {
                    warn!(missed = n, "room frames lagged; sending snapshot");
                }

                // Resync strategy: send the latest room snapshot.
                let latest = match &self.seat {
                    Some(seat) => seat.latest_rx.borrow().clone(),
                    None => return Ok(LoopControl::Continue),
                };
                if latest.is_empty() {
                    return Ok(LoopControl::Continue);
                }

                self.lag_recovery_count += 1;
                self.send_bytes(socket, latest).await?;
                Ok(LoopControl::Continue)
            }
            Err(broadcast::error::RecvError::Closed) => {
                warn!("room frames closed; disconnecting");
                Ok(LoopControl::Disconnect)
            }
        }
    }

    /// Takes the player out of its room and keeps its state for the reconnection window.
    async fn leave_room(&mut self, state: &AppState) {
        let Some(seat) = self.seat.take() else {
            return;
        };
        let room_id = seat.room.room_id;

        let (reply, reply_rx) = oneshot::channel();
        let command = RoomCommand::Leave {
            player_id: self.player_id.clone(),
            reply,
        };
        match request(&seat.room, command, reply_rx).await {
            Ok(player) => state.reconnections.store(player, room_id),
            Err(err) => debug!(room_id, error = %err, "leave not applied"),
        }

        let room_removed = state.registry.release_seat(room_id).await;
        info!(room_id, room_removed, "left room");
    }

    fn log_stats(&self) {
        debug!(
            msgs_in = self.msgs_in,
            msgs_out = self.msgs_out,
            bytes_in = self.bytes_in,
            bytes_out = self.bytes_out,
            invalid_json = self.invalid_json,
            lag_recovery_count = self.lag_recovery_count,
            "connection stats"
        );
    }
}
