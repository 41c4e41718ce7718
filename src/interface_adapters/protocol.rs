// Wire protocol DTOs and conversions for the public WebSocket messages.

use crate::domain::{Bomb, Coin, Enemy, Player, PlayerSummary, RoomEvent, RoomSnapshot};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Messages the server sends to connected clients over the WebSocket.
#[derive(Debug, Clone, Serialize)]
#[serde(
    tag = "type",
    content = "data",
    rename_all = "camelCase",
    rename_all_fields = "camelCase"
)]
pub enum ServerMessage {
    // First frame of every connection.
    Identity {
        player_id: String,
    },
    WaitingForOpponent,
    GameReady(SnapshotDto),
    PlayerJoined(PlayerSummaryDto),
    PlayerLeft {
        player_id: String,
    },
    GameStateUpdate(SnapshotDto),
    CoinCollected {
        player_id: String,
        coin_id: u64,
        score: u32,
    },
    BombHit {
        player_id: String,
        bomb_id: u64,
        score: u32,
    },
    BombExploded {
        bomb_id: u64,
        x: i32,
        y: i32,
    },
    PlayerHit {
        player_id: String,
        score: u32,
        x: i32,
        y: i32,
    },
    DifficultyIncrease {
        level: u32,
        enemy_count: usize,
    },
    GameWon {
        winner_id: String,
        winner_name: String,
        winner_score: u32,
    },
    JoinError {
        message: String,
    },
    // Answer to RequestStateRecovery.
    StateRecovery(StateRecoveryDto),
    Error {
        message: String,
    },
}

/// Messages the client sends to the server over the WebSocket.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "camelCase")]
pub enum ClientMessage {
    JoinGame(JoinGamePayload),
    Move(MovePayload),
    RequestStateRecovery,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinGamePayload {
    pub player_name: String,
}

/// Direction stays a plain string here; unknown values are dropped by the connection.
#[derive(Debug, Clone, Deserialize)]
pub struct MovePayload {
    pub direction: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerDto {
    pub id: String,
    pub name: String,
    pub x: i32,
    pub y: i32,
    pub direction: &'static str,
    pub mood: &'static str,
    pub score: u32,
    pub character: String,
    pub coins_collected: u32,
    pub bombs_hit: u32,
    pub enemy_hits: u32,
}

impl From<&Player> for PlayerDto {
    fn from(p: &Player) -> Self {
        Self {
            id: p.id.clone(),
            name: p.name.clone(),
            x: p.position.x,
            y: p.position.y,
            direction: p.facing.as_str(),
            mood: p.mood.as_str(),
            score: p.score,
            character: p.character.clone(),
            coins_collected: p.coins_collected,
            bombs_hit: p.bombs_hit,
            enemy_hits: p.enemy_hits,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct PlayerSummaryDto {
    pub id: String,
    pub name: String,
    pub character: String,
}

impl From<PlayerSummary> for PlayerSummaryDto {
    fn from(p: PlayerSummary) -> Self {
        Self {
            id: p.id,
            name: p.name,
            character: p.character,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CoinDto {
    pub id: u64,
    pub x: i32,
    pub y: i32,
    pub collected: bool,
}

impl From<&Coin> for CoinDto {
    fn from(c: &Coin) -> Self {
        Self {
            id: c.id,
            x: c.position.x,
            y: c.position.y,
            collected: c.collected,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct BombDto {
    pub id: u64,
    pub x: i32,
    pub y: i32,
    pub exploded: bool,
}

impl From<&Bomb> for BombDto {
    fn from(b: &Bomb) -> Self {
        Self {
            id: b.id,
            x: b.position.x,
            y: b.position.y,
            exploded: b.exploded,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct EnemyDto {
    pub id: u64,
    pub x: i32,
    pub y: i32,
    pub direction: &'static str,
}

impl From<&Enemy> for EnemyDto {
    fn from(e: &Enemy) -> Self {
        Self {
            id: e.id,
            x: e.position.x,
            y: e.position.y,
            direction: e.direction.as_str(),
        }
    }
}

/// Full room state as clients see it.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotDto {
    pub room_id: u64,
    // Ordered map so identical states serialize identically.
    pub players: BTreeMap<String, PlayerDto>,
    pub coins: Vec<CoinDto>,
    pub bombs: Vec<BombDto>,
    pub enemies: Vec<EnemyDto>,
    pub map_width: i32,
    pub map_height: i32,
    pub difficulty_level: u32,
    pub winning_score: u32,
}

impl From<&RoomSnapshot> for SnapshotDto {
    fn from(s: &RoomSnapshot) -> Self {
        Self {
            room_id: s.room_id,
            players: s
                .players
                .iter()
                .map(|(id, p)| (id.clone(), PlayerDto::from(p)))
                .collect(),
            coins: s.coins.iter().map(CoinDto::from).collect(),
            bombs: s.bombs.iter().map(BombDto::from).collect(),
            enemies: s.enemies.iter().map(EnemyDto::from).collect(),
            map_width: s.map_width,
            map_height: s.map_height,
            difficulty_level: s.difficulty_level,
            winning_score: s.winning_score,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StateRecoveryDto {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub player: Option<PlayerDto>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub game_state: Option<SnapshotDto>,
}

impl StateRecoveryDto {
    pub fn not_found() -> Self {
        Self {
            success: false,
            player: None,
            game_state: None,
        }
    }

    pub fn restored(player: &Player, snapshot: &RoomSnapshot) -> Self {
        Self {
            success: true,
            player: Some(player.into()),
            game_state: Some(snapshot.into()),
        }
    }
}

impl From<RoomEvent> for ServerMessage {
    fn from(event: RoomEvent) -> Self {
        match event {
            RoomEvent::WaitingForOpponent => ServerMessage::WaitingForOpponent,
            RoomEvent::GameReady(snapshot) => ServerMessage::GameReady((&snapshot).into()),
            RoomEvent::PlayerJoined(summary) => ServerMessage::PlayerJoined(summary.into()),
            RoomEvent::PlayerLeft { player_id } => ServerMessage::PlayerLeft { player_id },
            RoomEvent::GameStateUpdate(snapshot) => {
                ServerMessage::GameStateUpdate((&snapshot).into())
            }
            RoomEvent::CoinCollected {
                player_id,
                coin_id,
                score,
            } => ServerMessage::CoinCollected {
                player_id,
                coin_id,
                score,
            },
            RoomEvent::BombHit {
                player_id,
                bomb_id,
                score,
            } => ServerMessage::BombHit {
                player_id,
                bomb_id,
                score,
            },
            RoomEvent::BombExploded { bomb_id, position } => ServerMessage::BombExploded {
                bomb_id,
                x: position.x,
                y: position.y,
            },
            RoomEvent::PlayerHit {
                player_id,
                score,
                position,
            } => ServerMessage::PlayerHit {
                player_id,
                score,
                x: position.x,
                y: position.y,
            },
            RoomEvent::DifficultyIncrease { level, enemy_count } => {
                ServerMessage::DifficultyIncrease { level, enemy_count }
            }
            RoomEvent::GameWon {
                winner_id,
                winner_name,
                winner_score,
            } => ServerMessage::GameWon {
                winner_id,
                winner_name,
                winner_score,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Direction, Mood, Position};
    use serde_json::{Value, json};
    use std::collections::HashMap;

    fn to_value(msg: &ServerMessage) -> Value {
        serde_json::to_value(msg).expect("serialize")
    }

    fn player() -> Player {
        Player {
            id: "p1".to_string(),
            name: "Alice".to_string(),
            position: Position::new(2, 3),
            facing: Direction::Down,
            mood: Mood::Sad,
            score: 10,
            character: "bard".to_string(),
            coins_collected: 3,
            bombs_hit: 1,
            enemy_hits: 0,
        }
    }

    #[test]
    fn client_messages_parse_from_tagged_frames() {
        let join: ClientMessage =
            serde_json::from_str(r#"{"type":"joinGame","data":{"playerName":"Alice"}}"#).unwrap();
        assert!(matches!(join, ClientMessage::JoinGame(p) if p.player_name == "Alice"));

        let mv: ClientMessage =
            serde_json::from_str(r#"{"type":"move","data":{"direction":"left"}}"#).unwrap();
        assert!(matches!(mv, ClientMessage::Move(p) if p.direction == "left"));

        let recover: ClientMessage =
            serde_json::from_str(r#"{"type":"requestStateRecovery"}"#).unwrap();
        assert!(matches!(recover, ClientMessage::RequestStateRecovery));
    }

    #[test]
    fn unknown_client_message_type_is_an_error() {
        assert!(serde_json::from_str::<ClientMessage>(r#"{"type":"teleport","data":{}}"#).is_err());
        assert!(serde_json::from_str::<ClientMessage>(r#"{"type":"joinGame"}"#).is_err());
    }

    #[test]
    fn empty_events_carry_no_data() {
        assert_eq!(
            to_value(&ServerMessage::WaitingForOpponent),
            json!({"type": "waitingForOpponent"})
        );
    }

    #[test]
    fn event_fields_are_camel_case() {
        let msg = ServerMessage::from(RoomEvent::BombExploded {
            bomb_id: 4,
            position: Position::new(5, 6),
        });
        assert_eq!(
            to_value(&msg),
            json!({"type": "bombExploded", "data": {"bombId": 4, "x": 5, "y": 6}})
        );

        let msg = ServerMessage::Identity {
            player_id: "p1".to_string(),
        };
        assert_eq!(
            to_value(&msg),
            json!({"type": "identity", "data": {"playerId": "p1"}})
        );
    }

    #[test]
    fn snapshot_exposes_map_and_difficulty() {
        let snapshot = RoomSnapshot {
            room_id: 3,
            players: HashMap::from([("p1".to_string(), player())]),
            coins: vec![Coin {
                id: 1,
                position: Position::new(4, 4),
                collected: false,
            }],
            bombs: Vec::new(),
            enemies: Vec::new(),
            map_width: 20,
            map_height: 15,
            difficulty_level: 2,
            winning_score: 500,
        };
        let value = to_value(&ServerMessage::from(RoomEvent::GameStateUpdate(snapshot)));

        assert_eq!(value["type"], "gameStateUpdate");
        let data = &value["data"];
        assert_eq!(data["mapWidth"], 20);
        assert_eq!(data["mapHeight"], 15);
        assert_eq!(data["difficultyLevel"], 2);
        assert_eq!(data["winningScore"], 500);
        assert_eq!(data["players"]["p1"]["direction"], "down");
        assert_eq!(data["players"]["p1"]["mood"], "sad");
        assert_eq!(data["coins"][0], json!({"id": 1, "x": 4, "y": 4, "collected": false}));
    }

    #[test]
    fn failed_recovery_omits_state() {
        let msg = ServerMessage::StateRecovery(StateRecoveryDto::not_found());
        assert_eq!(
            to_value(&msg),
            json!({"type": "stateRecovery", "data": {"success": false}})
        );
    }
}
