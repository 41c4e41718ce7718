// Domain-level room entities and snapshot types.

use std::collections::HashMap;

/// Grid cell coordinate. The outer ring of the map is wall.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Position {
    pub x: i32,
    pub y: i32,
}

impl Position {
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    pub fn step(self, direction: Direction) -> Self {
        let (dx, dy) = direction.delta();
        Self {
            x: self.x + dx,
            y: self.y + dy,
        }
    }
}

/// Inclusive walkable area of a map.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Bounds {
    pub min_x: i32,
    pub max_x: i32,
    pub min_y: i32,
    pub max_y: i32,
}

impl Bounds {
    /// Interior of a `width` x `height` map whose outer ring is wall.
    pub fn interior(width: i32, height: i32) -> Self {
        Self {
            min_x: 1,
            max_x: width - 2,
            min_y: 1,
            max_y: height - 2,
        }
    }

    pub fn contains(&self, p: Position) -> bool {
        (self.min_x..=self.max_x).contains(&p.x) && (self.min_y..=self.max_y).contains(&p.y)
    }
}

/// Cardinal direction for player moves and enemy headings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Up,
    Right,
    Down,
    Left,
}

impl Direction {
    pub const ALL: [Direction; 4] = [
        Direction::Up,
        Direction::Right,
        Direction::Down,
        Direction::Left,
    ];

    /// Parses a wire direction; unknown values yield `None` and are ignored by callers.
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "up" => Some(Direction::Up),
            "down" => Some(Direction::Down),
            "left" => Some(Direction::Left),
            "right" => Some(Direction::Right),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Direction::Up => "up",
            Direction::Right => "right",
            Direction::Down => "down",
            Direction::Left => "left",
        }
    }

    /// Integer encoding used for enemies on the wire (0 = up, clockwise).
    pub fn index(self) -> u8 {
        match self {
            Direction::Up => 0,
            Direction::Right => 1,
            Direction::Down => 2,
            Direction::Left => 3,
        }
    }

    pub fn reversed(self) -> Self {
        match self {
            Direction::Up => Direction::Down,
            Direction::Right => Direction::Left,
            Direction::Down => Direction::Up,
            Direction::Left => Direction::Right,
        }
    }

    fn delta(self) -> (i32, i32) {
        // +Y points down the map.
        match self {
            Direction::Up => (0, -1),
            Direction::Right => (1, 0),
            Direction::Down => (0, 1),
            Direction::Left => (-1, 0),
        }
    }
}

/// Visual hint only; never read by the simulation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mood {
    Neutral,
    Happy,
    Sad,
}

impl Mood {
    pub fn as_str(self) -> &'static str {
        match self {
            Mood::Neutral => "neutral",
            Mood::Happy => "happy",
            Mood::Sad => "sad",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Player {
    pub id: String,
    pub name: String,
    pub position: Position,
    pub facing: Direction,
    pub mood: Mood,
    pub score: u32,
    pub character: String,

    // Per-player stats carried across reconnects.
    pub coins_collected: u32,
    pub bombs_hit: u32,
    pub enemy_hits: u32,
}

impl Player {
    /// Applies a penalty, clamping the score at zero.
    pub fn penalize(&mut self, amount: u32) {
        self.score = self.score.saturating_sub(amount);
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Coin {
    pub id: u64,
    pub position: Position,
    pub collected: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Bomb {
    pub id: u64,
    pub position: Position,
    pub exploded: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Enemy {
    pub id: u64,
    pub position: Position,
    pub direction: Direction,
    // Counts ticks; the enemy only steps on multiples of its move interval.
    pub move_counter: u32,
    pub difficulty_level: u32,
}

/// Compact public view of a player used for membership notifications.
#[derive(Debug, Clone, PartialEq)]
pub struct PlayerSummary {
    pub id: String,
    pub name: String,
    pub character: String,
}

impl From<&Player> for PlayerSummary {
    fn from(p: &Player) -> Self {
        Self {
            id: p.id.clone(),
            name: p.name.clone(),
            character: p.character.clone(),
        }
    }
}

/// Canonical full state of a room, sent on every tick and accepted move.
#[derive(Debug, Clone, PartialEq)]
pub struct RoomSnapshot {
    pub room_id: u64,
    pub players: HashMap<String, Player>,
    pub coins: Vec<Coin>,
    pub bombs: Vec<Bomb>,
    pub enemies: Vec<Enemy>,
    pub map_width: i32,
    pub map_height: i32,
    pub difficulty_level: u32,
    pub winning_score: u32,
}
