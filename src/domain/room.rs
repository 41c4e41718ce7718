// Room aggregate: the authoritative state of one arena and the rules that mutate it.
//
// Every operation is synchronous and returns the broadcasts it produced. The owning
// task decides how to deliver them.

use super::errors::RoomError;
use super::state::{
    Bomb, Bounds, Coin, Direction, Enemy, Mood, Player, PlayerSummary, Position, RoomSnapshot,
};
use super::systems::enemies::{self, EnemyConfig};
use super::tuning::RoomTuning;
use super::validation::validate_player_name;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::{HashMap, HashSet};

// Attempts to find a cell free of players before accepting any cell.
const SPAWN_ATTEMPTS: usize = 32;

/// Which room members receive a broadcast.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Audience {
    All,
    Only(String),
    AllExcept(String),
}

impl Audience {
    pub fn includes(&self, player_id: &str) -> bool {
        match self {
            Audience::All => true,
            Audience::Only(id) => id == player_id,
            Audience::AllExcept(id) => id != player_id,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum RoomEvent {
    WaitingForOpponent,
    GameReady(RoomSnapshot),
    PlayerJoined(PlayerSummary),
    PlayerLeft {
        player_id: String,
    },
    GameStateUpdate(RoomSnapshot),
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
        position: Position,
    },
    PlayerHit {
        player_id: String,
        score: u32,
        position: Position,
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
}

#[derive(Debug, Clone, PartialEq)]
pub struct RoomBroadcast {
    pub audience: Audience,
    pub event: RoomEvent,
}

impl RoomBroadcast {
    pub fn all(event: RoomEvent) -> Self {
        Self {
            audience: Audience::All,
            event,
        }
    }

    pub fn only(player_id: &str, event: RoomEvent) -> Self {
        Self {
            audience: Audience::Only(player_id.to_string()),
            event,
        }
    }

    pub fn all_except(player_id: &str, event: RoomEvent) -> Self {
        Self {
            audience: Audience::AllExcept(player_id.to_string()),
            event,
        }
    }
}

pub struct Room {
    id: u64,
    tuning: RoomTuning,
    bounds: Bounds,

    players: HashMap<String, Player>,
    coins: Vec<Coin>,
    bombs: Vec<Bomb>,
    enemies: Vec<Enemy>,

    game_started: bool,
    difficulty_level: u32,
    total_points_collected: u32,
    used_characters: HashSet<String>,
    // First player to reach the winning score; the room keeps running afterwards.
    winner: Option<String>,

    next_entity_id: u64,
    rng: StdRng,
}

impl Room {
    pub fn new(id: u64, tuning: RoomTuning) -> Self {
        Self::with_rng(id, tuning, StdRng::from_entropy())
    }

    /// Builds a room with a caller-provided RNG (seeded in tests).
    pub fn with_rng(id: u64, tuning: RoomTuning, rng: StdRng) -> Self {
        let bounds = Bounds::interior(tuning.map_width, tuning.map_height);
        let mut room = Self {
            id,
            tuning,
            bounds,
            players: HashMap::new(),
            coins: Vec::new(),
            bombs: Vec::new(),
            enemies: Vec::new(),
            game_started: false,
            difficulty_level: 1,
            total_points_collected: 0,
            used_characters: HashSet::new(),
            winner: None,
            next_entity_id: 1,
            rng,
        };

        room.regenerate_coins();
        room.regenerate_bombs();
        for _ in 0..room.tuning.initial_enemies {
            room.spawn_enemy();
        }
        room
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn player_count(&self) -> usize {
        self.players.len()
    }

    pub fn is_empty(&self) -> bool {
        self.players.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.players.len() >= self.tuning.max_players
    }

    pub fn game_started(&self) -> bool {
        self.game_started
    }

    pub fn difficulty_level(&self) -> u32 {
        self.difficulty_level
    }

    pub fn total_points_collected(&self) -> u32 {
        self.total_points_collected
    }

    pub fn player(&self, player_id: &str) -> Option<&Player> {
        self.players.get(player_id)
    }

    pub fn coins(&self) -> &[Coin] {
        &self.coins
    }

    pub fn bombs(&self) -> &[Bomb] {
        &self.bombs
    }

    pub fn enemies(&self) -> &[Enemy] {
        &self.enemies
    }

    pub fn snapshot(&self) -> RoomSnapshot {
        RoomSnapshot {
            room_id: self.id,
            players: self.players.clone(),
            coins: self.coins.clone(),
            bombs: self.bombs.clone(),
            enemies: self.enemies.clone(),
            map_width: self.tuning.map_width,
            map_height: self.tuning.map_height,
            difficulty_level: self.difficulty_level,
            winning_score: self.tuning.winning_score,
        }
    }

    /// Adds a new player. Starts the room once it reaches capacity.
    pub fn join(&mut self, player_id: &str, name: &str) -> Result<Vec<RoomBroadcast>, RoomError> {
        let name = validate_player_name(name)?;
        if self.players.contains_key(player_id) {
            return Err(RoomError::AlreadyInRoom);
        }
        if self.is_full() {
            return Err(RoomError::RoomFull);
        }

        let position = self.free_cell(None);
        let character = self.get_unique_character();
        let player = Player {
            id: player_id.to_string(),
            name,
            position,
            facing: Direction::Down,
            mood: Mood::Neutral,
            score: 0,
            character,
            coins_collected: 0,
            bombs_hit: 0,
            enemy_hits: 0,
        };

        let summary = PlayerSummary::from(&player);
        self.players.insert(player_id.to_string(), player);

        let mut out = vec![RoomBroadcast::all_except(
            player_id,
            RoomEvent::PlayerJoined(summary),
        )];
        if self.start_if_full(&mut out) {
            return Ok(out);
        }
        if self.game_started {
            out.push(RoomBroadcast::all(RoomEvent::GameStateUpdate(self.snapshot())));
        } else {
            out.push(RoomBroadcast::only(player_id, RoomEvent::WaitingForOpponent));
        }
        Ok(out)
    }

    /// Puts a previously disconnected player back with its saved state.
    ///
    /// The saved position is kept unless another player stands there now; the saved
    /// character is kept only if nobody took it in the meantime.
    pub fn restore(&mut self, mut player: Player) -> Result<Vec<RoomBroadcast>, RoomError> {
        if self.players.contains_key(&player.id) {
            return Err(RoomError::AlreadyInRoom);
        }
        if self.is_full() {
            return Err(RoomError::RoomFull);
        }

        let blocked = !self.bounds.contains(player.position)
            || self.players.values().any(|p| p.position == player.position);
        if blocked {
            player.position = self.free_cell(None);
        }

        let in_pool = self.tuning.characters.contains(&player.character);
        if in_pool && !self.used_characters.contains(&player.character) {
            self.used_characters.insert(player.character.clone());
        } else {
            player.character = self.get_unique_character();
        }

        let player_id = player.id.clone();
        let summary = PlayerSummary::from(&player);
        self.players.insert(player_id.clone(), player);

        let mut out = vec![RoomBroadcast::all_except(
            &player_id,
            RoomEvent::PlayerJoined(summary),
        )];
        if !self.start_if_full(&mut out) {
            out.push(RoomBroadcast::all(RoomEvent::GameStateUpdate(self.snapshot())));
        }
        Ok(out)
    }

    /// Removes a player and releases its character. Returns the final player state.
    pub fn leave(&mut self, player_id: &str) -> Result<(Player, Vec<RoomBroadcast>), RoomError> {
        let player = self
            .players
            .remove(player_id)
            .ok_or(RoomError::UnknownPlayer)?;
        self.used_characters.remove(&player.character);

        let out = vec![RoomBroadcast::all(RoomEvent::PlayerLeft {
            player_id: player_id.to_string(),
        })];
        Ok((player, out))
    }

    /// Applies one step for a player. Blocked steps change nothing and broadcast nothing.
    pub fn apply_move(
        &mut self,
        player_id: &str,
        direction: Direction,
    ) -> Result<Vec<RoomBroadcast>, RoomError> {
        let current = self
            .players
            .get(player_id)
            .ok_or(RoomError::UnknownPlayer)?
            .position;

        let target = current.step(direction);
        if !self.bounds.contains(target) {
            return Ok(Vec::new());
        }
        if self
            .players
            .values()
            .any(|p| p.id != player_id && p.position == target)
        {
            return Ok(Vec::new());
        }

        let mut out = Vec::new();
        let Some(player) = self.players.get_mut(player_id) else {
            return Err(RoomError::UnknownPlayer);
        };
        player.position = target;
        player.facing = direction;

        let mut coin_collected = false;
        if let Some(coin) = self
            .coins
            .iter_mut()
            .find(|c| !c.collected && c.position == target)
        {
            coin.collected = true;
            player.score += self.tuning.coin_value;
            player.coins_collected += 1;
            player.mood = Mood::Happy;
            self.total_points_collected += self.tuning.coin_value;
            coin_collected = true;
            out.push(RoomBroadcast::all(RoomEvent::CoinCollected {
                player_id: player_id.to_string(),
                coin_id: coin.id,
                score: player.score,
            }));
        }

        let mut bomb_hit = false;
        if let Some(bomb) = self
            .bombs
            .iter_mut()
            .find(|b| !b.exploded && b.position == target)
        {
            bomb.exploded = true;
            player.penalize(self.tuning.bomb_penalty);
            player.bombs_hit += 1;
            player.mood = Mood::Sad;
            bomb_hit = true;
            out.push(RoomBroadcast::only(
                player_id,
                RoomEvent::BombHit {
                    player_id: player_id.to_string(),
                    bomb_id: bomb.id,
                    score: player.score,
                },
            ));
            out.push(RoomBroadcast::all_except(
                player_id,
                RoomEvent::BombExploded {
                    bomb_id: bomb.id,
                    position: bomb.position,
                },
            ));
        }

        let (score, name) = (player.score, player.name.clone());

        if coin_collected || bomb_hit {
            self.update_difficulty(&mut out);
        }

        if self.winner.is_none() && score >= self.tuning.winning_score {
            self.winner = Some(player_id.to_string());
            out.push(RoomBroadcast::all(RoomEvent::GameWon {
                winner_id: player_id.to_string(),
                winner_name: name,
                winner_score: score,
            }));
        }

        if coin_collected && self.coins.iter().all(|c| c.collected) {
            self.regenerate_coins();
            self.regenerate_bombs();
        }

        out.push(RoomBroadcast::all(RoomEvent::GameStateUpdate(self.snapshot())));
        Ok(out)
    }

    /// One world step: enemy movement, then enemy contact. Idle until the room starts.
    pub fn tick(&mut self) -> Vec<RoomBroadcast> {
        if !self.game_started {
            return Vec::new();
        }

        let cfg = EnemyConfig {
            base_move_interval: self.tuning.enemy_base_move_interval,
            speedup_per_level: self.tuning.enemy_speedup_per_level,
            turn_chance: self.tuning.enemy_turn_chance,
            bounds: self.bounds,
        };
        enemies::tick_enemies(&mut self.enemies, &mut self.rng, cfg);

        let enemy_cells: HashSet<Position> = self.enemies.iter().map(|e| e.position).collect();
        let mut hit: Vec<String> = self
            .players
            .values()
            .filter(|p| enemy_cells.contains(&p.position))
            .map(|p| p.id.clone())
            .collect();
        // Stable order keeps seeded runs reproducible.
        hit.sort();

        let mut out = Vec::new();
        for player_id in hit {
            let position = self.free_cell(Some(player_id.as_str()));
            let Some(player) = self.players.get_mut(&player_id) else {
                continue;
            };
            // No invulnerability window: a player can be hit on consecutive ticks.
            player.penalize(self.tuning.enemy_penalty);
            player.enemy_hits += 1;
            player.mood = Mood::Sad;
            player.position = position;
            out.push(RoomBroadcast::all(RoomEvent::PlayerHit {
                player_id,
                score: player.score,
                position,
            }));
        }

        out.push(RoomBroadcast::all(RoomEvent::GameStateUpdate(self.snapshot())));
        out
    }

    fn start_if_full(&mut self, out: &mut Vec<RoomBroadcast>) -> bool {
        if self.game_started || self.players.len() != self.tuning.max_players {
            return false;
        }
        self.game_started = true;
        out.push(RoomBroadcast::all(RoomEvent::GameReady(self.snapshot())));
        true
    }

    fn update_difficulty(&mut self, out: &mut Vec<RoomBroadcast>) {
        let threshold = self.tuning.difficulty_threshold.max(1);
        let level = self.total_points_collected / threshold + 1;
        if level <= self.difficulty_level {
            return;
        }

        self.difficulty_level = level;
        for enemy in &mut self.enemies {
            enemy.difficulty_level = level;
        }
        for _ in 0..self.tuning.enemies_per_level {
            self.spawn_enemy();
        }
        self.regenerate_bombs();

        out.push(RoomBroadcast::all(RoomEvent::DifficultyIncrease {
            level,
            enemy_count: self.enemies.len(),
        }));
    }

    /// Draws an unused character; when the pool runs dry it resets and reuses the first.
    fn get_unique_character(&mut self) -> String {
        let free = self
            .tuning
            .characters
            .iter()
            .find(|c| !self.used_characters.contains(*c))
            .cloned();

        let character = match free {
            Some(c) => c,
            None => {
                self.used_characters.clear();
                match self.tuning.characters.first() {
                    Some(c) => c.clone(),
                    None => return String::new(),
                }
            }
        };
        self.used_characters.insert(character.clone());
        character
    }

    fn regenerate_coins(&mut self) {
        let mut taken = HashSet::new();
        let mut coins = Vec::with_capacity(self.tuning.coin_count);
        for _ in 0..self.tuning.coin_count {
            let position = place(
                &mut self.rng,
                self.bounds,
                &taken,
                self.tuning.bomb_placement_attempts,
            );
            taken.insert(position);
            coins.push(Coin {
                id: self.next_id(),
                position,
                collected: false,
            });
        }
        self.coins = coins;
    }

    fn regenerate_bombs(&mut self) {
        let count = self
            .tuning
            .max_bombs
            .min(self.difficulty_level.saturating_sub(1) as usize);

        let mut taken: HashSet<Position> = self
            .coins
            .iter()
            .filter(|c| !c.collected)
            .map(|c| c.position)
            .collect();
        let mut bombs = Vec::with_capacity(count);
        for _ in 0..count {
            let position = place(
                &mut self.rng,
                self.bounds,
                &taken,
                self.tuning.bomb_placement_attempts,
            );
            taken.insert(position);
            bombs.push(Bomb {
                id: self.next_id(),
                position,
                exploded: false,
            });
        }
        self.bombs = bombs;
    }

    fn spawn_enemy(&mut self) {
        let position = self.free_cell(None);
        let direction = Direction::ALL[self.rng.gen_range(0..Direction::ALL.len())];
        let id = self.next_id();
        self.enemies.push(Enemy {
            id,
            position,
            direction,
            move_counter: 0,
            difficulty_level: self.difficulty_level,
        });
    }

    /// Random interior cell not occupied by a player (other than `ignore`) or an enemy.
    fn free_cell(&mut self, ignore: Option<&str>) -> Position {
        let taken: HashSet<Position> = self
            .players
            .values()
            .filter(|p| Some(p.id.as_str()) != ignore)
            .map(|p| p.position)
            .chain(self.enemies.iter().map(|e| e.position))
            .collect();
        place(&mut self.rng, self.bounds, &taken, SPAWN_ATTEMPTS)
    }

    fn next_id(&mut self) -> u64 {
        let id = self.next_entity_id;
        self.next_entity_id += 1;
        id
    }
}

fn random_cell(rng: &mut StdRng, bounds: Bounds) -> Position {
    Position::new(
        rng.gen_range(bounds.min_x..=bounds.max_x),
        rng.gen_range(bounds.min_y..=bounds.max_y),
    )
}

/// Picks a cell outside `taken`, falling back to an overlapping cell once attempts run out.
fn place(rng: &mut StdRng, bounds: Bounds, taken: &HashSet<Position>, attempts: usize) -> Position {
    let mut candidate = random_cell(rng, bounds);
    for _ in 0..attempts {
        if !taken.contains(&candidate) {
            return candidate;
        }
        candidate = random_cell(rng, bounds);
    }
    candidate
}

#[cfg(test)]
mod tests {
    use super::*;

    fn room() -> Room {
        Room::with_rng(1, RoomTuning::default(), StdRng::seed_from_u64(11))
    }

    fn started_room() -> Room {
        let mut room = room();
        room.join("a", "Alice").unwrap();
        room.join("b", "Bob").unwrap();
        room
    }

    fn place_player(room: &mut Room, id: &str, x: i32, y: i32) {
        room.players.get_mut(id).unwrap().position = Position::new(x, y);
    }

    // Moves every entity far away from the cells a test cares about.
    fn clear_board(room: &mut Room) {
        room.coins.iter_mut().for_each(|c| c.position = Position::new(18, 13));
        room.bombs.clear();
        room.enemies.clear();
    }

    fn events(out: &[RoomBroadcast]) -> Vec<&RoomEvent> {
        out.iter().map(|b| &b.event).collect()
    }

    fn has_state_update(out: &[RoomBroadcast]) -> bool {
        out.iter()
            .any(|b| matches!(b.event, RoomEvent::GameStateUpdate(_)))
    }

    #[test]
    fn new_room_has_coins_enemies_and_no_bombs_at_level_one() {
        let room = room();
        assert_eq!(room.coins().len(), 10);
        assert_eq!(room.enemies().len(), 2);
        assert!(room.bombs().is_empty());
        assert_eq!(room.difficulty_level(), 1);
        assert!(!room.game_started());
    }

    #[test]
    fn first_join_waits_and_second_join_starts_the_room() {
        let mut room = room();

        let out = room.join("a", "Alice").unwrap();
        assert!(out.contains(&RoomBroadcast::only("a", RoomEvent::WaitingForOpponent)));
        assert!(!room.game_started());

        let out = room.join("b", "Bob").unwrap();
        assert!(room.game_started());
        let ready = out
            .iter()
            .find(|b| matches!(b.event, RoomEvent::GameReady(_)))
            .expect("game ready broadcast");
        assert_eq!(ready.audience, Audience::All);
        assert!(
            !out.iter()
                .any(|b| matches!(b.event, RoomEvent::WaitingForOpponent))
        );
        assert!(out.iter().any(|b| {
            b.audience == Audience::AllExcept("b".to_string())
                && matches!(b.event, RoomEvent::PlayerJoined(_))
        }));
    }

    #[test]
    fn join_rejects_invalid_names_without_mutation() {
        let mut room = room();
        let err = room.join("a", "!").unwrap_err();
        assert!(matches!(err, RoomError::Validation(_)));
        assert_eq!(room.player_count(), 0);
    }

    #[test]
    fn join_never_exceeds_capacity() {
        let mut room = started_room();
        assert_eq!(room.join("c", "Carol"), Err(RoomError::RoomFull));
        assert_eq!(room.player_count(), 2);
    }

    #[test]
    fn joined_players_spawn_inside_with_distinct_characters() {
        let room = started_room();
        let a = room.player("a").unwrap();
        let b = room.player("b").unwrap();
        assert!(room.bounds.contains(a.position));
        assert!(room.bounds.contains(b.position));
        assert_ne!(a.character, b.character);
    }

    #[test]
    fn character_pool_resets_when_exhausted() {
        let tuning = RoomTuning {
            max_players: 3,
            characters: vec!["knight".to_string(), "wizard".to_string()],
            ..RoomTuning::default()
        };
        let mut room = Room::with_rng(1, tuning, StdRng::seed_from_u64(3));
        room.join("a", "Alice").unwrap();
        room.join("b", "Bob").unwrap();
        room.join("c", "Carol").unwrap();

        assert_eq!(room.player("a").unwrap().character, "knight");
        assert_eq!(room.player("b").unwrap().character, "wizard");
        assert_eq!(room.player("c").unwrap().character, "knight");
    }

    #[test]
    fn leaving_releases_the_character() {
        let mut room = started_room();
        let character = room.player("a").unwrap().character.clone();

        let (player, out) = room.leave("a").unwrap();
        assert_eq!(player.character, character);
        assert!(!room.used_characters.contains(&character));
        assert_eq!(
            events(&out),
            vec![&RoomEvent::PlayerLeft {
                player_id: "a".to_string()
            }]
        );
        assert_eq!(room.leave("a").unwrap_err(), RoomError::UnknownPlayer);
    }

    #[test]
    fn move_out_of_bounds_is_ignored() {
        let mut room = started_room();
        clear_board(&mut room);
        place_player(&mut room, "a", 1, 1);

        let out = room.apply_move("a", Direction::Left).unwrap();
        assert!(out.is_empty());
        assert_eq!(room.player("a").unwrap().position, Position::new(1, 1));

        let out = room.apply_move("a", Direction::Up).unwrap();
        assert!(out.is_empty());
    }

    #[test]
    fn move_into_another_player_is_ignored() {
        let mut room = started_room();
        clear_board(&mut room);
        place_player(&mut room, "a", 3, 3);
        place_player(&mut room, "b", 4, 3);

        let out = room.apply_move("a", Direction::Right).unwrap();
        assert!(out.is_empty());
        assert_eq!(room.player("a").unwrap().position, Position::new(3, 3));
    }

    #[test]
    fn accepted_move_commits_position_and_facing_then_broadcasts() {
        let mut room = started_room();
        clear_board(&mut room);
        place_player(&mut room, "a", 3, 3);
        place_player(&mut room, "b", 9, 9);

        let out = room.apply_move("a", Direction::Down).unwrap();
        let player = room.player("a").unwrap();
        assert_eq!(player.position, Position::new(3, 4));
        assert_eq!(player.facing, Direction::Down);
        assert!(has_state_update(&out));
    }

    #[test]
    fn move_for_unknown_player_is_an_error() {
        let mut room = started_room();
        assert_eq!(
            room.apply_move("ghost", Direction::Up),
            Err(RoomError::UnknownPlayer)
        );
    }

    #[test]
    fn coin_then_bomb_clamps_score_at_zero() {
        let mut room = started_room();
        clear_board(&mut room);
        place_player(&mut room, "a", 3, 3);
        place_player(&mut room, "b", 9, 9);
        room.coins[0].position = Position::new(4, 3);
        room.bombs.push(Bomb {
            id: 900,
            position: Position::new(5, 3),
            exploded: false,
        });

        room.apply_move("a", Direction::Right).unwrap();
        let player = room.player("a").unwrap();
        assert_eq!(player.score, 10);
        assert_eq!(player.mood, Mood::Happy);
        assert_eq!(room.total_points_collected(), 10);

        let out = room.apply_move("a", Direction::Right).unwrap();
        let player = room.player("a").unwrap();
        assert_eq!(player.score, 0);
        assert_eq!(player.mood, Mood::Sad);
        assert!(room.bombs[0].exploded);
        assert!(out.contains(&RoomBroadcast::only(
            "a",
            RoomEvent::BombHit {
                player_id: "a".to_string(),
                bomb_id: 900,
                score: 0,
            }
        )));
        assert!(out.iter().any(|b| {
            b.audience == Audience::AllExcept("a".to_string())
                && matches!(b.event, RoomEvent::BombExploded { bomb_id: 900, .. })
        }));
    }

    #[test]
    fn crossing_the_threshold_raises_difficulty_once() {
        let mut room = started_room();
        clear_board(&mut room);
        room.spawn_enemy();
        room.spawn_enemy();
        place_player(&mut room, "a", 3, 3);
        place_player(&mut room, "b", 9, 9);
        room.total_points_collected = 190;
        room.coins[0].position = Position::new(4, 3);
        room.coins[1].position = Position::new(5, 3);

        let out = room.apply_move("a", Direction::Right).unwrap();
        assert_eq!(room.total_points_collected(), 200);
        assert_eq!(room.difficulty_level(), 2);
        assert_eq!(room.enemies().len(), 4);
        assert!(room.enemies().iter().all(|e| e.difficulty_level == 2));
        assert_eq!(room.bombs().len(), 1);
        assert!(out.contains(&RoomBroadcast::all(RoomEvent::DifficultyIncrease {
            level: 2,
            enemy_count: 4,
        })));

        // Next coin stays within the same level band.
        let out = room.apply_move("a", Direction::Right).unwrap();
        assert_eq!(room.difficulty_level(), 2);
        assert_eq!(room.enemies().len(), 4);
        assert!(
            !out.iter()
                .any(|b| matches!(b.event, RoomEvent::DifficultyIncrease { .. }))
        );
    }

    #[test]
    fn difficulty_matches_points_after_every_scoring_event() {
        let mut room = started_room();
        place_player(&mut room, "b", 18, 13);
        let threshold = room.tuning.difficulty_threshold;
        let mut last_level = room.difficulty_level();
        let mut walk = StdRng::seed_from_u64(5);

        for _ in 0..2000 {
            let direction = Direction::ALL[walk.gen_range(0..4)];
            room.apply_move("a", direction).unwrap();
            let level = room.difficulty_level();
            assert!(level >= last_level);
            assert_eq!(level, room.total_points_collected() / threshold + 1);
            assert!(room.player("a").map(|p| room.bounds.contains(p.position)).unwrap());
            last_level = level;
        }
    }

    #[test]
    fn bomb_count_is_capped() {
        let mut room = started_room();
        room.difficulty_level = 40;
        room.regenerate_bombs();
        assert_eq!(room.bombs().len(), 5);
    }

    #[test]
    fn coins_regenerate_only_when_all_are_collected() {
        let mut room = started_room();
        clear_board(&mut room);
        place_player(&mut room, "a", 3, 3);
        place_player(&mut room, "b", 9, 9);
        room.coins.truncate(2);
        room.coins[0].position = Position::new(4, 3);
        room.coins[1].position = Position::new(5, 3);
        let first_ids: Vec<u64> = room.coins.iter().map(|c| c.id).collect();

        room.apply_move("a", Direction::Right).unwrap();
        assert_eq!(room.coins().len(), 2);
        assert_eq!(room.coins().iter().filter(|c| c.collected).count(), 1);

        room.apply_move("a", Direction::Right).unwrap();
        assert_eq!(room.coins().len(), 10);
        assert!(room.coins().iter().all(|c| !c.collected));
        assert!(room.coins().iter().all(|c| !first_ids.contains(&c.id)));
    }

    #[test]
    fn collecting_the_last_coin_also_replaces_the_bombs() {
        let mut room = started_room();
        clear_board(&mut room);
        place_player(&mut room, "a", 3, 3);
        place_player(&mut room, "b", 9, 9);
        // Level 2 without crossing into level 3 during the test.
        room.difficulty_level = 2;
        room.total_points_collected = 100;
        room.bombs.push(Bomb {
            id: 900,
            position: Position::new(17, 12),
            exploded: false,
        });
        room.coins.truncate(2);
        room.coins[0].position = Position::new(4, 3);
        room.coins[1].position = Position::new(5, 3);

        room.apply_move("a", Direction::Right).unwrap();
        assert_eq!(room.bombs().len(), 1);
        assert_eq!(room.bombs()[0].id, 900);

        room.apply_move("a", Direction::Right).unwrap();
        assert_eq!(room.difficulty_level(), 2);
        assert_eq!(room.bombs().len(), 1);
        assert_ne!(room.bombs()[0].id, 900);
        assert!(!room.bombs()[0].exploded);
        let coin_ids: Vec<u64> = room.coins().iter().map(|c| c.id).collect();
        assert!(!coin_ids.contains(&room.bombs()[0].id));
    }

    #[test]
    fn new_bombs_avoid_uncollected_coins_and_each_other() {
        for seed in 0..20 {
            let mut room = Room::with_rng(1, RoomTuning::default(), StdRng::seed_from_u64(seed));
            room.coins[0].collected = true;
            room.difficulty_level = 6;
            room.regenerate_bombs();
            assert_eq!(room.bombs().len(), 5);

            let coin_cells: HashSet<Position> = room
                .coins()
                .iter()
                .filter(|c| !c.collected)
                .map(|c| c.position)
                .collect();
            let bomb_cells: HashSet<Position> = room.bombs().iter().map(|b| b.position).collect();
            assert_eq!(bomb_cells.len(), 5, "seed {seed}: bombs share a cell");
            assert!(
                bomb_cells.is_disjoint(&coin_cells),
                "seed {seed}: bomb placed on a coin"
            );
            assert!(bomb_cells.iter().all(|p| room.bounds.contains(*p)));
        }
    }

    #[test]
    fn reaching_the_winning_score_announces_the_winner_once() {
        let mut room = started_room();
        clear_board(&mut room);
        place_player(&mut room, "a", 3, 3);
        place_player(&mut room, "b", 9, 9);
        room.players.get_mut("a").unwrap().score = 490;
        room.coins[0].position = Position::new(4, 3);
        room.coins[1].position = Position::new(5, 3);

        let out = room.apply_move("a", Direction::Right).unwrap();
        assert!(out.contains(&RoomBroadcast::all(RoomEvent::GameWon {
            winner_id: "a".to_string(),
            winner_name: "Alice".to_string(),
            winner_score: 500,
        })));

        let out = room.apply_move("a", Direction::Right).unwrap();
        assert!(
            !out.iter()
                .any(|b| matches!(b.event, RoomEvent::GameWon { .. }))
        );
        assert!(room.game_started());
    }

    #[test]
    fn tick_does_nothing_before_the_room_starts() {
        let mut room = room();
        room.join("a", "Alice").unwrap();
        let before = room.enemies().to_vec();
        assert!(room.tick().is_empty());
        assert_eq!(room.enemies(), before.as_slice());
    }

    #[test]
    fn tick_broadcasts_one_snapshot() {
        let mut room = started_room();
        let out = room.tick();
        let updates = out
            .iter()
            .filter(|b| matches!(b.event, RoomEvent::GameStateUpdate(_)))
            .count();
        assert_eq!(updates, 1);
    }

    #[test]
    fn enemy_contact_penalizes_and_teleports() {
        let mut room = started_room();
        clear_board(&mut room);
        place_player(&mut room, "a", 5, 5);
        place_player(&mut room, "b", 12, 10);
        room.players.get_mut("a").unwrap().score = 3;
        // Counter 0 at level 1: the first tick does not move it.
        room.enemies.push(Enemy {
            id: 77,
            position: Position::new(5, 5),
            direction: Direction::Up,
            move_counter: 0,
            difficulty_level: 1,
        });

        let out = room.tick();
        let player = room.player("a").unwrap();
        assert_eq!(player.score, 0);
        assert_eq!(player.mood, Mood::Sad);
        assert_eq!(player.enemy_hits, 1);
        assert!(room.bounds.contains(player.position));
        assert!(out.iter().any(|b| matches!(
            &b.event,
            RoomEvent::PlayerHit { player_id, score: 0, .. } if player_id == "a"
        )));
        assert_eq!(room.player("b").unwrap().score, 0);
        assert_eq!(room.player("b").unwrap().enemy_hits, 0);
    }

    #[test]
    fn restore_brings_back_the_exact_player_state() {
        let mut room = started_room();
        clear_board(&mut room);
        place_player(&mut room, "a", 6, 6);
        place_player(&mut room, "b", 12, 10);
        {
            let a = room.players.get_mut("a").unwrap();
            a.score = 40;
            a.coins_collected = 4;
        }
        let (saved, _) = room.leave("a").unwrap();

        let out = room.restore(saved.clone()).unwrap();
        assert_eq!(room.player("a"), Some(&saved));
        assert!(has_state_update(&out));
        assert!(out.iter().any(|b| {
            b.audience == Audience::AllExcept("a".to_string())
                && matches!(b.event, RoomEvent::PlayerJoined(_))
        }));
    }

    #[test]
    fn restore_moves_the_player_off_an_occupied_cell() {
        let mut room = started_room();
        clear_board(&mut room);
        place_player(&mut room, "a", 6, 6);
        let (saved, _) = room.leave("a").unwrap();
        room.join("c", "Carol").unwrap();
        room.leave("c").unwrap();
        place_player(&mut room, "b", 6, 6);

        room.restore(saved).unwrap();
        assert_ne!(room.player("a").unwrap().position, Position::new(6, 6));
    }

    #[test]
    fn restore_into_a_full_room_fails() {
        let mut room = started_room();
        let (saved, _) = room.leave("a").unwrap();
        room.join("c", "Carol").unwrap();
        assert_eq!(room.restore(saved), Err(RoomError::RoomFull));
    }
}
