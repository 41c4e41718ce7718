/// Gameplay tuning for a room.
///
/// Keep this separate from runtime/server configuration (tick rates, buffer sizes, etc.).

#[derive(Debug, Clone)]
pub struct RoomTuning {
    /// Map width in cells, wall ring included.
    pub map_width: i32,

    /// Map height in cells, wall ring included.
    pub map_height: i32,

    /// Players needed to start the room; also the hard capacity.
    pub max_players: usize,

    /// Score that wins the room.
    pub winning_score: u32,

    /// Collected points per difficulty level.
    pub difficulty_threshold: u32,

    pub coin_count: usize,
    pub coin_value: u32,
    pub bomb_penalty: u32,
    pub enemy_penalty: u32,

    pub initial_enemies: usize,
    /// Enemies appended on every level-up.
    pub enemies_per_level: usize,

    pub max_bombs: usize,
    /// Tries to find a free cell for a bomb before allowing overlap.
    pub bomb_placement_attempts: usize,

    /// Base ticks between enemy steps at level 1.
    pub enemy_base_move_interval: f64,
    /// Speed-up per level applied to the move interval divisor.
    pub enemy_speedup_per_level: f64,
    /// Chance per step that an enemy picks a new random heading.
    pub enemy_turn_chance: f64,

    /// Visual character pool handed out per room.
    pub characters: Vec<String>,
}

impl Default for RoomTuning {
    fn default() -> Self {
        Self {
            map_width: 20,
            map_height: 15,
            max_players: 2,
            winning_score: 500,
            difficulty_threshold: 200,
            coin_count: 10,
            coin_value: 10,
            bomb_penalty: 20,
            enemy_penalty: 5,
            initial_enemies: 2,
            enemies_per_level: 2,
            max_bombs: 5,
            bomb_placement_attempts: 10,
            enemy_base_move_interval: 3.0,
            enemy_speedup_per_level: 0.1,
            enemy_turn_chance: 0.15,
            characters: ["knight", "wizard", "ranger", "rogue", "cleric", "bard"]
                .into_iter()
                .map(String::from)
                .collect(),
        }
    }
}
