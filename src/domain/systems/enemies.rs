use crate::domain::state::{Bounds, Direction, Enemy};
use rand::Rng;

#[derive(Debug, Clone, Copy)]
pub struct EnemyConfig {
    pub base_move_interval: f64, // ticks between steps at level 1
    pub speedup_per_level: f64,
    pub turn_chance: f64, // 0.0..=1.0

    pub bounds: Bounds,
}

/// Ticks between enemy steps for a difficulty level. Never below one.
pub fn move_interval(level: u32, cfg: &EnemyConfig) -> u32 {
    let divisor = 1.0 + f64::from(level.saturating_sub(1)) * cfg.speedup_per_level;
    let interval = (cfg.base_move_interval / divisor).floor() as u32;
    interval.max(1)
}

pub fn tick_enemies(enemies: &mut [Enemy], rng: &mut impl Rng, cfg: EnemyConfig) {
    for enemy in enemies.iter_mut() {
        tick_enemy(enemy, rng, cfg);
    }
}

pub fn tick_enemy(enemy: &mut Enemy, rng: &mut impl Rng, cfg: EnemyConfig) {
    enemy.move_counter = enemy.move_counter.wrapping_add(1);
    if enemy.move_counter % move_interval(enemy.difficulty_level, &cfg) != 0 {
        return;
    }

    if rng.gen_bool(cfg.turn_chance) {
        enemy.direction = Direction::ALL[rng.gen_range(0..Direction::ALL.len())];
    }

    let next = enemy.position.step(enemy.direction);
    if cfg.bounds.contains(next) {
        enemy.position = next;
    } else {
        // Bounce off the wall; the step is spent on turning around.
        enemy.direction = enemy.direction.reversed();
    }
}
