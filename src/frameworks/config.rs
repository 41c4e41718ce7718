use crate::domain::RoomTuning;
use std::{env, time::Duration};

// Runtime/server settings read from the environment (gameplay tuning lives in RoomTuning).

fn env_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|value| value.trim().parse().ok())
        .unwrap_or(default)
}

pub fn http_port() -> u16 {
    env_or("ARENA_SERVER_PORT", 3001)
}

pub fn tick_interval() -> Duration {
    // A zero interval would make tokio's interval panic.
    Duration::from_millis(env_or::<u64>("ARENA_TICK_INTERVAL_MS", 200).max(1))
}

pub fn reconnect_window() -> Duration {
    Duration::from_secs(env_or("ARENA_RECONNECT_WINDOW_SECS", 60))
}

pub fn room_tuning() -> RoomTuning {
    let defaults = RoomTuning::default();
    RoomTuning {
        max_players: env_or("ARENA_MAX_PLAYERS", defaults.max_players).max(1),
        winning_score: env_or("ARENA_WINNING_SCORE", defaults.winning_score),
        ..defaults
    }
}

pub const COMMAND_CHANNEL_CAPACITY: usize = 256;
pub const ROOM_BROADCAST_CAPACITY: usize = 128;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unset_variables_fall_back_to_defaults() {
        assert_eq!(env_or("ARENA_TEST_SURELY_UNSET", 42u16), 42);
    }

    #[test]
    fn unparsable_values_fall_back_to_defaults() {
        // PATH is always set and never a number.
        assert_eq!(env_or("PATH", 7u64), 7);
    }
}
