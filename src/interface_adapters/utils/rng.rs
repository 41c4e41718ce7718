use rand::Rng;
use std::sync::{
    OnceLock,
    atomic::{AtomicU64, Ordering},
};

/// Returns a process-unique, monotonically increasing connection number for log correlation.
pub fn next_conn_id() -> u64 {
    static COUNTER: OnceLock<AtomicU64> = OnceLock::new();
    let counter = COUNTER.get_or_init(|| AtomicU64::new(1));
    counter.fetch_add(1, Ordering::Relaxed)
}

/// Opaque, unguessable player identity handed to a new connection.
pub fn new_player_id() -> String {
    let mut rng = rand::thread_rng();
    format!("{:016x}{:016x}", rng.r#gen::<u64>(), rng.r#gen::<u64>())
}
