// Simulation systems run by the room on every tick.

pub mod enemies;
