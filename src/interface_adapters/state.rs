use crate::use_cases::{ReconnectionManager, RoomRegistry};
use std::sync::Arc;
use tokio::time::Instant;

#[derive(Clone)]
pub struct AppState {
    // Live rooms and their seat counts.
    pub registry: Arc<RoomRegistry>,
    // Disconnected players waiting to be restored.
    pub reconnections: ReconnectionManager,
    // Process start, for uptime reporting.
    pub started_at: Instant,
}
