//! Background cleanup of expired sessions.

use std::time::Duration;
use tracing::{debug, error};

use crate::db::Store;

/// Periodically delete expired sessions. Runs until the process exits;
/// sessions are also rejected at verification time, so a missed tick
/// only delays cleanup, never extends a session.
pub async fn run(store: Store, purge_interval_minutes: u32) {
    let mut interval =
        tokio::time::interval(Duration::from_secs(u64::from(purge_interval_minutes) * 60));
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    loop {
        interval.tick().await;

        match store.purge_expired_sessions().await {
            Ok(purged) => {
                if purged > 0 {
                    debug!("Session janitor removed {} expired sessions", purged);
                }
            }
            Err(e) => error!("Session janitor failed: {}", e),
        }
    }
}
