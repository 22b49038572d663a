//! Background loop that expires dead nodes (`SPEC_FULL.md` §4.6).
//! Deletes nodes from the liveness table only; replica sets that
//! reference a dying node's address are left untouched until
//! re-replication heals them.

use std::time::Duration;

use tokio::sync::watch;
use tokio::time::{interval, MissedTickBehavior};

use crate::state::State;

/// Removes every node whose `last_seen` is older than `ttl`. Exposed
/// standalone so tests can drive a single tick deterministically instead
/// of waiting on a timer.
pub async fn tick(state: &State, ttl: Duration) {
    let now = std::time::SystemTime::now();
    let mut guard = state.write().await;

    let expired: Vec<String> = guard
        .nodes
        .iter()
        .filter(|(_, record)| {
            now.duration_since(record.last_seen)
                .map(|age| age > ttl)
                .unwrap_or(false)
        })
        .map(|(node_id, _)| node_id.clone())
        .collect();

    for node_id in &expired {
        guard.nodes.remove(node_id);
        log::info!("cleanup: expired node '{}' (ttl {:?} exceeded)", node_id, ttl);
    }
}

/// Runs [`tick`] on `interval_seconds` forever until `shutdown` fires.
pub async fn run(
    state: std::sync::Arc<State>,
    ttl: Duration,
    interval_seconds: u64,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut ticker = interval(Duration::from_secs(interval_seconds.max(1)));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                tick(&state, ttl).await;
            }
            _ = shutdown.changed() => {
                log::info!("cleanup loop shutting down");
                return;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::NodeRecord;
    use std::time::SystemTime;

    #[tokio::test]
    async fn expires_only_stale_nodes() {
        let state = State::new();
        {
            let mut guard = state.write().await;
            guard.nodes.insert(
                "stale".to_string(),
                NodeRecord {
                    address: "10.0.0.1:6001".to_string(),
                    last_seen: SystemTime::now() - Duration::from_secs(30),
                },
            );
            guard.nodes.insert(
                "fresh".to_string(),
                NodeRecord {
                    address: "10.0.0.2:6001".to_string(),
                    last_seen: SystemTime::now(),
                },
            );
        }

        tick(&state, Duration::from_secs(10)).await;

        let guard = state.read().await;
        assert!(!guard.nodes.contains_key("stale"));
        assert!(guard.nodes.contains_key("fresh"));
    }
}
