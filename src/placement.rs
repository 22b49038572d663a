//! Replica placement (`SPEC_FULL.md` §4.5). Selection order over the live
//! node table is unspecified; callers from re-replication pass the
//! chunk's current replica set as `exclude` so a repair never lands on a
//! node that already holds a copy.

use std::collections::HashMap;

use crate::state::NodeRecord;

/// Picks up to `r` node addresses from `nodes`, skipping any address in
/// `exclude`. Degraded placement (fewer than `r` candidates available)
/// is permitted — the caller is responsible for triggering
/// re-replication later.
pub fn pick_replica_nodes(
    nodes: &HashMap<String, NodeRecord>,
    r: u32,
    exclude: &[String],
) -> Vec<String> {
    let mut picked = Vec::with_capacity(r as usize);
    for record in nodes.values() {
        if picked.len() == r as usize {
            break;
        }
        if exclude.iter().any(|addr| addr == &record.address) {
            continue;
        }
        picked.push(record.address.clone());
    }
    picked
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::SystemTime;

    fn node(address: &str) -> NodeRecord {
        NodeRecord {
            address: address.to_string(),
            last_seen: SystemTime::now(),
        }
    }

    #[test]
    fn picks_up_to_r_nodes() {
        let mut nodes = HashMap::new();
        nodes.insert("dn1".to_string(), node("10.0.0.1:6001"));
        nodes.insert("dn2".to_string(), node("10.0.0.2:6001"));
        nodes.insert("dn3".to_string(), node("10.0.0.3:6001"));

        let picked = pick_replica_nodes(&nodes, 2, &[]);
        assert_eq!(picked.len(), 2);
    }

    #[test]
    fn degraded_placement_when_too_few_nodes() {
        let mut nodes = HashMap::new();
        nodes.insert("dn1".to_string(), node("10.0.0.1:6001"));

        let picked = pick_replica_nodes(&nodes, 2, &[]);
        assert_eq!(picked, vec!["10.0.0.1:6001".to_string()]);
    }

    #[test]
    fn excludes_existing_replicas() {
        let mut nodes = HashMap::new();
        nodes.insert("dn1".to_string(), node("10.0.0.1:6001"));
        nodes.insert("dn2".to_string(), node("10.0.0.2:6001"));

        let picked = pick_replica_nodes(&nodes, 1, &["10.0.0.1:6001".to_string()]);
        assert_eq!(picked, vec!["10.0.0.2:6001".to_string()]);
    }
}
