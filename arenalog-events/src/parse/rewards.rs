use logtail::LogEntry;

use crate::json;
use crate::types::{GraphState, PeriodicReward, RewardNode};

/// Progression-graph snapshots (mastery tracks and event reward graphs).
/// History scan: every snapshot is kept, in log order.
pub fn parse_graph_states(entries: &[LogEntry]) -> Vec<GraphState> {
    entries
        .iter()
        .filter(|e| e.is_json)
        .filter_map(|entry| {
            let graph = json::field(&entry.json, &["graphState", "GraphState"])?;
            let nodes = json::array_field(graph, &["nodes", "Nodes"])?
                .iter()
                .filter_map(|node| {
                    Some(RewardNode {
                        node_id: json::string_field(node, &["nodeId", "NodeId", "id", "Id"])?,
                        state: json::string_field(node, &["state", "State", "status", "Status"])?,
                        progress: json::u32_field(node, &["progress", "Progress"]),
                        goal: json::u32_field(node, &["goal", "Goal"]),
                    })
                })
                .collect();
            Some(GraphState {
                graph_id: json::string_field(graph, &["graphId", "GraphId", "id", "Id"]),
                nodes,
            })
        })
        .collect()
}

/// Daily/weekly periodic reward state, as reported by the client on login.
pub fn parse_periodic_rewards(entries: &[LogEntry]) -> Vec<PeriodicReward> {
    entries
        .iter()
        .filter(|e| e.is_json)
        .filter_map(|entry| {
            json::array_field(&entry.json, &["clientPeriodicRewards", "ClientPeriodicRewards"])
        })
        .flatten()
        .filter_map(|item| {
            Some(PeriodicReward {
                reward_id: json::string_field(item, &["rewardId", "RewardId", "id", "Id"])?,
                claimed: json::bool_field(item, &["claimed", "Claimed"]).unwrap_or(false),
                next_reward_at: json::string_field(
                    item,
                    &["nextRewardTimeUtc", "NextRewardTimeUtc"],
                ),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn entry(line: &str) -> LogEntry {
        let entry = LogEntry::parse(line);
        assert!(entry.is_json, "test payload must be valid JSON: {line}");
        entry
    }

    #[test]
    fn graph_nodes_are_collected() {
        let entries = vec![entry(concat!(
            r#"{"graphState":{"graphId":"mastery-tla","nodes":["#,
            r#"{"nodeId":"n-1","state":"Claimed","progress":5,"goal":5},"#,
            r#"{"nodeId":"n-2","state":"InProgress","progress":2,"goal":5},"#,
            r#"{"state":"Orphaned"}]}}"#
        ))];
        let graphs = parse_graph_states(&entries);
        assert_eq!(graphs.len(), 1);
        assert_eq!(graphs[0].graph_id.as_deref(), Some("mastery-tla"));
        // The node without an id is dropped, not the whole snapshot.
        assert_eq!(graphs[0].nodes.len(), 2);
        assert_eq!(graphs[0].nodes[1].progress, Some(2));
    }

    #[test]
    fn periodic_rewards_default_to_unclaimed() {
        let entries = vec![entry(
            r#"{"clientPeriodicRewards":[{"rewardId":"daily-1","nextRewardTimeUtc":"2025-11-28T09:00:00Z"},{"rewardId":"weekly-1","claimed":true}]}"#,
        )];
        let rewards = parse_periodic_rewards(&entries);
        assert_eq!(rewards.len(), 2);
        assert!(!rewards[0].claimed);
        assert!(rewards[1].claimed);
    }
}
