use std::collections::HashSet;

use nodeloom_types::graph::{EntityKind, GraphSnapshot};
use nodeloom_types::validation::{IssueCode, ValidationIssue, ValidationReport};
use serde_json::json;

use crate::skill::SkillOutput;

/// Ids of non-manifest nodes with no incident edge and no group.
pub fn find_orphans(snapshot: &GraphSnapshot) -> Vec<String> {
    let connected: HashSet<&str> = snapshot
        .edges
        .iter()
        .flat_map(|e| [e.source.as_str(), e.target.as_str()])
        .chain(snapshot.groups.iter().flat_map(|g| g.node_ids.iter().map(String::as_str)))
        .collect();
    snapshot
        .nodes
        .iter()
        .filter(|n| !n.is_manifest() && !connected.contains(n.id.as_str()))
        .map(|n| n.id.clone())
        .collect()
}

pub(super) fn run(snapshot: &GraphSnapshot) -> SkillOutput {
    let orphans = find_orphans(snapshot);
    let mut report = ValidationReport::default();
    for id in &orphans {
        report.warn(
            ValidationIssue::new(IssueCode::Orphan, "node has no edges and belongs to no group")
                .on(EntityKind::Node, id),
        );
    }
    SkillOutput::from_report(report, json!({ "orphans": orphans }))
}

#[cfg(test)]
mod tests {
    use nodeloom_types::graph::{GraphSnapshot, Group, Node};
    use serde_json::json;

    use super::find_orphans;
    use crate::graph_api::GraphApi;
    use crate::skill::test_support::{run, sample_store};

    #[test]
    fn group_membership_exempts_a_node() {
        let snapshot = GraphSnapshot {
            nodes: vec![Node::new("lone", "task"), Node::new("g1", "task"), Node::new("g2", "task")],
            edges: vec![],
            groups: vec![Group::new("grp", vec!["g1".into(), "g2".into()])],
        };
        assert_eq!(find_orphans(&snapshot), vec!["lone".to_string()]);
    }

    #[tokio::test]
    async fn orphans_are_warnings_only() {
        let mut store = sample_store();
        store.create_nodes(vec![Node::new("lone", "task")]).unwrap();
        let result = run(&mut store, "validation.orphans", json!({})).await;
        assert!(result.success);
        assert_eq!(result.data.unwrap()["orphans"], json!(["lone"]));
        assert_eq!(result.warnings.len(), 1);
    }
}
