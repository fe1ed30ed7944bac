use nodeloom_types::graph::{EntityKind, GraphSnapshot, Node};
use nodeloom_types::manifest::{FLOW_INTENTS, SCRIPTED_INTENTS, STATIC_INTENTS, intent_kind_of};
use nodeloom_types::validation::{IssueCode, ValidationIssue, ValidationReport};
use serde_json::json;

use crate::skill::SkillOutput;

pub(crate) fn is_script_node(node: &Node) -> bool {
    node.node_type == "script" || node.data.contains_key("script")
}

pub(super) fn run(snapshot: &GraphSnapshot) -> SkillOutput {
    let mut report = ValidationReport::default();
    let Some(manifest) = snapshot.manifest() else {
        report.warn(ValidationIssue::new(
            IssueCode::MissingManifest,
            "graph has no manifest; intent not checked",
        ));
        return SkillOutput::from_report(report, json!({ "intent": null }));
    };
    let Some(kind) = intent_kind_of(manifest) else {
        report.error(
            ValidationIssue::new(IssueCode::MissingField, "intent.kind is required").on(EntityKind::Node, &manifest.id),
        );
        return SkillOutput::from_report(report, json!({ "intent": null }));
    };

    let scripts = snapshot.nodes.iter().filter(|n| is_script_node(n)).count();
    if SCRIPTED_INTENTS.contains(&kind) {
        if scripts == 0 {
            report.error(ValidationIssue::new(
                IssueCode::IntentMismatch,
                format!("'{kind}' graphs need at least one script node"),
            ));
        }
    } else if FLOW_INTENTS.contains(&kind) {
        if snapshot.edges.is_empty() {
            report.warn(ValidationIssue::new(
                IssueCode::IntentMismatch,
                format!("'{kind}' graph has no edges"),
            ));
        }
    } else if STATIC_INTENTS.contains(&kind) {
        if scripts > 0 {
            report.warn(ValidationIssue::new(
                IssueCode::IntentMismatch,
                format!("'{kind}' graph contains {scripts} script node(s)"),
            ));
        }
    } else {
        report.warn(
            ValidationIssue::new(IssueCode::InvalidField, format!("unknown intent kind '{kind}'"))
                .on(EntityKind::Node, &manifest.id),
        );
    }

    SkillOutput::from_report(report, json!({ "intent": kind, "scriptNodes": scripts }))
}

#[cfg(test)]
mod tests {
    use nodeloom_types::graph::{GraphSnapshot, Node};
    use nodeloom_types::manifest::ManifestData;
    use serde_json::json;

    use super::run;

    fn graph(intent: &str, extra: Vec<Node>) -> GraphSnapshot {
        let mut nodes = vec![ManifestData::new("g", "Demo", intent).into_node("m")];
        nodes.extend(extra);
        GraphSnapshot {
            nodes,
            ..GraphSnapshot::default()
        }
    }

    #[test]
    fn executable_needs_a_script() {
        let out = run(&graph("executable", vec![Node::new("a", "task")]));
        assert!(out.failure.is_some());
        assert_eq!(out.data["errors"][0]["code"], "INTENT_MISMATCH");

        let out = run(&graph(
            "executable",
            vec![Node::new("a", "task").with_data("script", json!("return 1"))],
        ));
        assert!(out.failure.is_none());
    }

    #[test]
    fn dataflow_without_edges_warns() {
        let out = run(&graph("dataflow", vec![Node::new("a", "task")]));
        assert!(out.failure.is_none());
        assert_eq!(out.warnings.len(), 1);
    }

    #[test]
    fn documentation_with_scripts_warns() {
        let out = run(&graph("documentation", vec![Node::new("s", "script")]));
        assert!(out.failure.is_none());
        assert_eq!(out.data["warnings"][0]["code"], "INTENT_MISMATCH");
    }
}
