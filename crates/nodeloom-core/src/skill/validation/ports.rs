use std::collections::HashMap;

use nodeloom_types::graph::{Edge, EntityKind, GraphSnapshot, Handle, Node};
use nodeloom_types::validation::{IssueCode, ValidationIssue, ValidationReport};

/// Data types that are compatible with anything.
const WILDCARD_TYPES: [&str; 6] = ["value", "any", "trigger", "input", "output", "bidirectional"];

fn is_wildcard(data_type: &str) -> bool {
    WILDCARD_TYPES.iter().any(|w| w.eq_ignore_ascii_case(data_type))
}

fn types_compatible(a: &str, b: &str) -> bool {
    is_wildcard(a) || is_wildcard(b) || a.eq_ignore_ascii_case(b)
}

/// Check one end of an edge and return the resolved handle, if any.
fn check_end<'n>(
    report: &mut ValidationReport,
    edge: &Edge,
    node: &'n Node,
    port: Option<&str>,
    is_source: bool,
) -> Option<&'n Handle> {
    let end = if is_source { "source" } else { "target" };
    let fits = |h: &Handle| if is_source { h.direction.can_source() } else { h.direction.can_target() };
    match port {
        Some(port) => {
            let Some(handle) = node.handle(port) else {
                report.error(
                    ValidationIssue::new(
                        IssueCode::MissingHandle,
                        format!("{end} port '{port}' does not exist on node '{}'", node.id),
                    )
                    .on(EntityKind::Edge, &edge.id),
                );
                return None;
            };
            if !fits(handle) {
                report.error(
                    ValidationIssue::new(
                        IssueCode::DirectionMismatch,
                        format!("{end} port '{port}' is {}", handle.direction.as_str()),
                    )
                    .on(EntityKind::Edge, &edge.id),
                );
            }
            Some(handle)
        }
        None => {
            let candidates: Vec<&Handle> = node.handles.iter().filter(|&h| fits(h)).collect();
            if candidates.len() > 1 {
                report.warn(
                    ValidationIssue::new(
                        IssueCode::AmbiguousHandle,
                        format!(
                            "{end} port omitted but node '{}' has {} candidate handles",
                            node.id,
                            candidates.len()
                        ),
                    )
                    .on(EntityKind::Edge, &edge.id),
                );
                None
            } else {
                candidates.first().copied()
            }
        }
    }
}

/// Port existence, direction, and data-type compatibility for every edge.
///
/// Edges with a missing endpoint node are left to schema validation.
pub fn validate_ports(snapshot: &GraphSnapshot) -> ValidationReport {
    let nodes: HashMap<&str, &Node> = snapshot.nodes.iter().map(|n| (n.id.as_str(), n)).collect();
    let mut report = ValidationReport::default();
    for edge in &snapshot.edges {
        let (Some(source), Some(target)) = (nodes.get(edge.source.as_str()), nodes.get(edge.target.as_str())) else {
            continue;
        };
        let out = check_end(&mut report, edge, source, edge.source_port.as_deref(), true);
        let inp = check_end(&mut report, edge, target, edge.target_port.as_deref(), false);
        if let (Some(out), Some(inp)) = (out, inp)
            && let (Some(a), Some(b)) = (out.data_type.as_deref(), inp.data_type.as_deref())
            && !types_compatible(a, b)
        {
            report.error(
                ValidationIssue::new(
                    IssueCode::TypeMismatch,
                    format!("'{}' ({a}) cannot feed '{}' ({b})", out.id, inp.id),
                )
                .on(EntityKind::Edge, &edge.id),
            );
        }
    }
    report
}

#[cfg(test)]
mod tests {
    use nodeloom_types::graph::{Edge, GraphSnapshot, Handle, HandleDirection, Node};
    use nodeloom_types::validation::IssueCode;
    use serde_json::json;

    use super::validate_ports;
    use crate::skill::test_support::run;
    use crate::store::Store;

    fn typed(id: &str, handles: Vec<Handle>) -> Node {
        handles.into_iter().fold(Node::new(id, "task"), Node::with_handle)
    }

    #[test]
    fn type_mismatch_and_wildcards() {
        let snapshot = GraphSnapshot {
            nodes: vec![
                typed("a", vec![Handle::new("out", HandleDirection::Output).with_data_type("number")]),
                typed("b", vec![Handle::new("in", HandleDirection::Input).with_data_type("string")]),
                typed("c", vec![Handle::new("in", HandleDirection::Input).with_data_type("ANY")]),
            ],
            edges: vec![
                Edge::new("e1", "a", "b").with_ports(Some("out"), Some("in")),
                Edge::new("e2", "a", "c").with_ports(Some("out"), Some("in")),
            ],
            groups: vec![],
        };
        let report = validate_ports(&snapshot);
        assert_eq!(report.errors.len(), 1);
        assert_eq!(report.errors[0].code, IssueCode::TypeMismatch);
        assert_eq!(report.errors[0].id.as_deref(), Some("e1"));
    }

    #[test]
    fn omitted_port_on_multi_handle_node_is_a_warning() {
        let snapshot = GraphSnapshot {
            nodes: vec![
                typed(
                    "a",
                    vec![
                        Handle::new("o1", HandleDirection::Output),
                        Handle::new("o2", HandleDirection::Output),
                    ],
                ),
                Node::new("b", "task"),
            ],
            edges: vec![Edge::new("e1", "a", "b")],
            groups: vec![],
        };
        let report = validate_ports(&snapshot);
        assert!(report.is_valid());
        assert!(report.has_warning(IssueCode::AmbiguousHandle));
    }

    #[tokio::test]
    async fn missing_source_port_is_reported() {
        let mut store = Store::from_snapshot(GraphSnapshot {
            nodes: vec![
                typed("a", vec![Handle::new("out", HandleDirection::Output)]),
                Node::new("b", "task"),
            ],
            edges: vec![Edge::new("e1", "a", "b").with_ports(Some("nope"), None::<String>)],
            groups: vec![],
        })
        .unwrap();
        let result = run(&mut store, "validation.ports", json!({})).await;
        assert!(!result.success);
        assert_eq!(result.data.unwrap()["errors"][0]["code"], "MISSING_HANDLE");
    }

    #[test]
    fn wrong_direction_is_an_error() {
        let snapshot = GraphSnapshot {
            nodes: vec![
                typed("a", vec![Handle::new("in", HandleDirection::Input)]),
                Node::new("b", "task"),
            ],
            edges: vec![Edge::new("e1", "a", "b").with_ports(Some("in"), None::<String>)],
            groups: vec![],
        };
        assert!(validate_ports(&snapshot).has_error(IssueCode::DirectionMismatch));
    }
}
