use std::collections::HashSet;

use nodeloom_types::graph::{Edge, EntityKind, GraphSnapshot, Group, Node};
use nodeloom_types::validation::{IssueCode, ValidationIssue, ValidationReport};

fn valid_extent(value: f64) -> bool {
    value.is_finite() && value > 0.0
}

pub fn validate_nodes(nodes: &[Node]) -> ValidationReport {
    let mut report = ValidationReport::default();
    let mut seen = HashSet::new();
    for node in nodes {
        if node.id.trim().is_empty() {
            report.error(ValidationIssue::new(IssueCode::MissingField, "node has an empty id"));
            continue;
        }
        if !seen.insert(node.id.as_str()) {
            report.error(
                ValidationIssue::new(IssueCode::DuplicateId, "node id is used more than once")
                    .on(EntityKind::Node, &node.id),
            );
        }
        if node.node_type.trim().is_empty() {
            report.warn(ValidationIssue::new(IssueCode::MissingField, "node has no type").on(EntityKind::Node, &node.id));
        }
        if !valid_extent(node.width) || !valid_extent(node.height) {
            report.error(
                ValidationIssue::new(
                    IssueCode::InvalidDimensions,
                    format!("width and height must be positive, got {}x{}", node.width, node.height),
                )
                .on(EntityKind::Node, &node.id),
            );
        }
        if let Some(pos) = node.position
            && !(pos.x.is_finite() && pos.y.is_finite())
        {
            report.error(
                ValidationIssue::new(IssueCode::InvalidField, "position is not finite").on(EntityKind::Node, &node.id),
            );
        }
        let mut handles = HashSet::new();
        for handle in &node.handles {
            if !handles.insert(handle.id.as_str()) {
                report.error(
                    ValidationIssue::new(IssueCode::DuplicateId, format!("handle '{}' is declared twice", handle.id))
                        .on(EntityKind::Node, &node.id),
                );
            }
        }
    }
    report
}

pub fn validate_edges(edges: &[Edge], nodes: &[Node]) -> ValidationReport {
    let node_ids: HashSet<&str> = nodes.iter().map(|n| n.id.as_str()).collect();
    let mut report = ValidationReport::default();
    let mut seen = HashSet::new();
    for edge in edges {
        if edge.id.trim().is_empty() {
            report.error(ValidationIssue::new(IssueCode::MissingField, "edge has an empty id"));
            continue;
        }
        if !seen.insert(edge.id.as_str()) {
            report.error(
                ValidationIssue::new(IssueCode::DuplicateId, "edge id is used more than once")
                    .on(EntityKind::Edge, &edge.id),
            );
        }
        for (end, node_id) in [("source", &edge.source), ("target", &edge.target)] {
            if !node_ids.contains(node_id.as_str()) {
                report.error(
                    ValidationIssue::new(IssueCode::MissingNode, format!("{end} node '{node_id}' does not exist"))
                        .on(EntityKind::Edge, &edge.id),
                );
            }
        }
    }
    report
}

pub fn validate_groups(groups: &[Group], nodes: &[Node]) -> ValidationReport {
    let node_ids: HashSet<&str> = nodes.iter().map(|n| n.id.as_str()).collect();
    let mut report = ValidationReport::default();
    let mut seen = HashSet::new();
    for group in groups {
        if group.id.trim().is_empty() {
            report.error(ValidationIssue::new(IssueCode::MissingField, "group has an empty id"));
            continue;
        }
        if !seen.insert(group.id.as_str()) {
            report.error(
                ValidationIssue::new(IssueCode::DuplicateId, "group id is used more than once")
                    .on(EntityKind::Group, &group.id),
            );
        }
        let members: HashSet<&str> = group.node_ids.iter().map(String::as_str).collect();
        if members.len() < 2 {
            report.error(
                ValidationIssue::new(
                    IssueCode::GroupTooSmall,
                    format!("group has {} distinct member(s), needs at least 2", members.len()),
                )
                .on(EntityKind::Group, &group.id),
            );
        }
        for member in &group.node_ids {
            if !node_ids.contains(member.as_str()) {
                report.error(
                    ValidationIssue::new(IssueCode::MissingNode, format!("member '{member}' does not exist"))
                        .on(EntityKind::Group, &group.id),
                );
            }
        }
        if group.bounds.width < 0.0 || group.bounds.height < 0.0 {
            report.error(
                ValidationIssue::new(IssueCode::InvalidDimensions, "group bounds have a negative extent")
                    .on(EntityKind::Group, &group.id),
            );
        }
    }
    report
}

/// Node, edge, and group checks over a whole snapshot.
pub fn validate_schema(snapshot: &GraphSnapshot) -> ValidationReport {
    let mut report = validate_nodes(&snapshot.nodes);
    report.extend(validate_edges(&snapshot.edges, &snapshot.nodes));
    report.extend(validate_groups(&snapshot.groups, &snapshot.nodes));
    report
}
