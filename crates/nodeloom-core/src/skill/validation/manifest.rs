use chrono::DateTime;
use nodeloom_types::graph::{EntityKind, GraphSnapshot, Node};
use nodeloom_types::manifest::MANIFEST_SECTIONS;
use nodeloom_types::validation::{IssueCode, ValidationIssue, ValidationReport};
use serde_json::{Map, Value};

fn issue(code: IssueCode, node: &Node, message: impl Into<String>) -> ValidationIssue {
    ValidationIssue::new(code, message).on(EntityKind::Node, &node.id)
}

/// Require `section.field` to be a non-empty string.
fn require_string<'v>(
    report: &mut ValidationReport,
    node: &Node,
    section: &str,
    fields: &'v Map<String, Value>,
    field: &str,
) -> Option<&'v str> {
    match fields.get(field) {
        Some(Value::String(s)) if !s.trim().is_empty() => Some(s.as_str()),
        Some(Value::String(_)) | None => {
            report.error(issue(IssueCode::MissingField, node, format!("{section}.{field} is required")));
            None
        }
        Some(_) => {
            report.error(issue(IssueCode::InvalidField, node, format!("{section}.{field} must be a string")));
            None
        }
    }
}

fn check_identity(report: &mut ValidationReport, node: &Node, identity: &Map<String, Value>) {
    require_string(report, node, "identity", identity, "graphId");
    require_string(report, node, "identity", identity, "name");
    if let Some(version) = require_string(report, node, "identity", identity, "version")
        && semver::Version::parse(version).is_err()
    {
        report.warn(issue(
            IssueCode::InvalidField,
            node,
            format!("identity.version '{version}' is not a semantic version"),
        ));
    }
    for field in ["createdAt", "updatedAt"] {
        match identity.get(field) {
            None => report.warn(issue(IssueCode::MissingField, node, format!("identity.{field} is not set"))),
            Some(Value::String(ts)) if DateTime::parse_from_rfc3339(ts).is_ok() => {}
            Some(other) => report.warn(issue(
                IssueCode::InvalidField,
                node,
                format!("identity.{field} is not an RFC 3339 timestamp: {other}"),
            )),
        }
    }
}

fn check_dependencies(report: &mut ValidationReport, node: &Node, deps: &Map<String, Value>) {
    for field in ["nodeTypes", "portContracts", "skills"] {
        if let Some(value) = deps.get(field)
            && !value.is_array()
        {
            report.error(issue(IssueCode::InvalidField, node, format!("dependencies.{field} must be an array")));
        }
    }
    for field in ["nodeTypes", "skills"] {
        if let Some(items) = deps.get(field).and_then(Value::as_array)
            && items.iter().any(|v| !v.is_string())
        {
            report.error(issue(
                IssueCode::InvalidField,
                node,
                format!("dependencies.{field} must only contain strings"),
            ));
        }
    }
    match deps.get("schemaVersions") {
        None => {}
        Some(Value::Object(versions)) => {
            for (subsystem, version) in versions {
                if !version.is_string() {
                    report.error(issue(
                        IssueCode::InvalidField,
                        node,
                        format!("dependencies.schemaVersions.{subsystem} must be a string"),
                    ));
                }
            }
        }
        Some(_) => report.error(issue(
            IssueCode::InvalidField,
            node,
            "dependencies.schemaVersions must be an object",
        )),
    }
}

fn check_authority(report: &mut ValidationReport, node: &Node, authority: &Map<String, Value>) {
    let Some(mutation) = authority.get("mutation") else {
        report.warn(issue(
            IssueCode::MissingField,
            node,
            "authority.mutation is not set; all mutations are allowed",
        ));
        return;
    };
    let Some(mutation) = mutation.as_object() else {
        report.error(issue(IssueCode::InvalidField, node, "authority.mutation must be an object"));
        return;
    };
    for flag in ["allowCreate", "allowUpdate", "allowDelete", "appendOnly"] {
        if let Some(value) = mutation.get(flag)
            && !value.is_boolean()
        {
            report.error(issue(
                IssueCode::InvalidField,
                node,
                format!("authority.mutation.{flag} must be a boolean"),
            ));
        }
    }
}

/// Exactly one manifest with four structurally complete sections.
pub fn validate_manifest(snapshot: &GraphSnapshot) -> ValidationReport {
    let mut report = ValidationReport::default();
    let manifests: Vec<&Node> = snapshot.nodes.iter().filter(|n| n.is_manifest()).collect();
    let Some(manifest) = manifests.first() else {
        report.error(ValidationIssue::new(IssueCode::MissingManifest, "graph has no manifest node"));
        return report;
    };
    for extra in &manifests[1..] {
        report.error(issue(
            IssueCode::MultipleManifests,
            extra,
            format!("graph already has manifest '{}'", manifest.id),
        ));
    }

    for section in MANIFEST_SECTIONS {
        let Some(value) = manifest.data.get(section) else {
            report.error(issue(IssueCode::MissingField, manifest, format!("section '{section}' is missing")));
            continue;
        };
        let Some(fields) = value.as_object() else {
            report.error(issue(IssueCode::InvalidField, manifest, format!("section '{section}' must be an object")));
            continue;
        };
        match section {
            "identity" => check_identity(&mut report, manifest, fields),
            "intent" => {
                require_string(&mut report, manifest, "intent", fields, "kind");
            }
            "dependencies" => check_dependencies(&mut report, manifest, fields),
            _ => check_authority(&mut report, manifest, fields),
        }
    }
    report
}
