//! Manifest-derived mutation policy.
//!
//! The manifest node's `authority.mutation` block decides whether create,
//! update, and delete mutations are currently allowed. A missing manifest or a
//! malformed block degrades to permissive defaults with a warning rather than
//! freezing the graph.

use nodeloom_types::graph::Node;
use nodeloom_types::skill::MutationAction;
use serde::Serialize;
use serde_json::Value;

use crate::graph_api::GraphApi;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PolicyError {
    #[error("manifest authority forbids {0} mutations")]
    Forbidden(MutationAction),

    #[error("manifest is append-only: delete mutations are forbidden")]
    AppendOnly,
}

// ---------------------------------------------------------------------------
// MutationPolicy
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MutationPolicy {
    pub allow_create: bool,
    pub allow_update: bool,
    pub allow_delete: bool,
    pub append_only: bool,
    pub has_manifest: bool,
    /// Id of the manifest the policy was read from.
    pub manifest_id: Option<String>,
    pub warnings: Vec<String>,
}

impl MutationPolicy {
    pub fn permissive() -> Self {
        Self {
            allow_create: true,
            allow_update: true,
            allow_delete: true,
            append_only: false,
            has_manifest: false,
            manifest_id: None,
            warnings: Vec::new(),
        }
    }

    pub fn check(&self, action: MutationAction) -> Result<(), PolicyError> {
        match action {
            MutationAction::Create if !self.allow_create => Err(PolicyError::Forbidden(action)),
            MutationAction::Update if !self.allow_update => Err(PolicyError::Forbidden(action)),
            MutationAction::Delete if self.append_only => Err(PolicyError::AppendOnly),
            MutationAction::Delete if !self.allow_delete => Err(PolicyError::Forbidden(action)),
            _ => Ok(()),
        }
    }

    /// Warnings joined into one message, if any.
    pub fn warning(&self) -> Option<String> {
        (!self.warnings.is_empty()).then(|| self.warnings.join("; "))
    }
}

/// Read the mutation policy from the graph's manifest node.
pub fn manifest_mutation_policy(graph: &dyn GraphApi) -> MutationPolicy {
    let manifests: Vec<Node> = graph.nodes().into_iter().filter(Node::is_manifest).collect();
    let Some(manifest) = manifests.first() else {
        return MutationPolicy::permissive();
    };

    let mut policy = MutationPolicy {
        has_manifest: true,
        manifest_id: Some(manifest.id.clone()),
        ..MutationPolicy::permissive()
    };
    if manifests.len() > 1 {
        policy.warnings.push(format!(
            "found {} manifest nodes; using '{}'",
            manifests.len(),
            manifest.id
        ));
    }

    let block = manifest
        .data
        .get("authority")
        .and_then(|a| a.get("mutation"))
        .and_then(Value::as_object);
    let Some(block) = block else {
        policy.warnings.push(format!(
            "manifest '{}' has no valid authority.mutation block; mutations are unrestricted",
            manifest.id
        ));
        return policy;
    };

    let mut flag = |key: &str, default: bool| match block.get(key) {
        None => default,
        Some(Value::Bool(b)) => *b,
        Some(_) => {
            policy
                .warnings
                .push(format!("authority.mutation.{key} is not a boolean; using {default}"));
            default
        }
    };
    let allow_create = flag("allowCreate", true);
    let allow_update = flag("allowUpdate", true);
    let allow_delete = flag("allowDelete", true);
    let append_only = flag("appendOnly", false);

    policy.allow_create = allow_create;
    policy.allow_update = allow_update;
    policy.allow_delete = allow_delete;
    policy.append_only = append_only;
    policy
}

/// Check one action against the manifest policy.
///
/// Returns the policy's warning (if any) when the action is allowed.
pub fn assert_mutation_allowed(
    graph: &dyn GraphApi,
    action: MutationAction,
) -> Result<Option<String>, PolicyError> {
    let policy = manifest_mutation_policy(graph);
    policy.check(action)?;
    Ok(policy.warning())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::Store;
    use nodeloom_types::graph::{GraphSnapshot, MANIFEST_NODE_TYPE};
    use serde_json::json;

    fn graph_with_manifest(data: Value) -> Store {
        let mut manifest = Node::new("manifest", MANIFEST_NODE_TYPE);
        if let Value::Object(map) = data {
            manifest.data = map;
        }
        Store::restore(GraphSnapshot {
            nodes: vec![manifest],
            ..GraphSnapshot::default()
        })
    }

    #[test]
    fn no_manifest_is_permissive() {
        let store = Store::new();
        let policy = manifest_mutation_policy(&store);
        assert!(!policy.has_manifest);
        assert!(policy.check(MutationAction::Delete).is_ok());
        assert!(policy.warnings.is_empty());
    }

    #[test]
    fn append_only_forbids_delete() {
        let store = graph_with_manifest(json!({
            "authority": { "mutation": { "appendOnly": true } }
        }));
        assert_eq!(
            assert_mutation_allowed(&store, MutationAction::Delete),
            Err(PolicyError::AppendOnly)
        );
        assert_eq!(assert_mutation_allowed(&store, MutationAction::Create), Ok(None));
    }

    #[test]
    fn explicit_denials_are_enforced() {
        let store = graph_with_manifest(json!({
            "authority": { "mutation": { "allowUpdate": false } }
        }));
        assert_eq!(
            assert_mutation_allowed(&store, MutationAction::Update),
            Err(PolicyError::Forbidden(MutationAction::Update))
        );
    }

    #[test]
    fn malformed_block_degrades_with_warning() {
        let store = graph_with_manifest(json!({ "authority": "nope" }));
        let warning = assert_mutation_allowed(&store, MutationAction::Delete).unwrap();
        assert!(warning.unwrap().contains("authority.mutation"));

        let store = graph_with_manifest(json!({
            "authority": { "mutation": { "allowDelete": "no" } }
        }));
        let policy = manifest_mutation_policy(&store);
        assert!(policy.allow_delete);
        assert_eq!(policy.warnings.len(), 1);
    }
}
