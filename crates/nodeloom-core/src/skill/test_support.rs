//! Fixtures shared by skill tests.

use nodeloom_types::config::EngineConfig;
use nodeloom_types::graph::{Edge, GraphSnapshot, Group, Node};
use nodeloom_types::manifest::{ManifestData, MutationAuthority};
use nodeloom_types::skill::SkillResult;
use serde_json::Value;

use crate::graph_api::GraphApi;
use crate::registry::SkillRegistry;
use crate::store::Store;

/// Three task nodes in a row, `a -> b -> c`, with `a` and `b` grouped.
pub fn sample_store() -> Store {
    Store::from_snapshot(GraphSnapshot {
        nodes: vec![
            Node::new("a", "task").at(0.0, 0.0),
            Node::new("b", "task").at(300.0, 0.0),
            Node::new("c", "task").at(600.0, 0.0),
        ],
        edges: vec![Edge::new("e1", "a", "b"), Edge::new("e2", "b", "c")],
        groups: vec![Group::new("g1", vec!["a".into(), "b".into()])],
    })
    .unwrap()
}

/// `sample_store` plus a manifest carrying `authority`.
pub fn store_with_authority(authority: MutationAuthority) -> Store {
    let mut store = sample_store();
    let manifest = ManifestData::new("g-test", "Test", "dataflow")
        .with_authority(authority)
        .into_node("manifest");
    store.create_nodes(vec![manifest]).unwrap();
    store
}

pub async fn run(store: &mut Store, skill: &str, params: Value) -> SkillResult {
    SkillRegistry::with_builtin_skills(EngineConfig::default())
        .execute_skill(store, skill, params)
        .await
}

/// Run with `dryRun: true` and assert the graph did not change.
pub async fn dry_run_unchanged(store: &mut Store, skill: &str, mut params: Value) -> SkillResult {
    if let Some(map) = params.as_object_mut() {
        map.insert("dryRun".to_string(), Value::Bool(true));
    }
    let before = store.snapshot();
    let result = run(store, skill, params).await;
    assert_eq!(store.snapshot(), before, "dry run of {skill} mutated the graph");
    result
}
