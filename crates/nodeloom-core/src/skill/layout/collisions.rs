use std::collections::HashSet;

use nodeloom_types::graph::{Node, Position};
use schemars::JsonSchema;
use serde::Deserialize;
use serde_json::json;

use super::{NodeMove, apply_moves, locked_warning, select_nodes};
use crate::geometry::{Axis, Rect};
use crate::skill::{SkillContext, SkillError, SkillOutput, default_true};

/// Upper bound on shifts applied to one node.
pub const MAX_COLLISION_SHIFTS: usize = 200;

#[derive(Debug, Clone, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct AvoidCollisionsParams {
    /// Nodes to separate. Defaults to every non-manifest node.
    #[serde(default)]
    pub node_ids: Option<Vec<String>>,
    #[serde(default)]
    pub axis: Axis,
    /// Step per shift. Defaults to the configured spacing.
    #[serde(default)]
    pub spacing: Option<f64>,
    /// Minimum gap between boxes. Defaults to the configured collision padding.
    #[serde(default)]
    pub padding: Option<f64>,
    /// Treat group bounds as obstacles for non-members.
    #[serde(default = "default_true")]
    pub include_groups: bool,
}

struct GroupObstacle {
    rect: Rect,
    members: HashSet<String>,
}

pub(super) fn run(ctx: &mut SkillContext<'_>, params: AvoidCollisionsParams) -> Result<SkillOutput, SkillError> {
    let spacing = params.spacing.unwrap_or(ctx.config.default_spacing);
    let padding = params.padding.unwrap_or(ctx.config.collision_padding);
    if !(spacing.is_finite() && spacing > 0.0) {
        return Err(SkillError::invalid("spacing must be a positive number"));
    }
    if !(padding.is_finite() && padding >= 0.0) {
        return Err(SkillError::invalid("padding must not be negative"));
    }
    let half = padding / 2.0;
    let axis = params.axis;

    let mut targets = select_nodes(&*ctx.graph, params.node_ids.as_deref())?;
    targets.sort_by(|a, b| {
        axis.coord(a.position_or_default())
            .total_cmp(&axis.coord(b.position_or_default()))
            .then_with(|| a.id.cmp(&b.id))
    });
    let target_ids: HashSet<&str> = targets.iter().map(|n| n.id.as_str()).collect();

    // Settled boxes: every non-target node, then each target once placed.
    // Locked targets never move, so they are settled from the start.
    let mut settled: Vec<(String, Rect)> = ctx
        .graph
        .nodes()
        .iter()
        .filter(|n| !target_ids.contains(n.id.as_str()) || n.state.locked)
        .map(|n| (n.id.clone(), Rect::of_node(n).padded(half)))
        .collect();

    let groups: Vec<GroupObstacle> = if params.include_groups {
        ctx.graph
            .groups()
            .into_iter()
            .filter(|g| g.bounds.width > 0.0 && g.bounds.height > 0.0)
            .map(|g| GroupObstacle {
                rect: Rect::of_group(&g).padded(half),
                members: g.node_ids.into_iter().collect(),
            })
            .collect()
    } else {
        Vec::new()
    };

    let mut moves = Vec::new();
    for node in targets.iter().filter(|n| !n.state.locked) {
        let (rect, shifts) = place(node, axis, spacing, half, &settled, &groups)?;
        if shifts > 0 {
            moves.push(NodeMove {
                id: node.id.clone(),
                from: node.position_or_default(),
                to: Position::new(rect.x + half, rect.y + half),
                shifts: Some(shifts),
            });
        }
        settled.push((node.id.clone(), rect));
    }
    let locked: Vec<String> = targets.iter().filter(|n| n.state.locked).map(|n| n.id.clone()).collect();

    apply_moves(ctx, &moves)?;
    let output = SkillOutput::ok(json!({
        "moves": moves,
        "axis": axis,
        "spacing": spacing,
        "padding": padding,
    }));
    Ok(output.with_warnings(locked_warning(&locked).into_iter().collect()))
}

/// Shift `node` along `axis` until its padded box clears every obstacle.
fn place(
    node: &Node,
    axis: Axis,
    spacing: f64,
    half: f64,
    settled: &[(String, Rect)],
    groups: &[GroupObstacle],
) -> Result<(Rect, usize), SkillError> {
    let mut rect = Rect::of_node(node).padded(half);
    let mut shifts = 0;
    loop {
        let blocked = settled
            .iter()
            .any(|(id, other)| *id != node.id && rect.intersects(other))
            || groups
                .iter()
                .any(|g| !g.members.contains(&node.id) && rect.intersects(&g.rect));
        if !blocked {
            return Ok((rect, shifts));
        }
        if shifts == MAX_COLLISION_SHIFTS {
            return Err(SkillError::precondition_with(
                format!(
                    "node '{}' still collides after {MAX_COLLISION_SHIFTS} shifts",
                    node.id
                ),
                json!({ "nodeId": node.id, "shifts": shifts }),
            ));
        }
        let delta = axis.delta(spacing);
        rect.x += delta.x;
        rect.y += delta.y;
        shifts += 1;
    }
}

#[cfg(test)]
mod tests {
    use nodeloom_types::graph::{GraphSnapshot, Node};
    use serde_json::json;

    use super::MAX_COLLISION_SHIFTS;
    use crate::geometry::Rect;
    use crate::graph_api::GraphApi;
    use crate::skill::test_support::{dry_run_unchanged, run};
    use crate::store::Store;

    fn overlapping() -> Store {
        Store::from_snapshot(GraphSnapshot {
            nodes: vec![
                Node::new("a", "task").at(0.0, 0.0),
                Node::new("b", "task").at(10.0, 0.0),
            ],
            ..GraphSnapshot::default()
        })
        .unwrap()
    }

    #[tokio::test]
    async fn separates_overlapping_nodes_within_cap() {
        let mut store = overlapping();
        let result = run(
            &mut store,
            "layout.avoidCollisions",
            json!({ "axis": "x", "spacing": 80 }),
        )
        .await;
        assert!(result.success, "{:?}", result.error);
        let moves = result.data.unwrap()["moves"].as_array().unwrap().clone();
        assert_eq!(moves.len(), 1);
        assert_eq!(moves[0]["id"], "b");
        assert!(moves[0]["shifts"].as_u64().unwrap() <= MAX_COLLISION_SHIFTS as u64);

        let a = Rect::of_node(&store.node("a").unwrap()).padded(8.0);
        let b = Rect::of_node(&store.node("b").unwrap()).padded(8.0);
        assert!(!a.intersects(&b));
    }

    #[tokio::test]
    async fn locked_nodes_stay_put() {
        let mut store = Store::from_snapshot(GraphSnapshot {
            nodes: vec![
                Node::new("a", "task").at(50.0, 0.0),
                Node::new("b", "task").at(0.0, 0.0).locked(),
            ],
            ..GraphSnapshot::default()
        })
        .unwrap();
        let result = run(&mut store, "layout.avoidCollisions", json!({})).await;
        assert!(result.success);
        assert_eq!(store.node("b").unwrap().position.unwrap().x, 0.0);
        assert!(store.node("a").unwrap().position.unwrap().x > 50.0);
        assert_eq!(result.warnings.len(), 1);
    }

    #[tokio::test]
    async fn exceeding_the_cap_fails_without_moving() {
        let mut store = Store::from_snapshot(GraphSnapshot {
            nodes: vec![
                Node::new("wall", "task").at(0.0, 0.0).sized(100_000.0, 80.0).locked(),
                Node::new("n", "task").at(0.0, 0.0),
            ],
            ..GraphSnapshot::default()
        })
        .unwrap();
        let before = store.snapshot();
        let result = run(&mut store, "layout.avoidCollisions", json!({ "spacing": 1 })).await;
        assert!(!result.success);
        assert_eq!(store.snapshot(), before);
    }

    #[tokio::test]
    async fn dry_run_plans_moves() {
        let mut store = overlapping();
        let result = dry_run_unchanged(&mut store, "layout.avoidCollisions", json!({})).await;
        assert_eq!(result.data.unwrap()["moves"].as_array().unwrap().len(), 1);
    }
}
