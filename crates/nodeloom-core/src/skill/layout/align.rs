use nodeloom_types::graph::{Node, Position};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::json;

use super::{NodeMove, apply_moves, locked_warning, select_nodes};
use crate::geometry::{Rect, bounding_box};
use crate::skill::{SkillContext, SkillError, SkillOutput};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "kebab-case")]
pub enum AlignMode {
    Left,
    Right,
    Top,
    Bottom,
    /// Share the bounding box's horizontal center.
    CenterHorizontal,
    /// Share the bounding box's vertical center.
    CenterVertical,
    /// Spread centers evenly along x between the outermost nodes.
    Horizontal,
    /// Spread centers evenly along y between the outermost nodes.
    Vertical,
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct AlignDistributeParams {
    pub node_ids: Vec<String>,
    pub mode: AlignMode,
}

fn aligned(node: &Node, mode: AlignMode, bbox: Rect) -> Position {
    let pos = node.position_or_default();
    let center = bbox.center();
    match mode {
        AlignMode::Left => Position::new(bbox.x, pos.y),
        AlignMode::Right => Position::new(bbox.right() - node.width, pos.y),
        AlignMode::Top => Position::new(pos.x, bbox.y),
        AlignMode::Bottom => Position::new(pos.x, bbox.bottom() - node.height),
        AlignMode::CenterHorizontal => Position::new(center.x - node.width / 2.0, pos.y),
        AlignMode::CenterVertical => Position::new(pos.x, center.y - node.height / 2.0),
        AlignMode::Horizontal | AlignMode::Vertical => pos,
    }
}

/// Even spread of centers along one axis. The outermost nodes stay fixed.
fn distribute(nodes: &[Node], horizontal: bool) -> Vec<(usize, Position)> {
    let center_of = |n: &Node| {
        let c = Rect::of_node(n).center();
        if horizontal { c.x } else { c.y }
    };
    let mut order: Vec<usize> = (0..nodes.len()).collect();
    order.sort_by(|&a, &b| {
        center_of(&nodes[a])
            .total_cmp(&center_of(&nodes[b]))
            .then_with(|| nodes[a].id.cmp(&nodes[b].id))
    });
    if order.len() < 3 {
        return Vec::new();
    }
    let (first, last) = (order[0], order[order.len() - 1]);
    let start = center_of(&nodes[first]);
    let step = (center_of(&nodes[last]) - start) / (order.len() - 1) as f64;

    order[1..order.len() - 1]
        .iter()
        .enumerate()
        .map(|(i, &index)| {
            let node = &nodes[index];
            let pos = node.position_or_default();
            let target = start + step * (i + 1) as f64;
            let to = if horizontal {
                Position::new(target - node.width / 2.0, pos.y)
            } else {
                Position::new(pos.x, target - node.height / 2.0)
            };
            (index, to)
        })
        .collect()
}

pub(super) fn run(ctx: &mut SkillContext<'_>, params: AlignDistributeParams) -> Result<SkillOutput, SkillError> {
    if params.node_ids.len() < 2 {
        return Err(SkillError::invalid("alignDistribute needs at least 2 nodeIds"));
    }
    let nodes = select_nodes(&*ctx.graph, Some(params.node_ids.as_slice()))?;
    let Some(bbox) = bounding_box(&nodes) else {
        return Ok(SkillOutput::ok(json!({ "moves": [], "mode": params.mode })));
    };

    let planned: Vec<(usize, Position)> = match params.mode {
        AlignMode::Horizontal => distribute(&nodes, true),
        AlignMode::Vertical => distribute(&nodes, false),
        mode => nodes
            .iter()
            .enumerate()
            .map(|(i, n)| (i, aligned(n, mode, bbox)))
            .collect(),
    };

    let mut moves = Vec::new();
    let mut locked = Vec::new();
    for (index, to) in planned {
        let node = &nodes[index];
        if node.state.locked {
            locked.push(node.id.clone());
            continue;
        }
        let from = node.position_or_default();
        if from == to {
            continue;
        }
        moves.push(NodeMove {
            id: node.id.clone(),
            from,
            to,
            shifts: None,
        });
    }

    apply_moves(ctx, &moves)?;
    Ok(SkillOutput::ok(json!({ "moves": moves, "mode": params.mode }))
        .with_warnings(locked_warning(&locked).into_iter().collect()))
}
